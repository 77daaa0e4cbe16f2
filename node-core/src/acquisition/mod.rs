//! Round-robin ADC acquisition for the battery and light channels.
//!
//! Each call to [`AcquisitionMachine::step`] advances one phase of the cycle
//! `SelectBattery → AwaitBattery → SelectLight → AwaitLight`. Select phases
//! program the multiplexer and reference and throw away the settle
//! conversions; await phases average a batch of raw samples, scale them and
//! feed the quantity's [`RunningAverage`].
//!
//! Conversions either poll the converter ([`WaitPolicy::BusyWait`]) or halt
//! the core until the completion interrupt has stored the result in the
//! [`ConversionSlot`] ([`WaitPolicy::LowPower`]).

use portable_atomic::{AtomicBool, AtomicU16, Ordering};

use crate::average::{DEFAULT_WINDOW, RunningAverage};

pub mod scaling;

pub use scaling::{
    BATTERY_SCALE_VOLTS, FULL_SCALE_10_BIT, FULL_SCALE_12_BIT, LIGHT_SCALE_PERCENT, mean_of,
    scale_reading,
};

/// Raw converter output.
pub type RawSample = u16;

/// Upper bound on the number of raw samples averaged into one reading.
pub const MAX_SAMPLES_PER_READING: u8 = 16;

#[allow(clippy::cast_lossless)]
const SAMPLE_BUFFER_LEN: usize = MAX_SAMPLES_PER_READING as usize;

/// Default number of raw samples averaged into one reading.
pub const DEFAULT_SAMPLES_PER_READING: u8 = 8;

/// Default number of conversions discarded after switching channel or reference.
pub const DEFAULT_SETTLE_CONVERSIONS: u8 = 1;

/// Voltage reference feeding the converter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reference {
    /// Analog supply rail.
    Supply,
    /// Reference pin driven externally.
    External,
    /// Fixed on-chip bandgap reference.
    InternalFixed,
}

/// Quantities sampled by the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Quantity {
    Battery,
    Light,
}

impl Quantity {
    /// Short label used in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Quantity::Battery => "battery",
            Quantity::Light => "light",
        }
    }
}

/// Multiplexer, reference and scale factor for one quantity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    pub channel: u8,
    pub reference: Reference,
    /// Engineering-unit value at full-scale input.
    pub scale: f32,
}

impl ChannelConfig {
    #[must_use]
    pub const fn new(channel: u8, reference: Reference, scale: f32) -> Self {
        Self {
            channel,
            reference,
            scale,
        }
    }
}

/// How the acquisition routine waits for a conversion to finish.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitPolicy {
    /// Poll the conversion-complete flag and read the data register.
    BusyWait,
    /// Sleep until the completion interrupt has filled the [`ConversionSlot`].
    LowPower,
}

/// Settings for [`AcquisitionMachine`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AcquisitionConfig {
    pub battery: ChannelConfig,
    pub light: ChannelConfig,
    /// Number of codes the converter can produce (1024 for 10 bits).
    pub full_scale: f32,
    samples_per_reading: u8,
    pub settle_conversions: u8,
    pub wait_policy: WaitPolicy,
}

impl AcquisitionConfig {
    /// Battery on channel 0 against the internal reference, light on channel 1
    /// against the external reference pin, 10-bit converter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            battery: ChannelConfig::new(0, Reference::InternalFixed, BATTERY_SCALE_VOLTS),
            light: ChannelConfig::new(1, Reference::External, LIGHT_SCALE_PERCENT),
            full_scale: FULL_SCALE_10_BIT,
            samples_per_reading: DEFAULT_SAMPLES_PER_READING,
            settle_conversions: DEFAULT_SETTLE_CONVERSIONS,
            wait_policy: WaitPolicy::LowPower,
        }
    }

    #[must_use]
    pub const fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    #[must_use]
    pub const fn with_full_scale(mut self, full_scale: f32) -> Self {
        self.full_scale = full_scale;
        self
    }

    #[must_use]
    pub const fn with_battery(mut self, battery: ChannelConfig) -> Self {
        self.battery = battery;
        self
    }

    #[must_use]
    pub const fn with_light(mut self, light: ChannelConfig) -> Self {
        self.light = light;
        self
    }

    /// Sets how many raw samples are averaged into one reading.
    ///
    /// The count is clamped to `1..=MAX_SAMPLES_PER_READING`; read it back
    /// with [`AcquisitionConfig::samples_per_reading`].
    #[must_use]
    pub const fn with_samples_per_reading(mut self, samples: u8) -> Self {
        self.samples_per_reading = if samples == 0 {
            1
        } else if samples > MAX_SAMPLES_PER_READING {
            MAX_SAMPLES_PER_READING
        } else {
            samples
        };
        self
    }

    #[must_use]
    pub const fn samples_per_reading(&self) -> u8 {
        self.samples_per_reading
    }

    #[must_use]
    pub const fn with_settle_conversions(mut self, conversions: u8) -> Self {
        self.settle_conversions = conversions;
        self
    }

    /// Returns the channel settings for `quantity`.
    #[must_use]
    pub const fn channel(&self, quantity: Quantity) -> ChannelConfig {
        match quantity {
            Quantity::Battery => self.battery,
            Quantity::Light => self.light,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-word handoff between the completion interrupt and the main loop.
///
/// The interrupt calls [`complete`](Self::complete) once per conversion; the
/// main loop calls [`take`](Self::take) once per consumption. The ready flag
/// tells a wake-up caused by the conversion apart from one caused by any
/// other interrupt.
pub struct ConversionSlot {
    value: AtomicU16,
    ready: AtomicBool,
}

impl ConversionSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU16::new(0),
            ready: AtomicBool::new(false),
        }
    }

    /// Publishes a finished conversion. Interrupt context only.
    pub fn complete(&self, raw: RawSample) {
        self.value.store(raw, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Consumes the published value, if a conversion finished since the last take.
    pub fn take(&self) -> Option<RawSample> {
        if self.ready.swap(false, Ordering::Acquire) {
            Some(self.value.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Returns `true` when a value is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for ConversionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware primitives needed by the acquisition state machine.
pub trait AnalogFrontEnd {
    /// Routes `channel` to the converter and selects `reference`.
    fn select(&mut self, channel: u8, reference: Reference);

    /// Triggers one conversion on the selected channel.
    fn start_conversion(&mut self);

    /// Returns `true` once the last triggered conversion has finished.
    fn conversion_complete(&mut self) -> bool;

    /// Reads the result of the last finished conversion from the data register.
    fn read_result(&mut self) -> RawSample;

    /// Enables or disables the conversion-complete interrupt.
    fn set_completion_interrupt(&mut self, enabled: bool);

    /// Halts the core until the next interrupt.
    ///
    /// Must return immediately when an interrupt became pending before the
    /// call, otherwise a completion racing the call is lost until the next
    /// unrelated interrupt.
    fn wait_for_interrupt(&mut self);

    /// Slot written by the conversion-complete interrupt.
    fn completion_slot(&self) -> &ConversionSlot;
}

/// Position in the acquisition cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CyclePhase {
    SelectBattery,
    AwaitBattery,
    SelectLight,
    AwaitLight,
}

impl CyclePhase {
    /// Returns the phase following `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            CyclePhase::SelectBattery => CyclePhase::AwaitBattery,
            CyclePhase::AwaitBattery => CyclePhase::SelectLight,
            CyclePhase::SelectLight => CyclePhase::AwaitLight,
            CyclePhase::AwaitLight => CyclePhase::SelectBattery,
        }
    }

    /// Quantity this phase works on.
    #[must_use]
    pub const fn quantity(self) -> Quantity {
        match self {
            CyclePhase::SelectBattery | CyclePhase::AwaitBattery => Quantity::Battery,
            CyclePhase::SelectLight | CyclePhase::AwaitLight => Quantity::Light,
        }
    }
}

/// Scaled result of one await phase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reading {
    pub quantity: Quantity,
    /// Exact mean of the raw samples.
    pub raw_average: f32,
    /// `raw_average` converted into engineering units.
    pub value: f32,
}

/// Battery/light acquisition cycle over an [`AnalogFrontEnd`].
pub struct AcquisitionMachine<A, const K: usize = DEFAULT_WINDOW> {
    front_end: A,
    config: AcquisitionConfig,
    phase: CyclePhase,
    battery: RunningAverage<K>,
    light: RunningAverage<K>,
}

impl<A, const K: usize> AcquisitionMachine<A, K>
where
    A: AnalogFrontEnd,
{
    /// Creates the machine in [`CyclePhase::SelectBattery`].
    pub fn new(mut front_end: A, config: AcquisitionConfig) -> Self {
        front_end.set_completion_interrupt(config.wait_policy == WaitPolicy::LowPower);
        Self {
            front_end,
            config,
            phase: CyclePhase::SelectBattery,
            battery: RunningAverage::new(),
            light: RunningAverage::new(),
        }
    }

    /// Runs the current phase and advances to the next one.
    ///
    /// Returns the new reading when an await phase completes. With
    /// [`WaitPolicy::LowPower`] this never returns if the completion interrupt
    /// stops firing.
    pub fn step(&mut self) -> Option<Reading> {
        let phase = self.phase;
        self.phase = phase.next();

        match phase {
            CyclePhase::SelectBattery | CyclePhase::SelectLight => {
                self.select(phase.quantity());
                None
            }
            CyclePhase::AwaitBattery | CyclePhase::AwaitLight => {
                Some(self.acquire(phase.quantity()))
            }
        }
    }

    fn select(&mut self, quantity: Quantity) {
        let channel = self.config.channel(quantity);
        self.front_end.select(channel.channel, channel.reference);

        for _ in 0..self.config.settle_conversions {
            let _ = self.convert();
        }
    }

    fn acquire(&mut self, quantity: Quantity) -> Reading {
        let count = usize::from(self.config.samples_per_reading);
        let mut samples = [0; SAMPLE_BUFFER_LEN];
        for sample in samples.iter_mut().take(count) {
            *sample = self.convert();
        }

        let raw_average = mean_of(&samples[..count]).unwrap_or(0.0);
        let channel = self.config.channel(quantity);
        let value = scale_reading(raw_average, channel.scale, self.config.full_scale);
        self.average_mut(quantity).push(value);

        Reading {
            quantity,
            raw_average,
            value,
        }
    }

    fn convert(&mut self) -> RawSample {
        match self.config.wait_policy {
            WaitPolicy::BusyWait => {
                self.front_end.start_conversion();
                while !self.front_end.conversion_complete() {
                    core::hint::spin_loop();
                }
                self.front_end.read_result()
            }
            WaitPolicy::LowPower => {
                // A value nobody waited for belongs to an earlier trigger.
                let _ = self.front_end.completion_slot().take();
                self.front_end.start_conversion();
                loop {
                    if let Some(raw) = self.front_end.completion_slot().take() {
                        break raw;
                    }
                    self.front_end.wait_for_interrupt();
                }
            }
        }
    }

    /// Switches between polling and sleeping for conversions.
    pub fn set_wait_policy(&mut self, policy: WaitPolicy) {
        self.config.wait_policy = policy;
        self.front_end
            .set_completion_interrupt(policy == WaitPolicy::LowPower);
    }

    /// Returns the active wait policy.
    pub const fn wait_policy(&self) -> WaitPolicy {
        self.config.wait_policy
    }

    /// Returns the phase the next [`step`](Self::step) will run.
    pub const fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Returns the moving average for `quantity`.
    pub const fn average(&self, quantity: Quantity) -> &RunningAverage<K> {
        match quantity {
            Quantity::Battery => &self.battery,
            Quantity::Light => &self.light,
        }
    }

    fn average_mut(&mut self, quantity: Quantity) -> &mut RunningAverage<K> {
        match quantity {
            Quantity::Battery => &mut self.battery,
            Quantity::Light => &mut self.light,
        }
    }

    /// Returns the acquisition settings.
    pub const fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Provides access to the underlying front end.
    pub const fn front_end(&self) -> &A {
        &self.front_end
    }

    /// Provides mutable access to the underlying front end.
    pub fn front_end_mut(&mut self) -> &mut A {
        &mut self.front_end
    }
}
