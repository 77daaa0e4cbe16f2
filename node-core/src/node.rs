//! Sensor node context and the activities that run on the scheduler.
//!
//! [`SensorNode`] is the context handed to every activity. The activities are
//! plain functions so they can be stored in the scheduler table; use
//! [`register_activities`] to install the standard set.

use core::time::Duration;

use crate::acquisition::{AcquisitionMachine, AnalogFrontEnd, Quantity};
use crate::config::{BlinkPattern, NodeConfig};
use crate::report::{ReportError, ReportValues, Reporter, Transport};
use crate::scheduler::{EventScheduler, EventState, ScheduleError, Tick, TickSource};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

/// Output driving the status LED.
pub trait StatusLed {
    /// Lights the LED when `lit` is `true`. Polarity is the implementor's concern.
    fn set(&mut self, lit: bool);
}

/// Scheduler type driving a [`SensorNode`].
pub type NodeScheduler<T, A, L, X, const N: usize> = EventScheduler<T, SensorNode<A, L, X>, N>;

/// Everything the scheduled activities operate on.
pub struct SensorNode<A, L, X> {
    acquisition: AcquisitionMachine<A>,
    led: L,
    led_lit: bool,
    reporter: Reporter,
    transport: X,
    telemetry: TelemetryRecorder,
}

impl<A, L, X> SensorNode<A, L, X>
where
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    /// Builds the node with the LED switched off.
    pub fn new(front_end: A, mut led: L, transport: X, config: &NodeConfig) -> Self {
        led.set(false);
        Self {
            acquisition: AcquisitionMachine::new(front_end, config.acquisition),
            led,
            led_lit: false,
            reporter: Reporter::new(config.report_format),
            transport,
            telemetry: TelemetryRecorder::new(),
        }
    }

    fn set_led(&mut self, lit: bool, tick: Tick) {
        self.led.set(lit);
        self.led_lit = lit;
        self.telemetry.record(
            TelemetryEventKind::LedChanged,
            TelemetryPayload::Led(lit),
            tick,
        );
    }

    /// Returns the values the next report would carry.
    #[must_use]
    pub fn report_values(&self) -> ReportValues {
        ReportValues::new(
            self.acquisition.average(Quantity::Light).average(),
            self.acquisition.average(Quantity::Battery).average(),
        )
    }

    /// Returns `true` while the LED is lit.
    #[must_use]
    pub const fn led_lit(&self) -> bool {
        self.led_lit
    }

    #[must_use]
    pub const fn acquisition(&self) -> &AcquisitionMachine<A> {
        &self.acquisition
    }

    pub fn acquisition_mut(&mut self) -> &mut AcquisitionMachine<A> {
        &mut self.acquisition
    }

    #[must_use]
    pub const fn led(&self) -> &L {
        &self.led
    }

    #[must_use]
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    #[must_use]
    pub const fn transport(&self) -> &X {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }
}

/// Inverts the LED.
pub fn toggle_led<T, A, L, X, const N: usize>(
    node: &mut SensorNode<A, L, X>,
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    _state: EventState,
) where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    let lit = !node.led_lit;
    node.set_led(lit, scheduler.now());
}

/// Lights the LED and schedules [`pulse_led_off`] after `state` milliseconds.
pub fn pulse_led_on<T, A, L, X, const N: usize>(
    node: &mut SensorNode<A, L, X>,
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    state: EventState,
) where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    let now = scheduler.now();
    node.set_led(true, now);

    let on_time = Duration::from_millis(u64::from(state));
    if let Err(error) = scheduler.register_one_shot(pulse_led_off::<T, A, L, X, N>, on_time, 0) {
        node.telemetry.record_rejection(error, now);
        node.set_led(false, now);
    }
}

/// Switches the LED off.
pub fn pulse_led_off<T, A, L, X, const N: usize>(
    node: &mut SensorNode<A, L, X>,
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    _state: EventState,
) where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    node.set_led(false, scheduler.now());
}

/// Advances the acquisition cycle by one phase.
pub fn step_acquisition<T, A, L, X, const N: usize>(
    node: &mut SensorNode<A, L, X>,
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    _state: EventState,
) where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    if let Some(reading) = node.acquisition.step() {
        node.telemetry.record_reading(
            reading.quantity,
            reading.raw_average,
            reading.value,
            scheduler.now(),
        );
    }
}

/// Renders the averaged readings and hands them to the transport.
pub fn send_report<T, A, L, X, const N: usize>(
    node: &mut SensorNode<A, L, X>,
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    _state: EventState,
) where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    let values = node.report_values();
    let now = scheduler.now();
    match node.reporter.send(&mut node.transport, values) {
        Ok(bytes) => {
            node.telemetry.record_report(bytes, now);
        }
        Err(ReportError::Overflow) => {
            node.telemetry.record(
                TelemetryEventKind::ReportDropped,
                TelemetryPayload::none(),
                now,
            );
        }
    }
}

/// Configures the time base and registers the LED, acquisition and report
/// activities, in that order.
///
/// A pulse on-time is clamped to one millisecond short of the blink period so
/// each pulse is switched off before the next one starts.
///
/// # Errors
///
/// Returns the first registration failure; activities registered before it
/// stay in the table.
pub fn register_activities<T, A, L, X, const N: usize>(
    scheduler: &mut NodeScheduler<T, A, L, X, N>,
    config: &NodeConfig,
) -> Result<(), ScheduleError>
where
    T: TickSource,
    A: AnalogFrontEnd,
    L: StatusLed,
    X: Transport,
{
    scheduler.set_time_base(config.tick_rate_hz);

    match config.blink {
        BlinkPattern::Toggle { period } => {
            scheduler.register_high_priority_event(toggle_led::<T, A, L, X, N>, period, 0)?;
        }
        BlinkPattern::Pulse { period, on_time } => {
            let on_time = on_time.min(period.saturating_sub(Duration::from_millis(1)));
            let on_time_ms = u32::try_from(on_time.as_millis()).unwrap_or(u32::MAX);
            scheduler.register_high_priority_event(pulse_led_on::<T, A, L, X, N>, period, on_time_ms)?;
        }
    }

    scheduler.register_event(step_acquisition::<T, A, L, X, N>, config.acquisition_period, 0)?;
    scheduler.register_event(send_report::<T, A, L, X, N>, config.report_period, 0)?;
    Ok(())
}
