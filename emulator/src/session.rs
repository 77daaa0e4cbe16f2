use std::f32::consts::TAU;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crossterm::style::Stylize;
use node_core::acquisition::{
    AcquisitionConfig, AnalogFrontEnd, ConversionSlot, RawSample, Reference, WaitPolicy,
};
use node_core::config::{BlinkPattern, NodeConfig};
use node_core::node::{SensorNode, StatusLed, register_activities};
use node_core::report::{ReportFormat, Transport};
use node_core::scheduler::{EventScheduler, MAX_ACTIVITIES, Tick, TickCounter, TickSource};
use node_core::telemetry::{EventId, TelemetryEventKind, TelemetryRecord};

/// Period of the simulated day/night light swing.
const LIGHT_CYCLE_SECONDS: f32 = 20.0;
const BATTERY_FULL_VOLTS: f32 = 4.2;
const BATTERY_EMPTY_VOLTS: f32 = 3.0;
const BATTERY_DRAIN_VOLTS_PER_SECOND: f32 = 0.01;
/// Offset of the first conversion after the multiplexer moves.
const SETTLE_BIAS: i32 = 64;
/// Every n-th low-power conversion sees an unrelated wake-up first.
const SPURIOUS_WAKE_INTERVAL: u32 = 3;
const NOISE_SEED: u32 = 0x2545_f491;

/// Pulse width used by `--blink pulse`.
pub const PULSE_ON_TIME: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Busy,
    Sleep,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Busy => "transcripts/emulator-busy.log",
            TranscriptProfile::Sleep => "transcripts/emulator-sleep.log",
        }
    }

    pub fn options(self) -> SessionOptions {
        let policy = match self {
            TranscriptProfile::Busy => WaitPolicy::BusyWait,
            TranscriptProfile::Sleep => WaitPolicy::LowPower,
        };
        SessionOptions {
            seconds: 5,
            policy,
            format: ReportFormat::Compact,
            blink: BlinkPattern::default(),
            transcript: Some(PathBuf::from(self.log_path())),
        }
    }
}

/// Parameters of one emulator run.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    pub seconds: u32,
    pub policy: WaitPolicy,
    pub format: ReportFormat,
    pub blink: BlinkPattern,
    pub transcript: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            seconds: 10,
            policy: WaitPolicy::LowPower,
            format: ReportFormat::Compact,
            blink: BlinkPattern::default(),
            transcript: None,
        }
    }
}

impl SessionOptions {
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new()
            .with_wait_policy(self.policy)
            .with_report_format(self.format)
            .with_blink(self.blink)
    }
}

/// Counters reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SessionSummary {
    pub ticks: u32,
    pub reports: usize,
    pub readings: usize,
    pub led_changes: usize,
    pub conversions: u32,
    pub wakes: u32,
    pub spurious_wakes: u32,
}

/// Virtual-time clock shared by the scheduler and the simulated converter.
#[derive(Clone)]
pub struct VirtualClock(Rc<TickCounter>);

impl VirtualClock {
    fn new() -> Self {
        Self(Rc::new(TickCounter::new()))
    }

    fn advance(&self) {
        self.0.tick();
    }
}

impl TickSource for VirtualClock {
    fn now(&self) -> Tick {
        self.0.now()
    }
}

type Node = SensorNode<SimulatedAdc, ConsoleLed, LineTransport>;
type Scheduler = EventScheduler<VirtualClock, Node, MAX_ACTIVITIES>;

pub struct Session {
    clock: VirtualClock,
    scheduler: Scheduler,
    node: Node,
    tick_rate_hz: u32,
    seconds: u32,
    telemetry_cursor: EventId,
    transcript: Option<TranscriptLogger>,
    summary: SessionSummary,
}

impl Session {
    pub fn new(options: &SessionOptions) -> io::Result<Self> {
        let config = options.node_config();
        let clock = VirtualClock::new();
        let front_end = SimulatedAdc::new(clock.clone(), config.tick_rate_hz, &config.acquisition);
        let node = SensorNode::new(
            front_end,
            ConsoleLed::default(),
            LineTransport::default(),
            &config,
        );

        let mut scheduler = Scheduler::new(clock.clone());
        register_activities(&mut scheduler, &config)
            .map_err(|error| io::Error::other(format!("activity registration failed: {error}")))?;

        let transcript = match &options.transcript {
            Some(path) => Some(TranscriptLogger::new(path, options)?),
            None => None,
        };

        Ok(Self {
            clock,
            scheduler,
            node,
            tick_rate_hz: config.tick_rate_hz,
            seconds: options.seconds,
            telemetry_cursor: 0,
            transcript,
            summary: SessionSummary::default(),
        })
    }

    /// Runs the configured number of virtual seconds, one dispatch per tick.
    pub fn run<W: Write>(&mut self, out: &mut W) -> io::Result<SessionSummary> {
        let ticks = self.seconds.saturating_mul(self.tick_rate_hz);
        for _ in 0..ticks {
            self.clock.advance();
            self.scheduler.dispatch_due(&mut self.node);
            self.forward_output(out)?;
            self.summary.ticks += 1;
        }

        let adc = self.node.acquisition().front_end();
        self.summary.conversions = adc.conversions;
        self.summary.wakes = adc.wakes;
        self.summary.spurious_wakes = adc.spurious_wakes;
        Ok(self.summary)
    }

    fn forward_output<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let now = self.clock.now();
        let lines: Vec<String> = self.node.transport_mut().lines.drain(..).collect();
        for line in lines {
            self.summary.reports += 1;
            let millis = ticks_to_millis(now, self.tick_rate_hz);
            writeln!(out, "[+{millis:>6} ms] {} {line:?}", "TX ".green().bold())?;
            if let Some(transcript) = self.transcript.as_mut() {
                transcript.append_line(millis, TranscriptRole::Radio, &format!("{line:?}"))?;
            }
        }

        let records: Vec<TelemetryRecord> = self
            .node
            .telemetry()
            .records_since(self.telemetry_cursor)
            .copied()
            .collect();
        self.telemetry_cursor = self.node.telemetry().next_id();

        for record in records {
            match record.event {
                TelemetryEventKind::ReadingComplete(_) => self.summary.readings += 1,
                TelemetryEventKind::LedChanged => self.summary.led_changes += 1,
                _ => {}
            }

            let millis = ticks_to_millis(record.tick, self.tick_rate_hz);
            let text = describe_record(&record);
            let label = match record.event {
                TelemetryEventKind::ReportDropped | TelemetryEventKind::ActivityRejected => {
                    "LOG".red()
                }
                _ => "LOG".dark_grey(),
            };
            writeln!(out, "[+{millis:>6} ms] {label} {text}")?;
            if let Some(transcript) = self.transcript.as_mut() {
                transcript.append_line(millis, TranscriptRole::Telemetry, &text)?;
            }
        }
        Ok(())
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

fn describe_record(record: &TelemetryRecord) -> String {
    let details = record.details.to_string();
    if details.is_empty() {
        record.event.to_string()
    } else {
        format!("{} {details}", record.event)
    }
}

fn ticks_to_millis(tick: Tick, tick_rate_hz: u32) -> u64 {
    u64::from(tick) * 1_000 / u64::from(tick_rate_hz.max(1))
}

/// Converter model producing a slow light swing and a draining battery.
pub struct SimulatedAdc {
    clock: VirtualClock,
    tick_rate_hz: u32,
    config: AcquisitionConfig,
    slot: ConversionSlot,
    channel: u8,
    reference: Option<Reference>,
    settling: bool,
    interrupt_enabled: bool,
    result: RawSample,
    in_flight: Option<RawSample>,
    spurious_pending: bool,
    noise_state: u32,
    pub conversions: u32,
    pub wakes: u32,
    pub spurious_wakes: u32,
}

impl SimulatedAdc {
    fn new(clock: VirtualClock, tick_rate_hz: u32, config: &AcquisitionConfig) -> Self {
        Self {
            clock,
            tick_rate_hz,
            config: *config,
            slot: ConversionSlot::new(),
            channel: 0,
            reference: None,
            settling: false,
            interrupt_enabled: false,
            result: 0,
            in_flight: None,
            spurious_pending: false,
            noise_state: NOISE_SEED,
            conversions: 0,
            wakes: 0,
            spurious_wakes: 0,
        }
    }

    fn elapsed_seconds(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let seconds = self.clock.now() as f32 / self.tick_rate_hz.max(1) as f32;
        seconds
    }

    fn noise(&mut self) -> i32 {
        self.noise_state = self
            .noise_state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345);
        i32::try_from((self.noise_state >> 16) % 5).unwrap_or(0) - 2
    }

    fn sample(&mut self) -> RawSample {
        let seconds = self.elapsed_seconds();
        let (value, scale) = if self.channel == self.config.battery.channel {
            let volts = (BATTERY_FULL_VOLTS - BATTERY_DRAIN_VOLTS_PER_SECOND * seconds)
                .max(BATTERY_EMPTY_VOLTS);
            (volts, self.config.battery.scale)
        } else {
            let percent = 50.0 + 45.0 * (seconds * TAU / LIGHT_CYCLE_SECONDS).sin();
            (percent, self.config.light.scale)
        };

        let mut code = to_code(value, scale, self.config.full_scale) + self.noise();
        if self.settling {
            code += SETTLE_BIAS;
            self.settling = false;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_code = self.config.full_scale as i32 - 1;
        RawSample::try_from(code.clamp(0, max_code)).unwrap_or(RawSample::MAX)
    }
}

fn to_code(value: f32, scale: f32, full_scale: f32) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let code = (value / scale * full_scale).round() as i32;
    code
}

impl AnalogFrontEnd for SimulatedAdc {
    fn select(&mut self, channel: u8, reference: Reference) {
        if self.channel != channel || self.reference != Some(reference) {
            self.settling = true;
        }
        self.channel = channel;
        self.reference = Some(reference);
    }

    fn start_conversion(&mut self) {
        self.conversions += 1;
        let value = self.sample();
        if self.interrupt_enabled {
            self.in_flight = Some(value);
            self.spurious_pending = self.conversions % SPURIOUS_WAKE_INTERVAL == 0;
        } else {
            self.result = value;
        }
    }

    fn conversion_complete(&mut self) -> bool {
        true
    }

    fn read_result(&mut self) -> RawSample {
        self.result
    }

    fn set_completion_interrupt(&mut self, enabled: bool) {
        self.interrupt_enabled = enabled;
    }

    fn wait_for_interrupt(&mut self) {
        self.wakes += 1;
        if self.spurious_pending {
            self.spurious_pending = false;
            self.spurious_wakes += 1;
            return;
        }
        if let Some(value) = self.in_flight.take() {
            self.slot.complete(value);
        }
    }

    fn completion_slot(&self) -> &ConversionSlot {
        &self.slot
    }
}

#[derive(Default)]
pub struct ConsoleLed {
    lit: bool,
}

impl ConsoleLed {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl StatusLed for ConsoleLed {
    fn set(&mut self, lit: bool) {
        self.lit = lit;
    }
}

/// Collects transmitted reports until the session forwards them.
#[derive(Default)]
pub struct LineTransport {
    lines: Vec<String>,
}

impl Transport for LineTransport {
    fn send_bytes(&mut self, bytes: &[u8]) {
        self.lines.push(String::from_utf8_lossy(bytes).into_owned());
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, options: &SessionOptions) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(options)?;
        Ok(logger)
    }

    fn write_header(&mut self, options: &SessionOptions) -> io::Result<()> {
        writeln!(self.writer, "# Sensor node emulator transcript")?;
        writeln!(
            self.writer,
            "# policy={:?} format={:?} blink={:?} seconds={}",
            options.policy, options.format, options.blink, options.seconds
        )?;
        writeln!(self.writer, "# Timestamps are virtual milliseconds since reset")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, millis: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{millis:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Radio,
    Telemetry,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Radio => "TX >",
            TranscriptRole::Telemetry => "LOG ",
        }
    }
}
