use core::time::Duration;

use node_core::acquisition::{
    AcquisitionConfig, AnalogFrontEnd, ChannelConfig, ConversionSlot, Quantity, RawSample,
    Reference,
};
use node_core::config::{BlinkPattern, NodeConfig};
use node_core::node::{NodeScheduler, SensorNode, StatusLed, register_activities};
use node_core::report::{ReportFormat, Transport};
use node_core::scheduler::{ScheduleError, TickCounter};
use node_core::telemetry::{TelemetryEventKind, TelemetryPayload};

/// Converter that completes every conversion on the first wake-up.
struct FixedAdc {
    slot: ConversionSlot,
    inputs: [RawSample; 2],
    channel: usize,
    settling: bool,
    pending: Option<RawSample>,
}

impl FixedAdc {
    fn new(battery: RawSample, light: RawSample) -> Self {
        Self {
            slot: ConversionSlot::new(),
            inputs: [battery, light],
            channel: 0,
            settling: false,
            pending: None,
        }
    }
}

impl AnalogFrontEnd for FixedAdc {
    fn select(&mut self, channel: u8, _reference: Reference) {
        self.channel = usize::from(channel);
        self.settling = true;
    }

    fn start_conversion(&mut self) {
        let value = if self.settling { 0 } else { self.inputs[self.channel] };
        self.settling = false;
        self.pending = Some(value);
    }

    fn conversion_complete(&mut self) -> bool {
        true
    }

    fn read_result(&mut self) -> RawSample {
        self.pending.take().unwrap_or_default()
    }

    fn set_completion_interrupt(&mut self, _enabled: bool) {}

    fn wait_for_interrupt(&mut self) {
        if let Some(value) = self.pending.take() {
            self.slot.complete(value);
        }
    }

    fn completion_slot(&self) -> &ConversionSlot {
        &self.slot
    }
}

#[derive(Default)]
struct RecordingLed {
    levels: Vec<bool>,
}

impl StatusLed for RecordingLed {
    fn set(&mut self, lit: bool) {
        self.levels.push(lit);
    }
}

#[derive(Default)]
struct CaptureTransport {
    lines: Vec<String>,
}

impl Transport for CaptureTransport {
    fn send_bytes(&mut self, bytes: &[u8]) {
        self.lines
            .push(String::from_utf8(bytes.to_vec()).expect("reports are ascii"));
    }
}

type Node = SensorNode<FixedAdc, RecordingLed, CaptureTransport>;
type Scheduler<'a, const N: usize> =
    NodeScheduler<&'a TickCounter, FixedAdc, RecordingLed, CaptureTransport, N>;

fn node(config: &NodeConfig) -> Node {
    SensorNode::new(
        FixedAdc::new(512, 256),
        RecordingLed::default(),
        CaptureTransport::default(),
        config,
    )
}

fn run<const N: usize>(scheduler: &mut Scheduler<'_, N>, node: &mut Node, clock: &TickCounter, ticks: u32) {
    for _ in 0..ticks {
        clock.tick();
        scheduler.dispatch_due(node);
    }
}

#[test]
fn two_seconds_of_operation_produce_two_reports() {
    let config = NodeConfig::default();
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");
    assert_eq!(scheduler.len(), 3);

    run(&mut scheduler, &mut node, &clock, 16_000);

    assert_eq!(node.transport().lines, ["h 25.00 2.20 ", "h 25.00 2.20 "]);
    // Initial switch-off, then one toggle per second.
    assert_eq!(node.led().levels, [false, true, false]);

    let readings = node
        .telemetry()
        .oldest_first()
        .filter(|record| matches!(record.event, TelemetryEventKind::ReadingComplete(_)))
        .count();
    assert_eq!(readings, 4);
}

#[test]
fn report_before_first_reading_carries_zeroes() {
    let config = NodeConfig::default().with_report_period(Duration::from_millis(100));
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 800);

    assert_eq!(node.transport().lines, ["h 0.00 0.00 "]);
}

#[test]
fn led_update_precedes_acquisition_and_report_on_shared_tick() {
    let config = NodeConfig::default();
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 8_000);

    let events: Vec<TelemetryEventKind> = node
        .telemetry()
        .records_since(0)
        .filter(|record| record.tick == 8_000)
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        [
            TelemetryEventKind::LedChanged,
            TelemetryEventKind::ReadingComplete(Quantity::Light),
            TelemetryEventKind::ReportSent,
        ]
    );
}

#[test]
fn verbose_reports_use_whole_percent() {
    let config = NodeConfig::default().with_report_format(ReportFormat::Verbose);
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 8_000);

    assert_eq!(node.transport().lines, ["Light: 25% Battery: 2.20v \r\n"]);
}

#[test]
fn pulse_pattern_switches_led_off_after_on_time() {
    let config = NodeConfig::default().with_blink(BlinkPattern::Pulse {
        period: Duration::from_secs(1),
        on_time: Duration::from_millis(100),
    });
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 8_000);
    assert!(node.led_lit());
    assert_eq!(scheduler.len(), 4);

    run(&mut scheduler, &mut node, &clock, 799);
    assert!(node.led_lit());

    run(&mut scheduler, &mut node, &clock, 1);
    assert!(!node.led_lit());
    assert_eq!(scheduler.len(), 3);

    run(&mut scheduler, &mut node, &clock, 7_200);
    assert_eq!(node.led().levels, [false, true, false, true]);
}

#[test]
fn pulse_without_free_slot_turns_led_off_and_records_rejection() {
    let config = NodeConfig::default().with_blink(BlinkPattern::Pulse {
        period: Duration::from_secs(1),
        on_time: Duration::from_millis(100),
    });
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<3>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 8_000);

    assert!(!node.led_lit());
    assert_eq!(node.led().levels, [false, true, false]);
    let rejection = node
        .telemetry()
        .oldest_first()
        .find(|record| record.event == TelemetryEventKind::ActivityRejected)
        .expect("rejection recorded");
    assert_eq!(
        rejection.details,
        TelemetryPayload::Schedule(ScheduleError::TableFull)
    );
}

#[test]
fn pulse_longer_than_period_is_cut_short_of_next_pulse() {
    let config = NodeConfig::default().with_blink(BlinkPattern::Pulse {
        period: Duration::from_secs(1),
        on_time: Duration::from_secs(3),
    });
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<4>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");
    assert_eq!(scheduler.activities()[0].state(), 999);

    let mut busiest = scheduler.len();
    for _ in 0..24_000 {
        clock.tick();
        scheduler.dispatch_due(&mut node);
        busiest = busiest.max(scheduler.len());
    }

    assert_eq!(busiest, 4);
    assert_eq!(node.led().levels, [false, true, false, true, false, true]);
    assert!(
        node.telemetry()
            .oldest_first()
            .all(|record| record.event != TelemetryEventKind::ActivityRejected)
    );
}

#[test]
fn registration_reports_capacity_exhaustion() {
    let config = NodeConfig::default();
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<2>::new(&clock);

    assert_eq!(
        register_activities(&mut scheduler, &config),
        Err(ScheduleError::TableFull)
    );
    assert_eq!(scheduler.len(), 2);
}

#[test]
fn oversized_report_is_dropped_and_recorded() {
    let acquisition = AcquisitionConfig::new()
        .with_full_scale(1.0)
        .with_light(ChannelConfig::new(1, Reference::External, 1.0e36));
    let config = NodeConfig::default()
        .with_acquisition(acquisition)
        .with_report_format(ReportFormat::Verbose);
    let clock = TickCounter::new();
    let mut scheduler = Scheduler::<8>::new(&clock);
    let mut node = node(&config);
    register_activities(&mut scheduler, &config).expect("registration");

    run(&mut scheduler, &mut node, &clock, 8_000);

    assert!(node.transport().lines.is_empty());
    assert_eq!(
        node.telemetry().latest().map(|record| record.event),
        Some(TelemetryEventKind::ReportDropped)
    );
}
