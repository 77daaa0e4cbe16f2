//! Forwards node telemetry to the log.
//!
//! The node records events into its ring while activities run; the main loop
//! calls [`TelemetryDrain::flush`] after each dispatch pass so logging never
//! happens inside an activity. On the device records go out over defmt/RTT,
//! on the host build they are printed to stdout.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use node_core::scheduler::Tick;
use node_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord, TelemetryRecorder};

/// Result of one [`TelemetryDrain::flush`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DrainSummary {
    pub emitted: usize,
    /// Records overwritten in the ring before they could be logged.
    pub missed: u32,
}

/// Cursor over a [`TelemetryRecorder`] that remembers what was already logged.
pub struct TelemetryDrain {
    cursor: EventId,
    tick_rate_hz: u32,
}

impl TelemetryDrain {
    pub const fn new(tick_rate_hz: u32) -> Self {
        Self {
            cursor: 0,
            tick_rate_hz,
        }
    }

    /// Logs every record added since the previous call.
    pub fn flush<const CAPACITY: usize>(
        &mut self,
        recorder: &TelemetryRecorder<CAPACITY>,
    ) -> DrainSummary {
        let mut summary = DrainSummary::default();

        for record in recorder.records_since(self.cursor) {
            if summary.emitted == 0 {
                summary.missed = record.id.wrapping_sub(self.cursor);
                if summary.missed > 0 {
                    emit_missed(summary.missed);
                }
            }
            emit_record(record, ticks_to_millis(record.tick, self.tick_rate_hz));
            summary.emitted += 1;
        }

        self.cursor = recorder.next_id();
        summary
    }
}

fn ticks_to_millis(tick: Tick, tick_rate_hz: u32) -> u32 {
    if tick_rate_hz == 0 {
        return 0;
    }
    let millis = u64::from(tick) * 1_000 / u64::from(tick_rate_hz);
    u32::try_from(millis).unwrap_or(u32::MAX)
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord, millis: u32) {
    use defmt::Display2Format;

    if record.details == TelemetryPayload::None {
        defmt::info!(
            "telemetry #{=u32} t={=u32}ms {}",
            record.id,
            millis,
            Display2Format(&record.event)
        );
    } else {
        defmt::info!(
            "telemetry #{=u32} t={=u32}ms {} {}",
            record.id,
            millis,
            Display2Format(&record.event),
            Display2Format(&record.details)
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord, millis: u32) {
    if record.details == TelemetryPayload::None {
        println!("telemetry #{} t={}ms {}", record.id, millis, record.event);
    } else {
        println!(
            "telemetry #{} t={}ms {} {}",
            record.id, millis, record.event, record.details
        );
    }
}

#[cfg(target_os = "none")]
fn emit_missed(count: u32) {
    defmt::warn!("telemetry: {=u32} records overwritten before drain", count);
}

#[cfg(not(target_os = "none"))]
fn emit_missed(count: u32) {
    println!("telemetry: {count} records overwritten before drain");
}
