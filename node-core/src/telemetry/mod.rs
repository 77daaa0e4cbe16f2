//! Telemetry event catalog and the in-memory ring shared by firmware and host targets.
//!
//! `node-core` never logs directly. Activities append [`TelemetryRecord`]s to a
//! [`TelemetryRecorder`] and the owning target drains them with
//! [`TelemetryRecorder::records_since`] after each dispatch pass, forwarding
//! them to defmt on the device or to the console in the emulator.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::acquisition::Quantity;
use crate::scheduler::{ScheduleError, Tick};

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Sequence number assigned to each record, wrapping at `u32::MAX`.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// An acquisition step produced a scaled reading.
    ReadingComplete(Quantity),
    ReportSent,
    /// The report did not fit the buffer and was dropped.
    ReportDropped,
    LedChanged,
    /// A registration was refused by the scheduler.
    ActivityRejected,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ReadingComplete(quantity) => {
                write!(f, "reading-complete {}", quantity.label())
            }
            TelemetryEventKind::ReportSent => f.write_str("report-sent"),
            TelemetryEventKind::ReportDropped => f.write_str("report-dropped"),
            TelemetryEventKind::LedChanged => f.write_str("led-changed"),
            TelemetryEventKind::ActivityRejected => f.write_str("activity-rejected"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    Reading(ReadingTelemetry),
    /// Number of bytes handed to the transport.
    Report(u8),
    /// New LED level, `true` when lit.
    Led(bool),
    Schedule(ScheduleError),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Reading(reading) => {
                write!(f, "raw={:.1} value={:.2}", reading.raw_average, reading.value)
            }
            TelemetryPayload::Report(bytes) => write!(f, "bytes={bytes}"),
            TelemetryPayload::Led(lit) => f.write_str(if *lit { "on" } else { "off" }),
            TelemetryPayload::Schedule(error) => write!(f, "{error}"),
        }
    }
}

/// Summary of one completed acquisition step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadingTelemetry {
    pub raw_average: f32,
    pub value: f32,
}

impl ReadingTelemetry {
    #[must_use]
    pub const fn new(raw_average: f32, value: f32) -> Self {
        Self { raw_average, value }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub tick: Tick,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
///
/// Once the ring is full the oldest record is overwritten; readers that fall
/// behind simply miss those entries.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the retained records whose id is at or after `cursor`.
    ///
    /// Pass [`TelemetryRecorder::next_id`] from the previous drain to receive
    /// only new records.
    pub fn records_since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(cursor) < EventId::MAX / 2)
    }

    /// Returns the id the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        tick: Tick,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            tick,
            event,
            details: payload,
        });

        id
    }

    /// Records a completed acquisition step.
    pub fn record_reading(
        &mut self,
        quantity: Quantity,
        raw_average: f32,
        value: f32,
        tick: Tick,
    ) -> EventId {
        self.record(
            TelemetryEventKind::ReadingComplete(quantity),
            TelemetryPayload::Reading(ReadingTelemetry::new(raw_average, value)),
            tick,
        )
    }

    /// Records a report handed to the transport.
    pub fn record_report(&mut self, bytes: usize, tick: Tick) -> EventId {
        self.record(
            TelemetryEventKind::ReportSent,
            TelemetryPayload::Report(truncate_len(bytes)),
            tick,
        )
    }

    /// Records a scheduler registration failure.
    pub fn record_rejection(&mut self, error: ScheduleError, tick: Tick) -> EventId {
        self.record(
            TelemetryEventKind::ActivityRejected,
            TelemetryPayload::Schedule(error),
            tick,
        )
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_len(len: usize) -> u8 {
    match u8::try_from(len) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_carry_sequential_ids_and_ticks() {
        let mut recorder = TelemetryRecorder::<4>::new();

        let first = recorder.record_reading(Quantity::Battery, 512.0, 2.2, 2_000);
        let second = recorder.record_report(13, 8_000);
        assert_eq!((first, second), (0, 1));

        let latest = recorder.latest().copied().unwrap();
        assert_eq!(latest.event, TelemetryEventKind::ReportSent);
        assert_eq!(latest.tick, 8_000);
        assert_eq!(latest.details, TelemetryPayload::Report(13));
    }

    #[test]
    fn report_length_saturates() {
        let mut recorder = TelemetryRecorder::<4>::new();
        recorder.record_report(300, 0);
        assert_eq!(
            recorder.latest().map(|record| record.details),
            Some(TelemetryPayload::Report(u8::MAX))
        );
    }

    #[test]
    fn records_since_skips_drained_entries() {
        let mut recorder = TelemetryRecorder::<4>::new();
        recorder.record(TelemetryEventKind::LedChanged, TelemetryPayload::Led(true), 1);
        let cursor = recorder.next_id();
        recorder.record(TelemetryEventKind::LedChanged, TelemetryPayload::Led(false), 2);
        recorder.record_rejection(ScheduleError::TableFull, 3);

        let ticks: heapless::Vec<Tick, 4> = recorder
            .records_since(cursor)
            .map(|record| record.tick)
            .collect();
        assert_eq!(ticks.as_slice(), &[2, 3]);
        assert_eq!(recorder.records_since(recorder.next_id()).count(), 0);
    }

    #[test]
    fn ring_overwrites_oldest_records() {
        let mut recorder = TelemetryRecorder::<2>::new();
        for tick in 0..5 {
            recorder.record(TelemetryEventKind::ReportSent, TelemetryPayload::none(), tick);
        }

        assert_eq!(recorder.len(), 2);
        let ids: heapless::Vec<EventId, 2> =
            recorder.records_since(0).map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[3, 4]);
    }

    #[test]
    fn records_since_handles_id_wrap() {
        let mut recorder = TelemetryRecorder::<4> {
            ring: HistoryBuf::new(),
            next_event_id: EventId::MAX - 1,
        };
        let cursor = recorder.next_id();
        for tick in 0..3 {
            recorder.record(TelemetryEventKind::LedChanged, TelemetryPayload::none(), tick);
        }

        let ids: heapless::Vec<EventId, 4> =
            recorder.records_since(cursor).map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[EventId::MAX - 1, EventId::MAX, 0]);
    }
}
