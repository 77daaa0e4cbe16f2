//! Tick-driven cooperative event scheduler.
//!
//! A single hardware timer interrupt advances a [`TickCounter`]; nothing else
//! happens in interrupt context. The main loop calls
//! [`EventScheduler::dispatch_due`], which runs every activity whose deadline
//! has been reached, high-priority activities first and then in registration
//! order. Activities are plain function pointers that receive the shared node
//! context, the scheduler itself (so they can register follow-up work) and the
//! opaque state token supplied at registration.

use core::{fmt, time::Duration};

use heapless::Vec;

pub mod tick;

pub use tick::{MAX_PERIOD_TICKS, Tick, TickCounter, TickSource, TimeBase, is_due};

/// Default capacity of the activity table.
pub const MAX_ACTIVITIES: usize = 8;

/// Opaque token handed back to an activity every time it runs.
pub type EventState = u32;

/// Callback invoked when an activity becomes due.
pub type Action<T, C, const N: usize> = fn(&mut C, &mut EventScheduler<T, C, N>, EventState);

/// Dispatch class of an activity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PriorityClass {
    /// Dispatched before any due [`PriorityClass::Normal`] activity.
    High,
    Normal,
}

/// Whether an activity recurs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActivityKind {
    Periodic,
    /// Removed from the table immediately before its action runs.
    OneShot,
}

/// Errors reported when registering an activity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScheduleError {
    /// The activity table has no free slot; existing entries are untouched.
    TableFull,
    /// [`EventScheduler::set_time_base`] has not been called yet.
    TimeBaseUnset,
    /// The period exceeds [`MAX_PERIOD_TICKS`] at the configured tick rate.
    PeriodTooLong,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::TableFull => f.write_str("activity table full"),
            ScheduleError::TimeBaseUnset => f.write_str("time base not configured"),
            ScheduleError::PeriodTooLong => f.write_str("period exceeds half the tick range"),
        }
    }
}

/// Entry stored in the scheduler table.
pub struct ScheduledActivity<T, C, const N: usize> {
    action: Action<T, C, N>,
    state: EventState,
    period_ticks: u32,
    next_fire_tick: Tick,
    priority: PriorityClass,
    kind: ActivityKind,
}

impl<T, C, const N: usize> ScheduledActivity<T, C, N> {
    /// Returns the state token passed to the action.
    #[must_use]
    pub const fn state(&self) -> EventState {
        self.state
    }

    /// Returns the number of ticks between firings.
    #[must_use]
    pub const fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    /// Returns the tick at which the activity next becomes due.
    #[must_use]
    pub const fn next_fire_tick(&self) -> Tick {
        self.next_fire_tick
    }

    /// Returns the dispatch class.
    #[must_use]
    pub const fn priority(&self) -> PriorityClass {
        self.priority
    }

    /// Returns whether the activity recurs.
    #[must_use]
    pub const fn kind(&self) -> ActivityKind {
        self.kind
    }
}

impl<T, C, const N: usize> Clone for ScheduledActivity<T, C, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, C, const N: usize> Copy for ScheduledActivity<T, C, N> {}

impl<T, C, const N: usize> fmt::Debug for ScheduledActivity<T, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledActivity")
            .field("state", &self.state)
            .field("period_ticks", &self.period_ticks)
            .field("next_fire_tick", &self.next_fire_tick)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity table of scheduled activities driven by a tick source.
pub struct EventScheduler<T, C, const N: usize = MAX_ACTIVITIES> {
    clock: T,
    time_base: Option<TimeBase>,
    table: Vec<ScheduledActivity<T, C, N>, N>,
}

impl<T, C, const N: usize> EventScheduler<T, C, N>
where
    T: TickSource,
{
    /// Creates an empty scheduler reading ticks from `clock`.
    #[must_use]
    pub const fn new(clock: T) -> Self {
        Self {
            clock,
            time_base: None,
            table: Vec::new(),
        }
    }

    /// Configures how real-time periods map onto ticks.
    pub fn set_time_base(&mut self, ticks_per_second: u32) {
        self.time_base = Some(TimeBase::per_second(ticks_per_second));
    }

    /// Returns the configured time base, if any.
    #[must_use]
    pub const fn time_base(&self) -> Option<TimeBase> {
        self.time_base
    }

    /// Returns the current tick count of the underlying clock.
    #[must_use]
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Registers a normal-priority periodic activity.
    ///
    /// # Errors
    ///
    /// Fails when the table is full, no time base has been configured or the
    /// period is longer than [`MAX_PERIOD_TICKS`].
    pub fn register_event(
        &mut self,
        action: Action<T, C, N>,
        period: Duration,
        state: EventState,
    ) -> Result<(), ScheduleError> {
        self.insert(action, period, state, PriorityClass::Normal, ActivityKind::Periodic)
    }

    /// Registers a high-priority periodic activity.
    ///
    /// # Errors
    ///
    /// Fails when the table is full, no time base has been configured or the
    /// period is longer than [`MAX_PERIOD_TICKS`].
    pub fn register_high_priority_event(
        &mut self,
        action: Action<T, C, N>,
        period: Duration,
        state: EventState,
    ) -> Result<(), ScheduleError> {
        self.insert(action, period, state, PriorityClass::High, ActivityKind::Periodic)
    }

    /// Registers an activity that fires once after `period`.
    ///
    /// # Errors
    ///
    /// Fails when the table is full, no time base has been configured or the
    /// period is longer than [`MAX_PERIOD_TICKS`].
    pub fn register_one_shot(
        &mut self,
        action: Action<T, C, N>,
        period: Duration,
        state: EventState,
    ) -> Result<(), ScheduleError> {
        self.insert(action, period, state, PriorityClass::Normal, ActivityKind::OneShot)
    }

    fn insert(
        &mut self,
        action: Action<T, C, N>,
        period: Duration,
        state: EventState,
        priority: PriorityClass,
        kind: ActivityKind,
    ) -> Result<(), ScheduleError> {
        let time_base = self.time_base.ok_or(ScheduleError::TimeBaseUnset)?;
        if self.table.is_full() {
            return Err(ScheduleError::TableFull);
        }

        // A zero-tick period would make a self-registering one-shot due
        // within the same dispatch pass.
        let period_ticks = time_base.ticks_for(period).max(1);
        if period_ticks > MAX_PERIOD_TICKS {
            return Err(ScheduleError::PeriodTooLong);
        }
        let next_fire_tick = self.clock.now().wrapping_add(period_ticks);

        self.table
            .push(ScheduledActivity {
                action,
                state,
                period_ticks,
                next_fire_tick,
                priority,
                kind,
            })
            .map_err(|_| ScheduleError::TableFull)
    }

    /// Runs every due activity and returns how many firings took place.
    ///
    /// The tick count is sampled once on entry. A periodic activity that is
    /// several periods behind fires once per elapsed period within this call.
    pub fn dispatch_due(&mut self, ctx: &mut C) -> usize {
        let now = self.clock.now();
        let mut fired = 0;

        while let Some(index) = self.next_due(now) {
            let entry = self.table[index];
            match entry.kind {
                ActivityKind::OneShot => {
                    self.table.remove(index);
                }
                ActivityKind::Periodic => {
                    self.table[index].next_fire_tick =
                        entry.next_fire_tick.wrapping_add(entry.period_ticks);
                }
            }

            (entry.action)(ctx, self, entry.state);
            fired += 1;
        }

        fired
    }

    fn next_due(&self, now: Tick) -> Option<usize> {
        [PriorityClass::High, PriorityClass::Normal]
            .into_iter()
            .find_map(|class| {
                self.table
                    .iter()
                    .position(|entry| entry.priority == class && is_due(entry.next_fire_tick, now))
            })
    }

    /// Provides read-only access to the table in registration order.
    #[must_use]
    pub fn activities(&self) -> &[ScheduledActivity<T, C, N>] {
        &self.table
    }

    /// Returns the number of registered activities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` when no activities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the maximum number of activities.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}
