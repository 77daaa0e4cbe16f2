//! Tick counter and time base shared between the timer interrupt and the main loop.
//!
//! The timer interrupt is the only writer of [`TickCounter`]; every other
//! context only reads it. The counter wraps silently at `u32::MAX`, so all
//! comparisons between ticks go through [`is_due`], which interprets the
//! modular difference as a signed distance.

use core::time::Duration;

use portable_atomic::{AtomicU32, Ordering};

/// Absolute tick count, modulo 2^32.
pub type Tick = u32;

/// Largest forward distance that still counts as "in the future".
const HALF_RANGE: u32 = 1 << 31;

/// Longest period, in ticks, that [`is_due`] can tell apart from a missed deadline.
pub const MAX_PERIOD_TICKS: u32 = HALF_RANGE - 1;

/// Counter advanced once per hardware timer interrupt.
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    /// Creates a counter starting at tick zero.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter starting at an arbitrary tick.
    #[must_use]
    pub const fn starting_at(tick: Tick) -> Self {
        Self {
            ticks: AtomicU32::new(tick),
        }
    }

    /// Advances the counter by exactly one tick.
    ///
    /// Safe to call from interrupt context; it never runs scheduled work.
    #[inline]
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current tick count.
    #[inline]
    pub fn now(&self) -> Tick {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to a monotonically increasing tick count.
pub trait TickSource {
    /// Returns the current tick count.
    fn now(&self) -> Tick;
}

impl TickSource for TickCounter {
    fn now(&self) -> Tick {
        TickCounter::now(self)
    }
}

impl<T> TickSource for &T
where
    T: TickSource + ?Sized,
{
    fn now(&self) -> Tick {
        (**self).now()
    }
}

/// Returns `true` once `now` has reached or passed `deadline`.
#[inline]
#[must_use]
pub const fn is_due(deadline: Tick, now: Tick) -> bool {
    now.wrapping_sub(deadline) < HALF_RANGE
}

/// Conversion between real-time periods and scheduler ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeBase {
    ticks_per_second: u32,
}

impl TimeBase {
    /// Creates a time base for a tick source running at `ticks_per_second`.
    #[must_use]
    pub const fn per_second(ticks_per_second: u32) -> Self {
        Self { ticks_per_second }
    }

    /// Returns the configured tick rate.
    #[must_use]
    pub const fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Converts a period into whole ticks, truncating any fraction.
    #[must_use]
    pub fn ticks_for(&self, period: Duration) -> u32 {
        let ticks = period.as_micros() * u128::from(self.ticks_per_second) / 1_000_000;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}
