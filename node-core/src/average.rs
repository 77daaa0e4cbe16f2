//! Fixed-window moving average over scaled readings.

use heapless::HistoryBuf;

/// Window length used for the reported battery and light values.
pub const DEFAULT_WINDOW: usize = 4;

/// Moving average of the last `K` samples backed by a ring buffer and a running sum.
///
/// Slots that have never been written do not contribute: until the window
/// fills, the average is taken over the samples seen so far.
pub struct RunningAverage<const K: usize = DEFAULT_WINDOW> {
    window: HistoryBuf<f32, K>,
    sum: f32,
    writes: usize,
}

impl<const K: usize> RunningAverage<K> {
    /// Creates an empty average.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: HistoryBuf::new(),
            sum: 0.0,
            writes: 0,
        }
    }

    /// Adds a sample, evicting the oldest one once the window is full.
    pub fn push(&mut self, value: f32) {
        if self.window.len() == self.window.capacity() {
            if let Some(oldest) = self.window.oldest_ordered().next() {
                self.sum -= *oldest;
            }
        }

        self.window.write(value);
        self.sum += value;
        self.writes = (self.writes + 1) % K;

        // Rebuild the sum whenever the cursor wraps so rounding error cannot accumulate.
        if self.writes == 0 {
            self.sum = self.window.as_slice().iter().sum();
        }
    }

    /// Returns the mean of the retained samples, or `None` before the first sample.
    #[must_use]
    pub fn average(&self) -> Option<f32> {
        let len = self.window.len();
        if len == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            let divisor = len as f32;
            Some(self.sum / divisor)
        }
    }

    /// Returns the sum of the retained samples.
    #[must_use]
    pub const fn sum(&self) -> f32 {
        self.sum
    }

    /// Returns the most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<f32> {
        self.window.recent().copied()
    }

    /// Returns the number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns `true` before the first sample is pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Returns the window length.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        K
    }
}

impl<const K: usize> Default for RunningAverage<K> {
    fn default() -> Self {
        Self::new()
    }
}
