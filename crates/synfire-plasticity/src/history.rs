//! Bounded activity histories.
//!
//! Plasticity decisions look backwards over bounded windows: firing
//! instants for rate estimation, per-source input samples for scaling.
//! Both buffers are bounded by count and pruned lazily by age, so memory
//! stays flat under arbitrary stimulation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Monotonically non-decreasing firing instants, bounded by count and window.
#[derive(Debug, Clone)]
pub struct FiringHistory {
    times: VecDeque<Instant>,
    window: Duration,
    cap: usize,
}

impl FiringHistory {
    pub fn new(window: Duration, cap: usize) -> Self {
        Self {
            times: VecDeque::new(),
            window,
            cap,
        }
    }

    /// Append a firing instant.
    ///
    /// Entries must be non-decreasing; an out-of-order instant is clamped
    /// to the latest recorded one so the sequence invariant holds even if
    /// the caller's clock reads race.
    pub fn record(&mut self, at: Instant) {
        let at = match self.times.back() {
            Some(&last) if at < last => last,
            _ => at,
        };
        self.times.push_back(at);
        while self.times.len() > self.cap {
            self.times.pop_front();
        }
    }

    /// Drop entries older than the window
    pub fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.times.front() {
            if now.duration_since(front) > self.window {
                self.times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Firing rate in Hz over the window ending at `now`
    pub fn rate(&self, now: Instant) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        let count = self
            .times
            .iter()
            .rev()
            .take_while(|&&t| now.duration_since(t) <= self.window)
            .count();
        count as f64 / secs
    }

    /// Most recent firing instant
    pub fn last(&self) -> Option<Instant> {
        self.times.back().copied()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instant> {
        self.times.iter()
    }
}

/// Bounded (value, instant) samples for one input source.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<(f64, Instant)>,
    cap: usize,
}

impl SampleHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            cap,
        }
    }

    /// Append a sample, evicting the oldest past the cap
    pub fn record(&mut self, value: f64, at: Instant) {
        self.samples.push_back((value, at));
        while self.samples.len() > self.cap {
            self.samples.pop_front();
        }
    }

    /// Mean of samples no older than `window` before `now`
    pub fn recent_mean(&self, window: Duration, now: Instant) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &(value, at) in self.samples.iter().rev() {
            if now.duration_since(at) > window {
                break;
            }
            sum += value;
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Drop samples older than `window` before `now`
    pub fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(&(_, at)) = self.samples.front() {
            if now.duration_since(at) > window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Instant of the newest sample
    pub fn last_instant(&self) -> Option<Instant> {
        self.samples.back().map(|&(_, at)| at)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
