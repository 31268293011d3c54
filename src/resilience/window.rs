//! Rolling statistics backing the admission decisions.
//!
//! `RollingWindow` keeps bucketed outcome counters for the circuit-breaking
//! ratios. `RateWindow` keeps the admission timestamps of the trailing
//! second for the QPS check.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Number of slots a rolling window is divided into.
const SLOT_COUNT: usize = 10;

/// Trailing period the QPS limit applies to.
const RATE_PERIOD: Duration = Duration::from_secs(1);

/// Aggregated counts over a rolling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub total: u64,
    pub errors: u64,
    pub slow: u64,
}

impl WindowCounts {
    pub fn error_ratio(&self) -> f64 {
        ratio(self.errors, self.total)
    }

    pub fn slow_ratio(&self) -> f64 {
        ratio(self.slow, self.total)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    epoch: u64,
    counts: WindowCounts,
}

/// Outcome counters over a fixed window, split into `SLOT_COUNT` slots.
#[derive(Debug)]
pub struct RollingWindow {
    origin: Instant,
    slot_len: Duration,
    slots: Vec<Slot>,
}

impl RollingWindow {
    pub fn new(window: Duration) -> Self {
        let slot_len = (window / SLOT_COUNT as u32).max(Duration::from_millis(1));
        Self {
            origin: Instant::now(),
            slot_len,
            slots: vec![Slot::default(); SLOT_COUNT],
        }
    }

    fn epoch(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin);
        (elapsed.as_nanos() / self.slot_len.as_nanos()) as u64
    }

    /// Count one finished call.
    pub fn record(&mut self, now: Instant, error: bool, slow: bool) {
        let epoch = self.epoch(now);
        let slot = &mut self.slots[(epoch % SLOT_COUNT as u64) as usize];
        if slot.epoch != epoch {
            *slot = Slot {
                epoch,
                counts: WindowCounts::default(),
            };
        }
        slot.counts.total += 1;
        slot.counts.errors += u64::from(error);
        slot.counts.slow += u64::from(slow);
    }

    /// Sum of the slots that still fall inside the window.
    pub fn counts(&self, now: Instant) -> WindowCounts {
        let current = self.epoch(now);
        self.slots
            .iter()
            .filter(|slot| slot.counts.total > 0 && current.saturating_sub(slot.epoch) < SLOT_COUNT as u64)
            .fold(WindowCounts::default(), |acc, slot| WindowCounts {
                total: acc.total + slot.counts.total,
                errors: acc.errors + slot.counts.errors,
                slow: acc.slow + slot.counts.slow,
            })
    }

    pub fn reset(&mut self) {
        self.slots.fill(Slot::default());
    }
}

/// Admission timestamps over the trailing second.
///
/// Only admitted calls are pushed, and only while below the limit, so the
/// queue never holds more than `qps_limit` entries.
#[derive(Debug, Default)]
pub struct RateWindow {
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    /// Calls admitted during the trailing second.
    pub fn count(&mut self, now: Instant) -> usize {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= RATE_PERIOD {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
        self.admitted.len()
    }

    pub fn push(&mut self, now: Instant) {
        self.admitted.push_back(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window_counts() {
        let mut window = RollingWindow::new(Duration::from_secs(1));
        let now = Instant::now();
        window.record(now, false, false);
        window.record(now, true, false);
        window.record(now, true, true);

        let counts = window.counts(now);
        assert_eq!(counts, WindowCounts { total: 3, errors: 2, slow: 1 });
        assert!((counts.error_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rolling_window_expires_old_slots() {
        let mut window = RollingWindow::new(Duration::from_secs(1));
        let start = Instant::now();
        window.record(start, true, false);

        let later = start + Duration::from_millis(1500);
        assert_eq!(window.counts(later).total, 0);

        window.record(later, false, false);
        assert_eq!(window.counts(later), WindowCounts { total: 1, errors: 0, slow: 0 });
    }

    #[test]
    fn test_rolling_window_reset() {
        let mut window = RollingWindow::new(Duration::from_secs(1));
        let now = Instant::now();
        window.record(now, true, true);
        window.reset();
        assert_eq!(window.counts(now).total, 0);
    }

    #[test]
    fn test_rate_window_evicts_after_one_second() {
        let mut rate = RateWindow::default();
        let start = Instant::now();
        rate.push(start);
        rate.push(start + Duration::from_millis(400));

        assert_eq!(rate.count(start + Duration::from_millis(500)), 2);
        assert_eq!(rate.count(start + Duration::from_millis(1000)), 1);
        assert_eq!(rate.count(start + Duration::from_millis(1400)), 0);
    }
}
