//! Wall-clock timing of the pipeline phases

use std::fmt::Write;
use std::time::{Duration, Instant};

use crate::config::TimerMode;

/// Pipeline phase of a timestep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Repartition,
    Insertion,
    Migration,
    GhostExchange,
    BroadSearch,
    FineSearch,
    ContactForces,
    Integration,
    Output,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::Repartition,
        Phase::Insertion,
        Phase::Migration,
        Phase::GhostExchange,
        Phase::BroadSearch,
        Phase::FineSearch,
        Phase::ContactForces,
        Phase::Integration,
        Phase::Output,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Phase::Repartition => "repartition",
            Phase::Insertion => "insertion",
            Phase::Migration => "sort and migrate",
            Phase::GhostExchange => "ghost exchange",
            Phase::BroadSearch => "broad search",
            Phase::FineSearch => "fine search",
            Phase::ContactForces => "contact forces",
            Phase::Integration => "integration",
            Phase::Output => "output",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated time and call count per phase
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    mode: TimerMode,
    totals: [Duration; 9],
    calls: [u64; 9],
    started: Instant,
}

impl PhaseTimer {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            mode,
            totals: [Duration::ZERO; 9],
            calls: [0; 9],
            started: Instant::now(),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Run `f` and charge its duration to `phase`
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        if self.mode == TimerMode::None {
            return f();
        }
        let start = Instant::now();
        let result = f();
        self.record(phase, start.elapsed());
        result
    }

    pub fn record(&mut self, phase: Phase, duration: Duration) {
        self.totals[phase.index()] += duration;
        self.calls[phase.index()] += 1;
    }

    pub fn total(&self, phase: Phase) -> Duration {
        self.totals[phase.index()]
    }

    pub fn calls(&self, phase: Phase) -> u64 {
        self.calls[phase.index()]
    }

    /// Table of the phases that ran, with their share of the timed total
    pub fn report(&self) -> String {
        let timed: Duration = self.totals.iter().sum();
        let mut out = String::new();
        let _ = writeln!(out, "=== Phase timings ({:.3}s wall) ===", self.started.elapsed().as_secs_f64());
        for phase in Phase::ALL {
            let calls = self.calls(phase);
            if calls == 0 {
                continue;
            }
            let total = self.total(phase);
            let share = if timed.is_zero() {
                0.0
            } else {
                100.0 * total.as_secs_f64() / timed.as_secs_f64()
            };
            let _ = writeln!(
                out,
                "  {:<17} {:>9} calls {:>10.4}s {:>6.2}%",
                phase.label(),
                calls,
                total.as_secs_f64(),
                share
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_charges_phase() {
        let mut timer = PhaseTimer::new(TimerMode::End);
        let value = timer.time(Phase::BroadSearch, || 21 * 2);
        assert_eq!(value, 42);
        timer.record(Phase::BroadSearch, Duration::from_millis(5));
        assert_eq!(timer.calls(Phase::BroadSearch), 2);
        assert!(timer.total(Phase::BroadSearch) >= Duration::from_millis(5));
        assert!(timer.report().contains("broad search"));
        assert!(!timer.report().contains("integration"));
    }

    #[test]
    fn test_disabled_timer_records_nothing() {
        let mut timer = PhaseTimer::new(TimerMode::None);
        timer.time(Phase::Integration, || ());
        assert_eq!(timer.calls(Phase::Integration), 0);
    }
}
