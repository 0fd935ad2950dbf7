//! Simulation control: step counter, clock and termination

use crate::config::SimulationControlParameters;

/// Source of the step number, time, timestep and termination predicate
pub trait SimulationControl: Send {
    /// Advance to the next step; `false` once the run is complete
    fn integrate(&mut self) -> bool;

    fn step(&self) -> u64;

    fn time(&self) -> f64;

    fn time_step(&self) -> f64;

    fn is_output_iteration(&self) -> bool;

    fn is_log_iteration(&self) -> bool;
}

/// Fixed-timestep transient run ending at `time_end`
#[derive(Debug, Clone)]
pub struct TransientControl {
    time_step: f64,
    total_steps: u64,
    output_frequency: u64,
    log_frequency: u64,
    step: u64,
}

impl TransientControl {
    pub fn new(params: &SimulationControlParameters) -> Self {
        let total_steps = ((params.time_end / params.time_step).round() as u64).max(1);
        Self {
            time_step: params.time_step,
            total_steps,
            output_frequency: params.output_frequency,
            log_frequency: params.log_frequency,
            step: 0,
        }
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

impl SimulationControl for TransientControl {
    fn integrate(&mut self) -> bool {
        if self.step >= self.total_steps {
            return false;
        }
        self.step += 1;
        true
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn time(&self) -> f64 {
        self.step as f64 * self.time_step
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn is_output_iteration(&self) -> bool {
        self.output_frequency > 0 && self.step % self.output_frequency == 0
    }

    fn is_log_iteration(&self) -> bool {
        self.log_frequency > 0 && self.step % self.log_frequency == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_requested_number_of_steps() {
        let params = SimulationControlParameters {
            time_step: 1e-3,
            time_end: 0.01,
            output_frequency: 4,
            log_frequency: 0,
        };
        let mut control = TransientControl::new(&params);
        let mut outputs = Vec::new();
        while control.integrate() {
            if control.is_output_iteration() {
                outputs.push(control.step());
            }
            assert!(!control.is_log_iteration());
        }
        assert_eq!(control.step(), 10);
        assert!((control.time() - 0.01).abs() < 1e-15);
        assert_eq!(outputs, vec![4, 8]);
        assert!(!control.integrate());
    }
}
