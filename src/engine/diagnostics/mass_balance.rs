// ABOUTME: Basin-wide mass-balance accumulator - closes each step against configured tolerances
// ABOUTME: Tracks cumulative residual separately from per-step residual

use crate::engine::error::{CoreError, CoreResult};

/// Accumulates basin-wide water-balance terms for one step and checks
/// closure against the configured tolerances. All quantities are basin-total volumes (m^3) for the step.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasinLedger {
    pub precipitation_in: f64,
    pub evapotranspiration_out: f64,
    pub channel_outflow: f64,
    pub storage_change: f64,
    pub cumulative_residual: f64,
    pub step: u64,
}

impl BasinLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_step(&mut self) {
        self.precipitation_in = 0.0;
        self.evapotranspiration_out = 0.0;
        self.channel_outflow = 0.0;
        self.storage_change = 0.0;
    }

    /// Residual = inputs - outputs - storage change. Should be ~0 every
    /// step; systematic drift shows up in `cumulative_residual`.
    pub fn step_residual(&self) -> f64 {
        self.precipitation_in - self.evapotranspiration_out - self.channel_outflow - self.storage_change
    }

    /// Closes the step: checks the per-step residual against
    /// `step_tolerance`, folds it into the running cumulative residual, and
    /// checks that against `cumulative_tolerance`. Both are fatal errors.
    pub fn close_step(&mut self, step_tolerance: f64, cumulative_tolerance: f64) -> CoreResult<()> {
        let residual = self.step_residual();
        if residual.abs() > step_tolerance {
            return Err(CoreError::MassBalance {
                residual,
                threshold: step_tolerance,
                step: self.step,
            });
        }
        self.cumulative_residual += residual;
        if self.cumulative_residual.abs() > cumulative_tolerance {
            return Err(CoreError::MassBalance {
                residual: self.cumulative_residual,
                threshold: cumulative_tolerance,
                step: self.step,
            });
        }
        self.step += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_step_closes_without_error() {
        let mut ledger = BasinLedger::new();
        ledger.precipitation_in = 100.0;
        ledger.evapotranspiration_out = 40.0;
        ledger.channel_outflow = 50.0;
        ledger.storage_change = 10.0;
        assert!(ledger.close_step(1e-6, 1e-3).is_ok());
    }

    #[test]
    fn unbalanced_step_is_fatal() {
        let mut ledger = BasinLedger::new();
        ledger.precipitation_in = 100.0;
        ledger.evapotranspiration_out = 0.0;
        ledger.channel_outflow = 0.0;
        ledger.storage_change = 0.0;
        let err = ledger.close_step(1e-6, 1e-3).unwrap_err();
        assert_eq!(err.exit_code(), 36);
    }

    #[test]
    fn cumulative_residual_accumulates_across_steps() {
        let mut ledger = BasinLedger::new();
        ledger.precipitation_in = 1.0 + 5e-5;
        ledger.evapotranspiration_out = 1.0;
        for _ in 0..5 {
            ledger.close_step(1e-3, 1e-1).unwrap();
        }
        assert!(ledger.cumulative_residual.abs() > 0.0);
    }
}
