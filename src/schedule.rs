//! Immutable per-run optimization schedules.

use std::time::Duration;

use tracing::warn;

use crate::{
    data::{Corruption, NoiseKind},
    error::{Result, TrainError},
    logger::{ansi, clear_colours, num_cs},
};

/// How long to run and how often to do things. Built from a family preset,
/// overridden field by field, then read-only for the rest of the run.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// Total number of parameter updates (epochs).
    pub updates: usize,
    /// Rows per minibatch (`0` means the full dataset).
    pub minibatch_size: usize,
    /// Refresh the minibatch every this many epochs.
    pub minibatch_update_interval: usize,
    /// Optional denoising corruption applied to fresh minibatches.
    pub corruption: Option<Corruption>,

    /// Track an objective function on an epoch cadence.
    pub obj_tracking_enable: bool,
    pub obj_function: String,
    pub obj_update_interval: usize,
    /// Retain the best-seen parameters and restore them at the end.
    pub obj_keep_optimum: bool,
    /// Progress fraction below which optimum comparisons are suppressed.
    pub obj_init_wait: f64,

    /// Run a secondary evaluation function on a wall-clock cadence.
    pub eval_enable: bool,
    pub eval_function: String,
    pub eval_time_interval: Duration,

    /// Report a one-off estimate of the total run time.
    pub estimate_time: bool,
    /// How long to observe the run before reporting the estimate.
    pub estimate_time_wait: Duration,
}

impl ScheduleConfig {
    /// Preset for restricted Boltzmann machines: long runs over denoised
    /// minibatches, objective tracked against reconstruction error.
    pub fn rbm() -> Self {
        Self {
            updates: 100_000,
            minibatch_size: 100,
            minibatch_update_interval: 10,
            corruption: Some(Corruption::new(NoiseKind::Mask, 0.5)),
            obj_tracking_enable: true,
            obj_function: "error".to_string(),
            obj_update_interval: 100,
            obj_keep_optimum: true,
            obj_init_wait: 0.01,
            eval_enable: true,
            eval_function: "error".to_string(),
            eval_time_interval: Duration::from_secs(10),
            estimate_time: true,
            estimate_time_wait: Duration::from_secs(20),
        }
    }

    /// Preset for deep belief networks (global fine-tuning stage).
    pub fn dbn() -> Self {
        Self {
            updates: 10_000,
            minibatch_size: 100,
            minibatch_update_interval: 10,
            corruption: None,
            obj_function: "accuracy".to_string(),
            eval_function: "accuracy".to_string(),
            estimate_time_wait: Duration::from_secs(15),
            ..Self::rbm()
        }
    }

    /// Preset for plain feed-forward networks.
    pub fn ann() -> Self {
        Self { obj_function: "error".to_string(), ..Self::dbn() }
    }

    /// Reject configurations the loop cannot run with at all. Called at
    /// attach time so a run never starts in an inconsistent state.
    pub fn validate(&self) -> Result<()> {
        if self.updates == 0 {
            return Err(TrainError::Configuration("updates must be positive".into()));
        }
        if self.minibatch_update_interval == 0 {
            return Err(TrainError::Configuration(
                "minibatch_update_interval must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Downgrade malformed tracker settings to "feature disabled", with a
    /// warning, rather than failing the run.
    pub fn sanitized(mut self) -> Self {
        if self.obj_tracking_enable && self.obj_update_interval == 0 {
            warn!("objective tracking disabled: update interval is zero");
            self.obj_tracking_enable = false;
        }
        if !self.obj_init_wait.is_finite() || self.obj_init_wait < 0.0 {
            warn!("objective burn-in fraction {} is invalid, using 0", self.obj_init_wait);
            self.obj_init_wait = 0.0;
        }
        if self.eval_enable && self.eval_time_interval.is_zero() {
            warn!("secondary evaluation disabled: time interval is zero");
            self.eval_enable = false;
        }
        if let Some(corruption) = self.corruption {
            if !corruption.factor.is_finite() {
                warn!("denoising corruption disabled: factor {} is invalid", corruption.factor);
                self.corruption = None;
            }
        }

        self
    }

    pub fn display(&self) {
        let num_cs = num_cs();
        println!("Updates                : {}", ansi(self.updates, num_cs));
        println!("Minibatch Size         : {}", ansi(self.minibatch_size, num_cs));
        println!("Minibatch Interval     : {}", ansi(self.minibatch_update_interval, num_cs));
        if let Some(corruption) = self.corruption {
            println!(
                "Corruption             : {}",
                ansi(
                    format!("{} (factor {:.2})", corruption.kind.name(), corruption.factor),
                    num_cs
                )
            );
        }
        if self.obj_tracking_enable {
            println!("Objective              : {}", ansi(&self.obj_function, "32;1"));
            println!("Objective Interval     : {}", ansi(self.obj_update_interval, num_cs));
            println!("Keep Optimum           : {}", ansi(self.obj_keep_optimum, num_cs));
        }
        if self.eval_enable {
            println!("Evaluation             : {}", ansi(&self.eval_function, "32;1"));
            println!(
                "Evaluation Interval    : {}",
                ansi(format!("{:.0}s", self.eval_time_interval.as_secs_f64()), num_cs)
            );
        }
        clear_colours();
    }
}
