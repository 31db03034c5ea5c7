//! The epoch-driven control loop.
//!
//! The owner of a trainable system calls [`Scheduler::advance`] once per
//! parameter update. Each call bumps the epoch, checks the terminal
//! conditions, and delegates to the progress tracker's sub-steps in a fixed
//! order: estimation, objective tracking, secondary evaluation. Later steps
//! depend on the continuation flag set by earlier ones, so the order is
//! load-bearing.

use std::{fs, io, time::Instant};

use tracing::info;

use crate::{
    data::{Batch, MinibatchProvider},
    error::{Result, TrainError},
    keys::{self, CancelSource, NoCancel},
    logger,
    registry::FunctionRegistry,
    schedule::ScheduleConfig,
    system::TrainableSystem,
    tracker::{OptimumRecord, ProgressTracker, StopCause, TrainingState},
};

/// Lifecycle of a scheduler. `Converged` and `Cancelled` are terminal;
/// `advance` on a terminal phase is a no-op returning `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Converged,
    Cancelled,
}

/// Stateful controller of one optimization run.
pub struct Scheduler<S: TrainableSystem, C: CancelSource = NoCancel> {
    config: Option<ScheduleConfig>,
    state: Option<TrainingState<S::Params>>,
    tracker: ProgressTracker,
    cancel: C,
}

impl<S: TrainableSystem> Scheduler<S, NoCancel> {
    /// Non-interactive scheduler with the stock function registry.
    pub fn new() -> Self {
        Self::with_cancel(FunctionRegistry::with_defaults(), NoCancel)
    }
}

impl<S: TrainableSystem> Default for Scheduler<S, NoCancel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TrainableSystem, C: CancelSource> Scheduler<S, C> {
    pub fn with_cancel(registry: FunctionRegistry, cancel: C) -> Self {
        Self { config: None, state: None, tracker: ProgressTracker::new(registry), cancel }
    }

    /// Bind the scheduler to a system: validate its optimization
    /// configuration, sample the fixed evaluation data once, and reset all
    /// run state to epoch 0.
    pub fn attach<P: MinibatchProvider>(&mut self, system: &S, provider: &mut P) -> Result<()> {
        let config = system.schedule().ok_or_else(|| {
            TrainError::Configuration("system exposes no optimization configuration".into())
        })?;
        config.validate()?;
        let config = config.clone().sanitized();

        // objective/evaluation functions must resolve before the run starts
        if config.obj_tracking_enable {
            self.tracker.registry().describe(&config.obj_function)?;
        }
        if config.eval_enable {
            self.tracker.registry().describe(&config.eval_function)?;
        }

        let evaluation_data = provider.sample(0, None)?;
        self.state = Some(TrainingState::new(evaluation_data, &config, Instant::now()));
        self.config = Some(config);

        Ok(())
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            None => Phase::Idle,
            Some(state) if state.running => Phase::Running,
            Some(state) => match state.stop_cause {
                Some(StopCause::Aborted) => Phase::Cancelled,
                _ => Phase::Converged,
            },
        }
    }

    /// Perform one epoch. Returns whether the loop should continue.
    pub fn advance(&mut self, system: &mut S) -> Result<bool> {
        let (Some(config), Some(state)) = (&self.config, &mut self.state) else {
            return Ok(false);
        };
        if !state.running {
            return Ok(false);
        }

        state.epoch += 1;
        if state.epoch == config.updates {
            state.running = false;
            state.stop_cause = Some(StopCause::Exhausted);
        }

        // cancellation and exhaustion are mutually exclusive terminal causes
        if state.running {
            if !state.keys_started && self.cancel.is_interactive() {
                info!("press '{}' to abort the optimization", keys::ABORT_KEY);
                state.keys_started = true;
            }

            if let Some(key) = self.cancel.poll() {
                match key {
                    keys::ABORT_KEY => {
                        info!("aborting optimization");
                        state.running = false;
                        state.stop_cause = Some(StopCause::Aborted);
                    }
                    keys::ESTIMATE_KEY => {
                        self.tracker.report_estimate(state, config, Instant::now());
                    }
                    keys::HELP_KEY => {
                        info!("'h' -- show this");
                        info!("'q' -- quit optimization");
                        info!("'t' -- estimate finishing time");
                    }
                    _ => {}
                }
            }
        }

        if config.estimate_time && !state.estim_finished {
            self.tracker.estimate(state, config, Instant::now());
        }
        if config.obj_tracking_enable {
            self.tracker.track_objective(state, config, system)?;
        }
        if state.eval_enabled {
            self.tracker.track_evaluation(state, config, system, Instant::now())?;
        }

        if !state.running {
            self.cancel.stop();
        }

        Ok(state.running)
    }

    /// The current minibatch, refreshed from the provider whenever the
    /// refresh interval has elapsed (and unconditionally on first use).
    pub fn minibatch<P: MinibatchProvider>(&mut self, provider: &mut P) -> Result<&Batch> {
        let (Some(config), Some(state)) = (&self.config, &mut self.state) else {
            return Err(TrainError::Configuration("no system attached".into()));
        };

        if state.minibatch.is_none() || state.epoch % config.minibatch_update_interval == 0 {
            state.minibatch = Some(provider.sample(config.minibatch_size, config.corruption)?);
        }

        state
            .minibatch
            .as_ref()
            .ok_or_else(|| TrainError::Configuration("minibatch unavailable".into()))
    }

    pub fn epoch(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.epoch)
    }

    pub fn progress(&self) -> f64 {
        match (&self.config, &self.state) {
            (Some(config), Some(state)) => state.progress(config.updates),
            _ => 0.0,
        }
    }

    pub fn stop_cause(&self) -> Option<StopCause> {
        self.state.as_ref().and_then(|state| state.stop_cause)
    }

    pub fn objective_history(&self) -> &[(f64, f64)] {
        self.state.as_ref().map_or(&[], |state| &state.objective_history)
    }

    pub fn evaluation_history(&self) -> &[(f64, f64)] {
        self.state.as_ref().map_or(&[], |state| &state.evaluation_history)
    }

    pub fn optimum(&self) -> Option<&OptimumRecord<S::Params>> {
        self.state.as_ref().and_then(|state| state.optimum.as_ref())
    }

    pub fn config(&self) -> Option<&ScheduleConfig> {
        self.config.as_ref()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ProgressTracker {
        &mut self.tracker
    }

    /// Dump both histories as CSV into `out_dir`.
    pub fn write_history(&self, out_dir: &str) -> io::Result<()> {
        fs::create_dir_all(out_dir)?;
        logger::write_history(&format!("{out_dir}/objective.csv"), self.objective_history())?;
        logger::write_history(&format!("{out_dir}/evaluation.csv"), self.evaluation_history())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryDataset;
    use std::{cell::RefCell, collections::VecDeque, time::Duration};

    struct StubSystem {
        params: Vec<f64>,
        values: RefCell<VecDeque<f64>>,
        config: Option<ScheduleConfig>,
    }

    impl StubSystem {
        fn new(values: &[f64], config: ScheduleConfig) -> Self {
            Self {
                params: vec![0.0],
                values: RefCell::new(values.iter().copied().collect()),
                config: Some(config),
            }
        }
    }

    impl TrainableSystem for StubSystem {
        type Params = Vec<f64>;

        fn evaluate(&self, _data: &Batch, function: &str) -> Result<f64> {
            self.values.borrow_mut().pop_front().ok_or_else(|| TrainError::Evaluation {
                function: function.to_string(),
                reason: "no scripted value left".to_string(),
            })
        }

        fn params(&self) -> Vec<f64> {
            self.params.clone()
        }

        fn set_params(&mut self, params: Vec<f64>) -> Result<()> {
            self.params = params;
            Ok(())
        }

        fn schedule(&self) -> Option<&ScheduleConfig> {
            self.config.as_ref()
        }
    }

    /// Keeps serving keys after a stop, like a restarted listener.
    struct ScriptedKeys {
        keys: VecDeque<Option<char>>,
        stops: usize,
    }

    impl CancelSource for &mut ScriptedKeys {
        fn poll(&mut self) -> Option<char> {
            self.keys.pop_front().flatten()
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn quiet_config(updates: usize) -> ScheduleConfig {
        ScheduleConfig {
            updates,
            minibatch_update_interval: 4,
            minibatch_size: 2,
            corruption: None,
            obj_tracking_enable: false,
            eval_enable: false,
            estimate_time: false,
            ..ScheduleConfig::rbm()
        }
    }

    fn provider() -> MemoryDataset {
        MemoryDataset::seeded(vec![vec![0.5; 3]; 16], 11)
    }

    #[test]
    fn test_attach_requires_configuration() {
        let mut scheduler = Scheduler::new();
        let system = StubSystem { params: vec![], values: RefCell::new(VecDeque::new()), config: None };
        let err = scheduler.attach(&system, &mut provider()).unwrap_err();
        assert!(matches!(err, TrainError::Configuration(_)));
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn test_attach_rejects_unknown_objective() {
        let config = ScheduleConfig {
            obj_tracking_enable: true,
            obj_function: "bogus".to_string(),
            ..quiet_config(10)
        };
        let system = StubSystem::new(&[], config);
        let mut scheduler = Scheduler::new();
        let err = scheduler.attach(&system, &mut provider()).unwrap_err();
        assert!(matches!(err, TrainError::UnknownFunction(_)));
    }

    #[test]
    fn test_epochs_count_up_to_exhaustion() {
        let mut system = StubSystem::new(&[], quiet_config(5));
        let mut scheduler = Scheduler::new();
        scheduler.attach(&system, &mut provider()).unwrap();
        assert_eq!(scheduler.phase(), Phase::Running);

        for expected in 1..5 {
            assert!(scheduler.advance(&mut system).unwrap());
            assert_eq!(scheduler.epoch(), expected);
        }

        assert!(!scheduler.advance(&mut system).unwrap());
        assert_eq!(scheduler.epoch(), 5);
        assert_eq!(scheduler.phase(), Phase::Converged);
        assert_eq!(scheduler.stop_cause(), Some(StopCause::Exhausted));
    }

    #[test]
    fn test_terminal_advance_is_noop() {
        let mut system = StubSystem::new(&[], quiet_config(2));
        let mut scheduler = Scheduler::new();
        scheduler.attach(&system, &mut provider()).unwrap();

        assert!(scheduler.advance(&mut system).unwrap());
        assert!(!scheduler.advance(&mut system).unwrap());
        assert!(!scheduler.advance(&mut system).unwrap());
        assert_eq!(scheduler.epoch(), 2);
    }

    #[test]
    fn test_cancel_key_aborts() {
        let mut keys = ScriptedKeys {
            keys: VecDeque::from([None, None, Some('q')]),
            stops: 0,
        };
        let mut system = StubSystem::new(&[], quiet_config(100));
        let mut scheduler =
            Scheduler::with_cancel(FunctionRegistry::with_defaults(), &mut keys);
        scheduler.attach(&system, &mut provider()).unwrap();

        assert!(scheduler.advance(&mut system).unwrap());
        assert!(scheduler.advance(&mut system).unwrap());
        assert!(!scheduler.advance(&mut system).unwrap());
        assert_eq!(scheduler.phase(), Phase::Cancelled);
        assert_eq!(scheduler.stop_cause(), Some(StopCause::Aborted));
        assert!(!scheduler.advance(&mut system).unwrap());

        drop(scheduler);
        // the listener is torn down exactly once, at the terminal transition
        assert_eq!(keys.stops, 1);
    }

    #[test]
    fn test_cancellation_survives_reattach() {
        let mut keys = ScriptedKeys { keys: VecDeque::from([None, Some('q')]), stops: 0 };
        let mut system = StubSystem::new(&[], quiet_config(2));
        let mut scheduler =
            Scheduler::with_cancel(FunctionRegistry::with_defaults(), &mut keys);
        let mut data = provider();
        scheduler.attach(&system, &mut data).unwrap();

        while scheduler.advance(&mut system).unwrap() {}
        assert_eq!(scheduler.phase(), Phase::Converged);

        // a second run on the same scheduler still observes the abort key
        scheduler.attach(&system, &mut data).unwrap();
        assert!(!scheduler.advance(&mut system).unwrap());
        assert_eq!(scheduler.phase(), Phase::Cancelled);
        assert_eq!(scheduler.stop_cause(), Some(StopCause::Aborted));

        drop(scheduler);
        assert_eq!(keys.stops, 2);
    }

    #[test]
    fn test_no_key_notice_for_inert_source() {
        let mut system = StubSystem::new(&[], quiet_config(5));
        let mut scheduler = Scheduler::new();
        scheduler.attach(&system, &mut provider()).unwrap();
        scheduler.advance(&mut system).unwrap();
        assert!(!scheduler.state.as_ref().unwrap().keys_started);
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        let mut keys = ScriptedKeys { keys: VecDeque::from([Some('x')]), stops: 0 };
        let mut system = StubSystem::new(&[], quiet_config(10));
        let mut scheduler =
            Scheduler::with_cancel(FunctionRegistry::with_defaults(), &mut keys);
        scheduler.attach(&system, &mut provider()).unwrap();
        assert!(scheduler.advance(&mut system).unwrap());
        assert_eq!(scheduler.phase(), Phase::Running);
    }

    #[test]
    fn test_minibatch_refresh_interval() {
        let mut system = StubSystem::new(&[], quiet_config(20));
        let mut scheduler = Scheduler::new();
        let mut data = provider();
        scheduler.attach(&system, &mut data).unwrap();

        // epoch 0: first fetch
        let first = scheduler.minibatch(&mut data).unwrap().generation();

        for _ in 0..3 {
            scheduler.advance(&mut system).unwrap();
            // epochs 1..=3 reuse the same batch
            assert_eq!(scheduler.minibatch(&mut data).unwrap().generation(), first);
        }

        scheduler.advance(&mut system).unwrap();
        // epoch 4 hits the refresh interval
        let refreshed = scheduler.minibatch(&mut data).unwrap().generation();
        assert_ne!(refreshed, first);
    }

    #[test]
    fn test_attach_resets_state() {
        let mut system = StubSystem::new(&[], quiet_config(3));
        let mut scheduler = Scheduler::new();
        let mut data = provider();
        scheduler.attach(&system, &mut data).unwrap();

        while scheduler.advance(&mut system).unwrap() {}
        assert_eq!(scheduler.phase(), Phase::Converged);

        scheduler.attach(&system, &mut data).unwrap();
        assert_eq!(scheduler.phase(), Phase::Running);
        assert_eq!(scheduler.epoch(), 0);
        assert!(scheduler.objective_history().is_empty());
    }

    #[test]
    fn test_progress_fraction() {
        let mut system = StubSystem::new(&[], quiet_config(4));
        let mut scheduler = Scheduler::new();
        scheduler.attach(&system, &mut provider()).unwrap();
        scheduler.advance(&mut system).unwrap();
        assert_eq!(scheduler.progress(), 0.25);
    }

    #[test]
    fn test_evaluation_cadence_is_wall_clock() {
        let config = ScheduleConfig {
            eval_enable: true,
            eval_function: "error".to_string(),
            eval_time_interval: Duration::from_secs(3600),
            ..quiet_config(5)
        };
        // no value is ever consumed: the interval never elapses mid-run,
        // and only the terminal epoch forces a final read
        let mut system = StubSystem::new(&[0.1], config);
        let mut scheduler = Scheduler::new();
        scheduler.attach(&system, &mut provider()).unwrap();

        while scheduler.advance(&mut system).unwrap() {}

        assert!(scheduler.evaluation_history().is_empty());
        assert!(system.values.borrow().is_empty());
    }
}
