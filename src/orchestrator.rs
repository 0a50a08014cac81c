//! Background run and clean invocations.
//!
//! The orchestrator owns the two [`Activity`] state machines. At most one run
//! and one clean exist at a time, and neither may start while the other is
//! active, because both write to the same output, extract and export trees.
//! Each accepted invocation runs on its own thread; when it finishes, or its
//! thread panics, the busy flag returns to idle and the registered update
//! callback fires once. While a run cleans its output and extract roots,
//! [`Orchestrator::is_cleaning`] reports true as well; the clean callback
//! only fires for invocations of [`Orchestrator::clean`].

use crate::activity::{ActiveGuard, Activity, UpdateFn, timed};
use crate::archive::Archiver;
use crate::cleaner::{self, CleanReport, CleanTarget};
use crate::copier::Copier;
use crate::error::OrchestratorError;
use crate::ruleset::RuleSet;
use crate::runner::{self, RunContext, RunReport};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

pub struct Orchestrator {
    runner: Arc<Activity>,
    cleaner: Arc<Activity>,
    starting: Mutex<()>,
    archiver: Arc<dyn Archiver>,
    copier: Arc<Copier>,
}

impl Orchestrator {
    pub fn new(archiver: Arc<dyn Archiver>, copier: Copier) -> Self {
        Self {
            runner: Arc::new(Activity::new("run")),
            cleaner: Arc::new(Activity::new("clean")),
            starting: Mutex::new(()),
            archiver,
            copier: Arc::new(copier),
        }
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_active()
    }

    pub fn is_cleaning(&self) -> bool {
        self.cleaner.is_active()
    }

    pub fn is_busy(&self) -> bool {
        self.is_running() || self.is_cleaning()
    }

    pub fn register_run_update(&self, update: UpdateFn) {
        self.runner.register_update(update);
    }

    pub fn register_clean_update(&self, update: UpdateFn) {
        self.cleaner.register_update(update);
    }

    fn begin(
        &self,
        requested: &Arc<Activity>,
        other: &Activity,
    ) -> Result<ActiveGuard, OrchestratorError> {
        let _starting = self.starting.lock().unwrap_or_else(PoisonError::into_inner);

        let busy = |active: &Activity| OrchestratorError::Busy {
            requested: requested.name(),
            active: active.name(),
        };
        if other.is_active() {
            return Err(busy(other));
        }
        requested
            .try_begin()
            .ok_or_else(|| busy(requested.as_ref()))
    }

    /// Starts installing `rule_sets` in the background.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Busy` if a run or clean is in progress.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use modpipe::archive::{DefaultArchiver, SevenZip};
    /// use modpipe::config::ModConfig;
    /// use modpipe::copier::Copier;
    /// use modpipe::orchestrator::Orchestrator;
    /// use std::path::Path;
    /// use std::sync::Arc;
    ///
    /// let config = ModConfig::load(Path::new("modpipe.jsonc")).unwrap();
    /// let archiver = Arc::new(DefaultArchiver::new(SevenZip::locate(None)));
    /// let orchestrator = Orchestrator::new(archiver, Copier::default());
    /// let report = orchestrator.run(config.mods).unwrap().join().unwrap();
    /// println!("{} packages", report.packages.len());
    /// ```
    pub fn run(&self, rule_sets: Vec<RuleSet>) -> Result<JoinHandle<RunReport>, OrchestratorError> {
        let guard = self.begin(&self.runner, &self.cleaner)?;
        let archiver = Arc::clone(&self.archiver);
        let copier = Arc::clone(&self.copier);
        let cleaner = Arc::clone(&self.cleaner);

        Ok(thread::spawn(move || {
            let ctx = RunContext {
                archiver: archiver.as_ref(),
                copier: &copier,
                cleaner: Some(&cleaner),
            };
            let (report, _) = timed("run", || runner::run_rule_sets(&rule_sets, &ctx));
            guard.finish();
            report
        }))
    }

    /// Starts cleaning `targets` of every rule set in the background.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Busy` if a run or clean is in progress.
    pub fn clean(
        &self,
        rule_sets: Vec<RuleSet>,
        targets: Vec<CleanTarget>,
    ) -> Result<JoinHandle<CleanReport>, OrchestratorError> {
        let guard = self.begin(&self.cleaner, &self.runner)?;

        Ok(thread::spawn(move || {
            let (report, _) = timed("clean", || cleaner::clean_all(&rule_sets, &targets));
            guard.finish();
            report
        }))
    }
}
