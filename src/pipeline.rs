//! Run orchestration
//!
//! A run is `bootstrap` (probe, plan, execute) followed by `test` (acquire a
//! display, run the suite, release the display). Any bootstrap failure stops
//! the run before tests start. The display is released on every path once
//! it has been acquired.

use crate::cache::CacheState;
use crate::config::Config;
use crate::display::{DisplayResource, DisplayServer};
use crate::error::{EnvbootError, EnvbootResult};
use crate::executor::{self, ExecutionTarget, PlanObserver};
use crate::ledger::RunLedger;
use crate::plan::{self, Action, ActionPlan, EnvironmentSpec};
use crate::runner::{TestOutcome, TestRunner};
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for the test phase
#[derive(Debug, Clone, Copy)]
pub struct TestOptions {
    pub timeout: Duration,
    pub use_display: bool,
}

impl TestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.tests.timeout_secs),
            use_display: true,
        }
    }
}

/// What a finished bootstrap did
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub cache: CacheState,
    pub plan: ActionPlan,
    pub fingerprint: String,
}

/// Bootstrap and test pipeline bound to one cache, project and toolchain
pub struct Pipeline<'a> {
    config: &'a Config,
    cache_dir: PathBuf,
    project_dir: PathBuf,
    toolchain: &'a dyn Toolchain,
    ledger: RunLedger,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        cache_dir: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        toolchain: &'a dyn Toolchain,
        ledger: RunLedger,
    ) -> Self {
        Self {
            config,
            cache_dir: cache_dir.into(),
            project_dir: project_dir.into(),
            toolchain,
            ledger,
        }
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn spec(&self) -> EnvironmentSpec {
        EnvironmentSpec::from_config(&self.config.environment)
    }

    /// Probe the cache and compute the plan without executing anything
    pub fn plan(&self) -> EnvbootResult<(CacheState, ActionPlan)> {
        let cache = CacheState::probe(&self.cache_dir)?;
        let plan = plan::plan(&cache, &self.spec());
        Ok((cache, plan))
    }

    /// Probe, plan and execute. Stops at the first failing step.
    pub async fn bootstrap(&self, observer: &dyn PlanObserver) -> EnvbootResult<BootstrapReport> {
        let spec = self.spec();
        let fingerprint = spec.fingerprint();
        let (cache, plan) = self.plan()?;

        info!(
            "Planned {} step(s) for {} ({} bootstrap)",
            plan.len(),
            spec.name,
            plan.bootstrap_steps()
        );
        self.ledger
            .log(
                "plan.created",
                &json!({
                    "toolchain": self.toolchain.name(),
                    "environment": spec.name,
                    "fingerprint": fingerprint,
                    "cache": cache,
                    "actions": plan.actions(),
                }),
            )
            .await;

        let target = ExecutionTarget {
            prefix: self.cache_dir.clone(),
            environment: spec.name.clone(),
            project_dir: self.project_dir.clone(),
        };
        let observer = LedgerObserver {
            ledger: &self.ledger,
            inner: observer,
        };

        executor::execute(&plan, self.toolchain, &target, &observer).await?;

        Ok(BootstrapReport {
            cache,
            plan,
            fingerprint,
        })
    }

    /// Run the test suite, under a virtual display unless disabled.
    ///
    /// Failing and timed-out suites are returned as outcomes, not errors.
    /// When the suite passed but the display could not be released, the
    /// release error is returned instead.
    pub async fn test(
        &self,
        options: TestOptions,
        on_output: &(dyn Fn(&str) + Send + Sync),
    ) -> EnvbootResult<TestOutcome> {
        let mut display = if options.use_display {
            Some(self.acquire_display().await?)
        } else {
            debug!("Running tests without a virtual display");
            None
        };

        let display_env = display.as_ref().map(DisplayResource::display_env);
        let cmd = self
            .toolchain
            .env_command(&self.config.environment.name, &self.config.tests.command);
        let outcome = TestRunner::new(options.timeout)
            .run(cmd, &self.project_dir, display_env.as_deref(), on_output)
            .await;

        let released = match display.as_mut() {
            Some(resource) => self.release_display(resource).await,
            None => Ok(()),
        };

        let outcome = outcome?;
        self.ledger
            .log("tests.finished", &json!({ "outcome": outcome }))
            .await;

        match released {
            Err(e) if outcome.is_success() => Err(e),
            _ => Ok(outcome),
        }
    }

    /// Bootstrap, then test
    pub async fn run(
        &self,
        observer: &dyn PlanObserver,
        options: TestOptions,
        on_output: &(dyn Fn(&str) + Send + Sync),
    ) -> EnvbootResult<TestOutcome> {
        self.bootstrap(observer).await?;
        self.test(options, on_output).await
    }

    async fn acquire_display(&self) -> EnvbootResult<DisplayResource> {
        let display = &self.config.display;
        let resource = DisplayServer::from_config(display)
            .acquire(display.number, &display.pid_file(), &display.geometry)
            .await?;

        self.ledger
            .log(
                "display.acquired",
                &json!({
                    "display": resource.display_env(),
                    "pid": resource.pid(),
                    "pid_file": resource.pid_file(),
                }),
            )
            .await;
        Ok(resource)
    }

    async fn release_display(&self, resource: &mut DisplayResource) -> EnvbootResult<()> {
        match resource.release().await {
            Ok(()) => {
                self.ledger
                    .log(
                        "display.released",
                        &json!({ "display": resource.display_env() }),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Display {} not released ({}); PID file left at {}",
                    resource.display_env(),
                    e,
                    resource.pid_file().display()
                );
                Err(e)
            }
        }
    }
}

/// Forwards step events and records completions and failures in the ledger
struct LedgerObserver<'a> {
    ledger: &'a RunLedger,
    inner: &'a dyn PlanObserver,
}

#[async_trait]
impl<'a> PlanObserver for LedgerObserver<'a> {
    async fn step_started(&self, index: usize, total: usize, action: &Action) {
        self.inner.step_started(index, total, action).await;
    }

    async fn step_completed(&self, index: usize, total: usize, action: &Action) {
        self.inner.step_completed(index, total, action).await;
        self.ledger
            .log(
                "step.completed",
                &json!({ "index": index, "total": total, "step": action.step_name() }),
            )
            .await;
    }

    async fn step_failed(&self, index: usize, total: usize, action: &Action, error: &EnvbootError) {
        self.inner.step_failed(index, total, action, error).await;
        self.ledger
            .log(
                "step.failed",
                &json!({
                    "index": index,
                    "total": total,
                    "step": action.step_name(),
                    "category": error.category().to_string(),
                    "error": error.to_string(),
                }),
            )
            .await;
    }
}
