//! Sequential plan execution
//!
//! Actions run one at a time in plan order, since each step depends on the
//! filesystem state the previous one produced. The first failure stops the
//! run; later steps are never attempted and nothing is rolled back.

use crate::error::{EnvbootError, EnvbootResult};
use crate::plan::{Action, ActionPlan};
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{error, info};

/// Where plan actions are applied
#[derive(Debug, Clone)]
pub struct ExecutionTarget {
    /// Cache directory holding the base distribution
    pub prefix: PathBuf,
    /// Named environment packages are installed into
    pub environment: String,
    /// Working tree of the package under test
    pub project_dir: PathBuf,
}

/// Receives step transitions while a plan executes
#[async_trait]
pub trait PlanObserver: Send + Sync {
    /// Called before step `index` (1-based) of `total` starts
    async fn step_started(&self, index: usize, total: usize, action: &Action);

    /// Called after a step completed successfully
    async fn step_completed(&self, index: usize, total: usize, action: &Action);

    /// Called when a step failed; no further steps will run
    async fn step_failed(&self, index: usize, total: usize, action: &Action, error: &EnvbootError);
}

/// Observer that only logs
pub struct LogObserver;

#[async_trait]
impl PlanObserver for LogObserver {
    async fn step_started(&self, index: usize, total: usize, action: &Action) {
        info!("Step {}/{}: {}", index, total, action);
    }

    async fn step_completed(&self, _index: usize, _total: usize, _action: &Action) {}

    async fn step_failed(&self, index: usize, total: usize, action: &Action, error: &EnvbootError) {
        error!("Step {}/{} ({}) failed: {}", index, total, action.step_name(), error);
    }
}

/// Execute `plan` against `toolchain`, stopping at the first failure.
///
/// On success returns the number of steps run. On failure returns
/// `EnvbootError::StepFailed` naming the failing step.
pub async fn execute(
    plan: &ActionPlan,
    toolchain: &dyn Toolchain,
    target: &ExecutionTarget,
    observer: &dyn PlanObserver,
) -> EnvbootResult<usize> {
    let total = plan.len();

    for (i, action) in plan.actions().iter().enumerate() {
        let index = i + 1;
        observer.step_started(index, total, action).await;

        if let Err(e) = apply(action, toolchain, target).await {
            observer.step_failed(index, total, action, &e).await;
            return Err(EnvbootError::StepFailed {
                step: action.step_name().to_string(),
                source: Box::new(e),
            });
        }

        observer.step_completed(index, total, action).await;
    }

    Ok(total)
}

async fn apply(
    action: &Action,
    toolchain: &dyn Toolchain,
    target: &ExecutionTarget,
) -> EnvbootResult<()> {
    match action {
        Action::InstallBaseDistribution => toolchain.install_distribution(&target.prefix).await,
        Action::CreateNamedEnvironment {
            name,
            interpreter_version,
        } => toolchain.create_environment(name, interpreter_version).await,
        Action::InstallCorePackages { packages } => {
            toolchain
                .install_core_packages(&target.environment, packages)
                .await
        }
        Action::InstallPipPackages { packages } => {
            toolchain
                .install_pip_packages(&target.environment, packages)
                .await
        }
        Action::InstallUnderTest => {
            toolchain
                .install_editable(&target.environment, &target.project_dir)
                .await
        }
    }
}
