//! Bootstrap command - create or update the cached environment

use super::CommandContext;
use crate::error::EnvbootResult;
use crate::ui::{self, StepProgress, UiContext};

/// Execute the bootstrap command
pub async fn execute(ctx: &CommandContext) -> EnvbootResult<()> {
    let ui_ctx = UiContext::detect();
    let toolchain = ctx.toolchain();
    let pipeline = ctx.pipeline(&toolchain, ctx.ledger());

    ui::intro(
        &ui_ctx,
        &format!("Bootstrapping {}", ctx.config.environment.name),
    );

    let progress = StepProgress::new(&ui_ctx);
    let result = pipeline.bootstrap(&progress).await;
    progress.finish();

    match result {
        Ok(report) => {
            ui::outro_success(
                &ui_ctx,
                &format!(
                    "Environment {} ready ({} step(s), {})",
                    ctx.config.environment.name,
                    report.plan.len(),
                    report.fingerprint
                ),
            );
            Ok(())
        }
        Err(e) => {
            ui::outro_error(&ui_ctx, "Bootstrap failed");
            Err(e)
        }
    }
}
