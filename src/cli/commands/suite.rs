//! Test and run commands - run the suite, optionally after a bootstrap

use super::CommandContext;
use crate::cli::args::TestArgs;
use crate::error::EnvbootResult;
use crate::pipeline::{Pipeline, TestOptions};
use crate::runner::TestOutcome;
use crate::ui::{self, StepProgress, UiContext};
use std::time::Duration;

/// Execute the test command
pub async fn execute(args: TestArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    let ui_ctx = UiContext::detect();
    let toolchain = ctx.toolchain();
    let pipeline = ctx.pipeline(&toolchain, ctx.ledger());

    ui::intro(&ui_ctx, &format!("Testing in {}", ctx.config.environment.name));
    run_tests(&ui_ctx, &pipeline, options(&args, ctx)).await
}

/// Execute the run command: bootstrap, then test
pub async fn run(args: TestArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    let ui_ctx = UiContext::detect();
    let toolchain = ctx.toolchain();
    let pipeline = ctx.pipeline(&toolchain, ctx.ledger());

    ui::intro(
        &ui_ctx,
        &format!(
            "envboot run {} ({})",
            ctx.config.environment.name,
            pipeline.ledger().run_id()
        ),
    );

    ui::section(&ui_ctx, "Bootstrap");
    let progress = StepProgress::new(&ui_ctx);
    let bootstrapped = pipeline.bootstrap(&progress).await;
    progress.finish();
    if let Err(e) = bootstrapped {
        ui::outro_error(&ui_ctx, "Bootstrap failed, tests not run");
        return Err(e);
    }

    ui::section(&ui_ctx, "Tests");
    run_tests(&ui_ctx, &pipeline, options(&args, ctx)).await
}

fn options(args: &TestArgs, ctx: &CommandContext) -> TestOptions {
    let mut options = TestOptions::from_config(&ctx.config);
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    options.use_display = !args.no_display;
    options
}

async fn run_tests(
    ui_ctx: &UiContext,
    pipeline: &Pipeline<'_>,
    options: TestOptions,
) -> EnvbootResult<()> {
    let outcome = match pipeline.test(options, &|line: &str| println!("{}", line)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ui::outro_error(ui_ctx, "Tests not run");
            return Err(e);
        }
    };

    match &outcome {
        TestOutcome::Passed { summary, elapsed } => ui::outro_success(
            ui_ctx,
            &format!(
                "Tests passed in {:.1}s{}",
                elapsed.as_secs_f64(),
                summary.map(|s| format!(" ({})", s)).unwrap_or_default()
            ),
        ),
        TestOutcome::Failed { exit_code, .. } => {
            ui::outro_error(ui_ctx, &format!("Tests failed (exit code {})", exit_code))
        }
        TestOutcome::Signaled { signal, .. } => {
            ui::outro_error(ui_ctx, &format!("Tests crashed (signal {})", signal))
        }
        TestOutcome::TimedOut { after } => ui::outro_error(
            ui_ctx,
            &format!("Tests timed out after {}s", after.as_secs()),
        ),
    }

    outcome.into_result().map(|_| ())
}
