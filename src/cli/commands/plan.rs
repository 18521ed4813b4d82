//! Plan command - show what a bootstrap would do

use super::CommandContext;
use crate::cli::args::{OutputFormat, PlanArgs};
use crate::error::EnvbootResult;
use crate::ledger::RunLedger;
use crate::plan::{ActionPlan, EnvironmentSpec};
use crate::ui::{self, UiContext};
use console::style;
use serde_json::json;

/// Execute the plan command
pub async fn execute(args: PlanArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    let toolchain = ctx.toolchain();
    let pipeline = ctx.pipeline(&toolchain, RunLedger::disabled());
    let spec = pipeline.spec();
    let (cache, plan) = pipeline.plan()?;

    match args.format {
        OutputFormat::Json => {
            let value = json!({
                "environment": spec.name,
                "fingerprint": spec.fingerprint(),
                "cache_dir": ctx.cache_dir,
                "cache": cache,
                "actions": plan.actions(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for action in &plan {
                println!("{}", action.step_name());
            }
        }
        OutputFormat::Table => print_table(ctx, &spec, &plan),
    }

    Ok(())
}

fn print_table(ctx: &CommandContext, spec: &EnvironmentSpec, plan: &ActionPlan) {
    let ui_ctx = UiContext::detect();
    ui::intro(
        &ui_ctx,
        &format!("Plan for {} ({})", spec.name, spec.fingerprint()),
    );
    ui::key_value(&ui_ctx, "Cache", &ctx.cache_dir.display().to_string());
    println!();

    println!(
        "{:<4} {:<26} {}",
        style("#").bold(),
        style("STEP").bold(),
        style("DETAIL").bold()
    );
    println!("{}", "-".repeat(72));

    for (i, action) in plan.actions().iter().enumerate() {
        let name = if action.is_bootstrap() {
            style(action.step_name()).yellow()
        } else {
            style(action.step_name()).cyan()
        };
        println!("{:<4} {:<26} {}", i + 1, name, action);
    }

    println!();
    match plan.bootstrap_steps() {
        0 => println!("{} step(s), environment cached", plan.len()),
        n => println!("{} step(s), {} to bootstrap", plan.len(), n),
    }
}
