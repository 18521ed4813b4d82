//! Cache command - show what the persistent cache holds

use super::CommandContext;
use crate::cache::CacheState;
use crate::cli::args::{FormatArgs, OutputFormat};
use crate::error::EnvbootResult;
use crate::ledger::LEDGER_FILE;
use crate::ui::{self, UiContext};
use serde_json::json;

/// Execute the cache command
pub async fn execute(args: FormatArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    let state = CacheState::probe(&ctx.cache_dir)?;
    let target = &ctx.config.environment.name;

    match args.format {
        OutputFormat::Json => {
            let value = json!({
                "dir": ctx.cache_dir,
                "base_distribution_present": state.base_distribution_present,
                "named_environments": state.named_environments,
                "target_environment": target,
                "target_present": state.has_environment(target),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for name in &state.named_environments {
                println!("{}", name);
            }
        }
        OutputFormat::Table => {
            let ui_ctx = UiContext::detect();
            ui::intro(&ui_ctx, "Cache");
            ui::key_value(&ui_ctx, "Directory", &ctx.cache_dir.display().to_string());
            ui::key_value_status(
                &ui_ctx,
                "Base distribution",
                if state.base_distribution_present {
                    "installed"
                } else {
                    "missing"
                },
                state.base_distribution_present,
            );
            ui::key_value_status(
                &ui_ctx,
                &format!("Environment {}", target),
                if state.has_environment(target) {
                    "present"
                } else {
                    "missing"
                },
                state.has_environment(target),
            );

            let others: Vec<&str> = state
                .named_environments
                .iter()
                .filter(|name| *name != target)
                .map(String::as_str)
                .collect();
            if !others.is_empty() {
                ui::key_value(&ui_ctx, "Other environments", &others.join(", "));
            }

            let ledger = ctx.cache_dir.join(LEDGER_FILE);
            if ledger.is_file() {
                ui::remark(&ui_ctx, &format!("Run ledger: {}", ledger.display()));
            }
        }
    }

    Ok(())
}
