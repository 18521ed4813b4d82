//! Display command - manage the virtual display outside a run
//!
//! `start` leaves the server running in the background; `stop` reaps any
//! server recorded in the PID file, including one orphaned by a killed run.

use super::CommandContext;
use crate::cli::args::{DisplayAction, DisplayArgs};
use crate::display::{pidfile, DisplayResource, DisplayServer};
use crate::error::EnvbootResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the display command
pub async fn execute(args: DisplayArgs, ctx: &CommandContext) -> EnvbootResult<()> {
    let ui_ctx = UiContext::detect();

    match args.action {
        DisplayAction::Start => start(&ui_ctx, ctx).await,
        DisplayAction::Stop => stop(&ui_ctx, ctx).await,
        DisplayAction::Status => status(&ui_ctx, ctx).await,
    }
}

async fn start(ui_ctx: &UiContext, ctx: &CommandContext) -> EnvbootResult<()> {
    let display = &ctx.config.display;
    let mut spinner = TaskSpinner::new(ui_ctx);
    spinner.start(&format!("Starting display :{}", display.number));

    match DisplayServer::from_config(display)
        .acquire(display.number, &display.pid_file(), &display.geometry)
        .await
    {
        Ok(resource) => {
            spinner.stop(&format!(
                "Display {} running at {} (pid {})",
                resource.display_env(),
                resource.geometry(),
                resource.pid().unwrap_or_default()
            ));
            ui::remark(
                ui_ctx,
                &format!("export DISPLAY={}", resource.display_env()),
            );
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Display :{} failed to start", display.number));
            Err(e)
        }
    }
}

async fn stop(ui_ctx: &UiContext, ctx: &CommandContext) -> EnvbootResult<()> {
    let display = &ctx.config.display;

    let pid_file = display.pid_file();

    match DisplayResource::from_pid_file(display.number, &pid_file).await? {
        Some(mut resource) => {
            resource.release().await?;
            ui::step_ok_detail(
                ui_ctx,
                &format!("Display {} stopped", resource.display_env()),
                &format!("pid {}", resource.pid().unwrap_or_default()),
            );
        }
        None => ui::step_info(
            ui_ctx,
            &format!(
                "Display :{} not running (no {})",
                display.number,
                pid_file.display()
            ),
        ),
    }

    Ok(())
}

async fn status(ui_ctx: &UiContext, ctx: &CommandContext) -> EnvbootResult<()> {
    let display = &ctx.config.display;
    let pid_file = display.pid_file();
    let pid = pidfile::read(&pid_file).await?;

    ui::key_value(ui_ctx, "Display", &format!(":{}", display.number));
    ui::key_value(ui_ctx, "PID file", &pid_file.display().to_string());
    match pid {
        Some(pid) if pidfile::is_alive(pid) => {
            ui::key_value_status(ui_ctx, "State", &format!("running (pid {})", pid), true)
        }
        Some(pid) => ui::key_value_status(
            ui_ctx,
            "State",
            &format!("stale PID file (pid {} exited)", pid),
            false,
        ),
        None => ui::key_value_status(ui_ctx, "State", "not running", true),
    }

    Ok(())
}
