//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::error::EnvbootError;
use crate::executor::PlanObserver;
use crate::plan::Action;
use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress through the steps of a bootstrap plan.
///
/// An indicatif bar in interactive mode; one line per step transition in CI.
pub struct StepProgress {
    bar: Option<ProgressBar>,
}

impl StepProgress {
    pub fn new(ctx: &UiContext) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(bar_style) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} {bar:20.cyan/dim} {pos}/{len} {msg}  {elapsed:.dim}",
            ) {
                bar.set_style(
                    bar_style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self { bar }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

#[async_trait]
impl PlanObserver for StepProgress {
    async fn step_started(&self, index: usize, total: usize, action: &Action) {
        match self.bar {
            Some(ref bar) => {
                bar.set_length(total as u64);
                bar.set_position(index as u64 - 1);
                bar.set_message(action.to_string());
            }
            None => println!("  [{}/{}] {}", index, total, action),
        }
    }

    async fn step_completed(&self, index: usize, _total: usize, action: &Action) {
        if let Some(ref bar) = self.bar {
            bar.set_position(index as u64);
            bar.println(format!("  {} {}", style("✓").green(), action.step_name()));
        }
    }

    async fn step_failed(&self, index: usize, total: usize, action: &Action, error: &EnvbootError) {
        match self.bar {
            Some(ref bar) => {
                bar.abandon_with_message(format!("{} {}", style("✗").red(), action.step_name()))
            }
            None => println!(
                "  {} [{}/{}] {}: {}",
                style("[FAIL]").red(),
                index,
                total,
                action.step_name(),
                error
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Starting display :99");
        spinner.stop("Display :99 running");
    }

    #[tokio::test]
    async fn step_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = StepProgress::new(&ctx);
        let error = EnvbootError::Internal("boom".to_string());

        progress.step_started(1, 2, &Action::InstallUnderTest).await;
        progress.step_completed(1, 2, &Action::InstallUnderTest).await;
        progress
            .step_failed(2, 2, &Action::InstallUnderTest, &error)
            .await;
        progress.finish();
        assert!(progress.bar.is_none());
    }
}
