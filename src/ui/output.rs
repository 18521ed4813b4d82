//! Output functions for consistent CLI formatting
//!
//! Plain mode prefixes every line with a bracketed status so build logs can
//! be grepped for `[FAIL]`.

use super::context::UiContext;
use console::{style, StyledObject};

/// Status of a single output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Info,
    Warn,
    Fail,
}

impl Level {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Self::Ok => style("[OK]").green(),
            Self::Info => style("[INFO]").cyan(),
            Self::Warn => style("[WARN]").yellow(),
            Self::Fail => style("[FAIL]").red(),
        }
    }
}

fn step(ctx: &UiContext, level: Level, message: &str) {
    if !ctx.use_fancy_output() {
        println!("  {} {}", level.tag(), message);
        return;
    }

    match level {
        Level::Ok => cliclack::log::success(message),
        Level::Info => cliclack::log::info(message),
        Level::Warn => cliclack::log::warning(message),
        Level::Fail => cliclack::log::error(message),
    }
    .ok();
}

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{} {}", style("==>").cyan(), style(title).bold());
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", Level::Ok.tag(), message);
    }
}

/// Display error outro. The error itself is reported on stderr by `main`.
pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).red().bold()).ok();
    } else {
        println!("{} {}", Level::Fail.tag(), message);
    }
}

/// Display a section header
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{} {}", style("--").dim(), style(title).bold());
    }
}

/// Success with a dimmed detail, e.g. a path
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(
        ctx,
        Level::Ok,
        &format!("{} ({})", message, style(detail).dim()),
    );
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Level::Info, message);
}

/// Display a remark/hint
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key-value pair colored (or tagged, in plain mode) by whether it is healthy
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    let level = if ok { Level::Ok } else { Level::Warn };

    if ctx.use_fancy_output() {
        let value = if ok {
            style(value).green()
        } else {
            style(value).yellow()
        };
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {} {}: {}", level.tag(), key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_non_interactive() {
        let ctx = UiContext::non_interactive();
        // These should not panic
        intro(&ctx, "envboot run");
        section(&ctx, "Bootstrap");
        step_ok_detail(&ctx, "Configuration initialized", "envboot.toml");
        step_info(&ctx, "Display :99 not running");
        key_value_status(&ctx, "Base distribution", "missing", false);
        outro_success(&ctx, "Tests passed");
    }

    #[test]
    fn plain_tags() {
        assert_eq!(Level::Ok.tag().force_styling(false).to_string(), "[OK]");
        assert_eq!(Level::Fail.tag().force_styling(false).to_string(), "[FAIL]");
    }
}
