//! Console output with automatic fallback to plain lines in CI
//!
//! Interactive terminals get `cliclack` logs and `indicatif` bars. Anything
//! else (pipes, CI runners) gets prefixed plain lines that read well in a
//! build log.
//!
//! # Example
//!
//! ```rust,ignore
//! use envboot::ui::{self, StepProgress, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "envboot bootstrap");
//!
//! let progress = StepProgress::new(&ctx);
//! pipeline.bootstrap(&progress).await?;
//! progress.finish();
//!
//! ui::outro_success(&ctx, "Environment ready");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, remark, section, step_info,
    step_ok_detail,
};
pub use progress::{StepProgress, TaskSpinner};
