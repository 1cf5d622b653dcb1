//! UI module for consistent CLI output
//!
//! Uses `cliclack` for interactive output with automatic fallback to plain
//! output in CI/non-interactive environments. `--quiet` silences everything
//! so stdout carries only the machine-readable result.
//!
//! # Example
//!
//! ```rust,ignore
//! use depimage::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! ui::intro(&ctx, "depimage build");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Staging dependencies...");
//! // ... do work ...
//! spinner.stop("Staged 42 dependencies");
//!
//! ui::outro_success(&ctx, "Image up to date");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, step_info,
    step_ok_detail, step_warn_hint,
};
pub use progress::{BuildProgress, TaskSpinner};
