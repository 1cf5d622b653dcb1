//! Output mode detection: fancy terminal, plain CI log or quiet

use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_ENV_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Forces plain output even on a terminal
const PLAIN_ENV_VAR: &str = "DEPIMAGE_PLAIN";

/// How human-oriented output is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiContext {
    interactive: bool,
    quiet: bool,
}

impl UiContext {
    /// Inspect stdout and the environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal() && !plain_requested(),
            quiet: false,
        }
    }

    /// Plain line-oriented output, as in CI
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            quiet: false,
        }
    }

    /// With `quiet`, only results (fingerprint, cache state, JSON) reach stdout
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Spinners, progress bars and cliclack framing
    pub fn use_fancy_output(&self) -> bool {
        self.interactive && !self.quiet
    }
}

fn plain_requested() -> bool {
    std::env::var_os(PLAIN_ENV_VAR).is_some()
        || CI_ENV_VARS.iter().any(|var| std::env::var_os(var).is_some())
}
