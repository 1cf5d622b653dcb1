//! Image builder abstraction
//!
//! The image itself is produced by an external tool (`podman build`,
//! `docker build`). This module prepares the build context, invokes the tool
//! and turns its exit status into a result.

pub mod command;
pub mod context;
mod process;

pub use command::CommandImageBuilder;
pub use context::{BuildContext, LIB_DIR_NAME, MANIFEST_FILE_NAME};

use crate::error::DepImageResult;
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Callback receiving each line of builder output
pub type OutputCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Tags applied to a built dependency image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTags {
    /// Human-readable name, e.g. `myapp-deps`
    pub stable: String,
    /// Name qualified with the fingerprint, e.g. `myapp-deps:3f2a...`
    pub qualified: String,
}

impl ImageTags {
    pub fn new(name: &str, fingerprint: &Fingerprint) -> Self {
        Self {
            stable: name.to_string(),
            qualified: format!("{}:{}", name, fingerprint),
        }
    }

    /// Both tags, stable first
    pub fn all(&self) -> [&str; 2] {
        [&self.stable, &self.qualified]
    }
}

impl fmt::Display for ImageTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.stable, self.qualified)
    }
}

/// Per-build knobs
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Kill the builder and fail if it runs longer than this
    pub timeout: Option<Duration>,

    /// Kill the builder and fail when cancelled
    pub cancel: CancellationToken,

    /// Receives every stdout/stderr line of the builder
    pub on_output: Option<OutputCallback>,
}

impl BuildOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_output(mut self, on_output: OutputCallback) -> Self {
        self.on_output = Some(on_output);
        self
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("on_output", &self.on_output.is_some())
            .finish()
    }
}

/// Something that can turn a build context into a tagged image
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `context` and apply both `tags`.
    ///
    /// Must return an error for any unsuccessful build; the caller only
    /// records the fingerprint after `Ok(())`.
    async fn build(
        &self,
        context: &BuildContext,
        tags: &ImageTags,
        options: &BuildOptions,
    ) -> DepImageResult<()>;

    /// Get the human-readable builder name for display
    fn builder_name(&self) -> &str;
}

/// Extract the useful tail of build output for error diagnostics.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. Pipes that were
/// not captured are treated as already closed. Lines are decoded lossily;
/// a pipe that fails to read is dropped so the child cannot block on it.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = next_line(&mut stderr_reader), if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = next_line(&mut stdout_reader), if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}

async fn next_line<R>(reader: &mut Option<Split<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let segment = match reader {
        Some(reader) => reader.next_segment().await,
        None => return None,
    };

    match segment {
        Ok(Some(mut bytes)) => {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Stopped reading builder output: {}", e);
            *reader = None;
            None
        }
    }
}
