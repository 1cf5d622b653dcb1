//! Image builder that shells out to a container CLI
//!
//! Runs `<program> build <context> --tag <stable> --tag <qualified>`.
//! Works with podman and docker; only the exit status decides success.

use crate::builder::process::ScopedChild;
use crate::builder::{
    build_error_output, stream_child_output, BuildContext, BuildOptions, ImageBuilder, ImageTags,
};
use crate::error::{DepImageError, DepImageResult};
use async_trait::async_trait;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info};

/// Container CLI image builder
#[derive(Debug, Clone)]
pub struct CommandImageBuilder {
    program: String,
}

enum BuildExit {
    Exited(DepImageResult<(ExitStatus, Vec<String>)>),
    TimedOut,
    Cancelled,
}

impl CommandImageBuilder {
    /// Builder invoking `program` (e.g. "podman" or "docker")
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program
    pub fn build_args(&self, context: &BuildContext, tags: &ImageTags) -> Vec<String> {
        let mut args = vec!["build".to_string(), context.root().display().to_string()];
        for tag in tags.all() {
            args.push("--tag".to_string());
            args.push(tag.to_string());
        }
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }
}

impl Default for CommandImageBuilder {
    fn default() -> Self {
        Self::new("podman")
    }
}

#[async_trait]
impl ImageBuilder for CommandImageBuilder {
    async fn build(
        &self,
        context: &BuildContext,
        tags: &ImageTags,
        options: &BuildOptions,
    ) -> DepImageResult<()> {
        let args = self.build_args(context, tags);
        let command_line = self.command_line(&args);
        info!("Building image: {}", command_line);

        let mut command = Command::new(&self.program);
        command.args(&args);
        let mut child = ScopedChild::spawn(command, &command_line)?;

        let on_output = |line: String| {
            debug!(target: "depimage::builder", "{}", line);
            if let Some(ref callback) = options.on_output {
                callback(line);
            }
        };

        let exit = {
            let run = async {
                let output = stream_child_output(child.child_mut(), &on_output).await;
                let status = child.wait().await?;
                Ok::<_, DepImageError>((status, output))
            };
            let deadline = async {
                match options.timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                result = run => BuildExit::Exited(result),
                _ = deadline => BuildExit::TimedOut,
                _ = options.cancel.cancelled() => BuildExit::Cancelled,
            }
        };

        match exit {
            BuildExit::Exited(result) => {
                let (status, output) = result?;
                if status.success() {
                    info!("Built image {}", tags);
                    Ok(())
                } else {
                    Err(DepImageError::Build {
                        command: command_line,
                        code: status.code().unwrap_or(-1),
                        output: build_error_output(&output),
                    })
                }
            }
            BuildExit::TimedOut => {
                child.terminate().await;
                Err(DepImageError::BuildTimeout {
                    command: command_line,
                    timeout: options.timeout.unwrap_or_default(),
                })
            }
            BuildExit::Cancelled => {
                child.terminate().await;
                Err(DepImageError::BuildCancelled(command_line))
            }
        }
    }

    fn builder_name(&self) -> &str {
        &self.program
    }
}
