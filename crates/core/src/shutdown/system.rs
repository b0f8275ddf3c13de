use async_trait::async_trait;

use super::{ShutdownError, ShutdownSink};

/// Platform `shutdown` invocation with an OS-level grace period.
#[derive(Debug, Clone, Copy)]
pub struct SystemShutdown {
    grace_secs: u32,
}

impl SystemShutdown {
    pub fn new(grace_secs: u32) -> Self {
        Self { grace_secs }
    }
}

/// Program and arguments for the current platform.
pub fn shutdown_command(grace_secs: u32) -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("shutdown", vec!["/s".into(), "/t".into(), grace_secs.to_string()])
    } else {
        // POSIX shutdown only takes whole minutes.
        let when = match grace_secs.div_ceil(60) {
            0 => "now".to_owned(),
            minutes => format!("+{minutes}"),
        };
        ("shutdown", vec!["-h".into(), when])
    }
}

#[async_trait]
impl ShutdownSink for SystemShutdown {
    fn name(&self) -> &str {
        "system"
    }

    async fn shutdown_now(&self) -> Result<(), ShutdownError> {
        let (program, args) = shutdown_command(self.grace_secs);
        tracing::error!(program, ?args, grace_secs = self.grace_secs, "issuing host shutdown");

        let status = tokio::process::Command::new(program)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .status()
            .await
            .map_err(|source| ShutdownError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ShutdownError::CommandFailed {
                program: program.to_owned(),
                status: status.to_string(),
            })
        }
    }
}
