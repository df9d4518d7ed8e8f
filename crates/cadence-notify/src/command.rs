//! Notifier that runs an external program such as `notify-send`

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::{DueNotice, Notifier, NotifyError, NotifyResult};

/// Environment variable carrying the notice tag to the command
pub const NOTICE_TAG_ENV: &str = "CADENCE_NOTICE_TAG";

/// Environment variable carrying the client id to the command
pub const NOTICE_CLIENT_ENV: &str = "CADENCE_CLIENT_ID";

/// Runs `<program> [args...] <title> <body>` once per notice.
///
/// The tag and client id are passed through [`NOTICE_TAG_ENV`] and
/// [`NOTICE_CLIENT_ENV`]. A non-zero exit status is a delivery failure.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `notify-send` with an application name
    pub fn notify_send() -> Self {
        Self::new("notify-send", vec!["--app-name=cadence".into()])
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn deliver(&self, notice: &DueNotice) -> NotifyResult<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&notice.title)
            .arg(&notice.body)
            .env(NOTICE_TAG_ENV, &notice.tag)
            .env(NOTICE_CLIENT_ENV, notice.client_id.as_str())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    NotifyError::Unavailable(format!("{}: {}", self.program, e))
                }
                ErrorKind::PermissionDenied => {
                    NotifyError::PermissionDenied(format!("{}: {}", self.program, e))
                }
                _ => NotifyError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        debug!(program = %self.program, tag = %notice.tag, "Notification command succeeded");
        Ok(())
    }
}
