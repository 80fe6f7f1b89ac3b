//! Report delivery
//!
//! The engine composes the report; delivery is this collaborator's problem.
//! With both a from and at least one to address set, the report is piped to
//! the local `sendmail`; otherwise delivery is a no-op.

use crate::config::EmailSettings;
use crate::error::{MirrorError, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Delivers one composed run report
pub trait Notifier {
    /// Send or drop the report
    fn deliver(&self, report: &str) -> Result<()>;
}

/// Pick the delivery mechanism for the run's email settings
pub fn for_settings(settings: &EmailSettings) -> Box<dyn Notifier> {
    match (&settings.from, settings.to.is_empty()) {
        (Some(from), false) => Box::new(SendmailNotifier {
            from: from.clone(),
            to: settings.to.clone(),
            subject: settings.subject.clone(),
        }),
        _ => Box::new(NoopNotifier),
    }
}

/// Pipes an RFC-822-style message into the local `sendmail`
pub struct SendmailNotifier {
    from: String,
    to: Vec<String>,
    subject: String,
}

/// Build the full message, headers included
fn compose(from: &str, to: &[String], subject: &str, body: &str) -> String {
    format!(
        "From: {from}\nTo: {}\nSubject: {subject}\n\n{body}",
        to.join(", ")
    )
}

impl Notifier for SendmailNotifier {
    fn deliver(&self, report: &str) -> Result<()> {
        let message = compose(&self.from, &self.to, &self.subject, report);

        let mut child = Command::new("sendmail")
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MirrorError::Notification(format!("cannot run sendmail: {e}")))?;

        child
            .stdin
            .take()
            .ok_or_else(|| MirrorError::Notification("no stdin pipe".into()))?
            .write_all(message.as_bytes())
            .map_err(|e| MirrorError::Notification(e.to_string()))?;

        let output = child
            .wait_with_output()
            .map_err(|e| MirrorError::Notification(e.to_string()))?;
        if !output.status.success() {
            return Err(MirrorError::Notification(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        info!(to = %self.to.join(","), "report emailed");
        Ok(())
    }
}

/// Used when no from/to addresses were configured
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn deliver(&self, _report: &str) -> Result<()> {
        debug!("no email addresses configured, report not sent");
        Ok(())
    }
}
