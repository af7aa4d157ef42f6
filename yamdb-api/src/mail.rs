//! Outgoing mail
//!
//! Signup mails the confirmation code through a [`Mailer`]. Delivery is
//! best-effort: callers log failures and carry on. Backends may block, so
//! async callers go through [`deliver`].

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;
use yamdb_common::config::{MailBackend, TomlConfig};
use yamdb_common::{Error, Result};

pub const CONFIRMATION_SUBJECT: &str = "Confirm your registration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    /// Message carrying a signup confirmation code
    pub fn confirmation(from: &str, to: &str, username: &str, code: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            body: format!(
                "Hello, {}!\n\nYour confirmation code: {}\n\n\
                 Exchange it for an access token at /api/v1/auth/token/.\n",
                username, code
            ),
        }
    }

    /// Code embedded by [`Mail::confirmation`]
    pub fn confirmation_code(&self) -> Option<&str> {
        self.body
            .lines()
            .find_map(|line| line.strip_prefix("Your confirmation code: "))
            .map(str::trim)
    }

    fn render(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}",
            self.from,
            self.to,
            self.subject,
            Utc::now().to_rfc2822(),
            self.body
        )
    }
}

/// Mail delivery backend
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &Mail) -> Result<()>;
}

/// Writes each message to the log
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &Mail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "Outgoing mail:\n{}", mail.body);
        Ok(())
    }
}

/// Writes each message to its own file in an outbox directory
#[derive(Debug)]
pub struct FileMailer {
    outbox: PathBuf,
    sequence: AtomicU64,
}

impl FileMailer {
    pub fn new(outbox: PathBuf) -> Self {
        Self {
            outbox,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn outbox(&self) -> &PathBuf {
        &self.outbox
    }
}

impl Mailer for FileMailer {
    fn send(&self, mail: &Mail) -> Result<()> {
        std::fs::create_dir_all(&self.outbox)?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%d-%H%M%S%.6f"),
            sequence
        );
        let path = self.outbox.join(file_name);
        std::fs::write(&path, mail.render())?;

        info!("Mail to {} written to {}", mail.to, path.display());
        Ok(())
    }
}

/// Keeps messages in memory
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Mail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: &Mail) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(mail.clone());
        Ok(())
    }
}

/// Send `mail` on the blocking thread pool
pub async fn deliver(mailer: Arc<dyn Mailer>, mail: Mail) -> Result<()> {
    tokio::task::spawn_blocking(move || mailer.send(&mail))
        .await
        .map_err(|e| Error::Internal(format!("Mail delivery task failed: {}", e)))?
}

/// Build the backend selected in config
pub fn mailer_from_config(config: &TomlConfig) -> Arc<dyn Mailer> {
    match config.mail.backend {
        MailBackend::Log => Arc::new(LogMailer),
        MailBackend::File => Arc::new(FileMailer::new(config.outbox_dir())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_code_extracted_from_body() {
        let mail = Mail::confirmation("noreply@x.io", "reader@x.io", "reader", "AB12CD");
        assert_eq!(mail.subject, CONFIRMATION_SUBJECT);
        assert_eq!(mail.confirmation_code(), Some("AB12CD"));
    }

    #[test]
    fn test_memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        mailer
            .send(&Mail::confirmation("f@x.io", "a@x.io", "a", "AAAAAA"))
            .unwrap();
        mailer
            .send(&Mail::confirmation("f@x.io", "a@x.io", "a", "BBBBBB"))
            .unwrap();

        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(
            mailer.last_to("a@x.io").unwrap().confirmation_code(),
            Some("BBBBBB")
        );
        assert!(mailer.last_to("b@x.io").is_none());
    }

    #[test]
    fn test_file_mailer_writes_one_file_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = FileMailer::new(dir.path().join("outbox"));

        mailer
            .send(&Mail::confirmation("f@x.io", "a@x.io", "a", "AAAAAA"))
            .unwrap();
        mailer
            .send(&Mail::confirmation("f@x.io", "b@x.io", "b", "BBBBBB"))
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(mailer.outbox()).unwrap().collect();
        assert_eq!(files.len(), 2);

        let content = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("Subject: Confirm your registration"));
        assert!(content.contains("Your confirmation code: "));
    }

    #[tokio::test]
    async fn test_deliver_runs_file_mailer_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("outbox");
        let mailer: Arc<dyn Mailer> = Arc::new(FileMailer::new(outbox.clone()));

        deliver(mailer, Mail::confirmation("f@x.io", "a@x.io", "a", "AAAAAA"))
            .await
            .unwrap();

        assert_eq!(std::fs::read_dir(outbox).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_deliver_reports_backend_errors() {
        let dir = tempfile::tempdir().unwrap();
        // Outbox path is occupied by a regular file
        let blocked = dir.path().join("outbox");
        std::fs::write(&blocked, "").unwrap();
        let mailer: Arc<dyn Mailer> = Arc::new(FileMailer::new(blocked));

        let result = deliver(mailer, Mail::confirmation("f@x.io", "a@x.io", "a", "AAAAAA")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_log_mailer_never_fails() {
        assert!(LogMailer
            .send(&Mail::confirmation("f@x.io", "a@x.io", "a", "AAAAAA"))
            .is_ok());
    }
}
