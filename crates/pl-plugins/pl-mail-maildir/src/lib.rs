//! # pl-mail-maildir
//!
//! Local maildir implementation of `EmailSender`.
//! Messages are written under `tmp/` and renamed into `new/`, so a reader
//! never sees a partial file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pl_core::identity;
use pl_core::models::EmailMessage;
use pl_core::traits::EmailSender;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SUBDIRS: [&str; 3] = ["tmp", "new", "cur"];

pub struct MaildirSender {
    /// Maildir root (e.g., "/var/local/maildir/parley")
    root: PathBuf,
    /// Guards the one-time creation of the maildir layout
    initialized: Mutex<bool>,
}

impl MaildirSender {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: Mutex::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `tmp/`, `new/` and `cur/`. Concurrent first sends wait on the
    /// lock instead of racing on directory creation.
    async fn ensure_layout(&self) -> anyhow::Result<()> {
        let mut ready = self.initialized.lock().await;
        if *ready {
            return Ok(());
        }
        for sub in SUBDIRS {
            let dir = self.root.join(sub);
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        *ready = true;
        info!(root = %self.root.display(), "maildir initialized");
        Ok(())
    }
}

/// Renders `message` as a plain-text RFC 2822 mail.
pub fn render_message(message: &EmailMessage, unique: &str) -> String {
    let date = DateTime::<Utc>::from_timestamp(message.timestamp, 0).unwrap_or_else(Utc::now);
    let mut out = String::new();
    out.push_str(&format!("From: {}\n", message.from));
    out.push_str(&format!("To: {}\n", message.to.join(",")));
    out.push_str(&format!("Subject: {}\n", message.subject));
    out.push_str(&format!("Date: {}\n", date.to_rfc2822()));
    out.push_str(&format!("Message-ID: <{unique}@localhost>\n"));
    out.push_str("MIME-Version: 1.0\n");
    out.push_str("Content-Type: text/plain; charset=\"UTF-8\"\n");
    out.push('\n');
    out.push_str(&message.body);
    out
}

#[async_trait]
impl EmailSender for MaildirSender {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        self.ensure_layout().await?;

        let unique = format!("{}.{}", message.timestamp, identity::generate_secret_key()?);
        let file_name = format!("{unique}.parley");
        let tmp_path = self.root.join("tmp").join(&file_name);
        let new_path = self.root.join("new").join(&file_name);

        fs::write(&tmp_path, render_message(&message, &unique))
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &new_path)
            .await
            .with_context(|| format!("delivering {}", new_path.display()))?;

        debug!(path = %new_path.display(), subject = %message.subject, "mail delivered");
        Ok(())
    }
}
