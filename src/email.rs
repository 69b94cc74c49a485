// 📧 Email Source - interface boundary for notification retrieval
//
// The pipeline only needs a sequence of (id, body, subject, received)
// tuples and a way to mark messages processed. The file-based source keeps
// one message per file in an inbox directory; Gmail-style retrieval lives
// behind the same trait.

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw email data handed to the parser.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.id.is_empty(), "email id cannot be empty");
        ensure!(!self.body.trim().is_empty(), "email body cannot be empty");
        Ok(())
    }
}

/// A source of unprocessed bank-notification emails.
pub trait EmailSource {
    fn fetch_unread(&mut self) -> Result<Vec<EmailMessage>>;

    fn mark_processed(&mut self, id: &str) -> Result<()>;
}

/// File-based email source: every file in the inbox directory is one
/// message (its name is the message id); processed messages move to a
/// separate directory.
pub struct MailDirSource {
    inbox: PathBuf,
    processed: PathBuf,
}

impl MailDirSource {
    /// Open the source, creating both directories when missing.
    pub fn open(inbox: &Path, processed: &Path) -> Result<Self> {
        fs::create_dir_all(inbox)
            .with_context(|| format!("Failed to create inbox directory {:?}", inbox))?;
        fs::create_dir_all(processed)
            .with_context(|| format!("Failed to create processed directory {:?}", processed))?;

        Ok(MailDirSource { inbox: inbox.to_path_buf(), processed: processed.to_path_buf() })
    }
}

impl EmailSource for MailDirSource {
    fn fetch_unread(&mut self) -> Result<Vec<EmailMessage>> {
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.inbox)
            .with_context(|| format!("Failed to read inbox directory {:?}", self.inbox))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        let mut messages = Vec::new();
        for path in entries {
            let id = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let body = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read message file {:?}", path))?;

            let received_at = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            debug!("fetched message {} ({} bytes)", id, body.len());
            messages.push(EmailMessage {
                id,
                sender: header_value(&body, "From").unwrap_or_default(),
                subject: header_value(&body, "Subject").unwrap_or_default(),
                body,
                received_at,
            });
        }

        info!("fetched {} unread messages from {:?}", messages.len(), self.inbox);
        Ok(messages)
    }

    fn mark_processed(&mut self, id: &str) -> Result<()> {
        let from = self.inbox.join(id);
        let to = self.processed.join(id);
        fs::rename(&from, &to)
            .with_context(|| format!("Failed to move message {} to processed", id))?;
        debug!("marked message {} as processed", id);
        Ok(())
    }
}

/// First "Name: value" header line in the message text, if any.
fn header_value(body: &str, name: &str) -> Option<String> {
    let prefix = format!("{}:", name);
    body.lines().find_map(|line| {
        let trimmed = line.trim_start();
        match trimmed.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(&prefix) => {
                Some(trimmed[prefix.len()..].trim().to_string())
            }
            _ => None,
        }
    })
}
