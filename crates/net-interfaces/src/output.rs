//! Append-only output log

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use netprov_core::Result;

const ENTRY_RULE: &str = "=====================================";
const HEADER_RULE: &str = "-------------------------------------";
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// Timestamped text log that retrieved configuration is saved to.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` as a new entry stamped with the local time
    pub async fn append(&self, text: &str) -> Result<()> {
        let entry = format_entry(&Local::now(), text);

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        log::info!("Wrote {} bytes to {}", text.len(), self.path.display());
        Ok(())
    }
}

fn format_entry<Tz>(at: &DateTime<Tz>, text: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}\n{}\n{}\n\n{}\n",
        ENTRY_RULE,
        at.format(TIMESTAMP_FORMAT),
        HEADER_RULE,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_entry_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(
            format_entry(&at, "interface Loopback5"),
            "=====================================\n03/01/2024, 14:05:09\n-------------------------------------\n\ninterface Loopback5\n"
        );
    }

    #[tokio::test]
    async fn test_append_keeps_previous_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(temp_dir.path().join("logs").join("output.txt"));

        sink.append("first").await.unwrap();
        sink.append("second").await.unwrap();

        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        assert_eq!(content.matches(ENTRY_RULE).count(), 2);
        assert!(content.find("first").unwrap() < content.find("second").unwrap());
    }
}
