use std::io;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Session event log. Every entry goes to `tracing`; when a file is
/// configured it is also appended there as `<RFC3339> <text>`.
pub struct Journal {
    sink: Option<(PathBuf, Mutex<File>)>,
}

impl Journal {
    /// Log through `tracing` only.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self { sink: Some((path.to_path_buf(), Mutex::new(file))) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(p, _)| p.as_path())
    }

    pub async fn record(&self, text: &str) {
        info!(target: "journal", "{}", text);
        self.append(text).await;
    }

    /// Same as `record`, at warn level.
    pub async fn alert(&self, text: &str) {
        warn!(target: "journal", "{}", text);
        self.append(text).await;
    }

    async fn append(&self, text: &str) {
        let Some((path, file)) = &self.sink else { return };
        let now = OffsetDateTime::now_utc();
        let ts = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());
        let line = format!("{} {}\n", ts, text);

        let mut file = file.lock().await;
        let mut res = file.write_all(line.as_bytes()).await;
        if res.is_ok() {
            res = file.flush().await;
        }
        if let Err(e) = res {
            warn!("journal: write to {} failed: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/session.log");

        let journal = Journal::open(&path).await.unwrap();
        journal.record("session: connecting").await;
        journal.alert("battery: act(land)").await;
        drop(journal);

        let journal = Journal::open(&path).await.unwrap();
        journal.record("session: done").await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let (ts, rest) = lines[1].split_once(' ').unwrap();
        assert!(ts.contains('T') && ts.ends_with('Z'), "{}", ts);
        assert_eq!(rest, "battery: act(land)");
        assert!(lines[2].ends_with(" session: done"));
    }

    #[tokio::test]
    async fn disabled_journal_is_silent() {
        let journal = Journal::disabled();
        assert!(journal.path().is_none());
        journal.record("nothing to see").await;
    }

    #[tokio::test]
    async fn unopenable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Journal::open(dir.path()).await.is_err());
    }
}
