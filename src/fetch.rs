//! Bulk downloads over a single shared session.

use crate::session::{FileEntry, FtpSession};
use crate::utils::wildcard_match;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Downloads batches of files through one session. The session handles
/// one operation at a time, so transfers serialize on its lock;
/// `max_concurrent` bounds how many are queued up waiting for it.
pub struct BulkFetcher {
    session: Arc<Mutex<FtpSession>>,
    max_concurrent: usize,
}

impl BulkFetcher {
    pub fn new(session: Arc<Mutex<FtpSession>>, max_concurrent: usize) -> Self {
        Self {
            session,
            max_concurrent,
        }
    }

    /// Downloads every file in the working folder whose name matches
    /// `pattern` into `dest_dir`. Folders never match. Returns one
    /// `(name, outcome)` pair per matching file.
    pub async fn fetch_matching(
        &self,
        pattern: &str,
        dest_dir: &Path,
    ) -> Result<Vec<(String, Result<()>)>> {
        let entries = {
            let mut session = self.session.lock().await;
            session.list_files("", false).await?
        };

        let targets: Vec<(FileEntry, PathBuf)> = entries
            .into_iter()
            .filter(|entry| !entry.is_dir && wildcard_match(&entry.name, pattern))
            .map(|entry| {
                let local = dest_dir.join(&entry.name);
                (entry, local)
            })
            .collect();

        Ok(self.fetch_files(targets).await)
    }

    /// Downloads the given entries to their local paths with a progress
    /// bar per file.
    pub async fn fetch_files(
        &self,
        files: Vec<(FileEntry, PathBuf)>,
    ) -> Vec<(String, Result<()>)> {
        let multi = MultiProgress::new();

        stream::iter(files)
            .map(|(entry, local)| {
                let session = Arc::clone(&self.session);
                let bar = multi.add(ProgressBar::new(entry.size));

                async move {
                    let outcome = fetch_one(session, &entry, &local, bar).await;
                    (entry.name, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}

async fn fetch_one(
    session: Arc<Mutex<FtpSession>>,
    entry: &FileEntry,
    local: &Path,
    bar: ProgressBar,
) -> Result<()> {
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_message(format!("downloading {}", entry.name));

    if let Some(parent) = local.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut session = session.lock().await;
    session.download_file(&entry.name, local).await?;

    bar.finish_with_message(format!("✓ {}", entry.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ReplyStatus, Transport, TransportError, TransportResult};
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Wire {}

        #[async_trait]
        impl Transport for Wire {
            async fn list(&mut self, path: &str) -> TransportResult<(Vec<String>, ReplyStatus)>;
            async fn retrieve(&mut self, path: &str) -> TransportResult<(Vec<u8>, ReplyStatus)>;
            async fn store(&mut self, path: &str, data: &[u8]) -> TransportResult<ReplyStatus>;
            async fn delete(&mut self, path: &str) -> TransportResult<ReplyStatus>;
            async fn rename(&mut self, path: &str, new_name: &str) -> TransportResult<ReplyStatus>;
            async fn make_directory(&mut self, path: &str) -> TransportResult<ReplyStatus>;
            async fn remove_directory(&mut self, path: &str) -> TransportResult<ReplyStatus>;
            async fn modified_time(
                &mut self,
                path: &str,
            ) -> TransportResult<(ReplyStatus, Option<String>)>;
            async fn size(&mut self, path: &str) -> TransportResult<(ReplyStatus, Option<u64>)>;
        }
    }

    fn shared(wire: MockWire) -> Arc<Mutex<FtpSession>> {
        Arc::new(Mutex::new(FtpSession::new(Box::new(wire), "")))
    }

    #[tokio::test]
    async fn test_fetch_matching_skips_folders_and_non_matches() {
        let mut wire = MockWire::new();
        wire.expect_list().times(1).returning(|_| {
            Ok((
                vec![
                    "-rw-r--r-- 1 u g 4 Nov 15 2020 a.txt".to_string(),
                    "-rw-r--r-- 1 u g 4 Nov 15 2020 b.csv".to_string(),
                    "drwxr-xr-x 2 u g 4096 Nov 15 2020 sub.txt".to_string(),
                ],
                ReplyStatus::new(226, "ok"),
            ))
        });
        wire.expect_retrieve()
            .times(1)
            .returning(|_| Ok((b"data".to_vec(), ReplyStatus::new(226, "ok"))));

        let fetcher = BulkFetcher::new(shared(wire), 2);
        let dest = tempfile::tempdir().unwrap();

        let results = fetcher.fetch_matching("*.txt", dest.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a.txt");
        assert!(results[0].1.is_ok());
        assert_eq!(
            std::fs::read(dest.path().join("a.txt")).unwrap(),
            b"data".to_vec()
        );
    }

    #[tokio::test]
    async fn test_fetch_files_reports_per_file_failures() {
        let mut wire = MockWire::new();
        wire.expect_list().times(1).returning(|_| {
            Ok((
                vec![
                    "-rw-r--r-- 1 u g 4 Nov 15 2020 good.txt".to_string(),
                    "-rw-r--r-- 1 u g 4 Nov 15 2020 gone.txt".to_string(),
                ],
                ReplyStatus::new(226, "ok"),
            ))
        });
        wire.expect_retrieve().times(2).returning(|path| {
            if path.ends_with("good.txt") {
                Ok((b"ok".to_vec(), ReplyStatus::new(226, "ok")))
            } else {
                Err(TransportError::Unavailable(ReplyStatus::new(
                    550,
                    "no such file",
                )))
            }
        });

        let fetcher = BulkFetcher::new(shared(wire), 1);
        let dest = tempfile::tempdir().unwrap();

        let results = fetcher.fetch_matching("*", dest.path()).await.unwrap();
        assert_eq!(results.len(), 2);
        let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
        assert_eq!(ok, 1);
        assert!(dest.path().join("good.txt").exists());
        assert!(!dest.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn test_fetch_matching_with_no_matches_downloads_nothing() {
        let mut wire = MockWire::new();
        wire.expect_list().times(1).returning(|_| {
            Ok((
                vec!["-rw-r--r-- 1 u g 4 Nov 15 2020 a.txt".to_string()],
                ReplyStatus::new(226, "ok"),
            ))
        });

        let fetcher = BulkFetcher::new(shared(wire), 4);
        let dest = tempfile::tempdir().unwrap();

        let results = fetcher.fetch_matching("*.pdf", dest.path()).await.unwrap();
        assert!(results.is_empty());
    }
}
