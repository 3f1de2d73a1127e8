//! The stateful FTP session: working folder, listing cache, timestamp
//! strategy and per-operation status capture.

pub mod dates;
pub mod listing;
pub mod path;

use std::fmt::Display;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use tracing::{debug, warn};

use crate::transport::{ReplyStatus, Transport, TransportError, TransportResult};

pub use listing::FileEntry;

/// Server support for direct modification-time queries, learned lazily
/// from the first few replies and then relied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MdtmSupport {
    #[default]
    Unknown,
    Supported,
    Unsupported,
}

/// Name and content of the throwaway file uploaded by
/// [`FtpSession::time_diff`].
const PROBE_NAME: &str = "clockprobe.txt";
const PROBE_CONTENT: &[u8] = b"clockprobe";

/// Wildcard selecting every entry; gets the same cache treatment as no
/// filter at all.
const MATCH_ALL: &str = "*";

/// A stateful conversation with one FTP server.
///
/// The session tracks a working folder, keeps the last full listing of
/// that folder as a cache, and remembers per-server quirks (whether direct
/// timestamp queries work) for its whole lifetime. Those quirks are
/// per-session fields, so sessions against different servers never
/// interfere.
///
/// Every method takes `&mut self` and finishes its transport round trip
/// before returning, so a session is single-threaded by construction. Use
/// one session per conversation, or wrap it in a mutex to share it.
pub struct FtpSession {
    transport: Box<dyn Transport>,
    root_folder: String,
    working_folder: String,
    cached_listing: Vec<FileEntry>,
    cache_valid_for: Option<String>,
    cache_dirty: bool,
    mdtm_support: MdtmSupport,
    last_status: Option<ReplyStatus>,
    last_error: Option<String>,
}

impl std::fmt::Debug for FtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSession")
            .field("root_folder", &self.root_folder)
            .field("working_folder", &self.working_folder)
            .field("cached_listing", &self.cached_listing)
            .field("cache_valid_for", &self.cache_valid_for)
            .field("cache_dirty", &self.cache_dirty)
            .field("mdtm_support", &self.mdtm_support)
            .field("last_status", &self.last_status)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl FtpSession {
    /// Opens a session rooted at `root_folder` (normalized; `""` or `/`
    /// means the server's own root). No traffic happens until the first
    /// operation.
    pub fn new(transport: Box<dyn Transport>, root_folder: &str) -> Self {
        Self {
            transport,
            root_folder: path::normalize_root(root_folder),
            working_folder: String::new(),
            cached_listing: Vec::new(),
            cache_valid_for: None,
            cache_dirty: true,
            mdtm_support: MdtmSupport::default(),
            last_status: None,
            last_error: None,
        }
    }

    /// Selects the remote working folder. A `/`-prefixed folder replaces
    /// the current one, anything else descends into it, and `""` or `/`
    /// returns to the root.
    ///
    /// Never talks to the server and always succeeds; an invalid folder
    /// surfaces on the next listing or file operation instead.
    pub fn change_folder(&mut self, folder: &str) -> bool {
        self.cache_dirty = true;
        self.working_folder = path::push_folder(&self.working_folder, folder);
        true
    }

    /// The full remote path currently selected: root plus working folder.
    pub fn current_folder(&self) -> String {
        format!("{}{}", self.root_folder, self.working_folder)
    }

    /// Detailed listing of the working folder, optionally narrowed by a
    /// server-side wildcard such as `*.txt` or `sub/*.csv`.
    ///
    /// Unfiltered results are cached and served back until something
    /// invalidates them (navigation or any mutating operation). Filtered
    /// results are always fetched live and never replace the cache, since
    /// they are not a faithful snapshot of the folder's contents.
    pub async fn list_files(
        &mut self,
        filter: &str,
        force_refresh: bool,
    ) -> Result<Vec<FileEntry>> {
        let filter = filter.trim();
        let unfiltered = filter.is_empty() || filter == MATCH_ALL;

        let stale = self.cache_dirty
            || self.cache_valid_for.as_deref() != Some(self.working_folder.as_str());
        if !force_refresh && unfiltered && !stale {
            debug!("serving listing of {} from cache", self.current_folder());
            return Ok(self.cached_listing.clone());
        }

        let request = path::listing_path(
            &self.current_folder(),
            if unfiltered { "" } else { filter },
        );
        debug!("fetching live listing of {request}");
        let (lines, status) = match self.transport.list(&request).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.fail(err, "listing failed")),
        };
        self.note(&status);

        let now = Local::now();
        let entries: Vec<FileEntry> = lines
            .iter()
            .filter_map(|line| listing::parse_line(line, now))
            .collect();

        if unfiltered {
            self.cached_listing = entries.clone();
            self.cache_valid_for = Some(self.working_folder.clone());
            self.cache_dirty = false;
        }
        Ok(entries)
    }

    /// Plain file names, with the same filtering and cache behavior as
    /// [`Self::list_files`].
    pub async fn list_names(&mut self, filter: &str, force_refresh: bool) -> Result<Vec<String>> {
        let entries = self.list_files(filter, force_refresh).await?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    /// Looks up a single entry of the working folder by name,
    /// case-insensitively, through the listing cache.
    pub async fn find_file(&mut self, name: &str) -> Result<Option<FileEntry>> {
        let entries = self.list_files("", false).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name)))
    }

    /// Downloads `remote` (a name in the working folder) into memory.
    pub async fn download_bytes(&mut self, remote: &str) -> Result<Vec<u8>> {
        let remote_path = self.file_path(remote);
        let (data, status) = match self.transport.retrieve(&remote_path).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.fail(err, "download failed")),
        };
        self.note(&status);
        debug!("downloaded {} bytes from {remote_path}", data.len());
        Ok(data)
    }

    /// Downloads a remote file and returns its contents as UTF-8 text.
    pub async fn download_text(&mut self, remote: &str) -> Result<String> {
        let data = self.download_bytes(remote).await?;
        String::from_utf8(data).with_context(|| format!("{remote} is not valid UTF-8"))
    }

    /// Downloads a remote file onto the local filesystem.
    pub async fn download_file(&mut self, remote: &str, local: &Path) -> Result<()> {
        let data = self.download_bytes(remote).await?;
        std::fs::write(local, data).with_context(|| format!("writing {}", local.display()))?;
        Ok(())
    }

    /// Uploads a local file under `remote` in the working folder. Returns
    /// `false` with diagnostics recorded instead of raising.
    pub async fn upload_file(&mut self, local: &Path, remote: &str) -> bool {
        let data = match std::fs::read(local) {
            Ok(data) => data,
            Err(err) => {
                self.last_error = Some(format!("reading {} => {err}", local.display()));
                return false;
            }
        };
        self.upload_bytes(remote, &data).await
    }

    /// Stores raw bytes under `remote` in the working folder, replacing
    /// any existing file.
    pub async fn upload_bytes(&mut self, remote: &str, data: &[u8]) -> bool {
        self.cache_dirty = true;
        let remote_path = self.file_path(remote);
        let result = self.transport.store(&remote_path, data).await;
        self.settle("upload", result)
    }

    /// Deletes a file in the working folder.
    pub async fn delete_file(&mut self, name: &str) -> bool {
        self.cache_dirty = true;
        let remote_path = self.file_path(name);
        let result = self.transport.delete(&remote_path).await;
        self.settle("delete", result)
    }

    /// Renames a file in the working folder; `new_name` is a bare name,
    /// the file stays where it is.
    pub async fn rename_file(&mut self, name: &str, new_name: &str) -> bool {
        self.cache_dirty = true;
        let remote_path = self.file_path(name);
        let result = self.transport.rename(&remote_path, new_name).await;
        self.settle("rename", result)
    }

    /// Creates a subfolder of the working folder.
    pub async fn create_folder(&mut self, name: &str) -> bool {
        self.cache_dirty = true;
        let remote_path = self.file_path(name);
        let result = self.transport.make_directory(&remote_path).await;
        self.settle("create folder", result)
    }

    /// Removes an (empty) subfolder of the working folder.
    pub async fn delete_folder(&mut self, name: &str) -> bool {
        self.cache_dirty = true;
        let remote_path = self.file_path(name);
        let result = self.transport.remove_directory(&remote_path).await;
        self.settle("remove folder", result)
    }

    /// Size in bytes of a remote file, straight from the server (the
    /// listing cache is not consulted). `Ok(None)` when the file is
    /// absent.
    pub async fn file_size(&mut self, name: &str) -> Result<Option<u64>> {
        let remote_path = self.file_path(name);
        match self.transport.size(&remote_path).await {
            Ok((status, size)) => {
                self.note(&status);
                Ok(size)
            }
            Err(TransportError::Unavailable(status)) => {
                self.note(&status);
                Ok(None)
            }
            Err(err) => Err(self.fail(err, "size query failed")),
        }
    }

    /// Modification time of a remote file; `Ok(None)` when the file is
    /// absent or its date cannot be determined.
    ///
    /// Uses the server's direct timestamp query until the server declares
    /// it unsupported; from then on, for the rest of the session's life,
    /// dates come from directory listings instead.
    pub async fn modified_time(&mut self, name: &str) -> Result<Option<DateTime<Local>>> {
        if self.mdtm_support == MdtmSupport::Unsupported {
            return self.modified_time_from_listing(name).await;
        }

        let remote_path = self.file_path(name);
        match self.transport.modified_time(&remote_path).await {
            Ok((status, raw)) => {
                self.note(&status);
                if self.mdtm_support == MdtmSupport::Unknown {
                    self.mdtm_support = MdtmSupport::Supported;
                }
                Ok(raw.as_deref().and_then(parse_mdtm))
            }
            Err(TransportError::Unsupported(status)) => {
                self.note(&status);
                warn!("server does not support timestamp queries, using listings from now on");
                self.mdtm_support = MdtmSupport::Unsupported;
                self.modified_time_from_listing(name).await
            }
            Err(TransportError::Unavailable(status)) => {
                self.note(&status);
                Ok(None)
            }
            Err(err) => Err(self.fail(err, "timestamp query failed")),
        }
    }

    /// Measures the clock offset between this machine and the server by
    /// uploading a probe file and reading back the timestamp the server
    /// gave it. Positive means the local clock is ahead of the server's.
    ///
    /// This is the one operation that fails hard: without a successful
    /// probe upload and read-back there is no meaningful answer.
    pub async fn time_diff(&mut self) -> Result<Duration> {
        let started = Local::now();
        if self.modified_time(PROBE_NAME).await?.is_some() {
            self.delete_file(PROBE_NAME).await;
        }
        if !self.upload_bytes(PROBE_NAME, PROBE_CONTENT).await {
            bail!(
                "could not upload {PROBE_NAME} for the clock comparison: {}",
                self.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        let Some(stamp) = self.modified_time(PROBE_NAME).await? else {
            bail!("{PROBE_NAME} was uploaded but the server reports no timestamp for it");
        };
        Ok(started - stamp)
    }

    /// Reply code of the most recent transport response, if any.
    pub fn last_status_code(&self) -> Option<u32> {
        self.last_status.as_ref().map(|status| status.code)
    }

    /// Text of the most recent transport response.
    pub fn last_status_description(&self) -> Option<&str> {
        self.last_status
            .as_ref()
            .map(|status| status.description.as_str())
    }

    /// Arrow-joined cause chain of the most recent failure. Stays in
    /// place until the next failure overwrites it.
    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// What the server has shown about direct timestamp queries so far.
    pub fn timestamp_support(&self) -> MdtmSupport {
        self.mdtm_support
    }

    fn file_path(&self, name: &str) -> String {
        path::join_name(&self.current_folder(), name)
    }

    fn note(&mut self, status: &ReplyStatus) {
        self.last_status = Some(status.clone());
    }

    /// Records a transport failure (reply status and cause chain) and
    /// converts it for propagation.
    fn fail<C>(&mut self, err: TransportError, what: C) -> anyhow::Error
    where
        C: Display + Send + Sync + 'static,
    {
        if let Some(status) = err.status().cloned() {
            self.note(&status);
        }
        let err = anyhow::Error::new(err).context(what);
        self.last_error = Some(chain_message(&err));
        err
    }

    /// Shared tail of every mutating operation: the cache is already
    /// dirty, so record the reply and fold it into a boolean.
    fn settle(&mut self, op: &'static str, result: TransportResult<ReplyStatus>) -> bool {
        match result {
            Ok(status) => {
                let ok = status.is_success();
                debug!("{op}: {status}");
                self.note(&status);
                ok
            }
            Err(err) => {
                let _ = self.fail(err, format!("{op} failed"));
                false
            }
        }
    }

    async fn modified_time_from_listing(&mut self, name: &str) -> Result<Option<DateTime<Local>>> {
        let entry = self.find_file(name).await?;
        Ok(entry.and_then(|entry| entry.modified))
    }
}

/// Formats an error and its causes as a single line, outermost first,
/// each link joined by an arrow.
fn chain_message(err: &anyhow::Error) -> String {
    err.chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" => ")
}

/// Parses the `YYYYMMDDHHMMSS` payload of a timestamp reply, read as
/// server-local wall time.
fn parse_mdtm(raw: &str) -> Option<DateTime<Local>> {
    let stamp = NaiveDateTime::parse_from_str(raw.trim(), "%Y%m%d%H%M%S").ok()?;
    Local.from_local_datetime(&stamp).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn quiet_session(root: &str) -> FtpSession {
        FtpSession::new(Box::new(MockWire::new()), root)
    }

    #[test]
    fn test_change_folder_navigation() {
        let mut session = quiet_session("/root");

        assert!(session.change_folder("/a"));
        assert!(session.change_folder("b"));
        assert_eq!(session.current_folder(), "/root/a/b");

        assert!(session.change_folder("/"));
        assert_eq!(session.current_folder(), "/root");
    }

    #[test]
    fn test_root_folder_is_normalized() {
        let session = quiet_session("docs/");
        assert_eq!(session.current_folder(), "/docs");

        let session = quiet_session("");
        assert_eq!(session.current_folder(), "");
    }

    #[test]
    fn test_fresh_session_has_no_diagnostics() {
        let session = quiet_session("");
        assert_eq!(session.last_status_code(), None);
        assert_eq!(session.last_status_description(), None);
        assert_eq!(session.last_error_message(), None);
        assert_eq!(session.timestamp_support(), MdtmSupport::Unknown);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_cache_dirty_and_records_chain() {
        let mut wire = MockWire::new();
        wire.expect_delete().times(1).returning(|_| {
            Err(TransportError::Rejected(ReplyStatus::new(
                553,
                "name not allowed",
            )))
        });

        let mut session = FtpSession::new(Box::new(wire), "");
        assert!(!session.delete_file("bad:name").await);
        assert!(session.cache_dirty);
        assert_eq!(session.last_status_code(), Some(553));

        let chain = session.last_error_message().unwrap();
        assert!(chain.contains("delete failed"));
        assert!(chain.contains(" => "));
        assert!(chain.contains("553 name not allowed"));
    }

    #[tokio::test]
    async fn test_match_all_wildcard_served_from_cache() {
        let mut wire = MockWire::new();
        wire.expect_list().times(1).returning(|_| {
            Ok((
                vec!["-rw-r--r-- 1 u g 5 Nov 15 2020 a.txt".to_string()],
                ReplyStatus::new(226, "listing transferred"),
            ))
        });

        let mut session = FtpSession::new(Box::new(wire), "");
        let first = session.list_files("", false).await.unwrap();
        let second = session.list_files("*", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_parse_mdtm() {
        let stamp = parse_mdtm("20240615103000").unwrap();
        assert_eq!(
            stamp,
            Local.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
        );
        assert_eq!(parse_mdtm("not-a-stamp"), None);
        assert_eq!(parse_mdtm(""), None);
    }

    #[test]
    fn test_probe_constants_look_like_a_file() {
        assert!(PROBE_NAME.ends_with(".txt"));
        assert_eq!(PROBE_CONTENT, b"clockprobe");
    }
}
