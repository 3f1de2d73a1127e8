use super::{ReplyStatus, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

/// FTP transport speaking through `suppaftp`. Every call opens a fresh
/// control connection, runs one verb and quits, so no connection state
/// leaks between operations or between sessions sharing a server.
pub struct FtpTransport {
    host: String,
    username: String,
    password: String,
}

impl FtpTransport {
    /// `host` is `address:port`; use [`crate::connection`] helpers to
    /// default the port.
    pub fn new(host: String, username: String, password: String) -> Self {
        Self {
            host,
            username,
            password,
        }
    }

    /// Connects and logs in once, to validate address and credentials
    /// before a session starts issuing real commands.
    pub async fn verify(&self) -> TransportResult<()> {
        let (host, username, password) = self.credentials();
        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok(())
        })
        .await
    }

    fn credentials(&self) -> (String, String, String) {
        (
            self.host.clone(),
            self.username.clone(),
            self.password.clone(),
        )
    }
}

fn connect_ftp(host: &str, username: &str, password: &str) -> TransportResult<FtpStream> {
    let mut ftp = FtpStream::connect(host).map_err(map_ftp_error)?;
    ftp.login(username, password).map_err(map_ftp_error)?;
    debug!("ftp control connection to {host} established");
    Ok(ftp)
}

fn map_ftp_error(err: FtpError) -> TransportError {
    match err {
        FtpError::UnexpectedResponse(resp) => {
            classify_reply(resp.status.code(), reply_text(&resp.body))
        }
        other => TransportError::Io(other.to_string()),
    }
}

/// Sorts a failure reply into the outcomes the session distinguishes.
fn classify_reply(code: u32, text: String) -> TransportError {
    let status = ReplyStatus::new(code, text);
    match code {
        502 | 504 => TransportError::Unsupported(status),
        550 => TransportError::Unavailable(status),
        _ => TransportError::Rejected(status),
    }
}

/// Servers echo the numeric code at the start of the reply line; keep just
/// the text after it.
fn reply_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.split_once(' ') {
        Some((code, rest)) if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) => {
            rest.trim().to_string()
        }
        _ => text.to_string(),
    }
}

async fn run_blocking<T, F>(job: F) -> TransportResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> TransportResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| TransportError::Io(err.to_string()))?
}

#[async_trait]
impl Transport for FtpTransport {
    async fn list(&mut self, path: &str) -> TransportResult<(Vec<String>, ReplyStatus)> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            let target = if path.is_empty() {
                None
            } else {
                Some(path.as_str())
            };
            let lines = ftp.list(target).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok((lines, ReplyStatus::new(226, "listing transferred")))
        })
        .await
    }

    async fn retrieve(&mut self, path: &str) -> TransportResult<(Vec<u8>, ReplyStatus)> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.transfer_type(FileType::Binary).map_err(map_ftp_error)?;
            let data = ftp.retr_as_buffer(&path).map_err(map_ftp_error)?.into_inner();
            ftp.quit().map_err(map_ftp_error)?;
            Ok((data, ReplyStatus::new(226, "transfer complete")))
        })
        .await
    }

    async fn store(&mut self, path: &str, data: &[u8]) -> TransportResult<ReplyStatus> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();
        let data = data.to_vec();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.transfer_type(FileType::Binary).map_err(map_ftp_error)?;
            let written = ftp.put_file(&path, &mut &data[..]).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            debug!("stored {written} bytes at {path}");
            Ok(ReplyStatus::new(226, "transfer complete"))
        })
        .await
    }

    async fn delete(&mut self, path: &str) -> TransportResult<ReplyStatus> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.rm(&path).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok(ReplyStatus::new(250, "delete completed"))
        })
        .await
    }

    async fn rename(&mut self, path: &str, new_name: &str) -> TransportResult<ReplyStatus> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();
        // The new name stays inside the file's folder.
        let target = match path.rsplit_once('/') {
            Some((folder, _)) => format!("{folder}/{new_name}"),
            None => new_name.to_string(),
        };

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.rename(&path, &target).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok(ReplyStatus::new(250, "rename completed"))
        })
        .await
    }

    async fn make_directory(&mut self, path: &str) -> TransportResult<ReplyStatus> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.mkdir(&path).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok(ReplyStatus::new(257, "folder created"))
        })
        .await
    }

    async fn remove_directory(&mut self, path: &str) -> TransportResult<ReplyStatus> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            ftp.rmdir(&path).map_err(map_ftp_error)?;
            ftp.quit().map_err(map_ftp_error)?;
            Ok(ReplyStatus::new(250, "folder removed"))
        })
        .await
    }

    async fn modified_time(
        &mut self,
        path: &str,
    ) -> TransportResult<(ReplyStatus, Option<String>)> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            let stamp = ftp.mdtm(&path).map_err(map_ftp_error);
            ftp.quit().map_err(map_ftp_error)?;
            let raw = stamp?.format("%Y%m%d%H%M%S").to_string();
            Ok((ReplyStatus::new(213, raw.clone()), Some(raw)))
        })
        .await
    }

    async fn size(&mut self, path: &str) -> TransportResult<(ReplyStatus, Option<u64>)> {
        let (host, username, password) = self.credentials();
        let path = path.to_string();

        run_blocking(move || {
            let mut ftp = connect_ftp(&host, &username, &password)?;
            let size = ftp.size(&path).map_err(map_ftp_error);
            ftp.quit().map_err(map_ftp_error)?;
            let size = size? as u64;
            Ok((ReplyStatus::new(213, size.to_string()), Some(size)))
        })
        .await
    }
}
