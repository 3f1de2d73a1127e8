use crate::config::Config;
use crate::session::FtpSession;
use crate::transport::ftp::FtpTransport;
use anyhow::{anyhow, Context, Result};
use tracing::info;

/// Turns a saved profile into live sessions.
pub struct SessionBuilder {
    config: Config,
}

impl SessionBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Validates address and credentials with a probe connection, then
    /// returns a session rooted at the configured folder.
    pub async fn open(&self) -> Result<FtpSession> {
        let password = self
            .config
            .password
            .clone()
            .ok_or_else(|| anyhow!("password not configured"))?;

        let transport = FtpTransport::new(
            endpoint(&self.config.server),
            self.config.username.clone(),
            password,
        );
        transport
            .verify()
            .await
            .with_context(|| format!("could not connect to {}", self.config.server))?;
        info!(
            "connected to {} as {}",
            self.config.server, self.config.username
        );

        Ok(FtpSession::new(
            Box::new(transport),
            &self.config.root_folder,
        ))
    }
}

/// Appends the default FTP port when the profile has none.
fn endpoint(server: &str) -> String {
    if server.contains(':') {
        server.to_string()
    } else {
        format!("{server}:21")
    }
}
