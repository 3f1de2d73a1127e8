use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

/// Saved connection profile. The password is kept out of the file on
/// purpose; it is prompted for (or taken from `FTP_SESSION_PASSWORD`)
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub root_folder: String,
    #[serde(default)]
    pub configured: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: None,
            root_folder: String::new(),
            configured: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                let content = fs::read_to_string(config_path)?;
                let config: Config = serde_json::from_str(&content)?;
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_path() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(config_path, content)?;
        }
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "ftpsession", "ftp-session")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn is_configured(&self) -> bool {
        self.configured && !self.server.is_empty() && !self.username.is_empty()
    }

    pub fn interactive_setup(&mut self) -> Result<()> {
        println!("\nftp-session setup");
        println!("─────────────────");
        println!("\nLet's configure the server connection:\n");

        print!("Server address (host or host:port): ");
        io::stdout().flush()?;
        let mut server = String::new();
        io::stdin().read_line(&mut server)?;
        self.server = server.trim().to_string();

        print!("Username: ");
        io::stdout().flush()?;
        let mut username = String::new();
        io::stdin().read_line(&mut username)?;
        self.username = username.trim().to_string();

        // Hidden input; not persisted, only used for this run
        self.password = Some(rpassword::prompt_password("Password: ").unwrap_or_default());

        print!("Root folder on the server [/]: ");
        io::stdout().flush()?;
        let mut root_folder = String::new();
        io::stdin().read_line(&mut root_folder)?;
        self.root_folder = root_folder.trim().to_string();

        self.configured = true;

        println!("\n✅ Configuration complete!");
        println!("Your settings have been saved to: {:?}", Self::config_path());
        println!("\nYou can reconfigure at any time by running: ftp-session config\n");

        self.save()?;
        Ok(())
    }
}
