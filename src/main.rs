#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::cast_precision_loss
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use ftp_session::config::Config;
use ftp_session::connection::SessionBuilder;
use ftp_session::fetch::BulkFetcher;
use ftp_session::FtpSession;

#[derive(Parser)]
#[command(author, version, about = "Stateful FTP session client", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Remote working folder to operate in, relative to the configured root
    #[arg(short, long, global = true, default_value = "")]
    folder: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in the working folder
    List {
        /// Server-side wildcard filter, e.g. '*.txt'
        filter: Option<String>,

        /// Bypass the listing cache
        #[arg(short, long)]
        refresh: bool,
    },

    /// Download files (name or '*' wildcard pattern)
    Download {
        /// File name or wildcard pattern in the working folder
        pattern: String,

        /// Local destination directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Maximum downloads in flight
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },

    /// Upload local files into the working folder
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete a file in the working folder
    Delete {
        /// File name
        name: String,
    },

    /// Rename a file in the working folder
    Rename {
        /// Current file name
        name: String,

        /// New file name (stays in the same folder)
        new_name: String,
    },

    /// Create a subfolder of the working folder
    Mkdir {
        /// Folder name
        name: String,
    },

    /// Remove an empty subfolder of the working folder
    Rmdir {
        /// Folder name
        name: String,
    },

    /// Show size and modification time of a remote file
    Stat {
        /// File name
        name: String,
    },

    /// Measure the clock offset between this machine and the server
    TimeDiff,

    /// Configure the server connection
    Config {
        /// Server address (host or host:port)
        #[arg(long)]
        server: Option<String>,

        /// Username
        #[arg(long)]
        username: Option<String>,

        /// Root folder on the server
        #[arg(long)]
        root: Option<String>,
    },
}

/// Fills in the password from `FTP_SESSION_PASSWORD` or an interactive
/// prompt; profiles never store it.
fn ensure_password(config: &mut Config) -> Result<()> {
    if config.password.is_none() {
        if let Ok(password) = std::env::var("FTP_SESSION_PASSWORD") {
            config.password = Some(password);
        } else {
            config.password = Some(rpassword::prompt_password("Password: ")?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;

    if let Commands::Config {
        server,
        username,
        root,
    } = &cli.command
    {
        if server.is_none() && username.is_none() && root.is_none() {
            config.interactive_setup()?;
        } else {
            if let Some(server) = server {
                config.server = server.clone();
            }
            if let Some(username) = username {
                config.username = username.clone();
            }
            if let Some(root) = root {
                config.root_folder = root.clone();
            }
            config.configured = true;
            config.save()?;
            println!("Configuration saved.");
        }
        return Ok(());
    }

    if !config.is_configured() {
        config.interactive_setup()?;
    }
    ensure_password(&mut config)?;

    let mut session = SessionBuilder::new(config).open().await?;
    if !cli.folder.is_empty() {
        session.change_folder(&cli.folder);
    }

    match cli.command {
        Commands::List { filter, refresh } => {
            list_command(&mut session, filter.as_deref().unwrap_or(""), refresh).await
        }
        Commands::Download {
            pattern,
            dest,
            jobs,
        } => download_command(session, &pattern, &dest, jobs).await,
        Commands::Upload { files } => upload_command(&mut session, &files).await,
        Commands::Delete { name } => {
            let ok = session.delete_file(&name).await;
            finish_mutation(&session, ok, &format!("Deleted {name}"))
        }
        Commands::Rename { name, new_name } => {
            let ok = session.rename_file(&name, &new_name).await;
            finish_mutation(&session, ok, &format!("Renamed {name} to {new_name}"))
        }
        Commands::Mkdir { name } => {
            let ok = session.create_folder(&name).await;
            finish_mutation(&session, ok, &format!("Created {name}"))
        }
        Commands::Rmdir { name } => {
            let ok = session.delete_folder(&name).await;
            finish_mutation(&session, ok, &format!("Removed {name}"))
        }
        Commands::Stat { name } => stat_command(&mut session, &name).await,
        Commands::TimeDiff => {
            let diff = session.time_diff().await?;
            println!(
                "Local clock is {:.1}s {} the server's",
                (diff.num_milliseconds() as f64 / 1000.0).abs(),
                if diff.num_milliseconds() >= 0 {
                    "ahead of"
                } else {
                    "behind"
                }
            );
            Ok(())
        }
        Commands::Config { .. } => unreachable!("handled before connecting"),
    }
}

async fn list_command(session: &mut FtpSession, filter: &str, refresh: bool) -> Result<()> {
    let entries = session.list_files(filter, refresh).await?;

    println!("Files in {}:", display_folder(session));
    println!("{:<50} {:>10} {:>17}", "Name", "Size", "Modified");
    println!("{}", "-".repeat(79));

    for entry in entries {
        let size = if entry.is_dir {
            "DIR".to_string()
        } else {
            human_bytes::human_bytes(entry.size as f64)
        };
        let modified = entry.modified.map_or_else(
            || "unknown".to_string(),
            |stamp| stamp.format("%Y-%m-%d %H:%M").to_string(),
        );
        println!("{:<50} {:>10} {:>17}", entry.name, size, modified);
    }
    Ok(())
}

async fn download_command(
    session: FtpSession,
    pattern: &str,
    dest: &Path,
    jobs: usize,
) -> Result<()> {
    if pattern.contains('*') {
        let fetcher = BulkFetcher::new(Arc::new(Mutex::new(session)), jobs);
        let results = fetcher.fetch_matching(pattern, dest).await?;

        if results.is_empty() {
            println!("No files match {pattern}");
            return Ok(());
        }
        let ok = results.iter().filter(|(_, outcome)| outcome.is_ok()).count();
        for (name, outcome) in &results {
            if let Err(err) = outcome {
                eprintln!("✗ {name}: {err:#}");
            }
        }
        println!("Downloaded {ok}/{} files", results.len());
        if ok < results.len() {
            bail!("{} downloads failed", results.len() - ok);
        }
    } else {
        let mut session = session;
        let local = dest.join(pattern);
        session.download_file(pattern, &local).await?;
        println!("Downloaded {pattern} to {}", local.display());
    }
    Ok(())
}

async fn upload_command(session: &mut FtpSession, files: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for file in files {
        let name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file");
        if session.upload_file(file, name).await {
            println!("✓ {name}");
        } else {
            eprintln!(
                "✗ {name}: {}",
                session.last_error_message().unwrap_or("unknown error")
            );
            failed += 1;
        }
    }
    println!("Uploaded {}/{} files", files.len() - failed, files.len());
    if failed > 0 {
        bail!("{failed} uploads failed");
    }
    Ok(())
}

async fn stat_command(session: &mut FtpSession, name: &str) -> Result<()> {
    let size = session.file_size(name).await?;
    let modified = session.modified_time(name).await?;

    match (size, modified) {
        (None, None) => bail!("{name} not found in {}", display_folder(session)),
        (size, modified) => {
            println!("Name:     {name}");
            println!(
                "Size:     {}",
                size.map_or_else(|| "unknown".to_string(), |s| human_bytes::human_bytes(
                    s as f64
                ))
            );
            println!(
                "Modified: {}",
                modified.map_or_else(
                    || "unknown".to_string(),
                    |stamp| stamp.format("%Y-%m-%d %H:%M:%S").to_string()
                )
            );
        }
    }
    Ok(())
}

fn finish_mutation(session: &FtpSession, ok: bool, done: &str) -> Result<()> {
    if ok {
        println!("{done}");
        Ok(())
    } else {
        bail!(
            "{}",
            session
                .last_error_message()
                .or(session.last_status_description())
                .unwrap_or("operation failed")
        )
    }
}

fn display_folder(session: &FtpSession) -> String {
    let folder = session.current_folder();
    if folder.is_empty() {
        "/".to_string()
    } else {
        folder
    }
}
