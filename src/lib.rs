#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod config;
pub mod connection;
pub mod fetch;
pub mod session;
pub mod transport;
pub mod utils;

pub use session::{FileEntry, FtpSession, MdtmSupport};
pub use transport::{ReplyStatus, Transport, TransportError};
