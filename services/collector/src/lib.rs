//! Collector - fetches the published COVID-19 case file from the state FTP
//!
//! The upstream publishes a single semicolon-separated CSV behind fixed,
//! publicly shared credentials. This crate only moves bytes: connect, pull
//! the named file, disconnect. Parsing belongs to the importer.

mod config;
mod source;

pub use config::FtpConfig;
pub use source::{content_hash, save_to_fs, Artifact, FileSource, FtpSource};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("invalid collector configuration: {0}")]
    Config(String),
    #[error("could not resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: suppaftp::FtpError,
    },
    #[error("FTP login rejected: {0}")]
    Login(#[source] suppaftp::FtpError),
    #[error("transfer of {file} failed: {source}")]
    Transfer {
        file: String,
        #[source]
        source: suppaftp::FtpError,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
