use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("creating data directory {path}")]
    CreateDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("path {path} contains non-UTF8 characters")]
    PathNonUtf8 { path: PathBuf },
    #[error("failed to connect to database {path}")]
    Connection {
        #[source]
        source: diesel::ConnectionError,
        path: PathBuf,
    },
    #[error("failed to configure database connection")]
    Configure(#[source] diesel::result::Error),
    #[error("failed to create database schema")]
    Migration(#[source] diesel::result::Error),
    #[error("failed to query {table}")]
    Query {
        #[source]
        source: diesel::result::Error,
        table: &'static str,
    },
}

/// Reasons a write job could not be handed to the serializer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("write queue is full")]
    QueueFull,
    #[error("write queue is closed")]
    Closed,
    #[error("write worker terminated abnormally: {0}")]
    Worker(String),
}
