//! Error types emitted by the placemark CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use placemark_core::{
    CollectionError,
    store::{SearchError, StoreError},
};
use placemark_data::{ArchiveError, ImportError, UnknownFilter};
use thiserror::Error;

/// Errors emitted by the placemark CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The format filter named no known format.
    #[error(transparent)]
    InvalidFilter(#[from] UnknownFilter),
    /// The collection name or source was rejected.
    #[error(transparent)]
    InvalidCollection(#[from] CollectionError),
    /// The database directory could not be created.
    #[error("failed to prepare database directory for {path:?}: {source}")]
    PrepareDatabase {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No collection has the requested name.
    #[error("no collection named {name:?}")]
    UnknownCollection { name: String },
    /// Importing a collection failed.
    #[error("failed to import collection {collection:?}: {source}")]
    Import {
        collection: String,
        #[source]
        source: ImportError,
    },
    /// The proximity search was rejected or failed.
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    /// Creating or restoring an archive failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
