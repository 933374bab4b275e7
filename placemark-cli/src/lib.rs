//! Command-line interface for importing, searching and backing up
//! placemark collections.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use placemark_core::store::DatabaseHandle;

mod archive;
mod collections;
mod error;
mod import;
mod search;

pub use error::CliError;

use archive::{BackupArgs, RestoreArgs, run_backup, run_restore};
use collections::{CollectionsArgs, run_collections};
use import::{ImportArgs, run_import};
use search::{SearchArgs, run_search};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_NAME: &str = "name";
pub(crate) const ARG_SOURCE: &str = "source";
pub(crate) const ARG_CATEGORY: &str = "category";
pub(crate) const ARG_FILTER: &str = "filter";
pub(crate) const ARG_LATITUDE: &str = "lat";
pub(crate) const ARG_LONGITUDE: &str = "lon";
pub(crate) const ARG_RADIUS: &str = "radius";
pub(crate) const ARG_COLLECTION: &str = "collection";
pub(crate) const ARG_FAVOURITES: &str = "favourites";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ARG_ARCHIVE: &str = "archive";

pub(crate) const ENV_IMPORT_NAME: &str = "PLACEMARK_CMDS_IMPORT_NAME";
pub(crate) const ENV_IMPORT_SOURCE: &str = "PLACEMARK_CMDS_IMPORT_SOURCE";
pub(crate) const ENV_SEARCH_LATITUDE: &str = "PLACEMARK_CMDS_SEARCH_LAT";
pub(crate) const ENV_SEARCH_LONGITUDE: &str = "PLACEMARK_CMDS_SEARCH_LON";
pub(crate) const ENV_SEARCH_RADIUS: &str = "PLACEMARK_CMDS_SEARCH_RADIUS";
pub(crate) const ENV_BACKUP_ARCHIVE: &str = "PLACEMARK_CMDS_BACKUP_ARCHIVE";
pub(crate) const ENV_RESTORE_ARCHIVE: &str = "PLACEMARK_CMDS_RESTORE_ARCHIVE";

/// Run the CLI with the current process arguments, writing to stdout.
///
/// # Errors
///
/// Returns an error when argument parsing, configuration merging or the
/// selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Import(args) => run_import(args, out),
        Command::Search(args) => run_search(args, out),
        Command::Collections(args) => run_collections(args, out),
        Command::Backup(args) => run_backup(args, out),
        Command::Restore(args) => run_restore(args, out),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "placemark",
    about = "Import, search and back up points of interest",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a collection from its source, replacing its placemarks.
    Import(ImportArgs),
    /// List placemarks near a position.
    Search(SearchArgs),
    /// List the collections in a database.
    Collections(CollectionsArgs),
    /// Copy the database into a ZIP archive.
    Backup(BackupArgs),
    /// Restore the database from a ZIP archive.
    Restore(RestoreArgs),
}

/// Handle for the database at `path`, creating its directory if needed.
pub(crate) fn database(path: &Utf8Path) -> Result<DatabaseHandle, CliError> {
    placemark_fs::ensure_parent_dir(path).map_err(|source| CliError::PrepareDatabase {
        path: path.to_owned(),
        source,
    })?;
    Ok(DatabaseHandle::new(path.as_std_path()))
}

pub(crate) fn required<T>(
    value: Option<T>,
    field: &'static str,
    env: &'static str,
) -> Result<T, CliError> {
    value.ok_or(CliError::MissingArgument { field, env })
}

pub(crate) fn write_line(out: &mut dyn Write, line: &str) -> Result<(), CliError> {
    writeln!(out, "{line}").map_err(CliError::WriteOutput)
}

/// Default database location when none is configured.
pub(crate) fn default_database() -> Utf8PathBuf {
    Utf8PathBuf::from("placemarks.db")
}

#[cfg(test)]
mod tests;
