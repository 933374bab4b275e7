//! `backup` and `restore` commands.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placemark_core::store::DatabaseHandle;
use placemark_data::ArchiveManager;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ARCHIVE, ARG_DATABASE, CliError, ENV_BACKUP_ARCHIVE, ENV_RESTORE_ARCHIVE, database,
    default_database, required, write_line,
};

/// CLI arguments for the `backup` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Copy the database into a ZIP archive")]
#[ortho_config(prefix = "PLACEMARK")]
pub(crate) struct BackupArgs {
    /// SQLite database to back up.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Archive to create; an existing file is replaced.
    #[arg(long = ARG_ARCHIVE, value_name = "path")]
    #[serde(default)]
    pub(crate) archive: Option<Utf8PathBuf>,
}

/// CLI arguments for the `restore` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Overwrite the database with the copy held in a ZIP archive \
                 made by `backup`. A database missing from the archive is \
                 left as it is.",
    about = "Restore the database from a ZIP archive"
)]
#[ortho_config(prefix = "PLACEMARK")]
pub(crate) struct RestoreArgs {
    /// SQLite database to overwrite.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Archive to read.
    #[arg(long = ARG_ARCHIVE, value_name = "path")]
    #[serde(default)]
    pub(crate) archive: Option<Utf8PathBuf>,
}

/// Resolved archive command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiveOptions {
    pub(crate) database: Utf8PathBuf,
    pub(crate) archive: Utf8PathBuf,
}

impl TryFrom<BackupArgs> for ArchiveOptions {
    type Error = CliError;

    fn try_from(args: BackupArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            archive: required(args.archive, ARG_ARCHIVE, ENV_BACKUP_ARCHIVE)?,
            database: args.database.unwrap_or_else(default_database),
        })
    }
}

impl TryFrom<RestoreArgs> for ArchiveOptions {
    type Error = CliError;

    fn try_from(args: RestoreArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            archive: required(args.archive, ARG_ARCHIVE, ENV_RESTORE_ARCHIVE)?,
            database: args.database.unwrap_or_else(default_database),
        })
    }
}

pub(crate) fn run_backup(args: BackupArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let options = ArchiveOptions::try_from(merged)?;
    let handle = database(&options.database)?;
    backup(&handle, &options, out)
}

pub(crate) fn run_restore(args: RestoreArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let options = ArchiveOptions::try_from(merged)?;
    let handle = database(&options.database)?;
    restore(&handle, &options, out)
}

pub(crate) fn backup(
    handle: &DatabaseHandle,
    options: &ArchiveOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let archived = ArchiveManager::new(vec![handle]).create(&options.archive)?;
    if archived.is_empty() {
        log::warn!("nothing to archive: {} does not exist", options.database);
    }
    for name in archived {
        write_line(out, &format!("archived {name}"))?;
    }
    Ok(())
}

pub(crate) fn restore(
    handle: &DatabaseHandle,
    options: &ArchiveOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let restored = ArchiveManager::new(vec![handle]).restore(&options.archive)?;
    for name in restored {
        write_line(out, &format!("restored {name}"))?;
    }
    Ok(())
}
