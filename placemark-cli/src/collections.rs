//! `collections` command: list what a database holds.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placemark_core::store::{DatabaseHandle, collections};
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, CliError, database, default_database, write_line};

/// CLI arguments for the `collections` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "List collections with their category and size")]
#[ortho_config(prefix = "PLACEMARK")]
pub(crate) struct CollectionsArgs {
    /// SQLite database holding the collections.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

pub(crate) fn run_collections(args: CollectionsArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let path = merged.database.unwrap_or_else(default_database);
    let handle = database(&path)?;
    list_collections(&handle, out)
}

/// Print `category name count source`, grouped by category.
pub(crate) fn list_collections(handle: &DatabaseHandle, out: &mut dyn Write) -> Result<(), CliError> {
    let all = {
        let lease = handle.open()?;
        let connection = lease.connection();
        collections::list(&connection)?
    };
    for collection in all {
        write_line(
            out,
            &format!(
                "{}\t{}\t{}\t{}",
                collection.category, collection.name, collection.poi_count, collection.source
            ),
        )?;
    }
    Ok(())
}
