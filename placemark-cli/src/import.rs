//! `import` command: create the collection if needed, then import it.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placemark_core::{
    PlacemarkCollection,
    store::{DatabaseHandle, collections},
};
use placemark_data::{FormatFilter, ImportConfig, ImportFacade};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CATEGORY, ARG_DATABASE, ARG_FILTER, ARG_NAME, ARG_SOURCE, CliError, ENV_IMPORT_NAME,
    ENV_IMPORT_SOURCE, database, default_database, required, write_line,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Import placemarks into a named collection. The collection \
                 is created on first use; every import replaces its previous \
                 placemarks in one transaction.",
    about = "Import a collection from a file or URL"
)]
#[ortho_config(prefix = "PLACEMARK")]
pub(crate) struct ImportArgs {
    /// SQLite database holding the collections.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Collection name.
    #[arg(long = ARG_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// File path or URL to import from.
    #[arg(long = ARG_SOURCE, value_name = "locator")]
    #[serde(default)]
    pub(crate) source: Option<String>,
    /// Category label for a new collection.
    #[arg(long = ARG_CATEGORY, value_name = "label")]
    #[serde(default)]
    pub(crate) category: Option<String>,
    /// Format to assume when the source does not reveal one
    /// (gpx, kml, kmz, georss, geojson, ov2, csv-lonlat, csv-latlon).
    #[arg(long = ARG_FILTER, value_name = "format")]
    #[serde(default)]
    pub(crate) filter: Option<String>,
}

impl ImportArgs {
    pub(crate) fn into_options(self) -> Result<ImportOptions, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportOptions::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportOptions {
    pub(crate) database: Utf8PathBuf,
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) category: String,
    pub(crate) filter: FormatFilter,
}

impl TryFrom<ImportArgs> for ImportOptions {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let name = required(args.name, ARG_NAME, ENV_IMPORT_NAME)?;
        let source = required(args.source, ARG_SOURCE, ENV_IMPORT_SOURCE)?;
        let filter = args.filter.as_deref().unwrap_or_default().parse()?;
        Ok(Self {
            database: args.database.unwrap_or_else(default_database),
            name,
            source,
            category: args.category.unwrap_or_default(),
            filter,
        })
    }
}

pub(crate) fn run_import(args: ImportArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let options = args.into_options()?;
    let handle = database(&options.database)?;
    import_into(&handle, &options, out)
}

pub(crate) fn import_into(
    handle: &DatabaseHandle,
    options: &ImportOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let collection = prepare_collection(handle, options)?;
    let import_error = |source| CliError::Import {
        collection: collection.name.clone(),
        source,
    };
    let facade = ImportFacade::new(handle, ImportConfig::default()).map_err(import_error)?;
    let progress = |title: &str, message: &str| log::info!("{title}: {message}");
    let report = facade
        .import(&collection, options.filter, &progress)
        .map_err(import_error)?;
    write_line(
        out,
        &format!(
            "imported {} placemarks into {:?} ({} duplicates, {} skipped)",
            report.inserted, collection.name, report.duplicates, report.skipped
        ),
    )
}

/// Load the named collection, creating it or pointing it at the new source.
fn prepare_collection(
    handle: &DatabaseHandle,
    options: &ImportOptions,
) -> Result<PlacemarkCollection, CliError> {
    let lease = handle.open()?;
    let connection = lease.connection();
    if let Some(mut existing) = collections::find_by_name(&connection, &options.name)? {
        if existing.source != options.source {
            log::info!("collection {:?} now imports from {}", existing.name, options.source);
            options.source.clone_into(&mut existing.source);
            collections::update(&connection, &existing)?;
        }
        return Ok(existing);
    }
    let collection =
        PlacemarkCollection::new(&options.name, &options.source)?.with_category(&options.category);
    let id = collections::insert(&connection, &collection)?;
    Ok(collections::get(&connection, id)?)
}

#[cfg(test)]
pub(crate) fn options_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportOptions, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportOptions::try_from(merged)
}
