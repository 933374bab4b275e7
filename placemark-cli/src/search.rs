//! `search` command: list placemarks near a position.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placemark_core::{
    CollectionId, Coordinates,
    store::{DEFAULT_RESULT_CAP, DatabaseHandle, ProximityQuery, collections, search},
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_COLLECTION, ARG_DATABASE, ARG_FAVOURITES, ARG_LATITUDE, ARG_LIMIT, ARG_LONGITUDE,
    ARG_NAME, ARG_RADIUS, CliError, ENV_SEARCH_LATITUDE, ENV_SEARCH_LONGITUDE, ENV_SEARCH_RADIUS,
    database, default_database, required, write_line,
};

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "List the placemarks within a radius of a position, closest \
                 first. Without --collection every collection is searched.",
    about = "Search placemarks near a position"
)]
#[ortho_config(prefix = "PLACEMARK")]
pub(crate) struct SearchArgs {
    /// SQLite database holding the collections.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Latitude of the search centre in degrees.
    #[arg(long = ARG_LATITUDE, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lat: Option<f32>,
    /// Longitude of the search centre in degrees.
    #[arg(long = ARG_LONGITUDE, value_name = "degrees", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) lon: Option<f32>,
    /// Search radius in metres.
    #[arg(long = ARG_RADIUS, value_name = "metres")]
    #[serde(default)]
    pub(crate) radius: Option<f64>,
    /// Collection to search; repeat to search several.
    #[arg(long = ARG_COLLECTION, value_name = "name")]
    #[serde(default)]
    pub(crate) collection: Vec<String>,
    /// Keep placemarks whose name contains this text.
    #[arg(long = ARG_NAME, value_name = "text")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Keep only placemarks flagged as favourites.
    #[arg(long = ARG_FAVOURITES)]
    #[serde(default)]
    pub(crate) favourites: bool,
    /// Maximum number of results.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl SearchArgs {
    pub(crate) fn into_options(self) -> Result<SearchOptions, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchOptions::try_from(merged)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchOptions {
    pub(crate) database: Utf8PathBuf,
    pub(crate) center: Coordinates,
    pub(crate) radius: f64,
    pub(crate) collections: Vec<String>,
    pub(crate) name: Option<String>,
    pub(crate) favourites: bool,
    pub(crate) limit: usize,
}

impl TryFrom<SearchArgs> for SearchOptions {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let latitude = required(args.lat, ARG_LATITUDE, ENV_SEARCH_LATITUDE)?;
        let longitude = required(args.lon, ARG_LONGITUDE, ENV_SEARCH_LONGITUDE)?;
        let radius = required(args.radius, ARG_RADIUS, ENV_SEARCH_RADIUS)?;
        Ok(Self {
            database: args.database.unwrap_or_else(default_database),
            center: Coordinates::unchecked(latitude, longitude),
            radius,
            collections: args.collection,
            name: args.name.filter(|name| !name.trim().is_empty()),
            favourites: args.favourites,
            limit: args.limit.unwrap_or(DEFAULT_RESULT_CAP),
        })
    }
}

pub(crate) fn run_search(args: SearchArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let options = args.into_options()?;
    let handle = database(&options.database)?;
    search_in(&handle, &options, out)
}

/// Print one `distance name latitude longitude` line per hit.
pub(crate) fn search_in(
    handle: &DatabaseHandle,
    options: &SearchOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let hits = {
        let lease = handle.open()?;
        let connection = lease.connection();
        let ids: Vec<CollectionId> = if options.collections.is_empty() {
            collections::list(&connection)?
                .into_iter()
                .map(|collection| collection.id)
                .collect()
        } else {
            options
                .collections
                .iter()
                .map(|name| {
                    collections::find_by_name(&connection, name)?
                        .map(|collection| collection.id)
                        .ok_or_else(|| CliError::UnknownCollection { name: name.clone() })
                })
                .collect::<Result<_, CliError>>()?
        };
        if ids.is_empty() {
            log::debug!("no collections to search around {}", options.center);
            return Ok(());
        }
        let mut query = ProximityQuery::new(options.center, options.radius)
            .in_collections(ids)
            .only_flagged(options.favourites)
            .with_limit(options.limit);
        if let Some(name) = &options.name {
            query = query.with_name(name);
        }
        search(&connection, &query)?
    };
    log::debug!("search around {} found {} placemarks", options.center, hits.len());
    for hit in hits {
        let marker = if hit.flagged { "*" } else { "" };
        write_line(
            out,
            &format!(
                "{:.0}\t{}{marker}\t{:.5}\t{:.5}",
                hit.distance,
                hit.placemark.name,
                hit.placemark.coordinates.latitude,
                hit.placemark.coordinates.longitude
            ),
        )?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn options_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SearchOptions, CliError> {
    let merged = SearchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SearchOptions::try_from(merged)
}
