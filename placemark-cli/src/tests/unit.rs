//! Focused unit tests covering CLI configuration resolution.

use super::*;
use crate::{
    archive::ArchiveOptions,
    import::{ImportOptions, options_from_layers_for_test as import_from_layers},
    search::{SearchOptions, options_from_layers_for_test as search_from_layers},
};
use ortho_config::MergeComposer;
use placemark_core::{Coordinates, store::DEFAULT_RESULT_CAP};
use placemark_data::FormatFilter;
use rstest::rstest;
use serde_json::json;

fn assert_missing(err: CliError, field: &'static str, env_var: &'static str) {
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(None, Some("trip.gpx"), ARG_NAME, ENV_IMPORT_NAME)]
#[case(Some("Trip"), None, ARG_SOURCE, ENV_IMPORT_SOURCE)]
fn import_requires_name_and_source(
    #[case] name: Option<&str>,
    #[case] source: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = ImportArgs {
        name: name.map(str::to_owned),
        source: source.map(str::to_owned),
        ..ImportArgs::default()
    };
    let err = ImportOptions::try_from(args).expect_err("missing field should error");
    assert_missing(err, field, env_var);
}

#[rstest]
fn import_defaults_database_and_filter() {
    let args = ImportArgs {
        name: Some("Trip".to_owned()),
        source: Some("trip.gpx".to_owned()),
        ..ImportArgs::default()
    };
    let options = ImportOptions::try_from(args).expect("options resolve");
    assert_eq!(options.database, default_database());
    assert_eq!(options.filter, FormatFilter::None);
    assert_eq!(options.category, "");
}

#[rstest]
fn import_rejects_unknown_filter() {
    let args = ImportArgs {
        name: Some("Trip".to_owned()),
        source: Some("trip.dat".to_owned()),
        filter: Some("shapefile".to_owned()),
        ..ImportArgs::default()
    };
    let err = ImportOptions::try_from(args).expect_err("unknown filter should error");
    assert!(matches!(err, CliError::InvalidFilter(_)), "unexpected error {err:?}");
}

#[rstest]
#[case(None, Some(2.0), Some(100.0), ARG_LATITUDE, ENV_SEARCH_LATITUDE)]
#[case(Some(1.0), None, Some(100.0), ARG_LONGITUDE, ENV_SEARCH_LONGITUDE)]
#[case(Some(1.0), Some(2.0), None, ARG_RADIUS, ENV_SEARCH_RADIUS)]
fn search_requires_centre_and_radius(
    #[case] lat: Option<f32>,
    #[case] lon: Option<f32>,
    #[case] radius: Option<f64>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = SearchArgs {
        lat,
        lon,
        radius,
        ..SearchArgs::default()
    };
    let err = SearchOptions::try_from(args).expect_err("missing field should error");
    assert_missing(err, field, env_var);
}

#[rstest]
fn search_drops_blank_name_and_defaults_limit() {
    let args = SearchArgs {
        lat: Some(1.0),
        lon: Some(2.0),
        radius: Some(100.0),
        name: Some("  ".to_owned()),
        ..SearchArgs::default()
    };
    let options = SearchOptions::try_from(args).expect("options resolve");
    assert_eq!(options.name, None);
    assert_eq!(options.limit, DEFAULT_RESULT_CAP);
    assert_eq!(options.center, Coordinates::unchecked(1.0, 2.0));
}

#[rstest]
fn backup_and_restore_require_archive() {
    let backup = ArchiveOptions::try_from(BackupArgs::default()).expect_err("backup needs archive");
    assert_missing(backup, ARG_ARCHIVE, ENV_BACKUP_ARCHIVE);
    let restore =
        ArchiveOptions::try_from(RestoreArgs::default()).expect_err("restore needs archive");
    assert_missing(restore, ARG_ARCHIVE, ENV_RESTORE_ARCHIVE);
}

#[rstest]
fn search_parses_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "placemark", "search", "--lat", "-33.86", "--lon", "-151.2", "--radius", "500",
    ])
    .expect("arguments parse");
    match cli.command {
        Command::Search(args) => {
            assert_eq!(args.lat, Some(-33.86));
            assert_eq!(args.lon, Some(-151.2));
            assert_eq!(args.radius, Some(500.0));
        }
        other => panic!("expected search, found {other:?}"),
    }
}

#[rstest]
fn search_collects_repeated_collections() {
    let cli = Cli::try_parse_from([
        "placemark",
        "search",
        "--lat",
        "1",
        "--lon",
        "2",
        "--radius",
        "10",
        "--collection",
        "Cafes",
        "--collection",
        "Museums",
        "--favourites",
    ])
    .expect("arguments parse");
    match cli.command {
        Command::Search(args) => {
            assert_eq!(args.collection, ["Cafes", "Museums"]);
            assert!(args.favourites);
        }
        other => panic!("expected search, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "lat": "north" }));

    let err = search_from_layers(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "name": "From file",
            "category": "museums",
            "database": "file.db",
        }),
        None,
    );
    composer.push_environment(json!({
        "name": "From env",
        "source": "env.kml",
    }));
    composer.push_cli(json!({
        "source": "cli.gpx",
        "filter": "gpx",
    }));

    let options = import_from_layers(composer.layers()).expect("merged config should build");
    assert_eq!(options.name, "From env");
    assert_eq!(options.source, "cli.gpx");
    assert_eq!(options.category, "museums");
    assert_eq!(options.database, "file.db");
    assert_eq!(options.filter, FormatFilter::Gpx);
}
