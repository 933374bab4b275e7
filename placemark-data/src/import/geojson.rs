//! GeoJSON features.

use std::io::{BufReader, Read};

use serde_json::Value;

use placemark_core::Coordinates;

use super::{ImportError, Importer, PlacemarkDraft, PlacemarkSink};

/// Imports a `FeatureCollection`, a single `Feature`, or nested collections.
///
/// A feature's position is the first `[lon, lat]` pair found in its
/// geometry, so lines and polygons land on their first vertex. The name comes from the `name` or `title`
/// property and the description from `description` or `desc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonImporter;

impl Importer for GeoJsonImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let document: Value = serde_json::from_reader(BufReader::new(reader)).map_err(ImportError::Json)?;
        visit(&document, sink)
    }
}

fn visit(node: &Value, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
    match node.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            for feature in node.get("features").and_then(Value::as_array).into_iter().flatten() {
                visit(feature, sink)?;
            }
            Ok(())
        }
        Some("Feature") => sink.accept(feature(node)),
        _ => Ok(()),
    }
}

fn feature(node: &Value) -> PlacemarkDraft {
    let properties = node.get("properties");
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| properties.and_then(|props| props.get(*key)).and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned()
    };
    PlacemarkDraft {
        name: text(&["name", "title"]),
        description: text(&["description", "desc"]),
        coordinates: node
            .get("geometry")
            .and_then(geometry_position)
            .unwrap_or(Coordinates::EMPTY),
    }
}

/// First position of a geometry, looking inside `GeometryCollection` members.
fn geometry_position(geometry: &Value) -> Option<Coordinates> {
    geometry
        .get("coordinates")
        .and_then(first_position)
        .or_else(|| {
            geometry
                .get("geometries")
                .and_then(Value::as_array)?
                .iter()
                .find_map(geometry_position)
        })
}

/// Depth-first walk of nested arrays to the first numeric `[lon, lat]` pair.
fn first_position(node: &Value) -> Option<Coordinates> {
    let items = node.as_array()?;
    match items.as_slice() {
        [lon, lat, ..] if lon.is_number() && lat.is_number() => {
            let (lon, lat) = (lon.as_f64()?, lat.as_f64()?);
            Some(Coordinates::unchecked(lat as f32, lon as f32))
        }
        nested => nested.iter().find_map(first_position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::test_support::drafts;
    use placemark_core::Coordinates;
    use rstest::rstest;

    #[rstest]
    fn imports_feature_collection_in_order() {
        let document = br#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.0, 20.0]}, "properties": {"name": "Place 0"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [11.0, 21.0]}, "properties": {"name": "Place 1"}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [12.0, 22.0, 5.0]}, "properties": {"name": "Place 2", "description": "high"}}
        ]}"#;
        let drafts = drafts(&mut GeoJsonImporter, document);
        assert_eq!(drafts.len(), 3);
        for (index, draft) in drafts.iter().enumerate() {
            let offset = index as f32;
            assert_eq!(draft.name, format!("Place {index}"));
            assert!((draft.coordinates.longitude - (10.0 + offset)).abs() < 0.1);
            assert!((draft.coordinates.latitude - (20.0 + offset)).abs() < 0.1);
        }
        assert_eq!(drafts[2].description, "high");
    }

    #[rstest]
    fn polygons_use_first_vertex_and_single_features_import() {
        let document = br#"{"type": "Feature", "properties": {"title": "Block"},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 2], [0, 2], [0, 0]]]}}"#;
        assert_eq!(
            drafts(&mut GeoJsonImporter, document),
            [PlacemarkDraft::new("Block", "", Coordinates::unchecked(0.0, 0.0))]
        );
    }

    #[rstest]
    #[case::line_string(
        r#"{"type": "LineString", "coordinates": [[10, 20], [30, 40]]}"#,
        Coordinates::unchecked(20.0, 10.0)
    )]
    #[case::multi_polygon(
        r#"{"type": "MultiPolygon", "coordinates": [[[[5, 6], [7, 8], [5, 6]]]]}"#,
        Coordinates::unchecked(6.0, 5.0)
    )]
    #[case::geometry_collection(
        r#"{"type": "GeometryCollection", "geometries": [
            {"type": "Point", "coordinates": []},
            {"type": "LineString", "coordinates": [[-3, 51], [-2, 52]]}]}"#,
        Coordinates::unchecked(51.0, -3.0)
    )]
    fn takes_first_position_of_geometry(#[case] geometry: &str, #[case] expected: Coordinates) {
        let document = format!(
            r#"{{"type": "Feature", "properties": {{"name": "Route"}}, "geometry": {geometry}}}"#
        );
        let drafts = drafts(&mut GeoJsonImporter, document.as_bytes());
        assert_eq!(drafts, [PlacemarkDraft::new("Route", "", expected)]);
    }

    #[rstest]
    fn missing_geometry_has_no_position() {
        let document = br#"{"type": "Feature", "properties": {"name": "Nowhere"}, "geometry": null}"#;
        let drafts = drafts(&mut GeoJsonImporter, document);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].coordinates.is_empty());
    }

    #[rstest]
    fn rejects_malformed_json() {
        let mut sink = Vec::new();
        let err = GeoJsonImporter
            .import(&mut &br#"{"type": "FeatureCollection", "features": ["#[..], &mut sink)
            .expect_err("truncated document");
        assert!(matches!(err, ImportError::Json(_)));
    }
}
