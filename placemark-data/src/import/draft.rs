//! Placemarks under construction and the coordinate helpers shared by the
//! text-based formats.

use placemark_core::{CollectionId, Coordinates, Placemark, PlacemarkError};

/// An unvalidated placemark as read from a source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlacemarkDraft {
    /// Name as found in the source.
    pub name: String,
    /// Description as found in the source.
    pub description: String,
    /// Position, [`Coordinates::EMPTY`] when the source gave none.
    pub coordinates: Coordinates,
}

impl PlacemarkDraft {
    /// Draft with all fields set.
    pub fn new(name: impl Into<String>, description: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            coordinates,
        }
    }

    /// Validate into a placemark of `collection_id`.
    pub fn into_placemark(self, collection_id: CollectionId) -> Result<Placemark, PlacemarkError> {
        Placemark::new(collection_id, &self.name, &self.description, self.coordinates)
    }
}

/// Running mean of the vertices of a point, line or polygon.
///
/// Only the sums, the count and the first and last vertex are kept.
#[derive(Debug, Default, Clone)]
pub(crate) struct Centroid {
    latitude_sum: f64,
    longitude_sum: f64,
    count: u32,
    first: Option<(f64, f64)>,
    last: Option<(f64, f64)>,
}

impl Centroid {
    pub(crate) fn push(&mut self, latitude: f64, longitude: f64) {
        if !(latitude.is_finite() && longitude.is_finite()) {
            return;
        }
        self.latitude_sum += latitude;
        self.longitude_sum += longitude;
        self.count += 1;
        self.first.get_or_insert((latitude, longitude));
        self.last = Some((latitude, longitude));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean position, ignoring the closing vertex of a ring.
    pub(crate) fn finish(self) -> Coordinates {
        let (mut latitude, mut longitude, mut count) =
            (self.latitude_sum, self.longitude_sum, self.count);
        if count > 1 && self.first == self.last {
            if let Some((last_latitude, last_longitude)) = self.last {
                latitude -= last_latitude;
                longitude -= last_longitude;
                count -= 1;
            }
        }
        if count == 0 {
            return Coordinates::EMPTY;
        }
        let count = f64::from(count);
        Coordinates::unchecked((latitude / count) as f32, (longitude / count) as f32)
    }
}

/// Feed KML `lon,lat[,alt]` tuples separated by whitespace into `centroid`.
///
/// Malformed tuples are ignored.
pub(crate) fn push_lon_lat_tuples(text: &str, centroid: &mut Centroid) {
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',').map(str::trim);
        if let (Some(Ok(lon)), Some(Ok(lat))) = (
            parts.next().map(str::parse::<f64>),
            parts.next().map(str::parse::<f64>),
        ) {
            centroid.push(lat, lon);
        }
    }
}

/// Feed GeoRSS `lat lon lat lon ...` pairs into `centroid`.
///
/// A trailing unpaired value is ignored.
pub(crate) fn push_lat_lon_pairs(text: &str, centroid: &mut Centroid) {
    let values: Vec<f64> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map_while(|part| part.parse().ok())
        .collect();
    for pair in values.chunks_exact(2) {
        if let [lat, lon] = pair {
            centroid.push(*lat, *lon);
        }
    }
}

/// Parse a single degree value.
pub(crate) fn parse_degrees(text: &str) -> Option<f32> {
    text.trim().parse::<f32>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn closed_ring_ignores_repeated_vertex() {
        let mut centroid = Centroid::default();
        push_lon_lat_tuples("0,0 2,0 2,2 0,2 0,0", &mut centroid);
        assert_eq!(centroid.finish(), Coordinates::unchecked(1.0, 1.0));
    }

    #[rstest]
    fn line_averages_all_vertices() {
        let mut centroid = Centroid::default();
        push_lon_lat_tuples("10,20,100\n  12,22,110", &mut centroid);
        assert_eq!(centroid.finish(), Coordinates::unchecked(21.0, 11.0));
    }

    #[rstest]
    fn empty_centroid_has_no_position() {
        let mut centroid = Centroid::default();
        push_lon_lat_tuples("not,numbers", &mut centroid);
        assert!(centroid.is_empty());
        assert!(centroid.finish().is_empty());
    }

    #[rstest]
    fn single_vertex_is_its_own_centroid() {
        let mut centroid = Centroid::default();
        centroid.push(12.5, -3.25);
        centroid.push(f64::NAN, 1.0);
        assert_eq!(centroid.finish(), Coordinates::unchecked(12.5, -3.25));
    }

    #[rstest]
    fn georss_pairs_are_latitude_first() {
        let mut centroid = Centroid::default();
        push_lat_lon_pairs("45.0 9.0 47.0 11.0", &mut centroid);
        assert_eq!(centroid.finish(), Coordinates::unchecked(46.0, 10.0));
    }

    #[rstest]
    fn draft_validation_drops_blank_names() {
        let draft = PlacemarkDraft::new("  ", "", Coordinates::unchecked(1.0, 1.0));
        assert!(draft.into_placemark(1).is_err());
    }
}
