//! Proximity search over stored placemarks.
//!
//! A conservative bounding box in fixed-point space is pushed down into SQL,
//! then each candidate's exact geodesic distance is checked. Results are kept
//! in a bounded ordered map: once it is full, the farthest kept distance
//! becomes the new cutoff and the box is shrunk to match, so later rows are
//! rejected by two integer comparisons before any distance is computed.

use std::{cmp::Ordering, collections::BTreeMap};

use rusqlite::{Connection, params_from_iter};
use thiserror::Error;

use crate::{
    CollectionId, Coordinates, Placemark,
    coord::{LATITUDE_RANGE, LONGITUDE_RANGE, encode_f64},
};

use super::{StoreError, placemarks, sqlite};

/// Maximum number of hits returned unless overridden.
pub const DEFAULT_RESULT_CAP: usize = 250;

/// Metres per degree of latitude at the equator, the shortest on the ellipsoid.
const METRES_PER_LATITUDE_DEGREE: f64 = 110_574.0;
/// Metres per degree of longitude at the equator.
const METRES_PER_LONGITUDE_DEGREE: f64 = 111_320.0;
/// Head-room applied to the box so it always covers the circle.
const BOX_MARGIN: f64 = 1.1;

/// Errors raised by [`search`].
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query names no collection to search.
    #[error("a proximity search needs at least one collection")]
    NoCollections,
    /// The radius was not a positive finite number.
    #[error("search radius must be positive, got {0} m")]
    InvalidRadius(f64),
    /// The centre was empty or out of range.
    #[error("search centre {0} is not a valid position")]
    InvalidCenter(Coordinates),
    /// The result cap was zero.
    #[error("search result limit must be at least one")]
    InvalidLimit,
    /// The underlying query failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters of a proximity search.
///
/// # Examples
///
/// ```
/// use placemark_core::{Coordinates, store::ProximityQuery};
///
/// let query = ProximityQuery::new(Coordinates::unchecked(45.0, 9.0), 5_000.0)
///     .in_collections([1, 2])
///     .with_name("cafe")
///     .only_flagged(true);
/// assert_eq!(query.collections(), &[1, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityQuery {
    center: Coordinates,
    radius: f64,
    collections: Vec<CollectionId>,
    name: Option<String>,
    only_flagged: bool,
    limit: usize,
}

impl ProximityQuery {
    /// Search within `radius` metres of `center`.
    #[must_use]
    pub fn new(center: Coordinates, radius: f64) -> Self {
        Self {
            center,
            radius,
            collections: Vec::new(),
            name: None,
            only_flagged: false,
            limit: DEFAULT_RESULT_CAP,
        }
    }

    /// Restrict the search to the given collections.
    #[must_use]
    pub fn in_collections(mut self, ids: impl IntoIterator<Item = CollectionId>) -> Self {
        self.collections.extend(ids);
        self.collections.sort_unstable();
        self.collections.dedup();
        self
    }

    /// Keep only placemarks whose name contains `needle`, ignoring case.
    ///
    /// A blank needle disables the filter.
    #[must_use]
    pub fn with_name(mut self, needle: &str) -> Self {
        let needle = needle.trim();
        self.name = (!needle.is_empty()).then(|| needle.to_lowercase());
        self
    }

    /// Keep only placemarks at a flagged location.
    #[must_use]
    pub const fn only_flagged(mut self, only_flagged: bool) -> Self {
        self.only_flagged = only_flagged;
        self
    }

    /// Override the result cap.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Centre of the search.
    #[must_use]
    pub const fn center(&self) -> Coordinates {
        self.center
    }

    /// Radius in metres.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Collections searched, sorted and de-duplicated.
    #[must_use]
    pub fn collections(&self) -> &[CollectionId] {
        &self.collections
    }

    /// Result cap.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.collections.is_empty() {
            return Err(SearchError::NoCollections);
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SearchError::InvalidRadius(self.radius));
        }
        if !self.center.is_valid() {
            return Err(SearchError::InvalidCenter(self.center));
        }
        if self.limit == 0 {
            return Err(SearchError::InvalidLimit);
        }
        Ok(())
    }

    fn matches_name(&self, placemark: &Placemark) -> bool {
        self.name
            .as_deref()
            .is_none_or(|needle| placemark.name.to_lowercase().contains(needle))
    }
}

/// Inclusive range of fixed-point longitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongitudeRange {
    /// Western bound.
    pub min: i64,
    /// Eastern bound.
    pub max: i64,
}

impl LongitudeRange {
    fn degrees(min: f64, max: f64) -> Self {
        Self {
            min: encode_f64(min),
            max: encode_f64(max),
        }
    }

    const fn contains(self, longitude: i64) -> bool {
        self.min <= longitude && longitude <= self.max
    }
}

/// Fixed-point box covering a circle, split in two across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Southern bound.
    pub min_latitude: i64,
    /// Northern bound.
    pub max_latitude: i64,
    /// Primary longitude range.
    pub longitudes: LongitudeRange,
    /// Second range on the far side of the antimeridian, if the box wraps.
    pub wrapped: Option<LongitudeRange>,
}

impl BoundingBox {
    /// Box conservatively covering every point within `radius` metres of
    /// `center`.
    ///
    /// Boxes reaching a pole span every longitude.
    #[must_use]
    pub fn around(center: Coordinates, radius: f64) -> Self {
        let (lat_floor, lat_ceiling) = (
            f64::from(*LATITUDE_RANGE.start()),
            f64::from(*LATITUDE_RANGE.end()),
        );
        let (west_edge, east_edge) = (
            f64::from(*LONGITUDE_RANGE.start()),
            f64::from(*LONGITUDE_RANGE.end()),
        );
        let latitude = f64::from(center.latitude);
        let longitude = f64::from(center.longitude);

        let lat_span = radius / METRES_PER_LATITUDE_DEGREE * BOX_MARGIN;
        let south = (latitude - lat_span).max(lat_floor);
        let north = (latitude + lat_span).min(lat_ceiling);

        let widest = south.abs().max(north.abs());
        let scale = METRES_PER_LONGITUDE_DEGREE * widest.to_radians().cos();
        let lon_span = if scale > f64::EPSILON {
            radius / scale * BOX_MARGIN
        } else {
            f64::INFINITY
        };

        let (longitudes, wrapped) = if lon_span >= 180.0 || widest >= lat_ceiling {
            (LongitudeRange::degrees(west_edge, east_edge), None)
        } else {
            let west = longitude - lon_span;
            let east = longitude + lon_span;
            if west < west_edge {
                (
                    LongitudeRange::degrees(west_edge, east),
                    Some(LongitudeRange::degrees(west + 360.0, east_edge)),
                )
            } else if east > east_edge {
                (
                    LongitudeRange::degrees(west, east_edge),
                    Some(LongitudeRange::degrees(west_edge, east - 360.0)),
                )
            } else {
                (LongitudeRange::degrees(west, east), None)
            }
        };

        Self {
            min_latitude: encode_f64(south),
            max_latitude: encode_f64(north),
            longitudes,
            wrapped,
        }
    }

    /// Report whether a fixed-point position lies inside the box.
    #[must_use]
    pub fn contains(&self, latitude: i64, longitude: i64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.longitudes.contains(longitude)
                || self.wrapped.is_some_and(|range| range.contains(longitude)))
    }

    fn predicate(&self) -> &'static str {
        if self.wrapped.is_some() {
            "p.latitude BETWEEN ? AND ? \
             AND (p.longitude BETWEEN ? AND ? OR p.longitude BETWEEN ? AND ?)"
        } else {
            "p.latitude BETWEEN ? AND ? AND p.longitude BETWEEN ? AND ?"
        }
    }

    fn bounds(&self) -> impl Iterator<Item = i64> {
        [
            self.min_latitude,
            self.max_latitude,
            self.longitudes.min,
            self.longitudes.max,
        ]
        .into_iter()
        .chain(self.wrapped.into_iter().flat_map(|range| [range.min, range.max]))
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matching placemark.
    pub placemark: Placemark,
    /// Exact distance from the query centre in metres.
    pub distance: f64,
    /// Whether the placemark's location carries a flagged annotation.
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Rank {
    distance: f64,
    latitude: i64,
    longitude: i64,
    id: i64,
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.latitude.cmp(&other.latitude))
            .then(self.longitude.cmp(&other.longitude))
            .then(self.id.cmp(&other.id))
    }
}

/// Nearest placemarks matching `query`, closest first.
///
/// Ties on distance are broken by latitude, then longitude, then id. At most
/// [`ProximityQuery::limit`] hits are returned, and they are exactly the
/// closest matching placemarks.
pub fn search(connection: &Connection, query: &ProximityQuery) -> Result<Vec<SearchHit>, SearchError> {
    query.validate()?;
    let center = query.center;
    let mut window = BoundingBox::around(center, query.radius);

    let placeholders = vec!["?"; query.collections.len()].join(", ");
    let favourites = if query.only_flagged {
        " AND a.flag != 0"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {columns}, COALESCE(a.flag, 0)
            FROM placemark AS p
            LEFT JOIN placemark_annotation AS a
                ON a.latitude = p.latitude AND a.longitude = p.longitude
            WHERE p.collection_id IN ({placeholders}) AND {predicate}{favourites}",
        columns = placemarks::COLUMNS,
        predicate = window.predicate(),
    );
    let mut statement = connection
        .prepare(&sql)
        .map_err(sqlite("prepare proximity search"))?;
    let params = query.collections.iter().copied().chain(window.bounds());
    let mut rows = statement
        .query(params_from_iter(params))
        .map_err(sqlite("run proximity search"))?;

    let mut cutoff = query.radius;
    let mut kept: BTreeMap<Rank, SearchHit> = BTreeMap::new();
    let mut scanned = 0_usize;
    while let Some(row) = rows.next().map_err(sqlite("read proximity search row"))? {
        scanned += 1;
        let latitude: i64 = row.get(1).map_err(sqlite("read candidate latitude"))?;
        let longitude: i64 = row.get(2).map_err(sqlite("read candidate longitude"))?;
        if !window.contains(latitude, longitude) {
            continue;
        }
        let placemark = placemarks::from_row(row).map_err(sqlite("read candidate placemark"))?;
        let distance = center.distance_to(placemark.coordinates);
        if distance > cutoff || !query.matches_name(&placemark) {
            continue;
        }
        let flagged = row.get::<_, i64>(6).map_err(sqlite("read candidate flag"))? != 0;
        let rank = Rank {
            distance,
            latitude,
            longitude,
            id: placemark.id,
        };
        kept.insert(
            rank,
            SearchHit {
                placemark,
                distance,
                flagged,
            },
        );
        if kept.len() > query.limit {
            kept.pop_last();
        }
        if kept.len() == query.limit
            && let Some((farthest, _)) = kept.last_key_value()
            && farthest.distance < cutoff
        {
            cutoff = farthest.distance;
            window = BoundingBox::around(center, cutoff);
        }
    }
    log::debug!(
        "proximity search at {center} within {} m scanned {scanned} rows, kept {}",
        query.radius,
        kept.len()
    );
    Ok(kept.into_values().collect())
}
