//! Closed set of supported formats and the rules for choosing one.

use std::{fmt, str::FromStr};

/// Column order of the two coordinates in delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateOrder {
    /// Longitude first, as in TomTom ASC and most POI CSV exports.
    #[default]
    LonLat,
    /// Latitude first.
    LatLon,
}

/// A format an importer exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// GPS Exchange Format waypoints.
    Gpx,
    /// Keyhole Markup Language placemarks.
    Kml,
    /// RSS or Atom feeds with GeoRSS or W3C geo positions.
    GeoRss,
    /// GeoJSON features.
    GeoJson,
    /// TomTom OV2 binary records.
    Ov2,
    /// Delimited text, one placemark per line.
    Text(CoordinateOrder),
    /// ZIP container, including KMZ.
    Zip,
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gpx => "GPX",
            Self::Kml => "KML",
            Self::GeoRss => "GeoRSS",
            Self::GeoJson => "GeoJSON",
            Self::Ov2 => "OV2",
            Self::Text(CoordinateOrder::LonLat) => "text (lon, lat)",
            Self::Text(CoordinateOrder::LatLon) => "text (lat, lon)",
            Self::Zip => "ZIP",
        };
        f.write_str(name)
    }
}

/// Format chosen by the user for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatFilter {
    /// Infer the format from the source.
    #[default]
    None,
    /// GPX.
    Gpx,
    /// KML.
    Kml,
    /// Zipped KML.
    Kmz,
    /// GeoRSS or Atom.
    GeoRss,
    /// GeoJSON.
    GeoJson,
    /// TomTom OV2.
    Ov2,
    /// Delimited text with longitude first.
    CsvLonLat,
    /// Delimited text with latitude first.
    CsvLatLon,
}

impl FormatFilter {
    /// Format used when nothing can be inferred from the source.
    #[must_use]
    pub const fn default_format(self) -> Option<ImportFormat> {
        match self {
            Self::None => None,
            Self::Gpx => Some(ImportFormat::Gpx),
            Self::Kml => Some(ImportFormat::Kml),
            Self::Kmz => Some(ImportFormat::Zip),
            Self::GeoRss => Some(ImportFormat::GeoRss),
            Self::GeoJson => Some(ImportFormat::GeoJson),
            Self::Ov2 => Some(ImportFormat::Ov2),
            Self::CsvLonLat => Some(ImportFormat::Text(CoordinateOrder::LonLat)),
            Self::CsvLatLon => Some(ImportFormat::Text(CoordinateOrder::LatLon)),
        }
    }

    const fn text_order(self) -> Option<CoordinateOrder> {
        match self {
            Self::CsvLonLat => Some(CoordinateOrder::LonLat),
            Self::CsvLatLon => Some(CoordinateOrder::LatLon),
            _ => None,
        }
    }

    /// Apply the filter to an inferred format.
    ///
    /// Text keeps the filter's column order when the filter names one.
    const fn refine(self, inferred: ImportFormat) -> ImportFormat {
        match (inferred, self.text_order()) {
            (ImportFormat::Text(_), Some(order)) => ImportFormat::Text(order),
            _ => inferred,
        }
    }
}

/// Error returned when parsing an unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format filter {0:?}")]
pub struct UnknownFilter(pub String);

impl FromStr for FormatFilter {
    type Err = UnknownFilter;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "auto" => Ok(Self::None),
            "gpx" => Ok(Self::Gpx),
            "kml" => Ok(Self::Kml),
            "kmz" => Ok(Self::Kmz),
            "georss" | "rss" | "atom" => Ok(Self::GeoRss),
            "geojson" | "json" => Ok(Self::GeoJson),
            "ov2" => Ok(Self::Ov2),
            "csv" | "csv-lonlat" | "lonlat" => Ok(Self::CsvLonLat),
            "csv-latlon" | "latlon" => Ok(Self::CsvLatLon),
            _ => Err(UnknownFilter(value.to_owned())),
        }
    }
}

/// Choose the format for a resolved source.
///
/// The declared MIME type wins when it is unambiguous, then the file
/// extension of `name`, then the filter's own default. Returns `None` only
/// when nothing can be inferred and the filter is [`FormatFilter::None`].
///
/// # Examples
///
/// ```
/// use placemark_data::{CoordinateOrder, FormatFilter, ImportFormat, select_format};
///
/// assert_eq!(
///     select_format(Some("text/csv"), "poi.dat", FormatFilter::CsvLatLon),
///     Some(ImportFormat::Text(CoordinateOrder::LatLon)),
/// );
/// assert_eq!(select_format(None, "poi.dat", FormatFilter::None), None);
/// ```
#[must_use]
pub fn select_format(mime_type: Option<&str>, name: &str, filter: FormatFilter) -> Option<ImportFormat> {
    mime_type
        .and_then(from_mime)
        .or_else(|| from_extension(name))
        .map(|inferred| filter.refine(inferred))
        .or_else(|| filter.default_format())
}

/// Choose the format of a ZIP entry from its name alone.
///
/// Entries without a recognised extension are not imported, so the
/// filter's default is never applied here.
#[must_use]
pub fn select_entry_format(name: &str, filter: FormatFilter) -> Option<ImportFormat> {
    from_extension(name).map(|inferred| filter.refine(inferred))
}

fn from_mime(mime_type: &str) -> Option<ImportFormat> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    let format = match mime_type.as_str() {
        // Generic XML says nothing about the dialect.
        "text/xml" | "application/xml" => return None,
        "application/vnd.google-earth.kml+xml" => ImportFormat::Kml,
        "application/gpx+xml" | "application/gpx" => ImportFormat::Gpx,
        "application/rss+xml" | "application/atom+xml" | "application/georss+xml" => {
            ImportFormat::GeoRss
        }
        "application/geo+json" | "application/json" | "application/vnd.geo+json" => {
            ImportFormat::GeoJson
        }
        zip if zip.contains("zip") || zip == "application/vnd.google-earth.kmz" => {
            ImportFormat::Zip
        }
        text if text.starts_with("text/") => ImportFormat::Text(CoordinateOrder::default()),
        _ => return None,
    };
    Some(format)
}

fn from_extension(name: &str) -> Option<ImportFormat> {
    let path = name.split(['?', '#']).next().unwrap_or_default();
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let (_, extension) = file_name.rsplit_once('.')?;
    let format = match extension.to_ascii_lowercase().as_str() {
        "gpx" => ImportFormat::Gpx,
        "kml" => ImportFormat::Kml,
        "kmz" | "zip" => ImportFormat::Zip,
        "xml" | "rss" | "atom" | "georss" => ImportFormat::GeoRss,
        "json" | "geojson" => ImportFormat::GeoJson,
        "ov2" => ImportFormat::Ov2,
        "asc" | "csv" | "txt" => ImportFormat::Text(CoordinateOrder::default()),
        _ => return None,
    };
    Some(format)
}
