//! RSS and Atom feeds carrying GeoRSS or W3C geo positions.

use std::io::Read;

use placemark_core::Coordinates;

use super::{
    ImportError, Importer, PlacemarkDraft, PlacemarkSink,
    draft::{Centroid, parse_degrees, push_lat_lon_pairs},
    xml::{self, Dialect, Path, XmlHandler},
};

/// Imports RSS `<item>` and Atom `<entry>` elements.
///
/// Positions come from, in order of preference: `georss:point`,
/// `georss:where/gml:Point/gml:pos`, the centroid of `georss:line` or
/// `georss:polygon`, and finally `geo:lat` with `geo:long`.
#[derive(Debug, Default)]
pub struct GeoRssImporter {
    state: State,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Building(Box<Entry>),
}

#[derive(Debug, Default)]
struct Entry {
    draft: PlacemarkDraft,
    point: Option<Coordinates>,
    shape: Centroid,
    latitude: Option<f32>,
    longitude: Option<f32>,
}

impl Entry {
    fn finish(self) -> PlacemarkDraft {
        let Self {
            mut draft,
            point,
            shape,
            latitude,
            longitude,
        } = self;
        draft.coordinates = match (point, latitude, longitude) {
            (Some(point), _, _) => point,
            (None, _, _) if !shape.is_empty() => shape.finish(),
            (None, Some(latitude), Some(longitude)) => Coordinates::unchecked(latitude, longitude),
            _ => Coordinates::EMPTY,
        };
        draft
    }
}

fn is_entry(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

fn single_point(text: &str) -> Option<Coordinates> {
    let mut centroid = Centroid::default();
    push_lat_lon_pairs(text, &mut centroid);
    (!centroid.is_empty()).then(|| centroid.finish())
}

impl Importer for GeoRssImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        self.state = State::Idle;
        xml::drive(reader, self, sink)
    }
}

impl XmlHandler for GeoRssImporter {
    fn start(&mut self, path: &Path<'_>, _attributes: &[(String, String)]) {
        if path
            .current()
            .is_some_and(|frame| frame.dialect == Dialect::Other && is_entry(&frame.name))
        {
            self.state = State::Building(Box::default());
        }
    }

    fn end(&mut self, path: &Path<'_>, text: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let Some(current) = path.current() else {
            return Ok(());
        };
        if current.dialect == Dialect::Other && is_entry(&current.name) {
            if let State::Building(entry) = std::mem::take(&mut self.state) {
                sink.accept(entry.finish())?;
            }
            return Ok(());
        }
        let State::Building(entry) = &mut self.state else {
            return Ok(());
        };
        let direct_child = path
            .parent()
            .is_some_and(|parent| is_entry(&parent.name));
        match (current.dialect, current.name.as_str()) {
            (Dialect::GeoRss, "point") => entry.point = entry.point.or_else(|| single_point(text)),
            (Dialect::Gml, "pos") if path.within("where") => {
                entry.point = entry.point.or_else(|| single_point(text));
            }
            (Dialect::GeoRss, "line" | "polygon") => push_lat_lon_pairs(text, &mut entry.shape),
            (Dialect::W3cGeo, "lat") => entry.latitude = parse_degrees(text),
            (Dialect::W3cGeo, "long" | "lon") => entry.longitude = parse_degrees(text),
            (Dialect::Other, "title") if direct_child => text.clone_into(&mut entry.draft.name),
            (Dialect::Other, "description" | "summary" | "content")
                if direct_child && entry.draft.description.is_empty() =>
            {
                text.clone_into(&mut entry.draft.description);
            }
            _ => {}
        }
        Ok(())
    }

    fn free_text(&self, path: &Path<'_>) -> bool {
        path.current().is_some_and(|frame| {
            frame.dialect == Dialect::Other
                && matches!(frame.name.as_str(), "title" | "description" | "summary" | "content")
        })
    }
}
