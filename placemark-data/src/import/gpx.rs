//! GPX waypoints.

use std::io::Read;

use placemark_core::Coordinates;

use super::{
    ImportError, Importer, PlacemarkDraft, PlacemarkSink,
    draft::parse_degrees,
    xml::{self, Path, XmlHandler},
};

/// Imports every `<wpt>` with its `name`, and `desc` falling back to `cmt`.
#[derive(Debug, Default)]
pub struct GpxImporter {
    state: State,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Building {
        draft: PlacemarkDraft,
        comment: String,
    },
}

impl Importer for GpxImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        self.state = State::Idle;
        xml::drive(reader, self, sink)
    }
}

impl XmlHandler for GpxImporter {
    fn start(&mut self, path: &Path<'_>, attributes: &[(String, String)]) {
        if path.current().is_some_and(|frame| frame.is("wpt")) {
            let latitude = xml::attribute(attributes, "lat").and_then(parse_degrees);
            let longitude = xml::attribute(attributes, "lon").and_then(parse_degrees);
            let coordinates = match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Coordinates::unchecked(latitude, longitude),
                _ => Coordinates::EMPTY,
            };
            self.state = State::Building {
                draft: PlacemarkDraft::new("", "", coordinates),
                comment: String::new(),
            };
        }
    }

    fn end(&mut self, path: &Path<'_>, text: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let Some(current) = path.current() else {
            return Ok(());
        };
        if current.is("wpt") {
            if let State::Building { mut draft, comment } = std::mem::take(&mut self.state) {
                if draft.description.is_empty() {
                    draft.description = comment;
                }
                sink.accept(draft)?;
            }
            return Ok(());
        }
        let State::Building { draft, comment } = &mut self.state else {
            return Ok(());
        };
        if !path.parent().is_some_and(|parent| parent.is("wpt")) {
            return Ok(());
        }
        match current.name.as_str() {
            "name" => text.clone_into(&mut draft.name),
            "desc" => text.clone_into(&mut draft.description),
            "cmt" => text.clone_into(comment),
            _ => {}
        }
        Ok(())
    }

    fn free_text(&self, path: &Path<'_>) -> bool {
        path.current()
            .is_some_and(|frame| matches!(frame.name.as_str(), "name" | "desc" | "cmt"))
    }
}
