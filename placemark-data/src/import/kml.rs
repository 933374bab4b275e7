//! KML placemarks and network links.

use std::io::Read;

use super::{
    ImportContext, ImportError, Importer, PlacemarkDraft, PlacemarkSink,
    draft::{Centroid, push_lon_lat_tuples},
    xml::{self, Path, XmlHandler},
};

/// Imports `<Placemark>` elements and follows `<NetworkLink>` hrefs.
///
/// A placemark's position is the centroid of every coordinate tuple inside
/// it, so points, lines, rings and multi-geometries all reduce to one point.
/// Links are followed after the enclosing document has been read.
#[derive(Debug)]
pub struct KmlImporter {
    context: ImportContext,
    state: State,
    links: Vec<String>,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Building {
        draft: PlacemarkDraft,
        centroid: Centroid,
    },
}

impl KmlImporter {
    /// Importer resolving links relative to `context`.
    #[must_use]
    pub fn new(context: ImportContext) -> Self {
        Self {
            context,
            state: State::Idle,
            links: Vec::new(),
        }
    }
}

impl Importer for KmlImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        self.state = State::Idle;
        self.links.clear();
        xml::drive(reader, self, sink)?;
        for href in std::mem::take(&mut self.links) {
            self.context.follow_link(&href, sink)?;
        }
        Ok(())
    }
}

impl XmlHandler for KmlImporter {
    fn start(&mut self, path: &Path<'_>, _attributes: &[(String, String)]) {
        if path.current().is_some_and(|frame| frame.is("Placemark")) {
            self.state = State::Building {
                draft: PlacemarkDraft::default(),
                centroid: Centroid::default(),
            };
        }
    }

    fn end(&mut self, path: &Path<'_>, text: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let Some(current) = path.current() else {
            return Ok(());
        };
        if current.is("href") && path.within("NetworkLink") && !text.is_empty() {
            if path
                .parent()
                .is_some_and(|parent| parent.is("Url") || parent.is("Link"))
            {
                self.links.push(text.to_owned());
            }
            return Ok(());
        }
        if current.is("Placemark") {
            if let State::Building { mut draft, centroid } = std::mem::take(&mut self.state) {
                draft.coordinates = centroid.finish();
                sink.accept(draft)?;
            }
            return Ok(());
        }
        let State::Building { draft, centroid } = &mut self.state else {
            return Ok(());
        };
        let direct_child = path.parent().is_some_and(|parent| parent.is("Placemark"));
        match current.name.as_str() {
            "coordinates" => push_lon_lat_tuples(text, centroid),
            "name" if direct_child => text.clone_into(&mut draft.name),
            "description" if direct_child => text.clone_into(&mut draft.description),
            _ => {}
        }
        Ok(())
    }

    fn free_text(&self, path: &Path<'_>) -> bool {
        path.current()
            .is_some_and(|frame| frame.is("name") || frame.is("description"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::test_support::{FixtureResolver, context, drafts};
    use placemark_core::Coordinates;
    use rstest::rstest;

    #[rstest]
    fn reduces_geometries_to_their_centroid() {
        let document = br#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
            <name>Document name</name>
            <Folder><Placemark>
                <name>Square</name>
                <description><![CDATA[A <i>closed</i> ring]]></description>
                <ExtendedData><Data name="x"><name>ignored</name></Data></ExtendedData>
                <Polygon><outerBoundaryIs><LinearRing>
                    <coordinates>0,0,0 2,0,0 2,2,0 0,2,0 0,0,0</coordinates>
                </LinearRing></outerBoundaryIs></Polygon>
            </Placemark>
            <Placemark><name>Peak</name><Point><coordinates>7.5,45.75,4478</coordinates></Point></Placemark>
            </Folder></Document></kml>"#;
        let mut importer = KmlImporter::new(context(FixtureResolver::default(), "/maps/doc.kml"));
        let drafts = drafts(&mut importer, document);
        assert_eq!(
            drafts,
            [
                PlacemarkDraft::new("Square", "A <i>closed</i> ring", Coordinates::unchecked(1.0, 1.0)),
                PlacemarkDraft::new("Peak", "", Coordinates::unchecked(45.75, 7.5)),
            ]
        );
    }

    #[rstest]
    fn follows_network_links_and_skips_unreachable_ones() {
        let linked = br#"<kml><Placemark><name>Linked</name><Point><coordinates>1,2</coordinates></Point></Placemark></kml>"#;
        let resolver = FixtureResolver::default().with("/maps/nested/linked.kml", linked);
        let document = br#"<kml><Document>
            <NetworkLink><name>Live</name><Link><href>nested/linked.kml</href></Link></NetworkLink>
            <NetworkLink><Url><href>http://unreachable.invalid/x.kml</href></Url></NetworkLink>
            <Placemark><name>Local</name><Point><coordinates>3,4</coordinates></Point></Placemark>
        </Document></kml>"#;
        let mut importer = KmlImporter::new(context(resolver, "/maps/doc.kml"));
        let names: Vec<_> = drafts(&mut importer, document)
            .into_iter()
            .map(|draft| draft.name)
            .collect();
        assert_eq!(names, ["Local", "Linked"]);
    }

    #[rstest]
    fn stops_following_self_referencing_links() {
        let looping = br#"<kml><NetworkLink><Link><href>loop.kml</href></Link></NetworkLink>
            <Placemark><name>Again</name><Point><coordinates>1,1</coordinates></Point></Placemark></kml>"#;
        let resolver = FixtureResolver::default().with("/maps/loop.kml", looping);
        let mut importer = KmlImporter::new(context(resolver, "/maps/loop.kml"));
        let count = drafts(&mut importer, looping).len();
        // The top-level document plus two levels of links.
        assert_eq!(count, 3);
    }
}
