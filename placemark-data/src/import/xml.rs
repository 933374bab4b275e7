//! Event-driven XML reading shared by the GPX, KML and GeoRSS importers.
//!
//! The driver keeps a stack of open elements, each tagged with the dialect
//! of its namespace, and hands element boundaries and their text to a
//! format-specific [`XmlHandler`]. Every open element gets its own text
//! buffer; inside free-text elements the text of nested markup is folded
//! into the enclosing element.

use std::io::{BufReader, Read};

use quick_xml::{
    NsReader,
    events::{BytesStart, Event},
    name::ResolveResult,
};

use super::{ImportError, PlacemarkSink};

/// Namespaces whose elements the importers distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    /// `http://www.georss.org/georss`
    GeoRss,
    /// `http://www.w3.org/2003/01/geo/wgs84_pos#`
    W3cGeo,
    /// `http://www.opengis.net/gml`
    Gml,
    /// Anything else, including the document's default namespace.
    Other,
}

impl Dialect {
    fn from_namespace(uri: &[u8]) -> Self {
        match uri {
            b"http://www.georss.org/georss" => Self::GeoRss,
            b"http://www.w3.org/2003/01/geo/wgs84_pos#" => Self::W3cGeo,
            b"http://www.opengis.net/gml" => Self::Gml,
            _ => Self::Other,
        }
    }

    /// Fallback for documents that use a prefix without declaring it.
    fn from_prefix(prefix: &[u8]) -> Self {
        match prefix {
            b"georss" => Self::GeoRss,
            b"geo" => Self::W3cGeo,
            b"gml" => Self::Gml,
            _ => Self::Other,
        }
    }
}

/// One open element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) dialect: Dialect,
    pub(crate) name: String,
}

impl Frame {
    pub(crate) fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub(crate) fn is_in(&self, dialect: Dialect, name: &str) -> bool {
        self.dialect == dialect && self.name == name
    }
}

/// Element path from the document root to the current element inclusive.
pub(crate) struct Path<'a>(&'a [Frame]);

impl Path<'_> {
    /// The current element.
    pub(crate) fn current(&self) -> Option<&Frame> {
        self.0.last()
    }

    /// The current element's parent.
    pub(crate) fn parent(&self) -> Option<&Frame> {
        self.0.len().checked_sub(2).and_then(|index| self.0.get(index))
    }

    /// Report whether any open element is called `name`.
    pub(crate) fn within(&self, name: &str) -> bool {
        self.0.iter().any(|frame| frame.is(name))
    }
}

/// Callbacks for one XML dialect.
pub(crate) trait XmlHandler {
    /// An element opened; `attributes` holds local names and unescaped values.
    fn start(&mut self, path: &Path<'_>, attributes: &[(String, String)]);

    /// An element closed with `text` as its character content.
    fn end(&mut self, path: &Path<'_>, text: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError>;

    /// Whether the current element holds free text such as a description,
    /// where markup like `<b>` is part of the content.
    fn free_text(&self, _path: &Path<'_>) -> bool {
        false
    }
}

/// Character content collected for one open element.
#[derive(Debug, Default)]
struct TextBuffer {
    text: String,
    free: bool,
}

/// Read an XML document to the end, dispatching to `handler`.
pub(crate) fn drive(
    reader: &mut dyn Read,
    handler: &mut dyn XmlHandler,
    sink: &mut dyn PlacemarkSink,
) -> Result<(), ImportError> {
    let mut xml = NsReader::from_reader(BufReader::new(reader));
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut texts: Vec<TextBuffer> = Vec::new();

    loop {
        let (resolution, event) = match xml.read_resolved_event_into(&mut buf) {
            Ok(pair) => pair,
            Err(source) => {
                return Err(ImportError::Xml {
                    position: xml_position(&xml),
                    source,
                });
            }
        };
        match event {
            Event::Start(start) => {
                stack.push(frame(&resolution, &start));
                let path = Path(&stack);
                let free = texts.last().is_some_and(|parent| parent.free) || handler.free_text(&path);
                texts.push(TextBuffer {
                    text: String::new(),
                    free,
                });
                handler.start(&path, &attributes(&start));
            }
            Event::Empty(start) => {
                stack.push(frame(&resolution, &start));
                handler.start(&Path(&stack), &attributes(&start));
                handler.end(&Path(&stack), "", sink)?;
                stack.pop();
            }
            Event::End(_) => {
                let closed = texts.pop().unwrap_or_default();
                handler.end(&Path(&stack), closed.text.trim(), sink)?;
                stack.pop();
                if let Some(parent) = texts.last_mut().filter(|parent| parent.free) {
                    parent.text.push_str(&closed.text);
                }
            }
            Event::Text(content) => {
                let unescaped = content.unescape().map_err(|source| ImportError::Xml {
                    position: xml_position(&xml),
                    source,
                })?;
                // Indentation between elements is dropped outside free text.
                if let Some(buffer) = texts
                    .last_mut()
                    .filter(|buffer| buffer.free || !unescaped.trim().is_empty())
                {
                    buffer.text.push_str(&unescaped);
                }
            }
            Event::CData(content) => {
                if let Some(buffer) = texts.last_mut() {
                    buffer.text.push_str(&String::from_utf8_lossy(&content));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn xml_position<R>(xml: &NsReader<R>) -> u64 {
    u64::try_from(xml.buffer_position()).unwrap_or(u64::MAX)
}

fn frame(resolution: &ResolveResult<'_>, start: &BytesStart<'_>) -> Frame {
    let dialect = match resolution {
        ResolveResult::Bound(namespace) => Dialect::from_namespace(namespace.as_ref()),
        ResolveResult::Unknown(prefix) => Dialect::from_prefix(prefix),
        ResolveResult::Unbound => Dialect::Other,
    };
    Frame {
        dialect,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
    }
}

fn attributes(start: &BytesStart<'_>) -> Vec<(String, String)> {
    start
        .attributes()
        .filter_map(Result::ok)
        .filter_map(|attribute| {
            let value = attribute.unescape_value().ok()?.into_owned();
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            Some((key, value))
        })
        .collect()
}

/// Look up an attribute by local name.
pub(crate) fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::PlacemarkDraft;
    use rstest::rstest;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(Dialect, String, String)>,
    }

    impl XmlHandler for Recorder {
        fn start(&mut self, _path: &Path<'_>, _attributes: &[(String, String)]) {}

        fn end(&mut self, path: &Path<'_>, text: &str, _sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
            if let Some(frame) = path.current() {
                self.seen.push((frame.dialect, frame.name.clone(), text.to_owned()));
            }
            Ok(())
        }
    }

    #[rstest]
    fn classifies_namespaces_and_collects_text() {
        let document = br#"<rss xmlns:georss="http://www.georss.org/georss" xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#">
            <item><title>A &amp; B</title><georss:point>1 2</georss:point><geo:lat>3</geo:lat>
            <gml:pos>5 6</gml:pos><description><![CDATA[<b>bold</b>]]></description></item></rss>"#;
        let mut recorder = Recorder::default();
        let mut sink: Vec<PlacemarkDraft> = Vec::new();
        drive(&mut &document[..], &mut recorder, &mut sink).expect("well-formed XML");

        assert!(recorder.seen.contains(&(Dialect::Other, "title".into(), "A & B".into())));
        assert!(recorder.seen.contains(&(Dialect::GeoRss, "point".into(), "1 2".into())));
        assert!(recorder.seen.contains(&(Dialect::W3cGeo, "lat".into(), "3".into())));
        assert!(recorder.seen.contains(&(Dialect::Gml, "pos".into(), "5 6".into())));
        assert!(recorder.seen.contains(&(Dialect::Other, "description".into(), "<b>bold</b>".into())));
    }

    #[derive(Default)]
    struct DescriptionRecorder(Recorder);

    impl XmlHandler for DescriptionRecorder {
        fn start(&mut self, _path: &Path<'_>, _attributes: &[(String, String)]) {}

        fn end(&mut self, path: &Path<'_>, text: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
            self.0.end(path, text, sink)
        }

        fn free_text(&self, path: &Path<'_>) -> bool {
            path.current().is_some_and(|frame| frame.is("description"))
        }
    }

    #[rstest]
    #[case::inline_markup("<description>Hello <b>x</b> world</description>", "Hello x world")]
    #[case::nested_markup("<description><p>One <i>two</i></p> three</description>", "One two three")]
    #[case::indented_lines("<description>\n  first\n  second\n</description>", "first\n  second")]
    fn free_text_keeps_nested_markup_text(#[case] body: &str, #[case] expected: &str) {
        let document = format!("<item>\n  <title>T</title>\n  {body}\n</item>");
        let mut recorder = DescriptionRecorder::default();
        let mut sink: Vec<PlacemarkDraft> = Vec::new();
        drive(&mut document.as_bytes(), &mut recorder, &mut sink).expect("well-formed XML");

        let seen = &recorder.0.seen;
        assert!(seen.contains(&(Dialect::Other, "description".into(), expected.into())));
        assert!(seen.contains(&(Dialect::Other, "title".into(), "T".into())));
        assert!(seen.contains(&(Dialect::Other, "item".into(), String::new())));
    }

    #[rstest]
    fn reports_malformed_documents() {
        let mut recorder = Recorder::default();
        let mut sink: Vec<PlacemarkDraft> = Vec::new();
        let err = drive(&mut &b"<gpx><wpt></gpx>"[..], &mut recorder, &mut sink).expect_err("mismatched tags");
        assert!(matches!(err, ImportError::Xml { .. }));
    }
}
