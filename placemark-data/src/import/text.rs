//! Delimited text: one `lon, lat, name` record per line.

use std::{
    io::{self, BufRead, BufReader, Read},
    sync::OnceLock,
};

use placemark_core::Coordinates;
use regex::Regex;

use super::{CoordinateOrder, ImportError, ImportFormat, Importer, PlacemarkDraft, PlacemarkSink};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Two numbers and a name, each optionally quoted, separated by a comma,
/// semicolon or whitespace. A quoted name may contain doubled quotes.
const LINE_PATTERN: &str = r#"(?x)
    ^\s*
    "?(?P<first>[-+]?(?:\d+\.?\d*|\.\d+))"?
    \s*[,;\s]\s*
    "?(?P<second>[-+]?(?:\d+\.?\d*|\.\d+))"?
    \s*[,;\s]\s*
    (?:"(?P<quoted>(?:[^"]|"")*)"|(?P<bare>[^"]*?))
    \s*$
"#;

fn line_pattern() -> Result<&'static Regex, ImportError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(LINE_PATTERN))
        .as_ref()
        .map_err(|err| read_error(io::Error::other(err.clone())))
}

/// Line-oriented importer for ASC and CSV exports.
///
/// Lines starting with `;` or `#` and blank lines are comments. Lines that
/// do not match are logged and skipped; the rest of the file still imports.
/// Each line is decoded as UTF-8, falling back to Latin-1.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextImporter {
    order: CoordinateOrder,
}

impl TextImporter {
    /// Importer reading coordinates in `order`.
    #[must_use]
    pub const fn new(order: CoordinateOrder) -> Self {
        Self { order }
    }

    fn parse(&self, pattern: &Regex, line: &str) -> Option<PlacemarkDraft> {
        let captures = pattern.captures(line)?;
        let first: f32 = captures.name("first")?.as_str().parse().ok()?;
        let second: f32 = captures.name("second")?.as_str().parse().ok()?;
        let (latitude, longitude) = match self.order {
            CoordinateOrder::LonLat => (second, first),
            CoordinateOrder::LatLon => (first, second),
        };
        let name = match (captures.name("quoted"), captures.name("bare")) {
            (Some(quoted), _) => quoted.as_str().replace("\"\"", "\""),
            (None, Some(bare)) => bare.as_str().to_owned(),
            (None, None) => String::new(),
        };
        Some(PlacemarkDraft::new(name, "", Coordinates::unchecked(latitude, longitude)))
    }
}

impl Importer for TextImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let pattern = line_pattern()?;
        let mut reader = BufReader::new(reader);
        let mut bytes = Vec::new();
        let mut number = 0_usize;
        loop {
            bytes.clear();
            if reader.read_until(b'\n', &mut bytes).map_err(read_error)? == 0 {
                return Ok(());
            }
            number += 1;
            let decoded = decode(std::mem::take(&mut bytes));
            let line = decoded.trim_start_matches(BYTE_ORDER_MARK).trim_end_matches(['\r', '\n']);
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with([';', '#']) {
                continue;
            }
            match self.parse(pattern, line) {
                Some(draft) => sink.accept(draft)?,
                None => log::debug!("skipping malformed text line {number}: {line:?}"),
            }
        }
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| err.into_bytes().into_iter().map(char::from).collect())
}

fn read_error(source: io::Error) -> ImportError {
    ImportError::Read {
        format: ImportFormat::Text(CoordinateOrder::default()),
        source,
    }
}
