//! ZIP and KMZ containers.

use std::io::{self, Read};

use ::zip::ZipArchive;

use super::{ImportContext, ImportError, Importer, PlacemarkSink, select_entry_format};

/// Imports every recognisable entry of a ZIP container.
///
/// The stream is spooled to an anonymous temporary file because the central
/// directory sits at the end of the archive. Entries are dispatched by name;
/// directories, dotfiles and macOS resource forks are skipped.
#[derive(Debug)]
pub struct ZipImporter {
    context: ImportContext,
}

impl ZipImporter {
    /// Importer whose entries resolve relative to `context`.
    #[must_use]
    pub const fn new(context: ImportContext) -> Self {
        Self { context }
    }
}

fn is_hidden(name: &str) -> bool {
    name.split('/')
        .any(|component| component.starts_with('.') || component == "__MACOSX")
}

impl Importer for ZipImporter {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let mut spool = tempfile::tempfile().map_err(ImportError::Spool)?;
        io::copy(reader, &mut spool).map_err(ImportError::Spool)?;
        let mut archive = ZipArchive::new(spool).map_err(ImportError::Zip)?;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(ImportError::Zip)?;
            let name = entry.name().to_owned();
            if entry.is_dir() || is_hidden(&name) {
                log::debug!("skipping archive entry {name}");
                continue;
            }
            let Some(format) = select_entry_format(&name, self.context.filter()) else {
                log::debug!("skipping archive entry {name}: unrecognised format");
                continue;
            };
            log::debug!("importing archive entry {name} as {format}");
            format
                .importer(self.context.entry(&name))
                .import(&mut entry, sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{
        PlacemarkDraft,
        test_support::{FixtureResolver, context, drafts},
    };
    use ::zip::{ZipWriter, write::SimpleFileOptions};
    use placemark_core::Coordinates;
    use rstest::rstest;
    use std::io::{Cursor, Write};

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .expect("add directory");
            } else {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .expect("start entry");
                writer.write_all(body).expect("write entry");
            }
        }
        writer.finish().expect("finish archive").into_inner()
    }

    #[rstest]
    fn imports_recognised_entries_in_order() {
        let kml: &[u8] = br#"<kml><Placemark><name>Inside</name><Point><coordinates>1,2</coordinates></Point></Placemark></kml>"#;
        let body = archive(&[
            ("doc/", &b""[..]),
            ("doc/places.kml", kml),
            ("._places.kml", &b"resource fork"[..]),
            ("__MACOSX/doc/places.kml", kml),
            ("readme.md", &b"# notes"[..]),
            ("extra.csv", &b"5.0,6.0,Row\n"[..]),
        ]);
        let mut importer = ZipImporter::new(context(FixtureResolver::default(), "/tmp/bundle.kmz"));
        assert_eq!(
            drafts(&mut importer, &body),
            [
                PlacemarkDraft::new("Inside", "", Coordinates::unchecked(2.0, 1.0)),
                PlacemarkDraft::new("Row", "", Coordinates::unchecked(6.0, 5.0)),
            ]
        );
    }

    #[rstest]
    fn nested_archives_are_imported() {
        let inner = archive(&[("inner.csv", &b"1.0,1.0,Deep\n"[..])]);
        let outer = archive(&[("inner.zip", inner.as_slice())]);
        let mut importer = ZipImporter::new(context(FixtureResolver::default(), "/tmp/outer.zip"));
        let names: Vec<_> = drafts(&mut importer, &outer)
            .into_iter()
            .map(|draft| draft.name)
            .collect();
        assert_eq!(names, ["Deep"]);
    }

    #[rstest]
    fn rejects_data_that_is_not_an_archive() {
        let mut importer = ZipImporter::new(context(FixtureResolver::default(), "/tmp/broken.zip"));
        let mut sink = Vec::new();
        let err = importer
            .import(&mut &b"definitely not a zip"[..], &mut sink)
            .expect_err("not an archive");
        assert!(matches!(err, ImportError::Zip(_)));
    }

    #[rstest]
    #[case("._hidden.kml", true)]
    #[case("dir/.DS_Store", true)]
    #[case("__MACOSX/a.kml", true)]
    #[case("doc.kml", false)]
    fn detects_hidden_entries(#[case] name: &str, #[case] hidden: bool) {
        assert_eq!(is_hidden(name), hidden);
    }
}
