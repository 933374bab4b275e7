//! TomTom OV2 binary POI files.
//!
//! Each record starts with a type byte. Types 2 (simple) and 3 (extended)
//! carry a little-endian total length, longitude and latitude in
//! hundred-thousandths of a degree, then null-terminated strings. Type 1 is a
//! fixed-size skipper block header; every other type is skipped by its length.

use std::io::{self, BufRead, BufReader, Read};

use placemark_core::Coordinates;

use super::{ImportError, ImportFormat, Importer, PlacemarkDraft, PlacemarkSink};

const COORDINATE_SCALE: f64 = 100_000.0;
/// Bytes after the type byte of a skipper block: length and a bounding box.
const SKIPPER_BODY: u64 = 20;
/// Type byte, length, longitude and latitude.
const POI_HEADER: u32 = 13;
/// Type byte and length.
const GENERIC_HEADER: u32 = 5;

/// Imports simple and extended POI records.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ov2Importer;

impl Importer for Ov2Importer {
    fn import(&mut self, reader: &mut dyn Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let mut records = Records {
            reader: BufReader::new(reader),
            offset: 0,
        };
        while let Some(kind) = records.next_type()? {
            let start = records.offset - 1;
            match kind {
                1 => records.skip(SKIPPER_BODY, start)?,
                2 | 3 => {
                    let draft = records.poi(kind, start)?;
                    sink.accept(draft)?;
                }
                _ => {
                    let length = records.u32(start)?;
                    let body = length.checked_sub(GENERIC_HEADER).ok_or_else(|| {
                        corrupt(start, format!("record length {length} is shorter than its header"))
                    })?;
                    records.skip(u64::from(body), start)?;
                }
            }
        }
        Ok(())
    }
}

struct Records<R> {
    reader: R,
    offset: u64,
}

impl<R: BufRead> Records<R> {
    /// Next type byte, or `None` at a clean end of stream.
    fn next_type(&mut self) -> Result<Option<u8>, ImportError> {
        let mut byte = [0_u8; 1];
        loop {
            return match self.reader.read(&mut byte) {
                Ok(0) => Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    Ok(Some(byte[0]))
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => Err(read_error(source)),
            };
        }
    }

    fn exact(&mut self, buf: &mut [u8], start: u64) -> Result<(), ImportError> {
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(corrupt(start, "record truncated by end of stream".to_owned()))
            }
            Err(source) => Err(read_error(source)),
        }
    }

    fn u32(&mut self, start: u64) -> Result<u32, ImportError> {
        let mut bytes = [0_u8; 4];
        self.exact(&mut bytes, start)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn i32(&mut self, start: u64) -> Result<i32, ImportError> {
        let mut bytes = [0_u8; 4];
        self.exact(&mut bytes, start)?;
        Ok(i32::from_le_bytes(bytes))
    }

    fn skip(&mut self, count: u64, start: u64) -> Result<(), ImportError> {
        let copied = io::copy(&mut (&mut self.reader).take(count), &mut io::sink()).map_err(read_error)?;
        self.offset += copied;
        if copied < count {
            return Err(corrupt(start, "record truncated by end of stream".to_owned()));
        }
        Ok(())
    }

    fn poi(&mut self, kind: u8, start: u64) -> Result<PlacemarkDraft, ImportError> {
        let length = self.u32(start)?;
        let longitude = degrees(self.i32(start)?);
        let latitude = degrees(self.i32(start)?);
        let body = length
            .checked_sub(POI_HEADER)
            .ok_or_else(|| corrupt(start, format!("record length {length} is shorter than its header")))?;
        // The buffer grows with the bytes actually present, never with `length`.
        let mut name = Vec::new();
        let read = (&mut self.reader)
            .take(u64::from(body))
            .read_until(0, &mut name)
            .map_err(read_error)?;
        self.offset += read as u64;
        // Extended records hold a second string; only the first is the name.
        self.skip(u64::from(body) - read as u64, start)?;
        if name.last() == Some(&0) {
            name.pop();
        }

        let coordinates = Coordinates::new(latitude, longitude)
            .map_err(|err| corrupt(start, err.to_string()))?;
        if kind == 3 {
            log::trace!("extended OV2 record at byte {start}");
        }
        Ok(PlacemarkDraft::new(decode(&name), "", coordinates))
    }
}

fn degrees(raw: i32) -> f32 {
    (f64::from(raw) / COORDINATE_SCALE) as f32
}

/// Names are usually Latin-1; valid UTF-8 is kept as is.
fn decode(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(|_| bytes.iter().copied().map(char::from).collect(), str::to_owned)
}

fn corrupt(offset: u64, reason: String) -> ImportError {
    ImportError::Ov2 { offset, reason }
}

fn read_error(source: io::Error) -> ImportError {
    ImportError::Read {
        format: ImportFormat::Ov2,
        source,
    }
}
