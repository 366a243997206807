//! Simulation files: a zip archive holding `simulation.json`. Plain JSON
//! files are read as well.

use log::debug;
use serde_json::Value;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_NAME: &str = "simulation.json";

const ZIP_MAGIC: &[u8] = b"PK";

#[derive(Debug, Fail)]
pub enum ArchiveError {
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] std::io::Error),
    #[fail(display = "invalid archive: {}", _0)]
    Zip(#[cause] zip::result::ZipError),
    #[fail(display = "invalid JSON: {}", _0)]
    Json(#[cause] serde_json::Error),
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::Zip(e)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Json(e)
    }
}

/// Reads the JSON document from the contents of a simulation file.
pub fn read_document(data: &[u8]) -> Result<Value, ArchiveError> {
    if !data.starts_with(ZIP_MAGIC) {
        debug!("Reading simulation as plain JSON");
        return Ok(serde_json::from_slice(data)?);
    }
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut entry = archive.by_name(DOCUMENT_NAME)?;
    let mut json = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut json)?;
    debug!("Read {} bytes of {} from archive", json.len(), DOCUMENT_NAME);
    Ok(serde_json::from_slice(&json)?)
}

/// Writes the document as a deflated zip archive.
pub fn write_document<W: Write + Seek>(out: W, doc: &Value) -> Result<W, ArchiveError> {
    let json = serde_json::to_vec(doc)?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(DOCUMENT_NAME, options)?;
    zip.write_all(&json)?;
    Ok(zip.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zip_and_plain_json() {
        let doc = json!({"__type__": "Simulation", "options": {"title": "Zipped"}});
        let data = write_document(Cursor::new(Vec::new()), &doc).unwrap().into_inner();
        assert!(data.starts_with(ZIP_MAGIC));
        assert_eq!(read_document(&data).unwrap(), doc);

        let plain = serde_json::to_vec(&doc).unwrap();
        assert_eq!(read_document(&plain).unwrap(), doc);
    }

    #[test]
    fn archive_without_document() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"nothing here").unwrap();
        let data = zip.finish().unwrap().into_inner();
        match read_document(&data) {
            Err(ArchiveError::Zip(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert!(read_document(b"{not json").is_err());
    }
}
