use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::CpeError;

/// Whether the payload starts with the ZIP local-file magic.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK")
}

/// One deflate-compressed entry.
pub(crate) fn write_single(entry_name: &str, content: &[u8]) -> Result<Vec<u8>, CpeError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(entry_name, options)
        .map_err(|e| CpeError::packaging("zip", format!("cannot start entry: {e}")))?;
    writer
        .write_all(content)
        .map_err(|e| CpeError::packaging("zip", format!("cannot write entry: {e}")))?;
    let cursor = writer
        .finish()
        .map_err(|e| CpeError::packaging("zip", format!("cannot finish archive: {e}")))?;
    Ok(cursor.into_inner())
}

/// File entries (directories skipped) with their uncompressed sizes.
pub(crate) fn entries(zip: &[u8]) -> Result<Vec<(String, u64)>, CpeError> {
    let mut archive = open(zip)?;
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| CpeError::packaging("entry", e.to_string()))?;
        if !file.is_dir() {
            out.push((file.name().to_string(), file.size()));
        }
    }
    Ok(out)
}

/// Extract the XML entry of a single-document archive.
///
/// Directory entries are skipped (CDR archives often carry an empty
/// `dummy/` folder). Returns the entry name and its bytes.
pub fn unpack(zip: &[u8]) -> Result<(String, Vec<u8>), CpeError> {
    let mut archive = open(zip)?;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| CpeError::packaging("entry", e.to_string()))?;
        if file.is_dir() || !file.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        let name = file.name().to_string();
        let mut content = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut content)
            .map_err(|e| CpeError::packaging("entry", format!("{name}: {e}")))?;
        return Ok((name, content));
    }
    Err(CpeError::packaging("entry", "archive has no .xml entry"))
}

fn open(zip: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, CpeError> {
    ZipArchive::new(Cursor::new(zip)).map_err(|e| CpeError::packaging("zip", format!("unreadable archive: {e}")))
}
