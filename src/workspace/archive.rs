//! Zip import/export of a workspace
//!
//! Upload unpacks a project archive into a fresh session root; download
//! packs the root back up, leaving out dot-paths and service directories.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::is_hidden;

/// Name of an upload left in place by older clients; never re-exported
const UPLOAD_ARCHIVE_NAME: &str = "project.zip";

/// Total decompressed bytes one upload may expand to
pub const MAX_EXTRACTED_BYTES: u64 = 1024 * 1024 * 1024;

/// Unpack `bytes` into `dest`, returning the number of files written
///
/// Entries whose names would land outside `dest` are skipped. Fails once
/// the unpacked content passes [`MAX_EXTRACTED_BYTES`].
pub fn extract(bytes: &[u8], dest: &Path) -> io::Result<usize> {
    extract_limited(bytes, dest, MAX_EXTRACTED_BYTES)
}

fn extract_limited(bytes: &[u8], dest: &Path, limit: u64) -> io::Result<usize> {
    let mut remaining = limit;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!(name = entry.name(), "Skipping archive entry outside destination");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        // Declared sizes are not trusted; the copy itself is bounded
        let mut file = fs::File::create(&target)?;
        let copied = io::copy(&mut (&mut entry).take(remaining + 1), &mut file)?;
        if copied > remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive expands past {} bytes", limit),
            ));
        }
        remaining -= copied;
        written += 1;
    }

    Ok(written)
}

/// Pack every visible file under `root` into a deflated zip
pub fn pack(root: &Path) -> io::Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if name == UPLOAD_ARCHIVE_NAME {
            continue;
        }

        writer.start_file(name, options).map_err(zip_error)?;
        writer.write_all(&fs::read(entry.path())?)?;
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
