use crate::error::{ArchiveReadError, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

/// Unpack a zip archive into `dest`, returning the number of files written.
///
/// Entries whose names would land outside `dest` are skipped.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let zip_err = |source| ArchiveReadError::Zip {
        path: zip_path.display().to_string(),
        source,
    };

    let file = File::open(zip_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ArchiveReadError::MissingRoot(zip_path.display().to_string())
        } else {
            ArchiveReadError::Io(e)
        }
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

    fs::create_dir_all(dest)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    log::info!(
        "Extracted {written} files from {} into {}",
        zip_path.display(),
        dest.display()
    );
    Ok(written)
}
