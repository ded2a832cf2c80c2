//! Integrity checks for downloaded archives.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    /// The archive is intact and contains this many entries.
    Valid { entries: usize },
    /// The archive was corrupt and has been removed from disk.
    Corrupt(String),
}

/// Read every entry in the archive so each one's CRC gets checked.
///
/// A container that can't be parsed and an entry with a bad checksum are
/// both treated as corruption, and the file is deleted so the next run
/// downloads it again.
pub fn validate(path: &Path) -> Validity {
    match scan(path) {
        Ok(entries) => {
            debug!("{} is a valid archive with {} entries", path.display(), entries);
            Validity::Valid { entries }
        }
        Err(reason) => {
            warn!("{} is corrupt, {}", path.display(), reason);

            if let Err(e) = fs::remove_file(path) {
                warn!("Unable to remove {}, {}", path.display(), e);
            }

            Validity::Corrupt(reason)
        }
    }
}

fn scan(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("Invalid zip file, {}", e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
        trace!("Checking {}", entry.name());

        io::copy(&mut entry, &mut io::sink())
            .map_err(|e| format!("{} failed its integrity check, {}", entry.name(), e))?;
    }

    Ok(archive.len())
}
