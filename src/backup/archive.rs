//! tar.gz artifacts
//!
//! An archive holds exactly one top-level member named after the source, so
//! unpacking it into the source's parent directory recreates the source.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

use crate::error::{SweepError, SweepResult};

/// Archive `source` (file or directory) into a new tar.gz at `dest`
pub fn create_archive(source: &Path, dest: &Path) -> SweepResult<()> {
    let name = source
        .file_name()
        .ok_or_else(|| SweepError::invalid_source(source, "path has no final component"))?;

    let file = File::create(dest)
        .map_err(|e| SweepError::Io(format!("Failed to create archive {}: {}", dest.display(), e)))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let appended = if source.is_dir() {
        builder.append_dir_all(name, source)
    } else {
        builder.append_path_with_name(source, name)
    };
    appended.map_err(|e| {
        SweepError::Io(format!("Failed to archive {}: {}", source.display(), e))
    })?;

    let mut writer = builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| SweepError::Io(format!("Failed to finish archive: {}", e)))?;
    writer.flush()?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| SweepError::Io(format!("Failed to sync archive: {}", e)))?;

    Ok(())
}

/// Unpack a tar.gz into `dest_dir`, returning the number of members written
///
/// Members whose path would escape `dest_dir` are skipped.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> SweepResult<usize> {
    fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_path).map_err(|e| {
        SweepError::Io(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut unpacked = 0;
    let entries = archive
        .entries()
        .map_err(|e| SweepError::Io(format!("Failed to read archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| SweepError::Io(format!("Failed to read archive entry: {}", e)))?;
        let entry_path = entry.path().map(|p| p.to_path_buf()).unwrap_or_default();

        let written = entry.unpack_in(dest_dir).map_err(|e| {
            SweepError::Io(format!(
                "Failed to unpack {}: {}",
                entry_path.display(),
                e
            ))
        })?;

        if written {
            unpacked += 1;
        } else {
            warn!(path = %entry_path.display(), "Skipped archive member outside destination");
        }
    }

    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_archive_recreates_tree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("cache");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("a.txt"), b"alpha").unwrap();
        fs::write(source.join("nested").join("b.txt"), b"beta").unwrap();

        let archive = temp.path().join("cache.tar.gz");
        create_archive(&source, &archive).unwrap();
        assert!(fs::metadata(&archive).unwrap().len() > 0);

        let restore_parent = temp.path().join("restore");
        let count = extract_archive(&archive, &restore_parent).unwrap();
        assert!(count >= 3);
        assert_eq!(
            fs::read(restore_parent.join("cache").join("nested").join("b.txt")).unwrap(),
            b"beta"
        );
    }

    #[test]
    fn test_empty_file_archive_is_non_empty() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty.log");
        fs::write(&source, b"").unwrap();

        let archive = temp.path().join("empty.tar.gz");
        create_archive(&source, &archive).unwrap();
        assert!(fs::metadata(&archive).unwrap().len() > 0);

        let out = temp.path().join("out");
        extract_archive(&archive, &out).unwrap();
        assert!(out.join("empty.log").is_file());
        assert_eq!(fs::metadata(out.join("empty.log")).unwrap().len(), 0);
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp = TempDir::new().unwrap();
        let result = extract_archive(&temp.path().join("missing.tar.gz"), temp.path());
        assert!(matches!(result, Err(SweepError::Io(_))));
    }
}
