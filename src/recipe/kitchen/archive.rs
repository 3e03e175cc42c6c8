// src/recipe/kitchen/archive.rs

//! Source tree preparation: archive extraction and local tree copies

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Compression wrapping a tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    /// Detect the format from a file name, falling back to magic bytes
    pub fn detect(path: &Path) -> Result<Self> {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            return Ok(Self::TarGz);
        } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
            return Ok(Self::TarXz);
        } else if filename.ends_with(".tar.zst") {
            return Ok(Self::TarZst);
        } else if filename.ends_with(".tar") {
            return Ok(Self::Tar);
        }

        let mut magic = [0u8; 6];
        let read = File::open(path)?.read(&mut magic)?;
        let magic = &magic[..read];

        if magic.starts_with(&[0x1F, 0x8B]) {
            Ok(Self::TarGz)
        } else if magic.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
            Ok(Self::TarXz)
        } else if magic.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            Ok(Self::TarZst)
        } else {
            Err(Error::IoError(format!(
                "Unknown archive format: {}",
                filename
            )))
        }
    }
}

/// Extract an archive into `dest`
///
/// Supports: .tar.gz, .tgz, .tar.xz, .txz, .tar.zst, .tar
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let format = ArchiveFormat::detect(archive)?;
    debug!("Extracting {} ({:?})", archive.display(), format);

    let file = BufReader::new(File::open(archive)?);
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(file)),
        ArchiveFormat::TarZst => Box::new(
            zstd::stream::read::Decoder::new(file)
                .map_err(|e| Error::IoError(format!("Failed to open zstd stream: {}", e)))?,
        ),
        ArchiveFormat::Tar => Box::new(file),
    };

    fs::create_dir_all(dest)?;
    tar::Archive::new(reader).unpack(dest).map_err(|e| {
        Error::IoError(format!(
            "Failed to extract archive {}: {}",
            archive.display(),
            e
        ))
    })
}

/// Copy a local source tree into `dest`, preserving permissions and symlinks
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(Error::IoError(format!(
            "Source directory not found: {}",
            src.display()
        )));
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk source tree: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            fs::copy(entry.path(), &target).map(|_| ())?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Descend into the single top-level directory most archives wrap their tree in
pub fn source_root(extracted: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(extracted)?.filter_map(|e| e.ok()).collect();

    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        let root = entries[0].path();
        debug!("Source directory: {}", root.display());
        return Ok(root);
    }

    Ok(extracted.to_path_buf())
}
