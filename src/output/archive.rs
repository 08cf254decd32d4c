// src/output/archive.rs
// Re-packs a copied folder as `<name>.tar.gz` next to it.

use crate::error::{GrabError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `src_dir` into a gzip-compressed tarball at `archive_path`.
///
/// Entries are stored under the folder's own name, so unpacking the archive
/// recreates the folder rather than spilling its contents.
pub fn write_targz(src_dir: &Path, archive_path: &Path) -> Result<()> {
    let io_err = |e: std::io::Error| GrabError::io(archive_path, e);

    let folder_name = src_dir
        .file_name()
        .ok_or_else(|| GrabError::io(src_dir, std::io::Error::other("folder has no name")))?;

    let file = File::create(archive_path).map_err(io_err)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    builder.append_dir_all(folder_name, src_dir).map_err(io_err)?;

    let encoder = builder.into_inner().map_err(io_err)?;
    let mut writer = encoder.finish().map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    Ok(())
}
