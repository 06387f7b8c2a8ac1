use crate::error::CommonError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    TarGz,
    Tar,
    Unknown,
}

pub fn detect_archive_type(name: &str) -> ArchiveType {
    let lower = name.to_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        ArchiveType::TarGz
    } else if lower.ends_with(".tar") {
        ArchiveType::Tar
    } else {
        ArchiveType::Unknown
    }
}

/// Pack the contents of `source_dir` into a gzip-compressed tarball.
///
/// Top-level entries whose name is listed in `exclude`, or that start with a
/// dot, are skipped. Symlinks are stored as links, not followed.
pub fn pack_tar_gz(source_dir: &Path, dest: &Path, exclude: &[&str]) -> Result<(), CommonError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut entries: Vec<PathBuf> = fs::read_dir(source_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || exclude.contains(&name) {
            continue;
        }
        let meta = fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            builder
                .append_dir_all(name, &path)
                .map_err(|err| CommonError::Archive(err.to_string()))?;
        } else {
            builder
                .append_path_with_name(&path, name)
                .map_err(|err| CommonError::Archive(err.to_string()))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|err| CommonError::Archive(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| CommonError::Archive(err.to_string()))?;
    Ok(())
}

/// Unpack a gzip-compressed tarball into `target_dir`, returning the files written.
pub fn unpack_tar_gz(archive: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, CommonError> {
    fs::create_dir_all(target_dir)?;
    let file = fs::File::open(archive)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = Archive::new(decoder);
    extract_tar_entries(&mut archive, target_dir, 0)
}

fn extract_tar_entries<R: std::io::Read>(
    archive: &mut Archive<R>,
    target_dir: &Path,
    strip_components: u32,
) -> Result<Vec<PathBuf>, CommonError> {
    let mut extracted = Vec::new();
    let strip = strip_components as usize;

    for entry in archive
        .entries()
        .map_err(|err| CommonError::Archive(err.to_string()))?
    {
        let mut entry = entry.map_err(|err| CommonError::Archive(err.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|err| CommonError::Archive(err.to_string()))?
            .to_path_buf();
        let Some(stripped) = strip_path(&entry_path, strip) else {
            continue;
        };
        if stripped
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CommonError::Archive(format!(
                "entry escapes target directory: {}",
                entry_path.display()
            )));
        }
        let out_path = target_dir.join(stripped);

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&out_path)
            .map_err(|err| CommonError::Archive(err.to_string()))?;

        if entry.header().entry_type().is_file() {
            extracted.push(out_path);
        }
    }

    Ok(extracted)
}

fn strip_path(path: &Path, strip_components: usize) -> Option<PathBuf> {
    if strip_components == 0 {
        return Some(path.to_path_buf());
    }

    let stripped: PathBuf = path.components().skip(strip_components).collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}
