//! Portable project files.
//!
//! A portable project file is a zip archive of the built project tree with
//! every byte XOR-ed against a fixed repeating key. The transform only keeps
//! casual viewers from opening the archive directly; it is not encryption.
//!
//! Export packs the tree into a scratch archive, transforms it into a sibling
//! `.part` file and renames that over the destination. Import reverses the
//! transform into a scratch archive and unpacks it into a hidden sibling of
//! the destination, which is renamed into place only after every entry has
//! been read back intact.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extension used for exported project files
pub const PROJECT_FILE_EXTENSION: &str = "gctproject";

/// Fixed key for the byte transform
const OBFUSCATION_KEY: &[u8] = b"clothkit:portable-project";

/// Chunk size for streaming the transform
const CHUNK_SIZE: usize = 64 * 1024;

/// Fastest deflate level; project files favour throughput over ratio
const COMPRESSION_LEVEL: i64 = 1;

/// Errors that can occur while exporting or importing a project file
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Source {0} not found")]
    SourceNotFound(Utf8PathBuf),

    #[error("Destination {0} is not empty")]
    DestinationNotEmpty(Utf8PathBuf),

    #[error("Project file {path} is corrupt or not a project file: {reason}")]
    Corrupt { path: Utf8PathBuf, reason: String },

    #[error("Archive entry {0} escapes the destination")]
    UnsafeEntry(String),

    #[error("Path {0} is not valid UTF-8")]
    NonUtf8Path(String),

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// Whether the error means the input file was not a valid project file
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::UnsafeEntry(_))
    }
}

/// Default file name for exporting a project.
///
/// A blank project name exports as `project`.
pub fn export_file_name(project_name: &str) -> String {
    let name = project_name.trim();
    let name = if name.is_empty() { "project" } else { name };
    format!("{name}.{PROJECT_FILE_EXTENSION}")
}

/// What an export or import moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveStats {
    pub files: usize,
    pub bytes: u64,
}

/// XOR a buffer with the project key.
///
/// `offset` is the position of `buf[0]` in the whole stream so chunks can be
/// transformed independently. Applying the transform twice restores the input.
pub fn xor_in_place(buf: &mut [u8], offset: u64) {
    let key_len = OBFUSCATION_KEY.len();
    let start = (offset % key_len as u64) as usize;
    for (index, byte) in buf.iter_mut().enumerate() {
        *byte ^= OBFUSCATION_KEY[(start + index) % key_len];
    }
}

/// Transform a whole byte sequence.
pub fn transform(bytes: &[u8]) -> Vec<u8> {
    let mut output = bytes.to_vec();
    xor_in_place(&mut output, 0);
    output
}

/// Stream a file through the transform into another file.
///
/// # Returns
/// The number of bytes written
pub fn transform_file(source: &Utf8Path, destination: &Utf8Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut writer = BufWriter::new(File::create(destination)?);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        xor_in_place(&mut buffer[..read], offset);
        writer.write_all(&buffer[..read])?;
        offset += read as u64;
    }

    writer.flush()?;
    Ok(offset)
}

/// Pack a directory tree into a zip archive.
///
/// Entries are written in file-name order with `/` separators. Empty
/// directories are kept. Files whose path relative to `source` appears in
/// `excluded` are left out.
pub fn pack_directory(
    source: &Utf8Path,
    archive_path: &Utf8Path,
    excluded: &[PathBuf],
) -> Result<ArchiveStats, ArchiveError> {
    let file = File::create(archive_path)
        .map_err(ArchiveError::io(format!("create archive {archive_path}")))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut stats = ArchiveStats::default();

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Io {
            context: format!("walk {source}"),
            source: e.into(),
        })?;

        let relative = entry
            .path()
            .strip_prefix(source.as_std_path())
            .map_err(|_| ArchiveError::NonUtf8Path(entry.path().display().to_string()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        if entry.file_type().is_file() && excluded.iter().any(|skip| skip == relative) {
            tracing::debug!("Leaving {} out of the archive", entry.path().display());
            continue;
        }

        let name = archive_entry_name(relative)?;

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name.as_str(), options)?;
            let mut input = File::open(entry.path())
                .map_err(ArchiveError::io(format!("open {name}")))?;
            let bytes = io::copy(&mut input, &mut writer)
                .map_err(ArchiveError::io(format!("compress {name}")))?;
            stats.files += 1;
            stats.bytes += bytes;
        } else {
            tracing::debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }

    let mut inner = writer.finish()?;
    inner
        .flush()
        .map_err(ArchiveError::io(format!("flush archive {archive_path}")))?;

    Ok(stats)
}

/// Unpack a zip archive into a directory.
///
/// Every entry is read fully before it is written, so checksum failures are
/// reported as corruption.
pub fn unpack_archive(archive_path: &Utf8Path, destination: &Utf8Path) -> Result<ArchiveStats, ArchiveError> {
    let corrupt = |reason: String| ArchiveError::Corrupt {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path)
        .map_err(ArchiveError::io(format!("open archive {archive_path}")))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    fs::create_dir_all(destination)
        .map_err(ArchiveError::io(format!("create {destination}")))?;

    let mut stats = ArchiveStats::default();
    let mut contents = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| corrupt(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafeEntry(entry.name().to_string()));
        };
        let out_path = destination.as_std_path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(ArchiveError::io(format!("create {}", out_path.display())))?;
            continue;
        }

        contents.clear();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| corrupt(format!("{}: {}", entry.name(), e)))?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(ArchiveError::io(format!("create {}", parent.display())))?;
        }
        fs::write(&out_path, &contents)
            .map_err(ArchiveError::io(format!("write {}", out_path.display())))?;

        stats.files += 1;
        stats.bytes += contents.len() as u64;
    }

    Ok(stats)
}

/// Converts project trees to portable project files and back.
///
/// Intermediate archives are written to `scratch_dir`.
#[derive(Debug, Clone)]
pub struct ProjectArchiver {
    scratch_dir: Utf8PathBuf,
}

impl ProjectArchiver {
    pub fn new(scratch_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Export a project directory as a portable project file.
    ///
    /// On failure nothing is left at `destination` (an existing file there is
    /// only replaced once the new one is complete) and the scratch archive is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or any packing step fails.
    pub fn export(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<ArchiveStats, ArchiveError> {
        if !source.is_dir() {
            return Err(ArchiveError::SourceNotFound(source.to_path_buf()));
        }

        let temp_archive = self.prepare_scratch_archive(destination)?;
        let partial = partial_file_path(destination);

        let result = Self::export_steps(source, destination, &temp_archive, &partial);

        remove_file_quietly(&temp_archive);
        if result.is_err() {
            remove_file_quietly(&partial);
        }

        let stats = result?;
        tracing::info!(
            "Exported {} ({} files, {} bytes) to {}",
            source,
            stats.files,
            stats.bytes,
            destination
        );
        Ok(stats)
    }

    fn export_steps(
        source: &Utf8Path,
        destination: &Utf8Path,
        temp_archive: &Utf8Path,
        partial: &Utf8Path,
    ) -> Result<ArchiveStats, ArchiveError> {
        // A destination inside the source tree must not pack earlier exports.
        let excluded: Vec<PathBuf> = [destination, partial, temp_archive]
            .into_iter()
            .filter_map(|path| path_inside(source, path))
            .collect();

        let stats = pack_directory(source, temp_archive, &excluded)?;
        transform_file(temp_archive, partial)
            .map_err(ArchiveError::io(format!("write {partial}")))?;
        fs::rename(partial, destination)
            .map_err(ArchiveError::io(format!("move {partial} to {destination}")))?;
        Ok(stats)
    }

    /// Import a portable project file into a directory.
    ///
    /// `destination` must be missing or empty. If the file is not a valid
    /// project file the destination is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Corrupt`] for files that do not decode to a
    /// valid archive, and I/O errors for filesystem failures.
    pub fn import(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<ArchiveStats, ArchiveError> {
        if !source.is_file() {
            return Err(ArchiveError::SourceNotFound(source.to_path_buf()));
        }
        if !is_missing_or_empty_dir(destination)? {
            return Err(ArchiveError::DestinationNotEmpty(destination.to_path_buf()));
        }

        let temp_archive = self.prepare_scratch_archive(source)?;
        let staging = staging_dir_for(destination);
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .map_err(ArchiveError::io(format!("clear stale {staging}")))?;
        }

        let result = Self::import_steps(source, destination, &temp_archive, &staging);

        remove_file_quietly(&temp_archive);
        if result.is_err() && staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                tracing::warn!("Failed to remove partial import {}: {}", staging, e);
            }
        }

        let stats = result?;
        tracing::info!(
            "Imported {} ({} files, {} bytes) into {}",
            source,
            stats.files,
            stats.bytes,
            destination
        );
        Ok(stats)
    }

    fn import_steps(
        source: &Utf8Path,
        destination: &Utf8Path,
        temp_archive: &Utf8Path,
        staging: &Utf8Path,
    ) -> Result<ArchiveStats, ArchiveError> {
        transform_file(source, temp_archive)
            .map_err(ArchiveError::io(format!("decode {source}")))?;
        let stats = unpack_archive(temp_archive, staging)?;

        if destination.exists() {
            fs::remove_dir(destination)
                .map_err(ArchiveError::io(format!("replace {destination}")))?;
        }
        fs::rename(staging, destination)
            .map_err(ArchiveError::io(format!("move {staging} to {destination}")))?;

        Ok(stats)
    }

    fn prepare_scratch_archive(&self, named_after: &Utf8Path) -> Result<Utf8PathBuf, ArchiveError> {
        fs::create_dir_all(&self.scratch_dir)
            .map_err(ArchiveError::io(format!("create {}", self.scratch_dir)))?;

        let stem = named_after.file_stem().unwrap_or("project");
        let temp_archive = self.scratch_dir.join(format!("{stem}.zip"));
        if temp_archive.exists() {
            fs::remove_file(&temp_archive)
                .map_err(ArchiveError::io(format!("clear stale {temp_archive}")))?;
        }
        Ok(temp_archive)
    }
}

fn archive_entry_name(relative: &Path) -> Result<String, ArchiveError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| ArchiveError::NonUtf8Path(relative.display().to_string()))?;
                parts.push(part);
            }
            _ => return Err(ArchiveError::UnsafeEntry(relative.display().to_string())),
        }
    }
    Ok(parts.join("/"))
}

/// Path of `path` relative to `root` when it lies inside it.
///
/// `path` itself may not exist yet, so only its parent is canonicalized.
fn path_inside(root: &Utf8Path, path: &Utf8Path) -> Option<PathBuf> {
    let root = fs::canonicalize(root).ok()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let full = fs::canonicalize(parent).ok()?.join(path.file_name()?);
    full.strip_prefix(&root).ok().map(Path::to_path_buf)
}

fn partial_file_path(destination: &Utf8Path) -> Utf8PathBuf {
    let file_name = destination.file_name().unwrap_or("project");
    destination.with_file_name(format!("{file_name}.part"))
}

fn staging_dir_for(destination: &Utf8Path) -> Utf8PathBuf {
    let name = destination.file_name().unwrap_or("import");
    let parent = match destination.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    parent.join(format!(".{name}.partial"))
}

fn is_missing_or_empty_dir(path: &Utf8Path) -> Result<bool, ArchiveError> {
    if !path.exists() {
        return Ok(true);
    }
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path).map_err(ArchiveError::io(format!("read {path}")))?;
    Ok(entries.next().is_none())
}

fn remove_file_quietly(path: &Utf8Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove {}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_transform_is_self_inverse() {
        let input = b"PK\x03\x04 some archive bytes".to_vec();
        let once = transform(&input);
        assert_ne!(once, input);
        assert_eq!(transform(&once), input);
    }

    #[test]
    fn test_transform_empty() {
        assert!(transform(&[]).is_empty());
    }

    #[test]
    fn test_chunked_transform_matches_whole() {
        let input: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let whole = transform(&input);

        let mut chunked = input.clone();
        let (head, tail) = chunked.split_at_mut(333);
        xor_in_place(head, 0);
        xor_in_place(tail, 333);

        assert_eq!(chunked, whole);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("tshirt"), "tshirt.gctproject");
        assert_eq!(export_file_name("   "), "project.gctproject");
        assert_eq!(export_file_name(""), "project.gctproject");
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let relative = Path::new("stream").join("mp_m_freemode_01_tshirt^jbib_000_u.ydd");
        assert_eq!(
            archive_entry_name(&relative).unwrap(),
            "stream/mp_m_freemode_01_tshirt^jbib_000_u.ydd"
        );
    }

    #[test]
    fn test_partial_and_staging_paths() {
        assert_eq!(
            partial_file_path(Utf8Path::new("/out/tshirt.gctproject")),
            Utf8PathBuf::from("/out/tshirt.gctproject.part")
        );
        assert_eq!(
            staging_dir_for(Utf8Path::new("/work/build")),
            Utf8PathBuf::from("/work/.build.partial")
        );
    }

    #[test]
    fn test_export_missing_source() {
        let scratch = TempDir::new().unwrap();
        let archiver = ProjectArchiver::new(utf8_dir(&scratch));

        let result = archiver.export(
            Utf8Path::new("/no/such/project"),
            &utf8_dir(&scratch).join("out.gctproject"),
        );
        assert!(matches!(result, Err(ArchiveError::SourceNotFound(_))));
    }

    #[test]
    fn test_import_into_non_empty_destination() {
        let root = TempDir::new().unwrap();
        let root = utf8_dir(&root);
        let source = root.join("project.gctproject");
        fs::write(&source, b"whatever").unwrap();
        let destination = root.join("dest");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("keep.txt"), b"keep").unwrap();

        let archiver = ProjectArchiver::new(root.join("scratch"));
        let result = archiver.import(&source, &destination);

        assert!(matches!(result, Err(ArchiveError::DestinationNotEmpty(_))));
        assert!(destination.join("keep.txt").exists());
    }
}
