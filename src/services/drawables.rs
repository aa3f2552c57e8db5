use crate::models::{DrawableCountPolicy, GenderToken};
use camino::{Utf8Path, Utf8PathBuf};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of drawable model files
pub const DRAWABLE_EXTENSION: &str = "ydd";

/// Errors that can occur while searching for drawables
#[derive(Error, Debug)]
pub enum DrawableError {
    #[error("Descriptor {0} has no parent directory")]
    NoParentDirectory(Utf8PathBuf),

    #[error("Descriptor {0} has no file name")]
    NoFileName(Utf8PathBuf),

    #[error("Failed to build drawable pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Drawable files found for one descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawableMatches {
    pub gender: Option<GenderToken>,
    pub files: Vec<Utf8PathBuf>,
}

impl DrawableMatches {
    pub fn count(&self) -> usize {
        self.files.len()
    }
}

/// Build the drawable name pattern for a descriptor file stem.
///
/// Drawables are named `<gender>[_p]...<name>^...`, for example
/// `mp_m_freemode_01_p_tshirt^accs_000_u.ydd`. Matching is case-insensitive.
///
/// # Returns
/// The gender token used and the compiled pattern
pub fn drawable_pattern(descriptor_stem: &str) -> Result<(GenderToken, Regex), regex::Error> {
    let gender = GenderToken::from_descriptor_stem(descriptor_stem);
    let name_without_gender = descriptor_stem
        .replace(gender.as_str(), "")
        .trim_start_matches('_')
        .to_string();

    let pattern = format!(
        r"^{}(_p)?.*?{}\^",
        regex::escape(gender.as_str()),
        regex::escape(&name_without_gender)
    );

    let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
    Ok((gender, regex))
}

/// Find the drawable files that belong to a descriptor.
///
/// Walks every subdirectory of the descriptor's directory and collects `.ydd`
/// files whose names match [`drawable_pattern`]. Results are sorted by path.
///
/// # Errors
///
/// Any filesystem error during the walk fails the whole search for this
/// descriptor. Callers degrade that to a zero count.
pub fn find_drawables(descriptor: &Utf8Path) -> Result<DrawableMatches, DrawableError> {
    let directory = descriptor
        .parent()
        .ok_or_else(|| DrawableError::NoParentDirectory(descriptor.to_path_buf()))?;
    let stem = descriptor
        .file_stem()
        .ok_or_else(|| DrawableError::NoFileName(descriptor.to_path_buf()))?;

    let (gender, pattern) = drawable_pattern(stem)?;
    let search_root = if directory.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        directory
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(search_root).follow_links(false) {
        let entry = entry.map_err(|source| DrawableError::Walk {
            path: search_root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() || !has_drawable_extension(entry.path()) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if pattern.is_match(&file_name) {
            files.push(Utf8PathBuf::from(entry.path().to_string_lossy().into_owned()));
        }
    }

    files.sort();

    tracing::debug!(
        "Found {} drawable(s) for {} ({})",
        files.len(),
        descriptor,
        gender
    );

    Ok(DrawableMatches {
        gender: Some(gender),
        files,
    })
}

/// Count the drawables that belong to a descriptor.
///
/// # Errors
///
/// See [`find_drawables`].
pub fn count_drawables(descriptor: &Utf8Path) -> Result<usize, DrawableError> {
    find_drawables(descriptor).map(|matches| matches.count())
}

/// Total drawables across descriptors according to the configured policy.
pub fn total_drawables<'a, I>(matches: I, policy: DrawableCountPolicy) -> usize
where
    I: IntoIterator<Item = &'a DrawableMatches>,
{
    match policy {
        DrawableCountPolicy::PerDescriptor => matches.into_iter().map(DrawableMatches::count).sum(),
        DrawableCountPolicy::Distinct => matches
            .into_iter()
            .flat_map(|m| m.files.iter())
            .collect::<HashSet<_>>()
            .len(),
    }
}

fn has_drawable_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DRAWABLE_EXTENSION))
}
