use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker that every genuine addon descriptor carries in its header.
pub const DESCRIPTOR_MARKER: &str = "ShopPedApparel";

/// Freemode ped model an addon is built for.
///
/// Descriptor and drawable file names encode the model as a token such as
/// `mp_m_freemode_01`. Only the two freemode models are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderToken {
    Male,
    Female,
}

impl GenderToken {
    /// The token as it appears in file names
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "mp_m_freemode_01",
            Self::Female => "mp_f_freemode_01",
        }
    }

    /// Pick the token for a descriptor file stem.
    ///
    /// Anything that does not contain the male token is treated as female.
    /// Callers that must reject unknown names use [`GenderToken::recognize`].
    pub fn from_descriptor_stem(stem: &str) -> Self {
        if stem.contains(Self::Male.as_str()) {
            Self::Male
        } else {
            Self::Female
        }
    }

    /// Recognize a token in a file name, returning `None` when neither
    /// freemode model is referenced.
    pub fn recognize(name: &str) -> Option<Self> {
        if name.contains("mp_m_freemode") {
            Some(Self::Male)
        } else if name.contains("mp_f_freemode") {
            Some(Self::Female)
        } else {
            None
        }
    }
}

impl fmt::Display for GenderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selected file together with the first two lines of its content.
///
/// Lives only for the duration of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: Utf8PathBuf,
    pub first_line: Option<String>,
    pub second_line: Option<String>,
}

impl CandidateFile {
    pub fn new(
        path: impl Into<Utf8PathBuf>,
        first_line: Option<String>,
        second_line: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            first_line,
            second_line,
        }
    }

    /// Check whether the header carries the descriptor marker on line 1 or 2
    pub fn has_marker(&self) -> bool {
        [&self.first_line, &self.second_line]
            .into_iter()
            .flatten()
            .any(|line| line.contains(DESCRIPTOR_MARKER))
    }
}

/// Canonical short name derived from one descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonIdentity {
    short_name: String,
    source_file_name: String,
}

impl AddonIdentity {
    pub fn new(short_name: impl Into<String>, source_file_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            source_file_name: source_file_name.into(),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn source_file_name(&self) -> &str {
        &self.source_file_name
    }
}

/// Aggregated naming and counting result presented for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectIdentitySuggestion {
    pub suggested_name: String,
    pub drawable_count: usize,
    pub descriptor_count: usize,
}

/// The user's answer to a project setup request.
///
/// `confirmed` stays false until the presentation layer reports an explicit
/// confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSetupDecision {
    pub project_name: String,
    pub is_self_contained: bool,
    pub confirmed: bool,
}

impl ProjectSetupDecision {
    /// A decision that was dismissed without confirming
    pub fn cancelled() -> Self {
        Self {
            project_name: String::new(),
            is_self_contained: false,
            confirmed: false,
        }
    }

    pub fn confirmed(project_name: impl Into<String>, is_self_contained: bool) -> Self {
        Self {
            project_name: project_name.into(),
            is_self_contained,
            confirmed: true,
        }
    }
}

/// An addon that has been loaded into the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAddon {
    pub name: String,
    pub descriptor_path: Utf8PathBuf,
    pub gender: GenderToken,
    pub drawables: Vec<Utf8PathBuf>,
    /// Name the loader proposes for the project, set when requested
    pub suggested_project_name: Option<String>,
}
