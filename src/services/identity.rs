//! Project naming from descriptor file names.
//!
//! Descriptor files follow loose conventions such as
//! `mp_m_freemode_01_tshirt.meta` or `mp_f_jacket.meta`. This module strips
//! the ped prefix to get a short name per descriptor and merges several short
//! names into one suggested project name.

use crate::models::AddonIdentity;
use camino::Utf8Path;
use indexmap::IndexMap;

/// Prefixes stripped from descriptor names, checked in order.
const NAME_PREFIXES: [&str; 4] = ["mp_m_freemode_01_", "mp_f_freemode_01_", "mp_m_", "mp_f_"];

/// Shortest common prefix accepted as a merged project name.
const MIN_COMMON_PREFIX_LEN: usize = 3;

/// Strip the first matching ped prefix (case-insensitive) from a file stem.
pub fn extract_short_name(file_stem: &str) -> String {
    for prefix in NAME_PREFIXES {
        if let Some(head) = file_stem.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return file_stem[prefix.len()..].to_string();
            }
        }
    }
    file_stem.to_string()
}

/// Derive the identity of a descriptor from its path.
pub fn identity_for(descriptor: &Utf8Path) -> AddonIdentity {
    let stem = descriptor.file_stem().unwrap_or_default();
    let file_name = descriptor.file_name().unwrap_or_default();
    AddonIdentity::new(extract_short_name(stem), file_name)
}

/// Insertion-ordered set of short names, compared case-insensitively.
///
/// The first spelling inserted for a name is the one kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortNames {
    names: IndexMap<String, String>,
}

impl ShortNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name, returning false if an equal name was already present
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let key = name.to_lowercase();
        if self.names.contains_key(&key) {
            return false;
        }
        self.names.insert(key, name);
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.names.values().next().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ShortNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names = Self::new();
        for name in iter {
            names.insert(name);
        }
        names
    }
}

/// Merge short names into one project name.
///
/// - no names: empty string
/// - one distinct name: that name
/// - several: their common prefix without trailing underscores, when the raw
///   prefix has at least three characters; otherwise the first name
pub fn suggest_project_name(names: &ShortNames) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };

    if names.len() == 1 {
        return first.to_string();
    }

    let all: Vec<&str> = names.iter().collect();
    let prefix = longest_common_prefix(&all);
    let trimmed = prefix.trim_end_matches('_');

    if prefix.chars().count() >= MIN_COMMON_PREFIX_LEN && !trimmed.is_empty() {
        trimmed.to_string()
    } else {
        first.to_string()
    }
}

/// Longest prefix shared by all strings, compared case-insensitively.
///
/// Casing comes from the first string.
pub fn longest_common_prefix(strings: &[&str]) -> String {
    let Some((first, rest)) = strings.split_first() else {
        return String::new();
    };

    let mut prefix: &str = first;
    for candidate in rest {
        while !starts_with_ignore_case(candidate, prefix) {
            let mut chars = prefix.chars();
            chars.next_back();
            prefix = chars.as_str();
            if prefix.is_empty() {
                return String::new();
            }
        }
    }

    prefix.to_string()
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    let mut chars = value.chars();
    prefix.chars().all(|p| {
        chars
            .next()
            .is_some_and(|c| c.to_lowercase().eq(p.to_lowercase()))
    })
}
