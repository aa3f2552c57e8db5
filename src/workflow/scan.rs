use crate::metrics::Metrics;
use crate::models::{AddonIdentity, DrawableCountPolicy, GenderToken, ProjectIdentitySuggestion};
use crate::services::drawables::{self, DrawableError, DrawableMatches};
use crate::services::{ShortNames, descriptor, identity, suggest_project_name};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;

type DrawableSearch = fn(&Utf8Path) -> Result<DrawableMatches, DrawableError>;

/// A candidate that passed validation, with its identity and drawables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDescriptor {
    pub path: Utf8PathBuf,
    pub identity: AddonIdentity,
    pub drawables: DrawableMatches,
}

/// Result of validating and counting a selection of candidates
#[derive(Debug, Clone, Default)]
pub struct DescriptorScan {
    /// Valid descriptors in selection order
    pub descriptors: Vec<ScannedDescriptor>,
    /// Candidates rejected as invalid or unreadable
    pub skipped: usize,
}

impl DescriptorScan {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.descriptors.iter().map(|d| d.path.as_path())
    }

    /// Aggregate the scan into a project identity suggestion.
    pub fn suggestion(&self, policy: DrawableCountPolicy) -> ProjectIdentitySuggestion {
        let names: ShortNames = self
            .descriptors
            .iter()
            .map(|d| d.identity.short_name().to_string())
            .collect();

        ProjectIdentitySuggestion {
            suggested_name: suggest_project_name(&names),
            drawable_count: drawables::total_drawables(
                self.descriptors.iter().map(|d| &d.drawables),
                policy,
            ),
            descriptor_count: self.descriptors.len(),
        }
    }
}

/// Validate candidates and count their drawables.
///
/// Every candidate is scanned on its own task; results are collected in
/// selection order once all tasks finish. A failed drawable search counts as
/// zero for that descriptor only.
pub async fn scan_candidates(candidates: &[Utf8PathBuf], metrics: &Arc<Metrics>) -> DescriptorScan {
    scan_candidates_with(candidates, metrics, drawables::find_drawables).await
}

async fn scan_candidates_with(
    candidates: &[Utf8PathBuf],
    metrics: &Arc<Metrics>,
    search: DrawableSearch,
) -> DescriptorScan {
    let mut tasks = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let path = candidate.clone();
        let metrics = Arc::clone(metrics);

        tasks.push(tokio::spawn(async move { scan_one(path, &metrics, search).await }));
    }

    let mut scan = DescriptorScan::default();
    for (task, candidate) in tasks.into_iter().zip(candidates) {
        match task.await {
            Ok(Some(scanned)) => scan.descriptors.push(scanned),
            Ok(None) => scan.skipped += 1,
            Err(e) => {
                tracing::error!("Scan task for {} failed: {}", candidate, e);
                metrics.record_descriptor_skipped();
                scan.skipped += 1;
            }
        }
    }

    tracing::info!(
        "Scanned {} candidate(s): {} valid, {} skipped",
        candidates.len(),
        scan.descriptors.len(),
        scan.skipped
    );

    scan
}

async fn scan_one(
    path: Utf8PathBuf,
    metrics: &Metrics,
    search: DrawableSearch,
) -> Option<ScannedDescriptor> {
    if !descriptor::validate(&path).await {
        metrics.record_descriptor_skipped();
        return None;
    }
    metrics.record_descriptor_validated();

    let identity = identity::identity_for(&path);

    let search_path = path.clone();
    let search = tokio::task::spawn_blocking(move || search(&search_path)).await;

    let drawables = match search {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            tracing::warn!("Counting drawables for {} failed, using 0: {}", path, e);
            metrics.record_drawable_search_failure();
            DrawableMatches::default()
        }
        Err(e) => {
            tracing::warn!("Drawable search task for {} failed, using 0: {}", path, e);
            metrics.record_drawable_search_failure();
            DrawableMatches::default()
        }
    };
    metrics.record_drawables(drawables.count());

    Some(ScannedDescriptor {
        path,
        identity,
        drawables,
    })
}

/// Descriptors at the top level of an extracted project tree.
///
/// Only `.meta` files whose names reference a freemode model are returned,
/// sorted by path. Subdirectories are not searched.
pub fn discover_project_descriptors(root: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!("Skipping non UTF-8 path {}", entry.path().display());
            continue;
        };

        let is_meta = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("meta"));
        let references_model = path
            .file_name()
            .and_then(GenderToken::recognize)
            .is_some();

        if is_meta && references_model {
            found.push(path);
        } else if is_meta {
            tracing::debug!("Ignoring {} as it names no freemode model", path);
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ShopPedApparel>\n";

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn test_scan_keeps_selection_order_and_skips_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);

        let second = root.join("mp_m_freemode_01_tshirt_2.meta");
        let bogus = root.join("notes.meta");
        let first = root.join("mp_m_freemode_01_tshirt_1.meta");
        fs::write(&second, DESCRIPTOR).unwrap();
        fs::write(&bogus, "just some notes\nnothing here\n").unwrap();
        fs::write(&first, DESCRIPTOR).unwrap();
        fs::write(root.join("mp_m_freemode_01_tshirt_1^jbib_000_u.ydd"), b"").unwrap();

        let metrics = Arc::new(Metrics::new());
        let scan = scan_candidates(&[second.clone(), bogus, first.clone()], &metrics).await;

        assert_eq!(scan.skipped, 1);
        let paths: Vec<_> = scan.paths().collect();
        assert_eq!(paths, vec![second.as_path(), first.as_path()]);
        assert_eq!(scan.descriptors[0].drawables.count(), 0);
        assert_eq!(scan.descriptors[1].drawables.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_candidate_is_skipped() {
        let metrics = Arc::new(Metrics::new());
        let scan = scan_candidates(&[Utf8PathBuf::from("/no/such/file.meta")], &metrics).await;

        assert!(scan.is_empty());
        assert_eq!(scan.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_drawable_search_counts_zero_for_that_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        let broken = root.join("mp_m_freemode_01_tshirt.meta");
        let healthy = root.join("mp_m_freemode_01_hat.meta");
        fs::write(&broken, DESCRIPTOR).unwrap();
        fs::write(&healthy, DESCRIPTOR).unwrap();
        fs::write(root.join("mp_m_freemode_01_hat^p_head_000.ydd"), b"").unwrap();

        fn fails_for_tshirt(descriptor: &Utf8Path) -> Result<DrawableMatches, DrawableError> {
            if descriptor.as_str().ends_with("tshirt.meta") {
                Err(DrawableError::NoParentDirectory(descriptor.to_path_buf()))
            } else {
                drawables::find_drawables(descriptor)
            }
        }

        let metrics = Arc::new(Metrics::new());
        let scan = scan_candidates_with(&[broken.clone(), healthy], &metrics, fails_for_tshirt).await;

        assert_eq!(scan.skipped, 0);
        assert_eq!(scan.descriptors.len(), 2);
        assert_eq!(scan.descriptors[0].path, broken);
        assert_eq!(scan.descriptors[0].drawables.count(), 0);
        assert_eq!(scan.descriptors[1].drawables.count(), 1);
        assert_eq!(metrics.descriptors_validated.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.drawable_search_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_suggestion_policies() {
        let shared = Utf8PathBuf::from("/a/mp_m_freemode_01_tshirt^jbib_000_u.ydd");
        let scanned = |name: &str| ScannedDescriptor {
            path: Utf8PathBuf::from(format!("/a/mp_m_freemode_01_{name}.meta")),
            identity: AddonIdentity::new(name, format!("mp_m_freemode_01_{name}.meta")),
            drawables: DrawableMatches {
                gender: Some(GenderToken::Male),
                files: vec![shared.clone()],
            },
        };
        let scan = DescriptorScan {
            descriptors: vec![scanned("tshirt"), scanned("tshirt_b")],
            skipped: 0,
        };

        let per_descriptor = scan.suggestion(DrawableCountPolicy::PerDescriptor);
        assert_eq!(per_descriptor.suggested_name, "tshirt");
        assert_eq!(per_descriptor.drawable_count, 2);
        assert_eq!(per_descriptor.descriptor_count, 2);

        let distinct = scan.suggestion(DrawableCountPolicy::Distinct);
        assert_eq!(distinct.drawable_count, 1);
    }

    #[test]
    fn test_discover_project_descriptors() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        fs::write(root.join("mp_m_freemode_01_tshirt.meta"), DESCRIPTOR).unwrap();
        fs::write(root.join("mp_f_freemode_01_dress.meta"), DESCRIPTOR).unwrap();
        fs::write(root.join("fxmanifest.lua"), b"").unwrap();
        fs::write(root.join("shop_weapons.meta"), b"").unwrap();
        fs::create_dir_all(root.join("stream")).unwrap();
        fs::write(root.join("stream").join("mp_m_freemode_01_nested.meta"), DESCRIPTOR).unwrap();

        let found = discover_project_descriptors(&root).unwrap();

        assert_eq!(
            found,
            vec![
                root.join("mp_f_freemode_01_dress.meta"),
                root.join("mp_m_freemode_01_tshirt.meta"),
            ]
        );
    }
}
