//! Intake workflow - open, add and import addons, export projects.
//!
//! [`IntakeWorkflow`] drives the services in order:
//!
//! 1. validate the selected candidates and count their drawables
//!    ([`scan_candidates`], one task per candidate)
//! 2. aggregate a [`ProjectIdentitySuggestion`]
//! 3. ask the person through an [`IntakePrompt`]
//! 4. hand every confirmed descriptor to the [`AddonLoader`]
//! 5. record the loaded addons in the [`StateManager`]
//!
//! Project state is only written after step 3 succeeds, and only one intake
//! operation runs at a time. Every path ends in an [`IntakeOutcome`] or an
//! [`IntakeError`].

pub mod prompt;
pub mod scan;

pub use prompt::{AutoConfirm, IntakePrompt};
pub use scan::{DescriptorScan, ScannedDescriptor, discover_project_descriptors, scan_candidates};

use crate::metrics::Metrics;
use crate::models::{
    DrawableCountPolicy, IntakePhase, LoadedAddon, ProjectIdentitySuggestion, ToolConfig,
};
use crate::services::{
    AddonLoader, ArchiveError, ArchiveStats, ProjectArchiver, ProjectSetupValidator, SetupError,
    SetupRequest, StagingArea, StagingKind,
};
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that end an intake or export operation
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Another open, add or import is already running")]
    Busy,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("No addon descriptors found in project file {0}")]
    EmptyProjectFile(Utf8PathBuf),

    #[error("Failed to read extracted project {path}: {source}")]
    Discovery {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to load addon {descriptor}: {source}")]
    Load {
        descriptor: Utf8PathBuf,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Staging directory unavailable: {0}")]
    Staging(#[source] BoxError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntakeError {
    fn staging(error: anyhow::Error) -> Self {
        Self::Staging(error.into())
    }
}

/// Summary of a completed intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeReport {
    pub project_name: String,
    pub is_external: bool,
    pub suggestion: ProjectIdentitySuggestion,
    pub addons_loaded: usize,
    pub skipped: usize,
}

/// How an intake operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Addons were loaded into the project
    Loaded(IntakeReport),
    /// The person declined; the project is unchanged
    Cancelled,
    /// None of the candidates was a valid descriptor
    NothingToDo { skipped: usize },
    /// Valid descriptors were found but none has drawables
    NoDrawables(ProjectIdentitySuggestion),
}

/// Dry-run result of [`IntakeWorkflow::inspect`]
#[derive(Debug, Clone)]
pub struct Inspection {
    pub scan: DescriptorScan,
    pub suggestion: ProjectIdentitySuggestion,
}

/// Where a selection stands after validation and counting
enum Selection {
    Ready {
        scan: DescriptorScan,
        suggestion: ProjectIdentitySuggestion,
    },
    Stop(IntakeOutcome),
}

/// Orchestrates addon intake and project portability
pub struct IntakeWorkflow<L> {
    loader: L,
    staging: StagingArea,
    validator: ProjectSetupValidator,
    policy: DrawableCountPolicy,
    metrics: Arc<Metrics>,
}

impl<L: AddonLoader> IntakeWorkflow<L> {
    pub fn new(
        loader: L,
        staging: StagingArea,
        validator: ProjectSetupValidator,
        policy: DrawableCountPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            loader,
            staging,
            validator,
            policy,
            metrics,
        }
    }

    /// Build a workflow from the tool configuration.
    pub fn from_config(loader: L, config: &ToolConfig, metrics: Arc<Metrics>) -> Self {
        Self::new(
            loader,
            StagingArea::new(config.resolved_temp_root(), config.staging_prefix.clone()),
            ProjectSetupValidator::new(config.main_projects_folder.clone()),
            config.drawable_count_policy,
            metrics,
        )
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Validate and count candidates without prompting or loading.
    pub async fn inspect(&self, candidates: &[Utf8PathBuf]) -> Inspection {
        let scan = scan_candidates(candidates, &self.metrics).await;
        let suggestion = scan.suggestion(self.policy);
        Inspection { scan, suggestion }
    }

    /// Open existing addons as a new project.
    ///
    /// Replaces the current project only after the person confirms the
    /// suggested identity. Unsaved changes must be discarded first.
    ///
    /// # Errors
    ///
    /// [`IntakeError::Busy`] if another intake holds the lock,
    /// [`IntakeError::Setup`] for an unusable project name and
    /// [`IntakeError::Load`] if the loader rejects a descriptor. The project
    /// is unchanged in every error case.
    pub async fn open_addons<P>(
        &self,
        state: &StateManager,
        candidates: &[Utf8PathBuf],
        prompt: &P,
    ) -> Result<IntakeOutcome, IntakeError>
    where
        P: IntakePrompt + ?Sized,
    {
        let _guard = state.try_begin_intake().ok_or(IntakeError::Busy)?;
        tracing::info!("Opening addon from {} selected file(s)", candidates.len());

        if state.read(|s| s.has_unsaved_changes) && !prompt.confirm_discard_unsaved_changes() {
            tracing::info!("Open cancelled to keep unsaved changes");
            self.metrics.record_intake_cancelled();
            return Ok(IntakeOutcome::Cancelled);
        }

        let result = self.open_steps(state, candidates, prompt).await;
        settle(state, &result);
        result
    }

    async fn open_steps<P>(
        &self,
        state: &StateManager,
        candidates: &[Utf8PathBuf],
        prompt: &P,
    ) -> Result<IntakeOutcome, IntakeError>
    where
        P: IntakePrompt + ?Sized,
    {
        let (scan, suggestion) = match self.select(state, candidates, prompt).await {
            Selection::Ready { scan, suggestion } => (scan, suggestion),
            Selection::Stop(outcome) => return Ok(outcome),
        };

        state.set_intake_phase(IntakePhase::AwaitingUserConfirmation);
        let request = SetupRequest::for_open_addon(&suggestion);
        let answer = prompt.confirm_setup(&request);

        let decision = match self
            .validator
            .finalize(answer, |name| prompt.confirm_overwrite(name))
        {
            Ok(decision) if decision.confirmed => decision,
            Ok(_) => return Ok(self.cancel(state)),
            Err(SetupError::OverwriteDeclined(name)) => {
                tracing::info!("Kept existing project {}", name);
                return Ok(self.cancel(state));
            }
            Err(e) => return Err(e.into()),
        };

        state.set_intake_phase(IntakePhase::Confirmed);
        let paths: Vec<Utf8PathBuf> = scan.paths().map(Utf8Path::to_path_buf).collect();
        let addons = self.load_all(state, &paths, false).await?;
        let addons_loaded = addons.len();
        let is_external = !decision.is_self_contained;

        state.replace_project(addons, decision.project_name.clone(), is_external);
        state.set_intake_phase(IntakePhase::Loaded);

        tracing::info!(
            "{} addon {} loaded",
            if is_external { "External" } else { "Self-contained" },
            decision.project_name
        );

        Ok(IntakeOutcome::Loaded(IntakeReport {
            project_name: decision.project_name,
            is_external,
            suggestion,
            addons_loaded,
            skipped: scan.skipped,
        }))
    }

    /// Add addons to the current project.
    ///
    /// No identity is asked for. With `should_set_project_name` the project
    /// takes the name the loader proposes for the first added addon.
    ///
    /// # Errors
    ///
    /// [`IntakeError::Busy`] or [`IntakeError::Load`]; the project is
    /// unchanged on error.
    pub async fn add_addons<P>(
        &self,
        state: &StateManager,
        candidates: &[Utf8PathBuf],
        should_set_project_name: bool,
        prompt: &P,
    ) -> Result<IntakeOutcome, IntakeError>
    where
        P: IntakePrompt + ?Sized,
    {
        let _guard = state.try_begin_intake().ok_or(IntakeError::Busy)?;
        tracing::info!("Adding addon from {} selected file(s)", candidates.len());

        let result = self
            .add_steps(state, candidates, should_set_project_name, prompt)
            .await;
        settle(state, &result);
        result
    }

    async fn add_steps<P>(
        &self,
        state: &StateManager,
        candidates: &[Utf8PathBuf],
        should_set_project_name: bool,
        prompt: &P,
    ) -> Result<IntakeOutcome, IntakeError>
    where
        P: IntakePrompt + ?Sized,
    {
        let (scan, suggestion) = match self.select(state, candidates, prompt).await {
            Selection::Ready { scan, suggestion } => (scan, suggestion),
            Selection::Stop(outcome) => return Ok(outcome),
        };

        state.set_intake_phase(IntakePhase::Confirmed);
        let paths: Vec<Utf8PathBuf> = scan.paths().map(Utf8Path::to_path_buf).collect();
        let addons = self.load_all(state, &paths, should_set_project_name).await?;
        let addons_loaded = addons.len();

        let proposed_name = should_set_project_name
            .then(|| addons.iter().find_map(|a| a.suggested_project_name.clone()))
            .flatten();

        state.append_addons(addons);
        if let Some(name) = proposed_name {
            state.set_project_name(name);
        }
        state.set_intake_phase(IntakePhase::Loaded);

        let (project_name, is_external) =
            state.read(|s| (s.project_name.clone(), s.is_external_project));
        tracing::info!("Added {} addon(s) to {}", addons_loaded, project_name);

        Ok(IntakeOutcome::Loaded(IntakeReport {
            project_name,
            is_external,
            suggestion,
            addons_loaded,
            skipped: scan.skipped,
        }))
    }

    /// Import a portable project file and add its addons.
    ///
    /// The file is unpacked into a fresh build directory in the import
    /// staging area, and every descriptor at the top of the unpacked tree is
    /// loaded. With `should_set_project_name` the project is named after the
    /// file.
    ///
    /// # Errors
    ///
    /// [`IntakeError::Archive`] for unreadable or corrupt files,
    /// [`IntakeError::EmptyProjectFile`] when no descriptors are found and
    /// [`IntakeError::Load`] if the loader rejects one. The project is
    /// unchanged on error.
    pub async fn import_project(
        &self,
        state: &StateManager,
        project_file: &Utf8Path,
        should_set_project_name: bool,
    ) -> Result<IntakeOutcome, IntakeError> {
        let _guard = state.try_begin_intake().ok_or(IntakeError::Busy)?;
        tracing::info!("Started importing {}", project_file);

        let result = self
            .import_steps(state, project_file, should_set_project_name)
            .await;
        settle(state, &result);
        result
    }

    async fn import_steps(
        &self,
        state: &StateManager,
        project_file: &Utf8Path,
        should_set_project_name: bool,
    ) -> Result<IntakeOutcome, IntakeError> {
        state.set_intake_phase(IntakePhase::CandidatesSelected);
        state.set_operation(format!("Importing {}", project_file));

        let project_name = project_file.file_stem().unwrap_or("project").to_string();
        let build_dir = self
            .staging
            .import_build_dir(&project_name)
            .map_err(IntakeError::staging)?;
        let archiver = ProjectArchiver::new(self.staging.path(StagingKind::Import));

        let started = Instant::now();
        let source = project_file.to_path_buf();
        let destination = build_dir.clone();
        let stats =
            tokio::task::spawn_blocking(move || archiver.import(&source, &destination)).await??;
        self.metrics.record_import(started.elapsed());
        tracing::debug!(
            "Unpacked {} file(s), {} bytes into {}",
            stats.files,
            stats.bytes,
            build_dir
        );

        let descriptors =
            discover_project_descriptors(&build_dir).map_err(|source| IntakeError::Discovery {
                path: build_dir.clone(),
                source,
            })?;

        if descriptors.is_empty() {
            tracing::error!("No meta files found in project file {}", project_file);
            if let Err(e) = fs::remove_dir_all(&build_dir) {
                tracing::warn!("Failed to remove empty import {}: {}", build_dir, e);
            }
            return Err(IntakeError::EmptyProjectFile(project_file.to_path_buf()));
        }
        state.set_intake_phase(IntakePhase::Validated);

        state.set_intake_phase(IntakePhase::Confirmed);
        let addons = self.load_all(state, &descriptors, false).await?;
        let addons_loaded = addons.len();
        let suggestion = ProjectIdentitySuggestion {
            suggested_name: project_name.clone(),
            drawable_count: loaded_drawables(&addons, self.policy),
            descriptor_count: descriptors.len(),
        };

        state.append_addons(addons);
        if should_set_project_name {
            state.set_project_name(project_name);
        }
        state.set_intake_phase(IntakePhase::Loaded);

        let (project_name, is_external) =
            state.read(|s| (s.project_name.clone(), s.is_external_project));
        tracing::info!(
            "Project imported from {} with {} addon(s)",
            project_file,
            addons_loaded
        );

        Ok(IntakeOutcome::Loaded(IntakeReport {
            project_name,
            is_external,
            suggestion,
            addons_loaded,
            skipped: 0,
        }))
    }

    /// Export a built project tree as a portable project file.
    ///
    /// # Errors
    ///
    /// [`IntakeError::Archive`] if packing fails; nothing is left at
    /// `destination` in that case.
    pub async fn export_project(
        &self,
        source_dir: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<ArchiveStats, IntakeError> {
        tracing::info!("Started exporting {} to {}", source_dir, destination);

        let scratch = self
            .staging
            .prepare(StagingKind::Export)
            .map_err(IntakeError::staging)?;
        let archiver = ProjectArchiver::new(scratch);

        let started = Instant::now();
        let source = source_dir.to_path_buf();
        let target = destination.to_path_buf();
        let stats = tokio::task::spawn_blocking(move || archiver.export(&source, &target)).await??;
        self.metrics.record_export(started.elapsed());

        Ok(stats)
    }

    /// Validate, count and check for drawables.
    async fn select<P>(
        &self,
        state: &StateManager,
        candidates: &[Utf8PathBuf],
        prompt: &P,
    ) -> Selection
    where
        P: IntakePrompt + ?Sized,
    {
        state.set_intake_phase(IntakePhase::CandidatesSelected);
        state.set_operation("Validating selected files");

        let scan = scan_candidates(candidates, &self.metrics).await;
        state.set_intake_phase(IntakePhase::Validated);

        if scan.is_empty() {
            tracing::warn!("No valid .meta files were selected");
            return Selection::Stop(IntakeOutcome::NothingToDo {
                skipped: scan.skipped,
            });
        }

        let suggestion = scan.suggestion(self.policy);
        state.set_intake_phase(IntakePhase::IdentitySuggested);
        tracing::info!(
            "Suggested project {:?}: {} drawable(s) in {} descriptor(s)",
            suggestion.suggested_name,
            suggestion.drawable_count,
            suggestion.descriptor_count
        );

        if suggestion.drawable_count == 0 {
            tracing::warn!("No drawable files (.ydd) were found for the selected .meta file(s)");
            prompt.acknowledge_no_drawables(&suggestion);
            return Selection::Stop(IntakeOutcome::NoDrawables(suggestion));
        }

        Selection::Ready { scan, suggestion }
    }

    /// Load descriptors in order; the first failure aborts.
    async fn load_all(
        &self,
        state: &StateManager,
        descriptors: &[Utf8PathBuf],
        should_set_project_name: bool,
    ) -> Result<Vec<LoadedAddon>, IntakeError> {
        state.set_intake_phase(IntakePhase::Loading);

        let mut addons = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            state.set_operation(format!(
                "Loading {} ({}/{})",
                descriptor.file_name().unwrap_or(descriptor.as_str()),
                index + 1,
                descriptors.len()
            ));

            let addon = self
                .loader
                .load_addon(descriptor, should_set_project_name)
                .await
                .map_err(|e| IntakeError::Load {
                    descriptor: descriptor.clone(),
                    source: e.into(),
                })?;

            self.metrics.record_addon_loaded();
            addons.push(addon);
        }

        Ok(addons)
    }

    fn cancel(&self, state: &StateManager) -> IntakeOutcome {
        tracing::info!("Project setup cancelled");
        self.metrics.record_intake_cancelled();
        state.set_intake_phase(IntakePhase::Cancelled);
        IntakeOutcome::Cancelled
    }
}

/// Return to idle unless the operation loaded addons.
fn settle(state: &StateManager, result: &Result<IntakeOutcome, IntakeError>) {
    match result {
        Ok(IntakeOutcome::Loaded(report)) => {
            state.set_operation(format!("Loaded {} addon(s)", report.addons_loaded));
        }
        Ok(_) => {
            state.set_intake_phase(IntakePhase::Idle);
            state.set_operation("");
        }
        Err(e) => {
            tracing::error!("Intake failed: {}", e);
            state.set_intake_phase(IntakePhase::Idle);
            state.set_operation("");
        }
    }
}

fn loaded_drawables(addons: &[LoadedAddon], policy: DrawableCountPolicy) -> usize {
    match policy {
        DrawableCountPolicy::PerDescriptor => addons.iter().map(|a| a.drawables.len()).sum(),
        DrawableCountPolicy::Distinct => addons
            .iter()
            .flat_map(|a| a.drawables.iter())
            .collect::<HashSet<_>>()
            .len(),
    }
}

#[cfg(test)]
mod tests {
    use super::prompt::MockIntakePrompt;
    use super::*;
    use crate::models::{GenderToken, ProjectSetupDecision};
    use crate::services::loader::MockAddonLoader;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ShopPedApparel>\n";

    struct Fixture {
        _temp_dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
            fs::create_dir_all(root.join("addons")).unwrap();
            Self {
                _temp_dir: temp_dir,
                root,
            }
        }

        fn descriptor(&self, stem: &str, with_drawable: bool) -> Utf8PathBuf {
            let path = self.root.join("addons").join(format!("{stem}.meta"));
            fs::write(&path, DESCRIPTOR).unwrap();
            if with_drawable {
                fs::write(
                    self.root.join("addons").join(format!("{stem}^jbib_000_u.ydd")),
                    b"",
                )
                .unwrap();
            }
            path
        }

        fn workflow(&self, loader: MockAddonLoader) -> IntakeWorkflow<MockAddonLoader> {
            IntakeWorkflow::new(
                loader,
                StagingArea::new(self.root.join("tmp"), "clothkit"),
                ProjectSetupValidator::new(Some(self.root.join("projects"))),
                DrawableCountPolicy::PerDescriptor,
                Arc::new(Metrics::new()),
            )
        }
    }

    fn loaded(path: &Utf8Path, _should_set_project_name: bool) -> anyhow::Result<LoadedAddon> {
        let stem = path.file_stem().unwrap_or_default();
        Ok(LoadedAddon {
            name: crate::services::extract_short_name(stem),
            descriptor_path: path.to_path_buf(),
            gender: GenderToken::from_descriptor_stem(stem),
            drawables: Vec::new(),
            suggested_project_name: None,
        })
    }

    #[tokio::test]
    async fn test_open_confirmed_replaces_project() {
        let fixture = Fixture::new();
        let first = fixture.descriptor("mp_m_freemode_01_tshirt_1", true);
        let second = fixture.descriptor("mp_m_freemode_01_tshirt_2", true);

        let mut loader = MockAddonLoader::new();
        loader
            .expect_load_addon()
            .times(2)
            .returning(|path, flag| loaded(path, flag));

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_setup()
            .withf(|request| {
                request.project_name == "tshirt"
                    && request.drawable_message.as_deref()
                        == Some("Found 2 drawable(s) in 2 .meta files")
            })
            .times(1)
            .returning(|request| ProjectSetupDecision::confirmed(request.project_name.clone(), true));
        prompt.expect_confirm_overwrite().never();

        let state = StateManager::new();
        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[first, second], &prompt)
            .await
            .unwrap();

        let IntakeOutcome::Loaded(report) = outcome else {
            panic!("expected a loaded outcome, got {outcome:?}");
        };
        assert_eq!(report.project_name, "tshirt");
        assert_eq!(report.suggestion.drawable_count, 2);
        assert_eq!(report.suggestion.descriptor_count, 2);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.addons.len(), 2);
        assert!(!snapshot.is_external_project);
        assert!(snapshot.has_unsaved_changes);
        assert_eq!(snapshot.intake_phase, IntakePhase::Loaded);
    }

    #[tokio::test]
    async fn test_cancelled_setup_leaves_state_untouched() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_f_freemode_01_dress", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_setup()
            .times(1)
            .returning(|_| ProjectSetupDecision::cancelled());

        let state = StateManager::new();
        let mut events = state.subscribe();

        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[meta], &prompt)
            .await
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::Cancelled);
        let snapshot = state.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.intake_phase, IntakePhase::Idle);

        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let crate::state::StateChange::IntakePhaseChanged { phase } = event {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                IntakePhase::CandidatesSelected,
                IntakePhase::Validated,
                IntakePhase::IdentitySuggested,
                IntakePhase::AwaitingUserConfirmation,
                IntakePhase::Cancelled,
                IntakePhase::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn test_unsaved_changes_kept() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_m_freemode_01_tshirt", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_discard_unsaved_changes()
            .times(1)
            .return_const(false);
        prompt.expect_confirm_setup().never();

        let state = StateManager::new();
        state.set_project_name("work in progress");
        state.update(|s| s.has_unsaved_changes = true);

        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[meta], &prompt)
            .await
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::Cancelled);
        assert_eq!(state.snapshot().project_name, "work in progress");
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let fixture = Fixture::new();
        let bogus = fixture.root.join("addons").join("readme.meta");
        fs::write(&bogus, "hello\nworld\n").unwrap();

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();
        let prompt = MockIntakePrompt::new();

        let state = StateManager::new();
        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[bogus], &prompt)
            .await
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::NothingToDo { skipped: 1 });
        assert_eq!(state.snapshot().intake_phase, IntakePhase::Idle);
    }

    #[tokio::test]
    async fn test_zero_drawables_stops_with_warning() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_m_freemode_01_tshirt", false);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_acknowledge_no_drawables()
            .withf(|suggestion| suggestion.drawable_count == 0 && suggestion.descriptor_count == 1)
            .times(1)
            .return_const(());
        prompt.expect_confirm_setup().never();

        let state = StateManager::new();
        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[meta], &prompt)
            .await
            .unwrap();

        assert!(matches!(outcome, IntakeOutcome::NoDrawables(_)));
        assert!(state.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_declined_cancels() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.root.join("projects").join("tshirt")).unwrap();
        let meta = fixture.descriptor("mp_m_freemode_01_tshirt", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_setup()
            .returning(|request| ProjectSetupDecision::confirmed(request.project_name.clone(), false));
        prompt
            .expect_confirm_overwrite()
            .withf(|name| name == "tshirt")
            .times(1)
            .return_const(false);

        let state = StateManager::new();
        let outcome = fixture
            .workflow(loader)
            .open_addons(&state, &[meta], &prompt)
            .await
            .unwrap();

        assert_eq!(outcome, IntakeOutcome::Cancelled);
        assert!(state.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_an_error() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_m_freemode_01_tshirt", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_setup()
            .returning(|_| ProjectSetupDecision::confirmed("bad/name", false));

        let state = StateManager::new();
        let result = fixture
            .workflow(loader)
            .open_addons(&state, &[meta], &prompt)
            .await;

        assert!(matches!(
            result,
            Err(IntakeError::Setup(SetupError::InvalidCharacters(_)))
        ));
        assert_eq!(state.snapshot().intake_phase, IntakePhase::Idle);
    }

    #[tokio::test]
    async fn test_loader_failure_leaves_state_untouched() {
        let fixture = Fixture::new();
        let first = fixture.descriptor("mp_m_freemode_01_tshirt_1", true);
        let second = fixture.descriptor("mp_m_freemode_01_tshirt_2", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().returning(|path, flag| {
            if path.as_str().ends_with("_2.meta") {
                Err(anyhow::anyhow!("broken descriptor"))
            } else {
                loaded(path, flag)
            }
        });

        let mut prompt = MockIntakePrompt::new();
        prompt
            .expect_confirm_setup()
            .returning(|request| ProjectSetupDecision::confirmed(request.project_name.clone(), true));

        let state = StateManager::new();
        let result = fixture
            .workflow(loader)
            .open_addons(&state, &[first, second.clone()], &prompt)
            .await;

        match result {
            Err(IntakeError::Load { descriptor, .. }) => assert_eq!(descriptor, second),
            other => panic!("expected a load error, got {other:?}"),
        }
        assert!(state.snapshot().addons.is_empty());
    }

    #[tokio::test]
    async fn test_busy_while_another_intake_runs() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_m_freemode_01_tshirt", true);

        let mut loader = MockAddonLoader::new();
        loader.expect_load_addon().never();
        let prompt = MockIntakePrompt::new();

        let state = StateManager::new();
        let _running = state.try_begin_intake().unwrap();

        let result = fixture
            .workflow(loader)
            .add_addons(&state, &[meta], false, &prompt)
            .await;

        assert!(matches!(result, Err(IntakeError::Busy)));
    }

    #[tokio::test]
    async fn test_add_appends_and_can_name_project() {
        let fixture = Fixture::new();
        let meta = fixture.descriptor("mp_m_freemode_01_jacket", true);

        let mut loader = MockAddonLoader::new();
        loader
            .expect_load_addon()
            .withf(|_, should_set_project_name| *should_set_project_name)
            .times(1)
            .returning(|path, flag| {
                let mut addon = loaded(path, flag)?;
                addon.suggested_project_name = Some(addon.name.clone());
                Ok(addon)
            });

        let mut prompt = MockIntakePrompt::new();
        prompt.expect_confirm_setup().never();

        let state = StateManager::new();
        state.replace_project(
            vec![loaded(Utf8Path::new("/old/mp_m_freemode_01_tshirt.meta"), false).unwrap()],
            String::new(),
            false,
        );

        let outcome = fixture
            .workflow(loader)
            .add_addons(&state, &[meta], true, &prompt)
            .await
            .unwrap();

        assert!(matches!(outcome, IntakeOutcome::Loaded(ref r) if r.addons_loaded == 1));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.addons.len(), 2);
        assert_eq!(snapshot.project_name, "jacket");
    }

    #[test]
    fn test_loaded_drawables_policy() {
        let shared = Utf8PathBuf::from("/a/mp_m_freemode_01_x^jbib_000_u.ydd");
        let mut addon = loaded(Utf8Path::new("/a/mp_m_freemode_01_x.meta"), false).unwrap();
        addon.drawables = vec![shared];
        let addons = vec![addon.clone(), addon];

        assert_eq!(loaded_drawables(&addons, DrawableCountPolicy::PerDescriptor), 2);
        assert_eq!(loaded_drawables(&addons, DrawableCountPolicy::Distinct), 1);
    }
}
