//! clothkit - addon project intake and portability
//!
//! Command line entry point.
//!
//! # Overview
//!
//! Each invocation runs one operation against a fresh in-memory project:
//! - `open`: validate descriptors, suggest a project identity, confirm, load
//! - `add`: load more descriptors without asking for an identity
//! - `import`: unpack a `.gctproject` file and load its descriptors
//! - `export`: pack a built project directory into a `.gctproject` file
//! - `inspect`: dry run of `open` that only reports the suggestion
//!
//! # Execution Flow
//!
//! 1. Load `clothkit.yaml` from the config directory (plus `CLOTHKIT_*` overrides)
//! 2. Initialize logging → `<log_dir>/clothkit.<date>`
//! 3. Create the tokio runtime
//! 4. Remove staging directories left by a previous run
//! 5. Run the command, then log the metrics summary

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use clothkit::models::{ProjectIdentitySuggestion, ProjectSetupDecision};
use clothkit::services::{DiskAddonLoader, SetupRequest, export_file_name};
use clothkit::workflow::{AutoConfirm, IntakePrompt};
use clothkit::{
    APP_NAME, ConfigManager, IntakeOutcome, IntakeWorkflow, Metrics, StateManager, VERSION,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clothkit")]
#[command(about = "Open, import and export clothing addon projects")]
#[command(version)]
struct Cli {
    /// Directory holding clothkit.yaml
    #[arg(long, global = true, default_value = "clothkit-data")]
    config_dir: Utf8PathBuf,

    /// Log at debug level and echo logs to the console
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open existing addon descriptors as a new project
    Open {
        /// Descriptor (.meta) files
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Project name (default: suggested from the file names)
        #[arg(short, long)]
        name: Option<String>,

        /// Keep the addon files where they are instead of copying them into the project
        #[arg(long)]
        external: bool,

        /// Accept the suggestion without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Add descriptors to a project
    Add {
        /// Descriptor (.meta) files
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Name the project after the first added addon
        #[arg(long)]
        set_name: bool,
    },

    /// Import a portable project file
    Import {
        /// Project file (.gctproject)
        file: Utf8PathBuf,

        /// Name the project after the file
        #[arg(long)]
        set_name: bool,
    },

    /// Export a built project directory as a portable project file
    Export {
        /// Built project directory
        source: Utf8PathBuf,

        /// Output file (default: <name>.gctproject)
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,

        /// Project name used for the default output file
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Report what opening the descriptors would suggest
    Inspect {
        /// Descriptor (.meta) files
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
    },
}

/// Asks intake questions on the terminal
struct ConsolePrompt {
    is_self_contained: bool,
}

/// Read one answer line.
///
/// Prompts are answered from inside the async workflow, so the read moves off
/// the runtime worker with `block_in_place`.
fn read_answer<R: BufRead>(input: &mut R) -> Option<String> {
    tokio::task::block_in_place(|| {
        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim().to_string()),
        }
    })
}

impl ConsolePrompt {
    fn ask(&self, question: &str) -> Option<String> {
        print!("{question} ");
        io::stdout().flush().ok()?;

        read_answer(&mut io::stdin().lock())
    }

    fn ask_yes_no(&self, question: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        match self.ask(&format!("{question} {hint}")) {
            Some(answer) if answer.is_empty() => default,
            Some(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }
}

impl IntakePrompt for ConsolePrompt {
    fn confirm_discard_unsaved_changes(&self) -> bool {
        self.ask_yes_no("Discard unsaved changes?", false)
    }

    fn confirm_setup(&self, request: &SetupRequest) -> ProjectSetupDecision {
        println!("{}", request.title);
        if let Some(message) = &request.drawable_message {
            println!("{message}");
        }

        let Some(answer) = self.ask(&format!("Project name [{}]:", request.project_name)) else {
            return ProjectSetupDecision::cancelled();
        };
        let name = if answer.is_empty() {
            request.project_name.clone()
        } else {
            answer
        };

        if self.ask_yes_no(&format!("{} project {name:?}?", request.confirm_text), true) {
            ProjectSetupDecision::confirmed(name, self.is_self_contained)
        } else {
            ProjectSetupDecision::cancelled()
        }
    }

    fn confirm_overwrite(&self, project_name: &str) -> bool {
        self.ask_yes_no(
            &format!("Project {project_name:?} already exists. Overwrite?"),
            false,
        )
    }

    fn acknowledge_no_drawables(&self, _suggestion: &ProjectIdentitySuggestion) {
        eprintln!(
            "No drawable files (.ydd) were found for the selected .meta file(s).\n\
             Please make sure the .ydd files are in the same directory or subdirectories as the .meta file."
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let config = config_manager.load_config()?;
    let debug_mode = cli.debug || config.debug_mode;

    let _log_guard = clothkit::logging::setup_logging_with_console(
        Utf8Path::new(&config.log_dir),
        "clothkit",
        debug_mode,
        cli.debug,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("clothkit-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let workflow = IntakeWorkflow::from_config(DiskAddonLoader::new(), &config, Arc::clone(&metrics));

    // Leftovers from an earlier run are never reused
    if let Err(e) = workflow.staging().cleanup_all() {
        tracing::warn!("Failed to clean up staging directories: {:#}", e);
    }

    let state = StateManager::new();
    let result = runtime.block_on(run(cli.command, &workflow, &state));

    metrics.log_summary();
    tracing::info!("Shutdown complete");

    result
}

async fn run(
    command: Commands,
    workflow: &IntakeWorkflow<DiskAddonLoader>,
    state: &StateManager,
) -> Result<()> {
    match command {
        Commands::Open {
            files,
            name,
            external,
            yes,
        } => {
            let outcome = if yes {
                let prompt = AutoConfirm::new(name, !external);
                workflow.open_addons(state, &files, &prompt).await?
            } else {
                let prompt = ConsolePrompt {
                    is_self_contained: !external,
                };
                match name {
                    Some(name) => {
                        let prompt = Named {
                            inner: prompt,
                            name,
                        };
                        workflow.open_addons(state, &files, &prompt).await?
                    }
                    None => workflow.open_addons(state, &files, &prompt).await?,
                }
            };
            report(&outcome, state)
        }
        Commands::Add { files, set_name } => {
            let prompt = ConsolePrompt {
                is_self_contained: true,
            };
            let outcome = workflow.add_addons(state, &files, set_name, &prompt).await?;
            report(&outcome, state)
        }
        Commands::Import { file, set_name } => {
            let outcome = workflow.import_project(state, &file, set_name).await?;
            report(&outcome, state)
        }
        Commands::Export {
            source,
            output,
            name,
        } => {
            let output = output.unwrap_or_else(|| {
                let name = name.unwrap_or_else(|| source.file_name().unwrap_or_default().to_string());
                Utf8PathBuf::from(export_file_name(&name))
            });
            let stats = workflow.export_project(&source, &output).await?;
            println!(
                "Exported {} file(s) ({} bytes) to {}",
                stats.files, stats.bytes, output
            );
            Ok(())
        }
        Commands::Inspect { files } => {
            let inspection = workflow.inspect(&files).await;
            for scanned in &inspection.scan.descriptors {
                println!(
                    "{} -> {} ({} drawable(s))",
                    scanned.identity.source_file_name(),
                    scanned.identity.short_name(),
                    scanned.drawables.count()
                );
            }
            println!(
                "Suggested project: {:?}, {} drawable(s) in {} descriptor(s), {} skipped",
                inspection.suggestion.suggested_name,
                inspection.suggestion.drawable_count,
                inspection.suggestion.descriptor_count,
                inspection.scan.skipped
            );
            Ok(())
        }
    }
}

/// Console prompt with the project name fixed in advance
struct Named {
    inner: ConsolePrompt,
    name: String,
}

impl IntakePrompt for Named {
    fn confirm_discard_unsaved_changes(&self) -> bool {
        self.inner.confirm_discard_unsaved_changes()
    }

    fn confirm_setup(&self, request: &SetupRequest) -> ProjectSetupDecision {
        let request = SetupRequest {
            project_name: self.name.clone(),
            ..request.clone()
        };
        self.inner.confirm_setup(&request)
    }

    fn confirm_overwrite(&self, project_name: &str) -> bool {
        self.inner.confirm_overwrite(project_name)
    }

    fn acknowledge_no_drawables(&self, suggestion: &ProjectIdentitySuggestion) {
        self.inner.acknowledge_no_drawables(suggestion)
    }
}

fn report(outcome: &IntakeOutcome, state: &StateManager) -> Result<()> {
    match outcome {
        IntakeOutcome::Loaded(report) => {
            if report.skipped > 0 {
                println!("Skipped {} file(s) that are not addon descriptors", report.skipped);
            }
            println!("{}", state.read(|s| s.summary()));
            Ok(())
        }
        IntakeOutcome::Cancelled => {
            println!("Cancelled");
            Ok(())
        }
        IntakeOutcome::NothingToDo { .. } => bail!("No valid .meta files were selected"),
        IntakeOutcome::NoDrawables(_) => bail!("No drawables found for the selected .meta file(s)"),
    }
}
