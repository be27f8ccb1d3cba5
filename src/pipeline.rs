//! Build Pipeline - one saved form into one deploy directory
//!
//! Steps run in a fixed order; later steps assume earlier ones completed.
//! The first failing step stops the build. Nothing is rolled back, so a
//! failed build can leave a partially written target behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::artifacts::{self, BuildContext};
use crate::assets::{copy_file, copy_optional};
use crate::hashing::{compute_manifest_hash, file_digest};
use crate::layout::{
    BuildLayout, BuildTarget, ACCESS_FILE, ENTRY_FILE, MANIFEST_FILE, README_FILE,
    SERVICE_WORKER_FILE,
};
use crate::registry::FormRecord;

/// One named unit of work in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    PrepareOutput,
    GenerateEntry,
    CopyRenderer,
    CopyAssets,
    GenerateAccessFile,
    GenerateServiceWorker,
    WriteReadme,
    WriteManifest,
}

impl Step {
    /// Execution order.
    pub const ORDER: [Step; 8] = [
        Step::PrepareOutput,
        Step::GenerateEntry,
        Step::CopyRenderer,
        Step::CopyAssets,
        Step::GenerateAccessFile,
        Step::GenerateServiceWorker,
        Step::WriteReadme,
        Step::WriteManifest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Step::PrepareOutput => "Prepare output directory",
            Step::GenerateEntry => "Generate self-contained index.php",
            Step::CopyRenderer => "Copy preview renderer",
            Step::CopyAssets => "Copy assets",
            Step::GenerateAccessFile => "Generate .htaccess",
            Step::GenerateServiceWorker => "Generate service worker",
            Step::WriteReadme => "Write deploy README",
            Step::WriteManifest => "Write build manifest",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cause of a failed step.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("cannot {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn io_failure<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> StepFailure + 'a {
    move |source| StepFailure::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// A build stopped at `step`.
#[derive(Debug, Error)]
#[error("build of '{form}' failed at step '{step}': {source}")]
pub struct BuildError {
    pub form: String,
    pub step: Step,
    #[source]
    pub source: StepFailure,
}

/// Progress notifications emitted while a build runs.
#[derive(Debug)]
pub enum StepEvent<'a> {
    Started(Step),
    Completed {
        step: Step,
        /// Optional assets this step could not copy.
        skipped: &'a [PathBuf],
    },
    Failed {
        step: Step,
        error: &'a StepFailure,
    },
}

/// Result of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub form_id: String,
    pub form_name: String,
    pub target: PathBuf,
    pub cache_token: String,
    pub skipped_assets: Vec<PathBuf>,
    pub manifest_hash: String,
}

/// `build-manifest.json`: every file of the package with its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub tool_version: String,
    pub form_id: String,
    pub form_name: String,
    pub built_at: DateTime<Utc>,
    pub cache_token: String,
    pub manifest_hash: String,
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Relative to the target root, `/`-separated.
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Default)]
struct StepOutcome {
    skipped: Vec<PathBuf>,
}

/// State shared by the steps of one build.
struct BuildRun<'a> {
    layout: &'a BuildLayout,
    context: &'a BuildContext,
    record: &'a FormRecord,
    target: BuildTarget,
    cache_token: String,
    manifest_hash: String,
}

impl BuildRun<'_> {
    fn run(&mut self, step: Step) -> Result<StepOutcome, StepFailure> {
        match step {
            Step::PrepareOutput => self.prepare_output(),
            Step::GenerateEntry => {
                let source = self.record.path();
                let payload = fs::read(source).map_err(io_failure("read form data", source))?;
                let entry = artifacts::render_entry(self.context, self.record, &payload);
                self.write(ENTRY_FILE, entry)
            }
            Step::CopyRenderer => {
                let source = self.layout.renderer_source();
                copy_file(&source, &self.target.renderer())
                    .map_err(io_failure("copy renderer", &source))?;
                Ok(StepOutcome::default())
            }
            Step::CopyAssets => Ok(StepOutcome {
                skipped: copy_optional(self.target.root(), &self.layout.asset_pairs()),
            }),
            Step::GenerateAccessFile => {
                let content = artifacts::render_htaccess(self.context);
                self.write(ACCESS_FILE, &content)
            }
            Step::GenerateServiceWorker => {
                self.cache_token = artifacts::cache_token(Utc::now());
                let content = artifacts::render_service_worker(&self.cache_token);
                self.write(SERVICE_WORKER_FILE, &content)
            }
            Step::WriteReadme => {
                let content = artifacts::render_readme(self.context, self.record);
                self.write(README_FILE, &content)
            }
            Step::WriteManifest => self.write_manifest(),
        }
    }

    fn prepare_output(&self) -> Result<StepOutcome, StepFailure> {
        let root = self.target.root();
        match fs::remove_dir_all(root) {
            Ok(()) => tracing::debug!(target_dir = %root.display(), "removed previous build"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_failure("remove previous build", root)(e)),
        }
        for dir in self.target.skeleton() {
            fs::create_dir_all(&dir).map_err(io_failure("create directory", &dir))?;
        }
        Ok(StepOutcome::default())
    }

    fn write(&self, file: &str, content: impl AsRef<[u8]>) -> Result<StepOutcome, StepFailure> {
        let path = self.target.join(file);
        fs::write(&path, content).map_err(io_failure("write", &path))?;
        Ok(StepOutcome::default())
    }

    fn write_manifest(&mut self) -> Result<StepOutcome, StepFailure> {
        let root = self.target.root();
        let mut files = vec![];
        collect_files(root, root, &mut files).map_err(io_failure("list", root))?;

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let (sha256, size) = file_digest(&path).map_err(io_failure("hash", &path))?;
            entries.push(ManifestEntry {
                path: relative_slash_path(root, &path),
                size,
                sha256,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut manifest = BuildManifest {
            tool_version: self.context.version.clone(),
            form_id: self.record.id().to_string(),
            form_name: self.record.name().to_string(),
            built_at: self.context.started_at,
            cache_token: self.cache_token.clone(),
            manifest_hash: String::new(), // Computed after
            files: entries,
        };
        manifest.manifest_hash = compute_manifest_hash(&manifest)?;
        self.manifest_hash = manifest.manifest_hash.clone();

        let json = serde_json::to_string_pretty(&manifest)?;
        self.write(MANIFEST_FILE, &json)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if path != root.join(MANIFEST_FILE) {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds deploy packages for saved forms.
pub struct BuildPipeline {
    layout: BuildLayout,
    context: BuildContext,
}

impl BuildPipeline {
    pub fn new(layout: BuildLayout, context: BuildContext) -> Self {
        Self { layout, context }
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn target_for(&self, record: &FormRecord) -> BuildTarget {
        self.layout.target_for(record.name())
    }

    /// Build one record.
    pub fn build(&self, record: &FormRecord) -> Result<BuildSummary, BuildError> {
        self.build_with(record, |_| {})
    }

    /// Build one record, reporting each step to `on_event`.
    pub fn build_with<F>(&self, record: &FormRecord, mut on_event: F) -> Result<BuildSummary, BuildError>
    where
        F: FnMut(StepEvent<'_>),
    {
        let span = tracing::info_span!("build", form = record.id());
        let _enter = span.enter();

        let mut run = BuildRun {
            layout: &self.layout,
            context: &self.context,
            record,
            target: self.target_for(record),
            cache_token: String::new(),
            manifest_hash: String::new(),
        };
        let mut skipped_assets = vec![];

        for step in Step::ORDER {
            on_event(StepEvent::Started(step));
            match run.run(step) {
                Ok(outcome) => {
                    tracing::debug!(step = step.name(), "step complete");
                    on_event(StepEvent::Completed {
                        step,
                        skipped: &outcome.skipped,
                    });
                    skipped_assets.extend(outcome.skipped);
                }
                Err(source) => {
                    tracing::error!(step = step.name(), error = %source, "step failed");
                    on_event(StepEvent::Failed {
                        step,
                        error: &source,
                    });
                    return Err(BuildError {
                        form: record.name().to_string(),
                        step,
                        source,
                    });
                }
            }
        }

        tracing::info!(target_dir = %run.target.root().display(), "build complete");
        Ok(BuildSummary {
            form_id: record.id().to_string(),
            form_name: record.name().to_string(),
            target: run.target.root().to_path_buf(),
            cache_token: run.cache_token,
            skipped_assets,
            manifest_hash: run.manifest_hash,
        })
    }

    /// Build records in order. The first failure ends the whole run.
    pub fn build_all<F>(&self, records: &[FormRecord], mut on_event: F) -> Result<Vec<BuildSummary>, BuildError>
    where
        F: FnMut(&FormRecord, StepEvent<'_>),
    {
        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            summaries.push(self.build_with(record, |event| on_event(record, event))?);
        }
        Ok(summaries)
    }
}
