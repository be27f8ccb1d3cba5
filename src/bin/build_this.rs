//! build-this - packages saved builder forms for deployment
//!
//! Lists the saved forms, asks which one to build (or all of them) and
//! writes each package to `deploy/this_<name>/`.
//! Returns non-zero on any scan, selection or build failure.

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use buildthis_core::{
    menu::{self, Selection},
    registry, BuildContext, BuildLayout, BuildPipeline, FormRecord, RegistryError, Step,
    StepEvent, TOOL_VERSION,
};

#[derive(Parser)]
#[command(name = "build-this", version = TOOL_VERSION)]
#[command(about = "Build This - compile saved forms into deployable packages")]
struct Cli {
    /// Project root containing data/forms, src, assets and deploy
    #[arg(short, long, default_value = "..")]
    root: PathBuf,

    /// Saved forms directory (default: <root>/data/forms)
    #[arg(long)]
    forms_dir: Option<PathBuf>,

    /// Source tree holding builder/preview.php (default: <root>/src)
    #[arg(long)]
    src_dir: Option<PathBuf>,

    /// Static assets directory (default: <root>/assets)
    #[arg(long)]
    assets_dir: Option<PathBuf>,

    /// Output base directory (default: <root>/deploy)
    #[arg(long)]
    deploy_dir: Option<PathBuf>,

    /// Build every saved form without prompting
    #[arg(long, conflicts_with_all = ["form", "list"])]
    all: bool,

    /// Build the saved form with this ID without prompting
    #[arg(long, conflicts_with = "list")]
    form: Option<String>,

    /// List saved forms and exit
    #[arg(long)]
    list: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn layout(&self) -> BuildLayout {
        let mut layout = BuildLayout::from_root(&self.root);
        if let Some(dir) = &self.forms_dir {
            layout.forms_dir = dir.clone();
        }
        if let Some(dir) = &self.src_dir {
            layout.src_dir = dir.clone();
        }
        if let Some(dir) = &self.assets_dir {
            layout.assets_dir = dir.clone();
        }
        if let Some(dir) = &self.deploy_dir {
            layout.deploy_base = dir.clone();
        }
        layout
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,buildthis_core=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let context = BuildContext::now();
    println!("build-this v{}", context.version);
    println!("Build started: {}", context.timestamp());
    println!("---");

    let layout = cli.layout();
    let forms = match registry::discover(&layout.forms_dir) {
        Ok(forms) => forms,
        Err(RegistryError::Empty { dir }) => {
            eprintln!("No saved forms found in {}.", dir.display());
            eprintln!("Open the Form Builder and save at least one form before building.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error scanning forms directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Found {} saved form(s):\n", forms.len());
    for line in menu::render_menu(&forms) {
        println!("{}", line);
    }
    println!();

    if cli.list {
        return ExitCode::SUCCESS;
    }

    let selection = if cli.all {
        Selection::All
    } else if let Some(id) = &cli.form {
        match forms.iter().position(|f| f.id() == id) {
            Some(i) => Selection::One(i),
            None => {
                eprintln!("No saved form with ID '{}'.", id);
                return ExitCode::from(2);
            }
        }
    } else {
        let stdin = io::stdin();
        match menu::prompt_selection(&mut stdin.lock(), &mut io::stdout(), forms.len()) {
            Ok(selection) => selection,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let pipeline = BuildPipeline::new(layout, context);
    let result = pipeline.build_all(selection.apply(&forms), |record, event| {
        report(&pipeline, record, event)
    });

    match result {
        Ok(_) => {
            println!("\n--- All builds complete ---");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Build error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn report(pipeline: &BuildPipeline, record: &FormRecord, event: StepEvent<'_>) {
    let mut out = io::stdout();
    // Write errors on stdout are ignored.
    let _ = match event {
        StepEvent::Started(step) => {
            if step == Step::ORDER[0] {
                let _ = writeln!(out, "\n--- Building: {} ---", record.name());
            }
            write!(out, "  > {}... ", step).and_then(|_| out.flush())
        }
        StepEvent::Completed { step, skipped } => {
            for src in skipped {
                let name = src.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                let _ = write!(out, "(skipped: {}) ", name);
            }
            let done = writeln!(out, "OK");
            if Step::ORDER.last() == Some(&step) {
                let target = pipeline.target_for(record);
                let _ = writeln!(out, "  Deploy from: {}", target.root().display());
            }
            done
        }
        StepEvent::Failed { .. } => writeln!(out, "FAILED"),
    };
}
