//! CLI for the refactor-js engine.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use refactor_js::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refactor")]
#[command(author, version, about = "Flow-aware refactorings for JavaScript and TypeScript", long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments every refactoring takes.
#[derive(Args)]
struct Target {
    /// File the refactoring starts from
    file: PathBuf,

    /// Byte offset of the selection
    #[arg(long)]
    offset: Option<usize>,

    /// Byte length of the selection
    #[arg(long, default_value_t = 0)]
    length: usize,

    /// Select the first occurrence of this text instead of an offset
    #[arg(long, conflicts_with = "offset")]
    select: Option<String>,

    /// Engine configuration (YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace root searched for references; only FILE when unset
    #[arg(long)]
    root: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(long)]
    dry_run: bool,

    /// Print status and edits as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract statements or an expression into a new function or method
    ExtractMethod {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
        /// Also replace code equal to the selection
        #[arg(long)]
        replace_duplicates: bool,
    },

    /// Extract an expression into a local constant
    ExtractVariable {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
        /// Replace every equal occurrence
        #[arg(long)]
        all: bool,
    },

    /// Extract a constant expression into a static field or module constant
    ExtractConstant {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        all: bool,
    },

    /// Replace calls with the body of the callee
    InlineMethod {
        #[command(flatten)]
        target: Target,
        /// Inline only the selected call
        #[arg(long)]
        single: bool,
        /// Keep the declaration
        #[arg(long)]
        keep: bool,
    },

    /// Replace references to a constant with its value
    InlineConstant {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        single: bool,
        #[arg(long)]
        keep: bool,
    },

    /// Turn an expression into a new parameter of its function
    IntroduceParameter {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
    },

    /// Route constructor calls through a static factory
    IntroduceFactory {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Add a static delegate for a function or method
    IntroduceIndirection {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
        /// Leave existing calls pointing at the original
        #[arg(long)]
        keep_calls: bool,
    },

    /// Turn a local variable into a field
    PromoteLocal {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
        #[arg(long, value_enum, default_value_t = Initialization::Method)]
        init: Initialization,
    },

    /// Turn a class expression into a named class declaration
    ConvertAnonymous {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        name: String,
    },

    /// Show supported languages
    Languages,
}

#[derive(Clone, Copy, ValueEnum)]
enum Initialization {
    Method,
    Field,
    Constructor,
}

impl From<Initialization> for FieldInitialization {
    fn from(init: Initialization) -> Self {
        match init {
            Initialization::Method => FieldInitialization::Method,
            Initialization::Field => FieldInitialization::Field,
            Initialization::Constructor => FieldInitialization::Constructor,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::ExtractMethod {
            target,
            name,
            replace_duplicates,
        } => run(&target, &mut ExtractMethod::new(name).replace_duplicates(replace_duplicates)),
        Commands::ExtractVariable { target, name, all } => {
            run(&target, &mut ExtractVariable::new(name).replace_all(all))
        }
        Commands::ExtractConstant { target, name, all } => {
            run(&target, &mut ExtractConstant::new(name).replace_all(all))
        }
        Commands::InlineMethod { target, single, keep } => run(
            &target,
            &mut InlineMethod::new().inline_all(!single).delete_declaration(!keep),
        ),
        Commands::InlineConstant { target, single, keep } => run(
            &target,
            &mut InlineConstant::new().inline_all(!single).remove_declaration(!keep),
        ),
        Commands::IntroduceParameter { target, name } => run(&target, &mut IntroduceParameter::new(name)),
        Commands::IntroduceFactory { target, name } => {
            let mut op = IntroduceFactory::new();
            op.name = name;
            run(&target, &mut op)
        }
        Commands::IntroduceIndirection {
            target,
            name,
            keep_calls,
        } => run(
            &target,
            &mut IntroduceIndirection::new(name).update_references(!keep_calls),
        ),
        Commands::PromoteLocal { target, name, init } => {
            run(&target, &mut PromoteTempToField::new(name).initialize_in(init.into()))
        }
        Commands::ConvertAnonymous { target, name } => run(&target, &mut ConvertAnonymousToNested::new(name)),
        Commands::Languages => cmd_languages(),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "refactor_js=debug",
        _ => "refactor_js=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn context(target: &Target) -> Result<RefactoringContext> {
    let config = match &target.config {
        Some(path) => RefactorConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => RefactorConfig::default(),
    };
    let source = std::fs::read_to_string(&target.file)
        .with_context(|| format!("Failed to read {}", target.file.display()))?;

    let mut workspace = match &target.root {
        Some(root) => Workspace::load(root, &config).context("Failed to load workspace")?,
        None => Workspace::new(),
    };
    let unit_path = match &target.root {
        Some(root) => unit_path(root, &target.file),
        None => target.file.clone(),
    };
    if workspace.unit(&unit_path).is_none() {
        workspace
            .add_source(unit_path.clone(), source)
            .with_context(|| format!("Failed to parse {}", target.file.display()))?;
    }

    let ctx = RefactoringContext::new(workspace, unit_path).with_config(config);
    let ctx = match (&target.select, target.offset) {
        (Some(text), _) => {
            let ctx = ctx.select(text);
            if ctx.selection.length == 0 {
                bail!("'{text}' does not occur in {}", target.file.display());
            }
            ctx
        }
        (None, Some(offset)) => ctx.with_selection(offset, target.length),
        (None, None) => bail!("a selection is required: pass --offset or --select"),
    };
    Ok(ctx)
}

/// Path of `file` as the workspace loaded from `root` names it.
fn unit_path(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() || file.starts_with(root) {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    operation: &'a str,
    state: RefactoringState,
    status: &'a RefactoringStatus,
    edits: Vec<refactor_js::refactor::operations::UnitEdits>,
}

fn run(target: &Target, operation: &mut dyn RefactoringOperation) -> Result<()> {
    let ctx = context(target)?;
    let result = RefactoringRunner::new()
        .run(operation, &ctx)
        .with_context(|| format!("{} failed", operation.name()))?;

    if target.json {
        let report = Report {
            operation: operation.name(),
            state: result.state,
            status: &result.status,
            edits: result.change.as_ref().map(|c| c.edits()).unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in result.status.entries() {
            eprintln!("{entry}");
        }
    }

    let Some(change) = result.change else {
        bail!("{} was not performed", operation.name());
    };
    if target.dry_run {
        if !target.json {
            println!("{}", change.colorized_diff());
            println!("\n{}", change.summary());
        }
        return Ok(());
    }

    change.write().context("Failed to write changes")?;
    if !target.json {
        println!("{}: modified {} file(s)", operation.name(), change.files_modified());
    }
    Ok(())
}

fn cmd_languages() -> Result<()> {
    let registry = LanguageRegistry::new();
    println!("Supported languages:");
    for lang in registry.all() {
        println!(
            "  {} (extensions: {})",
            lang.name(),
            lang.extensions().join(", ")
        );
    }
    Ok(())
}
