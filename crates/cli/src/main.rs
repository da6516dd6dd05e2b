//! specweave command-line tool.
//!
//! Provides the git merge driver for YAML record files, reference
//! resolution and validation over task / spec-item records, identifier
//! generation, and generating / checking configuration files.

mod prompt;
mod records;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use specweave_core::merge::{ConflictPolicy, ConflictPrompt, DocumentPaths, DriverOutcome, MergeDriver};
use specweave_core::{AppConfig, RecordId};

use crate::prompt::TerminalPrompt;
use crate::records::RecordFiles;

/// Project-local configuration file name.
const LOCAL_CONFIG: &str = ".specweave.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// specweave command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "specweave",
    version,
    about = "Resolve record references and merge YAML records semantically"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to ./.specweave.toml,
    /// then the user config directory, then built-in defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Three-way merge of YAML records; invoked by git as a merge driver.
    MergeDriver {
        /// Common ancestor version (%O).
        base: PathBuf,
        /// Current branch version (%A).
        ours: PathBuf,
        /// Incoming branch version (%B).
        theirs: PathBuf,

        /// Where to write the result. Defaults to the ours file, as git expects.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conflict policy: ours, theirs, or fail-closed.
        #[arg(long)]
        policy: Option<ConflictPolicy>,

        /// Prompt for each conflict when a terminal is attached.
        #[arg(short, long)]
        interactive: bool,

        /// Print the outcome as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Resolve an @alias, @ULID or @ULID-prefix reference.
    Resolve {
        /// Reference to resolve; the leading '@' is optional.
        reference: String,

        #[command(flatten)]
        files: RecordFiles,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check that every reference in the given records resolves.
    Validate {
        #[command(flatten)]
        files: RecordFiles,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the shortest unique display prefix of identifiers.
    Prefix {
        /// Identifiers to shorten.
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        files: RecordFiles,

        /// Minimum prefix length (defaults to index.min_prefix_len).
        #[arg(long)]
        min_len: Option<usize>,
    },

    /// Generate new record identifiers.
    NewId {
        /// Number of identifiers to generate.
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = LOCAL_CONFIG)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    CheckConfig,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is needed before logging starts, since it carries the level.
    // check-config and init must still run against a broken file.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(_) if matches!(cli.command, Commands::CheckConfig | Commands::Init { .. }) => {
            AppConfig::default()
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<ExitCode> {
    let min_len = config.index.min_prefix_len;

    match cli.command {
        Commands::MergeDriver {
            base,
            ours,
            theirs,
            output,
            policy,
            interactive,
            json,
        } => cmd_merge_driver(
            config,
            DocumentPaths::new(base, ours, theirs),
            output,
            policy,
            interactive,
            json,
        ),
        Commands::Resolve {
            reference,
            files,
            json,
        } => records::cmd_resolve(&reference, &files, min_len, json).map(|()| ExitCode::SUCCESS),
        Commands::Validate { files, json } => {
            records::cmd_validate(&files, min_len, json).map(|()| ExitCode::SUCCESS)
        }
        Commands::Prefix {
            ids,
            files,
            min_len: override_len,
        } => records::cmd_prefix(&ids, &files, override_len.unwrap_or(min_len))
            .map(|()| ExitCode::SUCCESS),
        Commands::NewId { count } => {
            for _ in 0..count {
                println!("{}", RecordId::generate());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { output } => cmd_init(&output).map(|()| ExitCode::SUCCESS),
        Commands::CheckConfig => cmd_check_config(cli.config.as_deref()).map(|()| ExitCode::SUCCESS),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// The config file to use: the explicit path, else the project-local file,
/// else the user config file, if either exists.
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("specweave").join("config.toml"))
        .filter(|path| path.exists())
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match config_path(explicit) {
        Some(path) => AppConfig::load_and_validate(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_merge_driver(
    config: &AppConfig,
    paths: DocumentPaths,
    output: Option<PathBuf>,
    policy: Option<ConflictPolicy>,
    interactive: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut options = config.merge_options();
    if let Some(policy) = policy {
        options.policy = policy;
    }
    let output = output.unwrap_or_else(|| paths.ours.clone());
    let driver = MergeDriver::new(options);

    // git runs drivers without a terminal most of the time.
    let wants_prompt = interactive || config.merge.interactive;
    let attended = console::user_attended_stderr();
    if wants_prompt && !attended {
        tracing::info!("no terminal attached; skipping interactive resolution");
    }

    let report = if wants_prompt && attended {
        let mut prompt = TerminalPrompt::new();
        driver.run(&paths, &output, Some(&mut prompt as &mut dyn ConflictPrompt))?
    } else {
        driver.run(&paths, &output, None)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report.outcome)?);
    }

    // A clean merge stays quiet; git runs the driver once per file.
    if report.outcome == DriverOutcome::Clean {
        tracing::info!(output = %output.display(), "clean merge");
    } else {
        eprintln!("{}", style::outcome(&report.outcome, &output.display().to_string()));
    }

    Ok(ExitCode::from(report.outcome.exit_code()))
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let body = AppConfig::default()
        .to_toml_string()
        .context("failed to render default configuration")?;
    let text = format!("# specweave configuration\n# See documentation for all available options.\n\n{body}");
    std::fs::write(output, text).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Register the merge driver:");
    println!("       git config merge.specweave.name \"specweave YAML record merge\"");
    println!("       git config merge.specweave.driver \"specweave merge-driver %O %A %B\"");
    println!("  2. Route record files to it in .gitattributes:");
    println!("       *.yaml merge=specweave");
    println!(
        "  3. Validate with: specweave check-config --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_check_config(explicit: Option<&Path>) -> Result<()> {
    let Some(path) = config_path(explicit) else {
        println!("No configuration file found; using built-in defaults.");
        return Ok(());
    };

    println!("Validating configuration: {}", path.display());
    println!();

    let config = AppConfig::load_from_file(&path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let schema = config.array_schema();
    println!();
    println!("Configuration summary:");
    println!("  Log level       : {}", config.log_level);
    println!("  Conflict policy : {}", config.merge.policy);
    println!(
        "  Interactive     : {}",
        if config.merge.interactive { "yes" } else { "no" }
    );
    println!("  Min prefix len  : {}", config.index.min_prefix_len);
    println!(
        "  Built-in arrays : {}",
        if config.arrays.builtin { "on" } else { "off" }
    );
    println!("  Declared arrays : {}", schema.len());
    println!();
    println!("Configuration is valid.");

    Ok(())
}
