//! kiln: builds C++ projects described by a Lua project file.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::consts::PROJECT_FILE;

use crate::output::{OutputFormat, print_error};

/// kiln - incremental C++ builds with multiple profiles
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the project file
  #[arg(long, global = true, default_value = PROJECT_FILE)]
  file: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Profile to operate on (repeatable). Each command has its own default.
  #[arg(short, long = "profile", global = true)]
  profiles: Vec<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show targets, their artifacts per profile, and public headers
  Targets {
    /// Targets to show. Shows every target by default.
    targets: Vec<String>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Scan the project and write the build description
  Configure,

  /// Build targets. Builds every target for every profile by default.
  Build {
    targets: Vec<String>,
  },

  /// Build and run an executable
  Run {
    target: String,

    /// Arguments passed to the executable
    #[arg(last = true)]
    args: Vec<String>,
  },

  /// Build and run tests. Runs every test for every profile by default.
  Tests {
    tests: Vec<String>,
  },

  /// Install public targets and headers (dry run unless --force)
  Install(InstallArgs),

  /// Remove installed targets and headers (dry run unless --force)
  Uninstall(InstallArgs),

  /// Remove build output for the selected profiles
  Clean {
    /// Remove the whole build directory
    #[arg(long)]
    nuke: bool,

    /// Show what would be removed without removing anything
    #[arg(long)]
    dry_run: bool,
  },
}

#[derive(Args)]
pub struct InstallArgs {
  /// Targets or headers. Installs every public target and header by default.
  pub targets: Vec<String>,

  /// Copy or remove files. Without this flag only a dry run is done.
  #[arg(short, long)]
  pub force: bool,

  /// Installation directory for headers
  #[arg(short = 'I', long)]
  pub headers: Option<PathBuf>,

  /// Installation directory for libraries
  #[arg(short = 'L', long)]
  pub libraries: Option<PathBuf>,

  /// Installation directory for executables
  #[arg(short = 'X', long)]
  pub executables: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<ExitCode> {
  let file = cli.file;
  let profiles = cli.profiles;

  match cli.command {
    Commands::Targets { targets, output } => cmd::cmd_targets(&file, &targets, output),
    Commands::Configure => cmd::cmd_configure(&file),
    Commands::Build { targets } => cmd::cmd_build(&file, &targets, &profiles),
    Commands::Run { target, args } => cmd::cmd_run(&file, &target, &profiles, &args),
    Commands::Tests { tests } => cmd::cmd_tests(&file, &tests, &profiles),
    Commands::Install(args) => cmd::cmd_install(&file, &args, &profiles),
    Commands::Uninstall(args) => cmd::cmd_uninstall(&file, &args, &profiles),
    Commands::Clean { nuke, dry_run } => cmd::cmd_clean(&file, &profiles, nuke, dry_run),
  }
}
