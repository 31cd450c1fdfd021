//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Berth - generates and maintains Bazel BUILD files for Go code
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate and update build files
    Update(GenerateArgs),

    /// Like update, but also squash deprecated rules
    Fix(GenerateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Directories to update, recursively (defaults to the repository root)
    pub dirs: Vec<PathBuf>,

    /// Comma-separated list of valid build file names; the first is used
    /// for new files
    #[arg(long = "build-file-name", value_delimiter = ',')]
    pub build_file_names: Vec<String>,

    /// Comma-separated list of build tags to consider true
    #[arg(long)]
    pub build_tags: Option<String>,

    /// Import path of the repository root
    #[arg(long, env = "BERTH_PREFIX")]
    pub prefix: Option<String>,

    /// Path to the repository root (defaults to the nearest directory with
    /// a WORKSPACE file)
    #[arg(long)]
    pub repo_root: Option<PathBuf>,

    /// Repository root that doesn't need discovery (may be repeated)
    #[arg(long = "known-import")]
    pub known_imports: Vec<String>,

    /// What to do with generated files: print, fix, diff
    #[arg(long, default_value = "fix")]
    pub mode: String,

    /// How to resolve imports outside the prefix: external, vendored
    #[arg(long)]
    pub external: Option<String>,

    /// How to handle .proto files: default, disable, legacy
    #[arg(long)]
    pub proto: Option<String>,

    /// Build file layout: hierarchical, flat
    #[arg(long)]
    pub structure: Option<String>,

    /// Source language
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
