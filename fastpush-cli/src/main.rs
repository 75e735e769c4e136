//! fastpush CLI - push recompiled Lambda code to a deployed CDK stack.
//!
//! # Commands
//!
//! - `fastpush run-update <stack> [function-id]` - Recompile and upload one or all functions
//! - `fastpush cache show` - Show the cached stack view for a branch
//! - `fastpush cache clear` - Drop cached stack views
//! - `fastpush inspect <template>` - List upload infos in a synthesized template
//! - `fastpush completions <shell>` - Generate shell completions

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod error;

use commands::{cache, inspect, run_update};
use error::CliResult;

static QUIET: AtomicBool = AtomicBool::new(false);

/// fastpush - update Lambda code without redeploying the stack
#[derive(Parser)]
#[command(name = "fastpush")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Recompile Lambda functions of a deployed CDK stack and push their code")]
#[command(long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = format!(
    "{}\n  {} fastpush run-update lib/stack.ts CreateUserFunction\n  {} fastpush run-update lib/stack.ts\n  {} BRANCH=develop fastpush cache clear\n",
    "Examples:".bright_cyan().bold(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompile and upload the code of one function, or of every function
    #[command(alias = "u")]
    RunUpdate(RunUpdateArgs),

    /// Inspect or drop the per-branch stack cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// List the upload infos found in a synthesized template
    Inspect {
        /// Path to a `*.template.json` file
        template: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct RunUpdateArgs {
    /// Stack entry file, e.g. lib/stack.ts
    stack: PathBuf,

    /// Logical or physical id of the function; all functions when omitted
    function_id: Option<String>,

    /// Use an already synthesized template instead of running cdk synth
    #[arg(long, requires = "stack_name")]
    template: Option<PathBuf>,

    /// Deployed stack name (required with --template)
    #[arg(long)]
    stack_name: Option<String>,

    /// Branch to use instead of the checked out one
    #[arg(long, env = "BRANCH")]
    branch: Option<String>,

    /// Ignore the branch cache and rebuild it
    #[arg(long)]
    refresh: bool,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// AWS profile
    #[arg(long)]
    profile: Option<String>,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show what is cached for a branch
    Show {
        /// Branch (defaults to the checked out one)
        #[arg(long, env = "BRANCH")]
        branch: Option<String>,
    },

    /// Delete cached stack views
    Clear {
        /// Branch (defaults to the checked out one)
        #[arg(long, env = "BRANCH")]
        branch: Option<String>,

        /// Delete the cache of every branch (ignores --branch)
        #[arg(long)]
        all: bool,
    },
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

pub(crate) fn success(msg: &str) {
    if !QUIET.load(Ordering::Relaxed) {
        println!("  {} {}", "✓".green().bold(), msg.green());
    }
}

pub(crate) fn warn(msg: &str) {
    if !QUIET.load(Ordering::Relaxed) {
        println!("  {} {}", "⚠".yellow().bold(), msg.yellow());
    }
}

pub(crate) fn info(msg: &str) {
    if !QUIET.load(Ordering::Relaxed) {
        println!("  {} {}", "→".cyan(), msg);
    }
}

pub(crate) fn failure(msg: &str) {
    eprintln!("  {} {}", "✗".red().bold(), msg.red());
}

fn init_logging(cli: &Cli) {
    let mut config = fastpush_log::LogConfig::from_env();
    if cli.verbose {
        config = config.verbose();
    }
    if cli.quiet {
        config = config.quiet();
    }
    if cli.no_color {
        config = config.no_color();
    }
    fastpush_log::init_with(config);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    QUIET.store(cli.quiet, Ordering::Relaxed);
    init_logging(&cli);

    let result: CliResult<()> = match cli.command {
        Commands::RunUpdate(args) => {
            run_update::run(run_update::RunUpdateOptions {
                stack: args.stack,
                function_id: args.function_id,
                template: args.template,
                stack_name: args.stack_name,
                branch: args.branch,
                refresh: args.refresh,
                region: args.region,
                profile: args.profile,
            })
            .await
        }

        Commands::Cache { command } => match command {
            CacheCommands::Show { branch } => cache::show(branch).await,
            CacheCommands::Clear { branch, all } => cache::clear(branch, all).await,
        },

        Commands::Inspect { template } => inspect::run(&template),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "fastpush", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
        std::process::exit(1);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_template_requires_stack_name() {
        let parsed = Cli::try_parse_from([
            "fastpush",
            "run-update",
            "lib/stack.ts",
            "--template",
            "cdk.out/Stack.template.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_function_id_is_optional() {
        let cli = Cli::try_parse_from(["fastpush", "run-update", "lib/stack.ts"]).unwrap();
        match cli.command {
            Commands::RunUpdate(args) => assert!(args.function_id.is_none()),
            _ => panic!("expected run-update"),
        }
    }
}
