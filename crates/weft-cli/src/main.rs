//! Weft command-line runner.
//!
//! Loads a task manifest once at startup and drives the reactor until no
//! task is live (or forever, with `--linger`). A manifest that fails to
//! load is reported and the process exits before the loop ever runs.

mod output;

use clap::{Parser, Subcommand};
use output::{resolve_color_choice, StyledOutput};
use std::path::PathBuf;
use std::time::Duration;
use weft_demos::{Console, ManifestHost};
use weft_engine::{Capabilities, Reactor, ReactorConfig, ScriptHost};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Cooperative scheduler for script-driven tasks", long_about = None)]
#[command(version)]
struct Cli {
    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task manifest until every task finishes
    Run {
        /// Manifest file, one task per line
        script: PathBuf,

        /// Polling granularity in milliseconds
        #[arg(long, default_value_t = 50)]
        granularity_ms: u64,

        /// Maximum number of live tasks
        #[arg(long)]
        max_tasks: Option<usize>,

        /// Keep polling at idle instead of exiting
        #[arg(long)]
        linger: bool,

        /// Print scheduler counters as JSON on exit
        #[arg(long)]
        stats: bool,

        /// Welcome constant exposed to every task
        #[arg(long, default_value = "Hello World!")]
        welcome: String,
    },

    /// List the programs a manifest line may declare
    Programs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    match cli.command {
        Commands::Run {
            script,
            granularity_ms,
            max_tasks,
            linger,
            stats,
            welcome,
        } => {
            let host = ManifestHost::new(Console::stdout());
            let root = match host.load(&script) {
                Ok(program) => program,
                Err(err) => {
                    out.error_line(&err.to_string());
                    std::process::exit(1);
                }
            };

            let config = ReactorConfig {
                granularity: Duration::from_millis(granularity_ms.max(1)),
                max_tasks,
                linger,
            };
            let mut reactor = Reactor::new(config, Capabilities::new(welcome));
            reactor.spawn(root, Vec::new());
            reactor.run();

            if stats {
                out.plain_line(&serde_json::to_string_pretty(&reactor.stats())?);
            }
        }

        Commands::Programs => {
            out.info_line("manifest line formats:");
            out.plain_line("  greeter                            print the welcome constant");
            out.plain_line("  sleeper <seconds> [label]          sleep once, then announce");
            out.plain_line("  pinger <seconds> <count> [label]   announce on a fixed period");
            out.plain_line("  faulty <message> [seconds]         fail after an optional sleep");
            out.plain_line("  # comment lines and blank lines are ignored");
        }
    }

    Ok(())
}
