//! Command-line surface over the dispatch engine.
//!
//! Every subcommand runs discovery first and works off the resulting
//! immutable store. `dispatch` prints the envelope as the sole JSON
//! document on stdout and exits 0 iff the call succeeded; the generator
//! subcommands (`toolgen`, `skillgen`) regenerate protocol artifacts from
//! the contracts.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::Value;

use crate::adapters::skillgen::{self, SkillGenOptions, SkillStatus};
use crate::adapters::toolgen;
use crate::capabilities::builtin_bindings;
use crate::dispatch::Dispatcher;

#[derive(Parser)]
#[command(name = "opsbox")]
#[command(about = "Contract-driven capability dispatch", long_about = None)]
#[command(version)]
struct Cli {
    /// Plugin root holding one contract.v1.json per capability.
    #[arg(long, global = true, default_value = "capabilities")]
    contracts_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one capability call and print its envelope.
    #[command(group(ArgGroup::new("payload").required(true)))]
    Dispatch {
        /// Capability id (domain.action).
        #[arg(long)]
        capability: String,

        /// Input JSON payload as a string.
        #[arg(long, group = "payload")]
        input_json: Option<String>,

        /// Path to a JSON file with the input payload.
        #[arg(long, group = "payload")]
        input_file: Option<PathBuf>,
    },
    /// List registered capability ids.
    List,
    /// Generate tool-call descriptor files from the contracts.
    Toolgen {
        /// Output directory for <id>.json descriptor files.
        #[arg(long, default_value = "tools")]
        out_dir: PathBuf,
    },
    /// Generate SKILL.md stubs from the contracts.
    Skillgen {
        /// Output directory holding one <slug>/SKILL.md per skill.
        #[arg(long, default_value = "skills")]
        out_dir: PathBuf,

        /// Overwrite existing SKILL.md files.
        #[arg(long)]
        force: bool,

        /// Print what would be generated without writing files.
        #[arg(long)]
        dry_run: bool,

        /// Generate for a single capability id only.
        #[arg(long)]
        capability: Option<String>,
    },
}

fn load_payload(input_json: Option<String>, input_file: Option<PathBuf>) -> Result<Value> {
    match (input_json, input_file) {
        (Some(_), Some(_)) => bail!("provide only one of --input-json or --input-file"),
        (Some(text), None) => {
            serde_json::from_str(&text).context("invalid JSON in --input-json")
        }
        (None, Some(path)) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON in {}", path.display()))
        }
        (None, None) => bail!("missing input payload (--input-json or --input-file)"),
    }
}

/// Parse arguments, run discovery, and execute one subcommand.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let dispatcher = Dispatcher::discover_from(&cli.contracts_dir, builtin_bindings())
        .context("capability discovery failed")?;

    match cli.command {
        Commands::Dispatch {
            capability,
            input_json,
            input_file,
        } => {
            let payload = load_payload(input_json, input_file)?;
            let envelope = dispatcher.dispatch(&capability, payload);
            print!("{}", envelope.to_json_pretty());
            Ok(if envelope.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::List => {
            for id in dispatcher.store().ids() {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Toolgen { out_dir } => {
            let written = toolgen::write_descriptors(dispatcher.store(), &out_dir)
                .context("failed to write tool descriptors")?;
            println!("{} descriptors written to {}", written.len(), out_dir.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Skillgen {
            out_dir,
            force,
            dry_run,
            capability,
        } => {
            let opts = SkillGenOptions {
                out_dir,
                force,
                dry_run,
                only: capability,
            };
            let actions = skillgen::generate_all(dispatcher.store(), &opts)
                .context("failed to generate skill stubs")?;

            let mut generated = 0;
            let mut skipped = 0;
            for action in &actions {
                match &action.status {
                    SkillStatus::Created => {
                        println!("  create  {}", action.path.display());
                    }
                    SkillStatus::Overwritten => {
                        println!("  overwrite  {}", action.path.display());
                    }
                    SkillStatus::SkippedExists => {
                        println!(
                            "  skip  {:<30}  (exists, use --force to overwrite)",
                            action.slug
                        );
                    }
                    SkillStatus::SkippedCovered(covered_by) => {
                        println!("  skip  {:<30}  (covered by {})", action.slug, covered_by);
                    }
                    SkillStatus::WouldWrite => {
                        println!("  would write  {}", action.path.display());
                        if let Some(content) = &action.content {
                            println!("  --- {} ---", action.slug);
                            println!("{content}");
                        }
                    }
                }
                if action.generated() {
                    generated += 1;
                } else {
                    skipped += 1;
                }
            }
            println!("\n{generated} generated, {skipped} skipped");
            Ok(ExitCode::SUCCESS)
        }
    }
}
