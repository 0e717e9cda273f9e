//! `windmill-ts generate <output>`
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::catalog::windmill::WindmillClient;
use crate::config::{self, Config};
use crate::generate::{GenerateOptions, generate};
use crate::sections::{Progress, SectionState};
use crate::workspace::{self, Workspace};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Type-safe Windmill client for TypeScript
#[derive(Parser, Debug)]
#[command(name = "windmill-ts", version, args_conflicts_with_subcommands = true)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// `generate` is the default command
    #[command(flatten)]
    generate: GenerateArgs,

    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate the client
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    /// output path; `-` writes to stdout
    output: Option<String>,

    /// target workspace, defaults to the active Windmill CLI workspace
    #[arg(short, long)]
    workspace: Option<String>,

    /// remote base URL, bypassing the Windmill CLI store
    #[arg(long, env = "WM_REMOTE")]
    remote: Option<String>,

    /// workspace id on the remote (with --remote)
    #[arg(long, env = "WM_WORKSPACE")]
    workspace_id: Option<String>,

    /// API token (with --remote)
    #[arg(long, env = "WM_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let args = match self.cmd {
            Some(Command::Generate(args)) => args,
            None => self.generate,
        };
        let Some(output) = args.output.clone() else {
            bail!("missing <OUTPUT>; pass `-` to write to stdout");
        };
        let to_stdout = output == "-";

        let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
        let config = config::load(&cwd)?;
        warn_disabled_sections(&config);

        let workspace = resolve_workspace(&args, to_stdout)?;
        tracing::info!(remote = %workspace.remote, workspace = %workspace.workspace_id, "generating");
        let client = WindmillClient::new(&workspace.remote, &workspace.workspace_id, &workspace.token)?
            .with_retry(config.fetch_retry.clone())
            .with_concurrency(config.concurrency);

        let (tx, rx) = unbounded_channel();
        let printer = tokio::spawn(print_progress(rx, !to_stdout));
        let options = GenerateOptions { config: &config, progress: Some(tx) };

        let report = if to_stdout {
            let mut stdout = tokio::io::stdout();
            generate(&mut stdout, &cwd, options, &client).await?
        } else {
            let path = std::path::absolute(cwd.join(&output))?;
            let output_root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
            tokio::fs::create_dir_all(&output_root).await?;
            let mut file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            generate(&mut file, &output_root, options, &client).await?
        };
        printer.await?;

        if !report.is_success() {
            let failures = report.failures().collect::<Vec<_>>();
            for (section, error) in &failures {
                eprintln!("{} {section}: {error}", "✗".red());
            }
            bail!("{} section(s) failed to generate", failures.len());
        }
        if !to_stdout {
            eprintln!("{} wrote {output}", "✓".green());
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn warn_disabled_sections(config: &Config) {
    if !config.scripts.enabled {
        eprintln!("{}", "⚠️ Script generation is disabled in config".yellow());
    }
    if !config.flows.enabled {
        eprintln!("{}", "⚠️ Flow generation is disabled in config".yellow());
    }
}

/// Explicit flags win; otherwise the Windmill CLI store is consulted.
fn resolve_workspace(args: &GenerateArgs, quiet: bool) -> anyhow::Result<Workspace> {
    if let Some(remote) = &args.remote {
        let (Some(workspace_id), Some(token)) = (&args.workspace_id, &args.token) else {
            bail!("--remote needs both --workspace-id and --token");
        };
        return Ok(Workspace {
            remote: remote.clone(),
            workspace_id: workspace_id.clone(),
            name: args.workspace.clone().unwrap_or_else(|| workspace_id.clone()),
            token: token.clone(),
        });
    }

    let root: PathBuf = workspace::store_root();
    if args.workspace.is_none() && !quiet {
        if let Some(active) = workspace::active_workspace_name(&root)? {
            eprintln!("{}", format!("⚠️ Workspace name not provided, defaulting to \"{active}\"").yellow());
        }
    }
    let found = workspace::find_workspace(&root, args.workspace.as_deref())
        .with_context(|| format!("looked in {}", root.display()))?;
    Ok(found)
}

async fn print_progress(mut rx: UnboundedReceiver<Progress>, interactive: bool) {
    while let Some(Progress { section, state }) = rx.recv().await {
        if !interactive {
            continue;
        }
        let line = match &state {
            SectionState::Fetching => format!("{section}: fetching").dimmed(),
            SectionState::Transforming => format!("{section}: transforming").dimmed(),
            SectionState::Emitting => format!("{section}: emitting").dimmed(),
            SectionState::Done => format!("{section}: done").green(),
            SectionState::Errored(message) => format!("{section}: failed ({message})").red(),
        };
        eprintln!("{line}");
    }
}
