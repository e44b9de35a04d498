use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use svn_tag::{util, BuildInfo, Config, SvnCommandClient, TagSequencer, TagStatus};

/// Tag every module of a successful build at the exact revision that was
/// built, replacing any previous tag at the destination.
#[derive(Debug, Parser)]
#[command(name = "svn-tag", version)]
struct Cli {
    /// Revision ledger recorded by the build (one "URL/REV" line per module)
    #[arg(long, default_value = "revision.txt")]
    ledger: PathBuf,

    /// Workspace root holding the module checkouts
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Config file path (default: ~/.svn-tag/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the tag destination template
    #[arg(long)]
    tag_base_url: Option<String>,

    /// Copy working copies with externals pinned to their checked-out revisions
    #[arg(long)]
    peg_externals: bool,

    /// Seconds to wait between deleting old tags and copying new ones
    #[arg(long)]
    wait_secs: Option<u64>,

    /// Custom data directory (default: ~/.svn-tag)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    util::init_data_dir(cli.data_dir.clone());

    // Initialize logging to file (~/.svn-tag/logs/svn-tag.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    if let Some(tag_base_url) = cli.tag_base_url {
        config.spec.tag_base_url = tag_base_url;
    }
    if cli.peg_externals {
        config.spec.peg_externals = true;
    }
    if let Some(wait_secs) = cli.wait_secs {
        config.spec.wait_before_tagging = match wait_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
    }

    if config.modules.is_empty() {
        let config_file = cli
            .config
            .clone()
            .unwrap_or_else(util::config_path);
        bail!(
            "No modules configured; add [[module]] entries to {}",
            config_file.display()
        );
    }

    // Auth and ledger problems stop the run before any network call.
    let credentials = config
        .credentials
        .context("No Subversion credentials configured; set [auth] in the config file")?;

    let context = BuildInfo::load(&cli.ledger, cli.workspace, config.modules)
        .context("Failed to read the revision ledger")?;

    let client = SvnCommandClient::new(config.svn_path, credentials);
    let sequencer = TagSequencer::new(config.spec, config.system_properties);

    let report = sequencer.run(&context, &client);
    for line in &report.log {
        println!("{line}");
    }

    if report.success() {
        Ok(())
    } else {
        let failed = report
            .outcomes
            .iter()
            .filter(|o| matches!(o.status, TagStatus::Failed(_)))
            .count();
        bail!("Tagging failed ({failed} module(s) failed)");
    }
}
