//! CLI commands implementation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::extract;
use crate::fetch::{chromium::ChromiumLauncher, FetchDriver};
use crate::models::{ChangeMap, Snapshot};
use crate::snapshot::{safe_write, SnapshotStore};
use crate::{diff, report, sources};

#[derive(Parser)]
#[command(name = "skatewatch")]
#[command(about = "Skateboard hardware sale tracker")]
#[command(version)]
pub struct Cli {
    /// Data directory for snapshot, report, and debug dumps
    #[arg(long, global = true, env = "SKATEWATCH_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all sources, diff against the last snapshot, write the report
    Run {
        /// Save raw fetched markup per source for selector debugging
        #[arg(long)]
        debug_dumps: bool,

        /// Run the browser with a visible window
        #[arg(long)]
        no_headless: bool,
    },

    /// Re-render the report from the stored snapshot without fetching
    Render,

    /// List the configured sources
    Sources,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::new(cli.data_dir);

    match cli.command {
        Commands::Run {
            debug_dumps,
            no_headless,
        } => {
            settings.debug_dumps = debug_dumps;
            settings.headless = !no_headless;
            cmd_run(&settings).await
        }
        Commands::Render => cmd_render(&settings),
        Commands::Sources => cmd_sources(),
    }
}

/// The full tracker pipeline: fetch, extract, diff, persist, report.
///
/// Individual source failures degrade to missing partitions; the run itself
/// always completes and exits zero.
async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;

    let store = SnapshotStore::new(settings.snapshot_path());
    let previous = store.load();

    let driver = FetchDriver::new(ChromiumLauncher::new(settings.headless));

    let mut current = Snapshot::new();
    for source in sources::configured() {
        let key = source.partition_key();
        println!("{} {key}", style("Scraping").cyan().bold());

        let html = match driver.fetch(source.url).await {
            Ok(html) => html,
            Err(e) => {
                // The partition stays absent from the current snapshot, so
                // the diff stays quiet about its previous items this run.
                error!("fetch failed for {key}: {e}");
                println!("  {}", style(format!("failed: {e}")).red());
                continue;
            }
        };

        if settings.debug_dumps {
            let dump_path = settings.debug_dump_path(source.store, source.category);
            if !safe_write(&dump_path, &html) {
                warn!("could not save debug dump for {key}");
            }
        }

        let items = extract::parse(source.store, &html, source.category);
        println!("  {} items", style(items.len()).green());
        current.insert(key, items);
    }

    let changes = diff::compare(&previous, &current);
    if changes.is_empty() {
        info!("no changes detected");
        println!("{}", style("No changes detected").dim());
    } else {
        let total: usize = changes.values().map(Vec::len).sum();
        println!(
            "{} {total} changes across {} partitions",
            style("Changes:").yellow().bold(),
            changes.len()
        );
        for (key, events) in &changes {
            info!("{key}: {} changes", events.len());
        }
    }

    if !store.save(&current) {
        error!("snapshot save failed");
    }

    let page = report::render(&current, &changes);
    if safe_write(&settings.report_path(), &page) {
        println!(
            "{} {}",
            style("Report:").green().bold(),
            settings.report_path().display()
        );
    } else {
        error!("report write failed");
    }

    Ok(())
}

/// Rebuild the report page from the stored snapshot.
fn cmd_render(settings: &Settings) -> anyhow::Result<()> {
    let store = SnapshotStore::new(settings.snapshot_path());
    let snapshot = store.load();
    let total: usize = snapshot.values().map(Vec::len).sum();

    let page = report::render(&snapshot, &ChangeMap::new());
    if safe_write(&settings.report_path(), &page) {
        println!(
            "{} {} products -> {}",
            style("Rendered").green().bold(),
            total,
            settings.report_path().display()
        );
        Ok(())
    } else {
        anyhow::bail!("could not write {}", settings.report_path().display())
    }
}

fn cmd_sources() -> anyhow::Result<()> {
    for source in sources::configured() {
        println!(
            "{:24} {}",
            style(source.partition_key()).cyan(),
            source.url
        );
    }
    Ok(())
}
