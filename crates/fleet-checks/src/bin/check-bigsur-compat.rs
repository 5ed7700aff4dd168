//! Munki installcheck for macOS 11 Big Sur.
//!
//! Exit 0 when the Mac can upgrade, 1 when it cannot.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_checks::bigsur::{conditional_items_path, write_conditional_item};
use fleet_checks::{evaluate, MacProbe, SystemProbe};

#[derive(Parser)]
#[command(name = "check-bigsur-compat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check whether this Mac can upgrade to macOS 11 Big Sur", long_about = None)]
struct Cli {
    /// Suppress the per-check report; only the exit code is meaningful
    #[arg(short, long)]
    quiet: bool,

    /// Record the verdict as `bigsur_supported` in Munki's ConditionalItems.plist
    #[arg(long)]
    update_conditional_items: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    fleet_checks::init_logging(cli.verbose)?;

    let probe = MacProbe;
    let report = evaluate(&probe).context("failed to inspect this Mac")?;

    if !cli.quiet {
        for line in &report.lines {
            println!("{}", line.render());
        }
    }

    if cli.update_conditional_items && probe.munki_installed() {
        let path = conditional_items_path(&probe);
        write_conditional_item(&path, report.supported)
            .with_context(|| format!("failed to update {}", path.display()))?;
    }

    Ok(if report.supported {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
