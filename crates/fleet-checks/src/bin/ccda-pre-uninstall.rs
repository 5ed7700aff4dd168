//! Munki uninstall check for the Creative Cloud Desktop App.
//!
//! Exit 1 while Creative Cloud products are still installed, 0 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_checks::ccda::{remaining_apps, ADOBE_UNINSTALL_DIR};

#[derive(Parser)]
#[command(name = "ccda-pre-uninstall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Block CCDA removal while Creative Cloud apps remain", long_about = None)]
struct Cli {
    /// Directory holding Adobe uninstaller bundles
    #[arg(long, default_value = ADOBE_UNINSTALL_DIR)]
    uninstall_dir: PathBuf,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    fleet_checks::init_logging(cli.verbose)?;

    let apps = remaining_apps(&cli.uninstall_dir)
        .with_context(|| format!("failed to read {}", cli.uninstall_dir.display()))?;

    if apps.is_empty() {
        println!("No Adobe apps installed. CCDA can be removed.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("The following items still need to be uninstalled before CCDA can be removed:");
    for app in &apps {
        println!("{}", app.sap_code);
    }
    Ok(ExitCode::FAILURE)
}
