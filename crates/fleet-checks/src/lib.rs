//! Fleet Checks: pre-flight scripts for Munki-managed Macs
//!
//! - [`bigsur`]: macOS 11 upgrade eligibility (installcheck script)
//! - [`ccda`]: Creative Cloud Desktop App removal guard (uninstall check)
//!
//! Machine state is read through [`probe::SystemProbe`] so both checks can be
//! exercised off-device.

pub mod bigsur;
pub mod ccda;
pub mod error;
pub mod probe;

pub use bigsur::{evaluate, CheckLine, CompatReport, OsVersion};
pub use ccda::{remaining_apps, AdobeApp};
pub use error::{CheckError, Result};
pub use probe::{MacProbe, SystemProbe, SystemVersion};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Plain stderr logging for the check binaries; stdout is the script output.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
