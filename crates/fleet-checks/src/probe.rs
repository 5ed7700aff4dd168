//! Read-only queries against the running Mac.
//!
//! Everything goes through [`SystemProbe`] so the check logic can be tested
//! with canned answers. [`MacProbe`] shells out to the stock macOS tools.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{CheckError, Result};

const SYSTEM_VERSION_PLIST: &str = "/System/Library/CoreServices/SystemVersion.plist";
const MUNKI_CORE_PKG_ID: &str = "com.googlecode.munki.core";

/// Product name and version from `SystemVersion.plist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemVersion {
    pub product_name: String,
    pub product_version: String,
}

/// Queries used by the compatibility checks.
pub trait SystemProbe {
    /// `hw.model`, e.g. `MacBookPro15,2`.
    fn model(&self) -> Result<String>;

    /// Intel board-id, or the Apple Silicon device id when there is none.
    fn board_id(&self) -> Result<Option<String>>;

    fn is_virtual_machine(&self) -> bool;

    fn system_version(&self) -> Result<SystemVersion>;

    fn munki_installed(&self) -> bool;

    /// `ManagedInstallDir` from Munki's preferences, if set.
    fn managed_install_dir(&self) -> Option<PathBuf>;
}

/// Probe backed by `sysctl`, `ioreg`, `pkgutil` and `defaults`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacProbe;

fn run(program: &str, args: &[&str]) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(command = %command, "running");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| CheckError::CommandSpawn {
            command: command.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(CheckError::CommandFailed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl SystemProbe for MacProbe {
    fn model(&self) -> Result<String> {
        Ok(run("/usr/sbin/sysctl", &["-n", "hw.model"])?.trim().to_string())
    }

    fn board_id(&self) -> Result<Option<String>> {
        let output = run(
            "/usr/sbin/ioreg",
            &["-c", "IOPlatformExpertDevice", "-d", "2"],
        )?;
        Ok(parse_ioreg_board_id(&output))
    }

    fn is_virtual_machine(&self) -> bool {
        let cpu_flag = run("/usr/sbin/sysctl", &["-n", "machdep.cpu.features"])
            .map(|features| features.split_whitespace().any(|f| f == "VMM"))
            .unwrap_or(false);
        let hv_flag = run("/usr/sbin/sysctl", &["-n", "kern.hv_vmm_present"])
            .map(|v| v.trim() == "1")
            .unwrap_or(false);
        cpu_flag || hv_flag
    }

    fn system_version(&self) -> Result<SystemVersion> {
        read_system_version(Path::new(SYSTEM_VERSION_PLIST))
    }

    fn munki_installed(&self) -> bool {
        run("/usr/sbin/pkgutil", &["--pkg-info", MUNKI_CORE_PKG_ID]).is_ok()
    }

    fn managed_install_dir(&self) -> Option<PathBuf> {
        run(
            "/usr/bin/defaults",
            &[
                "read",
                "/Library/Preferences/ManagedInstalls",
                "ManagedInstallDir",
            ],
        )
        .ok()
        .map(|dir| dir.trim().to_string())
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
    }
}

/// Read `ProductName` / `ProductVersion` from a SystemVersion plist.
pub fn read_system_version(path: &Path) -> Result<SystemVersion> {
    let value = plist::Value::from_file(path)?;
    let dict = value
        .as_dictionary()
        .ok_or_else(|| CheckError::UnexpectedPlist {
            path: path.display().to_string(),
            reason: "top level is not a dictionary".to_string(),
        })?;

    let field = |key: &str| {
        dict.get(key)
            .and_then(plist::Value::as_string)
            .map(str::to_string)
            .ok_or_else(|| CheckError::UnexpectedPlist {
                path: path.display().to_string(),
                reason: format!("missing {key}"),
            })
    };

    Ok(SystemVersion {
        product_name: field("ProductName")?,
        product_version: field("ProductVersion")?,
    })
}

/// Pull the board-id (Intel) or first `compatible` entry (Apple Silicon) out
/// of `ioreg -c IOPlatformExpertDevice -d 2` output.
pub fn parse_ioreg_board_id(output: &str) -> Option<String> {
    let mut board_id = None;
    let mut device_id = None;

    for line in output.lines() {
        if line.contains("\"board-id\"") {
            board_id = first_bracketed_string(line);
        } else if line.contains("\"compatible\"") {
            device_id = first_bracketed_string(line);
        }
    }

    board_id.or(device_id)
}

/// `"key" = <"a","b">` yields `a`.
fn first_bracketed_string(line: &str) -> Option<String> {
    let data = line.rsplit('<').next()?.trim().trim_end_matches('>');
    let first = data.split("\",\"").next()?.trim_matches('"');
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
