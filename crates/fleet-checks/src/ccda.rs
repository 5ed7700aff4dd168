//! Creative Cloud Desktop App removal guard.
//!
//! Adobe drops one uninstaller bundle per installed product into
//! [`ADOBE_UNINSTALL_DIR`], named `<SAP code>_<version parts>.app`. CCDA may
//! only be removed once none of the Creative Cloud products remain.

use std::path::Path;

use tracing::debug;

use crate::error::Result;

pub const ADOBE_UNINSTALL_DIR: &str = "/Library/Application Support/Adobe/Uninstall";

/// Product key to Adobe SAP code.
pub const SAP_CODES: &[(&str, &str)] = &[
    ("after_effects", "AEFT"),
    ("animate", "FLPR"),
    ("audition", "AUDT"),
    ("bridge", "KBRG"),
    ("character_animator", "CHAR"),
    ("dimension", "ESHR"),
    ("dreamweaver", "DRWV"),
    ("illustrator", "ILST"),
    ("incopy", "AICY"),
    ("indesign", "IDSN"),
    ("lightroom", "LRCC"),
    ("lightroom_classic", "LTRM"),
    ("media_encoder", "AME"),
    ("photoshop", "PHSP"),
    ("prelude", "PRLD"),
    ("premiere_pro", "PPRO"),
    ("premiere_rush", "RUSH"),
    ("substance_alchemist", "SBSTA"),
    ("substance_designer", "SBSTD"),
    ("substance_painter", "SBSTP"),
    ("xd", "SPRK"),
];

/// An installed Creative Cloud product, as seen through its uninstaller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdobeApp {
    pub sap_code: String,
    pub version: String,
}

pub fn is_known_sap_code(code: &str) -> bool {
    SAP_CODES.iter().any(|(_, c)| *c == code)
}

/// `PHSP_22_0.app` becomes `PHSP` / `22.0`.
pub fn parse_uninstaller(file_name: &str) -> Option<AdobeApp> {
    let stem = file_name.strip_suffix(".app")?;
    let mut parts = stem.split('_');
    let sap_code = parts.next().filter(|c| !c.is_empty())?.to_string();
    let version = parts.collect::<Vec<_>>().join(".");
    Some(AdobeApp { sap_code, version })
}

/// Creative Cloud products whose uninstallers are still present in `dir`.
///
/// A missing directory means nothing is installed.
pub fn remaining_apps(dir: &Path) -> Result<Vec<AdobeApp>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut apps = Vec::new();
    for entry in entries {
        let name = entry?.file_name().to_string_lossy().into_owned();
        match parse_uninstaller(&name) {
            Some(app) if is_known_sap_code(&app.sap_code) => apps.push(app),
            _ => debug!(entry = %name, "not a Creative Cloud uninstaller"),
        }
    }
    apps.sort_by(|a, b| a.sap_code.cmp(&b.sap_code).then(a.version.cmp(&b.version)));
    Ok(apps)
}
