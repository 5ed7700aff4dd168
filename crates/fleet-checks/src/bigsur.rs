//! macOS 11 Big Sur upgrade eligibility.
//!
//! A Mac qualifies when it is a virtual machine, or when all of these hold:
//! its model is not on the unsupported list, its board-id (or Apple Silicon
//! device id) is on the supported list, and it currently runs at least 10.9
//! and below 10.16.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use tracing::info;

use crate::error::Result;
use crate::probe::SystemProbe;

/// Key written to Munki's ConditionalItems.plist.
pub const CONDITIONAL_ITEM_KEY: &str = "bigsur_supported";

const DEFAULT_MANAGED_INSTALL_DIR: &str = "/Library/Managed Installs";
const CONDITIONAL_ITEMS_FILE: &str = "ConditionalItems.plist";

/// Inclusive lower bound of the supported source OS window.
const MIN_SOURCE_VERSION: &str = "10.9";
/// Exclusive upper bound; 10.16 is how Big Sur reports itself to old tools.
const MAX_SOURCE_VERSION: &str = "10.16";

pub const UNSUPPORTED_MODELS: &[&str] = &[
    "iMac4,1", "iMac4,2", "iMac5,1", "iMac5,2", "iMac6,1", "iMac7,1", "iMac8,1", "iMac9,1",
    "iMac10,1", "iMac11,1", "iMac11,2", "iMac11,3", "iMac12,1", "iMac12,2", "iMac13,1",
    "iMac13,2", "iMac14,1", "iMac14,2", "MacBook1,1", "MacBook2,1", "MacBook3,1", "MacBook4,1",
    "MacBook5,1", "MacBook5,2", "MacBook6,1", "MacBook7,1", "MacBookAir1,1", "MacBookAir2,1",
    "MacBookAir3,1", "MacBookAir3,2", "MacBookAir4,1", "MacBookAir4,2", "MacBookAir5,1",
    "MacBookAir5,2", "MacBookPro1,1", "MacBookPro1,2", "MacBookPro2,1", "MacBookPro2,2",
    "MacBookPro3,1", "MacBookPro4,1", "MacBookPro5,1", "MacBookPro5,2", "MacBookPro5,3",
    "MacBookPro5,4", "MacBookPro5,5", "MacBookPro6,1", "MacBookPro6,2", "MacBookPro7,1",
    "MacBookPro8,1", "MacBookPro8,2", "MacBookPro8,3", "MacBookPro9,1", "MacBookPro9,2",
    "MacBookPro10,1", "MacBookPro10,2", "Macmini1,1", "Macmini2,1", "Macmini3,1", "Macmini4,1",
    "Macmini5,1", "Macmini5,2", "Macmini5,3", "Macmini6,1", "Macmini6,2", "MacPro1,1",
    "MacPro2,1", "MacPro3,1", "MacPro4,1", "MacPro5,1", "Xserve1,1", "Xserve2,1", "Xserve3,1",
];

/// Board ids and Apple Silicon device ids listed by the Big Sur installer.
pub const SUPPORTED_BOARD_IDS: &[&str] = &[
    "J132AP", "J137AP", "J140AAP", "J140KAP", "J152FAP", "J160AP", "J174AP", "J185AP",
    "J185FAP", "J213AP", "J214KAP", "J215AP", "J223AP", "J230KAP", "J680AP", "J780AP",
    "X589AMLUAP", "X589ICLYAP", "X86LEGACYAP", "J273aAP", "J273AP", "J274AP", "J293AP",
    "J313AP", "T485AP",
    "Mac-06F11F11946D27C5", "Mac-06F11FD93F0323C5", "Mac-0CFF9C7C2B63DF8D",
    "Mac-112818653D3AABFC", "Mac-112B0A653D3AAB9C", "Mac-189A3D4F975D5FFC",
    "Mac-1E7E29AD0135F9BC", "Mac-226CB3C6A851A671", "Mac-27AD2F918AE68F61",
    "Mac-2BD1B31983FE1663", "Mac-35C1E88140C3E6CF", "Mac-35C5E08120C7EEAF",
    "Mac-36B6B6DA9CFCD881", "Mac-3CBD00234E554E41", "Mac-42FD25EABCABB274",
    "Mac-473D31EABEB93F9B", "Mac-4B682C642B45593E", "Mac-50619A408DB004DA",
    "Mac-53FDB3D8DB8CA971", "Mac-551B86E5744E2388", "Mac-564FBA6031E5946A",
    "Mac-5A49A77366F81C72", "Mac-5F9802EFE386AA28", "Mac-63001698E7A34814",
    "Mac-65CE76090165799A", "Mac-66E35819EE2D0D05", "Mac-6FEBD60817C77D8A",
    "Mac-747B1AEFF11738BE", "Mac-77F17D7DA9285301", "Mac-7BA5B2D9E42DDD94",
    "Mac-7BA5B2DFE22DDD8C", "Mac-7DF21CB3ED6977E5", "Mac-81E3E92DD6088272",
    "Mac-827FAC58A8FDFA22", "Mac-827FB448E656EC26", "Mac-87DCB00F4AD77EEA",
    "Mac-90BE64C3CB5A9AEB", "Mac-937A206F2EE63C01", "Mac-937CB26E2E02BB01",
    "Mac-9394BDF4BF862EE7", "Mac-9AE82516C7C6B903", "Mac-9F18E312C5C2BF0B",
    "Mac-A369DDC4E67F1C45", "Mac-A5C67F76ED83108C", "Mac-A61BADE1FDAD7B05",
    "Mac-AA95B1DDAB278B95", "Mac-AF89B6D9451A490B", "Mac-B4831CEBD52A0C4C",
    "Mac-B809C3757DA9BB8D", "Mac-BE088AF8C5EB4FA2", "Mac-BE0E8AC46FE800CC",
    "Mac-C6F71043CEAA02A6", "Mac-CAD6701F7CEA0921", "Mac-CF21D135A7D34AA6",
    "Mac-CFF7D910A743CAAF", "Mac-DB15BD556843C820", "Mac-E1008331FDC96864",
    "Mac-E43C1C25D4880AD6", "Mac-E7203C0F68AA0004", "Mac-EE2EBD4B90B839A8",
    "Mac-F305150B0C7DEEEF", "Mac-F60DEB81FF30ACF6", "Mac-FA842E06C61E91C5",
    "Mac-FFE5EF870D7BA81A",
];

/// Result of one check, rendered as an aligned status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub label: &'static str,
    pub detail: String,
    pub passed: bool,
}

impl CheckLine {
    fn new(label: &'static str, detail: String, passed: bool) -> Self {
        Self {
            label,
            detail,
            passed,
        }
    }

    pub fn render(&self) -> String {
        let status = if self.passed { "OK" } else { "Failed" };
        format!("{:>14}: {:<40} [{}]", self.label, self.detail, status)
    }
}

/// Outcome of all checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatReport {
    pub lines: Vec<CheckLine>,
    pub virtual_machine: bool,
    pub supported: bool,
}

/// Dotted numeric version compared component-wise, missing parts as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsVersion(Vec<u32>);

impl OsVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Whether `version` is inside the window Big Sur can upgrade from.
pub fn is_upgradable_version(version: &str) -> bool {
    let (Some(v), Some(min), Some(max)) = (
        OsVersion::parse(version),
        OsVersion::parse(MIN_SOURCE_VERSION),
        OsVersion::parse(MAX_SOURCE_VERSION),
    ) else {
        return false;
    };
    v >= min && v < max
}

pub fn check_model(model: &str) -> CheckLine {
    if UNSUPPORTED_MODELS.contains(&model) {
        CheckLine::new("Model", format!("\"{model}\" is not supported"), false)
    } else {
        CheckLine::new("Model", model.to_string(), true)
    }
}

pub fn check_board_id(board_id: Option<&str>) -> CheckLine {
    match board_id {
        Some(id) if SUPPORTED_BOARD_IDS.contains(&id) => {
            CheckLine::new("Board ID", id.to_string(), true)
        }
        Some(id) => CheckLine::new("Board ID", format!("\"{id}\" is not supported"), false),
        None => CheckLine::new("Board ID", "board-id not found".to_string(), false),
    }
}

pub fn check_system_version(product_name: &str, product_version: &str) -> CheckLine {
    CheckLine::new(
        "System",
        format!("{product_name} {product_version}"),
        is_upgradable_version(product_version),
    )
}

/// Run every check against `probe`.
pub fn evaluate(probe: &dyn SystemProbe) -> Result<CompatReport> {
    let model = probe.model()?;
    let board_id = probe.board_id()?;
    let system = probe.system_version()?;

    let mut lines = vec![
        check_model(&model),
        check_board_id(board_id.as_deref()),
        check_system_version(&system.product_name, &system.product_version),
    ];

    let virtual_machine = probe.is_virtual_machine();
    if virtual_machine {
        lines.push(CheckLine::new("Board ID", "Virtual machine".to_string(), true));
    }

    let supported = virtual_machine || lines.iter().all(|l| l.passed);
    Ok(CompatReport {
        lines,
        virtual_machine,
        supported,
    })
}

/// Location of Munki's ConditionalItems.plist.
pub fn conditional_items_path(probe: &dyn SystemProbe) -> PathBuf {
    probe
        .managed_install_dir()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANAGED_INSTALL_DIR))
        .join(CONDITIONAL_ITEMS_FILE)
}

/// Merge the verdict into an existing ConditionalItems.plist, or create it.
pub fn write_conditional_item(path: &Path, supported: bool) -> Result<()> {
    let mut items = if path.exists() {
        Value::from_file(path)?
            .into_dictionary()
            .unwrap_or_default()
    } else {
        Dictionary::new()
    };

    items.insert(CONDITIONAL_ITEM_KEY.to_string(), Value::Boolean(supported));
    Value::Dictionary(items).to_file_xml(path)?;
    info!(path = %path.display(), supported, "updated conditional items");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SystemVersion;

    struct Canned {
        model: &'static str,
        board_id: Option<&'static str>,
        version: &'static str,
        vm: bool,
    }

    impl SystemProbe for Canned {
        fn model(&self) -> Result<String> {
            Ok(self.model.to_string())
        }
        fn board_id(&self) -> Result<Option<String>> {
            Ok(self.board_id.map(str::to_string))
        }
        fn is_virtual_machine(&self) -> bool {
            self.vm
        }
        fn system_version(&self) -> Result<SystemVersion> {
            Ok(SystemVersion {
                product_name: "Mac OS X".to_string(),
                product_version: self.version.to_string(),
            })
        }
        fn munki_installed(&self) -> bool {
            true
        }
        fn managed_install_dir(&self) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn version_window() {
        assert!(is_upgradable_version("10.9"));
        assert!(is_upgradable_version("10.15.7"));
        assert!(!is_upgradable_version("10.8.5"));
        assert!(!is_upgradable_version("10.16"));
        assert!(!is_upgradable_version("11.0.1"));
        assert!(!is_upgradable_version("garbage"));
    }

    #[test]
    fn versions_compare_numerically() {
        assert!(OsVersion::parse("10.10").unwrap() > OsVersion::parse("10.9").unwrap());
        assert_eq!(OsVersion::parse("10.9.0"), OsVersion::parse("10.9.0"));
        assert_eq!(
            OsVersion::parse("10.9").unwrap().cmp(&OsVersion::parse("10.9.0").unwrap()),
            Ordering::Equal
        );
    }

    #[test]
    fn supported_intel_mac_passes() {
        let report = evaluate(&Canned {
            model: "MacBookPro15,2",
            board_id: Some("Mac-827FB448E656EC26"),
            version: "10.15.7",
            vm: false,
        })
        .unwrap();
        assert!(report.supported);
        assert_eq!(report.lines.len(), 3);
    }

    #[test]
    fn old_model_fails() {
        let report = evaluate(&Canned {
            model: "MacBookAir5,2",
            board_id: Some("Mac-2E6FAB96566FE58C"),
            version: "10.15.7",
            vm: false,
        })
        .unwrap();
        assert!(!report.supported);
        assert_eq!(
            report.lines[0].detail,
            "\"MacBookAir5,2\" is not supported"
        );
    }

    #[test]
    fn virtual_machine_always_passes() {
        let report = evaluate(&Canned {
            model: "VMware7,1",
            board_id: Some("440BX Desktop Reference Platform"),
            version: "10.14.6",
            vm: true,
        })
        .unwrap();
        assert!(report.supported);
        assert!(report.virtual_machine);
    }

    #[test]
    fn line_rendering_is_aligned() {
        let line = check_model("Macmini8,1").render();
        assert_eq!(
            line,
            format!("{:>14}: {:<40} [OK]", "Model", "Macmini8,1")
        );
        assert!(line.starts_with("         Model: Macmini8,1"));
    }

    #[test]
    fn conditional_items_merge_keeps_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONDITIONAL_ITEMS_FILE);
        let mut existing = Dictionary::new();
        existing.insert("site".to_string(), Value::String("ams".to_string()));
        Value::Dictionary(existing).to_file_xml(&path).unwrap();

        write_conditional_item(&path, false).unwrap();

        let items = Value::from_file(&path).unwrap().into_dictionary().unwrap();
        assert_eq!(items.get("site").and_then(Value::as_string), Some("ams"));
        assert_eq!(
            items.get(CONDITIONAL_ITEM_KEY).and_then(Value::as_boolean),
            Some(false)
        );
    }

    #[test]
    fn conditional_items_default_location() {
        let probe = Canned {
            model: "",
            board_id: None,
            version: "",
            vm: false,
        };
        assert_eq!(
            conditional_items_path(&probe),
            PathBuf::from("/Library/Managed Installs/ConditionalItems.plist")
        );
    }
}
