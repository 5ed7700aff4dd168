//! Deferral policy: how long a package must sit in its current catalog
//! before it may be promoted.
//!
//! Overrides come from an optional YAML document shaped as
//! `{promotion: {package name: days}}`. Anything absent falls back to the
//! defaults.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PromoterError, Result};
use crate::rings::Promotion;

/// Default deferral for a single promotion cycle.
pub const DEFAULT_DEFERRAL_DAYS: u32 = 7;

/// Default location of the deferral file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "configuration.yml";

const SECONDS_PER_DAY: i64 = 86_400;

/// Per-promotion, per-package deferral overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferralConfig {
    overrides: HashMap<String, HashMap<String, u32>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawConfig(Option<HashMap<String, Option<HashMap<String, u32>>>>);

impl DeferralConfig {
    /// Load overrides from `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "No {} file was found. Proceeding with defaults...",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PromoterError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_yaml(&content).map_err(|source| PromoterError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }

        let RawConfig(raw) = serde_yaml::from_str(content)?;
        let mut overrides = HashMap::new();
        for (promotion, packages) in raw.unwrap_or_default() {
            if promotion.parse::<Promotion>().is_err() {
                warn!(promotion = %promotion, "ignoring deferrals for unknown promotion");
                continue;
            }
            overrides.insert(promotion, packages.unwrap_or_default());
        }
        Ok(Self { overrides })
    }

    /// Builder used by callers that assemble overrides in code.
    pub fn with_override(mut self, promotion: Promotion, package: &str, days: u32) -> Self {
        self.overrides
            .entry(promotion.name().to_string())
            .or_default()
            .insert(package.to_string(), days);
        self
    }

    pub fn lookup(&self, promotion: Promotion, package: &str) -> Option<u32> {
        self.overrides
            .get(promotion.name())
            .and_then(|packages| packages.get(package))
            .copied()
    }
}

/// Minimum age in days `package` must reach before `promotion` applies.
///
/// Production deferral is counted from the original entry into staging: an
/// explicit `stagingtoproduction` override is stacked on top of the
/// `autopkgtostaging` deferral (or the default cycle). Without a
/// `stagingtoproduction` override no stacking happens, even when an
/// `autopkgtostaging` override exists.
pub fn required_deferral_days(promotion: Promotion, package: &str, config: &DeferralConfig) -> u32 {
    let mut days = DEFAULT_DEFERRAL_DAYS;
    if promotion == Promotion::StagingToProduction {
        days = days.saturating_add(DEFAULT_DEFERRAL_DAYS);
    }

    if let Some(configured) = config.lookup(promotion, package) {
        days = configured;
        if promotion == Promotion::StagingToProduction {
            days = days.saturating_add(
                config
                    .lookup(Promotion::AutopkgToStaging, package)
                    .unwrap_or(DEFAULT_DEFERRAL_DAYS),
            );
        }
    }

    days
}

/// Whole days elapsed between `created` and `now`, floored.
pub fn age_in_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Whether a record created at `created` has waited long enough.
pub fn is_eligible(
    promotion: Promotion,
    package: &str,
    created: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &DeferralConfig,
) -> bool {
    let required = required_deferral_days(promotion, package, config);
    let age = age_in_days(created, now);
    debug!(package = %package, promotion = %promotion, age, required, "deferral check");
    age >= i64::from(required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn defaults_per_promotion() {
        let config = DeferralConfig::default();
        assert_eq!(required_deferral_days(Promotion::TestToStaging, "Firefox", &config), 7);
        assert_eq!(required_deferral_days(Promotion::AutopkgToStaging, "Firefox", &config), 7);
        assert_eq!(
            required_deferral_days(Promotion::StagingToProduction, "Firefox", &config),
            14
        );
    }

    #[test]
    fn plain_override_replaces_default() {
        let config = DeferralConfig::default().with_override(Promotion::TestToStaging, "Slack", 2);
        assert_eq!(required_deferral_days(Promotion::TestToStaging, "Slack", &config), 2);
        assert_eq!(required_deferral_days(Promotion::TestToStaging, "Zoom", &config), 7);
    }

    #[test]
    fn production_override_stacks_on_autopkg_override() {
        let config = DeferralConfig::default()
            .with_override(Promotion::StagingToProduction, "P", 3)
            .with_override(Promotion::AutopkgToStaging, "P", 5);
        assert_eq!(required_deferral_days(Promotion::StagingToProduction, "P", &config), 8);
    }

    #[test]
    fn production_override_stacks_on_default_cycle() {
        let config = DeferralConfig::default().with_override(Promotion::StagingToProduction, "P", 3);
        assert_eq!(required_deferral_days(Promotion::StagingToProduction, "P", &config), 10);
    }

    #[test]
    fn production_override_saturates_instead_of_wrapping() {
        let config = DeferralConfig::from_yaml("stagingtoproduction:\n  P: 4294967295\n").unwrap();
        assert_eq!(
            required_deferral_days(Promotion::StagingToProduction, "P", &config),
            u32::MAX
        );
        let now = Utc::now();
        assert!(!is_eligible(
            Promotion::StagingToProduction,
            "P",
            now - Duration::days(3650),
            now,
            &config
        ));
    }

    #[test]
    fn autopkg_override_alone_does_not_stack() {
        let config = DeferralConfig::default().with_override(Promotion::AutopkgToStaging, "Q", 5);
        assert_eq!(required_deferral_days(Promotion::StagingToProduction, "Q", &config), 14);
    }

    #[test]
    fn eligibility_boundary_is_inclusive() {
        let config = DeferralConfig::default();
        let now = Utc::now();
        assert!(!is_eligible(Promotion::TestToStaging, "A", now, now, &config));
        assert!(!is_eligible(
            Promotion::TestToStaging,
            "A",
            now - Duration::days(7) + Duration::seconds(1),
            now,
            &config
        ));
        assert!(is_eligible(
            Promotion::TestToStaging,
            "A",
            now - Duration::days(7),
            now,
            &config
        ));
    }

    #[test]
    fn future_dates_floor_to_negative_days() {
        let now = Utc::now();
        assert_eq!(age_in_days(now + Duration::hours(12), now), -1);
        let config = DeferralConfig::default().with_override(Promotion::TestToStaging, "A", 0);
        assert!(!is_eligible(
            Promotion::TestToStaging,
            "A",
            now + Duration::hours(12),
            now,
            &config
        ));
    }

    #[test]
    fn yaml_parsing_tolerates_missing_levels() {
        let yaml = r#"
testtostaging:
autopkgtostaging:
  GoogleChrome: 3
stagingtoproduction:
  GoogleChrome: 4
"#;
        let config = DeferralConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.lookup(Promotion::TestToStaging, "GoogleChrome"), None);
        assert_eq!(config.lookup(Promotion::AutopkgToStaging, "GoogleChrome"), Some(3));
        assert_eq!(
            required_deferral_days(Promotion::StagingToProduction, "GoogleChrome", &config),
            7
        );
    }

    #[test]
    fn empty_yaml_is_empty_config() {
        assert_eq!(DeferralConfig::from_yaml("").unwrap(), DeferralConfig::default());
        assert_eq!(
            DeferralConfig::from_yaml("# nothing here\n").unwrap(),
            DeferralConfig::default()
        );
    }

    #[test]
    fn unknown_promotions_are_ignored() {
        let config = DeferralConfig::from_yaml("qatoprod:\n  Foo: 1\n").unwrap();
        assert_eq!(config, DeferralConfig::default());
    }

    #[test]
    fn negative_days_are_rejected() {
        assert!(DeferralConfig::from_yaml("testtostaging:\n  Foo: -1\n").is_err());
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeferralConfig::load(&dir.path().join("configuration.yml")).unwrap();
        assert_eq!(config, DeferralConfig::default());
    }

    #[test]
    fn load_bad_syntax_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.yml");
        std::fs::write(&path, "testtostaging: [unclosed\n").unwrap();
        assert!(matches!(
            DeferralConfig::load(&path),
            Err(PromoterError::ConfigParse { .. })
        ));
    }
}
