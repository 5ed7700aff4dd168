//! Two-phase promotion: [`plan`] scans and evaluates without touching disk,
//! [`commit`] writes exactly what the plan contains.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::deferral::{is_eligible, DeferralConfig};
use crate::error::{PromoterError, Result};
use crate::obs;
use crate::pkginfo::{content_digest, PackageRecord};
use crate::rings::Promotion;
use crate::store::{find_candidates, write_atomically};

/// A promoted (or promotable) package, as reported to humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionResult {
    pub identifier: String,
    pub name: String,
    pub version: String,
}

impl From<&PackageRecord> for PromotionResult {
    fn from(record: &PackageRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            name: record.name.clone(),
            version: record.version.clone(),
        }
    }
}

/// A record that passed its deferral check, already carrying its new catalogs.
#[derive(Debug, Clone)]
pub struct PlannedPromotion {
    pub path: PathBuf,
    pub record: PackageRecord,
    scanned_digest: String,
}

/// Everything one promotion would write.
#[derive(Debug, Clone)]
pub struct PromotionPlan {
    pub promotion: Promotion,
    pub items: Vec<PlannedPromotion>,
}

impl PromotionPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn results(&self) -> Vec<PromotionResult> {
        self.items.iter().map(|i| (&i.record).into()).collect()
    }
}

/// Scan `pkgsinfo` for `promotion` and keep the records old enough to move.
pub fn plan(
    pkgsinfo: &Path,
    promotion: Promotion,
    config: &DeferralConfig,
    now: DateTime<Utc>,
) -> Result<PromotionPlan> {
    let mut items = Vec::new();
    let candidates = find_candidates(pkgsinfo, promotion)?;
    let scanned = candidates.len();

    for stored in candidates {
        let mut record = stored.record;
        record.set_rings(promotion.target_rings());

        let created = record.creation_timestamp(&stored.path)?;
        if is_eligible(promotion, &record.name, created, now, config) {
            items.push(PlannedPromotion {
                path: stored.path,
                record,
                scanned_digest: stored.digest,
            });
        }
    }

    obs::emit_promotion_planned(promotion.name(), scanned, items.len());
    Ok(PromotionPlan { promotion, items })
}

/// Write every planned record back to its original location.
///
/// A file whose bytes changed since the scan aborts the commit. Records
/// written before the failure stay promoted.
pub fn commit(plan: &PromotionPlan) -> Result<Vec<PromotionResult>> {
    let mut results = Vec::with_capacity(plan.items.len());

    for item in &plan.items {
        let current = std::fs::read(&item.path).map_err(|source| PromoterError::RecordRead {
            path: item.path.clone(),
            source,
        })?;
        if content_digest(&current) != item.scanned_digest {
            return Err(PromoterError::RecordChanged(item.path.clone()));
        }

        info!(
            "Promoting {} to {:?}",
            item.path.display(),
            item.record.rings
        );
        write_atomically(&item.path, &item.record.to_xml_bytes()?)?;
        results.push((&item.record).into());
    }

    obs::emit_promotion_committed(plan.promotion.name(), results.len());
    Ok(results)
}

/// Plan and, when `write` is set, commit in one call.
pub fn evaluate(
    pkgsinfo: &Path,
    promotion: Promotion,
    config: &DeferralConfig,
    now: DateTime<Utc>,
    write: bool,
) -> Result<Vec<PromotionResult>> {
    let plan = plan(pkgsinfo, promotion, config, now)?;
    if write {
        commit(&plan)
    } else {
        Ok(plan.results())
    }
}
