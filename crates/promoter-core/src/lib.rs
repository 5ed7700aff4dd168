//! Promoter Core
//!
//! Moves Munki pkginfo files between catalogs ("rings") once they have sat in
//! their current catalog for long enough.
//!
//! ## Pieces
//!
//! - [`rings`]: the fixed promotion edges (test → staging, autopkg → staging,
//!   staging → production)
//! - [`deferral`]: how many days a package must wait, with YAML overrides
//! - [`store`]: pkgsinfo tree traversal and atomic rewrites
//! - [`executor`]: plan/commit promotion runs
//! - [`notify`]: Slack webhook summaries

pub mod deferral;
pub mod error;
pub mod executor;
pub mod notify;
pub mod obs;
pub mod pkginfo;
pub mod rings;
pub mod store;
pub mod telemetry;

pub use deferral::{
    age_in_days, is_eligible, required_deferral_days, DeferralConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_DEFERRAL_DAYS,
};
pub use error::{PromoterError, Result};
pub use executor::{commit, evaluate, plan, PlannedPromotion, PromotionPlan, PromotionResult};
pub use notify::{
    build_slack_blocks, deliver, webhook_from_env, Notifier, SlackWebhookNotifier, WEBHOOK_ENV,
};
pub use obs::RunSpan;
pub use pkginfo::PackageRecord;
pub use rings::{Promotion, RingGraph};
pub use store::{
    find_candidates, pkgsinfo_path, verify_store, StoredRecord, DEFAULT_MUNKI_ROOT,
    PKGSINFO_DIR_NAME,
};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
