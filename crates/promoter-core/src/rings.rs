//! The fixed promotion topology between Munki catalogs.
//!
//! A [`Promotion`] is one named edge from a set of source catalogs to a set of
//! target catalogs. The [`RingGraph`] indexes the edges by name once at
//! startup; callers pick exactly one edge per run.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::PromoterError;

/// A named promotion edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Promotion {
    TestToStaging,
    AutopkgToStaging,
    StagingToProduction,
}

impl Promotion {
    /// All edges in declaration order.
    pub const ALL: [Promotion; 3] = [
        Promotion::TestToStaging,
        Promotion::AutopkgToStaging,
        Promotion::StagingToProduction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Promotion::TestToStaging => "testtostaging",
            Promotion::AutopkgToStaging => "autopkgtostaging",
            Promotion::StagingToProduction => "stagingtoproduction",
        }
    }

    /// Catalogs a pkginfo must hold, exactly, for this edge to apply.
    pub fn source_rings(&self) -> &'static [&'static str] {
        match self {
            Promotion::TestToStaging => &["test"],
            Promotion::AutopkgToStaging => &["autopkg"],
            Promotion::StagingToProduction => &["staging"],
        }
    }

    /// Catalogs assigned on promotion. These replace the source catalogs.
    pub fn target_rings(&self) -> &'static [&'static str] {
        match self {
            Promotion::TestToStaging | Promotion::AutopkgToStaging => &["staging"],
            Promotion::StagingToProduction => &["production"],
        }
    }

    /// The ring reported to humans, i.e. the last target catalog.
    pub fn final_ring(&self) -> &'static str {
        self.target_rings().last().copied().unwrap_or_default()
    }

    /// Exact set equality between `rings` and this edge's source catalogs.
    pub fn matches_source<S: AsRef<str>>(&self, rings: &[S]) -> bool {
        let held: BTreeSet<&str> = rings.iter().map(|r| r.as_ref()).collect();
        let wanted: BTreeSet<&str> = self.source_rings().iter().copied().collect();
        held == wanted
    }
}

impl fmt::Display for Promotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Promotion {
    type Err = PromoterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Promotion::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| PromoterError::UnknownPromotion(s.to_string()))
    }
}

/// Name-keyed view over the promotion edges.
#[derive(Debug, Clone)]
pub struct RingGraph {
    by_name: HashMap<&'static str, Promotion>,
    order: Vec<Promotion>,
}

impl Default for RingGraph {
    fn default() -> Self {
        Self::new(Promotion::ALL)
    }
}

impl RingGraph {
    pub fn new(edges: impl IntoIterator<Item = Promotion>) -> Self {
        let mut by_name = HashMap::new();
        let mut order = Vec::new();
        for edge in edges {
            if by_name.insert(edge.name(), edge).is_none() {
                order.push(edge);
            }
        }
        Self { by_name, order }
    }

    pub fn edge_exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn edge(&self, name: &str) -> Option<Promotion> {
        self.by_name.get(name).copied()
    }

    /// Resolve an edge by name, failing with [`PromoterError::UnknownPromotion`].
    pub fn resolve(&self, name: &str) -> crate::Result<Promotion> {
        self.edge(name)
            .ok_or_else(|| PromoterError::UnknownPromotion(name.to_string()))
    }

    pub fn edge_targets(&self, name: &str) -> Option<&'static [&'static str]> {
        self.edge(name).map(|e| e.target_rings())
    }

    pub fn list_edges(&self) -> &[Promotion] {
        &self.order
    }

    /// Render the edge listing printed by `--list`.
    pub fn render_listing(&self) -> String {
        let mut out = String::new();
        for edge in &self.order {
            out.push_str(&format!("{}:\n", edge.name()));
            out.push_str(&format!(
                "   {} -> {}\n",
                edge.source_rings().join(", "),
                edge.target_rings().join(", ")
            ));
        }
        out
    }
}
