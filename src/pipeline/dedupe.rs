use crate::error::ScoutError;
use crate::models::{Listing, ListingIdentity};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// When fresh listings are deduplicated and written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Dedupe against stored state and write after every page
    #[default]
    PerPage,
    /// Keep every page in memory and dedupe once after the last page
    BatchAtEnd,
}

impl FromStr for FlushMode {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-page" | "page" | "incremental" => Ok(Self::PerPage),
            "batch" | "batch-at-end" | "batched" => Ok(Self::BatchAtEnd),
            other => Err(ScoutError::config(format!(
                "unknown flush mode `{other}` (expected per-page or batch)"
            ))),
        }
    }
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerPage => write!(f, "per-page"),
            Self::BatchAtEnd => write!(f, "batch"),
        }
    }
}

/// Remembers which listings were already seen. Identity covers the extracted
/// fields only, never region, coordinates, id or timestamps.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<ListingIdentity>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted set of listings
    pub fn seeded(prior: &[Listing]) -> Self {
        Self {
            seen: prior.iter().map(Listing::identity).collect(),
        }
    }

    /// Keep the listings not seen before, first occurrence first
    pub fn retain_new(&mut self, listings: Vec<Listing>) -> Vec<Listing> {
        listings
            .into_iter()
            .filter(|listing| self.seen.insert(listing.identity()))
            .collect()
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// Drop exact duplicates, keeping the first occurrence and the original order
pub fn dedupe(listings: Vec<Listing>) -> Vec<Listing> {
    Deduplicator::new().retain_new(listings)
}
