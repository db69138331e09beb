//! Paid vs organic overlap for a tracked domain.
//!
//! The two buckets are indexed separately, so "distance" between the paid hit
//! and the organic hit is measured by collapsing both lists into one ranking:
//! the paid listings left below the tracked ad, plus the organic listings above
//! the tracked organic hit.
//!
//! ```text
//! gap = (|sea| - first_sea - 1) + first_seo
//! ```
//!
//! A gap of 0 means the organic hit sits right under the paid block. A gap of 1
//! filled by the parent brand counts the same.

use crate::config::TrackingConfig;
use crate::errors::AnalysisError;
use crate::models::{ResultEntry, SearchResultSet, UNTRACKED_POSITION};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WasteAssessment {
    pub first_sea_position: i64,
    pub first_seo_position: i64,
    /// `None` when there are no organic entries to divide by.
    pub density: Option<f64>,
    pub waste: bool,
}

/// Position of the first entry for `domain`, -1 if absent. Hostnames compare case-insensitively.
pub fn first_position(entries: &[ResultEntry], domain: &str) -> i64 {
    entries
        .iter()
        .find(|e| e.domain.eq_ignore_ascii_case(domain))
        .map_or(UNTRACKED_POSITION, |e| e.position)
}

pub fn is_waste(set: &SearchResultSet, tracking: &TrackingConfig, first_sea: i64, first_seo: i64) -> bool {
    if first_sea < 0 || first_seo < 0 {
        return false;
    }

    let gap = (set.sea.len() as i64 - first_sea - 1) + first_seo;
    match gap {
        0 => true,
        1 => match (&tracking.parent_domain, set.seo.first()) {
            (Some(parent), Some(top)) => top.domain.eq_ignore_ascii_case(parent),
            _ => false,
        },
        _ => false,
    }
}

/// Share of organic entries owned by the tracked domain (and the parent, when configured to count it).
pub fn seo_density(set: &SearchResultSet, tracking: &TrackingConfig) -> Result<f64, AnalysisError> {
    if set.seo.is_empty() {
        return Err(AnalysisError::EmptyOrganicSet);
    }

    let parent = tracking
        .parent_domain
        .as_deref()
        .filter(|_| tracking.density_includes_parent);

    let owned = set
        .seo
        .iter()
        .filter(|e| {
            e.domain.eq_ignore_ascii_case(&tracking.domain)
                || parent.is_some_and(|p| e.domain.eq_ignore_ascii_case(p))
        })
        .count();

    Ok(owned as f64 / set.seo.len() as f64)
}

pub fn assess(set: &SearchResultSet, tracking: &TrackingConfig) -> WasteAssessment {
    let first_sea_position = first_position(&set.sea, &tracking.domain);
    let first_seo_position = first_position(&set.seo, &tracking.domain);

    WasteAssessment {
        first_sea_position,
        first_seo_position,
        density: seo_density(set, tracking).ok(),
        waste: is_waste(set, tracking, first_sea_position, first_seo_position),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
