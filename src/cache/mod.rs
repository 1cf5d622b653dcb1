//! Fingerprint cache for the dependency image
//!
//! The aggregate fingerprint of the last successfully built dependency set is
//! persisted next to the staged files. A run whose fresh fingerprint matches
//! the record reuses the existing image instead of building a new one.
//!
//! # Cache States
//!
//! | Record | Fresh fingerprint | Decision |
//! |--------|-------------------|----------|
//! | absent | any | Miss (first run) |
//! | `F1` | `F1` | Hit, skip build |
//! | `F1` | `F2` | Miss, rebuild |
//!
//! The record is only rewritten after the image builder reports success, so a
//! failed build is retried on the next run.

pub mod record;

pub use record::{CacheRecord, RECORD_FILE_NAME};

use crate::fingerprint::Fingerprint;
use std::fmt;

/// Outcome of comparing a fresh fingerprint against the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// Record matches, the existing image is current
    Hit,
    /// No record or a different fingerprint; the image must be built
    Miss { previous: Option<Fingerprint> },
}

impl CacheDecision {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for CacheDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss { .. } => write!(f, "miss"),
        }
    }
}

/// Decide whether the image must be rebuilt. Pure comparison.
pub fn should_rebuild(current: &Fingerprint, previous: Option<&Fingerprint>) -> CacheDecision {
    match previous {
        Some(previous) if previous == current => CacheDecision::Hit,
        previous => CacheDecision::Miss {
            previous: previous.cloned(),
        },
    }
}
