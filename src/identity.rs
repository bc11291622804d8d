//! Cross-source player identity resolution
//!
//! Independent sources describe the same athlete with different spellings,
//! school names, and levels of completeness. This module assigns each record
//! a deterministic UID derived from its normalized attributes, so the
//! aggregator can recognize and drop duplicates after a fan-out.
//!
//! Matching modes:
//! - **Exact** (always on): two records are the same player iff their UIDs
//!   are equal. Same normalized name with school and grad year both unknown
//!   therefore merges, an accepted false-positive for data-poor sources.
//! - **Fuzzy** (opt-in): Jaro-Winkler similarity over name and school, with
//!   grad-year compatibility, catches near-miss spellings the exact key
//!   cannot.

use crate::records::PlayerRecord;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Placeholder for an absent school or grad year
pub const UNKNOWN: &str = "unknown";

/// Minimum name similarity for a fuzzy match
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.90;

/// Minimum school similarity for a fuzzy match
pub const SCHOOL_SIMILARITY_THRESHOLD: f64 = 0.85;

/// School-name suffixes that carry no identity information
const SCHOOL_SUFFIXES: [&str; 3] = ["hs", "academy", "prep"];

/// Lowercase, trim, and collapse internal whitespace
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a school name: lowercase, collapse whitespace, and strip
/// trailing "high school" / "hs" / "academy" / "prep"
pub fn normalize_school(raw: &str) -> String {
    let mut words: Vec<String> = raw
        .split_whitespace()
        .map(|w| w.to_lowercase().trim_matches(|c: char| c == '.' || c == ',').to_string())
        .filter(|w| !w.is_empty())
        .collect();

    loop {
        let n = words.len();
        if n >= 3 && words[n - 2] == "high" && words[n - 1] == "school" {
            // Keep at least one identifying word
            words.truncate(n - 2);
            continue;
        }
        if n >= 2 && SCHOOL_SUFFIXES.contains(&words[n - 1].as_str()) {
            words.truncate(n - 1);
            continue;
        }
        break;
    }

    words.join(" ")
}

/// Assigns stable, source-independent identifiers to player records
///
/// UID derivation is pure; the internal memo map is a session-local
/// shortcut, not a correctness dependency.
pub struct IdentityResolver {
    name_threshold: f64,
    school_threshold: f64,
    uid_cache: Mutex<HashMap<String, String>>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self {
            name_threshold: NAME_SIMILARITY_THRESHOLD,
            school_threshold: SCHOOL_SIMILARITY_THRESHOLD,
            uid_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the fuzzy-match thresholds (used by stricter callers)
    pub fn with_thresholds(name_threshold: f64, school_threshold: f64) -> Self {
        Self {
            name_threshold,
            school_threshold,
            uid_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Derive the UID for a `(name, school, grad_year)` triple
    ///
    /// Deterministic: identical normalized inputs always produce the same
    /// UID, independent of call order. Missing school or grad year degrade
    /// to the `unknown` placeholder.
    pub fn resolve_uid(&self, name: &str, school: Option<&str>, grad_year: Option<u16>) -> String {
        let composite = Self::composite_key(name, school, grad_year);

        {
            let cache = self.uid_cache.lock().unwrap();
            if let Some(uid) = cache.get(&composite) {
                return uid.clone();
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(composite.as_bytes());
        let digest = hasher.finalize();
        let uid: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();

        let mut cache = self.uid_cache.lock().unwrap();
        cache.insert(composite, uid.clone());
        uid
    }

    pub fn resolve_record_uid(&self, record: &PlayerRecord) -> String {
        self.resolve_uid(&record.name, record.school.as_deref(), record.grad_year)
    }

    /// Lenient pair comparison for records whose exact keys differ
    ///
    /// Matches iff name similarity clears the name threshold, school
    /// similarity clears the school threshold, and the grad years agree or
    /// either is unknown.
    pub fn fuzzy_match(&self, a: &PlayerRecord, b: &PlayerRecord) -> bool {
        let name_sim = strsim::jaro_winkler(&normalize_name(&a.name), &normalize_name(&b.name));
        if name_sim < self.name_threshold {
            return false;
        }

        let school_a = normalized_or_unknown(a.school.as_deref());
        let school_b = normalized_or_unknown(b.school.as_deref());
        let school_sim = strsim::jaro_winkler(&school_a, &school_b);
        if school_sim < self.school_threshold {
            return false;
        }

        match (a.grad_year, b.grad_year) {
            (Some(ya), Some(yb)) => ya == yb,
            _ => true,
        }
    }

    /// Drop records that resolve to an already-seen player
    ///
    /// Single pass, first occurrence of a UID wins; every surviving record
    /// carries its UID. With `fuzzy` enabled, each new record is also
    /// compared against all previously accepted records, O(n²) on the
    /// bounded post-fan-out set, which the caller size-limits.
    pub fn deduplicate(&self, records: Vec<PlayerRecord>, fuzzy: bool) -> Vec<PlayerRecord> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted: Vec<PlayerRecord> = Vec::with_capacity(records.len());

        for mut record in records {
            record.uid = self.resolve_record_uid(&record);

            if seen.contains(&record.uid) {
                continue;
            }
            if fuzzy && accepted.iter().any(|kept| self.fuzzy_match(kept, &record)) {
                log::debug!(
                    "🔎 Fuzzy-merged '{}' ({}) into an accepted record",
                    record.name,
                    record.source
                );
                continue;
            }

            seen.insert(record.uid.clone());
            accepted.push(record);
        }

        accepted
    }

    fn composite_key(name: &str, school: Option<&str>, grad_year: Option<u16>) -> String {
        let year = match grad_year {
            Some(y) => y.to_string(),
            None => UNKNOWN.to_string(),
        };
        format!(
            "{}|{}|{}",
            normalize_name(name),
            normalized_or_unknown(school),
            year
        )
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn normalized_or_unknown(school: Option<&str>) -> String {
    match school {
        Some(s) => {
            let normalized = normalize_school(s);
            if normalized.is_empty() {
                UNKNOWN.to_string()
            } else {
                normalized
            }
        }
        None => UNKNOWN.to_string(),
    }
}
