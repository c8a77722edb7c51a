//! Duplicate detection
//!
//! Candidates are matched to stored records by `dedup_key`. A match that brings
//! nothing new is a duplicate; a match that fills or changes a material field is
//! an update carrying the merged record.

use crate::record::{CandidateRecord, ChurchRecord};
use chrono::Utc;

/// Outcome of classifying one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No record with this key; the record to insert
    New(ChurchRecord),

    /// A record with this key already holds everything the candidate offers
    Duplicate { existing_id: i64 },

    /// A record with this key gains or changes fields
    Update {
        existing_id: i64,
        merged: ChurchRecord,
        changed_fields: Vec<&'static str>,
    },
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New(_) => "new",
            Self::Duplicate { .. } => "duplicate",
            Self::Update { .. } => "updated",
        }
    }
}

/// Classifies candidates against known records
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    enabled: bool,
}

impl Deduplicator {
    /// Creates a deduplicator
    ///
    /// When `enabled` is false every candidate is classified `New`; the store's
    /// unique key still folds colliding rows together.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Classifies one cleaned candidate
    ///
    /// # Arguments
    ///
    /// * `candidate` - Cleaned, validated candidate
    /// * `existing` - The stored record with the candidate's key, if any
    /// * `session_id` - Session producing the candidate, stamped on new and merged records
    pub fn classify(
        &self,
        candidate: &CandidateRecord,
        existing: Option<&ChurchRecord>,
        session_id: &str,
    ) -> Classification {
        let existing = match existing {
            Some(existing) if self.enabled => existing,
            _ => return Classification::New(ChurchRecord::from_candidate(candidate, session_id)),
        };

        let (merged, changed_fields) = merge(existing, candidate, session_id);
        if changed_fields.is_empty() {
            Classification::Duplicate {
                existing_id: existing.id,
            }
        } else {
            Classification::Update {
                existing_id: existing.id,
                merged,
                changed_fields,
            }
        }
    }
}

/// Field-level merge of a candidate into a stored record
///
/// Material fields take the candidate's value when it is non-empty and differs
/// from the stored one. An empty incoming value never erases stored data.
/// Identity fields and first-seen provenance are left untouched.
///
/// # Returns
///
/// The merged record and the names of the fields that changed
pub fn merge(
    existing: &ChurchRecord,
    candidate: &CandidateRecord,
    session_id: &str,
) -> (ChurchRecord, Vec<&'static str>) {
    let mut merged = existing.clone();
    let mut changed = Vec::new();

    let fields: [(&'static str, &mut Option<String>, &Option<String>); 6] = [
        ("address", &mut merged.address, &candidate.address),
        ("zip_code", &mut merged.zip_code, &candidate.zip_code),
        ("clergy_contact", &mut merged.clergy_contact, &candidate.clergy_contact),
        ("website", &mut merged.website, &candidate.website),
        ("contact_phone", &mut merged.contact_phone, &candidate.contact_phone),
        ("contact_email", &mut merged.contact_email, &candidate.contact_email),
    ];

    for (name, stored, incoming) in fields {
        let Some(incoming) = incoming.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        if stored.as_deref() != Some(incoming) {
            *stored = Some(incoming.to_string());
            changed.push(name);
        }
    }

    if !changed.is_empty() {
        merged.last_session_id = session_id.to_string();
        merged.updated_at = Utc::now();
        merged.refresh_keywords();
    }

    (merged, changed)
}
