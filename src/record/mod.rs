//! Church records as they move through a session
//!
//! A [`CandidateRecord`] is what a source emits; after cleaning, validation and
//! classification it becomes (or merges into) a persisted [`ChurchRecord`].

mod clean;
mod key;

pub use clean::{clean_candidate, generate_search_keywords};
pub use key::{dedup_key, normalize_component};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw entity extracted by a source, before validation and deduplication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Identifier of the source that produced this candidate
    pub source_id: String,
    pub name: String,
    pub jurisdiction: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub clergy_contact: Option<String>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    /// Page the candidate was found on
    pub source_url: Option<String>,
}

impl CandidateRecord {
    pub fn new(source_id: &str, name: &str, jurisdiction: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            name: name.to_string(),
            jurisdiction: jurisdiction.to_string(),
            ..Default::default()
        }
    }

    /// Normalized identity of this candidate
    pub fn dedup_key(&self) -> String {
        dedup_key(
            &self.jurisdiction,
            &self.name,
            self.city.as_deref(),
            self.state.as_deref(),
        )
    }
}

/// A persisted church, unique by `dedup_key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurchRecord {
    /// Row id; 0 until the record has been stored
    pub id: i64,
    pub name: String,
    pub jurisdiction: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub clergy_contact: Option<String>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub search_keywords: String,
    /// Page the record was first seen on
    pub source_url: Option<String>,
    pub dedup_key: String,
    pub first_session_id: String,
    pub last_session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChurchRecord {
    /// Builds a fresh record from a cleaned candidate seen in `session_id`
    pub fn from_candidate(candidate: &CandidateRecord, session_id: &str) -> Self {
        let now = Utc::now();
        let mut record = Self {
            id: 0,
            name: candidate.name.clone(),
            jurisdiction: candidate.jurisdiction.clone(),
            address: candidate.address.clone(),
            city: candidate.city.clone(),
            state: candidate.state.clone(),
            zip_code: candidate.zip_code.clone(),
            clergy_contact: candidate.clergy_contact.clone(),
            website: candidate.website.clone(),
            contact_phone: candidate.contact_phone.clone(),
            contact_email: candidate.contact_email.clone(),
            search_keywords: String::new(),
            source_url: candidate.source_url.clone(),
            dedup_key: candidate.dedup_key(),
            first_session_id: session_id.to_string(),
            last_session_id: session_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        record.refresh_keywords();
        record
    }

    /// Recomputes `search_keywords` from the identity fields
    pub fn refresh_keywords(&mut self) {
        self.search_keywords = generate_search_keywords(
            &self.name,
            self.city.as_deref(),
            self.state.as_deref(),
            &self.jurisdiction,
        );
    }
}
