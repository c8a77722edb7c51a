use crate::record::CandidateRecord;
use crate::url::normalize_website;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static SAINTS_ABBREV: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bSts\.\s*").expect("static regex"));
static SAINT_ABBREV: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bSt\.\s*").expect("static regex"));
static CLERGY_TITLES: Lazy<[(Regex, &'static str); 3]> = Lazy::new(|| {
    [
        (Regex::new(r"\bFr\.\s*").expect("static regex"), "Father "),
        (Regex::new(r"\bRev\.\s*").expect("static regex"), "Reverend "),
        (Regex::new(r"\bDr\.\s*").expect("static regex"), "Doctor "),
    ]
});
static ZIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5}").expect("static regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static regex")
});

/// Words dropped from search keywords
const COMMON_WORDS: &[&str] = &["orthodox", "church", "parish", "the", "of", "and", "in"];

const STATES: &[(&str, &str)] = &[
    ("alabama", "AL"), ("alaska", "AK"), ("arizona", "AZ"), ("arkansas", "AR"),
    ("california", "CA"), ("colorado", "CO"), ("connecticut", "CT"), ("delaware", "DE"),
    ("district of columbia", "DC"), ("florida", "FL"), ("georgia", "GA"), ("hawaii", "HI"),
    ("idaho", "ID"), ("illinois", "IL"), ("indiana", "IN"), ("iowa", "IA"),
    ("kansas", "KS"), ("kentucky", "KY"), ("louisiana", "LA"), ("maine", "ME"),
    ("maryland", "MD"), ("massachusetts", "MA"), ("michigan", "MI"), ("minnesota", "MN"),
    ("mississippi", "MS"), ("missouri", "MO"), ("montana", "MT"), ("nebraska", "NE"),
    ("nevada", "NV"), ("new hampshire", "NH"), ("new jersey", "NJ"), ("new mexico", "NM"),
    ("new york", "NY"), ("north carolina", "NC"), ("north dakota", "ND"), ("ohio", "OH"),
    ("oklahoma", "OK"), ("oregon", "OR"), ("pennsylvania", "PA"), ("rhode island", "RI"),
    ("south carolina", "SC"), ("south dakota", "SD"), ("tennessee", "TN"), ("texas", "TX"),
    ("utah", "UT"), ("vermont", "VT"), ("virginia", "VA"), ("washington", "WA"),
    ("west virginia", "WV"), ("wisconsin", "WI"), ("wyoming", "WY"),
];

/// Standardizes every field of a candidate
///
/// Empty or unparsable optional fields become `None`. Cleaning never rejects a
/// candidate; that is the validator's job.
pub fn clean_candidate(candidate: &CandidateRecord) -> CandidateRecord {
    CandidateRecord {
        source_id: candidate.source_id.clone(),
        name: clean_name(&candidate.name),
        jurisdiction: collapse_whitespace(&candidate.jurisdiction).unwrap_or_default(),
        address: candidate.address.as_deref().and_then(collapse_whitespace),
        city: candidate.city.as_deref().and_then(collapse_whitespace),
        state: candidate.state.as_deref().and_then(clean_state),
        zip_code: candidate.zip_code.as_deref().and_then(clean_zip),
        clergy_contact: candidate.clergy_contact.as_deref().and_then(clean_clergy),
        website: candidate.website.as_deref().and_then(normalize_website),
        contact_phone: candidate.contact_phone.as_deref().and_then(clean_phone),
        contact_email: candidate.contact_email.as_deref().and_then(clean_email),
        source_url: candidate.source_url.as_deref().and_then(clean_source_url),
    }
}

/// Builds the space-separated keyword list used by free-text search
///
/// # Arguments
///
/// * `name` - Church name; every word participates
/// * `city` - City, kept as one token
/// * `state` - State code, kept as one token
/// * `jurisdiction` - Jurisdiction name; every word participates
///
/// # Returns
///
/// Lowercased, deduplicated words longer than two characters, in first-seen order
pub fn generate_search_keywords(
    name: &str,
    city: Option<&str>,
    state: Option<&str>,
    jurisdiction: &str,
) -> String {
    let name = name.to_lowercase();
    let city = city.map(str::to_lowercase);
    let state = state.map(str::to_lowercase);
    let jurisdiction = jurisdiction.to_lowercase();

    let words = name
        .split_whitespace()
        .chain(city.as_deref())
        .chain(state.as_deref())
        .chain(jurisdiction.split_whitespace());

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for word in words {
        if word.chars().count() <= 2 || COMMON_WORDS.contains(&word) {
            continue;
        }
        if seen.insert(word) {
            keywords.push(word);
        }
    }
    keywords.join(" ")
}

fn collapse_whitespace(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn clean_name(name: &str) -> String {
    let name = SAINTS_ABBREV.replace_all(name, "Saints ");
    let name = SAINT_ABBREV.replace_all(&name, "Saint ");
    collapse_whitespace(&name).unwrap_or_default()
}

fn clean_clergy(clergy: &str) -> Option<String> {
    let mut clergy = clergy.to_string();
    for (pattern, replacement) in CLERGY_TITLES.iter() {
        clergy = pattern.replace_all(&clergy, *replacement).into_owned();
    }
    collapse_whitespace(&clergy)
}

fn clean_state(state: &str) -> Option<String> {
    let lowered = collapse_whitespace(state)?.to_lowercase();
    if lowered.chars().count() == 2 {
        return Some(lowered.to_uppercase());
    }

    STATES
        .iter()
        .find(|(full, _)| *full == lowered)
        .map(|(_, code)| code.to_string())
        .or_else(|| Some(lowered.to_uppercase()))
}

fn clean_zip(zip: &str) -> Option<String> {
    ZIP.find(zip).map(|m| m.as_str().to_string())
}

fn clean_email(email: &str) -> Option<String> {
    EMAIL.find(email).map(|m| m.as_str().to_lowercase())
}

/// Formats a US phone number as `(AAA) BBB-CCCC`
fn clean_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return None,
    };
    Some(format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

fn clean_source_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let lowered = url.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url))
    }
}
