use deunicode::deunicode;

/// Normalizes one identity component
///
/// Transliterates to ASCII (folding diacritics), lowercases, turns every
/// non-alphanumeric character into a space and collapses runs of whitespace.
///
/// # Example
///
/// ```
/// use vespers::record::normalize_component;
///
/// assert_eq!(normalize_component("  Sveti  Sava, Šabac "), "sveti sava sabac");
/// ```
pub fn normalize_component(value: &str) -> String {
    let folded = deunicode(value).to_lowercase();
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the identity key `jurisdiction|name|city|state`
///
/// Missing locality components contribute an empty segment, so a record with a
/// city and one without never share a key.
pub fn dedup_key(jurisdiction: &str, name: &str, city: Option<&str>, state: Option<&str>) -> String {
    [
        normalize_component(jurisdiction),
        normalize_component(name),
        normalize_component(city.unwrap_or_default()),
        normalize_component(state.unwrap_or_default()),
    ]
    .join("|")
}
