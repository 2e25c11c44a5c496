//! Topic-set helpers shared by initialization, lag checks and promotion.

use std::collections::BTreeSet;

use cutover_common::Error;

use crate::types::MirrorTopic;

/// Every requested topic must be a mirror topic on the link.
///
/// The error lists all missing topics, not just the first.
pub fn validate_topics(requested: &[String], available: &[String]) -> Result<(), Error> {
    let available: BTreeSet<&str> = available.iter().map(String::as_str).collect();
    let missing: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|t| !available.contains(t))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::validation(format!(
        "topics not found as mirror topics on the cluster link: [{}]",
        missing.join(", ")
    )))
}

/// Split mirror topics into (active, not active)
pub fn split_by_activity<'a>(
    topics: impl IntoIterator<Item = &'a MirrorTopic>,
) -> (Vec<&'a MirrorTopic>, Vec<&'a MirrorTopic>) {
    topics.into_iter().partition(|t| t.is_active())
}

/// Keep only the mirror topics named in `wanted`, preserving link order
pub fn restrict_to<'a>(topics: &'a [MirrorTopic], wanted: &[String]) -> Vec<&'a MirrorTopic> {
    let wanted: BTreeSet<&str> = wanted.iter().map(String::as_str).collect();
    topics
        .iter()
        .filter(|t| wanted.contains(t.name.as_str()))
        .collect()
}
