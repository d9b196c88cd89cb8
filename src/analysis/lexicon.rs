//! Fixed keyword dictionaries used by the analyzers.

/// Words that strengthen the sentiment of a fragment.
pub const INTENSIFIERS: &[&str] = &[
    "very",
    "extremely",
    "absolutely",
    "completely",
    "totally",
    "really",
    "incredibly",
    "exceptionally",
    "remarkably",
];

/// Words and short phrases that soften the sentiment of a fragment.
pub const DIMINISHERS: &[&str] = &[
    "somewhat",
    "slightly",
    "a bit",
    "kind of",
    "sort of",
    "fairly",
    "rather",
    "quite",
    "moderately",
];

/// Support issue categories and their trigger substrings.
pub const ISSUE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "performance",
        &["slow", "lag", "performance", "speed", "loading", "timeout"],
    ),
    (
        "bug",
        &["error", "bug", "crash", "broken", "not working", "issue", "problem"],
    ),
    (
        "usability",
        &["confusing", "difficult", "hard to use", "unclear", "unintuitive"],
    ),
    (
        "feature_request",
        &["feature", "would like", "add", "implement", "enhancement"],
    ),
    (
        "billing",
        &["charge", "billing", "payment", "refund", "invoice", "subscription"],
    ),
    (
        "security",
        &["security", "vulnerability", "breach", "hack", "unauthorized"],
    ),
    (
        "login",
        &["login", "password", "access", "authentication", "sign in"],
    ),
    ("data", &["data", "sync", "lost", "missing", "corrupted"]),
];

/// Category assigned when no dictionary entry matches.
pub const GENERAL_CATEGORY: &str = "general";

/// Product aspects and their trigger substrings.
pub const ASPECTS: &[(&str, &[&str])] = &[
    (
        "product_quality",
        &["quality", "build", "material", "durability", "reliable"],
    ),
    (
        "customer_service",
        &["support", "service", "help", "representative", "response"],
    ),
    (
        "user_experience",
        &["interface", "ui", "ux", "navigation", "design"],
    ),
    (
        "value",
        &["price", "cost", "value", "worth", "expensive", "cheap"],
    ),
    (
        "performance",
        &["fast", "slow", "efficient", "performance", "speed"],
    ),
];

/// Names of every dictionary category, in dictionary order
pub fn category_names() -> impl Iterator<Item = &'static str> {
    ISSUE_CATEGORIES.iter().map(|(name, _)| *name)
}

/// Keys of `dictionary` whose keywords occur in the lowercased text
pub(crate) fn matching_keys(
    dictionary: &'static [(&'static str, &'static [&'static str])],
    text: &str,
) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    dictionary
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| *name)
        .collect()
}
