//! Domain and subdomain name normalization

use std::sync::LazyLock;

use regex::Regex;

/// Normalize a raw domain string: strip scheme, path, casing and trailing dot
pub fn normalize_domain(raw: &str) -> String {
    let mut domain = raw.trim().to_lowercase();
    if let Some((_, rest)) = domain.split_once("://") {
        domain = rest.to_string();
    }
    if let Some((host, _)) = domain.split_once('/') {
        domain = host.to_string();
    }
    domain.trim_end_matches('.').to_string()
}

/// Clean a subdomain label as stored on a mapping: trimmed, lower-case, no
/// leading or trailing dots
pub fn clean_subdomain(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .trim()
        .to_lowercase()
        .trim_matches('.')
        .to_string()
}

static INVALID_SUBDOMAIN_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9.-]+").ok());

static REPEATED_DASHES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"-{2,}").ok());

/// Slugify user-provided subdomain input.
///
/// Runs of characters outside `[a-z0-9.-]` become a single `-`, leading and
/// trailing `-` and `.` are stripped, and repeated dashes collapse.
pub fn normalize_subdomain(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw.to_lowercase(),
        _ => return String::new(),
    };

    let slug = match INVALID_SUBDOMAIN_CHARS.as_ref() {
        Some(re) => re.replace_all(&raw, "-").into_owned(),
        None => raw,
    };
    let slug = slug.trim_matches(|c| c == '-' || c == '.');
    match REPEATED_DASHES.as_ref() {
        Some(re) => re.replace_all(slug, "-").into_owned(),
        None => slug.to_string(),
    }
}

/// `sub.root`, or just `root` without a subdomain
pub fn build_fqdn(subdomain: &str, root_domain: &str) -> String {
    let root = normalize_domain(root_domain);
    let sub = clean_subdomain(Some(subdomain));
    if sub.is_empty() {
        root
    } else {
        format!("{}.{}", sub, root)
    }
}
