//! Domain context resolution
//!
//! Turns an app instance's domain mappings into the FQDN list used for proxy
//! routing, the per-domain subdomain sets needing explicit DNS records, and
//! the wildcard roots needing certificate coverage. Pure: no I/O, same input
//! always yields the same output.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domains::names::{build_fqdn, clean_subdomain};
use crate::models::{AppInstance, Domain, DomainMapping};

/// One domain touched by a deployment, with the subdomains needing records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainContext {
    pub domain: Domain,
    pub subdomains: BTreeSet<String>,
}

impl DomainContext {
    fn new(domain: Domain) -> Self {
        Self {
            domain,
            subdomains: BTreeSet::new(),
        }
    }
}

/// Result of resolving an instance's domains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainResolution {
    /// FQDNs, primary first
    pub fqdns: Vec<String>,

    /// Contexts keyed by domain id
    pub contexts: BTreeMap<i64, DomainContext>,

    /// Sorted, deduplicated wildcard roots with auto-SSL
    pub wildcard_roots: Vec<String>,
}

impl DomainResolution {
    pub fn primary_fqdn(&self) -> Option<&str> {
        self.fqdns.first().map(String::as_str)
    }
}

/// Resolve the domain context of an app instance.
///
/// Mappings are ordered primary first, then by id, so the primary FQDN always
/// leads; with no primary flagged the lowest id wins. Mappings whose domain is
/// not present in `domains` are skipped. When no FQDN results, the instance's
/// legacy main domain is used with an empty subdomain set.
pub fn resolve_domain_context(
    instance: &AppInstance,
    mappings: &[DomainMapping],
    domains: &HashMap<i64, Domain>,
) -> DomainResolution {
    let mut ordered: Vec<&DomainMapping> = mappings.iter().collect();
    ordered.sort_by_key(|m| (!m.is_primary, m.id));

    let mut fqdns = Vec::with_capacity(ordered.len());
    let mut contexts: BTreeMap<i64, DomainContext> = BTreeMap::new();

    for mapping in ordered {
        let Some(domain) = domains.get(&mapping.domain_id) else {
            continue;
        };

        let sub = clean_subdomain(mapping.subdomain.as_deref());
        fqdns.push(build_fqdn(&sub, &domain.domain_name));

        let context = contexts
            .entry(domain.id)
            .or_insert_with(|| DomainContext::new(domain.clone()));
        // Wildcard zones already answer for every label
        if !sub.is_empty() && !domain.is_wildcard {
            context.subdomains.insert(sub);
        }
    }

    if fqdns.is_empty() {
        if let Some(domain) = instance.main_domain_id.and_then(|id| domains.get(&id)) {
            fqdns.push(build_fqdn("", &domain.domain_name));
            contexts
                .entry(domain.id)
                .or_insert_with(|| DomainContext::new(domain.clone()));
        }
    }

    let wildcard_roots: Vec<String> = contexts
        .values()
        .filter(|ctx| ctx.domain.is_wildcard_root())
        .map(|ctx| ctx.domain.domain_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    DomainResolution {
        fqdns,
        contexts,
        wildcard_roots,
    }
}
