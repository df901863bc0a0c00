//! Domain context resolution properties

use std::collections::HashMap;

use kws_engine::domains::resolve_domain_context;
use kws_engine::models::{AppInstance, Domain, DomainMapping};

fn mapping(id: i64, domain_id: i64, sub: &str, primary: bool) -> DomainMapping {
    DomainMapping {
        id,
        app_instance_id: 7,
        domain_id,
        subdomain: (!sub.is_empty()).then(|| sub.to_string()),
        is_primary: primary,
    }
}

fn domains() -> HashMap<i64, Domain> {
    let mut wildcard = Domain::new(3, "apps.kws.dev", "powerdns");
    wildcard.is_wildcard = true;
    [Domain::new(1, "a.com", "powerdns"), Domain::new(2, "b.com", "powerdns"), wildcard]
        .into_iter()
        .map(|d| (d.id, d))
        .collect()
}

#[test]
fn test_two_domain_scenario() {
    let instance = AppInstance::new(7, 1, 1, "Shop", "cp-app-7", "nginx:latest");
    let mappings = vec![mapping(1, 1, "", true), mapping(2, 2, "api", false)];

    let resolved = resolve_domain_context(&instance, &mappings, &domains());

    assert_eq!(resolved.fqdns, vec!["a.com", "api.b.com"]);
    assert!(resolved.wildcard_roots.is_empty());
    assert!(resolved.contexts[&1].subdomains.is_empty());
    assert_eq!(
        resolved.contexts[&2].subdomains.iter().collect::<Vec<_>>(),
        vec!["api"]
    );
}

#[test]
fn test_resolution_is_repeatable() {
    let instance = AppInstance::new(7, 1, 1, "Shop", "cp-app-7", "nginx:latest");
    let mappings = vec![
        mapping(4, 3, "shop", false),
        mapping(2, 2, " API. ", false),
        mapping(9, 1, "www", true),
        mapping(3, 2, "admin", false),
    ];
    let domains = domains();

    let first = resolve_domain_context(&instance, &mappings, &domains);
    let second = resolve_domain_context(&instance, &mappings, &domains);

    assert_eq!(first, second);
    assert_eq!(first.fqdns[0], "www.a.com");
    assert_eq!(first.fqdns, vec!["www.a.com", "api.b.com", "admin.b.com", "shop.apps.kws.dev"]);
    assert_eq!(first.wildcard_roots, vec!["apps.kws.dev"]);
}

#[test]
fn test_primary_always_first() {
    let instance = AppInstance::new(7, 1, 1, "Shop", "cp-app-7", "nginx:latest");
    let domains = domains();

    for primary_index in 0..3 {
        let mappings: Vec<DomainMapping> = (0..3)
            .map(|i| mapping(i as i64 + 1, i as i64 + 1, "svc", i == primary_index))
            .collect();
        let expected = mappings[primary_index].domain_id;

        let resolved = resolve_domain_context(&instance, &mappings, &domains);
        let primary_root = &domains[&expected].domain_name;
        assert_eq!(resolved.fqdns[0], format!("svc.{}", primary_root));
    }
}
