//! Collect-then-report DNS provisioning

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use kws_engine::dns::provision_dns;
use kws_engine::domains::DomainContext;
use kws_engine::models::{AppInstance, Domain};

use crate::common::FakeDns;

fn contexts(names: &[&str]) -> BTreeMap<i64, DomainContext> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let id = i as i64 + 1;
            let mut ctx = DomainContext {
                domain: Domain::new(id, *name, "powerdns"),
                subdomains: Default::default(),
            };
            ctx.subdomains.insert("api".to_string());
            (id, ctx)
        })
        .collect()
}

fn instance() -> AppInstance {
    AppInstance::new(7, 1, 1, "Shop", "cp-app-7", "nginx:latest")
}

#[tokio::test]
async fn test_every_domain_attempted_and_failures_reported() {
    let dns = FakeDns::failing(&["a.com", "c.com"]);

    let err = provision_dns(&dns, &instance(), &contexts(&["a.com", "b.com", "c.com"]))
        .await
        .unwrap_err();

    assert_eq!(dns.calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.domain_names(), vec!["a.com", "c.com"]);
    assert!(err.failures[0].reason.contains("rejected"));
    assert_eq!(err.to_string(), "failed for domain(s): a.com, c.com");
}

#[tokio::test]
async fn test_success_reports_records_in_domain_order() {
    let dns = FakeDns::default();

    let report = provision_dns(&dns, &instance(), &contexts(&["a.com", "b.com"]))
        .await
        .unwrap();

    assert_eq!(report.total_records(), 4);
    assert_eq!(report.records_per_domain["a.com"], 2);
    let seen = dns.seen.lock().unwrap();
    assert_eq!(seen[0], ("a.com".to_string(), vec!["api".to_string()]));
    assert_eq!(seen[1].0, "b.com");
}
