//! All-or-nothing DNS provisioning across an instance's domains

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::dns::DnsManager;
use crate::domains::DomainContext;
use crate::errors::{DnsProvisioningError, DomainFailure};
use crate::models::AppInstance;

/// Records created per domain by a successful provisioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsProvisionReport {
    /// Domain name to number of records created
    pub records_per_domain: BTreeMap<String, usize>,
}

impl DnsProvisionReport {
    pub fn total_records(&self) -> usize {
        self.records_per_domain.values().sum()
    }
}

/// Provision records for every domain context.
///
/// Domains are attempted one at a time in domain id order and every domain
/// is attempted even after a failure. The pass fails as a whole if any
/// domain failed, naming each one.
pub async fn provision_dns(
    dns: &dyn DnsManager,
    instance: &AppInstance,
    contexts: &BTreeMap<i64, DomainContext>,
) -> Result<DnsProvisionReport, DnsProvisioningError> {
    let mut report = DnsProvisionReport::default();
    let mut failures = Vec::new();

    for ctx in contexts.values() {
        let subdomains: Vec<String> = ctx.subdomains.iter().cloned().collect();
        match dns
            .create_records_for_deployment(instance, &ctx.domain, &subdomains)
            .await
        {
            Ok(records) => {
                report
                    .records_per_domain
                    .insert(ctx.domain.domain_name.clone(), records.len());
            }
            Err(e) => {
                error!(
                    "DNS provisioning failed for domain {}: {}",
                    ctx.domain.domain_name, e
                );
                failures.push(DomainFailure {
                    domain_name: ctx.domain.domain_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(DnsProvisioningError { failures });
    }

    info!(
        "DNS provisioned for app instance {} ({} records across {} domains)",
        instance.id,
        report.total_records(),
        report.records_per_domain.len()
    );
    Ok(report)
}
