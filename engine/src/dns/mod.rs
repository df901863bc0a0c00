//! DNS provisioning for deployments

pub mod manager;
pub mod powerdns;
pub mod provisioning;
pub mod records;

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::{AppInstance, Domain};
use crate::dns::records::DnsRecord;

pub use manager::{DnsProvider, ProviderDnsManager};
pub use powerdns::{PowerDnsProvider, POWERDNS_PROVIDER};
pub use provisioning::{provision_dns, DnsProvisionReport};

/// Creates the records an app instance needs in one zone.
///
/// Called on every deploy and restart, so implementations must tolerate
/// being asked for records that already exist.
#[async_trait]
pub trait DnsManager: Send + Sync {
    async fn create_records_for_deployment(
        &self,
        instance: &AppInstance,
        domain: &Domain,
        subdomains: &[String],
    ) -> Result<Vec<DnsRecord>, EngineError>;
}
