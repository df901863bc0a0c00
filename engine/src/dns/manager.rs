//! Provider-backed DNS manager

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::dns::powerdns::{PowerDnsProvider, POWERDNS_PROVIDER};
use crate::dns::records::{generate_app_records, DnsRecord, RecordTarget};
use crate::dns::DnsManager;
use crate::errors::EngineError;
use crate::models::{AppInstance, Domain};
use crate::storage::settings::DnsSettings;

/// A DNS hosting provider able to hold a zone's records
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create the zone if the provider does not have it yet
    async fn ensure_zone(&self, domain: &Domain) -> Result<(), EngineError>;

    /// Create or replace one record set
    async fn upsert_record(&self, domain: &Domain, record: &DnsRecord) -> Result<(), EngineError>;
}

/// DNS manager dispatching to a provider by the domain's `provider_type`
pub struct ProviderDnsManager {
    providers: HashMap<String, Arc<dyn DnsProvider>>,
    target: RecordTarget,
}

impl ProviderDnsManager {
    pub fn new(target: RecordTarget) -> Self {
        Self {
            providers: HashMap::new(),
            target,
        }
    }

    /// Manager for the configured record targets with the PowerDNS
    /// provider registered. API calls give up after `timeout`.
    pub fn from_settings(settings: &DnsSettings, timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::ConfigError(format!("Failed to build DNS HTTP client: {}", e)))?;
        let powerdns = PowerDnsProvider::new(
            client,
            &settings.powerdns_url,
            &settings.powerdns_server_id,
            settings.powerdns_api_key.clone(),
        )?;

        Ok(Self::new(settings.record_target()).with_provider(POWERDNS_PROVIDER, Arc::new(powerdns)))
    }

    /// Register a provider under a case-insensitive key
    pub fn with_provider(mut self, provider_type: &str, provider: Arc<dyn DnsProvider>) -> Self {
        self.providers.insert(provider_type.to_lowercase(), provider);
        self
    }

    fn provider_for(&self, domain: &Domain) -> Result<&Arc<dyn DnsProvider>, EngineError> {
        let key = domain.provider_type.to_lowercase();
        self.providers
            .get(&key)
            .ok_or_else(|| EngineError::DnsError(format!("Unsupported DNS provider: {}", key)))
    }
}

#[async_trait]
impl DnsManager for ProviderDnsManager {
    async fn create_records_for_deployment(
        &self,
        instance: &AppInstance,
        domain: &Domain,
        subdomains: &[String],
    ) -> Result<Vec<DnsRecord>, EngineError> {
        let provider = self.provider_for(domain)?;
        provider.ensure_zone(domain).await?;

        let records = generate_app_records(domain, subdomains, &self.target, instance.dns_template);
        for record in &records {
            debug!(
                "Upserting {} {} -> {} in {}",
                record.record_type.as_str(),
                record.name,
                record.value,
                domain.domain_name
            );
            provider.upsert_record(domain, record).await?;
        }

        info!(
            "Provisioned {} DNS records in {} for app instance {}",
            records.len(),
            domain.domain_name,
            instance.id
        );
        Ok(records)
    }
}
