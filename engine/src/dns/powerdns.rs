//! PowerDNS provider
//!
//! Zones and record sets are managed through the PowerDNS HTTP API
//! (`/servers/{server_id}/zones`). Records are written with `REPLACE`
//! changetype, so repeated deploys converge on the same rrsets.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::dns::manager::DnsProvider;
use crate::dns::records::DnsRecord;
use crate::errors::EngineError;
use crate::models::Domain;

/// Key under which domains select this provider
pub const POWERDNS_PROVIDER: &str = "powerdns";

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Serialize)]
struct CreateZone<'a> {
    name: &'a str,
    kind: &'static str,
    masters: Vec<String>,
    nameservers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PatchZone {
    rrsets: Vec<RrSet>,
}

#[derive(Debug, Serialize)]
struct RrSet {
    name: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    changetype: &'static str,
    ttl: u32,
    records: Vec<RrContent>,
}

#[derive(Debug, Serialize)]
struct RrContent {
    content: String,
    disabled: bool,
}

/// Zone name in canonical form, with trailing dot
pub fn zone_name(domain: &Domain) -> String {
    let name = domain.domain_name.trim_end_matches('.');
    format!("{}.", name)
}

/// Fully qualified rrset name of a record inside `zone` (canonical form).
///
/// Names may be relative (`api`), the apex (`@`, the zone itself) or
/// already absolute within the zone.
pub fn rrset_name(record_name: &str, zone: &str) -> String {
    let name = record_name.trim_end_matches('.');
    let bare_zone = zone.trim_end_matches('.');
    if name.is_empty() || name == "@" || name == bare_zone {
        return zone.to_string();
    }
    if name.ends_with(&format!(".{}", bare_zone)) {
        return format!("{}.", name);
    }
    format!("{}.{}", name, zone)
}

/// DNS provider backed by a PowerDNS authoritative server
pub struct PowerDnsProvider {
    client: Client,
    api_url: String,
    server_id: String,
    api_key: Option<SecretString>,
}

impl PowerDnsProvider {
    /// Create a provider for the API rooted at `api_url`
    /// (e.g. `http://cp-powerdns:8081/api/v1`)
    pub fn new(
        client: Client,
        api_url: &str,
        server_id: &str,
        api_key: Option<SecretString>,
    ) -> Result<Self, EngineError> {
        url::Url::parse(api_url)
            .map_err(|e| EngineError::ConfigError(format!("Invalid PowerDNS URL {}: {}", api_url, e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            server_id: server_id.to_string(),
            api_key,
        })
    }

    /// Get the base URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn zones_url(&self) -> String {
        format!("{}/servers/{}/zones", self.api_url, self.server_id)
    }

    fn zone_url(&self, zone: &str) -> String {
        format!("{}/{}", self.zones_url(), zone)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, EngineError> {
        request
            .send()
            .await
            .map_err(|e| EngineError::DnsError(format!("PowerDNS request {} failed: {}", url, e)))
    }

    async fn check(&self, response: Response, url: &str) -> Result<(), EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        error!("PowerDNS request {} failed: {} - {}", url, status, body);
        Err(EngineError::DnsError(format!(
            "PowerDNS API error {}: {}",
            status.as_u16(),
            if body.is_empty() { status.to_string() } else { body }
        )))
    }
}

#[async_trait]
impl DnsProvider for PowerDnsProvider {
    async fn ensure_zone(&self, domain: &Domain) -> Result<(), EngineError> {
        let zone = zone_name(domain);
        let url = self.zone_url(&zone);
        debug!("GET {}", url);

        let response = self.send(self.request(Method::GET, &url), &url).await?;
        if response.status() != StatusCode::NOT_FOUND {
            return self.check(response, &url).await;
        }

        let url = self.zones_url();
        debug!("POST {} ({})", url, zone);
        let body = CreateZone {
            name: &zone,
            kind: "Native",
            masters: Vec::new(),
            nameservers: Vec::new(),
        };
        let response = self
            .send(self.request(Method::POST, &url).json(&body), &url)
            .await?;
        self.check(response, &url).await?;
        info!("Created PowerDNS zone {}", zone);
        Ok(())
    }

    async fn upsert_record(&self, domain: &Domain, record: &DnsRecord) -> Result<(), EngineError> {
        let zone = zone_name(domain);
        let url = self.zone_url(&zone);
        let body = PatchZone {
            rrsets: vec![RrSet {
                name: rrset_name(&record.name, &zone),
                record_type: record.record_type.as_str(),
                changetype: "REPLACE",
                ttl: record.ttl,
                records: vec![RrContent {
                    content: record.value.clone(),
                    disabled: false,
                }],
            }],
        };
        debug!("PATCH {} ({} {})", url, body.rrsets[0].record_type, body.rrsets[0].name);

        let response = self
            .send(self.request(Method::PATCH, &url).json(&body), &url)
            .await?;
        self.check(response, &url).await
    }
}
