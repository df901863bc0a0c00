//! DNS record generation

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::Domain;

pub const DEFAULT_TTL: u32 = 300;
pub const ACME_CHALLENGE_TTL: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "MX")]
    Mx,
    #[serde(rename = "TXT")]
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
        }
    }
}

/// A record to create in a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub domain_id: i64,
    pub record_type: RecordType,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

impl DnsRecord {
    pub fn new(domain: &Domain, record_type: RecordType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain_id: domain.id,
            record_type,
            name: name.into(),
            value: value.into(),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Addresses the base records point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    pub ipv4: String,
    pub ipv6: Option<String>,
}

impl Default for RecordTarget {
    fn default() -> Self {
        Self {
            ipv4: "0.0.0.0".to_string(),
            ipv6: None,
        }
    }
}

/// Application-specific record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsTemplate {
    Wordpress,
    Laravel,
    Nodejs,
    EmailServer,
    BasicSite,
}

impl std::str::FromStr for DnsTemplate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wordpress" => Ok(DnsTemplate::Wordpress),
            "laravel" => Ok(DnsTemplate::Laravel),
            "nodejs" => Ok(DnsTemplate::Nodejs),
            "email_server" => Ok(DnsTemplate::EmailServer),
            "basic_site" => Ok(DnsTemplate::BasicSite),
            other => Err(EngineError::ValidationError(format!("Unknown DNS template: {}", other))),
        }
    }
}

impl DnsTemplate {
    pub fn records(&self, domain: &Domain, target: &RecordTarget) -> Vec<DnsRecord> {
        let zone = domain.domain_name.as_str();
        match self {
            DnsTemplate::Wordpress => vec![
                DnsRecord::new(domain, RecordType::A, zone, &target.ipv4),
                DnsRecord::new(domain, RecordType::Cname, "www", zone),
            ],
            DnsTemplate::Laravel => vec![
                DnsRecord::new(domain, RecordType::A, zone, &target.ipv4),
                DnsRecord::new(domain, RecordType::Txt, "app", "laravel"),
            ],
            DnsTemplate::Nodejs | DnsTemplate::BasicSite => {
                vec![DnsRecord::new(domain, RecordType::A, zone, &target.ipv4)]
            }
            DnsTemplate::EmailServer => vec![
                DnsRecord::new(domain, RecordType::Mx, zone, format!("mail.{}", zone)),
                DnsRecord::new(
                    domain,
                    RecordType::Txt,
                    zone,
                    format!("v=spf1 include:mail.{} ~all", zone),
                ),
                DnsRecord::new(
                    domain,
                    RecordType::Txt,
                    format!("_dmarc.{}", zone),
                    format!("v=DMARC1; p=quarantine; rua=mailto:dmarc@{}", zone),
                ),
            ],
        }
    }
}

/// Base apex records plus one CNAME per subdomain, then template records
pub fn generate_app_records(
    domain: &Domain,
    subdomains: &[String],
    target: &RecordTarget,
    template: Option<DnsTemplate>,
) -> Vec<DnsRecord> {
    let zone = domain.domain_name.as_str();
    let mut records = vec![DnsRecord::new(domain, RecordType::A, zone, &target.ipv4)];
    if let Some(ipv6) = &target.ipv6 {
        records.push(DnsRecord::new(domain, RecordType::Aaaa, zone, ipv6));
    }
    for sub in subdomains {
        records.push(DnsRecord::new(domain, RecordType::Cname, sub, zone));
    }
    if let Some(template) = template {
        records.extend(template.records(domain, target));
    }
    records
}

/// TXT record answering an ACME DNS-01 challenge
pub fn acme_challenge_record(domain: &Domain, token: &str) -> DnsRecord {
    DnsRecord {
        ttl: ACME_CHALLENGE_TTL,
        ..DnsRecord::new(domain, RecordType::Txt, "_acme-challenge", token)
    }
}
