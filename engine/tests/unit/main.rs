//! Integration tests for the deployment engine and agent

mod common;
mod test_agent_client;
mod test_domains;
mod test_powerdns;
mod test_provisioning;
mod test_sidecar;
