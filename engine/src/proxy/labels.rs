//! Traefik label builder

use std::collections::BTreeMap;

use crate::models::AppInstance;

/// Proxy settings shared by every router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOptions {
    pub entrypoint: String,
    pub cert_resolver: String,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            entrypoint: "websecure".to_string(),
            cert_resolver: "le".to_string(),
        }
    }
}

/// Labels routing the instance's FQDNs to its container port.
///
/// With no FQDNs the internal container name is used as the only host.
/// Wildcard roots are declared as TLS domains so the resolver issues one
/// wildcard certificate instead of one per host.
pub fn build_labels(
    instance: &AppInstance,
    fqdns: &[String],
    wildcard_roots: &[String],
    options: &ProxyOptions,
) -> BTreeMap<String, String> {
    let router = format!("cp-{}-router", instance.id);
    let service = format!("cp-{}-service", instance.id);

    let hosts: Vec<&str> = if fqdns.is_empty() {
        vec![instance.internal_container_name.as_str()]
    } else {
        fqdns.iter().map(String::as_str).collect()
    };
    let rule = hosts
        .iter()
        .map(|host| format!("Host(`{}`)", host))
        .collect::<Vec<_>>()
        .join(" || ");

    let mut labels = BTreeMap::new();
    labels.insert("traefik.enable".to_string(), "true".to_string());
    labels.insert(format!("traefik.http.routers.{}.rule", router), rule);
    labels.insert(
        format!("traefik.http.routers.{}.entrypoints", router),
        options.entrypoint.clone(),
    );
    labels.insert(
        format!("traefik.http.routers.{}.tls.certresolver", router),
        options.cert_resolver.clone(),
    );
    labels.insert(
        format!("traefik.http.services.{}.loadbalancer.server.port", service),
        instance.docker_port.to_string(),
    );

    for (i, root) in wildcard_roots.iter().enumerate() {
        labels.insert(
            format!("traefik.http.routers.{}.tls.domains[{}].main", router, i),
            root.clone(),
        );
        labels.insert(
            format!("traefik.http.routers.{}.tls.domains[{}].sans", router, i),
            format!("*.{}", root),
        );
    }

    labels
}
