use std::net::{IpAddr, SocketAddr};

use trust_dns_resolver::TokioAsyncResolver;

use crate::core::{Error, Result};

/// Resolves a host name or IP literal, preferring IPv4
///
/// IP literals never touch the resolver.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| Error::network(format!("Failed to create resolver: {}", e)))?;
    let lookup = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| Error::network(format!("Failed to resolve {}: {}", host, e)))?;

    let first_v4 = lookup.iter().find(IpAddr::is_ipv4);
    first_v4
        .or_else(|| lookup.iter().next())
        .ok_or_else(|| Error::network(format!("No addresses found for {}", host)))
}

/// Resolves `host` and pairs it with `port`
pub async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    Ok(SocketAddr::new(resolve_host(host).await?, port))
}
