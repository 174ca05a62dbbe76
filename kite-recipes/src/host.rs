//! Local host identity

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};

/// Maximum length of host and cluster names in run statistics
pub const MAX_NAME_LEN: usize = 64;

/// Where a job ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub host: String,
    pub cluster: String,
}

impl HostIdentity {
    /// Identity of the machine running this process
    pub fn local() -> Self {
        let host = hostname();
        let cluster = cluster_address(&host);
        Self::new(host, cluster)
    }

    /// Builds an identity, truncating both names
    pub fn new(host: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            host: truncate(host.into()),
            cluster: truncate(cluster.into()),
        }
    }
}

/// Hostname from the kernel, falling back to `$HOSTNAME`
pub fn hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// First IPv4 address `host` resolves to, or `unknown`
pub fn cluster_address(host: &str) -> String {
    (host, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(SocketAddr::is_ipv4))
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Number of logical CPUs available to this process
pub fn cpu_count() -> u32 {
    num_cpus::get() as u32
}

fn truncate(mut name: String) -> String {
    if let Some((idx, _)) = name.char_indices().nth(MAX_NAME_LEN) {
        name.truncate(idx);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_truncated() {
        let id = HostIdentity::new("h".repeat(100), "c".repeat(65));
        assert_eq!(id.host.len(), MAX_NAME_LEN);
        assert_eq!(id.cluster.len(), MAX_NAME_LEN);

        let short = HostIdentity::new("node01", "10.0.0.1");
        assert_eq!(short.host, "node01");
    }

    #[test]
    fn test_local_identity() {
        let id = HostIdentity::local();
        assert!(!id.host.is_empty());
        assert!(!id.cluster.is_empty());
        assert!(id.host.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn test_unresolvable_cluster() {
        assert_eq!(cluster_address("no-such-host.invalid"), "unknown");
    }

    #[test]
    fn test_cpu_count() {
        assert!(cpu_count() >= 1);
    }
}
