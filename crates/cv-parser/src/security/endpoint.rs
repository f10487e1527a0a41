//! Startup-time SSRF guard for the object-store endpoint.
//!
//! The endpoint URL comes from deployment configuration, not per-job input,
//! so this check runs once at startup. Structural problems (bad URL, wrong
//! scheme, missing host) fail closed; an unrecognized host only produces a
//! warning so private deployments behind custom DNS names keep working.

use reqwest::Url;
use tracing::warn;

use crate::error::SecurityError;

/// Hosts that are always accepted without a warning.
const ALLOWED_HOSTS: &[&str] = &[
    "localhost",
    "minio",
    "s3.amazonaws.com",
    "storage.googleapis.com",
];

/// Domain suffixes covering regional endpoints of the major providers.
const ALLOWED_SUFFIXES: &[&str] = &[
    ".amazonaws.com",
    ".r2.cloudflarestorage.com",
    ".digitaloceanspaces.com",
];

pub struct EndpointGuard;

impl EndpointGuard {
    /// Validates a storage endpoint URL.
    ///
    /// Returns `Ok(true)` when the host is on the allowlist, `Ok(false)` when
    /// it is unknown (a warning is logged and operation continues).
    pub fn validate(endpoint: &str) -> Result<bool, SecurityError> {
        let url = Url::parse(endpoint)
            .map_err(|_| SecurityError::InvalidUrl(endpoint.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(SecurityError::DisallowedScheme(other.to_string())),
        }

        let host = url.host_str().ok_or(SecurityError::MissingHost)?;

        if Self::is_known_host(host) {
            return Ok(true);
        }

        warn!(host, "storage endpoint host is not on the allowlist");
        Ok(false)
    }

    fn is_known_host(host: &str) -> bool {
        if ALLOWED_HOSTS.contains(&host) {
            return true;
        }
        if ALLOWED_SUFFIXES.iter().any(|s| host.ends_with(s)) {
            return true;
        }
        // Dotted-quad IPv4: container networks address MinIO by IP.
        is_ipv4(host)
    }
}

fn is_ipv4(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 3 && o.bytes().all(|b| b.is_ascii_digit()))
}
