//! Registration document rendering.
//!
//! The document is built once per service, before any network call, and the
//! same bytes are sent on every registration attempt for the life of the
//! process:
//!
//! ```text
//! {"Name":"api","ID":"api-1","Check":{"TTL":"30s"},"Port":8080,"Tags":["web","v2"]}
//! ```

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceDescriptor;

/// Failure to render a registration document.
#[derive(Debug, Error)]
#[error("unable to generate JSON for service {service}: {source}")]
pub struct PayloadError {
    pub service: String,
    #[source]
    pub source: serde_json::Error,
}

/// Serialized registration body. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPayload(Arc<[u8]>);

impl RegistrationPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Rendered by serde_json, always UTF-8.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRegistration<'a> {
    name: &'a str,
    #[serde(rename = "ID")]
    id: &'a str,
    check: TtlCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

#[derive(Serialize)]
struct TtlCheck {
    #[serde(rename = "TTL")]
    ttl: String,
}

/// Render the registration document for a service.
pub fn build_payload(descriptor: &ServiceDescriptor) -> Result<RegistrationPayload, PayloadError> {
    let document = ServiceRegistration {
        name: &descriptor.name,
        id: &descriptor.id,
        check: TtlCheck {
            ttl: format!("{}s", descriptor.ttl_secs),
        },
        port: descriptor.port,
        tags: &descriptor.tags,
    };

    let bytes = serde_json::to_vec(&document).map_err(|source| PayloadError {
        service: descriptor.name.clone(),
        source,
    })?;

    Ok(RegistrationPayload(bytes.into()))
}
