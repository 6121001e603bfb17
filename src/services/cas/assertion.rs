/*
 * Responsibility
 * - The validated identity produced by redeeming a ticket (Assertion)
 * - Immutable after construction; serializable so it can live in a session
 */
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute values are opaque to the client: CAS servers release strings,
/// lists or nested objects depending on their configuration.
pub type Attributes = HashMap<String, serde_json::Value>;

/// The authenticated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributePrincipal {
    name: String,
    #[serde(default)]
    attributes: Attributes,
    // Resolved from the PGT IOU when a proxy callback was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy_granting_ticket: Option<String>,
}

impl AttributePrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            proxy_granting_ticket: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_proxy_granting_ticket(mut self, pgt: impl Into<String>) -> Self {
        self.proxy_granting_ticket = Some(pgt.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn proxy_granting_ticket(&self) -> Option<&str> {
        self.proxy_granting_ticket.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    principal: AttributePrincipal,
    #[serde(default)]
    attributes: Attributes,
    authentication_date: DateTime<Utc>,
}

impl Assertion {
    pub fn new(principal: AttributePrincipal) -> Self {
        Self {
            principal,
            attributes: Attributes::new(),
            authentication_date: Utc::now(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn principal(&self) -> &AttributePrincipal {
        &self.principal
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn authentication_date(&self) -> DateTime<Utc> {
        self.authentication_date
    }

    /// A session-restored assertion only counts when it names a principal.
    pub fn is_authenticated(&self) -> bool {
        !self.principal.name.trim().is_empty()
    }
}
