//! Pre-execution security checks
//!
//! The guard runs before any statement reaches a backend. It rejects native
//! SQL sent with a driver's default administrative account and, depending on
//! the per-driver policy, schema mutations and statements the parser cannot
//! classify. Decisions are never cached.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    ConnectionDescriptor, DriverHandle, DriverRegistry, Query, Result, StatementKind, classify_with,
};

/// Why a query was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("native queries on {driver} require a user other than the default administrative account")]
    DefaultCredentialViolation { driver: String },

    #[error("{class_name} statements are not allowed on {driver}")]
    DisallowedStatementCategory { driver: String, class_name: String },

    #[error("query contains a statement that could not be classified")]
    UnparseableStatement,
}

/// Outcome of [`SecurityGuard::authorize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDecision {
    pub allowed: bool,
    pub reason: Option<SecurityViolation>,
}

impl SecurityDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(violation: SecurityViolation) -> Self {
        Self {
            allowed: false,
            reason: Some(violation),
        }
    }

    /// `Err(Security)` for a denial
    pub fn into_result(self) -> Result<()> {
        match self.reason {
            Some(violation) if !self.allowed => Err(violation.into()),
            _ => Ok(()),
        }
    }
}

/// What a driver lets through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Allow CREATE / ALTER / DROP and friends
    pub allow_schema_mutation: bool,
    /// Allow statements the parser could not classify
    pub allow_unparseable: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allow_schema_mutation: false,
            allow_unparseable: true,
        }
    }
}

/// Policies keyed by driver id, resolved along the parent chain
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    default: SecurityPolicy,
    drivers: HashMap<String, SecurityPolicy>,
}

impl PolicySet {
    pub fn new(default: SecurityPolicy) -> Self {
        Self {
            default,
            drivers: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, driver_id: impl Into<String>, policy: SecurityPolicy) -> Self {
        self.drivers.insert(driver_id.into(), policy);
        self
    }

    /// Nearest policy in the chain of `driver`, else the default
    pub fn policy_for(&self, driver: DriverHandle<'_>) -> SecurityPolicy {
        driver
            .chain()
            .find_map(|descriptor| self.drivers.get(&descriptor.id).copied())
            .unwrap_or(self.default)
    }
}

/// Who is connected where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    pub connection_id: Uuid,
    pub driver_id: String,
    pub descriptor: ConnectionDescriptor,
    /// Authenticated user, when known independently of the connection string
    pub user: Option<String>,
}

impl ConnectionMetadata {
    pub fn new(driver_id: impl Into<String>, descriptor: ConnectionDescriptor) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            driver_id: driver_id.into(),
            descriptor,
            user: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// The metadata user, else the `USER` connection option, else empty
    pub fn resolved_user(&self) -> &str {
        self.user
            .as_deref()
            .or_else(|| self.descriptor.user())
            .unwrap_or_default()
    }
}

/// Authorizes queries against driver policy
pub struct SecurityGuard {
    registry: Arc<DriverRegistry>,
    policies: PolicySet,
}

impl SecurityGuard {
    pub fn new(registry: Arc<DriverRegistry>, policies: PolicySet) -> Self {
        Self { registry, policies }
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Decide whether `query` may run on the connection described by `metadata`
    ///
    /// Fails only when the driver is unknown; rejections are reported in the
    /// returned decision.
    pub fn authorize(&self, query: &Query, metadata: &ConnectionMetadata) -> Result<SecurityDecision> {
        let driver = self.registry.resolve(&metadata.driver_id)?;

        let Query::Native { sql, .. } = query else {
            return Ok(SecurityDecision::allow());
        };

        if let Some(admin) = driver.default_admin_user() {
            let user = metadata.resolved_user();
            if user.is_empty() || user.eq_ignore_ascii_case(admin) {
                return Ok(self.denied(
                    metadata,
                    SecurityViolation::DefaultCredentialViolation {
                        driver: driver.display_name().to_string(),
                    },
                ));
            }
        }

        let policy = self.policies.policy_for(driver);
        let classifications = match driver.parser() {
            Some(parser) => classify_with(parser.as_ref(), sql),
            None => crate::classify(sql),
        };

        if !policy.allow_schema_mutation {
            if let Some(ddl) = classifications.iter().find(|c| c.kind == StatementKind::Ddl) {
                return Ok(self.denied(
                    metadata,
                    SecurityViolation::DisallowedStatementCategory {
                        driver: driver.display_name().to_string(),
                        class_name: ddl.class_name.clone(),
                    },
                ));
            }
        }

        if !policy.allow_unparseable
            && classifications
                .iter()
                .any(|c| c.kind == StatementKind::Unparseable)
        {
            return Ok(self.denied(metadata, SecurityViolation::UnparseableStatement));
        }

        tracing::debug!(
            connection_id = %metadata.connection_id,
            driver = %driver.id(),
            statements = classifications.len(),
            "query authorized"
        );
        Ok(SecurityDecision::allow())
    }

    fn denied(&self, metadata: &ConnectionMetadata, violation: SecurityViolation) -> SecurityDecision {
        tracing::warn!(
            connection_id = %metadata.connection_id,
            driver = %metadata.driver_id,
            reason = %violation,
            "query denied"
        );
        SecurityDecision::deny(violation)
    }
}

/// Where connection metadata comes from
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, connection_id: Uuid) -> Result<ConnectionMetadata>;
}

struct CachedMetadata {
    metadata: ConnectionMetadata,
    fetched_at: Instant,
}

/// Connection metadata cached per connection id for a bounded time
pub struct MetadataCache<S> {
    source: S,
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CachedMetadata>>,
}

impl<S: MetadataSource> MetadataCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached metadata if younger than the TTL, otherwise a fresh fetch
    pub async fn get(&self, connection_id: Uuid) -> Result<ConnectionMetadata> {
        if let Some(entry) = self.entries.read().get(&connection_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.metadata.clone());
            }
        }

        let metadata = self.source.fetch(connection_id).await?;
        tracing::debug!(connection_id = %connection_id, "refreshed connection metadata");
        let mut entries = self.entries.write();
        // Sweep every expired entry, not only this connection's
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
        entries.insert(
            connection_id,
            CachedMetadata {
                metadata: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(metadata)
    }

    pub fn invalidate(&self, connection_id: Uuid) {
        self.entries.write().remove(&connection_id);
    }

    /// Number of cached entries, expired ones included until the next fetch
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
