// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Evaluation capabilities
//!
//! Expressions may call functions that reach outside the row being evaluated:
//! the clock, the session, sequences, the region a node lives in, and so on.
//! Each such reach is a [`Capability`]. A [`CapabilityProvider`] decides which
//! capabilities are available:
//!
//! - `Full` is what backfill and validation operators use; everything works.
//! - `Restricted` is what the builder uses while planning a schema change.
//!   Capabilities that depend on state a schema change cannot see at planning
//!   time fail with [`EvalError::Unsupported`] naming the capability.

use super::datum::Datum;
use super::error::{EvalError, EvalResult};
use crate::config::{ClusterSettings, SessionData};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Something an expression may need beyond the current row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ClusterIdentity,
    SessionData,
    Clock,
    RandomUuid,
    Sequence,
    Region,
    Tenant,
    PrivilegedAccess,
    Planner,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::ClusterIdentity,
        Capability::SessionData,
        Capability::Clock,
        Capability::RandomUuid,
        Capability::Sequence,
        Capability::Region,
        Capability::Tenant,
        Capability::PrivilegedAccess,
        Capability::Planner,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ClusterIdentity => "cluster identity",
            Capability::SessionData => "session data",
            Capability::Clock => "clock",
            Capability::RandomUuid => "random uuid generation",
            Capability::Sequence => "sequence operations",
            Capability::Region => "region information",
            Capability::Tenant => "tenant operations",
            Capability::PrivilegedAccess => "privilege checks",
            Capability::Planner => "query planning",
        };
        write!(f, "{}", name)
    }
}

/// Capabilities of the query executor: every capability is available
#[derive(Debug, Clone)]
pub struct FullCapabilities {
    settings: ClusterSettings,
    sequences: Arc<Mutex<HashMap<String, i64>>>,
}

/// Capabilities of the schema-change builder
#[derive(Debug, Clone)]
pub struct RestrictedCapabilities {
    settings: ClusterSettings,
}

const RESTRICTED_CONTEXT: &str = "schema change planning";

/// The evaluation context handed to expression checking and evaluation
#[derive(Debug, Clone)]
pub enum CapabilityProvider {
    Full(FullCapabilities),
    Restricted(RestrictedCapabilities),
}

impl CapabilityProvider {
    pub fn full(settings: ClusterSettings) -> Self {
        CapabilityProvider::Full(FullCapabilities {
            settings,
            sequences: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn restricted(settings: ClusterSettings) -> Self {
        CapabilityProvider::Restricted(RestrictedCapabilities { settings })
    }

    pub fn settings(&self) -> &ClusterSettings {
        match self {
            CapabilityProvider::Full(full) => &full.settings,
            CapabilityProvider::Restricted(restricted) => &restricted.settings,
        }
    }

    /// Whether `capability` may be used through this provider
    pub fn supports(&self, capability: Capability) -> bool {
        match self {
            CapabilityProvider::Full(_) => true,
            CapabilityProvider::Restricted(_) => matches!(
                capability,
                Capability::ClusterIdentity
                    | Capability::SessionData
                    | Capability::Clock
                    | Capability::RandomUuid
            ),
        }
    }

    /// Fail with a capability-specific error unless `capability` is supported
    pub fn require(&self, capability: Capability) -> EvalResult<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(EvalError::Unsupported {
                capability,
                context: RESTRICTED_CONTEXT,
            })
        }
    }

    pub fn cluster_id(&self) -> Uuid {
        self.settings().cluster_id
    }

    pub fn session(&self) -> &SessionData {
        &self.settings().session
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn random_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Advance the named sequence and return its new value
    pub fn next_sequence_value(&self, name: &str) -> EvalResult<i64> {
        self.require(Capability::Sequence)?;
        match self {
            CapabilityProvider::Full(full) => {
                let mut sequences = full.sequences.lock();
                let value = sequences.entry(name.to_string()).or_insert(0);
                *value = value.checked_add(1).ok_or(EvalError::Overflow)?;
                Ok(*value)
            }
            CapabilityProvider::Restricted(_) => unreachable!("rejected by require"),
        }
    }

    pub fn region(&self) -> EvalResult<String> {
        self.require(Capability::Region)?;
        Ok(self.settings().region.clone())
    }

    pub fn tenant(&self) -> EvalResult<String> {
        self.require(Capability::Tenant)?;
        Ok(self.settings().tenant.clone())
    }

    /// Whether the session user holds `privilege` on `object`
    pub fn has_privilege(&self, _object: &str, _privilege: &str) -> EvalResult<bool> {
        self.require(Capability::PrivilegedAccess)?;
        // Authorization is handled outside this crate; the executor runs as a privileged user
        Ok(true)
    }

    /// Comment attached to a catalog object
    pub fn object_description(&self, _object: &str) -> EvalResult<Datum> {
        self.require(Capability::Planner)?;
        Ok(Datum::Null)
    }
}
