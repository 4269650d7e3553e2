//! Permission grants and the derived permission map.

use std::collections::HashMap;

/// Grants every authenticated user holds.
pub const BASE_GRANTS: &[&str] = &[
    "profile:read",
    "profile:write",
    "ui:overview",
    "documents:read",
    "requirements:read",
    "summary:read",
];

/// Additional grants held by pilot-program members.
pub const PILOT_GRANTS: &[&str] = &[
    "api:basic",
    "ui:documents",
    "ui:requirements",
    "documents:write",
    "requirements:write",
    "summary:write",
];

/// Outcome of a permission-map lookup.
///
/// `Unknown` is distinct from `Denied`: an absent entry says nothing about
/// the permission, and only the provider can answer for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Unknown,
}

/// Returns true when `grant` covers `required`, either exactly or through
/// the namespace wildcard form (`documents:*` covers `documents:read`).
pub fn grant_covers(grant: &str, required: &str) -> bool {
    if grant == required {
        return true;
    }
    match grant.strip_suffix(":*") {
        Some(namespace) => required
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with(':')),
        None => false,
    }
}

/// Locally-derived permission entries with tri-state lookups.
///
/// Entries hold explicit verdicts, both grants and denials. Anything absent
/// is [`PermissionState::Unknown`] and falls through to a provider claim
/// check, whose verdict is then cached here until the map is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct PermissionMap {
    entries: HashMap<String, bool>,
}

impl PermissionMap {
    /// Builds the map for a fresh identity from the static grant sets.
    pub fn for_identity(pilot: bool) -> Self {
        let mut entries = HashMap::new();
        for grant in BASE_GRANTS {
            entries.insert((*grant).to_string(), true);
        }
        if pilot {
            for grant in PILOT_GRANTS {
                entries.insert((*grant).to_string(), true);
            }
        }
        Self { entries }
    }

    /// Looks up a single permission. Exact entries win over wildcards, and
    /// wildcard entries only ever grant.
    pub fn lookup(&self, required: &str) -> PermissionState {
        if let Some(allowed) = self.entries.get(required) {
            return if *allowed {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        let covered = self
            .entries
            .iter()
            .any(|(grant, allowed)| *allowed && grant_covers(grant, required));
        if covered {
            PermissionState::Granted
        } else {
            PermissionState::Unknown
        }
    }

    /// Caches a provider claim verdict until the next rebuild.
    pub fn record_claim(&mut self, permission: &str, allowed: bool) {
        self.entries.insert(permission.to_string(), allowed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
