//! Permission and route-access evaluation.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::claims::ClaimSource;
use crate::permissions::{PermissionMap, PermissionState};
use crate::routes::{is_public_route, route_requirements, PROFILE_COMPLETION_ROUTE};

/// Identity facts the evaluator derives access from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub user_id: String,
    pub pilot: bool,
    pub profile_complete: bool,
}

#[derive(Default)]
struct EvaluatorState {
    identity: Option<IdentityContext>,
    map: PermissionMap,
}

/// Evaluates permissions and route access for the current identity.
///
/// The permission map is rebuilt whenever the identity changes. Lookups the
/// map cannot answer go to the provider-backed [`ClaimSource`], and the
/// verdict, grant or denial alike, is cached into the map until the next
/// rebuild. Claim failures deny without being cached, so the next lookup
/// asks the provider again.
pub struct AccessEvaluator {
    claims: Arc<dyn ClaimSource>,
    state: Mutex<EvaluatorState>,
}

impl AccessEvaluator {
    pub fn new(claims: Arc<dyn ClaimSource>) -> Self {
        Self {
            claims,
            state: Mutex::new(EvaluatorState::default()),
        }
    }

    /// Rebuilds the permission map for a new identity, or clears everything
    /// when the identity is gone. Cached claim verdicts do not survive this.
    pub fn recompute(&self, identity: Option<IdentityContext>) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.map = match &identity {
            Some(context) => PermissionMap::for_identity(context.pilot),
            None => PermissionMap::default(),
        };
        match &identity {
            Some(context) => debug!(
                user_id = %context.user_id,
                pilot = context.pilot,
                entries = state.map.len(),
                "Rebuilt permission map"
            ),
            None => debug!("Cleared permission map"),
        }
        state.identity = identity;
    }

    pub fn identity(&self) -> Option<IdentityContext> {
        self.state.lock().expect("lock poisoned").identity.clone()
    }

    /// Returns true only when every listed permission holds.
    ///
    /// Without an identity the answer is always false, even for an empty
    /// list. With one, an empty list is trivially granted.
    pub async fn is_access_granted(&self, required: &[&str]) -> bool {
        let (user_id, unresolved) = {
            let state = self.state.lock().expect("lock poisoned");
            let Some(identity) = &state.identity else {
                return false;
            };
            let mut unresolved = Vec::new();
            for permission in required {
                match state.map.lookup(permission) {
                    PermissionState::Granted => {}
                    PermissionState::Denied => {
                        debug!(permission, "Permission denied by map");
                        return false;
                    }
                    PermissionState::Unknown => unresolved.push((*permission).to_string()),
                }
            }
            (identity.user_id.clone(), unresolved)
        };

        for permission in unresolved {
            let allowed = match self
                .claims
                .check_permission_claim(&user_id, &permission)
                .await
            {
                Ok(allowed) => {
                    let mut state = self.state.lock().expect("lock poisoned");
                    // The identity may have changed while the claim was in
                    // flight. A stale verdict must not leak into the new map.
                    let same_user = state
                        .identity
                        .as_ref()
                        .is_some_and(|identity| identity.user_id == user_id);
                    if same_user {
                        state.map.record_claim(&permission, allowed);
                    }
                    allowed
                }
                Err(err) => {
                    warn!(permission = %permission, error = %err, "Claim check failed, denying");
                    false
                }
            };
            if !allowed {
                debug!(permission = %permission, "Permission denied by claim");
                return false;
            }
        }
        true
    }

    /// Role membership. `user` holds for any identity and `pilot` comes from
    /// the local flag; everything else asks the provider.
    pub async fn has_role(&self, role: &str) -> bool {
        let identity = self.identity();
        let Some(identity) = identity else {
            return false;
        };
        match role {
            "user" => true,
            "pilot" => identity.pilot,
            other => match self.claims.check_role_claim(&identity.user_id, other).await {
                Ok(held) => held,
                Err(err) => {
                    warn!(role = other, error = %err, "Role claim check failed, denying");
                    false
                }
            },
        }
    }

    /// Route gate, evaluated in priority order: public routes always pass,
    /// no identity always fails, an incomplete profile reaches only the
    /// completion route, and everything else consults the route table with
    /// unmapped routes falling back to allow.
    pub async fn can_access_route(&self, route: &str) -> bool {
        if is_public_route(route) {
            return true;
        }
        let Some(identity) = self.identity() else {
            return false;
        };
        if !identity.profile_complete {
            return route == PROFILE_COMPLETION_ROUTE;
        }
        match route_requirements(route) {
            Some(required) => self.is_access_granted(required).await,
            None => true,
        }
    }
}
