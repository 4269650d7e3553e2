//! Access control for the Clarity gate.
//!
//! Derives a local permission map from the identity (base grants plus the
//! pilot-program extras), answers permission and role questions, and gates
//! dashboard routes. Whatever the map cannot answer goes to the provider
//! through [`ClaimSource`], failing closed.

pub mod claims;
pub mod evaluator;
pub mod permissions;
pub mod routes;

pub use claims::{ClaimError, ClaimSource, DenyAllClaims};
pub use evaluator::{AccessEvaluator, IdentityContext};
pub use permissions::{grant_covers, PermissionMap, PermissionState, BASE_GRANTS, PILOT_GRANTS};
pub use routes::{
    dashboard_routes, is_public_route, route_requirements, PROFILE_COMPLETION_ROUTE, PUBLIC_ROUTES,
};
