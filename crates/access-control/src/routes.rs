//! Static route access table.

/// Routes reachable without any session.
pub const PUBLIC_ROUTES: &[&str] = &["login", "signup"];

/// The only route an authenticated-but-incomplete profile may reach.
pub const PROFILE_COMPLETION_ROUTE: &str = "complete-profile";

/// Permissions required per route. Every listed permission must hold.
/// Routes absent from this table fall back to allow.
const ROUTE_REQUIREMENTS: &[(&str, &[&str])] = &[
    ("overview", &["ui:overview"]),
    ("documents", &["ui:documents", "documents:read"]),
    ("requirements", &["ui:requirements", "requirements:read"]),
    ("summary", &["summary:read"]),
];

pub fn is_public_route(route: &str) -> bool {
    PUBLIC_ROUTES.contains(&route)
}

pub fn route_requirements(route: &str) -> Option<&'static [&'static str]> {
    ROUTE_REQUIREMENTS
        .iter()
        .find(|(name, _)| *name == route)
        .map(|(_, required)| *required)
}

/// Names of the permission-gated dashboard routes.
pub fn dashboard_routes() -> impl Iterator<Item = &'static str> {
    ROUTE_REQUIREMENTS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(is_public_route("login"));
        assert!(is_public_route("signup"));
        assert!(!is_public_route("overview"));
        assert!(!is_public_route("complete-profile"));
    }

    #[test]
    fn test_mapped_routes_list_requirements() {
        assert_eq!(route_requirements("overview"), Some(&["ui:overview"][..]));
        assert_eq!(
            route_requirements("documents"),
            Some(&["ui:documents", "documents:read"][..])
        );
    }

    #[test]
    fn test_unmapped_routes_have_no_requirements() {
        assert_eq!(route_requirements("settings"), None);
        assert_eq!(route_requirements(PROFILE_COMPLETION_ROUTE), None);
    }

    #[test]
    fn test_dashboard_routes_cover_the_table() {
        let names: Vec<_> = dashboard_routes().collect();
        assert_eq!(names, vec!["overview", "documents", "requirements", "summary"]);
    }
}
