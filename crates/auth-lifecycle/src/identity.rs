//! Authenticated identity and profile completeness.

use access_control::IdentityContext;
use request_orchestrator::ProfileRecord;
use serde::{Deserialize, Serialize};

/// The four profile fields the dashboard requires before unlocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub job_title: String,
}

impl ProfileFields {
    /// Complete means every field carries real content.
    pub fn is_complete(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.company,
            &self.job_title,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Who is signed in, as the rest of the gate sees it.
///
/// `profile: None` is the synthesized new-user case: the provider session
/// exists but the store has no record yet, so the next save goes through
/// the creation endpoint rather than the update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub profile: Option<ProfileFields>,
    pub token_balance: i64,
    pub pilot: bool,
}

impl AuthenticatedIdentity {
    pub fn from_record(record: ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            email: Some(record.email),
            profile: Some(ProfileFields {
                first_name: record.first_name,
                last_name: record.last_name,
                company: record.company,
                job_title: record.job_title,
            }),
            token_balance: record.token_balance,
            pilot: record.pilot,
        }
    }

    /// Minimal identity for a user the profile store does not know yet.
    /// New accounts join the pilot program.
    pub fn synthesized(user_id: String, email: Option<String>) -> Self {
        Self {
            user_id,
            email,
            profile: None,
            token_balance: 0,
            pilot: true,
        }
    }

    pub fn is_profile_complete(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(ProfileFields::is_complete)
    }

    pub fn has_stored_profile(&self) -> bool {
        self.profile.is_some()
    }

    /// Facts the access evaluator derives the permission map from.
    pub fn access_context(&self) -> IdentityContext {
        IdentityContext {
            user_id: self.user_id.clone(),
            pilot: self.pilot,
            profile_complete: self.is_profile_complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProfileRecord {
        ProfileRecord {
            user_id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            company: "Analytical Engines".to_string(),
            job_title: "Engineer".to_string(),
            token_balance: 40,
            pilot: true,
        }
    }

    #[test]
    fn test_full_record_is_complete() {
        let identity = AuthenticatedIdentity::from_record(record());
        assert!(identity.is_profile_complete());
        assert!(identity.has_stored_profile());
        assert_eq!(identity.token_balance, 40);
    }

    #[test]
    fn test_blank_field_marks_incomplete() {
        let mut partial = record();
        partial.company = "  ".to_string();
        let identity = AuthenticatedIdentity::from_record(partial);
        assert!(identity.has_stored_profile());
        assert!(!identity.is_profile_complete());
    }

    #[test]
    fn test_synthesized_identity_has_no_stored_profile() {
        let identity = AuthenticatedIdentity::synthesized(
            "user-9".to_string(),
            Some("new@example.com".to_string()),
        );
        assert!(!identity.has_stored_profile());
        assert!(!identity.is_profile_complete());
        assert!(identity.pilot);
        assert_eq!(identity.token_balance, 0);
    }

    #[test]
    fn test_access_context_reflects_identity() {
        let context = AuthenticatedIdentity::from_record(record()).access_context();
        assert_eq!(context.user_id, "user-1");
        assert!(context.pilot);
        assert!(context.profile_complete);

        let synthesized =
            AuthenticatedIdentity::synthesized("user-9".to_string(), None).access_context();
        assert!(!synthesized.profile_complete);
    }
}
