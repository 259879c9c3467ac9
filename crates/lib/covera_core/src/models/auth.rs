//! Session models: credentials, profile, and the session endpoint payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{lenient_string, lenient_u32};

/// Signed-in user's profile. Replaced wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub level: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub policy_count: u32,
}

impl UserProfile {
    /// "First Last", falling back to the email when no name is set.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Access + refresh token pair and the profile they were issued for.
///
/// Both tokens are plain fields of one value, so a half-written credential
/// cannot be represented. Stored under the fixed keys `accessToken`,
/// `refreshToken` and `user`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "user")]
    pub profile: UserProfile,
}

impl Credential {
    /// Same tokens, new profile.
    #[must_use]
    pub fn with_profile(&self, profile: UserProfile) -> Self {
        Self {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            profile,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("profile", &self.profile)
            .finish()
    }
}

/// Response of `/session/login`, `/session/register` and `/session/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

impl From<TokenEnvelope> for Credential {
    fn from(envelope: TokenEnvelope) -> Self {
        Self {
            access_token: envelope.access_token,
            refresh_token: envelope.refresh_token,
            profile: envelope.profile,
        }
    }
}

/// Body of `POST /session/refresh`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub email: &'a str,
    pub refresh_token: &'a str,
}

/// Body of `POST /session/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /session/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_flat_profile() {
        let json = serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "email": "ann@example.com",
            "firstName": "Ann",
            "lastName": "Lee",
            "role": "client",
            "level": 2,
            "policyCount": "3"
        });
        let cred: Credential = serde_json::from_value::<TokenEnvelope>(json).unwrap().into();
        assert_eq!(cred.access_token, "a1");
        assert_eq!(cred.refresh_token, "r1");
        assert_eq!(cred.profile.email, "ann@example.com");
        assert_eq!(cred.profile.level, "2");
        assert_eq!(cred.profile.policy_count, 3);
    }

    #[test]
    fn oversized_policy_count_saturates() {
        let json = serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "policyCount": 5_000_000_000u64
        });
        let cred: Credential = serde_json::from_value::<TokenEnvelope>(json).unwrap().into();
        assert_eq!(cred.profile.policy_count, u32::MAX);

        let json = serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "policyCount": "5000000000"
        });
        let cred: Credential = serde_json::from_value::<TokenEnvelope>(json).unwrap().into();
        assert_eq!(cred.profile.policy_count, u32::MAX);
    }

    #[test]
    fn envelope_without_tokens_is_rejected() {
        let json = serde_json::json!({ "accessToken": "a1", "email": "x@example.com" });
        assert!(serde_json::from_value::<TokenEnvelope>(json).is_err());
    }

    #[test]
    fn credential_uses_fixed_storage_keys() {
        let cred = Credential {
            access_token: "a".into(),
            refresh_token: "r".into(),
            profile: UserProfile::default(),
        };
        let value = serde_json::to_value(&cred).unwrap();
        assert!(value.get("accessToken").is_some());
        assert!(value.get("refreshToken").is_some());
        assert!(value.get("user").is_some());
    }

    #[test]
    fn debug_redacts_tokens() {
        let cred = Credential {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            profile: UserProfile::default(),
        };
        let printed = format!("{cred:?}");
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut profile = UserProfile {
            email: "ann@example.com".into(),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "ann@example.com");
        profile.first_name = "Ann".into();
        assert_eq!(profile.display_name(), "Ann");
    }
}
