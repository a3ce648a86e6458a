//! HTTP Basic authentication
//!
//! Stateless: every request carries and is checked against its own
//! credentials.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::config::{BasicAuthConfig, DEFAULT_REALM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Ok,
    Unauthorized,
}

pub struct Authenticator {
    username: Vec<u8>,
    password: Vec<u8>,
    realm: String,
}

impl Authenticator {
    /// Build an authenticator when basic auth is configured and enabled
    pub fn from_config(config: Option<&BasicAuthConfig>) -> Option<Self> {
        let auth = config.filter(|a| a.enabled)?;
        let realm = if auth.realm.is_empty() {
            DEFAULT_REALM.to_string()
        } else {
            auth.realm.clone()
        };
        Some(Self {
            username: auth.username.as_bytes().to_vec(),
            password: auth.password.as_bytes().to_vec(),
            realm,
        })
    }

    /// `WWW-Authenticate` value sent with a 401
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm.replace('"', "'"))
    }

    /// Check the raw `Authorization` header value
    pub fn authenticate(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some((user, pass)) = authorization.and_then(decode_basic) else {
            return AuthOutcome::Unauthorized;
        };

        // Both comparisons always run so the outcome does not reveal which
        // half was wrong.
        let user_ok = user.as_bytes().ct_eq(&self.username);
        let pass_ok = pass.as_bytes().ct_eq(&self.password);
        if bool::from(user_ok & pass_ok) {
            AuthOutcome::Ok
        } else {
            AuthOutcome::Unauthorized
        }
    }
}

/// Decode `Basic <base64(user:pass)>` into its two halves
fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::from_config(Some(&BasicAuthConfig {
            enabled: true,
            username: "admin".to_string(),
            password: "s3cret:pass".to_string(),
            realm: "Staff Only".to_string(),
        }))
        .unwrap()
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    #[test]
    fn test_correct_credentials() {
        let auth = authenticator();
        assert_eq!(
            auth.authenticate(Some(&basic("admin:s3cret:pass"))),
            AuthOutcome::Ok
        );
        // Scheme is case-insensitive
        let lower = basic("admin:s3cret:pass").replacen("Basic", "basic", 1);
        assert_eq!(auth.authenticate(Some(&lower)), AuthOutcome::Ok);
    }

    #[test]
    fn test_wrong_or_missing_credentials() {
        let auth = authenticator();
        assert_eq!(auth.authenticate(None), AuthOutcome::Unauthorized);
        assert_eq!(
            auth.authenticate(Some(&basic("admin:wrong"))),
            AuthOutcome::Unauthorized
        );
        assert_eq!(
            auth.authenticate(Some(&basic("root:s3cret:pass"))),
            AuthOutcome::Unauthorized
        );
        assert_eq!(
            auth.authenticate(Some("Bearer abc")),
            AuthOutcome::Unauthorized
        );
        assert_eq!(
            auth.authenticate(Some("Basic !!notbase64!!")),
            AuthOutcome::Unauthorized
        );
        assert_eq!(
            auth.authenticate(Some(&basic("no-colon"))),
            AuthOutcome::Unauthorized
        );
    }

    #[test]
    fn test_challenge_names_realm() {
        assert_eq!(authenticator().challenge(), "Basic realm=\"Staff Only\"");
    }

    #[test]
    fn test_disabled_or_absent_config() {
        assert!(Authenticator::from_config(None).is_none());
        let disabled = BasicAuthConfig {
            enabled: false,
            username: "a".to_string(),
            password: "b".to_string(),
            realm: String::new(),
        };
        assert!(Authenticator::from_config(Some(&disabled)).is_none());
    }

    #[test]
    fn test_default_realm() {
        let auth = Authenticator::from_config(Some(&BasicAuthConfig {
            enabled: true,
            username: "a".to_string(),
            password: "b".to_string(),
            realm: String::new(),
        }))
        .unwrap();
        assert_eq!(auth.challenge(), format!("Basic realm=\"{DEFAULT_REALM}\""));
    }
}
