//! Account credentials read from the process environment.

use crate::error::{CalError, CalResult};

pub const ENV_USERNAME: &str = "PROTON_USERNAME";
/// Older name for the username variable, still honored.
pub const ENV_LEGACY_USERNAME: &str = "PROTON_ACCOUNT";
pub const ENV_PASSWORD: &str = "PROTON_PASSWORD";
/// Separate mailbox password for two-password accounts. Falls back to
/// the login password when unset.
pub const ENV_MAILBOX_PASSWORD: &str = "PROTON_MAILBOX_PASSWORD";

/// Raw account secrets for a single invocation.
///
/// Held in memory only; never written to disk and never logged.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub mailbox_password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mailbox_password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Read credentials from the environment.
    ///
    /// The username comes from `PROTON_USERNAME`, or `PROTON_ACCOUNT`
    /// as a fallback; both are trimmed. The mailbox password defaults
    /// to the login password when `PROTON_MAILBOX_PASSWORD` is absent.
    pub fn from_env() -> CalResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> CalResult<Self> {
        let username = [get(ENV_USERNAME), get(ENV_LEGACY_USERNAME)]
            .into_iter()
            .flatten()
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        let password = get(ENV_PASSWORD).filter(|p| !p.is_empty());

        let (Some(username), Some(password)) = (username, password) else {
            return Err(CalError::MissingCredential);
        };

        let mailbox_password = get(ENV_MAILBOX_PASSWORD)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| password.clone());

        Ok(Credential {
            username,
            password,
            mailbox_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn from_map(map: &HashMap<String, String>) -> CalResult<Credential> {
        Credential::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn reads_username_and_password() {
        let map = env(&[(ENV_USERNAME, "user@proton.me"), (ENV_PASSWORD, "pw")]);
        let credential = from_map(&map).unwrap();
        assert_eq!(credential.username, "user@proton.me");
        assert_eq!(credential.password, "pw");
        assert_eq!(credential.mailbox_password, "pw");
    }

    #[test]
    fn primary_username_beats_legacy() {
        let map = env(&[
            (ENV_USERNAME, "primary@proton.me"),
            (ENV_LEGACY_USERNAME, "legacy@proton.me"),
            (ENV_PASSWORD, "pw"),
        ]);
        assert_eq!(from_map(&map).unwrap().username, "primary@proton.me");
    }

    #[test]
    fn blank_primary_falls_back_to_legacy() {
        let map = env(&[
            (ENV_USERNAME, "   "),
            (ENV_LEGACY_USERNAME, " legacy@proton.me "),
            (ENV_PASSWORD, "pw"),
        ]);
        assert_eq!(from_map(&map).unwrap().username, "legacy@proton.me");
    }

    #[test]
    fn separate_mailbox_password_is_kept() {
        let map = env(&[
            (ENV_USERNAME, "user@proton.me"),
            (ENV_PASSWORD, "login"),
            (ENV_MAILBOX_PASSWORD, "mailbox"),
        ]);
        let credential = from_map(&map).unwrap();
        assert_eq!(credential.password, "login");
        assert_eq!(credential.mailbox_password, "mailbox");
    }

    #[test]
    fn missing_password_is_rejected() {
        let map = env(&[(ENV_USERNAME, "user@proton.me")]);
        assert!(matches!(from_map(&map), Err(CalError::MissingCredential)));
    }

    #[test]
    fn missing_username_is_rejected() {
        let map = env(&[(ENV_PASSWORD, "pw")]);
        assert!(matches!(from_map(&map), Err(CalError::MissingCredential)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential {
            username: "user@proton.me".into(),
            password: "hunter2".into(),
            mailbox_password: "hunter3".into(),
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("user@proton.me"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("hunter3"));
    }
}
