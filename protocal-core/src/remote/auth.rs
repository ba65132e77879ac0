//! Authentication material derived before the bridge logs in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::Credential;
use crate::error::{CalError, CalResult};
use crate::remote::protocol::{AuthInfo, PasswordMode, SecondFactor};

/// Environment variable holding the current TOTP code.
pub const ENV_TOTP: &str = "PROTON_TOTP";

/// One-time-password source, consulted only when the service demands a
/// second factor.
pub trait TotpProvider {
    fn code(&self) -> CalResult<String>;
}

/// Reads the current code from `PROTON_TOTP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvTotpProvider;

impl TotpProvider for EnvTotpProvider {
    fn code(&self) -> CalResult<String> {
        match std::env::var(ENV_TOTP) {
            Ok(code) if !code.trim().is_empty() => Ok(code.trim().to_string()),
            _ => Err(CalError::MissingTotp),
        }
    }
}

/// Login material combined from the raw credential and the service's
/// declared requirements.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthCredential {
    pub username: String,
    pub password: String,
    pub mailbox_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp: Option<String>,
}

impl std::fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mailbox_password", &"<redacted>")
            .field("totp", &self.totp.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthCredential {
    /// Derive the login credential for this auth round.
    ///
    /// In one-password mode the login password also unlocks the
    /// mailbox; in two-password mode the separate mailbox password is
    /// kept. The TOTP provider is only consulted when the service
    /// declares a second factor.
    pub fn derive(
        credential: &Credential,
        info: &AuthInfo,
        totp: &dyn TotpProvider,
    ) -> CalResult<Self> {
        let totp = match info.second_factor {
            Some(SecondFactor::Totp) => Some(totp.code()?),
            None => None,
        };

        let mailbox_password = match info.password_mode {
            PasswordMode::One => credential.password.clone(),
            PasswordMode::Two => credential.mailbox_password.clone(),
        };

        Ok(AuthCredential {
            username: credential.username.clone(),
            password: credential.password.clone(),
            mailbox_password,
            totp,
        })
    }
}

/// Everything the bridge needs to run the login: the derived credential
/// plus the SRP challenge echoed from auth info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub credential: AuthCredential,
    pub srp: Value,
}

impl AuthConfig {
    pub fn new(credential: AuthCredential, info: &AuthInfo) -> CalResult<Self> {
        if info.srp.is_null() {
            return Err(CalError::AuthConfig(
                "auth info carried no SRP challenge".into(),
            ));
        }
        Ok(AuthConfig {
            credential,
            srp: info.srp.clone(),
        })
    }
}
