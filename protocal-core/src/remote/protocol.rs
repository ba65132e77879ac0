//! JSON protocol between the CLI and the bridge executable.
//!
//! The bridge owns every cryptographic secret: SRP proofs, keyrings,
//! passphrases, codecs. What crosses this protocol is either plain
//! account data or an opaque handle naming a resource that lives inside
//! the bridge process. The protocol is language-agnostic; any bridge
//! that speaks line-delimited JSON on stdin/stdout can serve.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::calendar::Calendar;

/// A typed bridge command: its parameter struct plus the response type
/// it decodes to.
pub trait BridgeCommand: Serialize {
    type Response: DeserializeOwned;

    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    AuthInfo,
    Authenticate,
    BindSession,
    ListCalendars,
    UserKeyRing,
    AddressKeyRing,
    MemberPassphrase,
    CalendarKeyRing,
    NewDecryptor,
    NewEncryptor,
    ListEvents,
    GetEvent,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    Release,
}

/// Request frame written to the bridge, one per line.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: Value,
}

/// Response frame read back from the bridge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Bridge-side handle for a derived keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyRing(String);

impl KeyRing {
    pub fn new(id: impl Into<String>) -> Self {
        KeyRing(id.into())
    }
}

/// Bridge-side handle for a calendar member passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberPassphrase(String);

impl MemberPassphrase {
    pub fn new(id: impl Into<String>) -> Self {
        MemberPassphrase(id.into())
    }
}

/// Bridge-side handle for an event decryptor or encryptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecHandle(String);

impl CodecHandle {
    pub fn new(id: impl Into<String>) -> Self {
        CodecHandle(id.into())
    }
}

/// How the account's login and mailbox secrets relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordMode {
    /// One password unlocks both login and mailbox.
    One,
    /// Login and mailbox passwords are separate.
    Two,
}

/// Second factor the service demands before authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactor {
    Totp,
}

/// Pre-authentication material declared by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub password_mode: PasswordMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_factor: Option<SecondFactor>,
    /// SRP challenge material, echoed back verbatim at authentication.
    #[serde(default)]
    pub srp: Value,
}

/// Authenticated session material.
///
/// `key_pass` and `keys` are opaque blobs the CLI only ever hands back
/// to the bridge for keyring derivation.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub session_uid: String,
    pub user_id: String,
    pub key_pass: Value,
    #[serde(default)]
    pub keys: Value,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("session_uid", &self.session_uid)
            .field("user_id", &self.user_id)
            .field("key_pass", &"<redacted>")
            .field("keys", &"<redacted>")
            .finish()
    }
}

/// Capability token unlocking non-primary address keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateKeyToken {
    /// Let the bridge use its built-in derivation.
    #[default]
    Default,
}

/// Everything a decryptor or encryptor is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSpec {
    pub calendar_id: String,
    pub passphrase: MemberPassphrase,
    pub user_key_ring: KeyRing,
    pub address_key_ring: KeyRing,
    pub calendar_key_ring: KeyRing,
}

/// A decrypted event as the bridge returns it: envelope identity plus
/// the textual payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub calendar_id: String,
    pub ics: String,
}

/// Identity of a created or updated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub calendar_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchAuthInfo {
    pub username: String,
    pub app_version: String,
}

impl BridgeCommand for FetchAuthInfo {
    type Response = AuthInfo;

    fn command() -> Command {
        Command::AuthInfo
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Authenticate {
    pub config: super::auth::AuthConfig,
}

impl BridgeCommand for Authenticate {
    type Response = AuthContext;

    fn command() -> Command {
        Command::Authenticate
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BindSession {
    pub session_uid: String,
}

impl BridgeCommand for BindSession {
    type Response = ();

    fn command() -> Command {
        Command::BindSession
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCalendars {}

impl BridgeCommand for ListCalendars {
    type Response = Vec<Calendar>;

    fn command() -> Command {
        Command::ListCalendars
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeriveUserKeyRing {
    pub user_id: String,
    pub key_pass: Value,
    pub keys: Value,
}

impl BridgeCommand for DeriveUserKeyRing {
    type Response = KeyRing;

    fn command() -> Command {
        Command::UserKeyRing
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeriveAddressKeyRing {
    pub user_id: String,
    pub key_pass: Value,
    pub keys: Value,
    pub token: PrivateKeyToken,
}

impl BridgeCommand for DeriveAddressKeyRing {
    type Response = KeyRing;

    fn command() -> Command {
        Command::AddressKeyRing
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchMemberPassphrase {
    pub calendar_id: String,
    pub address_key_ring: KeyRing,
}

impl BridgeCommand for FetchMemberPassphrase {
    type Response = MemberPassphrase;

    fn command() -> Command {
        Command::MemberPassphrase
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeriveCalendarKeyRing {
    pub calendar_id: String,
    pub passphrase: MemberPassphrase,
}

impl BridgeCommand for DeriveCalendarKeyRing {
    type Response = KeyRing;

    fn command() -> Command {
        Command::CalendarKeyRing
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewDecryptor(pub CodecSpec);

impl BridgeCommand for NewDecryptor {
    type Response = CodecHandle;

    fn command() -> Command {
        Command::NewDecryptor
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewEncryptor(pub CodecSpec);

impl BridgeCommand for NewEncryptor {
    type Response = CodecHandle;

    fn command() -> Command {
        Command::NewEncryptor
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    pub codec: CodecHandle,
    pub from: String,
    pub to: String,
    /// Extra event filter; the bridge applies its default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl BridgeCommand for ListEvents {
    type Response = Vec<RemoteEvent>;

    fn command() -> Command {
        Command::ListEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetEvent {
    pub codec: CodecHandle,
    pub event_id: String,
}

impl BridgeCommand for GetEvent {
    type Response = RemoteEvent;

    fn command() -> Command {
        Command::GetEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    pub codec: CodecHandle,
    pub ics: String,
}

impl BridgeCommand for CreateEvent {
    type Response = EventRef;

    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub codec: CodecHandle,
    pub event_id: String,
    pub ics: String,
}

impl BridgeCommand for UpdateEvent {
    type Response = EventRef;

    fn command() -> Command {
        Command::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub codec: CodecHandle,
    pub event_id: String,
}

impl BridgeCommand for DeleteEvent {
    type Response = ();

    fn command() -> Command {
        Command::DeleteEvent
    }
}
