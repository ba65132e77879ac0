//! Error types shared across the protocal workspace.

use thiserror::Error;

/// Errors surfaced by the session pipeline, the event codec and the
/// calendar operations.
///
/// Pipeline stages wrap the underlying cause in their own variant, so a
/// failure always names the stage that died ("authentication failed:
/// ...", "calendar keyring failed: ..."). No stage is retried.
#[derive(Error, Debug)]
pub enum CalError {
    #[error("PROTON_USERNAME (or PROTON_ACCOUNT) and PROTON_PASSWORD must be set")]
    MissingCredential,

    #[error("PROTON_TOTP must be set when the account requires a second factor")]
    MissingTotp,

    #[error("auth info failed: {0}")]
    AuthInfo(String),

    #[error("credential setup failed: {0}")]
    CredentialSetup(String),

    #[error("auth config failed: {0}")]
    AuthConfig(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("client setup failed: {0}")]
    SessionBind(String),

    #[error("no calendars available")]
    NoCalendarsAvailable,

    #[error("calendar id not found: {0}")]
    CalendarIdNotFound(String),

    #[error("calendar name not found: {0}")]
    CalendarNameNotFound(String),

    #[error("user keyring failed: {0}")]
    UserKeyRing(String),

    #[error("address keyring failed: {0}")]
    AddressKeyRing(String),

    #[error("calendar passphrase failed: {0}")]
    MemberPassphrase(String),

    #[error("calendar keyring failed: {0}")]
    CalendarKeyRing(String),

    #[error("calendar decryptor failed: {0}")]
    DecryptorSetup(String),

    #[error("calendar encryptor failed: {0}")]
    EncryptorSetup(String),

    #[error("list calendars failed: {0}")]
    ListCalendars(String),

    #[error("list events failed: {0}")]
    ListEvents(String),

    #[error("get event failed: {0}")]
    GetEvent(String),

    #[error("get event for update failed: {0}")]
    GetEventForUpdate(String),

    #[error("create event failed: {0}")]
    CreateEvent(String),

    #[error("update event failed: {0}")]
    UpdateEvent(String),

    #[error("delete event failed: {0}")]
    DeleteEvent(String),

    #[error("empty datetime")]
    EmptyDateTime,

    #[error("unsupported datetime format: {0}")]
    UnsupportedDateTime(String),

    #[error("start must be before end")]
    InvalidRange,

    #[error("no fields to update")]
    NoChangeRequested,

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("bridge '{0}' not found in PATH")]
    BridgeNotInstalled(String),

    #[error("bridge request timed out after {0}s")]
    BridgeTimeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unreadable event payload: {0}")]
    IcsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CalResult<T> = Result<T, CalError>;
