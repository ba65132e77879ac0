//! Session establishment and calendar operations.
//!
//! Establishment is a strict chain: credential, auth info, derived
//! credential, auth config, authentication, session binding, calendar
//! choice, user keyring, address keyring, member passphrase, calendar
//! keyring, then the decryptor/encryptor pair. Each stage consumes the
//! previous stage's output, failures wrap the cause in the stage's own
//! error, and any failure releases the transport before it surfaces.
//! Nothing is retried.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use tokio_util::sync::CancellationToken;

use crate::calendar::{Calendar, CalendarSelector};
use crate::credential::Credential;
use crate::error::{CalError, CalResult};
use crate::event::{Event, EventDraft};
use crate::ics;
use crate::patch::EventPatch;
use crate::remote::auth::{AuthConfig, AuthCredential, TotpProvider};
use crate::remote::channel::{BridgeLocator, Channel};
use crate::remote::protocol::{
    AuthContext, CodecHandle, CodecSpec, EventRef, PrivateKeyToken, RemoteEvent,
};
use crate::remote::transport::Transport;

/// Version string reported to the service.
pub const APP_VERSION: &str = "protocal/0.1.0";

/// Result of a create or update: the re-read event when the follow-up
/// fetch worked, otherwise just the event's identity.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Event(Event),
    Reference(EventRef),
}

/// Drop the "bridge error: " framing when a stage error wraps a bridge
/// response, so messages read as "<stage> failed: <cause>".
fn stage_message(err: CalError) -> String {
    match err {
        CalError::Bridge(message) => message,
        other => other.to_string(),
    }
}

/// An authenticated account: session-bound transport, no calendar
/// chosen yet. Enough to list calendars.
pub struct Account {
    transport: Transport,
    auth: AuthContext,
}

impl Account {
    /// Spawn the bridge and authenticate.
    pub async fn login(
        bridge: &BridgeLocator,
        credential: Credential,
        totp: &dyn TotpProvider,
        cancel: CancellationToken,
    ) -> CalResult<Account> {
        let channel = bridge.spawn()?;
        Self::login_over(Box::new(channel), credential, totp, cancel).await
    }

    /// Authenticate over an already-running channel.
    pub(crate) async fn login_over(
        channel: Box<dyn Channel>,
        credential: Credential,
        totp: &dyn TotpProvider,
        cancel: CancellationToken,
    ) -> CalResult<Account> {
        let mut transport = Transport::new(channel, cancel);
        match Self::authenticate(&mut transport, &credential, totp).await {
            Ok(auth) => Ok(Account { transport, auth }),
            Err(err) => {
                transport.release().await;
                Err(err)
            }
        }
    }

    async fn authenticate(
        transport: &mut Transport,
        credential: &Credential,
        totp: &dyn TotpProvider,
    ) -> CalResult<AuthContext> {
        let info = transport
            .auth_info(&credential.username, APP_VERSION)
            .await
            .map_err(|e| CalError::AuthInfo(stage_message(e)))?;

        let derived = AuthCredential::derive(credential, &info, totp)
            .map_err(|e| CalError::CredentialSetup(stage_message(e)))?;

        let config = AuthConfig::new(derived, &info)?;

        let auth = transport
            .authenticate(config)
            .await
            .map_err(|e| CalError::Authentication(stage_message(e)))?;

        transport
            .bind_session(&auth.session_uid)
            .await
            .map_err(|e| CalError::SessionBind(stage_message(e)))?;

        debug!(user = %auth.user_id, "authenticated");
        Ok(auth)
    }

    /// The account's calendars, unfiltered.
    pub async fn list_calendars(&mut self) -> CalResult<Vec<Calendar>> {
        self.transport
            .list_calendars()
            .await
            .map_err(|e| CalError::ListCalendars(stage_message(e)))
    }

    /// Continue the chain: choose a calendar and derive the keyrings
    /// and codecs bound to it.
    pub async fn open_calendar(mut self, selector: &CalendarSelector) -> CalResult<CalendarSession> {
        match Self::derive_codecs(&mut self.transport, &self.auth, selector).await {
            Ok((calendar, decryptor, encryptor)) => Ok(CalendarSession {
                transport: self.transport,
                calendar,
                decryptor,
                encryptor,
            }),
            Err(err) => {
                self.transport.release().await;
                Err(err)
            }
        }
    }

    async fn derive_codecs(
        transport: &mut Transport,
        auth: &AuthContext,
        selector: &CalendarSelector,
    ) -> CalResult<(Calendar, CodecHandle, CodecHandle)> {
        let calendars = transport
            .list_calendars()
            .await
            .map_err(|e| CalError::ListCalendars(stage_message(e)))?;
        let calendar = selector.choose(&calendars)?;

        let user_key_ring = transport
            .user_key_ring(auth)
            .await
            .map_err(|e| CalError::UserKeyRing(stage_message(e)))?;

        let address_key_ring = transport
            .address_key_ring(auth, PrivateKeyToken::default())
            .await
            .map_err(|e| CalError::AddressKeyRing(stage_message(e)))?;

        let passphrase = transport
            .member_passphrase(&calendar.id, &address_key_ring)
            .await
            .map_err(|e| CalError::MemberPassphrase(stage_message(e)))?;

        let calendar_key_ring = transport
            .calendar_key_ring(&calendar.id, &passphrase)
            .await
            .map_err(|e| CalError::CalendarKeyRing(stage_message(e)))?;

        let spec = CodecSpec {
            calendar_id: calendar.id.clone(),
            passphrase,
            user_key_ring,
            address_key_ring,
            calendar_key_ring,
        };

        let decryptor = transport
            .new_decryptor(&spec)
            .await
            .map_err(|e| CalError::DecryptorSetup(stage_message(e)))?;

        let encryptor = transport
            .new_encryptor(&spec)
            .await
            .map_err(|e| CalError::EncryptorSetup(stage_message(e)))?;

        debug!(calendar = %calendar.id, "calendar session established");
        Ok((calendar, decryptor, encryptor))
    }

    /// Release the transport without opening a calendar.
    pub async fn close(mut self) {
        self.transport.release().await;
    }
}

/// A fully established session: session-bound transport, the chosen
/// calendar, and the codec pair derived for it.
pub struct CalendarSession {
    transport: Transport,
    calendar: Calendar,
    decryptor: CodecHandle,
    encryptor: CodecHandle,
}

// The transport wraps a live bridge channel with no Debug of its own.
impl fmt::Debug for CalendarSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarSession")
            .field("calendar", &self.calendar)
            .field("decryptor", &self.decryptor)
            .field("encryptor", &self.encryptor)
            .finish_non_exhaustive()
    }
}

impl CalendarSession {
    /// Run the whole establishment chain, bridge spawn included.
    pub async fn open(
        bridge: &BridgeLocator,
        credential: Credential,
        selector: &CalendarSelector,
        totp: &dyn TotpProvider,
        cancel: CancellationToken,
    ) -> CalResult<CalendarSession> {
        let account = Account::login(bridge, credential, totp, cancel).await?;
        account.open_calendar(selector).await
    }

    #[cfg(test)]
    pub(crate) async fn open_over(
        channel: Box<dyn Channel>,
        credential: Credential,
        selector: &CalendarSelector,
        totp: &dyn TotpProvider,
        cancel: CancellationToken,
    ) -> CalResult<CalendarSession> {
        let account = Account::login_over(channel, credential, totp, cancel).await?;
        account.open_calendar(selector).await
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Decrypted events overlapping the window. Events whose payload
    /// cannot be read are skipped rather than failing the listing.
    pub async fn list_events(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CalResult<Vec<Event>> {
        let remote = self
            .transport
            .list_events(&self.decryptor, from.to_rfc3339(), to.to_rfc3339())
            .await
            .map_err(|e| CalError::ListEvents(stage_message(e)))?;

        Ok(remote.iter().filter_map(decode_event).collect())
    }

    pub async fn get_event(&mut self, event_id: &str) -> CalResult<Event> {
        let remote = self
            .transport
            .get_event(&self.decryptor, event_id)
            .await
            .map_err(|e| CalError::GetEvent(stage_message(e)))?;

        decode_event(&remote)
            .ok_or_else(|| CalError::GetEvent(format!("unreadable payload for event {}", remote.id)))
    }

    /// Encrypt and store a new event, then re-read it best-effort.
    pub async fn create_event(&mut self, draft: &EventDraft) -> CalResult<WriteOutcome> {
        let payload = ics::generate_draft(draft);
        let reference = self
            .transport
            .create_event(&self.encryptor, payload)
            .await
            .map_err(|e| CalError::CreateEvent(stage_message(e)))?;

        Ok(self.refetch(reference).await)
    }

    /// Fetch, patch and re-store an existing event, then re-read it
    /// best-effort. The stored VEVENT keeps its original UID, and
    /// properties outside the patchable fields are written back
    /// unchanged.
    pub async fn update_event(
        &mut self,
        event_id: &str,
        patch: &EventPatch,
    ) -> CalResult<WriteOutcome> {
        let remote = self
            .transport
            .get_event(&self.decryptor, event_id)
            .await
            .map_err(|e| CalError::GetEventForUpdate(stage_message(e)))?;

        let parsed = ics::parse_event(&remote.ics).ok_or_else(|| {
            CalError::GetEventForUpdate(format!("unreadable payload for event {}", remote.id))
        })?;
        let uid = parsed.uid.clone();
        let custom_lines = parsed.custom_lines.clone();
        let current = Event::from_payload(remote.id, remote.calendar_id, parsed);

        let updated = patch.apply(&current)?;

        let payload = ics::generate_event(&uid, &updated, &custom_lines);
        let reference = self
            .transport
            .update_event(&self.encryptor, event_id, payload)
            .await
            .map_err(|e| CalError::UpdateEvent(stage_message(e)))?;

        Ok(self.refetch(reference).await)
    }

    pub async fn delete_event(&mut self, event_id: &str) -> CalResult<()> {
        self.transport
            .delete_event(&self.encryptor, event_id)
            .await
            .map_err(|e| CalError::DeleteEvent(stage_message(e)))
    }

    /// Re-read an event after a write. The write already succeeded, so
    /// a failed or unreadable re-read degrades to the bare reference
    /// instead of erroring.
    async fn refetch(&mut self, reference: EventRef) -> WriteOutcome {
        match self.transport.get_event(&self.decryptor, &reference.id).await {
            Ok(remote) => match decode_event(&remote) {
                Some(event) => WriteOutcome::Event(event),
                None => WriteOutcome::Reference(reference),
            },
            Err(_) => WriteOutcome::Reference(reference),
        }
    }

    /// Release the transport. The bridge process ends here; secrets it
    /// held die with it.
    pub async fn close(mut self) {
        self.transport.release().await;
    }
}

fn decode_event(remote: &RemoteEvent) -> Option<Event> {
    let parsed = ics::parse_event(&remote.ics)?;
    Some(Event::from_payload(
        remote.id.clone(),
        remote.calendar_id.clone(),
        parsed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::protocol::{Command, Request};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Canned bridge: answers scripted commands in order, records every
    /// request, and counts shutdowns.
    struct ScriptedChannel {
        script: Vec<(Command, String)>,
        cursor: usize,
        seen: Arc<Mutex<Vec<Request>>>,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        async fn exchange(&mut self, request: Request) -> CalResult<String> {
            if request.command == Command::Release {
                self.seen.lock().unwrap().push(request);
                return Ok(ok(Value::Null));
            }

            let (expected, response) = self
                .script
                .get(self.cursor)
                .cloned()
                .unwrap_or_else(|| panic!("unexpected call: {:?}", request.command));
            assert_eq!(request.command, expected, "command out of order");
            self.cursor += 1;
            self.seen.lock().unwrap().push(request);
            Ok(response)
        }

        async fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ok(data: Value) -> String {
        json!({"status": "success", "data": data}).to_string()
    }

    fn fail(message: &str) -> String {
        json!({"status": "error", "error": message}).to_string()
    }

    fn credential() -> Credential {
        Credential {
            username: "user@proton.me".into(),
            password: "pw".into(),
            mailbox_password: "pw".into(),
        }
    }

    struct NoTotp;

    impl TotpProvider for NoTotp {
        fn code(&self) -> CalResult<String> {
            Err(CalError::MissingTotp)
        }
    }

    struct FixedTotp(&'static str);

    impl TotpProvider for FixedTotp {
        fn code(&self) -> CalResult<String> {
            Ok(self.0.to_string())
        }
    }

    fn auth_info_data() -> Value {
        json!({"password_mode": "one", "srp": {"modulus": "m-1"}})
    }

    fn auth_context_data() -> Value {
        json!({
            "session_uid": "sess-1",
            "user_id": "user-1",
            "key_pass": "kp-1",
            "keys": ["k-1"]
        })
    }

    fn calendars_data() -> Value {
        json!([
            {"id": "cal-1", "name": "Shared", "color": "#841", "isOwned": false, "isPrimary": false},
            {"id": "cal-2", "name": "Personal", "color": "#149", "isOwned": true, "isPrimary": true}
        ])
    }

    /// The establishment chain's bridge half, through both codecs.
    fn establishment_script() -> Vec<(Command, String)> {
        vec![
            (Command::AuthInfo, ok(auth_info_data())),
            (Command::Authenticate, ok(auth_context_data())),
            (Command::BindSession, ok(Value::Null)),
            (Command::ListCalendars, ok(calendars_data())),
            (Command::UserKeyRing, ok(json!("kr-user"))),
            (Command::AddressKeyRing, ok(json!("kr-addr"))),
            (Command::MemberPassphrase, ok(json!("pp-1"))),
            (Command::CalendarKeyRing, ok(json!("kr-cal"))),
            (Command::NewDecryptor, ok(json!("codec-read"))),
            (Command::NewEncryptor, ok(json!("codec-write"))),
        ]
    }

    fn remote_event_json(id: &str, uid: &str, summary: &str) -> Value {
        let ics = format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART:20240320T100000Z\r\nDTEND:20240320T110000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"
        );
        json!({"id": id, "calendar_id": "cal-2", "ics": ics})
    }

    struct Harness {
        seen: Arc<Mutex<Vec<Request>>>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl Harness {
        fn channel(&self, script: Vec<(Command, String)>) -> Box<dyn Channel> {
            Box::new(ScriptedChannel {
                script,
                cursor: 0,
                seen: self.seen.clone(),
                shutdowns: self.shutdowns.clone(),
            })
        }

        fn new() -> Self {
            Harness {
                seen: Arc::new(Mutex::new(Vec::new())),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn shutdown_count(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }

        fn request(&self, index: usize) -> Request {
            let seen = self.seen.lock().unwrap();
            Request {
                command: seen[index].command,
                params: seen[index].params.clone(),
            }
        }
    }

    async fn open(
        harness: &Harness,
        script: Vec<(Command, String)>,
        selector: &CalendarSelector,
        totp: &dyn TotpProvider,
    ) -> CalResult<CalendarSession> {
        CalendarSession::open_over(
            harness.channel(script),
            credential(),
            selector,
            totp,
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn establishment_runs_the_stages_in_order() {
        let harness = Harness::new();
        let session = open(
            &harness,
            establishment_script(),
            &CalendarSelector::default(),
            &NoTotp,
        )
        .await
        .unwrap();

        // Defaulted to the primary calendar.
        assert_eq!(session.calendar().id, "cal-2");

        // Data flows stage to stage: the session uid from
        // authentication binds the session, the chosen calendar and
        // derived handles feed the later stages.
        assert_eq!(harness.request(2).params["session_uid"], "sess-1");
        assert_eq!(harness.request(4).params["user_id"], "user-1");
        assert_eq!(harness.request(4).params["key_pass"], "kp-1");
        assert_eq!(harness.request(6).params["calendar_id"], "cal-2");
        assert_eq!(harness.request(6).params["address_key_ring"], "kr-addr");
        assert_eq!(harness.request(7).params["passphrase"], "pp-1");
        assert_eq!(harness.request(8).params["calendar_key_ring"], "kr-cal");
        assert_eq!(harness.request(8).params["user_key_ring"], "kr-user");

        assert_eq!(harness.shutdown_count(), 0);
        session.close().await;
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn debug_output_names_the_calendar_but_not_the_transport() {
        let harness = Harness::new();
        let session = open(
            &harness,
            establishment_script(),
            &CalendarSelector::default(),
            &NoTotp,
        )
        .await
        .unwrap();

        let rendered = format!("{session:?}");
        assert!(rendered.contains("cal-2"));
        assert!(rendered.contains("codec-read"));
        assert!(rendered.contains("codec-write"));
        assert!(!rendered.contains("transport"));

        session.close().await;
    }

    #[tokio::test]
    async fn totp_flows_into_the_authenticate_request() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script[0] = (
            Command::AuthInfo,
            ok(json!({
                "password_mode": "two",
                "second_factor": "totp",
                "srp": {"modulus": "m-1"}
            })),
        );

        let session = open(
            &harness,
            script,
            &CalendarSelector::default(),
            &FixedTotp("123456"),
        )
        .await
        .unwrap();

        let auth_request = harness.request(1);
        assert_eq!(auth_request.params["config"]["credential"]["totp"], "123456");
        session.close().await;
    }

    #[tokio::test]
    async fn missing_totp_fails_credential_setup_and_releases() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script[0] = (
            Command::AuthInfo,
            ok(json!({
                "password_mode": "one",
                "second_factor": "totp",
                "srp": {"modulus": "m-1"}
            })),
        );

        let err = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap_err();

        match err {
            CalError::CredentialSetup(message) => assert!(message.contains("PROTON_TOTP")),
            other => panic!("expected CredentialSetup, got {other:?}"),
        }
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn failed_authentication_wraps_the_cause_and_releases() {
        let harness = Harness::new();
        let script = vec![
            (Command::AuthInfo, ok(auth_info_data())),
            (Command::Authenticate, fail("invalid credentials")),
        ];

        let err = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "authentication failed: invalid credentials"
        );
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn failed_session_bind_wraps_the_cause_and_releases() {
        let harness = Harness::new();
        let script = vec![
            (Command::AuthInfo, ok(auth_info_data())),
            (Command::Authenticate, ok(auth_context_data())),
            (Command::BindSession, fail("no such session")),
        ];

        let err = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "client setup failed: no such session");
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn keyring_failure_mid_chain_releases() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.truncate(6);
        script[5] = (Command::AddressKeyRing, fail("no address keys"));

        let err = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "address keyring failed: no address keys");
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn unknown_calendar_id_stops_the_chain() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.truncate(4);

        let err = open(&harness, script, &CalendarSelector::by_id("cal-9"), &NoTotp)
            .await
            .unwrap_err();

        assert!(matches!(err, CalError::CalendarIdNotFound(id) if id == "cal-9"));
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn empty_calendar_list_stops_the_chain() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.truncate(4);
        script[3] = (Command::ListCalendars, ok(json!([])));

        let err = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap_err();

        assert!(matches!(err, CalError::NoCalendarsAvailable));
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_cancels_the_first_stage() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = CalendarSession::open_over(
            harness.channel(establishment_script()),
            credential(),
            &CalendarSelector::default(),
            &NoTotp,
            cancel,
        )
        .await
        .unwrap_err();

        match err {
            CalError::AuthInfo(message) => assert_eq!(message, "operation cancelled"),
            other => panic!("expected AuthInfo, got {other:?}"),
        }
        assert_eq!(harness.shutdown_count(), 1);
    }

    #[tokio::test]
    async fn listing_skips_unreadable_events() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.push((
            Command::ListEvents,
            ok(json!([
                remote_event_json("ev-1", "uid-1@test", "Readable"),
                {"id": "ev-2", "calendar_id": "cal-2", "ics": "garbage"}
            ])),
        ));

        let mut session = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap();

        let from = Utc::now();
        let events = session.list_events(from, from + chrono::Duration::days(30)).await;
        session.close().await;

        let events = events.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ev-1");
        assert_eq!(events[0].title, "Readable");
    }

    #[tokio::test]
    async fn update_preserves_the_stored_uid() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.push((
            Command::GetEvent,
            ok(remote_event_json("ev-1", "uid-original@test", "Before")),
        ));
        script.push((
            Command::UpdateEvent,
            ok(json!({"id": "ev-1", "calendar_id": "cal-2"})),
        ));
        script.push((
            Command::GetEvent,
            ok(remote_event_json("ev-1", "uid-original@test", "After")),
        ));

        let mut session = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap();

        let patch = EventPatch {
            title: Some("After".into()),
            ..Default::default()
        };
        let outcome = session.update_event("ev-1", &patch).await;
        session.close().await;

        match outcome.unwrap() {
            WriteOutcome::Event(event) => assert_eq!(event.title, "After"),
            other => panic!("expected the re-read event, got {other:?}"),
        }

        // The pushed payload reuses the UID the event was stored under
        // and carries the patched title.
        let update_request = harness.request(11);
        assert_eq!(update_request.command, Command::UpdateEvent);
        let pushed = update_request.params["ics"].as_str().unwrap();
        assert!(pushed.contains("UID:uid-original@test\r\n"));
        assert!(pushed.contains("SUMMARY:After\r\n"));
        assert_eq!(update_request.params["codec"], "codec-write");
    }

    #[tokio::test]
    async fn update_writes_back_unmodeled_properties() {
        let harness = Harness::new();
        let stored = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nBEGIN:VEVENT\r\nUID:uid-original@test\r\nDTSTAMP:20240301T000000Z\r\nSUMMARY:Before\r\nDTSTART:20240320T100000Z\r\nDTEND:20240320T110000Z\r\nRRULE:FREQ=WEEKLY;BYDAY=WE\r\nATTENDEE;CN=Ada:mailto:ada@example.com\r\nBEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT15M\r\nEND:VALARM\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let mut script = establishment_script();
        script.push((
            Command::GetEvent,
            ok(json!({"id": "ev-1", "calendar_id": "cal-2", "ics": stored})),
        ));
        script.push((
            Command::UpdateEvent,
            ok(json!({"id": "ev-1", "calendar_id": "cal-2"})),
        ));
        script.push((
            Command::GetEvent,
            ok(remote_event_json("ev-1", "uid-original@test", "After")),
        ));

        let mut session = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap();

        let patch = EventPatch {
            title: Some("After".into()),
            ..Default::default()
        };
        let outcome = session.update_event("ev-1", &patch).await;
        session.close().await;
        outcome.unwrap();

        // A title-only patch must not strip the recurrence rule, the
        // attendee or the alarm the stored event carried.
        let update_request = harness.request(11);
        let pushed = update_request.params["ics"].as_str().unwrap();
        assert!(pushed.contains("SUMMARY:After\r\n"));
        assert!(pushed.contains("RRULE:FREQ=WEEKLY;BYDAY=WE\r\n"));
        assert!(pushed.contains("ATTENDEE;CN=Ada:mailto:ada@example.com\r\n"));
        assert!(pushed.contains("BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT15M\r\nEND:VALARM\r\n"));
        // The regenerated envelope stamps DTSTAMP itself, exactly once.
        assert_eq!(pushed.matches("DTSTAMP:").count(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_degrades_to_a_reference() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.push((
            Command::CreateEvent,
            ok(json!({"id": "ev-9", "calendar_id": "cal-2"})),
        ));
        script.push((Command::GetEvent, fail("event not ready")));

        let mut session = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap();

        let start = Utc::now();
        let draft = EventDraft::new("New", start, None, false).unwrap();
        let outcome = session.create_event(&draft).await;
        session.close().await;

        match outcome.unwrap() {
            WriteOutcome::Reference(reference) => {
                assert_eq!(reference.id, "ev-9");
                assert_eq!(reference.calendar_id, "cal-2");
            }
            other => panic!("expected a bare reference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_patch_is_rejected_before_the_push() {
        let harness = Harness::new();
        let mut script = establishment_script();
        script.push((
            Command::GetEvent,
            ok(remote_event_json("ev-1", "uid-1@test", "Before")),
        ));

        let mut session = open(&harness, script, &CalendarSelector::default(), &NoTotp)
            .await
            .unwrap();

        let err = session
            .update_event("ev-1", &EventPatch::default())
            .await
            .unwrap_err();
        session.close().await;

        assert!(matches!(err, CalError::NoChangeRequested));
    }

    #[tokio::test]
    async fn account_list_calendars_wraps_bridge_errors() {
        let harness = Harness::new();
        let script = vec![
            (Command::AuthInfo, ok(auth_info_data())),
            (Command::Authenticate, ok(auth_context_data())),
            (Command::BindSession, ok(Value::Null)),
            (Command::ListCalendars, fail("backend down")),
        ];

        let mut account = Account::login_over(
            harness.channel(script),
            credential(),
            &NoTotp,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let err = account.list_calendars().await.unwrap_err();
        account.close().await;

        assert_eq!(err.to_string(), "list calendars failed: backend down");
        assert_eq!(harness.shutdown_count(), 1);
    }
}
