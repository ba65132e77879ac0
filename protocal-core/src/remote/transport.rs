//! Session-scoped connection to the bridge.
//!
//! A `Transport` owns one channel for the lifetime of one session. All
//! bridge traffic funnels through one call path, which applies
//! cancellation, and every session ends in [`Transport::release`],
//! which tells the bridge to drop its state and ends the process.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::calendar::Calendar;
use crate::error::{CalError, CalResult};
use crate::remote::auth::AuthConfig;
use crate::remote::channel::{Channel, decode_response};
use crate::remote::protocol::{
    AuthContext, AuthInfo, Authenticate, BindSession, BridgeCommand, CodecHandle, CodecSpec,
    Command, CreateEvent, DeleteEvent, DeriveAddressKeyRing, DeriveCalendarKeyRing,
    DeriveUserKeyRing, EventRef, FetchAuthInfo, FetchMemberPassphrase, GetEvent, KeyRing,
    ListCalendars, ListEvents, MemberPassphrase, NewDecryptor, NewEncryptor, PrivateKeyToken,
    RemoteEvent, Request, UpdateEvent,
};

pub struct Transport {
    channel: Box<dyn Channel>,
    cancel: CancellationToken,
    released: bool,
}

impl Transport {
    pub fn new(channel: Box<dyn Channel>, cancel: CancellationToken) -> Self {
        Transport {
            channel,
            cancel,
            released: false,
        }
    }

    async fn call<C: BridgeCommand>(&mut self, command: C) -> CalResult<C::Response> {
        if self.released {
            return Err(CalError::Bridge("transport already released".into()));
        }

        let params =
            serde_json::to_value(&command).map_err(|e| CalError::Serialization(e.to_string()))?;
        let request = Request {
            command: C::command(),
            params,
        };

        let cancel = self.cancel.clone();
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CalError::Cancelled),
            result = self.channel.exchange(request) => result?,
        };

        decode_response(&line)
    }

    /// Release the bridge's session state and end the process. Safe to
    /// call more than once; later calls do nothing.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // A polite release lets the bridge scrub its state; skip it
        // when we are shutting down because of a cancellation.
        if !self.cancel.is_cancelled() {
            let request = Request {
                command: Command::Release,
                params: Value::Null,
            };
            let _ = self.channel.exchange(request).await;
        }
        self.channel.shutdown().await;
        debug!("transport released");
    }

    pub async fn auth_info(&mut self, username: &str, app_version: &str) -> CalResult<AuthInfo> {
        self.call(FetchAuthInfo {
            username: username.to_string(),
            app_version: app_version.to_string(),
        })
        .await
    }

    pub async fn authenticate(&mut self, config: AuthConfig) -> CalResult<AuthContext> {
        self.call(Authenticate { config }).await
    }

    pub async fn bind_session(&mut self, session_uid: &str) -> CalResult<()> {
        self.call(BindSession {
            session_uid: session_uid.to_string(),
        })
        .await
    }

    pub async fn list_calendars(&mut self) -> CalResult<Vec<Calendar>> {
        self.call(ListCalendars {}).await
    }

    pub async fn user_key_ring(&mut self, auth: &AuthContext) -> CalResult<KeyRing> {
        self.call(DeriveUserKeyRing {
            user_id: auth.user_id.clone(),
            key_pass: auth.key_pass.clone(),
            keys: auth.keys.clone(),
        })
        .await
    }

    pub async fn address_key_ring(
        &mut self,
        auth: &AuthContext,
        token: PrivateKeyToken,
    ) -> CalResult<KeyRing> {
        self.call(DeriveAddressKeyRing {
            user_id: auth.user_id.clone(),
            key_pass: auth.key_pass.clone(),
            keys: auth.keys.clone(),
            token,
        })
        .await
    }

    pub async fn member_passphrase(
        &mut self,
        calendar_id: &str,
        address_key_ring: &KeyRing,
    ) -> CalResult<MemberPassphrase> {
        self.call(FetchMemberPassphrase {
            calendar_id: calendar_id.to_string(),
            address_key_ring: address_key_ring.clone(),
        })
        .await
    }

    pub async fn calendar_key_ring(
        &mut self,
        calendar_id: &str,
        passphrase: &MemberPassphrase,
    ) -> CalResult<KeyRing> {
        self.call(DeriveCalendarKeyRing {
            calendar_id: calendar_id.to_string(),
            passphrase: passphrase.clone(),
        })
        .await
    }

    pub async fn new_decryptor(&mut self, spec: &CodecSpec) -> CalResult<CodecHandle> {
        self.call(NewDecryptor(spec.clone())).await
    }

    pub async fn new_encryptor(&mut self, spec: &CodecSpec) -> CalResult<CodecHandle> {
        self.call(NewEncryptor(spec.clone())).await
    }

    pub async fn list_events(
        &mut self,
        codec: &CodecHandle,
        from: String,
        to: String,
    ) -> CalResult<Vec<RemoteEvent>> {
        self.call(ListEvents {
            codec: codec.clone(),
            from,
            to,
            filter: None,
        })
        .await
    }

    pub async fn get_event(
        &mut self,
        codec: &CodecHandle,
        event_id: &str,
    ) -> CalResult<RemoteEvent> {
        self.call(GetEvent {
            codec: codec.clone(),
            event_id: event_id.to_string(),
        })
        .await
    }

    pub async fn create_event(&mut self, codec: &CodecHandle, ics: String) -> CalResult<EventRef> {
        self.call(CreateEvent {
            codec: codec.clone(),
            ics,
        })
        .await
    }

    pub async fn update_event(
        &mut self,
        codec: &CodecHandle,
        event_id: &str,
        ics: String,
    ) -> CalResult<EventRef> {
        self.call(UpdateEvent {
            codec: codec.clone(),
            event_id: event_id.to_string(),
            ics,
        })
        .await
    }

    pub async fn delete_event(&mut self, codec: &CodecHandle, event_id: &str) -> CalResult<()> {
        self.call(DeleteEvent {
            codec: codec.clone(),
            event_id: event_id.to_string(),
        })
        .await
    }
}
