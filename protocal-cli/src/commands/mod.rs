//! Subcommand implementations.

pub mod calendars;
pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod update;

use anyhow::Result;
use protocal_core::calendar::CalendarSelector;
use protocal_core::credential::Credential;
use protocal_core::remote::auth::EnvTotpProvider;
use protocal_core::remote::channel::BridgeLocator;
use protocal_core::session::CalendarSession;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Shared command environment.
pub struct Context {
    pub config: Config,
    pub bridge: BridgeLocator,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        let bridge = BridgeLocator {
            override_path: config.bridge.clone(),
        };
        Context {
            config,
            bridge,
            cancel,
        }
    }
}

/// Establish a full calendar session for one command invocation.
pub(crate) async fn open_session(
    ctx: &Context,
    selector: &CalendarSelector,
) -> Result<CalendarSession> {
    let credential = Credential::from_env()?;
    let session = CalendarSession::open(
        &ctx.bridge,
        credential,
        selector,
        &EnvTotpProvider,
        ctx.cancel.clone(),
    )
    .await?;
    Ok(session)
}
