use anyhow::Result;
use protocal_core::credential::Credential;
use protocal_core::remote::auth::EnvTotpProvider;
use protocal_core::session::Account;

use crate::commands::Context;
use crate::render;

pub async fn run(ctx: &Context) -> Result<()> {
    let credential = Credential::from_env()?;
    let mut account = Account::login(
        &ctx.bridge,
        credential,
        &EnvTotpProvider,
        ctx.cancel.clone(),
    )
    .await?;

    let result = account.list_calendars().await;
    account.close().await;

    render::print_calendars(&result?);
    Ok(())
}
