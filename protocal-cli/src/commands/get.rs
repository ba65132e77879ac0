use anyhow::Result;
use protocal_core::calendar::CalendarSelector;

use crate::commands::{Context, open_session};
use crate::render;

pub async fn run(ctx: &Context, selector: CalendarSelector, id: String) -> Result<()> {
    let mut session = open_session(ctx, &selector).await?;
    let result = session.get_event(&id).await;
    session.close().await;

    render::print_event(&result?);
    Ok(())
}
