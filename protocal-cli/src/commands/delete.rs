use anyhow::Result;
use protocal_core::calendar::CalendarSelector;

use crate::commands::{Context, open_session};
use crate::render;

pub async fn run(ctx: &Context, selector: CalendarSelector, id: String) -> Result<()> {
    let mut session = open_session(ctx, &selector).await?;
    let result = session.delete_event(&id).await;
    session.close().await;

    result?;
    render::print_deleted(&id);
    Ok(())
}
