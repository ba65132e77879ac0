use anyhow::{Context as _, Result, bail};
use protocal_core::CalError;
use protocal_core::calendar::CalendarSelector;
use protocal_core::datetime::parse_datetime;
use protocal_core::event::EventDraft;

use crate::commands::{Context, open_session};
use crate::render;

pub struct CreateArgs {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub all_day: bool,
}

pub async fn run(ctx: &Context, selector: CalendarSelector, args: CreateArgs) -> Result<()> {
    let draft = build_draft(args)?;

    let mut session = open_session(ctx, &selector).await?;
    let result = session.create_event(&draft).await;
    session.close().await;

    render::print_outcome(&result?, "created");
    Ok(())
}

/// Validate flags into a draft before any session work happens.
fn build_draft(args: CreateArgs) -> Result<EventDraft> {
    let start = parse_datetime(&args.start).context("invalid --start")?;
    let end = args
        .end
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse_datetime(raw).context("invalid --end"))
        .transpose()?;

    let mut draft = match EventDraft::new(args.title, start, end, args.all_day) {
        Ok(draft) => draft,
        Err(CalError::InvalidRange) => bail!("--start must be before --end"),
        Err(err) => return Err(err.into()),
    };
    draft.description = args.description.filter(|v| !v.is_empty());
    draft.location = args.location.filter(|v| !v.is_empty());
    Ok(draft)
}
