use anyhow::{Context as _, Result, bail};
use protocal_core::CalError;
use protocal_core::calendar::CalendarSelector;
use protocal_core::datetime::parse_datetime;
use protocal_core::patch::EventPatch;

use crate::commands::{Context, open_session};
use crate::render;

pub struct UpdateArgs {
    pub id: String,
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

pub async fn run(ctx: &Context, selector: CalendarSelector, args: UpdateArgs) -> Result<()> {
    let (id, patch) = build_patch(args)?;

    let mut session = open_session(ctx, &selector).await?;
    let result = session.update_event(&id, &patch).await;
    session.close().await;

    match result {
        Ok(outcome) => {
            render::print_outcome(&outcome, "updated");
            Ok(())
        }
        Err(CalError::InvalidRange) => bail!("--start must be before --end"),
        Err(err) => Err(err.into()),
    }
}

/// Blank flag values count as "not requested", so only real input ends
/// up in the patch.
fn build_patch(args: UpdateArgs) -> Result<(String, EventPatch)> {
    let patch = EventPatch {
        title: args.title.filter(|v| !v.is_empty()),
        description: args.description.filter(|v| !v.is_empty()),
        location: args.location.filter(|v| !v.is_empty()),
        start: args
            .start
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_datetime(raw).context("invalid --start"))
            .transpose()?,
        end: args
            .end
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_datetime(raw).context("invalid --end"))
            .transpose()?,
    };
    Ok((args.id, patch))
}
