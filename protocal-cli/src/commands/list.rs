use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Duration, Utc};
use protocal_core::calendar::CalendarSelector;
use protocal_core::datetime::{local_midnight, parse_datetime};

use crate::commands::{Context, open_session};
use crate::render;

/// Days past today covered when --to is not given.
const DEFAULT_WINDOW_DAYS: i64 = 30;

pub async fn run(
    ctx: &Context,
    selector: CalendarSelector,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let (from, to) = resolve_window(from.as_deref(), to.as_deref())?;

    let mut session = open_session(ctx, &selector).await?;
    let result = session.list_events(from, to).await;
    session.close().await;

    render::print_events(&result?);
    Ok(())
}

/// Both defaults anchor to today's local midnight: --from defaults to
/// it, --to to 30 days after it. An explicit --from does not move the
/// default --to.
fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let today = local_midnight(Utc::now());
    let from = match from {
        Some(raw) => parse_datetime(raw).context("invalid --from")?,
        None => today,
    };
    let to = match to {
        Some(raw) => parse_datetime(raw).context("invalid --to")?,
        None => today + Duration::days(DEFAULT_WINDOW_DAYS),
    };

    if from >= to {
        bail!("--from must be before --to");
    }
    Ok((from, to))
}
