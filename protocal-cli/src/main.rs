mod commands;
mod config;
mod render;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use protocal_core::calendar::CalendarSelector;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "protocal")]
#[command(about = "Proton Calendar from the command line", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the account's calendars
    Calendars,
    /// List events in a time window
    List {
        #[command(flatten)]
        calendar: CalendarArgs,

        /// Window start (RFC 3339, "YYYY-MM-DDTHH:MM" or "YYYY-MM-DD"; default: today)
        #[arg(long)]
        from: Option<String>,

        /// Window end (same formats; default: 30 days after today)
        #[arg(long)]
        to: Option<String>,
    },
    /// Fetch a single event
    Get {
        #[command(flatten)]
        calendar: CalendarArgs,

        /// Event ID
        #[arg(long)]
        id: String,
    },
    /// Create an event
    Create {
        #[command(flatten)]
        calendar: CalendarArgs,

        /// Event title
        #[arg(long)]
        title: String,

        /// Start date/time
        #[arg(long)]
        start: String,

        /// End date/time (default: start + 1 hour, or + 1 day with --all-day)
        #[arg(long)]
        end: Option<String>,

        /// Event description
        #[arg(long)]
        description: Option<String>,

        /// Event location
        #[arg(long)]
        location: Option<String>,

        /// Create as an all-day event
        #[arg(long)]
        all_day: bool,
    },
    /// Update fields on an existing event
    Update {
        #[command(flatten)]
        calendar: CalendarArgs,

        /// Event ID
        #[arg(long)]
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New start date/time (a lone new start keeps the event's duration)
        #[arg(long)]
        start: Option<String>,

        /// New end date/time
        #[arg(long)]
        end: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New location
        #[arg(long)]
        location: Option<String>,
    },
    /// Delete an event
    Delete {
        #[command(flatten)]
        calendar: CalendarArgs,

        /// Event ID
        #[arg(long)]
        id: String,
    },
}

#[derive(Args)]
struct CalendarArgs {
    /// Operate on this calendar ID
    #[arg(long)]
    calendar_id: Option<String>,

    /// Operate on this calendar name (case-insensitive)
    #[arg(long)]
    calendar_name: Option<String>,
}

impl CalendarArgs {
    /// Flags beat the config defaults; giving either flag disables the
    /// defaults entirely so id-over-name precedence stays intact.
    fn selector(&self, config: &Config) -> CalendarSelector {
        if self.calendar_id.is_some() || self.calendar_name.is_some() {
            CalendarSelector::new(self.calendar_id.clone(), self.calendar_name.clone())
        } else {
            CalendarSelector::new(
                config.default_calendar_id.clone(),
                config.default_calendar_name.clone(),
            )
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ctrl-C flips the token; in-flight bridge calls observe it and
    // the session tears the bridge down on the way out.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    if let Err(err) = run(cli, cancel).await {
        render::print_error(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config = Config::load()?;
    let ctx = commands::Context::new(config, cancel);

    match cli.command {
        Commands::Calendars => commands::calendars::run(&ctx).await,
        Commands::List { calendar, from, to } => {
            let selector = calendar.selector(&ctx.config);
            commands::list::run(&ctx, selector, from, to).await
        }
        Commands::Get { calendar, id } => {
            let selector = calendar.selector(&ctx.config);
            commands::get::run(&ctx, selector, id).await
        }
        Commands::Create {
            calendar,
            title,
            start,
            end,
            description,
            location,
            all_day,
        } => {
            let selector = calendar.selector(&ctx.config);
            let args = commands::create::CreateArgs {
                title,
                start,
                end,
                description,
                location,
                all_day,
            };
            commands::create::run(&ctx, selector, args).await
        }
        Commands::Update {
            calendar,
            id,
            title,
            start,
            end,
            description,
            location,
        } => {
            let selector = calendar.selector(&ctx.config);
            let args = commands::update::UpdateArgs {
                id,
                title,
                start,
                end,
                description,
                location,
            };
            commands::update::run(&ctx, selector, args).await
        }
        Commands::Delete { calendar, id } => {
            let selector = calendar.selector(&ctx.config);
            commands::delete::run(&ctx, selector, id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_defaults() -> Config {
        Config {
            default_calendar_id: Some("cfg-id".into()),
            default_calendar_name: Some("cfg-name".into()),
            bridge: None,
        }
    }

    fn choose(selector: &CalendarSelector) -> String {
        use protocal_core::calendar::Calendar;
        let calendars = vec![
            Calendar {
                id: "cfg-id".into(),
                name: "cfg-name".into(),
                color: String::new(),
                is_owned: true,
                is_primary: false,
            },
            Calendar {
                id: "flag-id".into(),
                name: "flag-name".into(),
                color: String::new(),
                is_owned: true,
                is_primary: true,
            },
        ];
        selector.choose(&calendars).unwrap().id
    }

    #[test]
    fn flags_beat_config_defaults() {
        let args = CalendarArgs {
            calendar_id: Some("flag-id".into()),
            calendar_name: None,
        };
        assert_eq!(choose(&args.selector(&config_with_defaults())), "flag-id");
    }

    #[test]
    fn a_name_flag_disables_the_config_id_default() {
        let args = CalendarArgs {
            calendar_id: None,
            calendar_name: Some("flag-name".into()),
        };
        assert_eq!(choose(&args.selector(&config_with_defaults())), "flag-id");
    }

    #[test]
    fn config_defaults_apply_without_flags() {
        let args = CalendarArgs {
            calendar_id: None,
            calendar_name: None,
        };
        assert_eq!(choose(&args.selector(&config_with_defaults())), "cfg-id");
    }
}
