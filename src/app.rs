use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cli::{Cli, Commands, SessionCommand};
use crate::config::Config;
use crate::controller::{Controller, RetryPolicy};
use crate::core::{Dimension, Granularity, ShardKey, resolve_paths};
use crate::error::AppError;
use crate::fetch::{Fetcher, ShardStore, open_store};
use crate::output::{
    TableOptions, output_days_json, output_hourly_json, output_monthly_json, output_paths_json,
    output_session_json, print_days, print_hourly_table, print_monthly_table, print_paths,
    print_session_summary,
};
use crate::selection::{DimensionOptions, SelectionStore};
use crate::store::{DerivedStore, FetchState, KeySnapshot};
use crate::utils::days_of_month;

/// The wired pipeline: selection, controller and the store it publishes to
pub(crate) struct Dashboard {
    pub(crate) selection: Arc<SelectionStore>,
    pub(crate) store: Arc<DerivedStore>,
    pub(crate) controller: Arc<Controller>,
}

impl Dashboard {
    pub(crate) fn new(
        options: &DimensionOptions,
        shards: Arc<dyn ShardStore>,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        let selection = Arc::new(SelectionStore::new(options));
        let fetcher = Arc::new(Fetcher::new(shards, concurrency)?);
        let store = Arc::new(DerivedStore::new());
        let controller = Controller::new(selection.clone(), fetcher, store.clone(), retry);
        Ok(Self {
            selection,
            store,
            controller,
        })
    }

    /// Build from CLI and config, with the CLI's filter lists pre-selected
    pub(crate) fn from_cli(cli: &Cli, config: &Config) -> Result<Self, AppError> {
        let shards: Arc<dyn ShardStore> = Arc::from(open_store(cli.base(), cli.timeout()));
        info!("Reading shards from {} ({})", shards.location(), shards.name());
        let dashboard = Self::new(
            &config.dimension_options(),
            shards,
            cli.concurrency(),
            RetryPolicy::new(cli.retries()),
        )?;
        dashboard.select_all(Dimension::TrafficType, &cli.traffic_types)?;
        dashboard.select_all(Dimension::AccessType, &cli.access_types)?;
        dashboard.select_all(Dimension::Domain, &cli.domains)?;
        Ok(dashboard)
    }

    fn select_all(&self, dimension: Dimension, options: &[String]) -> Result<(), AppError> {
        for option in options {
            if self.selection.is_selected(dimension, option)? {
                warn!("{dimension} {option} given more than once");
                continue;
            }
            self.selection.set_selected(dimension, option, true)?;
        }
        Ok(())
    }
}

pub(crate) struct CommandContext<'a> {
    pub(crate) cli: &'a Cli,
    pub(crate) config: &'a Config,
    pub(crate) table: TableOptions,
}

impl CommandContext<'_> {
    fn json(&self) -> bool {
        self.cli.json
    }
}

fn or_default(given: &[String], fallback: impl FnOnce() -> Vec<String>) -> Vec<String> {
    if given.is_empty() {
        fallback()
    } else {
        given.to_vec()
    }
}

/// Error out if any date key ended in `Failed`
fn ensure_complete<T>(snapshots: &[KeySnapshot<T>]) -> Result<(), AppError> {
    let failed = snapshots
        .iter()
        .filter(|s| matches!(s.state, FetchState::Failed { .. }))
        .count();
    if failed > 0 {
        return Err(AppError::Incomplete {
            failed,
            total: snapshots.len(),
        });
    }
    Ok(())
}

fn handle_paths(
    dashboard: &Dashboard,
    days: &[String],
    months: &[String],
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    let (days, months) = if days.is_empty() && months.is_empty() {
        (ctx.config.initial_days(), ctx.config.initial_months())
    } else {
        (days.to_vec(), months.to_vec())
    };

    let selection = dashboard.selection.get_selection();
    let requests = days
        .iter()
        .map(|d| (Granularity::Hourly, d))
        .chain(months.iter().map(|m| (Granularity::Monthly, m)));

    let mut keys: Vec<ShardKey> = Vec::new();
    for (granularity, date) in requests {
        keys.extend(resolve_paths(
            granularity,
            date,
            &selection.traffic_types,
            &selection.access_types,
            &selection.domains,
            &selection.domain_options,
        )?);
    }

    if ctx.json() {
        println!("{}", output_paths_json(&keys));
    } else {
        print_paths(&keys);
    }
    Ok(())
}

fn handle_hourly(
    dashboard: &Dashboard,
    dates: &[String],
    hour: u8,
    top: usize,
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    let days = or_default(dates, || ctx.config.initial_days());
    dashboard.selection.set_days(&days)?;
    dashboard.selection.set_current_hour(hour)?;
    let refresh = dashboard.controller.refresh(Granularity::Hourly);
    debug!("Refreshing {} days", refresh.len());
    refresh.wait();

    let selection = dashboard.selection.get_selection();
    let snapshots = dashboard.store.hourly_snapshots(&selection.days);
    if ctx.json() {
        println!("{}", output_hourly_json(&snapshots, selection.current_hour));
    } else {
        print_hourly_table(&snapshots, selection.current_hour, top, ctx.table);
    }
    ensure_complete(&snapshots)
}

fn handle_monthly(
    dashboard: &Dashboard,
    months: &[String],
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    let months = or_default(months, || ctx.config.initial_months());
    dashboard.selection.set_months(&months)?;
    let refresh = dashboard.controller.refresh(Granularity::Monthly);
    debug!("Refreshing {} months", refresh.len());
    refresh.wait();

    let selection = dashboard.selection.get_selection();
    let snapshots = dashboard.store.monthly_snapshots(&selection.months);
    if ctx.json() {
        println!("{}", output_monthly_json(&snapshots));
    } else {
        print_monthly_table(&snapshots, ctx.table);
    }
    ensure_complete(&snapshots)
}

fn handle_days(months: &[String], ctx: &CommandContext<'_>) -> Result<(), AppError> {
    let months = or_default(months, || ctx.config.selectable_months());
    let listing = months
        .iter()
        .map(|m| days_of_month(m).map(|days| (m.clone(), days)))
        .collect::<Result<Vec<_>, AppError>>()?;

    if ctx.json() {
        println!("{}", output_days_json(&listing));
    } else {
        print_days(&listing);
    }
    Ok(())
}

fn apply_session_command(dashboard: &Dashboard, command: &SessionCommand) -> Result<(), AppError> {
    let selection = &dashboard.selection;
    match command {
        SessionCommand::Toggle { dimension, option } => {
            let dimension: Dimension = dimension.parse()?;
            selection.toggle(dimension, option)?;
        }
        SessionCommand::Dates(days) => selection.set_days(days)?,
        SessionCommand::Months(months) => selection.set_months(months)?,
        SessionCommand::Hour(raw) => {
            let hour = raw
                .parse::<u8>()
                .map_err(|_| AppError::InvalidHour { input: raw.clone() })?;
            selection.set_current_hour(hour)?;
        }
        SessionCommand::Show => {}
    }
    Ok(())
}

fn show_session(dashboard: &Dashboard, top: usize, ctx: &CommandContext<'_>) {
    dashboard.controller.wait_idle();
    let selection = dashboard.selection.get_selection();
    let hourly = dashboard.store.hourly_snapshots(&selection.days);
    let monthly = dashboard.store.monthly_snapshots(&selection.months);
    if ctx.json() {
        println!("{}", output_session_json(&selection, &hourly, &monthly));
    } else {
        print_session_summary(&selection, &hourly, &monthly, top, ctx.table);
    }
}

/// Drive the dashboard from line commands until `input` ends.
///
/// Bad lines are reported on stderr and skipped; the session only fails on
/// read errors.
pub(crate) fn run_session<R: BufRead>(
    dashboard: &Dashboard,
    input: R,
    top: usize,
    ctx: &CommandContext<'_>,
) -> Result<(), AppError> {
    dashboard.selection.set_days(&ctx.config.initial_days())?;
    dashboard.selection.set_months(&ctx.config.initial_months())?;
    let subscription = dashboard.controller.attach();
    dashboard.controller.refresh(Granularity::Hourly).wait();
    dashboard.controller.refresh(Granularity::Monthly).wait();

    for line in input.lines() {
        let line = line.map_err(AppError::Stdin)?;
        let command = match SessionCommand::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(usage)) => {
                eprintln!("{usage}");
                continue;
            }
        };
        if let Err(e) = apply_session_command(dashboard, &command) {
            eprintln!("{e}");
            continue;
        }
        if command == SessionCommand::Show {
            show_session(dashboard, top, ctx);
        }
    }

    dashboard.controller.wait_idle();
    dashboard.selection.unsubscribe(subscription);
    Ok(())
}

/// Run one parsed command against a freshly built dashboard
pub(crate) fn handle_command(ctx: &CommandContext<'_>) -> Result<(), AppError> {
    let dashboard = Dashboard::from_cli(ctx.cli, ctx.config)?;
    match &ctx.cli.command {
        Commands::Paths { days, months } => handle_paths(&dashboard, days, months, ctx),
        Commands::Hourly { dates, hour, top } => {
            handle_hourly(&dashboard, dates, *hour, *top, ctx)
        }
        Commands::Monthly { months } => handle_monthly(&dashboard, months, ctx),
        Commands::Days { months } => handle_days(months, ctx),
        Commands::Session { top } => {
            let stdin = std::io::stdin();
            run_session(&dashboard, stdin.lock(), *top, ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MemoryStore;
    use clap::Parser;
    use std::io::Cursor;

    fn options() -> DimensionOptions {
        DimensionOptions {
            traffic_types: vec!["user".to_string()],
            access_types: vec!["desktop".to_string(), "mobile-web".to_string()],
            domains: vec!["x.com".to_string(), "y.com".to_string()],
        }
    }

    fn shards() -> Arc<MemoryStore> {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "monthly/user/desktop/x.com/2019-09.json",
            r#"[{"x":"01","y":3}]"#,
        );
        shards.insert(
            "monthly/user/desktop/y.com/2019-09.json",
            r#"[{"x":"01","y":5},{"x":"02","y":2}]"#,
        );
        shards.insert(
            "hourly/user/desktop/x.com/2019-09-01.json",
            r#"{"5":[{"x":1,"y":4}]}"#,
        );
        shards.insert(
            "hourly/user/desktop/y.com/2019-09-01.json",
            r#"{"5":[{"x":2,"y":9}]}"#,
        );
        shards
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pvdash", "--json"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn dashboard(shards: Arc<MemoryStore>) -> Dashboard {
        let d = Dashboard::new(&options(), shards, 2, RetryPolicy::default()).unwrap();
        d.selection
            .set_selected(Dimension::TrafficType, "user", true)
            .unwrap();
        d.selection
            .set_selected(Dimension::AccessType, "desktop", true)
            .unwrap();
        d.selection.set_selected(Dimension::Domain, "x.com", true).unwrap();
        d
    }

    #[test]
    fn session_toggles_drive_refreshes() {
        let shards = shards();
        let dashboard = dashboard(shards.clone());
        let cli = cli(&["session"]);
        let config: Config = toml::from_str(
            r#"
default_days = ["2019-09-01"]
default_months = ["2019-09"]
"#,
        )
        .unwrap();
        let ctx = CommandContext {
            cli: &cli,
            config: &config,
            table: TableOptions {
                use_color: false,
                compact: false,
            },
        };

        let input = Cursor::new("show\ntoggle domain All\nhour 5\nbogus line\nshow\n");
        run_session(&dashboard, input, 3, &ctx).unwrap();

        let monthly = dashboard.store.monthly("2019-09").unwrap();
        assert_eq!(monthly.total_views(), 10);
        let slice = dashboard.store.hour_slice("2019-09-01", 5);
        let ys: Vec<u64> = slice.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![9, 4]);
        assert_eq!(dashboard.selection.get_selection().current_hour, 5);
    }

    #[test]
    fn session_rejects_unknown_option_without_stopping() {
        let dashboard = dashboard(shards());
        let cli = cli(&["session"]);
        let config = Config::default();
        let ctx = CommandContext {
            cli: &cli,
            config: &config,
            table: TableOptions {
                use_color: false,
                compact: true,
            },
        };

        let input = Cursor::new("toggle domain nowhere.org\ntoggle access mobile-web\n");
        run_session(&dashboard, input, 3, &ctx).unwrap();
        assert_eq!(
            dashboard.selection.get_selection().access_types,
            vec!["desktop", "mobile-web"]
        );
    }

    #[test]
    fn incomplete_when_any_key_failed() {
        let ok = KeySnapshot::<()> {
            key: "a".to_string(),
            state: FetchState::Ready,
            series: None,
        };
        let failed = KeySnapshot::<()> {
            key: "b".to_string(),
            state: FetchState::Failed {
                reason: "x".to_string(),
            },
            series: None,
        };
        assert!(ensure_complete(&[ok.clone()]).is_ok());
        assert!(matches!(
            ensure_complete(&[ok, failed]),
            Err(AppError::Incomplete { failed: 1, total: 2 })
        ));
    }
}
