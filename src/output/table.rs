use comfy_table::{Cell, Color, Table};

use crate::core::{DomainSelection, HourlySeries, MonthlySeries, ShardKey};
use crate::output::format::{
    create_styled_table, format_views, header_cell, hour_label, right_cell, state_color,
    styled_cell,
};
use crate::selection::Selection;
use crate::store::{FetchState, KeySnapshot};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableOptions {
    pub(crate) use_color: bool,
    pub(crate) compact: bool,
}

fn color(opts: TableOptions, c: Color) -> Option<Color> {
    opts.use_color.then_some(c)
}

fn state_cell(state: &FetchState, opts: TableOptions) -> Cell {
    let c = state_color(state).filter(|_| opts.use_color);
    styled_cell(state.label(), c, false)
}

fn print_failures<T>(snapshots: &[KeySnapshot<T>]) {
    for snap in snapshots {
        if let FetchState::Failed { reason } = &snap.state {
            eprintln!("  {}: {}", snap.key, reason);
        }
    }
}

pub(crate) fn print_paths(keys: &[ShardKey]) {
    if keys.is_empty() {
        println!("No shards selected.");
        return;
    }
    for key in keys {
        println!("{}", key.path());
    }
}

pub(crate) fn print_days(months: &[(String, Vec<String>)]) {
    for (month, days) in months {
        println!("{month}: {}", days.join(" "));
    }
}

fn build_hourly_table(
    snapshots: &[KeySnapshot<HourlySeries>],
    hour: u8,
    top: usize,
    opts: TableOptions,
) -> Table {
    let c = opts.use_color;
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Day", c),
        header_cell("State", c),
        header_cell("#", c),
        header_cell("Page", c),
        header_cell("Views", c),
    ]);

    let mut focused_total = 0u64;
    for snap in snapshots {
        let points = snap
            .series
            .as_ref()
            .map(|s| s.hour(hour))
            .unwrap_or(&[]);
        focused_total = points
            .iter()
            .fold(focused_total, |acc, p| acc.saturating_add(p.y));

        if points.is_empty() {
            table.add_row(vec![
                styled_cell(&snap.key, None, false),
                state_cell(&snap.state, opts),
                right_cell("-", None, false),
                Cell::new("-"),
                right_cell("-", None, false),
            ]);
            continue;
        }

        for (i, point) in points.iter().take(top).enumerate() {
            let (day, state) = if i == 0 {
                (styled_cell(&snap.key, None, false), state_cell(&snap.state, opts))
            } else {
                (Cell::new(""), Cell::new(""))
            };
            table.add_row(vec![
                day,
                state,
                right_cell(&(i + 1).to_string(), None, false),
                Cell::new(point.x.to_string()),
                right_cell(&format_views(point.y, opts.compact), None, false),
            ]);
        }
        if points.len() > top {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(""),
                right_cell("…", None, false),
                styled_cell(&format!("{} more", points.len() - top), None, false),
                right_cell("", None, false),
            ]);
        }
    }

    table.add_row(vec![
        styled_cell("Total", color(opts, Color::Yellow), true),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        right_cell(
            &format_views(focused_total, opts.compact),
            color(opts, Color::Yellow),
            true,
        ),
    ]);
    table
}

pub(crate) fn print_hourly_table(
    snapshots: &[KeySnapshot<HourlySeries>],
    hour: u8,
    top: usize,
    opts: TableOptions,
) {
    println!("\n  Hourly page views, {}\n", hour_label(hour));
    println!("{}", build_hourly_table(snapshots, hour, top, opts));
    print_failures(snapshots);
}

fn build_monthly_table(snapshots: &[KeySnapshot<MonthlySeries>], opts: TableOptions) -> Table {
    let c = opts.use_color;
    let mut table = create_styled_table();

    if opts.compact {
        table.set_header(vec![
            header_cell("Month", c),
            header_cell("State", c),
            header_cell("Days", c),
            header_cell("Peak", c),
            header_cell("Views", c),
        ]);
        for snap in snapshots {
            let series = snap.series.as_deref();
            let peak = series
                .and_then(|s| s.points.iter().max_by_key(|p| p.y))
                .map(|p| p.x.clone())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                styled_cell(&snap.key, None, false),
                state_cell(&snap.state, opts),
                right_cell(
                    &series.map_or(0, |s| s.points.len()).to_string(),
                    None,
                    false,
                ),
                right_cell(&peak, None, false),
                right_cell(
                    &format_views(series.map_or(0, MonthlySeries::total_views), true),
                    None,
                    false,
                ),
            ]);
        }
        return table;
    }

    table.set_header(vec![
        header_cell("Month", c),
        header_cell("State", c),
        header_cell("Day", c),
        header_cell("Views", c),
    ]);
    for snap in snapshots {
        let Some(series) = snap.series.as_deref().filter(|s| !s.is_empty()) else {
            table.add_row(vec![
                styled_cell(&snap.key, None, false),
                state_cell(&snap.state, opts),
                right_cell("-", None, false),
                right_cell("-", None, false),
            ]);
            continue;
        };
        for (i, point) in series.points.iter().enumerate() {
            let (month, state) = if i == 0 {
                (styled_cell(&snap.key, None, false), state_cell(&snap.state, opts))
            } else {
                (Cell::new(""), Cell::new(""))
            };
            table.add_row(vec![
                month,
                state,
                right_cell(&point.x, None, false),
                right_cell(&format_views(point.y, false), None, false),
            ]);
        }
        table.add_row(vec![
            styled_cell("Total", color(opts, Color::Yellow), true),
            Cell::new(""),
            Cell::new(""),
            right_cell(
                &format_views(series.total_views(), false),
                color(opts, Color::Yellow),
                true,
            ),
        ]);
    }
    table
}

pub(crate) fn print_monthly_table(snapshots: &[KeySnapshot<MonthlySeries>], opts: TableOptions) {
    println!("\n  Monthly page views\n");
    println!("{}", build_monthly_table(snapshots, opts));
    print_failures(snapshots);
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(",")
    }
}

fn describe_selection(selection: &Selection) -> String {
    let domains = selection.domains.resolve(&selection.domain_options);
    let domains = if selection.domains == DomainSelection::AllDomains {
        format!("All ({})", domains.len())
    } else if domains.is_empty() {
        "-".to_string()
    } else {
        domains.join(",")
    };
    format!(
        "traffic={} access={} domains={} days={} months={} hour={}",
        list(&selection.traffic_types),
        list(&selection.access_types),
        domains,
        list(&selection.days),
        list(&selection.months),
        selection.current_hour
    )
}

pub(crate) fn print_session_summary(
    selection: &Selection,
    hourly: &[KeySnapshot<HourlySeries>],
    monthly: &[KeySnapshot<MonthlySeries>],
    top: usize,
    opts: TableOptions,
) {
    println!("\n  {}", describe_selection(selection));
    if !hourly.is_empty() {
        print_hourly_table(hourly, selection.current_hour, top, opts);
    }
    if !monthly.is_empty() {
        print_monthly_table(monthly, opts);
    }
}
