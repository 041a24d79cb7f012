//! Monthly launch, decay and on-orbit series.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};

use crate::cleaner::cell_datetime;
use crate::error::Result;
use crate::table::{Cell, Column, Table};

pub const LAUNCH_DECAY_ORBIT: &str = "launch_decay_orbit_over_time";
pub const STARLINK_VS_OTHER: &str = "starlink_vs_other_launches";

/// Default cutoff: only objects launched after this year are compared.
pub const DEFAULT_STARLINK_AFTER_YEAR: i32 = 2019;

const STARLINK: &str = "STARLINK";

fn month_key(date: &NaiveDateTime) -> String {
    date.format("%Y-%m").to_string()
}

fn monthly_counts(cells: &[Cell]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for date in cells.iter().filter_map(cell_datetime) {
        *counts.entry(month_key(&date)).or_insert(0) += 1;
    }
    counts
}

fn count_column(name: &str, values: impl IntoIterator<Item = i64>) -> Column {
    Column::new(name, values.into_iter().map(|v| Cell::Number(v as f64)).collect())
}

/// Launches, decays and objects on orbit per month.
///
/// Months come from `launch_date` and `decay_date` (absent decay column
/// means no decays). Months present in only one series get a zero count
/// in the other, and all running totals are taken over the aligned months.
pub fn launch_decay_orbit_over_time(table: &Table) -> Result<Table> {
    let launches = monthly_counts(table.require("launch_date")?);
    let decays = table
        .column("decay_date")
        .map(|c| monthly_counts(&c.cells))
        .unwrap_or_default();

    let mut months: Vec<&String> = launches.keys().chain(decays.keys()).collect();
    months.sort();
    months.dedup();

    let mut launch_count = Vec::with_capacity(months.len());
    let mut launches_total = Vec::with_capacity(months.len());
    let mut decay_count = Vec::with_capacity(months.len());
    let mut decayed_total = Vec::with_capacity(months.len());
    let mut on_orbit = Vec::with_capacity(months.len());
    let (mut launched, mut decayed) = (0i64, 0i64);

    for month in &months {
        let l = launches.get(*month).copied().unwrap_or(0) as i64;
        let d = decays.get(*month).copied().unwrap_or(0) as i64;
        launched += l;
        decayed += d;
        launch_count.push(l);
        launches_total.push(launched);
        decay_count.push(d);
        decayed_total.push(decayed);
        on_orbit.push(launched - decayed);
    }

    Table::from_columns(
        LAUNCH_DECAY_ORBIT,
        vec![
            Column::new(
                "month_year",
                months.iter().map(|m| Cell::text(m.as_str())).collect(),
            ),
            count_column("launch_count", launch_count),
            count_column("launches", launches_total),
            count_column("decay_count", decay_count),
            count_column("decayed_sats", decayed_total),
            count_column("on_orbit", on_orbit),
        ],
    )
}

/// Cumulative monthly launches of Starlink and of everything else.
///
/// Only objects launched after `after_year` count. Starlink rows come
/// first, then `Other`; each partition lists only the months it has.
pub fn starlink_vs_other_launches(table: &Table, after_year: i32) -> Result<Table> {
    let names = table.require("object_name")?;
    let dates = table.require("launch_date")?;

    let mut starlink: BTreeMap<String, usize> = BTreeMap::new();
    let mut other: BTreeMap<String, usize> = BTreeMap::new();
    for (name, date) in names.iter().zip(dates) {
        let Some(date) = cell_datetime(date) else {
            continue;
        };
        if date.year() <= after_year {
            continue;
        }
        let is_starlink = name.as_text().is_some_and(|n| n.contains(STARLINK));
        let partition = if is_starlink { &mut starlink } else { &mut other };
        *partition.entry(month_key(&date)).or_insert(0) += 1;
    }

    let mut months = Vec::new();
    let mut totals = Vec::new();
    let mut kinds = Vec::new();
    for (label, counts) in [("Starlink", starlink), ("Other", other)] {
        let mut running = 0i64;
        for (month, count) in counts {
            running += count as i64;
            months.push(Cell::Text(month));
            totals.push(running);
            kinds.push(Cell::text(label));
        }
    }

    Table::from_columns(
        STARLINK_VS_OTHER,
        vec![
            Column::new("launch_month_year", months),
            count_column("launches", totals),
            Column::new("type", kinds),
        ],
    )
}
