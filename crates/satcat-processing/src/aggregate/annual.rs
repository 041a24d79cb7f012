//! Yearly launch counts by launching entity and by satellite class.

use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::{debug, warn};

use crate::cleaner::{cell_datetime, julian_datetime};
use crate::error::Result;
use crate::mapper::ValueMapper;
use crate::rules::CatalogRules;
use crate::table::{Cell, Column, Table};

pub const LAUNCHES_BY_COUNTRY: &str = "annual_launches_by_country";
pub const LAUNCHES_BY_CLASS: &str = "launch_count_by_sat_class";

/// Launch codes of successful orbital launches start with this prefix.
const ORBITAL_SUCCESS: &str = "OS";

fn year_category_table(
    label: &str,
    category: &str,
    counts: BTreeMap<(i32, String), usize>,
) -> Result<Table> {
    let mut years = Vec::with_capacity(counts.len());
    let mut categories = Vec::with_capacity(counts.len());
    let mut totals = Vec::with_capacity(counts.len());
    for ((year, value), count) in counts {
        years.push(Cell::Number(f64::from(year)));
        categories.push(Cell::Text(value));
        totals.push(Cell::Number(count as f64));
    }
    Table::from_columns(
        label,
        vec![
            Column::new("launch_year", years),
            Column::new(category, categories),
            Column::new("launch_count", totals),
        ],
    )
}

/// Launching state per organization code.
///
/// State codes are renamed when a value rule matches their domain;
/// otherwise the codes themselves are used. The first row per
/// organization wins.
fn org_states(orgs: &Table, rules: &CatalogRules) -> Result<BTreeMap<String, String>> {
    orgs.require("org_code")?;
    orgs.require("state_code")?;

    let mut orgs = orgs.clone();
    let keep: Vec<bool> = (0..orgs.height())
        .map(|idx| {
            ["org_code", "state_code"]
                .iter()
                .all(|c| orgs.cell(idx, c).is_some_and(|cell| !cell.is_missing()))
        })
        .collect();
    orgs.retain_rows(&keep);

    let state_column = match ValueMapper::default().remap_values(
        &mut orgs,
        "state_code",
        "state_name",
        &rules.value_rules,
    ) {
        Some(_) => "state_name",
        None => "state_code",
    };

    let mut states = BTreeMap::new();
    let codes = orgs.require("org_code")?;
    let names = orgs.require(state_column)?;
    for (code, state) in codes.iter().zip(names) {
        if let (Some(code), Some(state)) = (code.render(), state.render()) {
            states.entry(code).or_insert(state);
        }
    }
    Ok(states)
}

/// Successful orbital launches per year and launching entity.
///
/// The agency of each launch is resolved to its state through the
/// organization table, and states belonging to an alliance are counted
/// under the alliance name. Launches whose agency has no known state are
/// skipped.
pub fn annual_launches_by_country(launches: &Table, orgs: &Table, rules: &CatalogRules) -> Result<Table> {
    let codes = launches.require("launch_code")?;
    let dates = launches.require("Julian_Date")?;
    let agencies = launches.require("launch_agency")?;
    let states = org_states(orgs, rules)?;

    let mut counts: BTreeMap<(i32, String), usize> = BTreeMap::new();
    let mut unresolved = 0;
    for ((code, date), agency) in codes.iter().zip(dates).zip(agencies) {
        let orbital = code.as_text().is_some_and(|c| c.starts_with(ORBITAL_SUCCESS));
        let Some(date) = julian_datetime(date).filter(|_| orbital) else {
            continue;
        };
        let Some(state) = agency.render().and_then(|a| states.get(&a)) else {
            unresolved += 1;
            continue;
        };
        let entity = rules.alliance_of(state).unwrap_or(state.as_str()).to_string();
        *counts.entry((date.year(), entity)).or_insert(0) += 1;
    }
    if unresolved > 0 {
        debug!("{} orbital launches had no resolvable launching state", unresolved);
    }

    year_category_table(LAUNCHES_BY_COUNTRY, "launch_entity", counts)
}

/// Launches per year and satellite class.
///
/// Rows need both a class and a launch date. Class codes are renamed only
/// when a value rule covers exactly the codes present.
pub fn launch_count_by_sat_class(table: &Table, rules: &CatalogRules) -> Result<Table> {
    let classes = table.require("class")?;
    let dates = table.require("launch_date")?;

    let mut years = Vec::new();
    let mut class_cells = Vec::new();
    for (class, date) in classes.iter().zip(dates) {
        if class.is_missing() {
            continue;
        }
        if let Some(date) = cell_datetime(date) {
            years.push(date.year());
            class_cells.push(class.clone());
        }
    }

    let mut dated = Table::from_columns("classes", vec![Column::new("class", class_cells)])?;
    if ValueMapper::default()
        .remap_values(&mut dated, "class", "class", &rules.value_rules)
        .is_none()
    {
        warn!("Satellite classes left as raw codes");
    }

    let mut counts: BTreeMap<(i32, String), usize> = BTreeMap::new();
    let classes = dated.require("class")?;
    for (year, class) in years.into_iter().zip(classes) {
        if let Some(class) = class.render() {
            *counts.entry((year, class)).or_insert(0) += 1;
        }
    }

    year_category_table(LAUNCHES_BY_CLASS, "class", counts)
}
