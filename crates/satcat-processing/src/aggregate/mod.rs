//! Derived time-series tables.
//!
//! Every aggregate is a pure function of its input tables. Groupings are
//! collected in `BTreeMap`s, so row order depends only on the data and an
//! unchanged dataset always produces the same output.

mod annual;
mod timeline;

pub use annual::{
    LAUNCHES_BY_CLASS, LAUNCHES_BY_COUNTRY, annual_launches_by_country, launch_count_by_sat_class,
};
pub use timeline::{
    DEFAULT_STARLINK_AFTER_YEAR, LAUNCH_DECAY_ORBIT, STARLINK_VS_OTHER,
    launch_decay_orbit_over_time, starlink_vs_other_launches,
};

use tracing::info;

use crate::error::{Result, ResultExt};
use crate::rules::CatalogRules;
use crate::table::Table;

/// Names of all aggregate tables, in build order.
pub const AGGREGATE_NAMES: [&str; 4] = [
    LAUNCH_DECAY_ORBIT,
    STARLINK_VS_OTHER,
    LAUNCHES_BY_COUNTRY,
    LAUNCHES_BY_CLASS,
];

/// Tables the aggregates are computed from.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInputs<'a> {
    /// Cleaned CelesTrak catalog: launch, decay and Starlink series.
    pub catalog: &'a Table,
    /// Cleaned GCAT payload catalog: launches by class.
    pub payloads: &'a Table,
    /// Cleaned GCAT launch list.
    pub launches: &'a Table,
    /// Cleaned GCAT organization list.
    pub orgs: &'a Table,
}

/// Produces every aggregate table.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    rules: CatalogRules,
    starlink_after_year: i32,
}

impl AggregationEngine {
    pub fn new(rules: CatalogRules) -> Self {
        Self {
            rules,
            starlink_after_year: DEFAULT_STARLINK_AFTER_YEAR,
        }
    }

    pub fn with_starlink_after_year(mut self, year: i32) -> Self {
        self.starlink_after_year = year;
        self
    }

    /// Compute all aggregates as `(name, table)` pairs in
    /// [`AGGREGATE_NAMES`] order.
    pub fn run(&self, inputs: AggregateInputs<'_>) -> Result<Vec<(String, Table)>> {
        let tables = vec![
            launch_decay_orbit_over_time(inputs.catalog).context(LAUNCH_DECAY_ORBIT)?,
            starlink_vs_other_launches(inputs.catalog, self.starlink_after_year)
                .context(STARLINK_VS_OTHER)?,
            annual_launches_by_country(inputs.launches, inputs.orgs, &self.rules)
                .context(LAUNCHES_BY_COUNTRY)?,
            launch_count_by_sat_class(inputs.payloads, &self.rules).context(LAUNCHES_BY_CLASS)?,
        ];

        for table in &tables {
            info!("Aggregate '{}': {} rows", table.label(), table.height());
        }
        Ok(tables
            .into_iter()
            .map(|table| (table.label().to_string(), table))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_produces_all_aggregates() {
        let catalog = Table::from_records(
            "celestrak",
            &["object_name", "launch_date", "decay_date"],
            &[&["STARLINK-1130", "2020-01-07", ""]],
        );
        let payloads = Table::from_records("psatcat", &["class", "launch_date"], &[&["C", "1962-09-29"]]);
        let launches = Table::from_records(
            "launch",
            &["launch_code", "Julian_Date", "launch_agency"],
            &[&["OS", "2451544.5", "NASA"]],
        );
        let orgs = Table::from_records("orgs", &["org_code", "state_code"], &[&["NASA", "US"]]);

        let outputs = AggregationEngine::new(CatalogRules::default())
            .run(AggregateInputs {
                catalog: &catalog,
                payloads: &payloads,
                launches: &launches,
                orgs: &orgs,
            })
            .unwrap();

        let names: Vec<&str> = outputs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, AGGREGATE_NAMES.to_vec());
        assert!(outputs.iter().all(|(_, table)| table.height() == 1));
    }

    #[test]
    fn test_engine_reports_failing_aggregate() {
        let empty = Table::new("empty");
        let err = AggregationEngine::new(CatalogRules::default())
            .run(AggregateInputs {
                catalog: &empty,
                payloads: &empty,
                launches: &empty,
                orgs: &empty,
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMN");
        assert!(err.to_string().starts_with(LAUNCH_DECAY_ORBIT));
    }
}
