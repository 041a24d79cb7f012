//! Lookup tables driving the catalog build.
//!
//! Everything the build needs to know about upstream schemas and code lists
//! lives in [`CatalogRules`]: column and value rename rules, the Greek-order
//! table, the status merge map and drop list, alliance groupings and the
//! canonical column order. The built-in defaults describe the GCAT and
//! CelesTrak formats; a JSON file with the same shape can replace them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::designation::GreekOrder;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::mapper::{ColumnRenameRule, ValueRenameRule};
use crate::types::{Source, StatusLabel};

/// Columns used as model features; never removed by the constant filter.
pub const MODEL_FEATURES: [&str; 7] = [
    "total_mass",
    "span",
    "period_mins",
    "perigee_km",
    "apogee_km",
    "inclination",
    "object_type",
];

const CANONICAL_ORDER: [&str; 53] = [
    "JCAT_number",
    "Sat_catalog",
    "object_id",
    "object_type",
    "object_name",
    "payload_name",
    "launch_date",
    "orbit_date",
    "oper_time",
    "oper_orbit",
    "parent_object",
    "program",
    "object_state",
    "object_owner",
    "owner_state",
    "manufacturer",
    "launch_site",
    "control",
    "destination",
    "class",
    "category",
    "discipline",
    "comment",
    "status",
    "status_date",
    "data_status",
    "phase_end_date",
    "end_transmit_date",
    "last_time",
    "time_flag",
    "decay_date",
    "result",
    "bus",
    "motor",
    "mass",
    "dry_mass",
    "total_mass",
    "length",
    "diameter",
    "span",
    "shape",
    "rcs_value",
    "orbit_center",
    "orbit_type",
    "perigee_km",
    "apogee_km",
    "inclination",
    "inc_category",
    "period_mins",
    "plane",
    "maneuver",
    "alternate_names",
    "UN_reg",
];

/// Immutable lookup tables for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRules {
    /// Column rename rules, in priority order.
    pub column_rules: Vec<ColumnRenameRule>,
    /// Value rename rules, in priority order.
    pub value_rules: Vec<ValueRenameRule>,
    /// Greek-order words for Harvard designations.
    pub greek_order: GreekOrder,
    /// Raw status code to canonical status code.
    pub status_merge: BTreeMap<String, String>,
    /// Status codes whose rows are excluded from the combined dataset.
    pub status_drop: Vec<String>,
    /// Alliance name to the launch countries it absorbs.
    pub alliances: BTreeMap<String, Vec<String>>,
    /// Column sequence of the combined dataset.
    pub canonical_order: Vec<String>,
    /// Columns the constant-column filter must keep.
    pub protected_columns: Vec<String>,
    /// Columns whose merge precedence differs from the source order.
    pub merge_exceptions: BTreeMap<String, Vec<Source>>,
    /// Columns each source must provide after renaming.
    pub required_columns: BTreeMap<Source, Vec<String>>,
    /// Columns stripped of brackets and a trailing `?` after the merge.
    pub bracketed_columns: Vec<String>,
}

impl Default for CatalogRules {
    fn default() -> Self {
        Self {
            column_rules: default_column_rules(),
            value_rules: default_value_rules(),
            greek_order: GreekOrder::standard(),
            status_merge: pairs(&[
                ("AR", "R"),
                ("AO", "O"),
                ("ATT", "DK"),
                ("TFR", "DK"),
                ("GRP", "DK"),
                ("OX", "ERR"),
                ("C", "E"),
            ]),
            status_drop: strings(&["DSO", "DSA", "REL", "EVA DP"]),
            alliances: default_alliances(),
            canonical_order: strings(&CANONICAL_ORDER),
            protected_columns: ["object_id", "object_name", "status"]
                .into_iter()
                .chain(MODEL_FEATURES)
                .map(String::from)
                .collect(),
            merge_exceptions: BTreeMap::from([(
                "object_name".to_string(),
                vec![Source::Celestrak, Source::Satcat, Source::Psatcat],
            )]),
            required_columns: BTreeMap::from([
                (Source::Satcat, strings(&["object_id", "status"])),
                (Source::Psatcat, strings(&["object_id"])),
                (Source::Celestrak, strings(&["object_id", "object_name"])),
            ]),
            bracketed_columns: strings(&["object_state", "owner_state"]),
        }
    }
}

impl CatalogRules {
    /// Load rules from a JSON file; omitted fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .context(format!("Reading rules file {}", path.display()))?;
        let rules: Self = serde_json::from_str(&text)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check internal consistency of the tables.
    pub fn validate(&self) -> Result<()> {
        let valid: BTreeSet<&str> = StatusLabel::ALL.iter().map(|s| s.code()).collect();
        for (raw, merged) in &self.status_merge {
            if !valid.contains(merged.as_str()) {
                return Err(ProcessingError::InvalidConfig(format!(
                    "Status '{raw}' merges into '{merged}', which is not a status label"
                )));
            }
        }
        if self.greek_order.is_empty() {
            return Err(ProcessingError::InvalidConfig(
                "Greek order table is empty".to_string(),
            ));
        }
        for column in ["object_id", "status"] {
            if !self.canonical_order.iter().any(|c| c == column) {
                return Err(ProcessingError::InvalidConfig(format!(
                    "Canonical column order lacks '{column}'"
                )));
            }
        }
        for (column, order) in &self.merge_exceptions {
            let distinct: BTreeSet<_> = order.iter().collect();
            if distinct.len() != order.len() || order.is_empty() {
                return Err(ProcessingError::InvalidConfig(format!(
                    "Merge order for '{column}' must list each source at most once"
                )));
            }
        }
        Ok(())
    }

    /// Required columns for one source.
    pub fn required_for(&self, source: Source) -> &[String] {
        self.required_columns
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The alliance absorbing `country`, if any.
    pub fn alliance_of(&self, country: &str) -> Option<&str> {
        self.alliances
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == country))
            .map(|(alliance, _)| alliance.as_str())
    }

    pub fn is_protected(&self, column: &str) -> bool {
        self.protected_columns.iter().any(|c| c == column)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn pairs(values: &[(&str, &str)]) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_column_rules() -> Vec<ColumnRenameRule> {
    vec![
        ColumnRenameRule::new(
            "gcat_satcat",
            &[
                ("#JCAT", "JCAT_number"),
                ("Satcat", "Sat_catalog"),
                ("Piece", "object_id"),
                ("Type", "sat_type"),
                ("Name", "object_name"),
                ("PLName", "payload_name"),
                ("LDate", "launch_date"),
                ("Parent", "parent_object"),
                ("SDate", "status_date"),
                ("Primary", "primary"),
                ("DDate", "phase_end_date"),
                ("Status", "status"),
                ("Dest", "destination"),
                ("Owner", "object_owner"),
                ("State", "object_state"),
                ("Manufacturer", "manufacturer"),
                ("Bus", "bus"),
                ("Motor", "motor"),
                ("Mass", "mass"),
                ("MassFlag", "mass_flag"),
                ("DryMass", "dry_mass"),
                ("DryFlag", "dry_flag"),
                ("TotMass", "total_mass"),
                ("TotFlag", "total_flag"),
                ("Length", "length"),
                ("LFlag", "length_flag"),
                ("Diameter", "diameter"),
                ("DFlag", "diameter_flag"),
                ("Span", "span"),
                ("SpanFlag", "span_flag"),
                ("Shape", "shape"),
                ("ODate", "orbit_date"),
                ("Perigee", "perigee_km"),
                ("PF", "perigee_flag"),
                ("Apogee", "apogee_km"),
                ("AF", "apogee_flag"),
                ("Inc", "inclination"),
                ("IF", "incl_flag"),
                ("OpOrbit", "oper_orbit"),
                ("OQUAL", "orbit_quality"),
                ("AltNames", "alternate_names"),
            ],
        ),
        ColumnRenameRule::new(
            "gcat_psatcat",
            &[
                ("#JCAT", "JCAT_number"),
                ("Piece", "object_id"),
                ("Name", "object_name"),
                ("LDate", "launch_date"),
                ("TLast", "last_time"),
                ("TOp", "oper_time"),
                ("TDate", "end_transmit_date"),
                ("TF", "time_flag"),
                ("Program", "program"),
                ("Plane", "plane"),
                ("Att", "attitude"),
                ("Mvr", "maneuver"),
                ("Class", "class"),
                ("Category", "category"),
                ("UNState", "owner_state"),
                ("UNReg", "UN_reg"),
                ("UNPeriod", "period_mins"),
                ("UNPerigee", "perigee_km"),
                ("UNApogee", "apogee_km"),
                ("UNInc", "inclination"),
                ("Result", "result"),
                ("Control", "control"),
                ("Discipline", "discipline"),
                ("Comment", "comment"),
            ],
        ),
        ColumnRenameRule::new(
            "celestrak_satcat",
            &[
                ("OBJECT_NAME", "object_name"),
                ("OBJECT_ID", "object_id"),
                ("NORAD_CAT_ID", "norad_cat_id"),
                ("OBJECT_TYPE", "object_type"),
                ("OPS_STATUS_CODE", "ops_status_code"),
                ("OWNER", "owner_state"),
                ("LAUNCH_DATE", "launch_date"),
                ("LAUNCH_SITE", "launch_site"),
                ("DECAY_DATE", "decay_date"),
                ("PERIOD", "period_mins"),
                ("INCLINATION", "inclination"),
                ("APOGEE", "apogee_km"),
                ("PERIGEE", "perigee_km"),
                ("RCS", "rcs_value"),
                ("DATA_STATUS_CODE", "data_status"),
                ("ORBIT_CENTER", "orbit_center"),
                ("ORBIT_TYPE", "orbit_type"),
            ],
        ),
        ColumnRenameRule::new(
            "gcat_launch",
            &[
                ("#Launch_Tag", "launch_tag"),
                ("Launch_JD", "Julian_Date"),
                ("Launch_Date", "launch_date"),
                ("LV_Type", "lv_type"),
                ("Mission", "mission"),
                ("Launch_Site", "launch_site"),
                ("Agency", "launch_agency"),
                ("Launch_Code", "launch_code"),
            ],
        ),
        ColumnRenameRule::new(
            "gcat_orgs",
            &[
                ("#Code", "org_code"),
                ("StateCode", "state_code"),
                ("Type", "org_type"),
                ("ShortName", "short_name"),
                ("Name", "org_name"),
                ("Location", "location"),
            ],
        ),
    ]
}

fn default_value_rules() -> Vec<ValueRenameRule> {
    vec![ValueRenameRule::new(
        "satellite_class",
        &[
            ("A", "Amateur"),
            ("B", "Business"),
            ("C", "Civil"),
            ("D", "Defense"),
        ],
    )]
}

fn default_alliances() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "NATO".to_string(),
            strings(&[
                "UK", "F", "D", "I", "E", "NL", "B", "CA", "N", "DK", "P", "TR", "GR", "PL", "CZ",
            ]),
        ),
        ("USSR/Russia".to_string(), strings(&["SU", "RU"])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_rules_are_valid() {
        let rules = CatalogRules::default();
        rules.validate().unwrap();
        assert_eq!(rules.canonical_order.len(), 53);
        assert_eq!(rules.greek_order.len(), 72);
        assert_eq!(rules.status_merge.get("AR").map(String::as_str), Some("R"));
        assert_eq!(rules.required_for(Source::Celestrak), ["object_id", "object_name"]);
    }

    #[test]
    fn test_canonical_order_has_no_duplicates() {
        let rules = CatalogRules::default();
        let distinct: BTreeSet<_> = rules.canonical_order.iter().collect();
        assert_eq!(distinct.len(), rules.canonical_order.len());
    }

    #[test]
    fn test_alliance_lookup() {
        let rules = CatalogRules::default();
        assert_eq!(rules.alliance_of("UK"), Some("NATO"));
        assert_eq!(rules.alliance_of("SU"), Some("USSR/Russia"));
        assert_eq!(rules.alliance_of("US"), None);
    }

    #[test]
    fn test_protected_columns_include_features() {
        let rules = CatalogRules::default();
        for feature in MODEL_FEATURES {
            assert!(rules.is_protected(feature));
        }
        assert!(rules.is_protected("status"));
        assert!(!rules.is_protected("bus"));
    }

    #[test]
    fn test_validate_rejects_unknown_merge_target() {
        let mut rules = CatalogRules::default();
        rules.status_merge.insert("XX".into(), "BOGUS".into());
        assert_eq!(rules.validate().unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"{"status_drop": ["DSO"], "alliances": {}}"#).unwrap();
        let rules = CatalogRules::from_json_file(&path).unwrap();
        assert_eq!(rules.status_drop, vec!["DSO".to_string()]);
        assert!(rules.alliances.is_empty());
        assert_eq!(rules.greek_order.len(), 72);
    }

    #[test]
    fn test_rules_round_trip_through_json() {
        let rules = CatalogRules::default();
        let json = serde_json::to_string(&rules).unwrap();
        let back: CatalogRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }
}
