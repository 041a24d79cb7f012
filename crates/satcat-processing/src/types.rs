use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SOURCES
// ============================================================================

/// The three per-object catalogs that are merged into the combined dataset.
///
/// Declaration order is the default merge precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// GCAT main satellite catalog (tab separated, Harvard designations).
    Satcat,
    /// GCAT payload catalog (tab separated, Harvard designations).
    Psatcat,
    /// CelesTrak SATCAT (comma separated, international designators).
    Celestrak,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Satcat, Source::Psatcat, Source::Celestrak];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Satcat => "satcat",
            Self::Psatcat => "psatcat",
            Self::Celestrak => "celestrak",
        }
    }

    /// Whether object IDs in this source use the legacy Harvard notation.
    pub fn uses_legacy_designations(&self) -> bool {
        matches!(self, Self::Satcat | Self::Psatcat)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Canonical operational status of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusLabel {
    /// In orbit.
    #[serde(rename = "O")]
    InOrbit,
    /// Deorbited.
    #[serde(rename = "D")]
    Deorbited,
    /// Docked to another object.
    #[serde(rename = "DK")]
    Docked,
    /// Exploded.
    #[serde(rename = "E")]
    Exploded,
    /// No tracking data.
    #[serde(rename = "ERR")]
    NoTrackingData,
    /// Landed.
    #[serde(rename = "L")]
    Landed,
    /// Renamed.
    #[serde(rename = "N")]
    Renamed,
    /// Reentered.
    #[serde(rename = "R")]
    Reentered,
}

impl StatusLabel {
    pub const ALL: [StatusLabel; 8] = [
        Self::InOrbit,
        Self::Deorbited,
        Self::Docked,
        Self::Exploded,
        Self::NoTrackingData,
        Self::Landed,
        Self::Renamed,
        Self::Reentered,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::InOrbit => "O",
            Self::Deorbited => "D",
            Self::Docked => "DK",
            Self::Exploded => "E",
            Self::NoTrackingData => "ERR",
            Self::Landed => "L",
            Self::Renamed => "N",
            Self::Reentered => "R",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::InOrbit => "in orbit",
            Self::Deorbited => "deorbited",
            Self::Docked => "docked",
            Self::Exploded => "exploded",
            Self::NoTrackingData => "no tracking data",
            Self::Landed => "landed",
            Self::Renamed => "renamed",
            Self::Reentered => "reentered",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StatusLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.code() == s)
            .ok_or_else(|| format!("'{s}' is not a status label"))
    }
}

// ============================================================================
// BUILD SUMMARY
// ============================================================================

/// Record of what one catalog build did.
///
/// Every stage appends [`BuildAction`]s as it goes, so the summary doubles
/// as an audit trail of the combined dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
    /// Rows per source after cleaning.
    pub source_rows: BTreeMap<Source, usize>,
    /// Legacy designations converted per source.
    pub designations_converted: BTreeMap<Source, usize>,
    /// Object IDs seen more than once within a source.
    pub duplicate_ids: BTreeMap<Source, usize>,
    /// Distinct object IDs after the merge.
    pub merged_rows: usize,
    /// Rows in the persisted combined dataset.
    pub final_rows: usize,
    /// Columns removed by the constant-column filter.
    pub dropped_columns: Vec<String>,
    /// Rows removed because their status was missing.
    pub rows_without_status: usize,
    /// Rows removed because their status is on the drop list.
    pub rows_with_invalid_status: usize,
    /// Names of the aggregate tables written.
    pub aggregates: Vec<String>,
    /// Actions in execution order.
    pub actions: Vec<BuildAction>,
    pub warnings: Vec<String>,
}

impl BuildSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: BuildAction) {
        self.actions.push(action);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Record plain action messages produced by a stage for one target.
    pub fn extend_messages(&mut self, action_type: ActionType, target: &str, messages: Vec<String>) {
        for message in messages {
            self.actions.push(BuildAction::new(action_type, target, message));
        }
    }

    pub fn actions_of(&self, action_type: ActionType) -> impl Iterator<Item = &BuildAction> {
        self.actions.iter().filter(move |a| a.action_type == action_type)
    }
}

/// A single action taken during a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildAction {
    pub action_type: ActionType,
    /// Table or column the action applied to.
    pub target: String,
    pub description: String,
}

impl BuildAction {
    pub fn new(action_type: ActionType, target: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ColumnsRenamed,
    DatesNormalized,
    NullsCleaned,
    TypeCorrected,
    ValuesRemapped,
    DesignationsConverted,
    RecordsMerged,
    FieldsDerived,
    ColumnsRemoved,
    StatusFiltered,
    AggregateBuilt,
    ArtifactWritten,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ColumnsRenamed => "Columns Renamed",
            Self::DatesNormalized => "Dates Normalized",
            Self::NullsCleaned => "Nulls Cleaned",
            Self::TypeCorrected => "Type Corrected",
            Self::ValuesRemapped => "Values Remapped",
            Self::DesignationsConverted => "Designations Converted",
            Self::RecordsMerged => "Records Merged",
            Self::FieldsDerived => "Fields Derived",
            Self::ColumnsRemoved => "Columns Removed",
            Self::StatusFiltered => "Status Filtered",
            Self::AggregateBuilt => "Aggregate Built",
            Self::ArtifactWritten => "Artifact Written",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_label_codes_round_trip() {
        for label in StatusLabel::ALL {
            assert_eq!(label.code().parse::<StatusLabel>(), Ok(label));
        }
        assert!("AR".parse::<StatusLabel>().is_err());
    }

    #[test]
    fn test_status_label_serializes_as_code() {
        let json = serde_json::to_string(&StatusLabel::NoTrackingData).unwrap();
        assert_eq!(json, "\"ERR\"");
        let back: StatusLabel = serde_json::from_str("\"DK\"").unwrap();
        assert_eq!(back, StatusLabel::Docked);
    }

    #[test]
    fn test_source_precedence_order() {
        let mut sources = vec![Source::Celestrak, Source::Satcat, Source::Psatcat];
        sources.sort();
        assert_eq!(sources, Source::ALL.to_vec());
        assert!(Source::Psatcat.uses_legacy_designations());
        assert!(!Source::Celestrak.uses_legacy_designations());
    }

    #[test]
    fn test_summary_filters_actions() {
        let mut summary = BuildSummary::new();
        summary.extend_messages(
            ActionType::NullsCleaned,
            "satcat",
            vec!["Dropped 2 rows".to_string(), "Dropped column 'x'".to_string()],
        );
        summary.add_action(BuildAction::new(ActionType::RecordsMerged, "combined", "Merged"));
        assert_eq!(summary.actions_of(ActionType::NullsCleaned).count(), 2);
        assert_eq!(ActionType::RecordsMerged.display_name(), "Records Merged");
    }
}
