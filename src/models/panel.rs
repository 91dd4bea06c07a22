use super::record::AssociationYearRecord;
use serde::{Deserialize, Serialize};

pub const ACTIVITIES_PER_MEMBER: &str = "Activities per Member";
pub const GRANTS_PER_ACTIVITY: &str = "Grants per Activity";
pub const GRANTS_PER_MEMBER: &str = "Grants per Member";
pub const ACTIVITIES_PER_MEMBER_CHANGE: &str = "Activities per Member Change (%)";
pub const GRANTS_PER_ACTIVITY_CHANGE: &str = "Grants per Activity Change (%)";
pub const GRANTS_PER_MEMBER_CHANGE: &str = "Grants per Member Change (%)";

/// Ratios derived from a single record. Zero denominators give NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRatios {
    #[serde(rename = "Activities per Member")]
    pub activities_per_member: f64,
    #[serde(rename = "Grants per Activity")]
    pub grants_per_activity: f64,
    #[serde(rename = "Grants per Member")]
    pub grants_per_member: f64,
}

/// Percent change of each ratio against the previous year of the same association.
/// `None` on an association's first year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetrics {
    #[serde(rename = "Activities per Member Change (%)")]
    pub activities_per_member_change_pct: Option<f64>,
    #[serde(rename = "Grants per Activity Change (%)")]
    pub grants_per_activity_change_pct: Option<f64>,
    #[serde(rename = "Grants per Member Change (%)")]
    pub grants_per_member_change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    #[serde(flatten)]
    pub record: AssociationYearRecord,
    #[serde(flatten)]
    pub ratios: DerivedRatios,
    #[serde(flatten)]
    pub changes: ChangeMetrics,
}

impl PanelRow {
    pub fn change(&self, metric: ChangeMetric) -> Option<f64> {
        match metric {
            ChangeMetric::ActivitiesPerMember => self.changes.activities_per_member_change_pct,
            ChangeMetric::GrantsPerActivity => self.changes.grants_per_activity_change_pct,
            ChangeMetric::GrantsPerMember => self.changes.grants_per_member_change_pct,
        }
    }

    pub fn has_non_finite_ratio(&self) -> bool {
        !(self.ratios.activities_per_member.is_finite()
            && self.ratios.grants_per_activity.is_finite()
            && self.ratios.grants_per_member.is_finite())
    }
}

/// The three change columns a deviation view can be drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeMetric {
    #[serde(rename = "Activities per Member Change (%)")]
    ActivitiesPerMember,
    #[serde(rename = "Grants per Activity Change (%)")]
    GrantsPerActivity,
    #[serde(rename = "Grants per Member Change (%)")]
    GrantsPerMember,
}

impl ChangeMetric {
    pub const ALL: [ChangeMetric; 3] = [
        ChangeMetric::ActivitiesPerMember,
        ChangeMetric::GrantsPerActivity,
        ChangeMetric::GrantsPerMember,
    ];

    pub fn column(self) -> &'static str {
        match self {
            ChangeMetric::ActivitiesPerMember => ACTIVITIES_PER_MEMBER_CHANGE,
            ChangeMetric::GrantsPerActivity => GRANTS_PER_ACTIVITY_CHANGE,
            ChangeMetric::GrantsPerMember => GRANTS_PER_MEMBER_CHANGE,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.column() == column)
    }
}

/// Percent change of the raw fields against the previous year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyChangeRow {
    #[serde(flatten)]
    pub record: AssociationYearRecord,
    #[serde(rename = "Activity Change (%)")]
    pub activity_change_pct: Option<f64>,
    #[serde(rename = "Member Change (%)")]
    pub member_change_pct: Option<f64>,
    #[serde(rename = "Grant Change (%)")]
    pub grant_change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSummary {
    pub association_count: usize,
    pub row_count: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub non_finite_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelAnalysis {
    pub summary: PanelSummary,
    pub rows: Vec<PanelRow>,
    pub duration_ms: u64,
}
