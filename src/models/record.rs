use serde::{Deserialize, Serialize};

/// One association's figures for one year, as uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationYearRecord {
    pub id: i64,
    pub year: i32,
    pub activities: i64,
    pub total_members: i64,
    pub approved_grants: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
}

impl AssociationYearRecord {
    /// Feature vector used by the risk classifier, in the fixed column order
    /// `activities, total_members, approved_grants`.
    pub fn risk_features(&self) -> [f64; 3] {
        [
            self.activities as f64,
            self.total_members as f64,
            self.approved_grants as f64,
        ]
    }
}

/// One association's member count and reported cost, input to the anomaly view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberCostPoint {
    pub id: i64,
    pub members: f64,
    pub cost: f64,
}
