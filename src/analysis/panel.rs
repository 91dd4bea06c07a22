use crate::error::Result;
use crate::models::panel::*;
use crate::models::record::AssociationYearRecord;
use std::collections::BTreeMap;
use std::io::Write;

/// Partition records into per-association sequences, each in chronological
/// order. Sequences come out by ascending id; equal years keep input order.
pub fn group_by_association(records: &[AssociationYearRecord]) -> BTreeMap<i64, Vec<&AssociationYearRecord>> {
    let mut groups: BTreeMap<i64, Vec<&AssociationYearRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.id).or_default().push(record);
    }
    for sequence in groups.values_mut() {
        // Stable, so duplicates of a year stay in upload order.
        sequence.sort_by_key(|r| r.year);
    }
    groups
}

pub fn derive_ratios(record: &AssociationYearRecord) -> DerivedRatios {
    let activities = record.activities as f64;
    let members = record.total_members as f64;
    let grants = record.approved_grants as f64;

    DerivedRatios {
        activities_per_member: activities / members,
        grants_per_activity: grants / activities,
        grants_per_member: grants / members,
    }
}

/// `(current - previous) / previous * 100`. Zero previous values give NaN or
/// infinity, same as any other float division.
pub fn pct_change(previous: f64, current: f64) -> f64 {
    (current - previous) / previous * 100.0
}

/// Ratios per row plus their year-over-year change within each association,
/// sorted by (id, year).
pub fn calculate_relation_changes(records: &[AssociationYearRecord]) -> Vec<PanelRow> {
    let groups = group_by_association(records);
    let mut rows = Vec::with_capacity(records.len());

    for sequence in groups.values() {
        let mut previous: Option<DerivedRatios> = None;
        for record in sequence {
            let ratios = derive_ratios(record);
            let changes = match previous {
                Some(prev) => ChangeMetrics {
                    activities_per_member_change_pct: Some(pct_change(
                        prev.activities_per_member,
                        ratios.activities_per_member,
                    )),
                    grants_per_activity_change_pct: Some(pct_change(
                        prev.grants_per_activity,
                        ratios.grants_per_activity,
                    )),
                    grants_per_member_change_pct: Some(pct_change(
                        prev.grants_per_member,
                        ratios.grants_per_member,
                    )),
                },
                None => ChangeMetrics::default(),
            };
            rows.push(PanelRow {
                record: (*record).clone(),
                ratios,
                changes,
            });
            previous = Some(ratios);
        }
    }

    let non_finite = rows.iter().filter(|r| r.has_non_finite_ratio()).count();
    if non_finite > 0 {
        log::warn!("{non_finite} rows have a zero activities or members count; their ratios are not finite");
    }

    rows
}

/// Percent change of the raw counts within each association.
pub fn calculate_yearly_changes(records: &[AssociationYearRecord]) -> Vec<YearlyChangeRow> {
    let groups = group_by_association(records);
    let mut rows = Vec::with_capacity(records.len());

    for sequence in groups.values() {
        for (index, record) in sequence.iter().enumerate() {
            let previous = index.checked_sub(1).map(|i| sequence[i]);
            let change = |field: fn(&AssociationYearRecord) -> i64| {
                previous.map(|prev| pct_change(field(prev) as f64, field(record) as f64))
            };
            rows.push(YearlyChangeRow {
                record: (*record).clone(),
                activity_change_pct: change(|r| r.activities),
                member_change_pct: change(|r| r.total_members),
                grant_change_pct: change(|r| r.approved_grants),
            });
        }
    }

    rows
}

/// Rows whose change in `metric` exceeds `threshold` percent in either direction.
/// First-year rows and NaN changes never qualify.
pub fn filter_deviations(rows: &[PanelRow], metric: ChangeMetric, threshold: f64) -> Vec<PanelRow> {
    rows.iter()
        .filter(|row| match row.change(metric) {
            Some(change) => !change.is_nan() && change.abs() > threshold,
            None => false,
        })
        .cloned()
        .collect()
}

pub fn summarize(rows: &[PanelRow]) -> PanelSummary {
    let mut ids: Vec<i64> = rows.iter().map(|r| r.record.id).collect();
    ids.dedup();

    PanelSummary {
        association_count: ids.len(),
        row_count: rows.len(),
        first_year: rows.iter().map(|r| r.record.year).min(),
        last_year: rows.iter().map(|r| r.record.year).max(),
        non_finite_rows: rows.iter().filter(|r| r.has_non_finite_ratio()).count(),
    }
}

/// Write the panel table as CSV with the dashboard's column names.
pub fn write_panel_csv<W: Write>(rows: &[PanelRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "id",
        "year",
        "activities",
        "total_members",
        "approved_grants",
        "flagged",
        ACTIVITIES_PER_MEMBER,
        GRANTS_PER_ACTIVITY,
        GRANTS_PER_MEMBER,
        ACTIVITIES_PER_MEMBER_CHANGE,
        GRANTS_PER_ACTIVITY_CHANGE,
        GRANTS_PER_MEMBER_CHANGE,
    ])?;

    for row in rows {
        let r = &row.record;
        csv.write_record([
            r.id.to_string(),
            r.year.to_string(),
            r.activities.to_string(),
            r.total_members.to_string(),
            r.approved_grants.to_string(),
            r.flagged.map(|f| u8::from(f).to_string()).unwrap_or_default(),
            format_float(row.ratios.activities_per_member),
            format_float(row.ratios.grants_per_activity),
            format_float(row.ratios.grants_per_member),
            format_change(row.changes.activities_per_member_change_pct),
            format_change(row.changes.grants_per_activity_change_pct),
            format_change(row.changes.grants_per_member_change_pct),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        value.to_string()
    }
}

fn format_change(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, year: i32, activities: i64, members: i64, grants: i64) -> AssociationYearRecord {
        AssociationYearRecord {
            id,
            year,
            activities,
            total_members: members,
            approved_grants: grants,
            flagged: None,
        }
    }

    #[test]
    fn two_year_scenario_matches_expected_ratios_and_changes() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2021, 20, 100, 5),
        ]);

        assert!((rows[0].ratios.activities_per_member - 0.10).abs() < 1e-12);
        assert!((rows[1].ratios.activities_per_member - 0.20).abs() < 1e-12);
        assert!((rows[0].ratios.grants_per_activity - 0.5).abs() < 1e-12);
        assert!((rows[1].ratios.grants_per_activity - 0.25).abs() < 1e-12);

        let apm = rows[1].changes.activities_per_member_change_pct.unwrap();
        let gpa = rows[1].changes.grants_per_activity_change_pct.unwrap();
        let gpm = rows[1].changes.grants_per_member_change_pct.unwrap();
        assert!((apm - 100.0).abs() < 1e-9);
        assert!((gpa + 50.0).abs() < 1e-9);
        assert!(gpm.abs() < 1e-9);
    }

    #[test]
    fn first_year_of_each_association_has_no_change() {
        let rows = calculate_relation_changes(&[
            record(2, 2019, 5, 50, 2),
            record(1, 2021, 20, 100, 5),
            record(2, 2020, 6, 50, 2),
            record(1, 2020, 10, 100, 5),
        ]);

        let keys: Vec<(i64, i32)> = rows.iter().map(|r| (r.record.id, r.record.year)).collect();
        assert_eq!(keys, vec![(1, 2020), (1, 2021), (2, 2019), (2, 2020)]);

        for row in [&rows[0], &rows[2]] {
            assert_eq!(row.changes, ChangeMetrics::default());
        }
        assert!(rows[1].changes.activities_per_member_change_pct.is_some());
        assert!(rows[3].changes.grants_per_member_change_pct.is_some());
    }

    #[test]
    fn activities_per_member_is_exact_division() {
        let input = record(7, 2022, 13, 37, 9);
        let ratios = derive_ratios(&input);
        assert_eq!(ratios.activities_per_member, 13.0 / 37.0);
        assert_eq!(ratios.grants_per_member, 9.0 / 37.0);
    }

    #[test]
    fn change_skips_missing_years_and_uses_previous_row() {
        let rows = calculate_relation_changes(&[
            record(1, 2018, 10, 100, 5),
            record(1, 2021, 30, 100, 5),
        ]);
        let change = rows[1].changes.activities_per_member_change_pct.unwrap();
        assert!((change - 200.0).abs() < 1e-9);
    }

    #[test]
    fn zero_denominators_propagate_instead_of_failing() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 0, 0, 5),
            record(1, 2021, 10, 100, 5),
        ]);

        assert!(rows[0].ratios.activities_per_member.is_nan());
        assert!(rows[0].ratios.grants_per_activity.is_infinite());
        assert!(rows[0].ratios.grants_per_member.is_infinite());
        assert!(rows[1].changes.activities_per_member_change_pct.unwrap().is_nan());
        assert!(rows[0].has_non_finite_ratio());
    }

    #[test]
    fn equal_years_keep_input_order() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2020, 40, 100, 5),
        ]);
        assert_eq!(rows[0].record.activities, 10);
        assert_eq!(rows[1].record.activities, 40);
        let change = rows[1].changes.activities_per_member_change_pct.unwrap();
        assert!((change - 300.0).abs() < 1e-9);
    }

    #[test]
    fn yearly_changes_track_raw_counts() {
        let rows = calculate_yearly_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2021, 15, 80, 10),
        ]);
        assert_eq!(rows[0].activity_change_pct, None);
        assert!((rows[1].activity_change_pct.unwrap() - 50.0).abs() < 1e-9);
        assert!((rows[1].member_change_pct.unwrap() + 20.0).abs() < 1e-9);
        assert!((rows[1].grant_change_pct.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn deviation_filter_uses_absolute_change() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2021, 20, 100, 5),
            record(2, 2020, 10, 100, 5),
            record(2, 2021, 11, 100, 5),
        ]);

        let by_apm = filter_deviations(&rows, ChangeMetric::ActivitiesPerMember, 20.0);
        assert_eq!(by_apm.len(), 1);
        assert_eq!(by_apm[0].record.id, 1);

        // -50% in grants per activity passes, -9% does not.
        let by_gpa = filter_deviations(&rows, ChangeMetric::GrantsPerActivity, 20.0);
        assert_eq!(by_gpa.len(), 1);
        assert_eq!(by_gpa[0].record.year, 2021);
    }

    #[test]
    fn summary_counts_associations_and_years() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2021, 20, 0, 5),
            record(3, 2019, 10, 100, 5),
        ]);
        let summary = summarize(&rows);
        assert_eq!(summary.association_count, 2);
        assert_eq!(summary.row_count, 3);
        assert_eq!(summary.first_year, Some(2019));
        assert_eq!(summary.last_year, Some(2021));
        assert_eq!(summary.non_finite_rows, 1);
    }

    #[test]
    fn csv_export_writes_dashboard_headers_and_blank_first_year_changes() {
        let rows = calculate_relation_changes(&[
            record(1, 2020, 10, 100, 5),
            record(1, 2021, 20, 100, 5),
        ]);
        let mut out = Vec::new();
        write_panel_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.contains("Activities per Member Change (%)"));
        assert!(lines.next().unwrap().ends_with(",,,"));
        assert!(lines.next().unwrap().ends_with(",100,-50,0"));
    }
}
