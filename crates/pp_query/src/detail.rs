//! Drill-down detail views
//!
//! One KPI, current snapshot and scope: the current card value, a set of
//! KPI-specific counters, the trend chart, and a row-per-contract (or
//! row-per-training-record) table joined with personnel display names.

use crate::scope::ResolvedScope;
use crate::trend::{TrendData, build_trend};
use crate::{
    Kpi, KpiKind, KpiStatus, KpiValue, QueryError, boolean_rate, filter_metric, percentage_average,
    round1, training_completion,
};
use pp_store::{MetricRow, PpStore, TrainingRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Headers plus stringly-rendered rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailTable {
    pub headers: Vec<String>,
    pub data: Vec<Vec<String>>,
}

/// One chart series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendDataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
}

/// Chart-ready trend shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendChart {
    pub labels: Vec<String>,
    pub datasets: Vec<TrendDataset>,
}

impl TrendChart {
    fn from_trend(trend: TrendData, label: &str) -> Self {
        Self {
            labels: trend.labels,
            datasets: vec![TrendDataset {
                label: label.to_string(),
                data: trend.values,
            }],
        }
    }
}

/// Full detail response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailData {
    pub display_name: String,
    pub current_snapshot_month: String,
    pub data_scope: crate::ScopeDescriptor,
    pub current_value: KpiValue,
    pub custom_stats: serde_json::Value,
    pub trend_data: TrendChart,
    pub detail_table: DetailTable,
}

/// Date-pair column titles and status vocabulary per on-time KPI
struct OnTimeLayout {
    target_header: &'static str,
    actual_header: &'static str,
    status_header: &'static str,
    on_time: &'static str,
    late: &'static str,
    pending: &'static str,
}

fn on_time_layout(kpi: Kpi) -> OnTimeLayout {
    match kpi {
        Kpi::AwardNoticeOnTime => OnTimeLayout {
            target_header: "Required By",
            actual_header: "Published On",
            status_header: "Status",
            on_time: "On Time",
            late: "Late/Pending",
            pending: "N/A",
        },
        Kpi::Uk01NoticeOnTime => OnTimeLayout {
            target_header: "Required By",
            actual_header: "Published On",
            status_header: "Status",
            on_time: "On Time",
            late: "Late/Pending",
            pending: "N/A",
        },
        Kpi::ContractClosureOnTime => OnTimeLayout {
            target_header: "Closure Target",
            actual_header: "Actual Closure",
            status_header: "On Time?",
            on_time: "Yes",
            late: "No",
            pending: "Pending",
        },
        _ => OnTimeLayout {
            target_header: "Target Date",
            actual_header: "Actual Date",
            status_header: "On Time?",
            on_time: "Yes",
            late: "No",
            pending: "Pending",
        },
    }
}

fn has_date_pair(kpi: Kpi) -> bool {
    matches!(
        kpi,
        Kpi::CoKpiOnTime | Kpi::AwardNoticeOnTime | Kpi::Uk01NoticeOnTime | Kpi::ContractClosureOnTime
    )
}

fn display_or_na(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| "N/A".to_string(), String::from)
}

/// Build the full detail view for one KPI
///
/// # Errors
///
/// Returns [`QueryError`] on store failures.
pub fn build_detail(
    store: &PpStore,
    kpi: Kpi,
    scope: &ResolvedScope,
    snapshot_month: &str,
    row_cap: usize,
) -> Result<DetailData, QueryError> {
    if scope.is_empty() {
        return Ok(DetailData {
            display_name: kpi.display_name().to_string(),
            current_snapshot_month: snapshot_month.to_string(),
            data_scope: scope.descriptor.clone(),
            current_value: KpiValue {
                name: kpi.display_name().to_string(),
                value: None,
                unit: "%".to_string(),
                status: KpiStatus::NotApplicable,
            },
            custom_stats: json!({}),
            trend_data: TrendChart::default(),
            detail_table: DetailTable::default(),
        });
    }

    let (value, custom_stats, detail_table) = match kpi.kind() {
        KpiKind::TrainingCompletion => {
            let records = store.fetch_training_records(&scope.personnel_ids, snapshot_month)?;
            let modules = store.distinct_training_modules(snapshot_month)?;
            let value = training_completion(&records, modules, scope.personnel_ids.len());
            let completed = records.iter().filter(|r| crate::is_completed(r)).count();
            let stats = json!({
                "personnelInScope": scope.personnel_ids.len(),
                "modulesThisSnapshot": modules,
                "completedRows": completed,
                "expectedCompletions": modules as usize * scope.personnel_ids.len(),
            });
            let names = store.personnel_names(&scope.personnel_ids)?;
            let table = training_table(&records, &names, row_cap);
            (value, stats, table)
        }
        _ => {
            let metric_name = kpi
                .metric_name()
                .ok_or_else(|| QueryError::InvalidQuery("KPI has no metric name".into()))?;
            let rows =
                store.fetch_contract_metrics(&scope.personnel_ids, snapshot_month, &[metric_name])?;
            let matching = filter_metric(&rows, kpi);

            let value = match kpi.kind() {
                KpiKind::BooleanRate => boolean_rate(&matching),
                _ => percentage_average(&matching),
            };
            let stats = metric_custom_stats(kpi, &matching);

            let ids: Vec<String> = matching.iter().map(|r| r.personnel_id.clone()).collect();
            let names = store.personnel_names(&ids)?;
            let table = metric_table(kpi, &matching, &names, row_cap);
            (value, stats, table)
        }
    };

    let trend = build_trend(store, kpi, &scope.personnel_ids)?;
    let trend_label = match kpi.kind() {
        KpiKind::BooleanRate => "% On Time / Met",
        KpiKind::PercentageAverage => "Average Overspend %",
        KpiKind::TrainingCompletion => "% Completed",
    };

    Ok(DetailData {
        display_name: kpi.display_name().to_string(),
        current_snapshot_month: snapshot_month.to_string(),
        data_scope: scope.descriptor.clone(),
        current_value: KpiValue {
            name: kpi.display_name().to_string(),
            value,
            unit: "%".to_string(),
            status: value.map_or(KpiStatus::NotApplicable, |v| kpi.policy().classify(v)),
        },
        custom_stats,
        trend_data: TrendChart::from_trend(trend, trend_label),
        detail_table,
    })
}

fn metric_custom_stats(kpi: Kpi, rows: &[&MetricRow]) -> serde_json::Value {
    match kpi.kind() {
        KpiKind::PercentageAverage => {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.value.as_deref())
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect();
            let worst = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            json!({
                "contractsMeasured": values.len(),
                "averageOverspendPercent": percentage_average(rows),
                "worstOverspendPercent": if values.is_empty() { None } else { Some(round1(worst)) },
            })
        }
        _ => {
            let met = rows
                .iter()
                .filter(|r| r.value.as_deref() == Some("1"))
                .count();
            let not_met = rows
                .iter()
                .filter(|r| r.value.as_deref() == Some("0"))
                .count();
            json!({
                "totalRecords": rows.len(),
                "met": met,
                "notMet": not_met,
                "metPercentage": boolean_rate(rows),
            })
        }
    }
}

fn metric_table(
    kpi: Kpi,
    rows: &[&MetricRow],
    names: &HashMap<String, String>,
    row_cap: usize,
) -> DetailTable {
    let name_of = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    if kpi.kind() == KpiKind::PercentageAverage {
        let data = rows
            .iter()
            .take(row_cap)
            .map(|row| {
                let value = row
                    .value
                    .as_deref()
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .map_or_else(|| "N/A".to_string(), |v| format!("{:.1}", round1(v)));
                vec![row.contract_id.clone(), name_of(&row.personnel_id), value]
            })
            .collect();
        return DetailTable {
            headers: vec![
                "Contract ID".to_string(),
                "Personnel".to_string(),
                "Overspend %".to_string(),
            ],
            data,
        };
    }

    if has_date_pair(kpi) {
        let layout = on_time_layout(kpi);
        let person_header = if kpi == Kpi::CoKpiOnTime {
            "Assigned To"
        } else {
            "Personnel"
        };
        let data = rows
            .iter()
            .take(row_cap)
            .map(|row| {
                let status = match row.value.as_deref() {
                    Some("1") => layout.on_time,
                    Some("0") => layout.late,
                    _ => layout.pending,
                };
                vec![
                    row.contract_id.clone(),
                    name_of(&row.personnel_id),
                    display_or_na(row.target_date.as_deref()),
                    display_or_na(row.actual_date.as_deref()),
                    status.to_string(),
                ]
            })
            .collect();
        return DetailTable {
            headers: vec![
                "Contract ID".to_string(),
                person_header.to_string(),
                layout.target_header.to_string(),
                layout.actual_header.to_string(),
                layout.status_header.to_string(),
            ],
            data,
        };
    }

    // Simple indicator KPIs: one yes/no column
    let data = rows
        .iter()
        .take(row_cap)
        .map(|row| {
            let status = match row.value.as_deref() {
                Some("1") => "Yes",
                Some("0") => "No",
                _ => "N/A",
            };
            vec![
                row.contract_id.clone(),
                name_of(&row.personnel_id),
                status.to_string(),
            ]
        })
        .collect();
    DetailTable {
        headers: vec![
            "Contract ID".to_string(),
            "Personnel".to_string(),
            "Met?".to_string(),
        ],
        data,
    }
}

fn training_table(
    records: &[TrainingRecord],
    names: &HashMap<String, String>,
    row_cap: usize,
) -> DetailTable {
    let data = records
        .iter()
        .take(row_cap)
        .map(|r| {
            vec![
                names
                    .get(&r.personnel_id)
                    .cloned()
                    .unwrap_or_else(|| r.personnel_id.clone()),
                r.training_module_name
                    .clone()
                    .unwrap_or_else(|| r.training_module_id.clone()),
                r.training_status.clone(),
                r.completion_percentage
                    .map_or_else(|| "N/A".to_string(), |p| p.to_string()),
                display_or_na(r.training_due_date.as_deref()),
                display_or_na(r.training_completion_date.as_deref()),
            ]
        })
        .collect();
    DetailTable {
        headers: vec![
            "Personnel".to_string(),
            "Module".to_string(),
            "Status".to_string(),
            "Completion %".to_string(),
            "Due Date".to_string(),
            "Completion Date".to_string(),
        ],
        data,
    }
}
