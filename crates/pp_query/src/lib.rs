//! `pp_query` - KPI calculation engine
//!
//! This crate provides:
//! - The closed KPI vocabulary with per-KPI calculation and status policy
//! - Pure calculators over raw metric rows
//! - Scope resolution (filters or role-based)
//! - Trend series and drill-down detail tables
//!
//! All reads go through [`pp_store::PpStore`]; the engine never writes.

use pp_store::schema::metrics;
use pp_store::{MetricRow, PpStore, TrainingRecord, TrainingStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod detail;
pub mod scope;
pub mod trend;

pub use detail::{DetailData, DetailTable, TrendChart, TrendDataset, build_detail};
pub use scope::{ResolvedScope, ScopeDescriptor, ScopeFilters, resolve_scope, resolve_scope_for_user};
pub use trend::{TREND_POINTS, TrendData, build_trend};

/// Query errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Store error: {0}")]
    StoreError(#[from] pp_store::StoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Calculation shape of a KPI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiKind {
    /// Share of rows whose value is "1"
    BooleanRate,
    /// Arithmetic mean of numeric values
    PercentageAverage,
    /// Completed training rows over modules x personnel
    TrainingCompletion,
}

/// Status thresholds for one KPI. These are policy numbers, preserved from
/// the business rules rather than derived from data.
#[derive(Debug, Clone, Copy)]
pub enum StatusPolicy {
    /// Higher is better: `>= good` is Good, `>= ok` is Ok
    RateFloor { good: f64, ok: f64 },
    /// Lower is better: `<= good` is Good, `<= ok` is Ok
    Ceiling { good: f64, ok: f64 },
}

impl StatusPolicy {
    #[must_use]
    pub fn classify(&self, value: f64) -> KpiStatus {
        match *self {
            StatusPolicy::RateFloor { good, ok } => {
                if value >= good {
                    KpiStatus::Good
                } else if value >= ok {
                    KpiStatus::Ok
                } else {
                    KpiStatus::Bad
                }
            }
            StatusPolicy::Ceiling { good, ok } => {
                if value <= good {
                    KpiStatus::Good
                } else if value <= ok {
                    KpiStatus::Ok
                } else {
                    KpiStatus::Bad
                }
            }
        }
    }
}

/// Status classification for a KPI card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KpiStatus {
    Good,
    Ok,
    Bad,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl KpiStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiStatus::Good => "Good",
            KpiStatus::Ok => "Ok",
            KpiStatus::Bad => "Bad",
            KpiStatus::NotApplicable => "N/A",
        }
    }
}

/// The closed set of dashboard KPIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kpi {
    CoKpiOnTime,
    AwardNoticeOnTime,
    Uk01NoticeOnTime,
    ContractOverspendPercent,
    ContractClosureOnTime,
    SocialValueMet,
    SmeAwarded,
    CompetitivelyTendered,
    MandatoryTrainingCompletion,
    CabinetOfficeConditionsMet,
}

impl Kpi {
    /// All KPIs in dashboard card order
    pub const ALL: [Kpi; 10] = [
        Kpi::CoKpiOnTime,
        Kpi::AwardNoticeOnTime,
        Kpi::Uk01NoticeOnTime,
        Kpi::ContractOverspendPercent,
        Kpi::ContractClosureOnTime,
        Kpi::SocialValueMet,
        Kpi::SmeAwarded,
        Kpi::CompetitivelyTendered,
        Kpi::MandatoryTrainingCompletion,
        Kpi::CabinetOfficeConditionsMet,
    ];

    /// Name shown on the dashboard card. This is the vocabulary the detail
    /// endpoint validates `kpiName` against.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Kpi::CoKpiOnTime => "CO KPI On Time",
            Kpi::AwardNoticeOnTime => "Award Notice On Time",
            Kpi::Uk01NoticeOnTime => "UK01 Notice On Time",
            Kpi::ContractOverspendPercent => "Contract Overspend %",
            Kpi::ContractClosureOnTime => "Closures",
            Kpi::SocialValueMet => "Social Value Met",
            Kpi::SmeAwarded => "SME Awarded",
            Kpi::CompetitivelyTendered => "Competitively Tendered",
            Kpi::MandatoryTrainingCompletion => "Mandatory Training Completion",
            Kpi::CabinetOfficeConditionsMet => "Cabinet Office Conditions Met",
        }
    }

    /// Underlying `contract_metrics` name, or `None` for the training KPI
    /// which reads `training_records` instead. Note "Closures" displays the
    /// contract-closure metric under a friendlier card name.
    #[must_use]
    pub fn metric_name(&self) -> Option<&'static str> {
        match self {
            Kpi::CoKpiOnTime => Some(metrics::CO_KPI_ON_TIME),
            Kpi::AwardNoticeOnTime => Some(metrics::AWARD_NOTICE_ON_TIME),
            Kpi::Uk01NoticeOnTime => Some(metrics::UK01_NOTICE_ON_TIME),
            Kpi::ContractOverspendPercent => Some(metrics::CONTRACT_OVERSPEND_PERCENT),
            Kpi::ContractClosureOnTime => Some(metrics::CONTRACT_CLOSURE_ON_TIME),
            Kpi::SocialValueMet => Some(metrics::SOCIAL_VALUE_MET),
            Kpi::SmeAwarded => Some(metrics::SME_AWARDED),
            Kpi::CompetitivelyTendered => Some(metrics::COMPETITIVELY_TENDERED),
            Kpi::MandatoryTrainingCompletion => None,
            Kpi::CabinetOfficeConditionsMet => Some(metrics::CABINET_OFFICE_CONDITIONS_MET),
        }
    }

    #[must_use]
    pub fn kind(&self) -> KpiKind {
        match self {
            Kpi::ContractOverspendPercent => KpiKind::PercentageAverage,
            Kpi::MandatoryTrainingCompletion => KpiKind::TrainingCompletion,
            _ => KpiKind::BooleanRate,
        }
    }

    /// Per-KPI status thresholds. Most rate KPIs target near-total
    /// compliance; SME awarding has a deliberately lower bar, and overspend
    /// targets zero or below.
    #[must_use]
    pub fn policy(&self) -> StatusPolicy {
        match self {
            Kpi::SmeAwarded => StatusPolicy::RateFloor { good: 25.0, ok: 15.0 },
            Kpi::ContractOverspendPercent => StatusPolicy::Ceiling { good: 0.0, ok: 5.0 },
            _ => StatusPolicy::RateFloor { good: 95.0, ok: 80.0 },
        }
    }

    /// Parse a display name from a request. Unrecognized names are the
    /// caller's 400.
    #[must_use]
    pub fn from_display_name(name: &str) -> Option<Kpi> {
        Kpi::ALL.iter().copied().find(|k| k.display_name() == name)
    }
}

/// One KPI card's worth of data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiValue {
    pub name: String,
    pub value: Option<f64>,
    pub unit: String,
    pub status: KpiStatus,
}

impl KpiValue {
    fn not_applicable(kpi: Kpi) -> Self {
        Self {
            name: kpi.display_name().to_string(),
            value: None,
            unit: "%".to_string(),
            status: KpiStatus::NotApplicable,
        }
    }

    fn from_value(kpi: Kpi, value: Option<f64>) -> Self {
        match value {
            Some(v) => Self {
                name: kpi.display_name().to_string(),
                value: Some(v),
                unit: "%".to_string(),
                status: kpi.policy().classify(v),
            },
            None => Self::not_applicable(kpi),
        }
    }
}

/// Auxiliary panel: live contracts in scope and their combined budget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveContractStats {
    pub count: usize,
    pub total_value: f64,
}

/// Full summary response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub kpis: Vec<KpiValue>,
    pub snapshot_month: String,
    pub data_scope: ScopeDescriptor,
    pub live_contract_stats: LiveContractStats,
}

/// Round to one decimal place
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of rows with value "1", as a percentage rounded to one decimal.
/// `None` for an empty row set; no rows is "no data", not a 0% rate.
#[must_use]
pub fn boolean_rate(rows: &[&MetricRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let ones = rows
        .iter()
        .filter(|r| r.value.as_deref() == Some("1"))
        .count();
    Some(round1(ones as f64 / rows.len() as f64 * 100.0))
}

/// Mean of the numeric values, skipping rows that do not parse. The
/// denominator counts only valid numbers. `None` when no row parses.
#[must_use]
pub fn percentage_average(rows: &[&MetricRow]) -> Option<f64> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.value.as_deref())
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(round1(values.iter().sum::<f64>() / values.len() as f64))
}

/// A training row counts as completed on either signal: the status column
/// or a 100% completion figure.
pub(crate) fn is_completed(record: &TrainingRecord) -> bool {
    record.training_status.parse::<TrainingStatus>() == Ok(TrainingStatus::Completed)
        || record.completion_percentage == Some(100)
}

/// Completed training rows over the expected total (distinct modules in the
/// snapshot times personnel in scope), clamped to [0, 100]. `None` when
/// either dimension is zero.
#[must_use]
pub fn training_completion(
    records: &[TrainingRecord],
    distinct_modules: i64,
    personnel_count: usize,
) -> Option<f64> {
    if distinct_modules <= 0 || personnel_count == 0 {
        return None;
    }
    let completed = records.iter().filter(|r| is_completed(r)).count();
    let expected = distinct_modules as f64 * personnel_count as f64;
    Some(round1((completed as f64 / expected * 100.0).clamp(0.0, 100.0)))
}

/// Reconstruct per-contract status and budget from the helper metric rows:
/// a contract is live when its status text equals "active"
/// (case-insensitive), and its budget row contributes to the total.
#[must_use]
pub fn live_contract_stats(rows: &[MetricRow]) -> LiveContractStats {
    use std::collections::HashMap;

    #[derive(Default)]
    struct ContractFacts {
        live: bool,
        budget: f64,
    }

    let mut by_contract: HashMap<&str, ContractFacts> = HashMap::new();
    for row in rows {
        let facts = by_contract.entry(row.contract_id.as_str()).or_default();
        match row.metric_name.as_str() {
            n if n == metrics::CONTRACT_STATUS_TEXT => {
                if let Some(status) = row.value.as_deref() {
                    facts.live = status.trim().eq_ignore_ascii_case("active");
                }
            }
            n if n == metrics::CONTRACT_BUDGET_VALUE => {
                if let Some(budget) = row.value.as_deref().and_then(|v| v.trim().parse().ok()) {
                    facts.budget = budget;
                }
            }
            _ => {}
        }
    }

    let live: Vec<&ContractFacts> = by_contract.values().filter(|f| f.live).collect();
    LiveContractStats {
        count: live.len(),
        total_value: live.iter().map(|f| f.budget).sum(),
    }
}

/// Read-side engine over the store
pub struct KpiEngine<'a> {
    store: &'a PpStore,
}

impl<'a> KpiEngine<'a> {
    #[must_use]
    pub fn new(store: &'a PpStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &'a PpStore {
        self.store
    }

    /// Compute all KPI cards plus live-contract stats for one scope and
    /// snapshot. An empty scope never reaches the store; every card comes
    /// back N/A.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] on store failures.
    pub fn summary(
        &self,
        scope: &ResolvedScope,
        snapshot_month: &str,
    ) -> Result<SummaryData, QueryError> {
        if scope.is_empty() {
            return Ok(SummaryData {
                kpis: Kpi::ALL.iter().map(|k| KpiValue::not_applicable(*k)).collect(),
                snapshot_month: snapshot_month.to_string(),
                data_scope: scope.descriptor.clone(),
                live_contract_stats: LiveContractStats::default(),
            });
        }

        // One scan covers the scored metrics and the live-contract helpers
        let mut metric_names: Vec<&str> = Kpi::ALL.iter().filter_map(Kpi::metric_name).collect();
        metric_names.push(metrics::CONTRACT_STATUS_TEXT);
        metric_names.push(metrics::CONTRACT_BUDGET_VALUE);
        let rows =
            self.store
                .fetch_contract_metrics(&scope.personnel_ids, snapshot_month, &metric_names)?;

        let training = self
            .store
            .fetch_training_records(&scope.personnel_ids, snapshot_month)?;
        let distinct_modules = self.store.distinct_training_modules(snapshot_month)?;

        tracing::debug!(
            snapshot = snapshot_month,
            personnel = scope.personnel_ids.len(),
            metric_rows = rows.len(),
            training_rows = training.len(),
            "Computing KPI summary"
        );

        let kpis = Kpi::ALL
            .iter()
            .map(|kpi| self.compute_kpi(*kpi, &rows, &training, distinct_modules, scope))
            .collect();

        Ok(SummaryData {
            kpis,
            snapshot_month: snapshot_month.to_string(),
            data_scope: scope.descriptor.clone(),
            live_contract_stats: live_contract_stats(&rows),
        })
    }

    fn compute_kpi(
        &self,
        kpi: Kpi,
        rows: &[MetricRow],
        training: &[TrainingRecord],
        distinct_modules: i64,
        scope: &ResolvedScope,
    ) -> KpiValue {
        let value = match kpi.kind() {
            KpiKind::BooleanRate => {
                let matching = filter_metric(rows, kpi);
                boolean_rate(&matching)
            }
            KpiKind::PercentageAverage => {
                let matching = filter_metric(rows, kpi);
                percentage_average(&matching)
            }
            KpiKind::TrainingCompletion => {
                training_completion(training, distinct_modules, scope.personnel_ids.len())
            }
        };
        KpiValue::from_value(kpi, value)
    }

    /// Compute one KPI's current value from pre-fetched rows
    #[must_use]
    pub fn current_value(
        &self,
        kpi: Kpi,
        rows: &[MetricRow],
        training: &[TrainingRecord],
        distinct_modules: i64,
        scope: &ResolvedScope,
    ) -> KpiValue {
        self.compute_kpi(kpi, rows, training, distinct_modules, scope)
    }
}

pub(crate) fn filter_metric<'r>(rows: &'r [MetricRow], kpi: Kpi) -> Vec<&'r MetricRow> {
    match kpi.metric_name() {
        Some(name) => rows.iter().filter(|r| r.metric_name == name).collect(),
        None => vec![],
    }
}
