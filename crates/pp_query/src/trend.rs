//! Trend series
//!
//! Re-runs the current-value calculator against every historical snapshot
//! that has data in scope, ascending by month, then keeps the most recent
//! window. A snapshot that yields no computable value contributes a `null`
//! gap, never a zero.

use crate::{Kpi, KpiKind, QueryError, boolean_rate, filter_metric, percentage_average, training_completion};
use pp_store::PpStore;
use serde::{Deserialize, Serialize};

/// Points kept after truncation
pub const TREND_POINTS: usize = 12;

/// One series of snapshot labels and values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendData {
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}

/// Build the historical series for one KPI and scope. Each point is a full
/// independent read and calculation; no windowing or incremental state.
///
/// # Errors
///
/// Returns [`QueryError`] on store failures.
pub fn build_trend(
    store: &PpStore,
    kpi: Kpi,
    personnel_ids: &[String],
) -> Result<TrendData, QueryError> {
    if personnel_ids.is_empty() {
        return Ok(TrendData::default());
    }

    let snapshots = match kpi.metric_name() {
        Some(metric_name) => store.metric_snapshots_in_scope(personnel_ids, metric_name)?,
        None => store.training_snapshots_in_scope(personnel_ids)?,
    };

    let mut labels = Vec::with_capacity(snapshots.len());
    let mut values = Vec::with_capacity(snapshots.len());
    for snapshot in &snapshots {
        let value = match kpi.kind() {
            KpiKind::BooleanRate | KpiKind::PercentageAverage => {
                let metric_name = kpi
                    .metric_name()
                    .ok_or_else(|| QueryError::InvalidQuery("KPI has no metric name".into()))?;
                let rows =
                    store.fetch_contract_metrics(personnel_ids, snapshot, &[metric_name])?;
                let refs = filter_metric(&rows, kpi);
                if kpi.kind() == KpiKind::BooleanRate {
                    boolean_rate(&refs)
                } else {
                    percentage_average(&refs)
                }
            }
            KpiKind::TrainingCompletion => {
                let records = store.fetch_training_records(personnel_ids, snapshot)?;
                let modules = store.distinct_training_modules(snapshot)?;
                training_completion(&records, modules, personnel_ids.len())
            }
        };
        labels.push(snapshot.clone());
        values.push(value);
    }

    // Compute everything, then keep the most recent window
    if labels.len() > TREND_POINTS {
        let skip = labels.len() - TREND_POINTS;
        labels.drain(..skip);
        values.drain(..skip);
    }

    Ok(TrendData { labels, values })
}
