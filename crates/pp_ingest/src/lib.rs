//! `pp_ingest` - CSV snapshot ingestion
//!
//! Reads the six generated report files from a directory and loads them into
//! the store. Reference data (teams, sub-teams, suppliers, personnel) is
//! keyed on its natural id; snapshot data (contract compliance, training) is
//! keyed on its natural composite key, so re-running ingestion over the same
//! files writes nothing new.
//!
//! Each wide contract row is fanned out into one metric row per derivable
//! KPI, plus the status-text and budget-value helper rows used by the
//! live-contract statistics panel. A metric whose inputs are absent produces
//! no row at all rather than a null row.

use chrono::{Local, NaiveDate};
use pp_store::schema::{ValueType, metrics};
use pp_store::{
    ContractMetricRecord, Personnel, PpStore, StoreError, SubTeam, Supplier, Team, TrainingRecord,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

mod records;

pub use records::{ContractRow, PersonnelRow, SubTeamRow, SupplierRow, TeamRow, TrainingRow};

/// Expected file names under the ingest directory
pub mod files {
    pub const TEAMS: &str = "Resource_Teams.csv";
    pub const SUB_TEAMS: &str = "Resource_SubTeams.csv";
    pub const SUPPLIERS: &str = "Resource_Suppliers.csv";
    pub const PERSONNEL: &str = "Resource_Personnel.csv";
    pub const CONTRACTS: &str = "CMS_Contract_Compliance_ALL_SNAPSHOTS.csv";
    pub const TRAINING: &str = "HR_Personnel_Training_ALL_SNAPSHOTS.csv";
}

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV error in {file}: {source}")]
    CsvError {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Counts from one ingestion run
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub teams_written: usize,
    pub sub_teams_written: usize,
    pub suppliers_written: usize,
    pub personnel_written: usize,
    pub contract_rows_read: usize,
    pub metric_rows_written: usize,
    pub training_rows_written: usize,
    pub missing_files: Vec<String>,
}

fn read_csv<T: DeserializeOwned>(
    dir: &Path,
    file_name: &str,
    missing: &mut Vec<String>,
) -> Result<Vec<T>, IngestError> {
    let path = dir.join(file_name);
    if !path.exists() {
        warn!(file = file_name, "CSV file not found, skipping");
        missing.push(file_name.to_string());
        return Ok(vec![]);
    }
    let mut reader = csv::Reader::from_path(&path).map_err(|e| IngestError::CsvError {
        file: file_name.to_string(),
        source: e,
    })?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.map_err(|e| IngestError::CsvError {
            file: file_name.to_string(),
            source: e,
        })?;
        rows.push(row);
    }
    info!(file = file_name, rows = rows.len(), "Parsed CSV file");
    Ok(rows)
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
    })
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

/// On-time flag from a target/actual date pair:
/// both present compares them; a passed target with no actual is a miss;
/// anything else yields no value.
fn on_time_flag(target: Option<NaiveDate>, actual: Option<NaiveDate>, today: NaiveDate) -> Option<&'static str> {
    match (target, actual) {
        (Some(t), Some(a)) => Some(if a <= t { "1" } else { "0" }),
        (Some(t), None) if t < today => Some("0"),
        _ => None,
    }
}

struct MetricSpec {
    name: &'static str,
    value: Option<String>,
    value_type: ValueType,
    target_date: Option<String>,
    actual_date: Option<String>,
}

/// Fan one wide contract row out into metric rows. `today` parameterizes the
/// overdue check for the on-time metrics.
#[must_use]
pub fn derive_contract_metrics(row: &ContractRow, today: NaiveDate) -> Vec<ContractMetricRecord> {
    let flag_value = |flag: &Option<String>| Some(if parse_flag(flag.as_deref()) { "1" } else { "0" }.to_string());

    let on_time = |target: &Option<String>, actual: &Option<String>| {
        on_time_flag(
            parse_date(target.as_deref()),
            parse_date(actual.as_deref()),
            today,
        )
        .map(String::from)
    };

    let overspend = match (row.contract_budget_value, row.contract_actual_spend) {
        (Some(budget), Some(spend)) if budget > 0.0 => {
            Some(((spend - budget) / budget * 100.0).to_string())
        }
        _ => None,
    };

    let cabinet_office_met = parse_flag(row.cabinet_office_condition_a_met.as_deref())
        && parse_flag(row.cabinet_office_condition_b_met.as_deref())
        && parse_flag(row.cabinet_office_condition_c_met.as_deref());

    let specs = vec![
        MetricSpec {
            name: metrics::CO_KPI_ON_TIME,
            value: on_time(
                &row.co_kpi_target_completion_date,
                &row.co_kpi_actual_completion_date,
            ),
            value_type: ValueType::BooleanFlag,
            target_date: row.co_kpi_target_completion_date.clone(),
            actual_date: row.co_kpi_actual_completion_date.clone(),
        },
        MetricSpec {
            name: metrics::AWARD_NOTICE_ON_TIME,
            value: on_time(
                &row.award_notice_required_by_date,
                &row.award_notice_published_date,
            ),
            value_type: ValueType::BooleanFlag,
            target_date: row.award_notice_required_by_date.clone(),
            actual_date: row.award_notice_published_date.clone(),
        },
        MetricSpec {
            name: metrics::UK01_NOTICE_ON_TIME,
            value: on_time(
                &row.uk01_notice_required_by_date,
                &row.uk01_notice_published_date,
            ),
            value_type: ValueType::BooleanFlag,
            target_date: row.uk01_notice_required_by_date.clone(),
            actual_date: row.uk01_notice_published_date.clone(),
        },
        MetricSpec {
            name: metrics::CONTRACT_OVERSPEND_PERCENT,
            value: overspend,
            value_type: ValueType::Percentage,
            target_date: None,
            actual_date: None,
        },
        MetricSpec {
            name: metrics::CONTRACT_CLOSURE_ON_TIME,
            value: on_time(
                &row.contract_closure_target_date,
                &row.contract_actual_closure_date,
            ),
            value_type: ValueType::BooleanFlag,
            target_date: row.contract_closure_target_date.clone(),
            actual_date: row.contract_actual_closure_date.clone(),
        },
        MetricSpec {
            name: metrics::SOCIAL_VALUE_MET,
            value: flag_value(&row.has_social_value_commitment),
            value_type: ValueType::BooleanFlag,
            target_date: None,
            actual_date: None,
        },
        MetricSpec {
            name: metrics::SME_AWARDED,
            value: flag_value(&row.is_sme_awarded),
            value_type: ValueType::BooleanFlag,
            target_date: None,
            actual_date: None,
        },
        MetricSpec {
            name: metrics::COMPETITIVELY_TENDERED,
            value: flag_value(&row.was_competitively_tendered),
            value_type: ValueType::BooleanFlag,
            target_date: None,
            actual_date: None,
        },
        MetricSpec {
            name: metrics::CABINET_OFFICE_CONDITIONS_MET,
            value: Some(if cabinet_office_met { "1" } else { "0" }.to_string()),
            value_type: ValueType::BooleanFlag,
            target_date: None,
            actual_date: None,
        },
        MetricSpec {
            name: metrics::CONTRACT_STATUS_TEXT,
            value: row.contract_status.clone(),
            value_type: ValueType::StatusText,
            target_date: row.contract_expiry_date.clone(),
            actual_date: row.contract_actual_closure_date.clone(),
        },
        MetricSpec {
            name: metrics::CONTRACT_BUDGET_VALUE,
            value: row.contract_budget_value.map(|v| v.to_string()),
            value_type: ValueType::Numeric,
            target_date: None,
            actual_date: None,
        },
    ];

    let date_associated = Some(format!("{}-01", row.snapshot_month));

    specs
        .into_iter()
        .filter_map(|spec| {
            spec.value.map(|value| ContractMetricRecord {
                contract_id: row.contract_id.clone(),
                snapshot_month: row.snapshot_month.clone(),
                personnel_id: row.personnel_id.clone(),
                supplier_id: row.supplier_id.clone(),
                metric_name: spec.name.to_string(),
                value: Some(value),
                value_type: spec.value_type.as_str().to_string(),
                target_date: spec.target_date,
                actual_date: spec.actual_date,
                date_associated: date_associated.clone(),
            })
        })
        .collect()
}

/// Ingest all report files from `dir` into the store
///
/// # Errors
///
/// Returns [`IngestError`] on malformed CSV content or store failures.
/// Missing files are skipped with a warning and listed in the report.
pub fn run(store: &PpStore, dir: &Path) -> Result<IngestReport, IngestError> {
    let today = Local::now().date_naive();
    run_with_today(store, dir, today)
}

/// [`run`] with an explicit "today" for the overdue checks
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_today(
    store: &PpStore,
    dir: &Path,
    today: NaiveDate,
) -> Result<IngestReport, IngestError> {
    info!(dir = %dir.display(), "Starting ingestion");
    let mut report = IngestReport::default();

    let teams: Vec<TeamRow> = read_csv(dir, files::TEAMS, &mut report.missing_files)?;
    let teams: Vec<Team> = teams
        .into_iter()
        .map(|r| Team {
            team_id: r.team_id,
            team_name: r.team_name,
        })
        .collect();
    report.teams_written = store.insert_teams(&teams)?;

    let sub_teams: Vec<SubTeamRow> = read_csv(dir, files::SUB_TEAMS, &mut report.missing_files)?;
    let sub_teams: Vec<SubTeam> = sub_teams
        .into_iter()
        .map(|r| SubTeam {
            sub_team_id: r.sub_team_id,
            sub_team_name: r.sub_team_name,
            team_id: r.team_id,
        })
        .collect();
    report.sub_teams_written = store.insert_sub_teams(&sub_teams)?;

    let suppliers: Vec<SupplierRow> = read_csv(dir, files::SUPPLIERS, &mut report.missing_files)?;
    let suppliers: Vec<Supplier> = suppliers
        .into_iter()
        .map(|r| Supplier {
            supplier_id: r.supplier_id,
            supplier_name: r.supplier_name,
            country: r.country,
            city: r.city,
            contact_email: r.contact_email,
            rating: r.rating,
        })
        .collect();
    report.suppliers_written = store.insert_suppliers(&suppliers)?;

    let personnel: Vec<PersonnelRow> = read_csv(dir, files::PERSONNEL, &mut report.missing_files)?;
    let personnel: Vec<Personnel> = personnel
        .into_iter()
        .map(|r| Personnel {
            personnel_id: r.personnel_id,
            personnel_name: r.personnel_name,
            email: r.email,
            role: r.role,
            sub_team_id: r.sub_team_id,
        })
        .collect();
    report.personnel_written = store.insert_personnel(&personnel)?;

    let contracts: Vec<ContractRow> = read_csv(dir, files::CONTRACTS, &mut report.missing_files)?;
    report.contract_rows_read = contracts.len();
    let mut metric_rows = Vec::new();
    for row in &contracts {
        metric_rows.extend(derive_contract_metrics(row, today));
    }
    report.metric_rows_written = store.insert_contract_metrics(&metric_rows)?;

    let training: Vec<TrainingRow> = read_csv(dir, files::TRAINING, &mut report.missing_files)?;
    let training: Vec<TrainingRecord> = training
        .into_iter()
        .map(|r| TrainingRecord {
            personnel_id: r.personnel_id,
            snapshot_month: r.snapshot_month,
            training_module_id: r.training_module_id,
            training_module_name: r.training_module_name,
            training_status: r.training_status,
            completion_percentage: r.completion_percentage,
            training_completion_date: r.training_completion_date,
            training_due_date: r.training_due_date,
        })
        .collect();
    report.training_rows_written = store.insert_training_records(&training)?;

    info!(
        metric_rows = report.metric_rows_written,
        training_rows = report.training_rows_written,
        "Ingestion complete"
    );
    Ok(report)
}
