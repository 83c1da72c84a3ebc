//! CSV row shapes for the six report files

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TeamRow {
    pub team_id: String,
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SubTeamRow {
    pub sub_team_id: String,
    pub sub_team_name: String,
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SupplierRow {
    pub supplier_id: String,
    pub supplier_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PersonnelRow {
    pub personnel_id: String,
    pub personnel_name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub sub_team_id: String,
}

/// One wide row per contract per snapshot month. The ingester fans each row
/// out into one `contract_metrics` row per derivable metric.
#[derive(Debug, Deserialize)]
pub struct ContractRow {
    pub contract_id: String,
    pub snapshot_month: String,
    pub personnel_id: String,
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub contract_status: Option<String>,

    #[serde(default)]
    pub contract_start_date: Option<String>,
    #[serde(default)]
    pub co_kpi_target_completion_date: Option<String>,
    #[serde(default)]
    pub co_kpi_actual_completion_date: Option<String>,
    #[serde(default)]
    pub award_notice_required_by_date: Option<String>,
    #[serde(default)]
    pub award_notice_published_date: Option<String>,
    #[serde(default)]
    pub uk01_notice_required_by_date: Option<String>,
    #[serde(default)]
    pub uk01_notice_published_date: Option<String>,
    #[serde(default)]
    pub contract_expiry_date: Option<String>,
    #[serde(default)]
    pub contract_closure_target_date: Option<String>,
    #[serde(default)]
    pub contract_actual_closure_date: Option<String>,

    #[serde(default)]
    pub contract_budget_value: Option<f64>,
    #[serde(default)]
    pub contract_actual_spend: Option<f64>,

    #[serde(default)]
    pub has_social_value_commitment: Option<String>,
    #[serde(default)]
    pub is_sme_awarded: Option<String>,
    #[serde(default)]
    pub was_competitively_tendered: Option<String>,
    #[serde(default, rename = "cabinet_office_condition_A_met")]
    pub cabinet_office_condition_a_met: Option<String>,
    #[serde(default, rename = "cabinet_office_condition_B_met")]
    pub cabinet_office_condition_b_met: Option<String>,
    #[serde(default, rename = "cabinet_office_condition_C_met")]
    pub cabinet_office_condition_c_met: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrainingRow {
    pub personnel_id: String,
    pub snapshot_month: String,
    pub training_module_id: String,
    #[serde(default)]
    pub training_module_name: Option<String>,
    pub training_status: String,
    #[serde(default)]
    pub completion_percentage: Option<i64>,
    #[serde(default)]
    pub training_completion_date: Option<String>,
    #[serde(default)]
    pub training_due_date: Option<String>,
}
