//! Schema definitions and constants

/// Table names
pub mod tables {
    pub const TEAMS: &str = "teams";
    pub const SUB_TEAMS: &str = "sub_teams";
    pub const PERSONNEL: &str = "personnel";
    pub const SUPPLIERS: &str = "suppliers";
    pub const USERS: &str = "users";
    pub const CONTRACT_METRICS: &str = "contract_metrics";
    pub const TRAINING_RECORDS: &str = "training_records";
}

/// Metric names stored in `contract_metrics`
pub mod metrics {
    pub const CO_KPI_ON_TIME: &str = "CO KPI On Time";
    pub const AWARD_NOTICE_ON_TIME: &str = "Award Notice On Time";
    pub const UK01_NOTICE_ON_TIME: &str = "UK01 Notice On Time";
    pub const CONTRACT_OVERSPEND_PERCENT: &str = "Contract Overspend %";
    pub const CONTRACT_CLOSURE_ON_TIME: &str = "Contract Closure On Time";
    pub const SOCIAL_VALUE_MET: &str = "Social Value Met";
    pub const SME_AWARDED: &str = "SME Awarded";
    pub const COMPETITIVELY_TENDERED: &str = "Competitively Tendered";
    pub const CABINET_OFFICE_CONDITIONS_MET: &str = "Cabinet Office Conditions Met";

    /// Helper rows backing the live-contract statistics panel
    pub const CONTRACT_STATUS_TEXT: &str = "Contract Status Text";
    pub const CONTRACT_BUDGET_VALUE: &str = "Contract Budget Value";
}

/// Stored metric value types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    BooleanFlag,
    Percentage,
    Numeric,
    StatusText,
}

impl ValueType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::BooleanFlag => "boolean_flag",
            ValueType::Percentage => "percentage",
            ValueType::Numeric => "numeric",
            ValueType::StatusText => "status_text",
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "boolean_flag" => Ok(ValueType::BooleanFlag),
            "percentage" => Ok(ValueType::Percentage),
            "numeric" => Ok(ValueType::Numeric),
            "status_text" => Ok(ValueType::StatusText),
            other => Err(format!("unknown value type: {other}")),
        }
    }
}

/// Training record statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
}

impl TrainingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::NotStarted => "Not Started",
            TrainingStatus::InProgress => "In Progress",
            TrainingStatus::Completed => "Completed",
            TrainingStatus::Overdue => "Overdue",
        }
    }
}

impl std::str::FromStr for TrainingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "not started" => Ok(TrainingStatus::NotStarted),
            "in progress" => Ok(TrainingStatus::InProgress),
            "completed" => Ok(TrainingStatus::Completed),
            "overdue" => Ok(TrainingStatus::Overdue),
            other => Err(format!("unknown training status: {other}")),
        }
    }
}
