//! `pp_store` - `DuckDB` storage layer for Procure Pulse
//!
//! This crate provides:
//! - `DuckDB` connection management
//! - Schema migrations
//! - Batch ingestion writers (idempotent on natural keys)
//! - Scoped metric and training readers for the KPI engine

use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, instrument};

pub mod migrations;
pub mod schema;

pub use schema::{TrainingStatus, ValueType};

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] duckdb::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Escape a string for inclusion in a single-quoted SQL literal
#[must_use]
pub fn escape_sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render a slice of ids as a quoted SQL IN-list
fn sql_string_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", escape_sql_literal(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Account roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    TeamLeader,
    Director,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::TeamLeader => "team_leader",
            Role::Director => "director",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "team_leader" => Ok(Role::TeamLeader),
            "director" => Ok(Role::Director),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Team row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: String,
    pub team_name: String,
}

/// Sub-team row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTeam {
    pub sub_team_id: String,
    pub sub_team_name: String,
    pub team_id: String,
}

/// Sub-team joined with its owning team's name
#[derive(Debug, Clone)]
pub struct SubTeamWithTeam {
    pub sub_team_id: String,
    pub sub_team_name: String,
    pub team_id: String,
    pub team_name: String,
}

/// Personnel row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personnel {
    pub personnel_id: String,
    pub personnel_name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub sub_team_id: String,
}

/// Supplier row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub supplier_id: String,
    pub supplier_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub contact_email: Option<String>,
    pub rating: Option<f64>,
}

/// Authentication principal
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub personnel_id: Option<String>,
}

/// New account payload (id assigned by the store)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub personnel_id: Option<String>,
}

/// Account summary safe to expose over the API (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub personnel_id: Option<String>,
}

/// Full contract metric row as written by ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetricRecord {
    pub contract_id: String,
    pub snapshot_month: String,
    pub personnel_id: String,
    pub supplier_id: Option<String>,
    pub metric_name: String,
    pub value: Option<String>,
    pub value_type: String,
    pub target_date: Option<String>,
    pub actual_date: Option<String>,
    pub date_associated: Option<String>,
}

/// Metric row shape returned to the KPI engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub contract_id: String,
    pub personnel_id: String,
    pub supplier_id: Option<String>,
    pub metric_name: String,
    pub value: Option<String>,
    pub target_date: Option<String>,
    pub actual_date: Option<String>,
}

/// Training record row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    pub personnel_id: String,
    pub snapshot_month: String,
    pub training_module_id: String,
    pub training_module_name: Option<String>,
    pub training_status: String,
    pub completion_percentage: Option<i64>,
    pub training_completion_date: Option<String>,
    pub training_due_date: Option<String>,
}

/// Storage handle. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct PpStore {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl PpStore {
    /// Open or create a database at `path`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if directory creation, database opening, or
    /// migration execution fails.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = %path.display(), "Opening DuckDB database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_string_lossy().to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    /// Open an in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if in-memory database setup or migrations fail.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        };

        store.run_migrations()?;

        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        migrations::run_all(&conn)?;
        Ok(())
    }

    /// Get database path
    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    // =========================================================================
    // Ingestion writers (idempotent: INSERT OR IGNORE on natural keys)
    // =========================================================================

    /// Insert teams, skipping ids already present. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_teams(&self, teams: &[Team]) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for team in teams {
            written += conn.execute(
                "INSERT OR IGNORE INTO teams (team_id, team_name) VALUES (?, ?)",
                duckdb::params![team.team_id, team.team_name],
            )?;
        }
        Ok(written)
    }

    /// Insert sub-teams, skipping ids already present. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_sub_teams(&self, sub_teams: &[SubTeam]) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for st in sub_teams {
            written += conn.execute(
                "INSERT OR IGNORE INTO sub_teams (sub_team_id, sub_team_name, team_id) \
                 VALUES (?, ?, ?)",
                duckdb::params![st.sub_team_id, st.sub_team_name, st.team_id],
            )?;
        }
        Ok(written)
    }

    /// Insert personnel, skipping ids already present. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_personnel(&self, personnel: &[Personnel]) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for p in personnel {
            written += conn.execute(
                "INSERT OR IGNORE INTO personnel \
                 (personnel_id, personnel_name, email, role, sub_team_id) \
                 VALUES (?, ?, ?, ?, ?)",
                duckdb::params![p.personnel_id, p.personnel_name, p.email, p.role, p.sub_team_id],
            )?;
        }
        Ok(written)
    }

    /// Insert suppliers, skipping ids already present. Returns rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_suppliers(&self, suppliers: &[Supplier]) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for s in suppliers {
            written += conn.execute(
                "INSERT OR IGNORE INTO suppliers \
                 (supplier_id, supplier_name, country, city, contact_email, rating) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                duckdb::params![
                    s.supplier_id,
                    s.supplier_name,
                    s.country,
                    s.city,
                    s.contact_email,
                    s.rating
                ],
            )?;
        }
        Ok(written)
    }

    /// Insert contract metric rows. Re-ingesting the same batch writes
    /// nothing: the (`contract_id`, `snapshot_month`, `metric_name`) key is
    /// unique. Returns rows actually written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_contract_metrics(
        &self,
        records: &[ContractMetricRecord],
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for r in records {
            written += conn.execute(
                "INSERT OR IGNORE INTO contract_metrics \
                 (contract_id, snapshot_month, personnel_id, supplier_id, metric_name, \
                  value, value_type, target_date, actual_date, date_associated) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                duckdb::params![
                    r.contract_id,
                    r.snapshot_month,
                    r.personnel_id,
                    r.supplier_id,
                    r.metric_name,
                    r.value,
                    r.value_type,
                    r.target_date,
                    r.actual_date,
                    r.date_associated
                ],
            )?;
        }
        Ok(written)
    }

    /// Insert training records, skipping duplicate
    /// (`personnel_id`, `snapshot_month`, `training_module_id`) keys.
    /// Returns rows actually written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any insert fails.
    pub fn insert_training_records(
        &self,
        records: &[TrainingRecord],
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut written = 0;
        for r in records {
            written += conn.execute(
                "INSERT OR IGNORE INTO training_records \
                 (personnel_id, snapshot_month, training_module_id, training_module_name, \
                  training_status, completion_percentage, training_completion_date, \
                  training_due_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                duckdb::params![
                    r.personnel_id,
                    r.snapshot_month,
                    r.training_module_id,
                    r.training_module_name,
                    r.training_status,
                    r.completion_percentage,
                    r.training_completion_date,
                    r.training_due_date
                ],
            )?;
        }
        Ok(written)
    }

    // =========================================================================
    // Snapshot queries
    // =========================================================================

    /// Latest snapshot month across all contract metric rows, or `None` when
    /// nothing has been ingested yet. `YYYY-MM` strings order correctly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn latest_snapshot(&self) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result: Result<Option<String>, duckdb::Error> = conn.query_row(
            "SELECT MAX(snapshot_month) FROM contract_metrics",
            [],
            |row| row.get(0),
        );
        match result {
            Ok(v) => Ok(v),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All distinct snapshot months, newest first
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn list_snapshots(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT snapshot_month FROM contract_metrics ORDER BY snapshot_month DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct snapshot months that have at least one row of `metric_name`
    /// within scope, ascending. Empty scope yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn metric_snapshots_in_scope(
        &self,
        personnel_ids: &[String],
        metric_name: &str,
    ) -> Result<Vec<String>, StoreError> {
        if personnel_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT DISTINCT snapshot_month FROM contract_metrics \
             WHERE metric_name = ? AND personnel_id IN ({}) \
             ORDER BY snapshot_month ASC",
            sql_string_list(personnel_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![metric_name], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct snapshot months with training rows within scope, ascending
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn training_snapshots_in_scope(
        &self,
        personnel_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if personnel_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT DISTINCT snapshot_month FROM training_records \
             WHERE personnel_id IN ({}) ORDER BY snapshot_month ASC",
            sql_string_list(personnel_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Metric store reader
    // =========================================================================

    /// Fetch contract metric rows for a scope, snapshot, and set of metric
    /// names, in one scan. An empty scope returns no rows rather than
    /// degrading into an unscoped query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn fetch_contract_metrics(
        &self,
        personnel_ids: &[String],
        snapshot_month: &str,
        metric_names: &[&str],
    ) -> Result<Vec<MetricRow>, StoreError> {
        if personnel_ids.is_empty() || metric_names.is_empty() {
            return Ok(vec![]);
        }
        let names: Vec<String> = metric_names.iter().map(|n| (*n).to_string()).collect();
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT contract_id, personnel_id, supplier_id, metric_name, value, \
                    target_date, actual_date \
             FROM contract_metrics \
             WHERE snapshot_month = ? \
               AND personnel_id IN ({}) \
               AND metric_name IN ({}) \
             ORDER BY contract_id ASC",
            sql_string_list(personnel_ids),
            sql_string_list(&names)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![snapshot_month], |row| {
            Ok(MetricRow {
                contract_id: row.get(0)?,
                personnel_id: row.get(1)?,
                supplier_id: row.get(2)?,
                metric_name: row.get(3)?,
                value: row.get(4)?,
                target_date: row.get(5)?,
                actual_date: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fetch training records for a scope and snapshot
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn fetch_training_records(
        &self,
        personnel_ids: &[String],
        snapshot_month: &str,
    ) -> Result<Vec<TrainingRecord>, StoreError> {
        if personnel_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT personnel_id, snapshot_month, training_module_id, training_module_name, \
                    training_status, completion_percentage, training_completion_date, \
                    training_due_date \
             FROM training_records \
             WHERE snapshot_month = ? AND personnel_id IN ({}) \
             ORDER BY personnel_id ASC, training_module_id ASC",
            sql_string_list(personnel_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![snapshot_month], |row| {
            Ok(TrainingRecord {
                personnel_id: row.get(0)?,
                snapshot_month: row.get(1)?,
                training_module_id: row.get(2)?,
                training_module_name: row.get(3)?,
                training_status: row.get(4)?,
                completion_percentage: row.get(5)?,
                training_completion_date: row.get(6)?,
                training_due_date: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count of distinct training modules present in a snapshot (the `M` of
    /// the mandatory-training denominator)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn distinct_training_modules(&self, snapshot_month: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT training_module_id) FROM training_records \
             WHERE snapshot_month = ?",
            duckdb::params![snapshot_month],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Org hierarchy lookups
    // =========================================================================

    /// Total personnel count in the system
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn count_personnel(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM personnel", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All personnel ids (organization-wide scope)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn all_personnel_ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT personnel_id FROM personnel ORDER BY personnel_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Personnel ids within one sub-team
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn personnel_ids_in_sub_team(&self, sub_team_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT personnel_id FROM personnel WHERE sub_team_id = ? ORDER BY personnel_id",
        )?;
        let rows = stmt.query_map(duckdb::params![sub_team_id], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Personnel ids under any sub-team of one team
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn personnel_ids_in_team(&self, team_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT p.personnel_id FROM personnel p \
             JOIN sub_teams st ON p.sub_team_id = st.sub_team_id \
             WHERE st.team_id = ? ORDER BY p.personnel_id",
        )?;
        let rows = stmt.query_map(duckdb::params![team_id], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Look up a single personnel record
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn get_personnel(&self, personnel_id: &str) -> Result<Option<Personnel>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT personnel_id, personnel_name, email, role, sub_team_id \
             FROM personnel WHERE personnel_id = ?",
            duckdb::params![personnel_id],
            |row| {
                Ok(Personnel {
                    personnel_id: row.get(0)?,
                    personnel_name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                    sub_team_id: row.get(4)?,
                })
            },
        );
        match result {
            Ok(p) => Ok(Some(p)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Display names for a set of personnel ids
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn personnel_names(
        &self,
        personnel_ids: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        if personnel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT personnel_id, personnel_name FROM personnel WHERE personnel_id IN ({})",
            sql_string_list(personnel_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<HashMap<_, _>, _>>()
            .map_err(Into::into)
    }

    /// Look up a team
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn get_team(&self, team_id: &str) -> Result<Option<Team>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT team_id, team_name FROM teams WHERE team_id = ?",
            duckdb::params![team_id],
            |row| {
                Ok(Team {
                    team_id: row.get(0)?,
                    team_name: row.get(1)?,
                })
            },
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a sub-team joined with its owning team's name
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn get_sub_team(&self, sub_team_id: &str) -> Result<Option<SubTeamWithTeam>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT st.sub_team_id, st.sub_team_name, st.team_id, COALESCE(t.team_name, '') \
             FROM sub_teams st LEFT JOIN teams t ON st.team_id = t.team_id \
             WHERE st.sub_team_id = ?",
            duckdb::params![sub_team_id],
            |row| {
                Ok(SubTeamWithTeam {
                    sub_team_id: row.get(0)?,
                    sub_team_name: row.get(1)?,
                    team_id: row.get(2)?,
                    team_name: row.get(3)?,
                })
            },
        );
        match result {
            Ok(st) => Ok(Some(st)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All teams ordered by name (filter dropdown)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT team_id, team_name FROM teams ORDER BY team_name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Team {
                team_id: row.get(0)?,
                team_name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Sub-teams of a team ordered by name (filter dropdown)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn list_sub_teams(&self, team_id: &str) -> Result<Vec<SubTeam>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sub_team_id, sub_team_name, team_id FROM sub_teams \
             WHERE team_id = ? ORDER BY sub_team_name",
        )?;
        let rows = stmt.query_map(duckdb::params![team_id], |row| {
            Ok(SubTeam {
                sub_team_id: row.get(0)?,
                sub_team_name: row.get(1)?,
                team_id: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Personnel of a sub-team ordered by name (filter dropdown)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn list_personnel(&self, sub_team_id: &str) -> Result<Vec<Personnel>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT personnel_id, personnel_name, email, role, sub_team_id FROM personnel \
             WHERE sub_team_id = ? ORDER BY personnel_name",
        )?;
        let rows = stmt.query_map(duckdb::params![sub_team_id], |row| {
            Ok(Personnel {
                personnel_id: row.get(0)?,
                personnel_name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                sub_team_id: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create an account. Email is stored lowercase; a duplicate email or an
    /// already-linked personnel id is a [`StoreError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on conflict or query failure.
    pub fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
        let email = new.email.to_lowercase();

        if self.user_by_email(&email)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "email already registered: {email}"
            )));
        }
        if let Some(pid) = &new.personnel_id
            && self.user_by_personnel(pid)?.is_some()
        {
            return Err(StoreError::Conflict(format!(
                "personnel id already linked to an account: {pid}"
            )));
        }

        let conn = self.conn.lock().unwrap();
        let user_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(user_id), 0) + 1 FROM users",
            [],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO users (user_id, name, email, password_hash, role, personnel_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
            duckdb::params![
                user_id,
                new.name,
                email,
                new.password_hash,
                new.role.as_str(),
                new.personnel_id
            ],
        )?;

        Ok(User {
            user_id,
            name: new.name.clone(),
            email,
            password_hash: new.password_hash.clone(),
            role: new.role,
            personnel_id: new.personnel_id.clone(),
        })
    }

    fn map_user(row: &duckdb::Row<'_>) -> Result<User, duckdb::Error> {
        let role_str: String = row.get(4)?;
        Ok(User {
            user_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: role_str.parse().unwrap_or(Role::User),
            personnel_id: row.get(5)?,
        })
    }

    /// Look up an account by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT user_id, name, email, password_hash, role, personnel_id \
             FROM users WHERE email = ?",
            duckdb::params![email.to_lowercase()],
            Self::map_user,
        );
        match result {
            Ok(u) => Ok(Some(u)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an account by id
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn user_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT user_id, name, email, password_hash, role, personnel_id \
             FROM users WHERE user_id = ?",
            duckdb::params![user_id],
            Self::map_user,
        );
        match result {
            Ok(u) => Ok(Some(u)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the account linked to a personnel record, if any
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn user_by_personnel(&self, personnel_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT user_id, name, email, password_hash, role, personnel_id \
             FROM users WHERE personnel_id = ?",
            duckdb::params![personnel_id],
            Self::map_user,
        );
        match result {
            Ok(u) => Ok(Some(u)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All accounts without password hashes (admin view)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, name, email, role, personnel_id FROM users ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let role_str: String = row.get(3)?;
            Ok(UserSummary {
                user_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: role_str.parse().unwrap_or(Role::User),
                personnel_id: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_org(store: &PpStore) {
        store
            .insert_teams(&[Team {
                team_id: "T001".into(),
                team_name: "Commercial".into(),
            }])
            .unwrap();
        store
            .insert_sub_teams(&[
                SubTeam {
                    sub_team_id: "ST001".into(),
                    sub_team_name: "Sourcing".into(),
                    team_id: "T001".into(),
                },
                SubTeam {
                    sub_team_id: "ST002".into(),
                    sub_team_name: "Contract Management".into(),
                    team_id: "T001".into(),
                },
            ])
            .unwrap();
        store
            .insert_personnel(&[
                Personnel {
                    personnel_id: "P0001".into(),
                    personnel_name: "Alex Doe".into(),
                    email: Some("alex@example.gov".into()),
                    role: Some("Buyer".into()),
                    sub_team_id: "ST001".into(),
                },
                Personnel {
                    personnel_id: "P0002".into(),
                    personnel_name: "Sam Roe".into(),
                    email: Some("sam@example.gov".into()),
                    role: Some("Manager".into()),
                    sub_team_id: "ST002".into(),
                },
            ])
            .unwrap();
    }

    fn metric(contract: &str, snapshot: &str, personnel: &str, value: &str) -> ContractMetricRecord {
        ContractMetricRecord {
            contract_id: contract.into(),
            snapshot_month: snapshot.into(),
            personnel_id: personnel.into(),
            supplier_id: Some("SUP001".into()),
            metric_name: "CO KPI On Time".into(),
            value: Some(value.into()),
            value_type: "boolean_flag".into(),
            target_date: Some("2024-01-15".into()),
            actual_date: Some("2024-01-10".into()),
            date_associated: Some(format!("{snapshot}-01")),
        }
    }

    #[test]
    fn test_open_memory_and_migrations() {
        let store = PpStore::open_memory().unwrap();
        assert_eq!(store.db_path(), ":memory:");
        assert_eq!(store.count_personnel().unwrap(), 0);
    }

    #[test]
    fn test_latest_snapshot_empty() {
        let store = PpStore::open_memory().unwrap();
        assert!(store.latest_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_latest_snapshot_orders_by_month() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        store
            .insert_contract_metrics(&[
                metric("C001", "2023-12", "P0001", "1"),
                metric("C002", "2024-02", "P0001", "1"),
                metric("C003", "2024-01", "P0002", "0"),
            ])
            .unwrap();
        assert_eq!(store.latest_snapshot().unwrap().as_deref(), Some("2024-02"));
        assert_eq!(
            store.list_snapshots().unwrap(),
            vec!["2024-02", "2024-01", "2023-12"]
        );
    }

    #[test]
    fn test_reingest_does_not_duplicate() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        let batch = vec![
            metric("C001", "2024-01", "P0001", "1"),
            metric("C002", "2024-01", "P0002", "0"),
        ];
        let first = store.insert_contract_metrics(&batch).unwrap();
        assert_eq!(first, 2);
        let second = store.insert_contract_metrics(&batch).unwrap();
        assert_eq!(second, 0);

        let rows = store
            .fetch_contract_metrics(
                &["P0001".to_string(), "P0002".to_string()],
                "2024-01",
                &["CO KPI On Time"],
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_fetch_contract_metrics_empty_scope_short_circuits() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        store
            .insert_contract_metrics(&[metric("C001", "2024-01", "P0001", "1")])
            .unwrap();
        let rows = store
            .fetch_contract_metrics(&[], "2024-01", &["CO KPI On Time"])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_fetch_contract_metrics_scoped() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        store
            .insert_contract_metrics(&[
                metric("C001", "2024-01", "P0001", "1"),
                metric("C002", "2024-01", "P0002", "0"),
            ])
            .unwrap();
        let rows = store
            .fetch_contract_metrics(&["P0001".to_string()], "2024-01", &["CO KPI On Time"])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contract_id, "C001");
        assert_eq!(rows[0].value.as_deref(), Some("1"));
    }

    #[test]
    fn test_personnel_scope_queries() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        assert_eq!(
            store.personnel_ids_in_sub_team("ST001").unwrap(),
            vec!["P0001"]
        );
        assert_eq!(
            store.personnel_ids_in_team("T001").unwrap(),
            vec!["P0001", "P0002"]
        );
        assert_eq!(store.all_personnel_ids().unwrap().len(), 2);
        assert!(store.personnel_ids_in_team("T999").unwrap().is_empty());
    }

    #[test]
    fn test_sub_team_join_includes_team_name() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        let st = store.get_sub_team("ST001").unwrap().unwrap();
        assert_eq!(st.sub_team_name, "Sourcing");
        assert_eq!(st.team_name, "Commercial");
        assert!(store.get_sub_team("ST999").unwrap().is_none());
    }

    #[test]
    fn test_training_records_dedupe_and_module_count() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        let rec = TrainingRecord {
            personnel_id: "P0001".into(),
            snapshot_month: "2024-01".into(),
            training_module_id: "TRN001".into(),
            training_module_name: Some("Annual Security Awareness".into()),
            training_status: "Completed".into(),
            completion_percentage: Some(100),
            training_completion_date: Some("2024-01-12".into()),
            training_due_date: Some("2024-01-31".into()),
        };
        assert_eq!(store.insert_training_records(&[rec.clone()]).unwrap(), 1);
        assert_eq!(store.insert_training_records(&[rec]).unwrap(), 0);
        assert_eq!(store.distinct_training_modules("2024-01").unwrap(), 1);
        assert_eq!(store.distinct_training_modules("2024-02").unwrap(), 0);
    }

    #[test]
    fn test_user_creation_and_conflicts() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        let user = store
            .create_user(&NewUser {
                name: "Alex Doe".into(),
                email: "Alex@Example.Gov".into(),
                password_hash: "hash".into(),
                role: Role::User,
                personnel_id: Some("P0001".into()),
            })
            .unwrap();
        assert_eq!(user.user_id, 1);
        assert_eq!(user.email, "alex@example.gov");

        // Duplicate email (case-insensitive)
        let dup = store.create_user(&NewUser {
            name: "Other".into(),
            email: "alex@example.gov".into(),
            password_hash: "hash".into(),
            role: Role::User,
            personnel_id: None,
        });
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        // Personnel already linked
        let linked = store.create_user(&NewUser {
            name: "Other".into(),
            email: "other@example.gov".into(),
            password_hash: "hash".into(),
            role: Role::User,
            personnel_id: Some("P0001".into()),
        });
        assert!(matches!(linked, Err(StoreError::Conflict(_))));

        let found = store.user_by_email("ALEX@example.gov").unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert_eq!(found.role, Role::User);
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_personnel_names_lookup() {
        let store = PpStore::open_memory().unwrap();
        seed_org(&store);
        let names = store
            .personnel_names(&["P0001".to_string(), "P0404".to_string()])
            .unwrap();
        assert_eq!(names.get("P0001").map(String::as_str), Some("Alex Doe"));
        assert!(!names.contains_key("P0404"));
    }

    #[test]
    fn test_escape_sql_literal() {
        assert_eq!(escape_sql_literal("O'Brien"), "O''Brien");
        assert_eq!(escape_sql_literal("plain"), "plain");
    }
}
