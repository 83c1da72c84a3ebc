//! Scope resolution
//!
//! Turns either explicit hierarchy filters or an authenticated account into
//! a flat set of personnel ids plus a human-readable descriptor. Unknown
//! filter ids are not errors; they resolve to an empty scope whose
//! descriptor echoes the raw id back, and the calculators render every KPI
//! as N/A for an empty scope.

use crate::QueryError;
use pp_store::{PpStore, Role, User};
use serde::{Deserialize, Serialize};

/// Optional hierarchy filters, most specific wins
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilters {
    pub team_id: Option<String>,
    pub sub_team_id: Option<String>,
    pub personnel_id: Option<String>,
}

impl ScopeFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.team_id.is_none() && self.sub_team_id.is_none() && self.personnel_id.is_none()
    }
}

/// Scope granularity labels used in responses
pub mod levels {
    pub const INDIVIDUAL: &str = "Individual";
    pub const SUB_TEAM: &str = "Sub-Team";
    pub const TEAM: &str = "Team";
    pub const ORGANIZATION_WIDE: &str = "Organization-Wide";
}

/// Human-readable scope descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDescriptor {
    pub level: String,
    pub name: String,
}

impl ScopeDescriptor {
    fn new(level: &str, name: impl Into<String>) -> Self {
        Self {
            level: level.to_string(),
            name: name.into(),
        }
    }
}

/// A resolved population of personnel ids
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    pub personnel_ids: Vec<String>,
    pub descriptor: ScopeDescriptor,
}

impl ResolvedScope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personnel_ids.is_empty()
    }
}

/// Resolve explicit filters, most specific first: personnel, then sub-team,
/// then team, then the whole organization.
///
/// # Errors
///
/// Returns [`QueryError`] only on store failures; unknown ids resolve to an
/// empty scope.
pub fn resolve_scope(store: &PpStore, filters: &ScopeFilters) -> Result<ResolvedScope, QueryError> {
    if let Some(personnel_id) = &filters.personnel_id {
        return match store.get_personnel(personnel_id)? {
            Some(person) => Ok(ResolvedScope {
                personnel_ids: vec![person.personnel_id],
                descriptor: ScopeDescriptor::new(levels::INDIVIDUAL, person.personnel_name),
            }),
            None => Ok(ResolvedScope {
                personnel_ids: vec![],
                descriptor: ScopeDescriptor::new(
                    levels::INDIVIDUAL,
                    format!("Personnel ID: {personnel_id}"),
                ),
            }),
        };
    }

    if let Some(sub_team_id) = &filters.sub_team_id {
        return match store.get_sub_team(sub_team_id)? {
            Some(sub_team) => Ok(ResolvedScope {
                personnel_ids: store.personnel_ids_in_sub_team(sub_team_id)?,
                descriptor: ScopeDescriptor::new(
                    levels::SUB_TEAM,
                    format!("{} - {}", sub_team.team_name, sub_team.sub_team_name),
                ),
            }),
            None => Ok(ResolvedScope {
                personnel_ids: vec![],
                descriptor: ScopeDescriptor::new(
                    levels::SUB_TEAM,
                    format!("Sub-Team ID: {sub_team_id}"),
                ),
            }),
        };
    }

    if let Some(team_id) = &filters.team_id {
        return match store.get_team(team_id)? {
            Some(team) => Ok(ResolvedScope {
                personnel_ids: store.personnel_ids_in_team(team_id)?,
                descriptor: ScopeDescriptor::new(levels::TEAM, team.team_name),
            }),
            None => Ok(ResolvedScope {
                personnel_ids: vec![],
                descriptor: ScopeDescriptor::new(levels::TEAM, format!("Team ID: {team_id}")),
            }),
        };
    }

    Ok(ResolvedScope {
        personnel_ids: store.all_personnel_ids()?,
        descriptor: ScopeDescriptor::new(levels::ORGANIZATION_WIDE, "Entire Organization"),
    })
}

/// Resolve the default scope for an authenticated account based on its role:
/// admins and directors see the whole organization, team leaders see their
/// own sub-team, users see themselves. Accounts without a linked personnel
/// record degrade to an empty scope with an explanatory label.
///
/// # Errors
///
/// Returns [`QueryError`] only on store failures.
pub fn resolve_scope_for_user(store: &PpStore, user: &User) -> Result<ResolvedScope, QueryError> {
    match user.role {
        Role::Admin | Role::Director => Ok(ResolvedScope {
            personnel_ids: store.all_personnel_ids()?,
            descriptor: ScopeDescriptor::new(levels::ORGANIZATION_WIDE, "Entire Organization"),
        }),
        Role::TeamLeader => {
            let Some(personnel_id) = &user.personnel_id else {
                return Ok(ResolvedScope {
                    personnel_ids: vec![],
                    descriptor: ScopeDescriptor::new(
                        levels::SUB_TEAM,
                        "Team Leader (no linked personnel record)",
                    ),
                });
            };
            let Some(person) = store.get_personnel(personnel_id)? else {
                return Ok(ResolvedScope {
                    personnel_ids: vec![],
                    descriptor: ScopeDescriptor::new(
                        levels::SUB_TEAM,
                        format!("Personnel ID: {personnel_id}"),
                    ),
                });
            };
            resolve_scope(
                store,
                &ScopeFilters {
                    sub_team_id: Some(person.sub_team_id),
                    ..ScopeFilters::default()
                },
            )
        }
        Role::User => {
            let Some(personnel_id) = &user.personnel_id else {
                return Ok(ResolvedScope {
                    personnel_ids: vec![],
                    descriptor: ScopeDescriptor::new(
                        levels::INDIVIDUAL,
                        "No linked personnel record",
                    ),
                });
            };
            resolve_scope(
                store,
                &ScopeFilters {
                    personnel_id: Some(personnel_id.clone()),
                    ..ScopeFilters::default()
                },
            )
        }
    }
}
