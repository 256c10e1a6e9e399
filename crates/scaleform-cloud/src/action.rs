//! Action types for server resource management

use crate::schema::{DeclaredConfig, Mutability, ResourceData, schema_field};
use crate::state::{GlobalState, ResourceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a planned action for a server resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Resource address (e.g., "server.web1")
    pub address: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Fields responsible for the action
    pub changed_fields: Vec<String>,

    /// Desired configuration, absent for deletions
    pub desired: Option<DeclaredConfig>,

    /// Description of the action
    pub description: String,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Patch an existing resource in place
    Update,
    /// Delete then recreate (a force-new field changed)
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Decide what to do with one resource
///
/// `prior` is the recorded state (if any), `desired` the configuration the
/// user declares now (`None` once the block was removed).
pub fn plan_resource(
    address: &str,
    prior: Option<&ResourceData>,
    desired: Option<&DeclaredConfig>,
) -> Action {
    let prior = prior.filter(|p| p.exists());

    let (action_type, changed_fields) = match (prior, desired) {
        (None, None) => (ActionType::NoOp, Vec::new()),
        (None, Some(_)) => (ActionType::Create, Vec::new()),
        (Some(_), None) => (ActionType::Delete, Vec::new()),
        (Some(prior), Some(desired)) => classify(address, &prior.config, desired),
    };

    let description = match action_type {
        ActionType::Create => format!("{} will be created", address),
        ActionType::Update => format!(
            "{} will be updated in place ({})",
            address,
            changed_fields.join(", ")
        ),
        ActionType::Replace => format!(
            "{} must be replaced ({})",
            address,
            changed_fields.join(", ")
        ),
        ActionType::Delete => format!("{} will be destroyed", address),
        ActionType::NoOp => format!("{} is up to date", address),
    };

    Action {
        address: address.to_string(),
        action_type,
        changed_fields,
        desired: desired.cloned(),
        description,
    }
}

/// Plan every resource known to either the state or the desired set
///
/// Tainted records are always replaced.
pub fn plan_all(state: &GlobalState, desired: &BTreeMap<String, DeclaredConfig>) -> Plan {
    let mut addresses: Vec<&String> = state.resources.keys().chain(desired.keys()).collect();
    addresses.sort();
    addresses.dedup();

    let actions = addresses
        .into_iter()
        .map(|address| {
            let record = state.get_resource(address);
            let wanted = desired.get(address);
            let mut action = plan_resource(address, record.map(|r| &r.data), wanted);

            let tainted = record.is_some_and(|r| r.status == ResourceStatus::Tainted);
            if tainted && wanted.is_some() && action.action_type != ActionType::Create {
                action.action_type = ActionType::Replace;
                action.description = format!("{} is tainted and will be replaced", address);
            }
            action
        })
        .collect();

    Plan::new(actions)
}

fn classify(
    address: &str,
    old: &DeclaredConfig,
    new: &DeclaredConfig,
) -> (ActionType, Vec<String>) {
    let mut force_new = Vec::new();
    let mut mutable = Vec::new();

    for name in old.changed_fields(new) {
        match schema_field(name).map(|f| f.mutability) {
            Some(Mutability::ForceNew) => force_new.push(name.to_string()),
            Some(Mutability::Mutable) => mutable.push(name.to_string()),
            Some(Mutability::SetOnce) => {
                tracing::warn!(
                    "{}: `{}` is only applied at creation; change ignored",
                    address,
                    name
                );
            }
            Some(Mutability::Computed) | None => {}
        }
    }

    if !force_new.is_empty() {
        (ActionType::Replace, force_new)
    } else if !mutable.is_empty() {
        (ActionType::Update, mutable)
    } else {
        (ActionType::NoOp, Vec::new())
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
