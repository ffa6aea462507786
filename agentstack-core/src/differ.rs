//! Differ - Compare desired state with recorded state to generate a Plan
//!
//! Compares the resources declared by the stack with the state recorded after
//! the last deployment, and generates the list of Effects (Plan) the
//! external engine has to carry out.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state.
///
/// An attribute recorded but no longer declared counts as changed.
fn find_changed_attributes(
    desired: &BTreeMap<String, Value>,
    current: &BTreeMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    for key in current.keys() {
        if !key.starts_with('_') && !desired.contains_key(key) {
            changed.push(key.clone());
        }
    }

    changed
}

/// Compute Diff for every declared resource and generate a Plan.
///
/// `recorded` is the recorded state in the order it was recorded. Resources
/// recorded but no longer declared are deleted last, in reverse order.
pub fn create_plan(desired: &[Resource], recorded: &[State]) -> Plan {
    let current: HashMap<&ResourceId, &State> = recorded.iter().map(|s| (&s.id, s)).collect();
    let declared: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();

    let changes = desired.iter().filter_map(|resource| {
        let state = current
            .get(&resource.id)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| State::not_found(resource.id.clone()));
        match diff(resource, &state) {
            Diff::Create(r) => Some(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => Some(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(id) => {
                log::debug!("{} is up to date", id);
                None
            }
        }
    });
    let deletes = recorded
        .iter()
        .rev()
        .filter(|s| s.exists && !declared.contains(&s.id))
        .map(|s| Effect::Delete(s.id.clone()));

    changes.chain(deletes).collect()
}
