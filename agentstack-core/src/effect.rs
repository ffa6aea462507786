//! Effect - One change the external engine has to carry out

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Declared but not recorded
    Create(Resource),
    /// Recorded with different attributes
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Recorded but no longer declared
    Delete(ResourceId),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Delete(id) => id,
        }
    }

    /// One-character marker used when printing plans
    pub fn symbol(&self) -> &'static str {
        match self {
            Effect::Create(_) => "+",
            Effect::Update { .. } => "~",
            Effect::Delete(_) => "-",
        }
    }
}
