//! Change-set between a declared stack and its recorded state
//!
//! Effects keep the order the differ emitted them in: creates and updates in
//! declaration order, then deletes in reverse recorded order.

use std::fmt;

use crate::effect::Effect;
use crate::resource::ResourceId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// The effect touching `id`, if any
    pub fn effect_for(&self, id: &ResourceId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.resource_id() == id)
    }

    pub fn summary(&self) -> PlanSummary {
        self.effects
            .iter()
            .fold(PlanSummary::default(), |mut summary, effect| {
                match effect {
                    Effect::Create(_) => summary.create += 1,
                    Effect::Update { .. } => summary.update += 1,
                    Effect::Delete(_) => summary.delete += 1,
                }
                summary
            })
    }
}

impl FromIterator<Effect> for Plan {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Effect;
    type IntoIter = std::slice::Iter<'a, Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.iter()
    }
}

/// Effect counts by kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.create + self.update + self.delete
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}
