//! Typed building blocks that declare groups of AWS resources into a stack
//!
//! Each construct validates its own properties, then declares its resources
//! in dependency order, so references always point at something declared
//! earlier.

pub mod cluster;
pub mod iam;
pub mod load_balancer;
pub mod network;
pub mod security_group;
pub mod service;
pub mod task_definition;

use agentstack_core::stack::StackError;
use thiserror::Error;

use crate::assets::AssetError;

#[derive(Debug, Error)]
pub enum ConstructError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("{construct}: {message}")]
    Invalid { construct: String, message: String },

    #[error("Container '{container}' is not declared in task definition '{task_definition}'")]
    UnknownContainer {
        task_definition: String,
        container: String,
    },

    #[error("Container '{0}' is already declared")]
    DuplicateContainer(String),

    #[error("Volume '{volume}' used by container '{container}' is not declared")]
    UnknownVolume { container: String, volume: String },

    #[error("Container '{container}' waits for '{dependency}' to be HEALTHY, but '{dependency}' has no health check")]
    MissingHealthCheck {
        container: String,
        dependency: String,
    },
}

impl ConstructError {
    pub(crate) fn invalid(construct: &str, message: impl Into<String>) -> Self {
        ConstructError::Invalid {
            construct: construct.to_string(),
            message: message.into(),
        }
    }
}

/// A `Name` tag entry
pub(crate) fn name_tag(value: impl Into<String>) -> agentstack_core::resource::Value {
    use agentstack_core::resource::Value;
    Value::List(vec![Value::map([
        ("key", Value::string("Name")),
        ("value", Value::string(value)),
    ])])
}
