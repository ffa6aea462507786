//! Agentstack Core
//!
//! Core library for declaring a deployment stack as a graph of resources,
//! checking it against provider schemas and computing change-sets

pub mod differ;
pub mod effect;
pub mod env_file;
pub mod graph;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod stack;
pub mod template;
