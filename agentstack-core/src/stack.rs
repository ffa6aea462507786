//! Stack - Ordered construction of resources and outputs
//!
//! A stack is built in a single pass: every resource is declared once, and
//! may only reference resources declared before it. References that do not
//! resolve are rejected at the point of declaration, so a stack that was
//! built successfully never contains a dangling edge or a cycle.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::graph::DependencyGraph;
use crate::resource::{Resource, ResourceId, Value};
use crate::schema::{ResourceSchema, TypeError};

/// Errors raised while constructing or validating a stack
#[derive(Debug, Clone, Error)]
pub enum StackError {
    #[error("Resource '{0}' is already declared")]
    DuplicateResource(String),

    #[error("{from} references '{target}', which is not declared before it")]
    DanglingReference { from: String, target: String },

    #[error("Output '{0}' is already declared")]
    DuplicateOutput(String),

    #[error("No schema for resource type '{0}'")]
    UnknownResourceType(String),

    #[error("{resource}: {error}")]
    Schema { resource: ResourceId, error: TypeError },
}

/// Named value exported by the stack
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
}

/// A declarative collection of resources and outputs
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    description: Option<String>,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    outputs: Vec<Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            resources: Vec::new(),
            index: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declare a resource.
    ///
    /// Every reference and explicit dependency must name a resource already
    /// declared in this stack.
    pub fn add(&mut self, resource: Resource) -> Result<(), StackError> {
        let logical_id = resource.logical_id().to_string();
        if self.index.contains_key(&logical_id) {
            return Err(StackError::DuplicateResource(logical_id));
        }
        for target in resource.dependencies() {
            if !self.index.contains_key(target) {
                return Err(StackError::DanglingReference {
                    from: resource.id.to_string(),
                    target: target.to_string(),
                });
            }
        }

        log::debug!("declared {}", resource.id);
        self.index.insert(logical_id, self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Declare an output. References inside `value` must resolve.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Value,
        description: Option<&str>,
    ) -> Result<(), StackError> {
        let name = name.into();
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(StackError::DuplicateOutput(name));
        }
        for target in value.referenced_resources() {
            if !self.index.contains_key(target) {
                return Err(StackError::DanglingReference {
                    from: format!("output {}", name),
                    target: target.to_string(),
                });
            }
        }

        self.outputs.push(Output {
            name,
            value,
            description: description.map(|d| d.to_string()),
        });
        Ok(())
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.index.get(logical_id).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.index.contains_key(logical_id)
    }

    /// All resources of one type, in declaration order
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.id.resource_type == resource_type)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_resources(&self.resources)
    }

    /// Check every resource against the schema for its type.
    ///
    /// All errors are collected; a resource type without a schema is an error.
    pub fn validate(&self, schemas: &HashMap<String, ResourceSchema>) -> Result<(), Vec<StackError>> {
        let mut errors = Vec::new();

        for resource in &self.resources {
            let Some(schema) = schemas.get(&resource.id.resource_type) else {
                errors.push(StackError::UnknownResourceType(
                    resource.id.resource_type.clone(),
                ));
                continue;
            };
            if let Err(type_errors) = schema.validate(&resource.attributes) {
                errors.extend(type_errors.into_iter().map(|error| StackError::Schema {
                    resource: resource.id.clone(),
                    error,
                }));
            }
        }

        if errors.is_empty() {
            log::info!("validated {} resources in stack {}", self.resources.len(), self.name);
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve a value against attributes known from a previous deployment.
    ///
    /// `known` maps logical ids to their recorded attributes; the primary
    /// identifier is looked up under [`REF_ATTRIBUTE`]. Returns `None` while
    /// any referenced attribute is still unknown.
    pub fn resolve(
        &self,
        value: &Value,
        known: &HashMap<String, BTreeMap<String, Value>>,
    ) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::ResourceRef(target, attribute) => {
                let attrs = known.get(target)?;
                attrs.get(attribute).and_then(|v| self.resolve(v, known))
            }
            Value::Join(parts) => parts.iter().map(|p| self.resolve(p, known)).collect(),
            Value::Pseudo(_) | Value::List(_) | Value::Map(_) => None,
        }
    }
}
