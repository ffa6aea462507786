//! IAM roles and policy statements

use std::fmt;

use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::Stack;

use super::ConstructError;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEffect::Allow => write!(f, "Allow"),
            PolicyEffect::Deny => write!(f, "Deny"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: PolicyEffect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: PolicyEffect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Actions look like `service:Operation`, with `*` allowed in the operation
    fn validate(&self) -> Result<(), String> {
        if self.actions.is_empty() {
            return Err("policy statement has no actions".to_string());
        }
        if self.resources.is_empty() {
            return Err("policy statement has no resources".to_string());
        }
        for action in &self.actions {
            match action.split_once(':') {
                Some((service, operation)) if !service.is_empty() && !operation.is_empty() => {}
                _ => return Err(format!("invalid action '{}'", action)),
            }
        }
        Ok(())
    }

    fn to_value(&self) -> Value {
        Value::map([
            ("effect", Value::string(self.effect.to_string())),
            ("action", Value::strings(self.actions.iter().cloned())),
            ("resource", Value::strings(self.resources.iter().cloned())),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct RoleProps {
    /// Service principal allowed to assume the role (e.g., "ecs-tasks.amazonaws.com")
    pub assumed_by: String,
    pub description: Option<String>,
}

/// A role built up with policies, then declared once
#[derive(Debug, Clone)]
pub struct Role {
    id: String,
    props: RoleProps,
    managed_policies: Vec<String>,
    statements: Vec<PolicyStatement>,
}

impl Role {
    pub fn new(id: &str, props: RoleProps) -> Self {
        Self {
            id: id.to_string(),
            props,
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Attach an AWS managed policy by name (e.g., "service-role/AmazonECSTaskExecutionRolePolicy")
    pub fn add_managed_policy(&mut self, name: &str) {
        if !self.managed_policies.iter().any(|p| p == name) {
            self.managed_policies.push(name.to_string());
        }
    }

    pub fn add_to_policy(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn managed_policies(&self) -> &[String] {
        &self.managed_policies
    }

    /// Every action granted by an Allow statement
    pub fn allowed_actions(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.effect == PolicyEffect::Allow)
            .flat_map(|s| s.actions.iter().map(String::as_str))
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arn(&self) -> Value {
        Value::attribute(&self.id, "Arn")
    }

    pub fn declare(&self, stack: &mut Stack) -> Result<(), ConstructError> {
        for statement in &self.statements {
            statement
                .validate()
                .map_err(|e| ConstructError::invalid(&self.id, e))?;
        }

        let trust = Value::map([
            ("version", Value::string(POLICY_VERSION)),
            (
                "statement",
                Value::List(vec![Value::map([
                    ("effect", Value::string("Allow")),
                    ("principal", Value::map([("service", Value::string(&self.props.assumed_by))])),
                    ("action", Value::strings(["sts:AssumeRole"])),
                ])]),
            ),
        ]);

        let mut role = Resource::new("iam.role", &self.id).with_attribute("assume_role_policy_document", trust);
        if let Some(description) = &self.props.description {
            role = role.with_attribute("description", description.as_str());
        }
        if !self.managed_policies.is_empty() {
            let arns = self
                .managed_policies
                .iter()
                .map(|name| {
                    Value::Join(vec![
                        Value::string("arn:"),
                        Value::Pseudo("AWS::Partition".to_string()),
                        Value::string(format!(":iam::aws:policy/{}", name)),
                    ])
                })
                .collect();
            role = role.with_attribute("managed_policy_arns", Value::List(arns));
        }
        if !self.statements.is_empty() {
            let document = Value::map([
                ("version", Value::string(POLICY_VERSION)),
                (
                    "statement",
                    Value::List(self.statements.iter().map(PolicyStatement::to_value).collect()),
                ),
            ]);
            role = role.with_attribute(
                "policies",
                Value::List(vec![Value::map([
                    ("policy_name", Value::string(format!("{}DefaultPolicy", self.id))),
                    ("policy_document", document),
                ])]),
            );
        }

        stack.add(role)?;
        log::debug!(
            "declared role {} with {} statements",
            self.id,
            self.statements.len()
        );
        Ok(())
    }
}
