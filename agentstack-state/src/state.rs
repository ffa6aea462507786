//! State file structures for recording what was deployed

use std::collections::BTreeMap;

use agentstack_core::resource::{Resource, ResourceId, State, Value};
use serde::{Deserialize, Serialize};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of agentstack that last modified this state
    pub tool_version: String,
    /// Recorded resources, in declaration order
    pub resources: Vec<ResourceState>,
}

/// What [`StateFile::record`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub recorded: usize,
    pub removed: Vec<String>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    /// Create a new state file with a specific lineage (for initialization)
    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update the tool version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.tool_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a resource by type and name
    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Find a resource mutably by type and name
    pub fn find_resource_mut(&mut self, resource_type: &str, name: &str) -> Option<&mut ResourceState> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Find a resource by logical id, whatever its type
    pub fn find_by_name(&self, name: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.resource_type, &resource.name) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Make the recorded resources match the declared ones.
    ///
    /// Declared resources are upserted; attributes recorded under a leading
    /// `_` (deploy-time values) and the identifier survive the update.
    /// Undeclared resources are dropped unless protected.
    pub fn record(&mut self, resources: &[Resource], provider: &str) -> RecordSummary {
        let mut summary = RecordSummary::default();

        for resource in resources {
            let mut recorded = ResourceState::from_resource(resource, provider);
            if let Some(existing) = self.find_resource(&recorded.resource_type, &recorded.name) {
                recorded.identifier = existing.identifier.clone();
                recorded.protected = existing.protected;
                for (key, value) in &existing.attributes {
                    if key.starts_with('_') {
                        recorded.attributes.insert(key.clone(), value.clone());
                    }
                }
            }
            self.upsert_resource(recorded);
            summary.recorded += 1;
        }

        let declared: Vec<(&str, &str)> = resources
            .iter()
            .map(|r| (r.id.resource_type.as_str(), r.logical_id()))
            .collect();
        self.resources.retain(|r| {
            let keep = r.protected || declared.contains(&(r.resource_type.as_str(), r.name.as_str()));
            if !keep {
                summary.removed.push(r.name.clone());
            }
            keep
        });

        summary
    }

    /// Recorded resources as core states, in recorded order
    pub fn states(&self) -> Vec<State> {
        self.resources.iter().map(ResourceState::to_state).collect()
    }

    /// Recorded attributes by logical id, for resolving references.
    ///
    /// Deploy-time attributes are exposed without their `_` prefix, and the
    /// identifier under `ref`.
    pub fn known_attributes(&self) -> std::collections::HashMap<String, BTreeMap<String, Value>> {
        self.resources
            .iter()
            .map(|r| {
                let mut attrs: BTreeMap<String, Value> = r
                    .attributes
                    .iter()
                    .filter_map(|(k, v)| k.strip_prefix('_').map(|k| (k.to_string(), Value::from_json(v))))
                    .collect();
                if let Some(identifier) = &r.identifier {
                    attrs.insert(
                        agentstack_core::resource::REF_ATTRIBUTE.to_string(),
                        Value::string(identifier),
                    );
                }
                (r.name.clone(), attrs)
            })
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single recorded resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "ec2.vpc", "ecs.service")
    pub resource_type: String,
    /// Logical id in the stack
    pub name: String,
    /// Provider name (e.g., "aws")
    pub provider: String,
    /// Physical identifier, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Whether this resource is kept even when no longer declared
    #[serde(default)]
    pub protected: bool,
}

impl ResourceState {
    /// Create a new resource state
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
            protected: false,
        }
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Mark this resource as protected
    pub fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Record a declared resource
    pub fn from_resource(resource: &Resource, provider: &str) -> Self {
        Self {
            resource_type: resource.id.resource_type.clone(),
            name: resource.logical_id().to_string(),
            provider: provider.to_string(),
            identifier: None,
            attributes: resource
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
            depends_on: resource.depends_on.clone(),
            protected: false,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    /// The resource as it was declared when recorded
    pub fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(&self.resource_type, &self.name);
        for (key, value) in &self.attributes {
            if !key.starts_with('_') {
                resource.attributes.insert(key.clone(), Value::from_json(value));
            }
        }
        resource.depends_on = self.depends_on.clone();
        resource
    }

    pub fn to_state(&self) -> State {
        let attributes = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect();
        let state = State::existing(self.resource_id(), attributes);
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vpc() -> Resource {
        Resource::new("ec2.vpc", "AgentVPC").with_attribute("cidr_block", "10.0.0.0/16")
    }

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_state_file_upsert_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("ec2.vpc", "AgentVPC", "aws").with_attribute("cidr_block", json!("10.0.0.0/16")));
        state.upsert_resource(ResourceState::new("ec2.vpc", "AgentVPC", "aws").with_attribute("cidr_block", json!("10.1.0.0/16")));

        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].attributes["cidr_block"], json!("10.1.0.0/16"));
    }

    #[test]
    fn test_state_file_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("ec2.vpc", "AgentVPC", "aws"));

        assert!(state.remove_resource("ec2.vpc", "AgentVPC").is_some());
        assert!(state.remove_resource("ec2.vpc", "OtherVPC").is_none());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn resource_round_trips_through_state() {
        let resource = Resource::new("ecs.service", "appService")
            .with_attribute("cluster", Value::reference("AgentCluster"))
            .with_attribute("launch_type", "FARGATE")
            .with_dependency("AgentALBPublicListener");
        let recorded = ResourceState::from_resource(&resource, "aws");

        assert_eq!(recorded.attributes["cluster"], json!({ "Ref": "AgentCluster" }));
        assert_eq!(recorded.to_resource(), resource);
    }

    #[test]
    fn record_drops_undeclared_but_keeps_protected_and_deploy_values() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("ec2.vpc", "AgentVPC", "aws")
                .with_identifier("vpc-123")
                .with_attribute("_VpcId", json!("vpc-123")),
        );
        state.upsert_resource(ResourceState::new("logs.log_group", "Old", "aws"));
        state.upsert_resource(ResourceState::new("logs.log_group", "Keep", "aws").with_protected(true));

        let summary = state.record(&[vpc()], "aws");

        assert_eq!(summary.recorded, 1);
        assert_eq!(summary.removed, vec!["Old".to_string()]);
        let recorded = state.find_by_name("AgentVPC").unwrap();
        assert_eq!(recorded.identifier.as_deref(), Some("vpc-123"));
        assert_eq!(recorded.attributes["_VpcId"], json!("vpc-123"));
        assert_eq!(recorded.attributes["cidr_block"], json!("10.0.0.0/16"));
        assert!(state.find_by_name("Keep").is_some());
    }

    #[test]
    fn known_attributes_expose_deploy_values() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("elbv2.load_balancer", "AgentALB", "aws")
                .with_identifier("arn:aws:elasticloadbalancing:alb")
                .with_attribute("scheme", json!("internet-facing"))
                .with_attribute("_DNSName", json!("agent.elb.amazonaws.com")),
        );

        let known = state.known_attributes();
        let alb = &known["AgentALB"];
        assert_eq!(alb["DNSName"], Value::string("agent.elb.amazonaws.com"));
        assert_eq!(alb["ref"], Value::string("arn:aws:elasticloadbalancing:alb"));
        assert!(!alb.contains_key("scheme"));
    }

    #[test]
    fn test_state_file_serialization() {
        let mut state = StateFile::new();
        state.record(&[vpc()], "aws");

        let json = serde_json::to_string_pretty(&state).unwrap();
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.lineage, state.lineage);
        assert_eq!(deserialized.resources, state.resources);
        assert!(!json.contains("identifier"));
    }
}
