//! Resource - Representing resources and their state

use std::collections::BTreeMap;

use serde_json::json;

/// Attribute name used by [`Value::ResourceRef`] to address a resource's primary identifier
pub const REF_ATTRIBUTE: &str = "ref";

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "ec2.vpc", "ecs.task_definition")
    pub resource_type: String,
    /// Logical id, unique within a stack (e.g., "AgentVPC")
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another resource's attribute (logical_id, attribute_name).
    /// The attribute [`REF_ATTRIBUTE`] addresses the resource's primary identifier.
    ResourceRef(String, String),
    /// Parameter supplied by the deployment environment (e.g., "AWS::AccountId")
    Pseudo(String),
    /// String concatenation of the parts, resolved at deploy time
    Join(Vec<Value>),
}

impl Value {
    /// Shorthand for a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Reference to the primary identifier of `logical_id`
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Value::ResourceRef(logical_id.into(), REF_ATTRIBUTE.to_string())
    }

    /// Reference to a named attribute of `logical_id` (e.g., "Arn", "DNSName")
    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::ResourceRef(logical_id.into(), attribute.into())
    }

    /// List of strings
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    /// Map built from key/value pairs
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Logical ids of every resource this value references, including nested ones
    pub fn referenced_resources(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Value::ResourceRef(target, _) => refs.push(target),
            Value::List(items) | Value::Join(items) => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Value::Map(map) => {
                for v in map.values() {
                    v.collect_references(refs);
                }
            }
            _ => {}
        }
    }

    /// Encode this value as JSON, passing every map key through `key`.
    ///
    /// References and joins use the CloudFormation intrinsic function forms,
    /// so the same encoding serves both templates and recorded state.
    pub fn to_json_with(&self, key: &dyn Fn(&str) -> String) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Int(n) => json!(n),
            Value::Bool(b) => json!(b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json_with(key)).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (key(k), v.to_json_with(key)))
                    .collect(),
            ),
            Value::ResourceRef(target, attribute) if attribute == REF_ATTRIBUTE => {
                json!({ "Ref": target })
            }
            Value::ResourceRef(target, attribute) => json!({ "Fn::GetAtt": [target, attribute] }),
            Value::Pseudo(name) => json!({ "Ref": name }),
            Value::Join(parts) => {
                let parts: Vec<_> = parts.iter().map(|v| v.to_json_with(key)).collect();
                json!({ "Fn::Join": ["", parts] })
            }
        }
    }

    /// Encode this value as JSON with map keys kept verbatim
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_with(&|k| k.to_string())
    }

    /// Decode a value previously produced by [`Value::to_json`]
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::String(n.to_string())),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Null => Value::String(String::new()),
            serde_json::Value::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(serde_json::Value::String(target)) = obj.get("Ref") {
                        return if target.starts_with("AWS::") {
                            Value::Pseudo(target.clone())
                        } else {
                            Value::reference(target.clone())
                        };
                    }
                    if let Some(serde_json::Value::Array(args)) = obj.get("Fn::GetAtt")
                        && let [serde_json::Value::String(target), serde_json::Value::String(attr)] =
                            args.as_slice()
                    {
                        return Value::attribute(target.clone(), attr.clone());
                    }
                    if let Some(serde_json::Value::Array(args)) = obj.get("Fn::Join")
                        && let [serde_json::Value::String(sep), serde_json::Value::Array(parts)] =
                            args.as_slice()
                        && sep.is_empty()
                    {
                        return Value::Join(parts.iter().map(Value::from_json).collect());
                    }
                }
                Value::Map(
                    obj.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Desired state of one resource, as declared by a construct
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: BTreeMap<String, Value>,
    /// Logical ids this resource must be created after, beyond its references
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    /// Logical id of this resource
    pub fn logical_id(&self) -> &str {
        &self.id.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Every logical id this resource needs to exist first, without duplicates
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for value in self.attributes.values() {
            for target in value.referenced_resources() {
                if !deps.contains(&target) {
                    deps.push(target);
                }
            }
        }
        for target in &self.depends_on {
            if !deps.contains(&target.as_str()) {
                deps.push(target);
            }
        }
        deps
    }
}

/// Recorded state of a resource from a previous deployment
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Physical identifier assigned by the cloud (e.g., vpc-xxx), if recorded
    pub identifier: Option<String>,
    pub attributes: BTreeMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: BTreeMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: BTreeMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_renders_as_ref() {
        assert_eq!(Value::reference("AgentVPC").to_json(), json!({ "Ref": "AgentVPC" }));
    }

    #[test]
    fn attribute_renders_as_get_att() {
        assert_eq!(
            Value::attribute("AgentALB", "DNSName").to_json(),
            json!({ "Fn::GetAtt": ["AgentALB", "DNSName"] })
        );
    }

    #[test]
    fn join_renders_with_empty_separator() {
        let value = Value::Join(vec![
            Value::string("http://"),
            Value::attribute("AgentALB", "DNSName"),
        ]);
        assert_eq!(
            value.to_json(),
            json!({ "Fn::Join": ["", ["http://", { "Fn::GetAtt": ["AgentALB", "DNSName"] }]] })
        );
    }

    #[test]
    fn intrinsics_decode_back_to_references() {
        let value = Value::map([
            ("vpc_id", Value::reference("AgentVPC")),
            ("account", Value::Pseudo("AWS::AccountId".to_string())),
            ("arn", Value::attribute("executionRole", "Arn")),
            ("url", Value::Join(vec![Value::string("http://"), Value::string("x")])),
        ]);
        assert_eq!(Value::from_json(&value.to_json()), value);
    }

    #[test]
    fn to_json_with_converts_keys() {
        let value = Value::map([("cidr_block", Value::string("10.0.0.0/16"))]);
        let json = value.to_json_with(&|k| k.to_uppercase());
        assert_eq!(json, json!({ "CIDR_BLOCK": "10.0.0.0/16" }));
    }

    #[test]
    fn dependencies_include_nested_refs_and_explicit_edges() {
        let resource = Resource::new("ec2.route", "PublicRoute")
            .with_attribute("route_table_id", Value::reference("PublicRouteTable"))
            .with_attribute(
                "nested",
                Value::List(vec![Value::map([("gw", Value::reference("IGW"))])]),
            )
            .with_dependency("VPCGW")
            .with_dependency("VPCGW");

        assert_eq!(resource.dependencies(), vec!["IGW", "PublicRouteTable", "VPCGW"]);
    }
}
