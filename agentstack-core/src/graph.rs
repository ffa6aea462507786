//! Graph - Dependency analysis between declared resources

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, Value};

/// Dependency between resources
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    /// Target resource logical id
    pub target: String,
    /// Referenced attribute (e.g., "ref", "Arn"); empty for explicit ordering edges
    pub attribute: String,
    /// Where this reference is used (e.g., "vpc_id", or "depends_on")
    pub used_in: String,
}

/// Dependency graph for the resources of a stack
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Logical ids in declaration order
    pub nodes: Vec<String>,
    /// Resource logical id -> list of dependencies
    pub edges: HashMap<String, Vec<Dependency>>,
    /// Reverse edges: target -> list of resources that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from resources, following every reference and explicit dependency
    pub fn from_resources(resources: &[Resource]) -> Self {
        let mut graph = Self::new();
        for resource in resources {
            let from = resource.logical_id().to_string();
            graph.add_node(from.clone());
            for (key, value) in &resource.attributes {
                let mut refs = Vec::new();
                collect_refs(value, &mut refs);
                for (target, attribute) in refs {
                    graph.add_edge(
                        from.clone(),
                        Dependency {
                            target,
                            attribute,
                            used_in: key.clone(),
                        },
                    );
                }
            }
            for target in &resource.depends_on {
                graph.add_edge(
                    from.clone(),
                    Dependency {
                        target: target.clone(),
                        attribute: String::new(),
                        used_in: "depends_on".to_string(),
                    },
                );
            }
        }
        graph
    }

    /// Register a node without edges
    pub fn add_node(&mut self, name: String) {
        if !self.nodes.contains(&name) {
            self.nodes.push(name);
        }
    }

    /// Add a dependency edge
    pub fn add_edge(&mut self, from: String, dependency: Dependency) {
        let target = dependency.target.clone();
        self.add_node(from.clone());
        let reverse = self.reverse_edges.entry(target).or_default();
        if !reverse.contains(&from) {
            reverse.push(from.clone());
        }
        self.edges.entry(from).or_default().push(dependency);
    }

    /// Resources that depend on nothing, in declaration order
    pub fn root_resources(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| self.dependencies_of(n).is_empty())
            .cloned()
            .collect()
    }

    /// Resources nothing depends on, in declaration order
    pub fn leaf_resources(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| self.dependents_of(n).is_empty())
            .cloned()
            .collect()
    }

    /// Get direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &str) -> &[Dependency] {
        self.edges.get(resource).map_or(&[], |v| v.as_slice())
    }

    /// Get resources that depend on this resource
    pub fn dependents_of(&self, resource: &str) -> &[String] {
        self.reverse_edges
            .get(resource)
            .map_or(&[], |v| v.as_slice())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Order nodes so every resource comes after its dependencies.
    ///
    /// Ties keep declaration order. Returns the first node found on a cycle
    /// as the error.
    pub fn topological_order(&self) -> Result<Vec<String>, String> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut order = Vec::new();

        for node in &self.nodes {
            self.visit(node, &mut visited, &mut rec_stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), String> {
        if rec_stack.contains(node) {
            return Err(node.to_string());
        }
        if visited.contains(node) {
            return Ok(());
        }

        rec_stack.insert(node.to_string());
        for dep in self.dependencies_of(node) {
            self.visit(&dep.target, visited, rec_stack, order)?;
        }
        rec_stack.remove(node);

        visited.insert(node.to_string());
        order.push(node.to_string());
        Ok(())
    }
}

fn collect_refs(value: &Value, refs: &mut Vec<(String, String)>) {
    match value {
        Value::ResourceRef(target, attribute) => refs.push((target.clone(), attribute.clone())),
        Value::List(items) | Value::Join(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_refs(v, refs);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(target: &str) -> Dependency {
        Dependency {
            target: target.to_string(),
            attribute: "ref".to_string(),
            used_in: "vpc_id".to_string(),
        }
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a".to_string(), dep("b"));
        graph.add_edge("b".to_string(), dep("c"));
        graph.add_edge("c".to_string(), dep("a"));

        assert!(graph.has_cycle());
    }

    #[test]
    fn test_no_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("subnet".to_string(), dep("vpc"));
        graph.add_edge("sg".to_string(), dep("vpc"));

        assert!(!graph.has_cycle());
        assert_eq!(graph.dependents_of("vpc"), &["subnet", "sg"]);
    }

    #[test]
    fn graph_from_resources_follows_refs_and_depends_on() {
        let resources = vec![
            Resource::new("ec2.vpc", "AgentVPC"),
            Resource::new("ec2.internet_gateway", "IGW"),
            Resource::new("ec2.subnet", "Public1")
                .with_attribute("vpc_id", Value::reference("AgentVPC")),
            Resource::new("ec2.route", "Public1Route")
                .with_attribute("gateway_id", Value::reference("IGW"))
                .with_dependency("Public1"),
        ];

        let graph = DependencyGraph::from_resources(&resources);

        assert_eq!(graph.root_resources(), vec!["AgentVPC", "IGW"]);
        assert_eq!(graph.leaf_resources(), vec!["Public1Route"]);
        let deps = graph.dependencies_of("Public1Route");
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].used_in, "depends_on");
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let mut graph = DependencyGraph::new();
        graph.add_node("listener".to_string());
        graph.add_edge("listener".to_string(), dep("alb"));
        graph.add_edge("alb".to_string(), dep("sg"));

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec!["sg", "alb", "listener"]);
    }
}
