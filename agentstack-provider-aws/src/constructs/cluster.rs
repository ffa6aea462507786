//! ECS cluster

use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::Stack;

use super::ConstructError;
use super::network::Vpc;
use crate::schemas::types::validate_ecs_name;

#[derive(Debug, Clone)]
pub struct ClusterProps {
    pub cluster_name: String,
    pub container_insights: bool,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    id: String,
    cluster_name: String,
    vpc: Vpc,
}

impl Cluster {
    pub fn new(stack: &mut Stack, id: &str, vpc: &Vpc, props: ClusterProps) -> Result<Self, ConstructError> {
        validate_ecs_name(&props.cluster_name).map_err(|e| ConstructError::invalid(id, e))?;

        let insights = if props.container_insights { "enabled" } else { "disabled" };
        stack.add(
            Resource::new("ecs.cluster", id)
                .with_attribute("cluster_name", props.cluster_name.as_str())
                .with_attribute(
                    "cluster_settings",
                    Value::List(vec![Value::map([
                        ("name", Value::string("containerInsights")),
                        ("value", Value::string(insights)),
                    ])]),
                ),
        )?;

        Ok(Self {
            id: id.to_string(),
            cluster_name: props.cluster_name,
            vpc: vpc.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Network services in this cluster are placed in
    pub fn vpc(&self) -> &Vpc {
        &self.vpc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::network::VpcProps;

    fn vpc(stack: &mut Stack) -> Vpc {
        Vpc::new(
            stack,
            "AgentVPC",
            VpcProps::new(vec!["us-east-1a".to_string(), "us-east-1b".to_string()]),
        )
        .unwrap()
    }

    #[test]
    fn container_insights_setting() {
        let mut stack = Stack::new("test");
        let vpc = vpc(&mut stack);
        let cluster = Cluster::new(
            &mut stack,
            "AgentCluster",
            &vpc,
            ClusterProps {
                cluster_name: "fantasy-football-agent-cluster".to_string(),
                container_insights: true,
            },
        )
        .unwrap();

        let settings = stack.get("AgentCluster").unwrap().get("cluster_settings").unwrap();
        let setting = settings.as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(setting["value"], Value::string("enabled"));
        assert_eq!(cluster.vpc().id(), "AgentVPC");
    }

    #[test]
    fn invalid_name_is_rejected() {
        let mut stack = Stack::new("test");
        let vpc = vpc(&mut stack);
        let before = stack.len();
        let result = Cluster::new(
            &mut stack,
            "AgentCluster",
            &vpc,
            ClusterProps {
                cluster_name: "bad name".to_string(),
                container_insights: false,
            },
        );
        assert!(matches!(result, Err(ConstructError::Invalid { .. })));
        assert_eq!(stack.len(), before);
    }
}
