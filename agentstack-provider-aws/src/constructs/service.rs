//! Fargate service

use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::Stack;

use super::ConstructError;
use super::cluster::Cluster;
use super::load_balancer::ApplicationListener;
use super::network::SubnetType;
use super::security_group::SecurityGroup;
use super::task_definition::FargateTaskDefinition;

pub struct FargateServiceProps<'a> {
    pub service_name: Option<String>,
    pub cluster: &'a Cluster,
    pub task_definition: &'a FargateTaskDefinition,
    pub desired_count: u32,
    pub security_groups: Vec<&'a SecurityGroup>,
    pub vpc_subnets: SubnetType,
    pub assign_public_ip: bool,
    /// Listener whose target group receives the task's containers
    pub listener: Option<&'a ApplicationListener>,
    pub health_check_grace_period_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct FargateService {
    id: String,
    desired_count: u32,
    load_balancer_targets: Vec<(String, String, u16)>,
}

impl FargateService {
    pub fn new(stack: &mut Stack, id: &str, props: FargateServiceProps<'_>) -> Result<Self, ConstructError> {
        if props.security_groups.is_empty() {
            return Err(ConstructError::invalid(id, "service needs at least one security group"));
        }
        let subnets = props.cluster.vpc().select_subnets(props.vpc_subnets);
        if subnets.is_empty() {
            return Err(ConstructError::invalid(id, format!("VPC has no {:?} subnets", props.vpc_subnets)));
        }
        if props.assign_public_ip && props.vpc_subnets != SubnetType::Public {
            return Err(ConstructError::invalid(id, "a public IP needs public subnets"));
        }

        let mut targets = Vec::new();
        if let Some(listener) = props.listener {
            let target_group = listener.target_group().ok_or_else(|| {
                ConstructError::invalid(id, format!("listener '{}' has no target group", listener.id()))
            })?;
            for target in listener.targets() {
                props
                    .task_definition
                    .load_balancer_target(&target.container_name, target.container_port)?;
                targets.push((
                    target_group.to_string(),
                    target.container_name.clone(),
                    target.container_port,
                ));
            }
        }

        let network = Value::map([(
            "awsvpc_configuration",
            Value::map([
                (
                    "assign_public_ip",
                    Value::string(if props.assign_public_ip { "ENABLED" } else { "DISABLED" }),
                ),
                (
                    "security_groups",
                    Value::List(props.security_groups.iter().map(|sg| sg.group_id()).collect()),
                ),
                ("subnets", props.cluster.vpc().subnet_refs(props.vpc_subnets)),
            ]),
        )]);

        let mut resource = Resource::new("ecs.service", id)
            .with_attribute("cluster", Value::reference(props.cluster.id()))
            .with_attribute("task_definition", Value::reference(props.task_definition.id()))
            .with_attribute("launch_type", "FARGATE")
            .with_attribute("desired_count", i64::from(props.desired_count))
            .with_attribute("network_configuration", network)
            .with_attribute(
                "deployment_configuration",
                Value::map([
                    ("maximum_percent", Value::Int(200)),
                    ("minimum_healthy_percent", Value::Int(50)),
                ]),
            );
        if let Some(name) = &props.service_name {
            resource = resource.with_attribute("service_name", name.as_str());
        }
        if let Some(listener) = props.listener {
            let load_balancers = targets
                .iter()
                .map(|(target_group, container, port)| {
                    Value::map([
                        ("container_name", Value::string(container)),
                        ("container_port", Value::Int(i64::from(*port))),
                        ("target_group_arn", Value::reference(target_group)),
                    ])
                })
                .collect();
            resource = resource
                .with_attribute("load_balancers", Value::List(load_balancers))
                .with_attribute(
                    "health_check_grace_period_seconds",
                    i64::from(props.health_check_grace_period_seconds),
                )
                // Registering targets needs the target group attached to a listener
                .with_dependency(listener.id());
        }

        stack.add(resource)?;
        log::info!(
            "declared service {} running {} task(s) of {}",
            id,
            props.desired_count,
            props.task_definition.id()
        );
        Ok(Self {
            id: id.to_string(),
            desired_count: props.desired_count,
            load_balancer_targets: targets,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn desired_count(&self) -> u32 {
        self.desired_count
    }

    /// (target group, container name, container port) registrations
    pub fn load_balancer_targets(&self) -> &[(String, String, u16)] {
        &self.load_balancer_targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::cluster::ClusterProps;
    use crate::constructs::iam::{Role, RoleProps};
    use crate::constructs::load_balancer::{
        AddTargetsProps, ApplicationLoadBalancer, ApplicationLoadBalancerProps, ApplicationProtocol,
        TargetHealthCheck,
    };
    use crate::constructs::network::{Vpc, VpcProps};
    use crate::constructs::security_group::SecurityGroupProps;
    use crate::constructs::task_definition::{
        ContainerDefinitionOptions, ContainerImage, FargateTaskDefinitionProps, PortMapping,
    };

    struct Fixture {
        stack: Stack,
        cluster: Cluster,
        task: FargateTaskDefinition,
        sg: SecurityGroup,
        alb: ApplicationLoadBalancer,
    }

    fn fixture() -> Fixture {
        let mut stack = Stack::new("test");
        let vpc = Vpc::new(
            &mut stack,
            "AgentVPC",
            VpcProps::new(vec!["us-east-1a".to_string(), "us-east-1b".to_string()]),
        )
        .unwrap();
        let sg = SecurityGroup::new(
            &mut stack,
            "serviceSecurityGroup",
            &vpc,
            SecurityGroupProps {
                description: "task".to_string(),
                allow_all_outbound: true,
            },
        )
        .unwrap();
        let cluster = Cluster::new(
            &mut stack,
            "AgentCluster",
            &vpc,
            ClusterProps {
                cluster_name: "agents".to_string(),
                container_insights: true,
            },
        )
        .unwrap();
        let role = Role::new(
            "executionRole",
            RoleProps {
                assumed_by: "ecs-tasks.amazonaws.com".to_string(),
                description: None,
            },
        );
        role.declare(&mut stack).unwrap();
        let mut task = FargateTaskDefinition::new(
            "TaskDef",
            FargateTaskDefinitionProps {
                family: None,
                cpu: 256,
                memory_mib: 512,
                execution_role: &role,
                task_role: &role,
            },
        )
        .unwrap();
        task.add_container(
            "web",
            ContainerDefinitionOptions::new(ContainerImage::from_registry("nginx")).port_mapping(PortMapping::tcp(80)),
        )
        .unwrap();
        task.declare(&mut stack).unwrap();
        let alb = ApplicationLoadBalancer::new(
            &mut stack,
            "AgentALB",
            &vpc,
            ApplicationLoadBalancerProps {
                load_balancer_name: None,
                internet_facing: true,
                security_group: &sg,
            },
        )
        .unwrap();

        Fixture {
            stack,
            cluster,
            task,
            sg,
            alb,
        }
    }

    fn listener(f: &mut Fixture, port: u16) -> ApplicationListener {
        let mut listener = f.alb.add_listener("PublicListener", 80).unwrap();
        listener
            .add_targets(
                &mut f.stack,
                "ECS",
                AddTargetsProps {
                    port,
                    protocol: ApplicationProtocol::Http,
                    targets: vec![f.task.load_balancer_target("web", 80).unwrap()],
                    health_check: TargetHealthCheck::default(),
                },
            )
            .unwrap();
        listener
    }

    fn props<'a>(f: &'a Fixture, listener: Option<&'a ApplicationListener>) -> FargateServiceProps<'a> {
        FargateServiceProps {
            service_name: None,
            cluster: &f.cluster,
            task_definition: &f.task,
            desired_count: 1,
            security_groups: vec![&f.sg],
            vpc_subnets: SubnetType::PrivateWithEgress,
            assign_public_ip: false,
            listener,
            health_check_grace_period_seconds: 60,
        }
    }

    #[test]
    fn service_in_private_subnets_without_public_ip() {
        let mut f = fixture();
        let listener = listener(&mut f, 80);
        let props = props(&f, Some(&listener));
        let mut stack = f.stack.clone();
        let service = FargateService::new(&mut stack, "appService", props).unwrap();

        let declared = stack.get("appService").unwrap();
        let network = declared.get("network_configuration").unwrap().to_json();
        assert_eq!(network["awsvpc_configuration"]["assign_public_ip"], "DISABLED");
        assert_eq!(
            network["awsvpc_configuration"]["subnets"][0],
            serde_json::json!({ "Ref": "AgentVPCPrivateSubnet1" })
        );
        assert_eq!(declared.depends_on, vec!["AgentALBPublicListener".to_string()]);
        assert_eq!(
            service.load_balancer_targets(),
            &[("AgentALBPublicListenerECSGroup".to_string(), "web".to_string(), 80)]
        );
    }

    #[test]
    fn public_ip_in_private_subnets_is_rejected() {
        let f = fixture();
        let mut props = props(&f, None);
        props.assign_public_ip = true;
        let mut stack = f.stack.clone();

        assert!(FargateService::new(&mut stack, "appService", props).is_err());
    }

    #[test]
    fn listener_without_targets_is_rejected() {
        let mut f = fixture();
        let listener = f.alb.add_listener("Other", 8080).unwrap();
        let props = props(&f, Some(&listener));
        let mut stack = f.stack.clone();

        assert!(matches!(
            FargateService::new(&mut stack, "appService", props),
            Err(ConstructError::Invalid { .. })
        ));
    }
}
