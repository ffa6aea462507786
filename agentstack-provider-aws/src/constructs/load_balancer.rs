//! Application load balancer, listeners and target groups

use std::fmt;

use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::Stack;

use super::ConstructError;
use super::network::{SubnetType, Vpc};
use super::security_group::SecurityGroup;
use super::task_definition::LoadBalancerTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationProtocol {
    Http,
    Https,
}

impl fmt::Display for ApplicationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationProtocol::Http => write!(f, "HTTP"),
            ApplicationProtocol::Https => write!(f, "HTTPS"),
        }
    }
}

/// Target group health check
#[derive(Debug, Clone, PartialEq)]
pub struct TargetHealthCheck {
    pub path: String,
    /// A port number, or "traffic-port"
    pub port: String,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub healthy_threshold: Option<u32>,
    pub unhealthy_threshold: u32,
}

impl Default for TargetHealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            port: "traffic-port".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold: None,
            unhealthy_threshold: 2,
        }
    }
}

impl TargetHealthCheck {
    fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("health check path '{}' must start with '/'", self.path));
        }
        if !(5..=300).contains(&self.interval_seconds) {
            return Err(format!(
                "health check interval must be between 5 and 300, got {}",
                self.interval_seconds
            ));
        }
        if !(2..=120).contains(&self.timeout_seconds) {
            return Err(format!(
                "health check timeout must be between 2 and 120, got {}",
                self.timeout_seconds
            ));
        }
        if self.timeout_seconds >= self.interval_seconds {
            return Err(format!(
                "health check timeout ({}s) must be shorter than the interval ({}s)",
                self.timeout_seconds, self.interval_seconds
            ));
        }
        for threshold in self.healthy_threshold.iter().chain([&self.unhealthy_threshold]) {
            if !(2..=10).contains(threshold) {
                return Err(format!("health check threshold must be between 2 and 10, got {}", threshold));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancerProps<'a> {
    pub load_balancer_name: Option<String>,
    pub internet_facing: bool,
    pub security_group: &'a SecurityGroup,
}

#[derive(Debug, Clone)]
pub struct ApplicationLoadBalancer {
    id: String,
    vpc: Vpc,
    listeners: Vec<String>,
}

impl ApplicationLoadBalancer {
    /// Declare the load balancer in the VPC's public subnets
    pub fn new(
        stack: &mut Stack,
        id: &str,
        vpc: &Vpc,
        props: ApplicationLoadBalancerProps<'_>,
    ) -> Result<Self, ConstructError> {
        let public = vpc.select_subnets(SubnetType::Public);
        if public.is_empty() {
            return Err(ConstructError::invalid(id, "VPC has no public subnets"));
        }

        let scheme = if props.internet_facing { "internet-facing" } else { "internal" };
        let mut resource = Resource::new("elbv2.load_balancer", id)
            .with_attribute("scheme", scheme)
            .with_attribute("load_balancer_type", "application")
            .with_attribute("security_groups", Value::List(vec![props.security_group.group_id()]))
            .with_attribute("subnets", vpc.subnet_refs(SubnetType::Public));
        if let Some(name) = &props.load_balancer_name {
            resource = resource.with_attribute("name", name.as_str());
        }
        // Internet-facing balancers need a route out before they can be created
        if props.internet_facing {
            for subnet in public {
                resource = resource.with_dependency(&subnet.default_route);
            }
        }

        stack.add(resource)?;
        Ok(Self {
            id: id.to_string(),
            vpc: vpc.clone(),
            listeners: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dns_name(&self) -> Value {
        Value::attribute(&self.id, "DNSName")
    }

    pub fn arn(&self) -> Value {
        Value::reference(&self.id)
    }

    /// Start a listener; it is declared once its targets are added
    pub fn add_listener(&mut self, id: &str, port: u16) -> Result<ApplicationListener, ConstructError> {
        if port == 0 {
            return Err(ConstructError::invalid(id, "listener port must be positive"));
        }
        let logical_id = format!("{}{}", self.id, id);
        if self.listeners.contains(&logical_id) {
            return Err(ConstructError::invalid(id, "listener is already defined"));
        }
        self.listeners.push(logical_id.clone());
        Ok(ApplicationListener {
            id: logical_id,
            load_balancer: self.id.clone(),
            vpc: self.vpc.clone(),
            port,
            target_group: None,
            targets: Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AddTargetsProps {
    pub port: u16,
    pub protocol: ApplicationProtocol,
    pub targets: Vec<LoadBalancerTarget>,
    pub health_check: TargetHealthCheck,
}

/// A listener forwarding everything to one target group
#[derive(Debug, Clone)]
pub struct ApplicationListener {
    id: String,
    load_balancer: String,
    vpc: Vpc,
    port: u16,
    target_group: Option<String>,
    targets: Vec<LoadBalancerTarget>,
}

impl ApplicationListener {
    /// Declare an IP target group, then this listener forwarding to it
    pub fn add_targets(
        &mut self,
        stack: &mut Stack,
        id: &str,
        props: AddTargetsProps,
    ) -> Result<(), ConstructError> {
        if self.target_group.is_some() {
            return Err(ConstructError::invalid(&self.id, "listener already has a default target group"));
        }
        if props.targets.is_empty() {
            return Err(ConstructError::invalid(id, "no targets"));
        }
        if let Some(target) = props.targets.iter().find(|t| t.container_port != props.port) {
            return Err(ConstructError::invalid(
                id,
                format!(
                    "target {}:{} does not match target group port {}",
                    target.container_name, target.container_port, props.port
                ),
            ));
        }
        props
            .health_check
            .validate()
            .map_err(|e| ConstructError::invalid(id, e))?;

        let target_group_id = format!("{}{}Group", self.id, id);
        let health_check = &props.health_check;
        let mut target_group = Resource::new("elbv2.target_group", &target_group_id)
            .with_attribute("port", i64::from(props.port))
            .with_attribute("protocol", props.protocol.to_string())
            .with_attribute("target_type", "ip")
            .with_attribute("vpc_id", self.vpc.vpc_ref())
            .with_attribute("health_check_enabled", true)
            .with_attribute("health_check_path", health_check.path.as_str())
            .with_attribute("health_check_port", health_check.port.as_str())
            .with_attribute("health_check_interval_seconds", i64::from(health_check.interval_seconds))
            .with_attribute("health_check_timeout_seconds", i64::from(health_check.timeout_seconds))
            .with_attribute("unhealthy_threshold_count", i64::from(health_check.unhealthy_threshold));
        if let Some(healthy) = health_check.healthy_threshold {
            target_group = target_group.with_attribute("healthy_threshold_count", i64::from(healthy));
        }
        stack.add(target_group)?;

        stack.add(
            Resource::new("elbv2.listener", &self.id)
                .with_attribute("load_balancer_arn", Value::reference(&self.load_balancer))
                .with_attribute("port", i64::from(self.port))
                .with_attribute("protocol", "HTTP")
                .with_attribute(
                    "default_actions",
                    Value::List(vec![Value::map([
                        ("type", Value::string("forward")),
                        ("target_group_arn", Value::reference(&target_group_id)),
                    ])]),
                ),
        )?;

        log::debug!(
            "listener {} on port {} forwards to {}",
            self.id,
            self.port,
            target_group_id
        );
        self.target_group = Some(target_group_id);
        self.targets = props.targets;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Target group logical id, once targets were added
    pub fn target_group(&self) -> Option<&str> {
        self.target_group.as_deref()
    }

    /// Containers registered with the target group
    pub fn targets(&self) -> &[LoadBalancerTarget] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::network::VpcProps;
    use crate::constructs::security_group::SecurityGroupProps;

    fn setup() -> (Stack, Vpc, SecurityGroup) {
        let mut stack = Stack::new("test");
        let vpc = Vpc::new(
            &mut stack,
            "AgentVPC",
            VpcProps::new(vec!["us-east-1a".to_string(), "us-east-1b".to_string()]),
        )
        .unwrap();
        let sg = SecurityGroup::new(
            &mut stack,
            "AlbSecurityGroup",
            &vpc,
            SecurityGroupProps {
                description: "alb".to_string(),
                allow_all_outbound: true,
            },
        )
        .unwrap();
        (stack, vpc, sg)
    }

    fn alb(stack: &mut Stack, vpc: &Vpc, sg: &SecurityGroup) -> ApplicationLoadBalancer {
        ApplicationLoadBalancer::new(
            stack,
            "AgentALB",
            vpc,
            ApplicationLoadBalancerProps {
                load_balancer_name: Some("fantasy-football-alb".to_string()),
                internet_facing: true,
                security_group: sg,
            },
        )
        .unwrap()
    }

    fn targets_props() -> AddTargetsProps {
        AddTargetsProps {
            port: 8501,
            protocol: ApplicationProtocol::Http,
            targets: vec![LoadBalancerTarget {
                container_name: "langgraph-app".to_string(),
                container_port: 8501,
            }],
            health_check: TargetHealthCheck {
                path: "/_stcore/health".to_string(),
                port: "8501".to_string(),
                unhealthy_threshold: 5,
                ..Default::default()
            },
        }
    }

    #[test]
    fn load_balancer_uses_public_subnets_and_waits_for_routes() {
        let (mut stack, vpc, sg) = setup();
        let alb = alb(&mut stack, &vpc, &sg);

        let resource = stack.get(alb.id()).unwrap();
        assert_eq!(resource.get("subnets"), Some(&vpc.subnet_refs(SubnetType::Public)));
        assert_eq!(resource.depends_on.len(), 2);
        assert!(resource.depends_on.iter().all(|d| d.contains("Public")));
        assert_eq!(alb.dns_name(), Value::attribute("AgentALB", "DNSName"));
    }

    #[test]
    fn listener_forwards_to_target_group() {
        let (mut stack, vpc, sg) = setup();
        let mut alb = alb(&mut stack, &vpc, &sg);
        let mut listener = alb.add_listener("PublicListener", 80).unwrap();
        listener.add_targets(&mut stack, "ECS", targets_props()).unwrap();

        let group = listener.target_group().unwrap();
        assert_eq!(group, "AgentALBPublicListenerECSGroup");
        let tg = stack.get(group).unwrap();
        assert_eq!(tg.get("target_type"), Some(&Value::string("ip")));
        assert_eq!(tg.get("health_check_path"), Some(&Value::string("/_stcore/health")));

        let declared = stack.get("AgentALBPublicListener").unwrap();
        let actions = declared.get("default_actions").unwrap().to_json();
        assert_eq!(actions[0]["target_group_arn"], serde_json::json!({ "Ref": group }));
        assert_eq!(listener.targets()[0].container_name, "langgraph-app");
    }

    #[test]
    fn targets_can_only_be_added_once() {
        let (mut stack, vpc, sg) = setup();
        let mut alb = alb(&mut stack, &vpc, &sg);
        let mut listener = alb.add_listener("PublicListener", 80).unwrap();
        listener.add_targets(&mut stack, "ECS", targets_props()).unwrap();

        assert!(listener.add_targets(&mut stack, "Other", targets_props()).is_err());
    }

    #[test]
    fn timeout_must_be_below_interval() {
        let (mut stack, vpc, sg) = setup();
        let mut alb = alb(&mut stack, &vpc, &sg);
        let mut listener = alb.add_listener("PublicListener", 80).unwrap();
        let mut props = targets_props();
        props.health_check.timeout_seconds = 30;
        let before = stack.len();

        assert!(matches!(
            listener.add_targets(&mut stack, "ECS", props),
            Err(ConstructError::Invalid { .. })
        ));
        assert_eq!(stack.len(), before);
    }

    #[test]
    fn target_port_must_match_group_port() {
        let (mut stack, vpc, sg) = setup();
        let mut alb = alb(&mut stack, &vpc, &sg);
        let mut listener = alb.add_listener("PublicListener", 80).unwrap();
        let mut props = targets_props();
        props.targets[0].container_port = 8000;

        assert!(listener.add_targets(&mut stack, "ECS", props).is_err());
    }

    #[test]
    fn duplicate_listener_is_rejected() {
        let (mut stack, vpc, sg) = setup();
        let mut alb = alb(&mut stack, &vpc, &sg);
        alb.add_listener("PublicListener", 80).unwrap();
        assert!(alb.add_listener("PublicListener", 8080).is_err());
    }
}
