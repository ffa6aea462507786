//! Fargate task definitions and their containers
//!
//! All containers of a task share one network namespace (`awsvpc`), so they
//! reach each other on `127.0.0.1`. Start-up order between them is expressed
//! with container dependencies.

use std::fmt;

use agentstack_core::graph::{Dependency, DependencyGraph};
use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::{Stack, StackError};

use super::ConstructError;
use super::iam::Role;
use crate::assets::DockerImageAsset;
use crate::schemas::types::validate_ecs_name;

/// CPU units and the memory sizes (MiB) Fargate accepts with them,
/// as (cpu, min memory, max memory, step)
const FARGATE_SIZES: &[(u32, u32, u32, u32)] = &[
    (512, 1024, 4096, 1024),
    (1024, 2048, 8192, 1024),
    (2048, 4096, 16384, 1024),
    (4096, 8192, 30720, 1024),
    (8192, 16384, 61440, 4096),
    (16384, 32768, 122880, 8192),
];

fn validate_fargate_size(cpu: u32, memory_mib: u32) -> Result<(), String> {
    if cpu == 256 {
        return match memory_mib {
            512 | 1024 | 2048 => Ok(()),
            _ => Err(format!(
                "memory {} MiB is not valid with cpu 256 (expected 512, 1024 or 2048)",
                memory_mib
            )),
        };
    }
    let Some(&(_, min, max, step)) = FARGATE_SIZES.iter().find(|(c, ..)| *c == cpu) else {
        let valid: Vec<_> = std::iter::once(256)
            .chain(FARGATE_SIZES.iter().map(|(c, ..)| *c))
            .map(|c| c.to_string())
            .collect();
        return Err(format!(
            "cpu {} is not a Fargate size, expected one of: {}",
            cpu,
            valid.join(", ")
        ));
    };
    if (min..=max).contains(&memory_mib) && (memory_mib - min) % step == 0 {
        Ok(())
    } else {
        Err(format!(
            "memory {} MiB is not valid with cpu {} (expected {}-{} in steps of {})",
            memory_mib, cpu, min, max, step
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerImage {
    /// Public or private registry image, e.g. "postgres:16"
    Registry(String),
    /// Image built from a local Dockerfile
    Asset(DockerImageAsset),
}

impl ContainerImage {
    pub fn from_registry(name: impl Into<String>) -> Self {
        ContainerImage::Registry(name.into())
    }

    fn to_value(&self) -> Value {
        match self {
            ContainerImage::Registry(name) => Value::string(name),
            ContainerImage::Asset(asset) => asset.image_uri(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            protocol: Protocol::Tcp,
        }
    }
}

/// Container health check; all durations in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub command: Vec<String>,
    pub interval: u32,
    pub timeout: u32,
    pub retries: u32,
    pub start_period: u32,
}

impl HealthCheck {
    /// Health check with the ECS defaults: every 30s, 5s timeout, 3 retries
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            interval: 30,
            timeout: 5,
            retries: 3,
            start_period: 0,
        }
    }

    pub fn interval(mut self, seconds: u32) -> Self {
        self.interval = seconds;
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn start_period(mut self, seconds: u32) -> Self {
        self.start_period = seconds;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.command.iter().all(|c| c.trim().is_empty()) {
            return Err("health check command is empty".to_string());
        }
        let bounds = [
            ("interval", self.interval, 5, 300),
            ("timeout", self.timeout, 2, 120),
            ("retries", self.retries, 1, 10),
            ("start period", self.start_period, 0, 300),
        ];
        for (what, value, min, max) in bounds {
            if !(min..=max).contains(&value) {
                return Err(format!(
                    "health check {} must be between {} and {}, got {}",
                    what, min, max, value
                ));
            }
        }
        Ok(())
    }

    fn to_value(&self) -> Value {
        Value::map([
            (
                "command",
                Value::strings(["CMD-SHELL".to_string(), self.command.join(" ")]),
            ),
            ("interval", Value::Int(i64::from(self.interval))),
            ("timeout", Value::Int(i64::from(self.timeout))),
            ("retries", Value::Int(i64::from(self.retries))),
            ("start_period", Value::Int(i64::from(self.start_period))),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DependencyCondition {
    Start,
    Complete,
    Success,
    Healthy,
}

impl fmt::Display for DependencyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyCondition::Start => write!(f, "START"),
            DependencyCondition::Complete => write!(f, "COMPLETE"),
            DependencyCondition::Success => write!(f, "SUCCESS"),
            DependencyCondition::Healthy => write!(f, "HEALTHY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDependency {
    pub container: String,
    pub condition: DependencyCondition,
}

impl ContainerDependency {
    pub fn healthy(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            condition: DependencyCondition::Healthy,
        }
    }
}

/// `awslogs` driver settings
#[derive(Debug, Clone, PartialEq)]
pub struct AwsLogDriver {
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MountPoint {
    pub source_volume: String,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinitionOptions {
    pub image: ContainerImage,
    pub port_mappings: Vec<PortMapping>,
    /// Environment variables, in the order they are rendered
    pub environment: Vec<(String, String)>,
    pub health_check: Option<HealthCheck>,
    pub logging: Option<AwsLogDriver>,
    pub essential: bool,
}

impl ContainerDefinitionOptions {
    pub fn new(image: ContainerImage) -> Self {
        Self {
            image,
            port_mappings: Vec::new(),
            environment: Vec::new(),
            health_check: None,
            logging: None,
            essential: true,
        }
    }

    pub fn port_mapping(mut self, mapping: PortMapping) -> Self {
        self.port_mappings.push(mapping);
        self
    }

    /// Set variables in order; a repeated name is overwritten in place
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in vars {
            let (name, value) = (name.into(), value.into());
            match self.environment.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = value,
                None => self.environment.push((name, value)),
            }
        }
        self
    }

    pub fn health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn logging(mut self, stream_prefix: impl Into<String>) -> Self {
        self.logging = Some(AwsLogDriver {
            stream_prefix: stream_prefix.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinition {
    pub name: String,
    pub options: ContainerDefinitionOptions,
    pub mount_points: Vec<MountPoint>,
    pub depends_on: Vec<ContainerDependency>,
}

impl ContainerDefinition {
    pub fn environment_value(&self, name: &str) -> Option<&str> {
        self.options
            .environment
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_port(&self, port: u16) -> bool {
        self.options
            .port_mappings
            .iter()
            .any(|m| m.container_port == port)
    }
}

/// Container and port a load balancer sends traffic to
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerTarget {
    pub container_name: String,
    pub container_port: u16,
}

pub struct FargateTaskDefinitionProps<'a> {
    pub family: Option<String>,
    pub cpu: u32,
    pub memory_mib: u32,
    pub execution_role: &'a Role,
    pub task_role: &'a Role,
}

#[derive(Debug, Clone)]
pub struct FargateTaskDefinition {
    id: String,
    family: Option<String>,
    cpu: u32,
    memory_mib: u32,
    execution_role: String,
    task_role: String,
    volumes: Vec<String>,
    containers: Vec<ContainerDefinition>,
}

impl FargateTaskDefinition {
    pub fn new(id: &str, props: FargateTaskDefinitionProps<'_>) -> Result<Self, ConstructError> {
        validate_fargate_size(props.cpu, props.memory_mib).map_err(|e| ConstructError::invalid(id, e))?;
        if let Some(family) = &props.family {
            validate_ecs_name(family).map_err(|e| ConstructError::invalid(id, e))?;
        }

        Ok(Self {
            id: id.to_string(),
            family: props.family,
            cpu: props.cpu,
            memory_mib: props.memory_mib,
            execution_role: props.execution_role.id().to_string(),
            task_role: props.task_role.id().to_string(),
            volumes: Vec::new(),
            containers: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    pub fn memory_mib(&self) -> u32 {
        self.memory_mib
    }

    pub fn add_volume(&mut self, name: &str) {
        if !self.volumes.iter().any(|v| v == name) {
            self.volumes.push(name.to_string());
        }
    }

    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }

    pub fn add_container(
        &mut self,
        name: &str,
        options: ContainerDefinitionOptions,
    ) -> Result<(), ConstructError> {
        validate_ecs_name(name).map_err(|e| ConstructError::invalid(&self.id, e))?;
        if self.container(name).is_some() {
            return Err(ConstructError::DuplicateContainer(name.to_string()));
        }
        if let Some(health_check) = &options.health_check {
            health_check
                .validate()
                .map_err(|e| ConstructError::invalid(name, e))?;
        }

        self.containers.push(ContainerDefinition {
            name: name.to_string(),
            options,
            mount_points: Vec::new(),
            depends_on: Vec::new(),
        });
        Ok(())
    }

    pub fn add_mount_points(&mut self, container: &str, mount_point: MountPoint) -> Result<(), ConstructError> {
        if !self.volumes.contains(&mount_point.source_volume) {
            return Err(ConstructError::UnknownVolume {
                container: container.to_string(),
                volume: mount_point.source_volume,
            });
        }
        self.container_mut(container)?.mount_points.push(mount_point);
        Ok(())
    }

    /// Make `container` wait for each dependency.
    ///
    /// Both sides must be declared; waiting for HEALTHY needs a health check
    /// on the dependency. Dependencies may not form a cycle.
    pub fn add_container_dependencies(
        &mut self,
        container: &str,
        dependencies: &[ContainerDependency],
    ) -> Result<(), ConstructError> {
        self.container_mut(container)?;
        for dependency in dependencies {
            let target = self.container(&dependency.container).ok_or_else(|| {
                ConstructError::UnknownContainer {
                    task_definition: self.id.clone(),
                    container: dependency.container.clone(),
                }
            })?;
            if dependency.condition == DependencyCondition::Healthy && target.options.health_check.is_none() {
                return Err(ConstructError::MissingHealthCheck {
                    container: container.to_string(),
                    dependency: dependency.container.clone(),
                });
            }
        }

        let mut graph = self.container_graph();
        for dependency in dependencies {
            graph.add_edge(
                container.to_string(),
                Dependency {
                    target: dependency.container.clone(),
                    attribute: dependency.condition.to_string(),
                    used_in: "depends_on".to_string(),
                },
            );
        }
        if let Err(node) = graph.topological_order() {
            return Err(ConstructError::invalid(
                &self.id,
                format!("container dependencies form a cycle through '{}'", node),
            ));
        }

        let entry = self.container_mut(container)?;
        for dependency in dependencies {
            entry.depends_on.retain(|d| d.container != dependency.container);
            entry.depends_on.push(dependency.clone());
        }
        Ok(())
    }

    fn container_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for container in &self.containers {
            graph.add_node(container.name.clone());
            for dependency in &container.depends_on {
                graph.add_edge(
                    container.name.clone(),
                    Dependency {
                        target: dependency.container.clone(),
                        attribute: dependency.condition.to_string(),
                        used_in: "depends_on".to_string(),
                    },
                );
            }
        }
        graph
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    fn container_mut(&mut self, name: &str) -> Result<&mut ContainerDefinition, ConstructError> {
        let task_definition = self.id.clone();
        self.containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ConstructError::UnknownContainer {
                task_definition,
                container: name.to_string(),
            })
    }

    pub fn containers(&self) -> &[ContainerDefinition] {
        &self.containers
    }

    /// Image assets used by this task's containers
    pub fn assets(&self) -> impl Iterator<Item = &DockerImageAsset> {
        self.containers.iter().filter_map(|c| match &c.options.image {
            ContainerImage::Asset(asset) => Some(asset),
            ContainerImage::Registry(_) => None,
        })
    }

    /// Target for a load balancer; the container must map the port
    pub fn load_balancer_target(&self, container: &str, port: u16) -> Result<LoadBalancerTarget, ConstructError> {
        let definition = self.container(container).ok_or_else(|| ConstructError::UnknownContainer {
            task_definition: self.id.clone(),
            container: container.to_string(),
        })?;
        if !definition.has_port(port) {
            return Err(ConstructError::invalid(
                &self.id,
                format!("container '{}' does not map port {}", container, port),
            ));
        }
        Ok(LoadBalancerTarget {
            container_name: container.to_string(),
            container_port: port,
        })
    }

    fn log_group_id(&self, container: &str) -> String {
        let suffix: String = container
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect();
        format!("{}{}LogGroup", self.id, suffix)
    }

    /// Declare one log group per logged container, then the task definition
    pub fn declare(&self, stack: &mut Stack) -> Result<(), ConstructError> {
        if self.containers.is_empty() {
            return Err(ConstructError::invalid(&self.id, "task definition has no containers"));
        }
        for role in [&self.execution_role, &self.task_role] {
            if !stack.contains(role) {
                return Err(StackError::DanglingReference {
                    from: self.id.clone(),
                    target: role.clone(),
                }
                .into());
            }
        }

        let mut definitions = Vec::new();
        for container in &self.containers {
            let log_configuration = match &container.options.logging {
                Some(driver) => {
                    let log_group = self.log_group_id(&container.name);
                    stack.add(Resource::new("logs.log_group", &log_group))?;
                    Some(Value::map([
                        ("log_driver", Value::string("awslogs")),
                        (
                            "options",
                            Value::map([
                                ("awslogs-group", Value::reference(&log_group)),
                                ("awslogs-stream-prefix", Value::string(&driver.stream_prefix)),
                                ("awslogs-region", Value::Pseudo("AWS::Region".to_string())),
                            ]),
                        ),
                    ]))
                }
                None => None,
            };
            definitions.push(container_value(container, log_configuration));
        }

        let mut resource = Resource::new("ecs.task_definition", &self.id)
            .with_attribute("cpu", self.cpu.to_string())
            .with_attribute("memory", self.memory_mib.to_string())
            .with_attribute("network_mode", "awsvpc")
            .with_attribute("requires_compatibilities", Value::strings(["FARGATE"]))
            .with_attribute("execution_role_arn", Value::attribute(&self.execution_role, "Arn"))
            .with_attribute("task_role_arn", Value::attribute(&self.task_role, "Arn"))
            .with_attribute("container_definitions", Value::List(definitions));
        if let Some(family) = &self.family {
            resource = resource.with_attribute("family", family.as_str());
        }
        if !self.volumes.is_empty() {
            resource = resource.with_attribute(
                "volumes",
                Value::List(
                    self.volumes
                        .iter()
                        .map(|v| Value::map([("name", Value::string(v))]))
                        .collect(),
                ),
            );
        }

        stack.add(resource)?;
        log::info!(
            "declared task definition {} with {} containers",
            self.id,
            self.containers.len()
        );
        Ok(())
    }
}

fn container_value(container: &ContainerDefinition, log_configuration: Option<Value>) -> Value {
    let options = &container.options;
    let mut map = vec![
        ("name", Value::string(&container.name)),
        ("image", options.image.to_value()),
        ("essential", Value::Bool(options.essential)),
    ];

    if !options.port_mappings.is_empty() {
        map.push((
            "port_mappings",
            Value::List(
                options
                    .port_mappings
                    .iter()
                    .map(|m| {
                        Value::map([
                            ("container_port", Value::Int(i64::from(m.container_port))),
                            ("protocol", Value::string(m.protocol.to_string())),
                        ])
                    })
                    .collect(),
            ),
        ));
    }
    if !options.environment.is_empty() {
        map.push((
            "environment",
            Value::List(
                options
                    .environment
                    .iter()
                    .map(|(name, value)| {
                        Value::map([("name", Value::string(name)), ("value", Value::string(value))])
                    })
                    .collect(),
            ),
        ));
    }
    if let Some(health_check) = &options.health_check {
        map.push(("health_check", health_check.to_value()));
    }
    if let Some(log_configuration) = log_configuration {
        map.push(("log_configuration", log_configuration));
    }
    if !container.mount_points.is_empty() {
        map.push((
            "mount_points",
            Value::List(
                container
                    .mount_points
                    .iter()
                    .map(|m| {
                        Value::map([
                            ("source_volume", Value::string(&m.source_volume)),
                            ("container_path", Value::string(&m.container_path)),
                            ("read_only", Value::Bool(m.read_only)),
                        ])
                    })
                    .collect(),
            ),
        ));
    }
    if !container.depends_on.is_empty() {
        map.push((
            "depends_on",
            Value::List(
                container
                    .depends_on
                    .iter()
                    .map(|d| {
                        Value::map([
                            ("container_name", Value::string(&d.container)),
                            ("condition", Value::string(d.condition.to_string())),
                        ])
                    })
                    .collect(),
            ),
        ));
    }

    Value::map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructs::iam::RoleProps;

    fn role() -> Role {
        Role::new(
            "executionRole",
            RoleProps {
                assumed_by: "ecs-tasks.amazonaws.com".to_string(),
                description: None,
            },
        )
    }

    fn task(role: &Role) -> FargateTaskDefinition {
        FargateTaskDefinition::new(
            "TaskDef",
            FargateTaskDefinitionProps {
                family: None,
                cpu: 1024,
                memory_mib: 4096,
                execution_role: role,
                task_role: role,
            },
        )
        .unwrap()
    }

    fn checked(image: &str) -> ContainerDefinitionOptions {
        ContainerDefinitionOptions::new(ContainerImage::from_registry(image))
            .health_check(HealthCheck::new(["true"]).interval(5).timeout(5).retries(5))
    }

    #[test]
    fn fargate_sizes() {
        assert!(validate_fargate_size(1024, 4096).is_ok());
        assert!(validate_fargate_size(256, 512).is_ok());
        assert!(validate_fargate_size(256, 1024).is_ok());
        assert!(validate_fargate_size(256, 1536).is_err());
        assert!(validate_fargate_size(1024, 1024).is_err());
        assert!(validate_fargate_size(1024, 4500).is_err());
        assert!(validate_fargate_size(3000, 4096).is_err());
    }

    #[test]
    fn health_check_bounds_are_enforced() {
        assert!(HealthCheck::new(["pg_isready"]).validate().is_ok());
        assert!(HealthCheck::new(["pg_isready"]).interval(4).validate().is_err());
        assert!(HealthCheck::new(["pg_isready"]).timeout(121).validate().is_err());
        assert!(HealthCheck::new(["pg_isready"]).retries(0).validate().is_err());
        assert!(HealthCheck::new(["pg_isready"]).start_period(301).validate().is_err());
        assert!(HealthCheck::new([" "]).validate().is_err());
    }

    #[test]
    fn health_check_renders_as_cmd_shell() {
        let value = HealthCheck::new(["pg_isready", "-U", "postgres"]).to_value();
        assert_eq!(
            value.as_map().unwrap()["command"],
            Value::strings(["CMD-SHELL", "pg_isready -U postgres"])
        );
    }

    #[test]
    fn environment_overrides_in_place() {
        let options = ContainerDefinitionOptions::new(ContainerImage::from_registry("x"))
            .environment([("A", "1"), ("B", "2")])
            .environment([("A", "3")]);
        assert_eq!(
            options.environment,
            vec![("A".to_string(), "3".to_string()), ("B".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn healthy_dependency_needs_health_check() {
        let role = role();
        let mut task = task(&role);
        task.add_container("db", ContainerDefinitionOptions::new(ContainerImage::from_registry("postgres:16")))
            .unwrap();
        task.add_container("api", checked("api")).unwrap();

        let err = task
            .add_container_dependencies("api", &[ContainerDependency::healthy("db")])
            .unwrap_err();
        assert!(matches!(err, ConstructError::MissingHealthCheck { .. }));

        let start = ContainerDependency {
            container: "db".to_string(),
            condition: DependencyCondition::Start,
        };
        task.add_container_dependencies("api", &[start]).unwrap();
    }

    #[test]
    fn dependency_on_unknown_container_fails() {
        let role = role();
        let mut task = task(&role);
        task.add_container("api", checked("api")).unwrap();

        let err = task
            .add_container_dependencies("api", &[ContainerDependency::healthy("redis")])
            .unwrap_err();
        assert!(matches!(err, ConstructError::UnknownContainer { ref container, .. } if container == "redis"));
        assert!(task.container("api").unwrap().depends_on.is_empty());
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let role = role();
        let mut task = task(&role);
        task.add_container("a", checked("a")).unwrap();
        task.add_container("b", checked("b")).unwrap();
        task.add_container_dependencies("a", &[ContainerDependency::healthy("b")])
            .unwrap();

        assert!(task
            .add_container_dependencies("b", &[ContainerDependency::healthy("a")])
            .is_err());
        assert!(task.container("b").unwrap().depends_on.is_empty());
    }

    #[test]
    fn mount_point_needs_volume() {
        let role = role();
        let mut task = task(&role);
        task.add_container("db", checked("postgres:16")).unwrap();
        let mount = MountPoint {
            source_volume: "data".to_string(),
            container_path: "/var/lib/postgresql/data".to_string(),
            read_only: false,
        };

        assert!(matches!(
            task.add_mount_points("db", mount.clone()),
            Err(ConstructError::UnknownVolume { .. })
        ));
        task.add_volume("data");
        task.add_mount_points("db", mount).unwrap();
    }

    #[test]
    fn load_balancer_target_needs_mapped_port() {
        let role = role();
        let mut task = task(&role);
        task.add_container("app", checked("app").port_mapping(PortMapping::tcp(8501)))
            .unwrap();

        assert!(task.load_balancer_target("app", 8501).is_ok());
        assert!(task.load_balancer_target("app", 80).is_err());
        assert!(task.load_balancer_target("api", 8501).is_err());
    }

    #[test]
    fn declare_adds_log_groups_before_task_definition() {
        let mut stack = Stack::new("test");
        let role = role();
        role.declare(&mut stack).unwrap();
        let mut task = task(&role);
        task.add_container("langgraph-redis", checked("redis:6").logging("redis"))
            .unwrap();
        task.declare(&mut stack).unwrap();

        let ids: Vec<_> = stack.resources().iter().map(|r| r.logical_id()).collect();
        assert_eq!(ids, vec!["executionRole", "TaskDefLanggraphRedisLogGroup", "TaskDef"]);

        let definitions = stack.get("TaskDef").unwrap().get("container_definitions").unwrap();
        let options = definitions.to_json()[0]["log_configuration"]["options"].clone();
        assert_eq!(options["awslogs-group"], serde_json::json!({ "Ref": "TaskDefLanggraphRedisLogGroup" }));
        assert_eq!(options["awslogs-stream-prefix"], "redis");
    }

    #[test]
    fn declare_without_role_fails() {
        let mut stack = Stack::new("test");
        let role = role();
        let mut task = task(&role);
        task.add_container("x", checked("x").logging("x")).unwrap();
        assert!(matches!(task.declare(&mut stack), Err(ConstructError::Stack(_))));
        assert!(stack.is_empty());
    }
}
