//! ECS resource schema definitions

use agentstack_core::resource::Value;
use agentstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::AwsSchemaConfig;
use super::types as aws_types;

fn check_range(value: &Value, min: i64, max: i64, what: &str) -> Result<(), String> {
    match value {
        Value::Int(n) if (min..=max).contains(n) => Ok(()),
        Value::Int(n) => Err(format!(
            "{} must be between {} and {}, got {}",
            what, min, max, n
        )),
        _ => Err("Expected integer".to_string()),
    }
}

/// Seconds between container health checks (5-300)
pub fn health_check_interval() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckInterval".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |v| check_range(v, 5, 300, "Health check interval"),
    }
}

/// Seconds a container health check may take (2-120)
pub fn health_check_timeout() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckTimeout".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |v| check_range(v, 2, 120, "Health check timeout"),
    }
}

/// Consecutive failures before a container is unhealthy (1-10)
pub fn health_check_retries() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckRetries".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |v| check_range(v, 1, 10, "Health check retries"),
    }
}

/// Grace period before failed health checks count (0-300)
pub fn health_check_start_period() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckStartPeriod".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |v| check_range(v, 0, 300, "Health check start period"),
    }
}

/// Condition a container waits for on a dependency
pub fn dependency_condition() -> AttributeType {
    AttributeType::Enum(vec![
        "START".to_string(),
        "COMPLETE".to_string(),
        "SUCCESS".to_string(),
        "HEALTHY".to_string(),
    ])
}

fn port_mapping() -> AttributeType {
    AttributeType::Struct {
        name: "PortMapping".to_string(),
        fields: vec![
            AttributeSchema::new("container_port", types::port_number()).required(),
            AttributeSchema::new(
                "protocol",
                AttributeType::Enum(vec!["tcp".to_string(), "udp".to_string()]),
            ),
        ],
    }
}

fn key_value_pair() -> AttributeType {
    AttributeType::Struct {
        name: "KeyValuePair".to_string(),
        fields: vec![
            AttributeSchema::new("name", AttributeType::String).required(),
            AttributeSchema::new("value", AttributeType::String).required(),
        ],
    }
}

fn health_check() -> AttributeType {
    AttributeType::Struct {
        name: "HealthCheck".to_string(),
        fields: vec![
            AttributeSchema::new("command", types::string_list()).required(),
            AttributeSchema::new("interval", health_check_interval()),
            AttributeSchema::new("timeout", health_check_timeout()),
            AttributeSchema::new("retries", health_check_retries()),
            AttributeSchema::new("start_period", health_check_start_period()),
        ],
    }
}

fn log_configuration() -> AttributeType {
    AttributeType::Struct {
        name: "LogConfiguration".to_string(),
        fields: vec![
            AttributeSchema::new("log_driver", AttributeType::Enum(vec!["awslogs".to_string()]))
                .required(),
            AttributeSchema::new("options", AttributeType::Map(Box::new(AttributeType::String))),
        ],
    }
}

fn mount_point() -> AttributeType {
    AttributeType::Struct {
        name: "MountPoint".to_string(),
        fields: vec![
            AttributeSchema::new("source_volume", AttributeType::String).required(),
            AttributeSchema::new("container_path", AttributeType::String).required(),
            AttributeSchema::new("read_only", AttributeType::Bool),
        ],
    }
}

fn container_dependency() -> AttributeType {
    AttributeType::Struct {
        name: "ContainerDependency".to_string(),
        fields: vec![
            AttributeSchema::new("container_name", aws_types::ecs_name()).required(),
            AttributeSchema::new("condition", dependency_condition()).required(),
        ],
    }
}

fn container_definition() -> AttributeType {
    AttributeType::Struct {
        name: "ContainerDefinition".to_string(),
        fields: vec![
            AttributeSchema::new("name", aws_types::ecs_name()).required(),
            AttributeSchema::new("image", AttributeType::String).required(),
            AttributeSchema::new("essential", AttributeType::Bool),
            AttributeSchema::new("port_mappings", AttributeType::List(Box::new(port_mapping()))),
            AttributeSchema::new("environment", AttributeType::List(Box::new(key_value_pair()))),
            AttributeSchema::new("health_check", health_check()),
            AttributeSchema::new("log_configuration", log_configuration()),
            AttributeSchema::new("mount_points", AttributeType::List(Box::new(mount_point()))),
            AttributeSchema::new(
                "depends_on",
                AttributeType::List(Box::new(container_dependency())),
            ),
        ],
    }
}

/// Returns the schema for ECS Cluster
pub fn cluster_schema() -> ResourceSchema {
    ResourceSchema::new("ecs.cluster")
        .with_description("An ECS cluster")
        .attribute(AttributeSchema::new("cluster_name", aws_types::ecs_name()))
        .attribute(
            AttributeSchema::new(
                "cluster_settings",
                AttributeType::List(Box::new(AttributeType::Struct {
                    name: "ClusterSetting".to_string(),
                    fields: vec![
                        AttributeSchema::new(
                            "name",
                            AttributeType::Enum(vec!["containerInsights".to_string()]),
                        )
                        .required(),
                        AttributeSchema::new(
                            "value",
                            AttributeType::Enum(vec![
                                "enabled".to_string(),
                                "disabled".to_string(),
                                "enhanced".to_string(),
                            ]),
                        )
                        .required(),
                    ],
                })),
            )
            .with_description("Cluster settings such as Container Insights"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for ECS Task Definition
pub fn task_definition_schema() -> ResourceSchema {
    ResourceSchema::new("ecs.task_definition")
        .with_description("An ECS task definition")
        .attribute(AttributeSchema::new("family", aws_types::ecs_name()))
        .attribute(
            AttributeSchema::new("cpu", AttributeType::String)
                .with_description("CPU units for the task, as a string"),
        )
        .attribute(
            AttributeSchema::new("memory", AttributeType::String)
                .with_description("Memory for the task in MiB, as a string"),
        )
        .attribute(AttributeSchema::new(
            "network_mode",
            AttributeType::Enum(vec![
                "awsvpc".to_string(),
                "bridge".to_string(),
                "host".to_string(),
                "none".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new(
            "requires_compatibilities",
            AttributeType::List(Box::new(AttributeType::Enum(vec![
                "FARGATE".to_string(),
                "EC2".to_string(),
            ]))),
        ))
        .attribute(
            AttributeSchema::new("execution_role_arn", AttributeType::String)
                .with_description("Role the ECS agent uses to pull images and write logs"),
        )
        .attribute(
            AttributeSchema::new("task_role_arn", AttributeType::String)
                .with_description("Role the containers assume"),
        )
        .attribute(AttributeSchema::new(
            "volumes",
            AttributeType::List(Box::new(AttributeType::Struct {
                name: "Volume".to_string(),
                fields: vec![AttributeSchema::new("name", AttributeType::String).required()],
            })),
        ))
        .attribute(
            AttributeSchema::new(
                "container_definitions",
                AttributeType::List(Box::new(container_definition())),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for ECS Service
pub fn service_schema() -> ResourceSchema {
    ResourceSchema::new("ecs.service")
        .with_description("An ECS service keeping a number of tasks running")
        .attribute(AttributeSchema::new("cluster", AttributeType::String).required())
        .attribute(AttributeSchema::new("task_definition", AttributeType::String).required())
        .attribute(AttributeSchema::new("service_name", aws_types::ecs_name()))
        .attribute(AttributeSchema::new("desired_count", types::non_negative_int()))
        .attribute(AttributeSchema::new(
            "launch_type",
            AttributeType::Enum(vec!["FARGATE".to_string(), "EC2".to_string()]),
        ))
        .attribute(AttributeSchema::new(
            "network_configuration",
            AttributeType::Struct {
                name: "NetworkConfiguration".to_string(),
                fields: vec![
                    AttributeSchema::new(
                        "awsvpc_configuration",
                        AttributeType::Struct {
                            name: "AwsVpcConfiguration".to_string(),
                            fields: vec![
                                AttributeSchema::new(
                                    "assign_public_ip",
                                    AttributeType::Enum(vec![
                                        "ENABLED".to_string(),
                                        "DISABLED".to_string(),
                                    ]),
                                ),
                                AttributeSchema::new("security_groups", types::string_list()),
                                AttributeSchema::new("subnets", types::string_list()).required(),
                            ],
                        },
                    )
                    .required(),
                ],
            },
        ))
        .attribute(AttributeSchema::new(
            "load_balancers",
            AttributeType::List(Box::new(AttributeType::Struct {
                name: "LoadBalancer".to_string(),
                fields: vec![
                    AttributeSchema::new("container_name", aws_types::ecs_name()).required(),
                    AttributeSchema::new("container_port", types::port_number()).required(),
                    AttributeSchema::new("target_group_arn", AttributeType::String).required(),
                ],
            })),
        ))
        .attribute(AttributeSchema::new(
            "health_check_grace_period_seconds",
            types::non_negative_int(),
        ))
        .attribute(AttributeSchema::new(
            "deployment_configuration",
            AttributeType::Struct {
                name: "DeploymentConfiguration".to_string(),
                fields: vec![
                    AttributeSchema::new("maximum_percent", types::positive_int()),
                    AttributeSchema::new("minimum_healthy_percent", types::non_negative_int()),
                ],
            },
        ))
}

/// Returns all ECS configs
pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        AwsSchemaConfig::new("AWS::ECS::Cluster", cluster_schema()),
        AwsSchemaConfig::new("AWS::ECS::TaskDefinition", task_definition_schema()),
        AwsSchemaConfig::new("AWS::ECS::Service", service_schema()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_bounds() {
        assert!(health_check_interval().validate(&Value::Int(5)).is_ok());
        assert!(health_check_interval().validate(&Value::Int(4)).is_err());
        assert!(health_check_timeout().validate(&Value::Int(121)).is_err());
        assert!(health_check_retries().validate(&Value::Int(10)).is_ok());
        assert!(health_check_retries().validate(&Value::Int(0)).is_err());
        assert!(health_check_start_period().validate(&Value::Int(0)).is_ok());
        assert!(health_check_start_period().validate(&Value::Int(301)).is_err());
    }

    #[test]
    fn dependency_condition_is_uppercase() {
        let t = dependency_condition();
        assert!(t.validate(&Value::string("HEALTHY")).is_ok());
        assert!(t.validate(&Value::string("healthy")).is_err());
    }

    #[test]
    fn container_definition_rejects_unknown_field() {
        let t = container_definition();
        let value = Value::map([
            ("name", Value::string("langgraph-redis")),
            ("image", Value::string("redis:6")),
            ("privileged", Value::Bool(true)),
        ]);
        assert!(t.validate(&value).is_err());
    }

    #[test]
    fn container_dependency_needs_condition() {
        let t = container_dependency();
        let value = Value::map([("container_name", Value::string("langgraph-redis"))]);
        assert!(t.validate(&value).is_err());
    }
}
