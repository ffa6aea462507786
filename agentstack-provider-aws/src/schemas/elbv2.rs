//! Elastic Load Balancing v2 resource schema definitions

use agentstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::AwsSchemaConfig;
use super::types as aws_types;

fn http_protocol() -> AttributeType {
    AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()])
}

/// Returns the schema for Application Load Balancer
pub fn load_balancer_schema() -> ResourceSchema {
    ResourceSchema::new("elbv2.load_balancer")
        .with_description("An application load balancer")
        .attribute(AttributeSchema::new("name", aws_types::elb_name()))
        .attribute(AttributeSchema::new(
            "scheme",
            AttributeType::Enum(vec!["internet-facing".to_string(), "internal".to_string()]),
        ))
        .attribute(
            AttributeSchema::new(
                "load_balancer_type",
                AttributeType::Enum(vec!["application".to_string(), "network".to_string()]),
            )
            .with_provider_name("Type"),
        )
        .attribute(AttributeSchema::new("security_groups", types::string_list()))
        .attribute(AttributeSchema::new("subnets", types::string_list()).required())
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Target Group
pub fn target_group_schema() -> ResourceSchema {
    ResourceSchema::new("elbv2.target_group")
        .with_description("A target group the load balancer routes to")
        .attribute(AttributeSchema::new("port", types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", http_protocol()).required())
        .attribute(AttributeSchema::new(
            "target_type",
            AttributeType::Enum(vec![
                "ip".to_string(),
                "instance".to_string(),
                "lambda".to_string(),
            ]),
        ))
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("health_check_enabled", AttributeType::Bool))
        .attribute(AttributeSchema::new("health_check_path", AttributeType::String))
        .attribute(AttributeSchema::new("health_check_port", aws_types::health_check_port()))
        .attribute(AttributeSchema::new("health_check_protocol", http_protocol()))
        .attribute(AttributeSchema::new(
            "health_check_interval_seconds",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new(
            "health_check_timeout_seconds",
            types::positive_int(),
        ))
        .attribute(AttributeSchema::new("healthy_threshold_count", types::positive_int()))
        .attribute(AttributeSchema::new("unhealthy_threshold_count", types::positive_int()))
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Listener
pub fn listener_schema() -> ResourceSchema {
    ResourceSchema::new("elbv2.listener")
        .with_description("A listener accepting traffic on one port")
        .attribute(AttributeSchema::new("load_balancer_arn", AttributeType::String).required())
        .attribute(AttributeSchema::new("port", types::port_number()).required())
        .attribute(AttributeSchema::new("protocol", http_protocol()).required())
        .attribute(
            AttributeSchema::new(
                "default_actions",
                AttributeType::List(Box::new(AttributeType::Struct {
                    name: "Action".to_string(),
                    fields: vec![
                        AttributeSchema::new(
                            "type",
                            AttributeType::Enum(vec!["forward".to_string()]),
                        )
                        .required(),
                        AttributeSchema::new("target_group_arn", AttributeType::String)
                            .required(),
                    ],
                })),
            )
            .required(),
        )
}

/// Returns all ELBv2 configs
pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        AwsSchemaConfig::new("AWS::ElasticLoadBalancingV2::LoadBalancer", load_balancer_schema()),
        AwsSchemaConfig::new("AWS::ElasticLoadBalancingV2::TargetGroup", target_group_schema()),
        AwsSchemaConfig::new("AWS::ElasticLoadBalancingV2::Listener", listener_schema()),
    ]
}
