//! AWS-specific type definitions

use agentstack_core::resource::Value;
use agentstack_core::schema::{AttributeSchema, AttributeType};
use regex::Regex;

/// Valid AWS regions
pub const VALID_REGIONS: &[&str] = &[
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ca-central-1",
    "sa-east-1",
];

/// Check a region name, e.g. "us-east-1"
pub fn validate_region(s: &str) -> Result<(), String> {
    if VALID_REGIONS.contains(&s) {
        Ok(())
    } else {
        Err(format!(
            "Invalid region '{}', expected one of: {}",
            s,
            VALID_REGIONS.join(", ")
        ))
    }
}

/// Check an availability zone name: a valid region followed by one zone letter
pub fn validate_availability_zone(s: &str) -> Result<(), String> {
    let mut chars = s.chars();
    match chars.next_back() {
        Some(zone) if ('a'..='f').contains(&zone) => validate_region(chars.as_str())
            .map_err(|_| format!("Invalid availability zone '{}'", s)),
        _ => Err(format!(
            "Invalid availability zone '{}': expected a region followed by a zone letter",
            s
        )),
    }
}

/// AWS region type with custom validation
pub fn aws_region() -> AttributeType {
    AttributeType::Custom {
        name: "Region".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_region(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Availability zone type (e.g., "us-east-1a")
pub fn availability_zone() -> AttributeType {
    AttributeType::Custom {
        name: "AvailabilityZone".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_availability_zone(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// IP protocol for security group rules; "-1" means all protocols
pub fn ip_protocol() -> AttributeType {
    AttributeType::Enum(vec![
        "tcp".to_string(),
        "udp".to_string(),
        "icmp".to_string(),
        "-1".to_string(),
    ])
}

/// Resource tags, rendered as a list of Key/Value pairs
pub fn tags() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Struct {
        name: "Tag".to_string(),
        fields: vec![
            AttributeSchema::new("key", AttributeType::String).required(),
            AttributeSchema::new("value", AttributeType::String).required(),
        ],
    }))
}

/// Load balancer and target group names: up to 32 alphanumerics or hyphens,
/// not starting or ending with a hyphen
pub fn elb_name() -> AttributeType {
    AttributeType::Custom {
        name: "ElbName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            let Value::String(s) = value else {
                return Err("Expected string".to_string());
            };
            let re = Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,30}[A-Za-z0-9])?$")
                .map_err(|e| e.to_string())?;
            if re.is_match(s) {
                Ok(())
            } else {
                Err(format!(
                    "Invalid name '{}': up to 32 alphanumeric characters or hyphens, not starting or ending with a hyphen",
                    s
                ))
            }
        },
    }
}

/// ECS names (clusters, containers, families): letters, digits, hyphens and underscores
pub fn ecs_name() -> AttributeType {
    AttributeType::Custom {
        name: "EcsName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            let Value::String(s) = value else {
                return Err("Expected string".to_string());
            };
            validate_ecs_name(s)
        },
    }
}

pub fn validate_ecs_name(s: &str) -> Result<(), String> {
    let re = Regex::new(r"^[A-Za-z0-9_-]{1,255}$").map_err(|e| e.to_string())?;
    if re.is_match(s) {
        Ok(())
    } else {
        Err(format!(
            "Invalid name '{}': up to 255 letters, digits, hyphens or underscores",
            s
        ))
    }
}

/// Port or the literal "traffic-port", as target group health checks expect
pub fn health_check_port() -> AttributeType {
    AttributeType::Custom {
        name: "HealthCheckPort".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            let Value::String(s) = value else {
                return Err("Expected string".to_string());
            };
            if s == "traffic-port" || s.parse::<u16>().is_ok_and(|p| p > 0) {
                Ok(())
            } else {
                Err(format!("Invalid health check port '{}'", s))
            }
        },
    }
}
