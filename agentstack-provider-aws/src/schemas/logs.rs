//! CloudWatch Logs resource schema definitions

use agentstack_core::resource::Value;
use agentstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;

/// Retention periods CloudWatch Logs accepts, in days
const VALID_RETENTION_DAYS: &[i64] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

pub fn retention_in_days() -> AttributeType {
    AttributeType::Custom {
        name: "RetentionInDays".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if VALID_RETENTION_DAYS.contains(n) => Ok(()),
            Value::Int(n) => Err(format!("Unsupported log retention of {} days", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// Returns the schema for Log Group
pub fn log_group_schema() -> ResourceSchema {
    ResourceSchema::new("logs.log_group")
        .with_description("A CloudWatch Logs log group")
        .attribute(AttributeSchema::new("log_group_name", AttributeType::String))
        .attribute(
            AttributeSchema::new("retention_in_days", retention_in_days())
                .with_description("Days to keep log events; forever when absent"),
        )
}

/// Returns all Logs configs
pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![AwsSchemaConfig::new("AWS::Logs::LogGroup", log_group_schema())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_must_be_supported_value() {
        assert!(retention_in_days().validate(&Value::Int(30)).is_ok());
        assert!(retention_in_days().validate(&Value::Int(31)).is_err());
    }
}
