//! Case conversion utilities for attribute names to CloudFormation property names
//!
//! Resources use snake_case (e.g., `cidr_block`, `health_check_path`)
//! CloudFormation uses CamelCase (e.g., `CidrBlock`, `HealthCheckPath`)
//!
//! Values are never touched: `awsvpc`, `internet-facing` and `FARGATE` are
//! already in the form CloudFormation expects.

/// Convert snake_case to CamelCase (PascalCase)
/// e.g., "cidr_block" -> "CidrBlock"
pub fn to_camel_case(s: &str) -> String {
    s.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Property name for a nested key.
///
/// Keys containing `-` are driver options such as `awslogs-group` and are
/// passed through verbatim.
pub fn property_name(key: &str) -> String {
    if key.contains('-') {
        key.to_string()
    } else {
        to_camel_case(key)
    }
}
