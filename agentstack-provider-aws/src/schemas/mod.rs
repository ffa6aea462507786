//! AWS resource schema definitions

pub mod ec2;
pub mod ecs;
pub mod elbv2;
pub mod iam;
pub mod logs;
pub mod types;

use agentstack_core::schema::ResourceSchema;

/// A resource schema together with the CloudFormation type it renders as
#[derive(Debug, Clone)]
pub struct AwsSchemaConfig {
    /// CloudFormation type name (e.g., "AWS::EC2::VPC")
    pub aws_type_name: &'static str,
    pub schema: ResourceSchema,
}

impl AwsSchemaConfig {
    pub fn new(aws_type_name: &'static str, schema: ResourceSchema) -> Self {
        Self {
            aws_type_name,
            schema,
        }
    }
}

/// Returns every AWS schema config
pub fn configs() -> Vec<AwsSchemaConfig> {
    let mut configs = Vec::new();
    configs.extend(ec2::configs());
    configs.extend(ecs::configs());
    configs.extend(elbv2::configs());
    configs.extend(iam::configs());
    configs.extend(logs::configs());
    configs
}

/// Returns all AWS schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    configs().into_iter().map(|c| c.schema).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resource_types_are_unique() {
        let configs = configs();
        let types: HashSet<_> = configs.iter().map(|c| c.schema.resource_type.as_str()).collect();
        let cfn: HashSet<_> = configs.iter().map(|c| c.aws_type_name).collect();
        assert_eq!(types.len(), configs.len());
        assert_eq!(cfn.len(), configs.len());
    }

    #[test]
    fn resource_type_prefix_matches_service() {
        for config in configs() {
            let service = config.schema.resource_type.split('.').next().unwrap_or_default();
            let cfn_service = config.aws_type_name.split("::").nth(1).unwrap_or_default();
            let expected = match service {
                "elbv2" => "ElasticLoadBalancingV2",
                other => other,
            };
            assert!(
                cfn_service.eq_ignore_ascii_case(expected),
                "{} vs {}",
                config.schema.resource_type,
                config.aws_type_name
            );
        }
    }
}
