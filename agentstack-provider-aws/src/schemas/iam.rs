//! IAM resource schema definitions

use agentstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::AwsSchemaConfig;

fn policy_statement() -> AttributeType {
    AttributeType::Struct {
        name: "Statement".to_string(),
        fields: vec![
            AttributeSchema::new(
                "effect",
                AttributeType::Enum(vec!["Allow".to_string(), "Deny".to_string()]),
            )
            .required(),
            AttributeSchema::new("action", types::string_list()).required(),
            AttributeSchema::new("resource", types::string_list()),
            AttributeSchema::new(
                "principal",
                AttributeType::Map(Box::new(AttributeType::String)),
            ),
        ],
    }
}

/// IAM policy document with version and statements
pub fn policy_document() -> AttributeType {
    AttributeType::Struct {
        name: "PolicyDocument".to_string(),
        fields: vec![
            AttributeSchema::new("version", AttributeType::Enum(vec!["2012-10-17".to_string()]))
                .required(),
            AttributeSchema::new("statement", AttributeType::List(Box::new(policy_statement())))
                .required(),
        ],
    }
}

/// Returns the schema for IAM Role
pub fn role_schema() -> ResourceSchema {
    ResourceSchema::new("iam.role")
        .with_description("An IAM role")
        .attribute(
            AttributeSchema::new("assume_role_policy_document", policy_document())
                .required()
                .with_description("Who may assume the role"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new("managed_policy_arns", types::string_list())
                .with_description("ARNs of managed policies attached to the role"),
        )
        .attribute(
            AttributeSchema::new(
                "policies",
                AttributeType::List(Box::new(AttributeType::Struct {
                    name: "Policy".to_string(),
                    fields: vec![
                        AttributeSchema::new("policy_name", AttributeType::String).required(),
                        AttributeSchema::new("policy_document", policy_document()).required(),
                    ],
                })),
            )
            .with_description("Inline policies"),
        )
}

/// Returns all IAM configs
pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![AwsSchemaConfig::new("AWS::IAM::Role", role_schema())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentstack_core::resource::Value;

    #[test]
    fn policy_document_requires_statement() {
        let t = policy_document();
        let doc = Value::map([("version", Value::string("2012-10-17"))]);
        assert!(t.validate(&doc).is_err());

        let doc = Value::map([
            ("version", Value::string("2012-10-17")),
            (
                "statement",
                Value::List(vec![Value::map([
                    ("effect", Value::string("Allow")),
                    ("action", Value::strings(["bedrock:InvokeModel"])),
                    ("resource", Value::strings(["arn:aws:bedrock:*:*:model/*"])),
                ])]),
            ),
        ]);
        assert!(t.validate(&doc).is_ok());
    }
}
