//! CloudFormation synthesis for AWS stacks

use std::collections::HashMap;

use agentstack_core::provider::{Provider, ProviderError, ProviderResult};
use agentstack_core::resource::Resource;
use agentstack_core::schema::ResourceSchema;
use agentstack_core::stack::Stack;
use agentstack_core::template::{Template, TemplateOutput, TemplateResource};

use crate::case_convert::{property_name, to_camel_case};
use crate::schemas::{self, AwsSchemaConfig};

/// Renders stacks of AWS resources as CloudFormation templates
pub struct AwsProvider {
    configs: HashMap<String, AwsSchemaConfig>,
}

impl AwsProvider {
    pub fn new() -> Self {
        let configs = schemas::configs()
            .into_iter()
            .map(|c| (c.schema.resource_type.clone(), c))
            .collect();
        Self { configs }
    }

    /// CloudFormation type for a resource type (e.g., "ec2.vpc" -> "AWS::EC2::VPC")
    pub fn cloudformation_type(&self, resource_type: &str) -> Option<&'static str> {
        self.configs.get(resource_type).map(|c| c.aws_type_name)
    }

    fn schema_map(&self) -> HashMap<String, ResourceSchema> {
        self.configs
            .iter()
            .map(|(name, config)| (name.clone(), config.schema.clone()))
            .collect()
    }

    fn render_resource(&self, resource: &Resource) -> ProviderResult<TemplateResource> {
        let config = self.configs.get(&resource.id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", resource.id.resource_type))
                .for_resource(resource.id.clone())
        })?;

        let mut properties = serde_json::Map::new();
        for (key, value) in &resource.attributes {
            let name = config
                .schema
                .provider_name(key)
                .map(str::to_string)
                .unwrap_or_else(|| to_camel_case(key));
            properties.insert(name, value.to_json_with(&property_name));
        }

        log::debug!(
            "rendered {} as {} with {} properties",
            resource.logical_id(),
            config.aws_type_name,
            properties.len()
        );
        Ok(TemplateResource {
            resource_type: config.aws_type_name.to_string(),
            properties,
            depends_on: resource.depends_on.clone(),
        })
    }
}

impl Default for AwsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        schemas::all_schemas()
    }

    fn synthesize(&self, stack: &Stack) -> ProviderResult<Template> {
        if let Err(errors) = stack.validate(&self.schema_map()) {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ProviderError::new(format!(
                "Stack '{}' failed validation:\n  {}",
                stack.name(),
                messages.join("\n  ")
            )));
        }

        let mut template = Template::new(stack.description().map(str::to_string));
        for resource in stack.resources() {
            let rendered = self.render_resource(resource)?;
            template
                .resources
                .insert(resource.logical_id().to_string(), rendered);
        }
        for output in stack.outputs() {
            template.outputs.insert(
                output.name.clone(),
                TemplateOutput {
                    value: output.value.to_json(),
                    description: output.description.clone(),
                },
            );
        }

        log::info!(
            "synthesized stack {} ({} resources, {} outputs)",
            stack.name(),
            template.resources.len(),
            template.outputs.len()
        );
        Ok(template)
    }
}
