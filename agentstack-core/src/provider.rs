//! Provider - Trait abstracting template synthesis
//!
//! A Provider knows the resource types of one cloud (AWS, GCP, etc.) and
//! turns a validated stack into the template its provisioning engine accepts.

use crate::resource::ResourceId;
use crate::schema::ResourceSchema;
use crate::stack::Stack;
use crate::template::Template;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Main Provider trait
///
/// Synthesis is pure: nothing here talks to the cloud.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "aws")
    fn name(&self) -> &'static str;

    /// Schemas for every resource type this Provider can render
    fn schemas(&self) -> Vec<ResourceSchema>;

    /// Render the stack as a provisioning template
    fn synthesize(&self, stack: &Stack) -> ProviderResult<Template>;
}

impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        (**self).schemas()
    }

    fn synthesize(&self, stack: &Stack) -> ProviderResult<Template> {
        (**self).synthesize(stack)
    }
}
