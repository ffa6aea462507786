//! AgentStack AWS Provider
//!
//! AWS resource schemas, the constructs that declare them, container image
//! assets and CloudFormation synthesis.

pub mod assets;
pub mod case_convert;
pub mod constructs;
pub mod schemas;
pub mod synth;

pub use synth::AwsProvider;
