//! Pipeline stages that act on the contract registry.

pub mod deployment;
pub mod submission;

pub use deployment::{DeploymentError, DeploymentHandler};
pub use submission::{LastCall, SubmissionError, SubmissionHandler};
