pub mod arguments;
pub mod artifacts;
pub mod confirmation;
pub mod deploy_service;
pub mod report;
pub mod tracing;
