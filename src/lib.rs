//! leadflow is a sales-lead intake, qualification, and outreach service.

pub mod api;
pub mod config;
pub mod error;
pub mod leads;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod qualify;
pub mod sheets;
pub mod store;
