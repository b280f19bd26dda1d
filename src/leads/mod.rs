//! Leads domain: data model, live activity feed, and dashboard counters.

pub mod activity;
pub mod model;
pub mod stats;

pub use activity::{ActivityFeed, ActivityWsMessage};
pub use model::{Activity, ActivityKind, Lead, LeadStatus, NewActivity, NewLead};
pub use stats::DashboardStats;
