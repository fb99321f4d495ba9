//! Workflow modules for the marketplace service.

pub mod listing;
