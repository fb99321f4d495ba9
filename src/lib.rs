//! Core library for the terralist marketplace service.
//!
//! The listing review workflow lives under [`workflows::listing`]: a status
//! state machine on land listings, gated by expertise records (fiches) and a
//! capability-based authorization guard, with owner notifications emitted as
//! fire-and-forget side effects of each transition.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
