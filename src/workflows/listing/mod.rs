//! Listing lifecycle and expertise-gated review workflow.
//!
//! A listing moves through a seven-state machine (`brouillon` through
//! `vendu`) driven by four actor roles. Transitions are guarded by a pure
//! authorization predicate and by completeness of the three expertise
//! records (fiches); commits go through an optimistic compare-and-set so
//! racing requests resolve to exactly one winner. Owner notifications fire
//! after commit and never block or unwind a transition.

pub mod authorization;
pub mod domain;
pub mod engine;
pub mod fiches;
pub mod memory;
pub mod notifications;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use authorization::{authorize, Decision, DenyReason};
pub use domain::{
    Actor, Capability, Fiche, FicheKind, Listing, ListingId, ListingStatus, Notification,
    NotificationId, NotificationKind, Transition, UserId, Visibility,
};
pub use engine::{ListingWorkflow, NewListing, WorkflowError};
pub use fiches::{FicheError, FicheStore};
pub use memory::{MemoryFiches, MemoryListings, MemoryNotifications};
pub use repository::{
    FicheRepository, ListingRepository, ListingView, NotificationError, NotificationSink,
    RepositoryError,
};
pub use router::listing_router;
