use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::authorization::{authorize, Decision};
use super::domain::{
    Actor, Capability, Fiche, FicheKind, Listing, ListingId, ListingStatus, Notification,
    NotificationId, Transition, UserId, Visibility,
};
use super::fiches::{FicheError, FicheStore};
use super::notifications::{emitted_for, TransitionEvent};
use super::repository::{
    FicheRepository, ListingRepository, NotificationError, NotificationSink, RepositoryError,
};

static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("lst-{id:06}"))
}

/// Payload for creating a draft listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub visibility: Visibility,
}

/// Error raised by the workflow engine.
///
/// Every variant is an expected outcome of an invalid request; nothing in
/// the engine panics or retries. `Repository` carries infrastructure
/// failures (store unavailable) that upstream layers map to 5xx.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },
    #[error("transition {transition} is not defined from status {current}")]
    InvalidTransition {
        transition: Transition,
        current: ListingStatus,
    },
    #[error("listing is missing fiches: {}", format_kinds(.missing))]
    PreconditionFailed { missing: Vec<FicheKind> },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("listing status changed concurrently (expected {expected}, found {found})")]
    StateConflict {
        expected: ListingStatus,
        found: ListingStatus,
    },
    #[error("listing not found")]
    NotFound,
    #[error("storage failure: {0}")]
    Repository(RepositoryError),
}

fn format_kinds(kinds: &[FicheKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => WorkflowError::NotFound,
            RepositoryError::StatusConflict { expected, found } => {
                WorkflowError::StateConflict { expected, found }
            }
            other => WorkflowError::Repository(other),
        }
    }
}

impl From<FicheError> for WorkflowError {
    fn from(value: FicheError) -> Self {
        match value {
            FicheError::Forbidden(reason) => WorkflowError::Forbidden { reason },
            FicheError::Validation(message) => WorkflowError::Validation(message),
            FicheError::NotFound => WorkflowError::NotFound,
            FicheError::Repository(err) => err.into(),
        }
    }
}

impl From<NotificationError> for WorkflowError {
    fn from(value: NotificationError) -> Self {
        match value {
            NotificationError::NotFound => WorkflowError::NotFound,
            NotificationError::Transport(message) => {
                WorkflowError::Repository(RepositoryError::Unavailable(message))
            }
        }
    }
}

/// The listing workflow engine.
///
/// Owns every status change on a listing: it loads current state, consults
/// the authorization guard, checks transition preconditions against the
/// fiche store, and commits through the repository's compare-and-set so a
/// lost race fails closed with `StateConflict`. Notifications and fiche
/// stamps are post-commit follow-ups; their failure never unwinds a
/// committed transition.
pub struct ListingWorkflow<L, F, N> {
    listings: Arc<L>,
    fiches: FicheStore<F>,
    notifications: Arc<N>,
}

impl<L, F, N> ListingWorkflow<L, F, N>
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(listings: Arc<L>, fiches: Arc<F>, notifications: Arc<N>) -> Self {
        Self {
            listings,
            fiches: FicheStore::new(fiches),
            notifications,
        }
    }

    pub fn fiche_store(&self) -> &FicheStore<F> {
        &self.fiches
    }

    /// Create a draft listing owned by the acting user.
    pub fn create(&self, actor: &Actor, new: NewListing) -> Result<Listing, WorkflowError> {
        if !actor.has(Capability::Owner) && !actor.is_admin() {
            return Err(WorkflowError::Forbidden {
                reason: "listing creation requires owner capability".to_string(),
            });
        }
        if new.title.trim().is_empty() {
            return Err(WorkflowError::Validation("title is required".to_string()));
        }

        let listing = Listing::draft(next_listing_id(), actor.id.clone(), new.title, new.visibility);
        Ok(self.listings.insert(listing)?)
    }

    pub fn get(&self, id: &ListingId) -> Result<Listing, WorkflowError> {
        self.listings.fetch(id)?.ok_or(WorkflowError::NotFound)
    }

    /// Owner submits a draft (or a rejected/revision listing) for review.
    pub fn submit(&self, actor: &Actor, id: &ListingId) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Submit)?;

        let observed = listing.status;
        if !matches!(
            observed,
            ListingStatus::Draft | ListingStatus::Rejected | ListingStatus::InRevision
        ) {
            return Err(WorkflowError::InvalidTransition {
                transition: Transition::Submit,
                current: observed,
            });
        }

        let missing = self.fiches.missing_kinds(id)?;
        if !missing.is_empty() {
            return Err(WorkflowError::PreconditionFailed { missing });
        }

        let mut updated = listing;
        updated.status = ListingStatus::Submitted;
        updated.submitted_at = Some(Utc::now());
        updated.validated_at = None;
        updated.published_at = None;

        Ok(self.listings.update_if_status(observed, updated)?)
    }

    /// Reviewer sends a submitted listing back to its owner for changes.
    pub fn request_revision(
        &self,
        actor: &Actor,
        id: &ListingId,
        message: Option<String>,
    ) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::RequestRevision)?;

        let observed = listing.status;
        if observed != ListingStatus::Submitted {
            return Err(WorkflowError::InvalidTransition {
                transition: Transition::RequestRevision,
                current: observed,
            });
        }

        let now = Utc::now();
        let mut updated = listing;
        if updated.agent.is_none() {
            updated.agent = Some(actor.id.clone());
        }
        updated.status = ListingStatus::InRevision;
        updated.validated_at = None;
        updated.published_at = None;

        let stored = self.listings.update_if_status(observed, updated)?;
        self.dispatch(TransitionEvent {
            listing: &stored,
            transition: Transition::RequestRevision,
            detail: message.as_deref(),
            occurred_at: now,
        });
        Ok(stored)
    }

    /// Reviewer validates a submitted listing; all three fiches must exist.
    pub fn validate(&self, actor: &Actor, id: &ListingId) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Validate)?;

        let observed = listing.status;
        if observed != ListingStatus::Submitted {
            return Err(WorkflowError::InvalidTransition {
                transition: Transition::Validate,
                current: observed,
            });
        }

        let missing = self.fiches.missing_kinds(id)?;
        if !missing.is_empty() {
            return Err(WorkflowError::PreconditionFailed { missing });
        }

        let now = Utc::now();
        let mut updated = listing;
        if updated.agent.is_none() {
            updated.agent = Some(actor.id.clone());
        }
        updated.status = ListingStatus::Validated;
        updated.validated_at = Some(now);

        let stored = self.listings.update_if_status(observed, updated)?;
        self.stamp_fiches(&stored.id, &actor.id, now);
        self.dispatch(TransitionEvent {
            listing: &stored,
            transition: Transition::Validate,
            detail: None,
            occurred_at: now,
        });
        Ok(stored)
    }

    /// Reviewer rejects a listing. Agents must give a reason; admins may
    /// omit it.
    pub fn refuse(
        &self,
        actor: &Actor,
        id: &ListingId,
        reason: Option<String>,
    ) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Refuse)?;

        let observed = listing.status;
        if !matches!(
            observed,
            ListingStatus::Submitted | ListingStatus::InRevision
        ) {
            return Err(WorkflowError::InvalidTransition {
                transition: Transition::Refuse,
                current: observed,
            });
        }

        let has_reason = reason.as_deref().is_some_and(|r| !r.trim().is_empty());
        if !actor.is_admin() && !has_reason {
            return Err(WorkflowError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }

        let now = Utc::now();
        let mut updated = listing;
        updated.status = ListingStatus::Rejected;
        updated.validated_at = None;
        updated.published_at = None;

        let stored = self.listings.update_if_status(observed, updated)?;
        self.dispatch(TransitionEvent {
            listing: &stored,
            transition: Transition::Refuse,
            detail: reason.as_deref(),
            occurred_at: now,
        });
        Ok(stored)
    }

    /// Publish a validated listing. Admins may additionally publish straight
    /// from `soumis`, skipping the validated intermediate state and its
    /// fiche-completeness precondition (legacy marketplace behavior, kept
    /// deliberately).
    pub fn publish(&self, actor: &Actor, id: &ListingId) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Publish)?;

        let observed = listing.status;
        match observed {
            ListingStatus::Validated => {}
            ListingStatus::Submitted if actor.is_admin() => {}
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    transition: Transition::Publish,
                    current: observed,
                });
            }
        }

        let now = Utc::now();
        let mut updated = listing;
        if updated.agent.is_none() && !actor.is_admin() {
            updated.agent = Some(actor.id.clone());
        }
        updated.status = ListingStatus::Published;
        updated.published_at = Some(now);
        if updated.validated_at.is_none() {
            updated.validated_at = Some(now);
        }
        updated.visibility = Visibility::Public;

        let stored = self.listings.update_if_status(observed, updated)?;
        self.stamp_fiches(&stored.id, &actor.id, now);
        self.dispatch(TransitionEvent {
            listing: &stored,
            transition: Transition::Publish,
            detail: None,
            occurred_at: now,
        });
        Ok(stored)
    }

    /// Close out a published listing once the sale completes. Terminal.
    pub fn mark_sold(&self, actor: &Actor, id: &ListingId) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::MarkSold)?;

        let observed = listing.status;
        if observed != ListingStatus::Published {
            return Err(WorkflowError::InvalidTransition {
                transition: Transition::MarkSold,
                current: observed,
            });
        }

        let now = Utc::now();
        let mut updated = listing;
        updated.status = ListingStatus::Sold;

        let stored = self.listings.update_if_status(observed, updated)?;
        self.dispatch(TransitionEvent {
            listing: &stored,
            transition: Transition::MarkSold,
            detail: None,
            occurred_at: now,
        });
        Ok(stored)
    }

    /// Admin override: rebind the listing to a different agent mid-cycle.
    pub fn reassign(
        &self,
        actor: &Actor,
        id: &ListingId,
        new_agent: &Actor,
    ) -> Result<Listing, WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Reassign)?;

        if !new_agent.is_reviewer() {
            return Err(WorkflowError::Validation(
                "assigned agent must hold agent or admin capability".to_string(),
            ));
        }

        let observed = listing.status;
        let mut updated = listing;
        updated.agent = Some(new_agent.id.clone());

        Ok(self.listings.update_if_status(observed, updated)?)
    }

    /// Admin-only terminal side channel: remove the listing and its fiches
    /// and tell the owner. Not a state in the FSM.
    pub fn delete(&self, actor: &Actor, id: &ListingId) -> Result<(), WorkflowError> {
        let listing = self.get(id)?;
        self.check(actor, &listing, Transition::Delete)?;

        let removed = self.listings.remove(id)?.ok_or(WorkflowError::NotFound)?;
        if let Err(err) = self.fiches.remove_for_listing(id) {
            warn!(listing = %id, error = %err, "failed to remove fiches for deleted listing");
        }

        self.dispatch(TransitionEvent {
            listing: &removed,
            transition: Transition::Delete,
            detail: None,
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    /// Create or replace fiche content on a listing.
    pub fn upsert_fiche(
        &self,
        actor: &Actor,
        id: &ListingId,
        kind: FicheKind,
        expert_notes: String,
    ) -> Result<Fiche, WorkflowError> {
        let listing = self.get(id)?;
        Ok(self.fiches.upsert(actor, &listing, kind, expert_notes)?)
    }

    /// Record a reviewer conclusion and rating on one fiche.
    pub fn validate_fiche(
        &self,
        actor: &Actor,
        id: &ListingId,
        kind: FicheKind,
        conclusion: String,
        rating: u8,
    ) -> Result<Fiche, WorkflowError> {
        let listing = self.get(id)?;
        Ok(self
            .fiches
            .validate(actor, &listing, kind, conclusion, rating)?)
    }

    pub fn fiches_for(&self, id: &ListingId) -> Result<Vec<Fiche>, WorkflowError> {
        let listing = self.get(id)?;
        Ok(self.fiches.for_listing(&listing.id)?)
    }

    pub fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>, WorkflowError> {
        Ok(self.notifications.for_recipient(recipient)?)
    }

    /// Recipients mark their own notifications read; anyone else gets
    /// `NotFound` rather than a hint the notification exists.
    pub fn mark_notification_read(
        &self,
        actor: &Actor,
        id: &NotificationId,
    ) -> Result<Notification, WorkflowError> {
        Ok(self.notifications.mark_read(id, &actor.id)?)
    }

    fn check(
        &self,
        actor: &Actor,
        listing: &Listing,
        transition: Transition,
    ) -> Result<(), WorkflowError> {
        match authorize(actor, listing, transition) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(WorkflowError::Forbidden {
                reason: reason.to_string(),
            }),
        }
    }

    fn stamp_fiches(&self, id: &ListingId, reviewer: &UserId, at: chrono::DateTime<Utc>) {
        if let Err(err) = self.fiches.stamp_validated(id, reviewer, at) {
            warn!(listing = %id, error = %err, "failed to stamp fiche validation after commit");
        }
    }

    fn dispatch(&self, event: TransitionEvent<'_>) {
        for notification in emitted_for(&event) {
            if let Err(err) = self.notifications.enqueue(notification) {
                warn!(
                    listing = %event.listing.id,
                    transition = %event.transition,
                    error = %err,
                    "failed to enqueue notification; transition already committed"
                );
            }
        }
    }
}
