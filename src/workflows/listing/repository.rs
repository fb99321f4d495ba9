use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Fiche, FicheKind, Listing, ListingId, ListingStatus, Notification, NotificationId, UserId,
    Visibility,
};

/// Storage abstraction for listings.
///
/// `update_if_status` is the authoritative commit point of every transition:
/// the write only lands when the stored status still equals the status the
/// engine observed when it checked its guards, which is what makes two
/// racing transitions resolve to exactly one winner.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn update_if_status(
        &self,
        expected: ListingStatus,
        listing: Listing,
    ) -> Result<Listing, RepositoryError>;
    fn remove(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
}

/// Keyed store for expertise records, at most one per (listing, kind).
pub trait FicheRepository: Send + Sync {
    fn upsert(&self, fiche: Fiche) -> Result<Fiche, RepositoryError>;
    fn fetch(&self, listing_id: &ListingId, kind: FicheKind)
        -> Result<Option<Fiche>, RepositoryError>;
    fn for_listing(&self, listing_id: &ListingId) -> Result<Vec<Fiche>, RepositoryError>;
    fn remove_for_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("listing status changed concurrently (expected {expected}, found {found})")]
    StatusConflict {
        expected: ListingStatus,
        found: ListingStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Append-only outbox of user-facing events.
///
/// The engine fires into this sink and never reads it back; a failed
/// enqueue is logged and suppressed rather than rolling back a transition.
pub trait NotificationSink: Send + Sync {
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError>;
    fn for_recipient(&self, recipient: &UserId) -> Result<Vec<Notification>, NotificationError>;
    fn mark_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<Notification, NotificationError>;
}

/// Notification outbox error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,
    #[error("notification outbox unavailable: {0}")]
    Transport(String),
}

/// Sanitized representation of a listing for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub id: ListingId,
    pub title: String,
    pub owner: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<UserId>,
    pub status: &'static str,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            owner: listing.owner.clone(),
            agent: listing.agent.clone(),
            status: listing.status.as_str(),
            visibility: listing.visibility,
            submitted_at: listing.submitted_at,
            validated_at: listing.validated_at,
            published_at: listing.published_at,
        }
    }
}
