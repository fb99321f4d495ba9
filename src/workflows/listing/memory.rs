//! In-memory reference implementations of the storage traits.
//!
//! These back the demo CLI and the default server state, and double as the
//! fakes the workflow tests run against. The listing store implements the
//! compare-and-set contract under a single lock, which is enough to give
//! racing transitions exactly one winner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{
    Fiche, FicheKind, Listing, ListingId, ListingStatus, Notification, NotificationId, UserId,
};
use super::repository::{
    FicheRepository, ListingRepository, NotificationError, NotificationSink, RepositoryError,
};

#[derive(Default, Clone)]
pub struct MemoryListings {
    records: Arc<Mutex<HashMap<ListingId, Listing>>>,
}

impl ListingRepository for MemoryListings {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut guard = self.records.lock().expect("listing store mutex poisoned");
        if guard.contains_key(&listing.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let guard = self.records.lock().expect("listing store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_if_status(
        &self,
        expected: ListingStatus,
        listing: Listing,
    ) -> Result<Listing, RepositoryError> {
        let mut guard = self.records.lock().expect("listing store mutex poisoned");
        let current = guard.get(&listing.id).ok_or(RepositoryError::NotFound)?;
        if current.status != expected {
            return Err(RepositoryError::StatusConflict {
                expected,
                found: current.status,
            });
        }
        guard.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    fn remove(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let mut guard = self.records.lock().expect("listing store mutex poisoned");
        Ok(guard.remove(id))
    }
}

#[derive(Default, Clone)]
pub struct MemoryFiches {
    records: Arc<Mutex<HashMap<(ListingId, FicheKind), Fiche>>>,
}

impl FicheRepository for MemoryFiches {
    fn upsert(&self, fiche: Fiche) -> Result<Fiche, RepositoryError> {
        let mut guard = self.records.lock().expect("fiche store mutex poisoned");
        guard.insert((fiche.listing_id.clone(), fiche.kind), fiche.clone());
        Ok(fiche)
    }

    fn fetch(
        &self,
        listing_id: &ListingId,
        kind: FicheKind,
    ) -> Result<Option<Fiche>, RepositoryError> {
        let guard = self.records.lock().expect("fiche store mutex poisoned");
        Ok(guard.get(&(listing_id.clone(), kind)).cloned())
    }

    fn for_listing(&self, listing_id: &ListingId) -> Result<Vec<Fiche>, RepositoryError> {
        let guard = self.records.lock().expect("fiche store mutex poisoned");
        let mut fiches: Vec<Fiche> = guard
            .values()
            .filter(|fiche| fiche.listing_id == *listing_id)
            .cloned()
            .collect();
        fiches.sort_by_key(|fiche| fiche.kind);
        Ok(fiches)
    }

    fn remove_for_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("fiche store mutex poisoned");
        guard.retain(|(id, _), _| id != listing_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct MemoryNotifications {
    records: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    /// Everything enqueued so far, in arrival order. Test hook.
    pub fn all(&self) -> Vec<Notification> {
        self.records
            .lock()
            .expect("notification outbox mutex poisoned")
            .clone()
    }
}

impl NotificationSink for MemoryNotifications {
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.records
            .lock()
            .expect("notification outbox mutex poisoned")
            .push(notification);
        Ok(())
    }

    fn for_recipient(&self, recipient: &UserId) -> Result<Vec<Notification>, NotificationError> {
        let guard = self
            .records
            .lock()
            .expect("notification outbox mutex poisoned");
        Ok(guard
            .iter()
            .filter(|notification| notification.recipient == *recipient)
            .cloned()
            .collect())
    }

    fn mark_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<Notification, NotificationError> {
        let mut guard = self
            .records
            .lock()
            .expect("notification outbox mutex poisoned");
        let notification = guard
            .iter_mut()
            .find(|notification| notification.id == *id && notification.recipient == *recipient)
            .ok_or(NotificationError::NotFound)?;
        notification.read = true;
        Ok(notification.clone())
    }
}
