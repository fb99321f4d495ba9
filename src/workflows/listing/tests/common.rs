use std::sync::Arc;

use crate::workflows::listing::domain::{
    Actor, Capability, FicheKind, Listing, ListingId, Notification, NotificationId, UserId,
    Visibility,
};
use crate::workflows::listing::engine::{ListingWorkflow, NewListing};
use crate::workflows::listing::memory::{MemoryFiches, MemoryListings, MemoryNotifications};
use crate::workflows::listing::repository::{
    FicheRepository, ListingRepository, NotificationError, NotificationSink,
};

pub(super) type MemoryWorkflow = ListingWorkflow<MemoryListings, MemoryFiches, MemoryNotifications>;

pub(super) fn owner() -> Actor {
    Actor::new("owner-1", [Capability::Owner])
}

pub(super) fn other_owner() -> Actor {
    Actor::new("owner-2", [Capability::Owner])
}

pub(super) fn agent_a() -> Actor {
    Actor::new("agent-a", [Capability::Agent])
}

pub(super) fn agent_b() -> Actor {
    Actor::new("agent-b", [Capability::Agent])
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", [Capability::Admin])
}

pub(super) fn stranger() -> Actor {
    Actor::new("visitor-1", [] as [Capability; 0])
}

pub(super) fn build_engine() -> (
    MemoryWorkflow,
    Arc<MemoryListings>,
    Arc<MemoryFiches>,
    Arc<MemoryNotifications>,
) {
    let listings = Arc::new(MemoryListings::default());
    let fiches = Arc::new(MemoryFiches::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let engine = ListingWorkflow::new(listings.clone(), fiches.clone(), notifications.clone());
    (engine, listings, fiches, notifications)
}

pub(super) fn draft_listing<L, F, N>(engine: &ListingWorkflow<L, F, N>, owner: &Actor) -> Listing
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    engine
        .create(
            owner,
            NewListing {
                title: "Plot 12, Vallee du Draa".to_string(),
                visibility: Visibility::Private,
            },
        )
        .expect("draft created")
}

pub(super) fn add_all_fiches<L, F, N>(
    engine: &ListingWorkflow<L, F, N>,
    actor: &Actor,
    listing: &Listing,
) where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    for kind in FicheKind::ordered() {
        engine
            .upsert_fiche(actor, &listing.id, kind, format!("{kind} notes"))
            .expect("fiche created");
    }
}

pub(super) fn submitted_listing<L, F, N>(engine: &ListingWorkflow<L, F, N>, owner: &Actor) -> Listing
where
    L: ListingRepository + 'static,
    F: FicheRepository + 'static,
    N: NotificationSink + 'static,
{
    let listing = draft_listing(engine, owner);
    add_all_fiches(engine, owner, &listing);
    engine.submit(owner, &listing.id).expect("submit succeeds")
}

/// Listing fixture for exercising the pure guard without an engine.
pub(super) fn bare_listing(owner: &Actor, agent: Option<&Actor>) -> Listing {
    let mut listing = Listing::draft(
        ListingId("lst-guard".to_string()),
        owner.id.clone(),
        "Guard fixture".to_string(),
        Visibility::Private,
    );
    listing.agent = agent.map(|actor| actor.id.clone());
    listing
}

/// Sink whose enqueue always fails, to prove transitions never depend on
/// notification delivery.
pub(super) struct FailingNotifications;

impl NotificationSink for FailingNotifications {
    fn enqueue(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("outbox offline".to_string()))
    }

    fn for_recipient(&self, _recipient: &UserId) -> Result<Vec<Notification>, NotificationError> {
        Ok(Vec::new())
    }

    fn mark_read(
        &self,
        _id: &NotificationId,
        _recipient: &UserId,
    ) -> Result<Notification, NotificationError> {
        Err(NotificationError::NotFound)
    }
}
