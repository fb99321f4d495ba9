use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use super::domain::{Listing, Notification, NotificationId, NotificationKind, Transition};

static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_notification_id() -> NotificationId {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NotificationId(format!("ntf-{id:06}"))
}

/// A committed transition, as seen by the notification hooks.
pub struct TransitionEvent<'a> {
    pub listing: &'a Listing,
    pub transition: Transition,
    pub detail: Option<&'a str>,
    pub occurred_at: DateTime<Utc>,
}

type Hook = fn(&TransitionEvent<'_>) -> Option<Notification>;

/// Post-transition hook list. Adding a notification type means adding a
/// hook here; transition logic in the engine stays untouched.
const HOOKS: &[Hook] = &[
    revision_requested,
    listing_validated,
    listing_rejected,
    listing_published,
    listing_sold,
    listing_deleted,
];

/// Notifications to enqueue for a committed transition.
pub(crate) fn emitted_for(event: &TransitionEvent<'_>) -> Vec<Notification> {
    HOOKS.iter().filter_map(|hook| hook(event)).collect()
}

fn owner_notification(
    event: &TransitionEvent<'_>,
    kind: NotificationKind,
    title: &str,
    message: String,
    link: Option<String>,
) -> Notification {
    Notification {
        id: next_notification_id(),
        recipient: event.listing.owner.clone(),
        kind,
        title: title.to_string(),
        message,
        link,
        read: false,
        created_at: event.occurred_at,
    }
}

fn listing_link(listing: &Listing) -> Option<String> {
    Some(format!("/listings/{}", listing.id))
}

fn revision_requested(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::RequestRevision {
        return None;
    }
    let message = match event.detail {
        Some(detail) => format!(
            "Your listing '{}' needs changes before review can continue: {detail}",
            event.listing.title
        ),
        None => format!(
            "Your listing '{}' needs changes before review can continue.",
            event.listing.title
        ),
    };
    Some(owner_notification(
        event,
        NotificationKind::RevisionRequested,
        "Revision requested",
        message,
        listing_link(event.listing),
    ))
}

fn listing_validated(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::Validate {
        return None;
    }
    Some(owner_notification(
        event,
        NotificationKind::ListingValidated,
        "Listing validated",
        format!(
            "Your listing '{}' passed expert review and is ready for publication.",
            event.listing.title
        ),
        listing_link(event.listing),
    ))
}

fn listing_rejected(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::Refuse {
        return None;
    }
    let message = match event.detail {
        Some(reason) => format!("Your listing '{}' was rejected: {reason}", event.listing.title),
        None => format!("Your listing '{}' was rejected.", event.listing.title),
    };
    Some(owner_notification(
        event,
        NotificationKind::ListingRejected,
        "Listing rejected",
        message,
        listing_link(event.listing),
    ))
}

fn listing_published(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::Publish {
        return None;
    }
    Some(owner_notification(
        event,
        NotificationKind::ListingPublished,
        "Listing published",
        format!(
            "Your listing '{}' is now publicly visible on the marketplace.",
            event.listing.title
        ),
        listing_link(event.listing),
    ))
}

fn listing_sold(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::MarkSold {
        return None;
    }
    Some(owner_notification(
        event,
        NotificationKind::ListingSold,
        "Listing sold",
        format!("Your listing '{}' has been marked as sold.", event.listing.title),
        listing_link(event.listing),
    ))
}

fn listing_deleted(event: &TransitionEvent<'_>) -> Option<Notification> {
    if event.transition != Transition::Delete {
        return None;
    }
    // The listing is gone once this fires, so no link back to it.
    Some(owner_notification(
        event,
        NotificationKind::ListingDeleted,
        "Listing deleted",
        format!(
            "Your listing '{}' was removed by an administrator.",
            event.listing.title
        ),
        None,
    ))
}
