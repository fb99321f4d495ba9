use std::fmt;

use serde::Serialize;

use super::domain::{Actor, Capability, Listing, Transition};

/// Verdict returned by [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Actor holds none of the capabilities that may request this transition.
    MissingCapability(Transition),
    /// Submit may only be requested by the listing's own owner.
    NotListingOwner,
    /// The listing already has an assigned agent and the actor is not them.
    AgentAlreadyAssigned,
    /// Reserved for administrators.
    AdminOnly(Transition),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingCapability(transition) => {
                write!(f, "actor lacks the capability required for {transition}")
            }
            DenyReason::NotListingOwner => {
                write!(f, "only the listing owner may submit it for review")
            }
            DenyReason::AgentAlreadyAssigned => {
                write!(f, "listing is assigned to another agent")
            }
            DenyReason::AdminOnly(transition) => {
                write!(f, "{transition} requires admin capability")
            }
        }
    }
}

/// Pure authorization predicate for the listing workflow.
///
/// Total over every (actor, listing, transition) triple and side-effect
/// free, so the full role x transition matrix can be table-tested. Rules in
/// priority order: admin always wins; agents act on unassigned listings or
/// their own assignments; owners may only submit their own listing;
/// everything else is denied.
pub fn authorize(actor: &Actor, listing: &Listing, transition: Transition) -> Decision {
    if actor.has(Capability::Admin) {
        return Decision::Allow;
    }

    match transition {
        Transition::Submit => {
            if actor.has(Capability::Owner) && actor.id == listing.owner {
                Decision::Allow
            } else if actor.has(Capability::Owner) {
                Decision::Deny(DenyReason::NotListingOwner)
            } else {
                Decision::Deny(DenyReason::MissingCapability(transition))
            }
        }
        Transition::RequestRevision
        | Transition::Validate
        | Transition::Refuse
        | Transition::Publish
        | Transition::MarkSold => {
            if !actor.has(Capability::Agent) {
                return Decision::Deny(DenyReason::MissingCapability(transition));
            }
            match &listing.agent {
                None => Decision::Allow,
                Some(assigned) if *assigned == actor.id => Decision::Allow,
                Some(_) => Decision::Deny(DenyReason::AgentAlreadyAssigned),
            }
        }
        Transition::Reassign | Transition::Delete => {
            Decision::Deny(DenyReason::AdminOnly(transition))
        }
    }
}
