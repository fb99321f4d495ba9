use super::common::*;
use crate::workflows::listing::authorization::{authorize, Decision, DenyReason};
use crate::workflows::listing::domain::Transition;

#[test]
fn admin_is_allowed_every_transition() {
    let owner = owner();
    let admin = admin();
    for listing in [
        bare_listing(&owner, None),
        bare_listing(&owner, Some(&agent_a())),
    ] {
        for transition in Transition::ordered() {
            assert_eq!(
                authorize(&admin, &listing, transition),
                Decision::Allow,
                "admin denied {transition} unexpectedly"
            );
        }
    }
}

#[test]
fn full_actor_transition_matrix_on_assigned_listing() {
    let owner = owner();
    let assigned = agent_a();
    let listing = bare_listing(&owner, Some(&assigned));

    // (actor, transition, allowed)
    let cases = [
        (owner.clone(), Transition::Submit, true),
        (owner.clone(), Transition::RequestRevision, false),
        (owner.clone(), Transition::Validate, false),
        (owner.clone(), Transition::Refuse, false),
        (owner.clone(), Transition::Publish, false),
        (owner.clone(), Transition::MarkSold, false),
        (owner.clone(), Transition::Reassign, false),
        (owner.clone(), Transition::Delete, false),
        (other_owner(), Transition::Submit, false),
        (other_owner(), Transition::Validate, false),
        (assigned.clone(), Transition::Submit, false),
        (assigned.clone(), Transition::RequestRevision, true),
        (assigned.clone(), Transition::Validate, true),
        (assigned.clone(), Transition::Refuse, true),
        (assigned.clone(), Transition::Publish, true),
        (assigned.clone(), Transition::MarkSold, true),
        (assigned.clone(), Transition::Reassign, false),
        (assigned.clone(), Transition::Delete, false),
        (agent_b(), Transition::RequestRevision, false),
        (agent_b(), Transition::Validate, false),
        (agent_b(), Transition::Refuse, false),
        (agent_b(), Transition::Publish, false),
        (agent_b(), Transition::MarkSold, false),
        (stranger(), Transition::Submit, false),
        (stranger(), Transition::Validate, false),
        (stranger(), Transition::Publish, false),
        (stranger(), Transition::Delete, false),
    ];

    for (actor, transition, allowed) in cases {
        let verdict = authorize(&actor, &listing, transition);
        assert_eq!(
            verdict.is_allowed(),
            allowed,
            "actor {} on {transition}: expected allowed={allowed}, got {verdict:?}",
            actor.id
        );
    }
}

#[test]
fn unassigned_listing_accepts_any_agent_for_review_transitions() {
    let owner = owner();
    let listing = bare_listing(&owner, None);

    for agent in [agent_a(), agent_b()] {
        for transition in [
            Transition::RequestRevision,
            Transition::Validate,
            Transition::Refuse,
            Transition::Publish,
        ] {
            assert_eq!(authorize(&agent, &listing, transition), Decision::Allow);
        }
    }
}

#[test]
fn assigned_listing_denies_other_agents_with_assignment_reason() {
    let owner = owner();
    let listing = bare_listing(&owner, Some(&agent_a()));

    assert_eq!(
        authorize(&agent_b(), &listing, Transition::Publish),
        Decision::Deny(DenyReason::AgentAlreadyAssigned)
    );
}

#[test]
fn owner_may_only_submit_their_own_listing() {
    let owner = owner();
    let listing = bare_listing(&owner, None);

    assert_eq!(
        authorize(&owner, &listing, Transition::Submit),
        Decision::Allow
    );
    assert_eq!(
        authorize(&other_owner(), &listing, Transition::Submit),
        Decision::Deny(DenyReason::NotListingOwner)
    );
    assert_eq!(
        authorize(&stranger(), &listing, Transition::Submit),
        Decision::Deny(DenyReason::MissingCapability(Transition::Submit))
    );
}

#[test]
fn reassign_and_delete_are_admin_only() {
    let owner = owner();
    let listing = bare_listing(&owner, Some(&agent_a()));

    for transition in [Transition::Reassign, Transition::Delete] {
        assert_eq!(
            authorize(&agent_a(), &listing, transition),
            Decision::Deny(DenyReason::AdminOnly(transition))
        );
        assert_eq!(authorize(&admin(), &listing, transition), Decision::Allow);
    }
}

#[test]
fn verdicts_are_deterministic_over_repeated_calls() {
    let owner = owner();
    let listing = bare_listing(&owner, Some(&agent_a()));
    let actors = [owner.clone(), agent_a(), agent_b(), admin(), stranger()];

    for actor in &actors {
        for transition in Transition::ordered() {
            let first = authorize(actor, &listing, transition);
            let second = authorize(actor, &listing, transition);
            assert_eq!(first, second, "verdict changed between identical calls");
        }
    }
}
