use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{Actor, Capability, Fiche, FicheKind, Listing, ListingId, UserId};
use super::repository::{FicheRepository, RepositoryError};

/// Error raised by the fiche store.
#[derive(Debug, thiserror::Error)]
pub enum FicheError {
    #[error("actor may not edit this fiche: {0}")]
    Forbidden(String),
    #[error("invalid fiche validation: {0}")]
    Validation(String),
    #[error("fiche not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Service owning the three expertise records attached to each listing.
///
/// Completeness (`missing_kinds`) feeds the workflow engine's submit and
/// validate preconditions; fiche-level validation is an independent
/// reviewer action that the engine may also apply in bulk when a listing
/// is validated or published.
pub struct FicheStore<F> {
    fiches: Arc<F>,
}

impl<F> Clone for FicheStore<F> {
    fn clone(&self) -> Self {
        Self {
            fiches: Arc::clone(&self.fiches),
        }
    }
}

impl<F> FicheStore<F>
where
    F: FicheRepository,
{
    pub fn new(fiches: Arc<F>) -> Self {
        Self { fiches }
    }

    /// Create or replace the content of one fiche.
    ///
    /// Edits by a non-reviewer invalidate any prior validation stamp: a
    /// validated fiche reworded by the owner must be re-reviewed.
    pub fn upsert(
        &self,
        actor: &Actor,
        listing: &Listing,
        kind: FicheKind,
        expert_notes: String,
    ) -> Result<Fiche, FicheError> {
        ensure_can_edit(actor, listing)?;

        let mut fiche = self
            .fiches
            .fetch(&listing.id, kind)?
            .unwrap_or_else(|| Fiche::new(listing.id.clone(), kind, String::new()));
        fiche.expert_notes = expert_notes;

        if !actor.is_reviewer() {
            fiche.validated_by = None;
            fiche.validated_at = None;
        }

        Ok(self.fiches.upsert(fiche)?)
    }

    /// Record a reviewer's conclusion and rating on one fiche.
    pub fn validate(
        &self,
        actor: &Actor,
        listing: &Listing,
        kind: FicheKind,
        conclusion: String,
        rating: u8,
    ) -> Result<Fiche, FicheError> {
        if !actor.is_reviewer() {
            return Err(FicheError::Forbidden(
                "fiche validation requires agent or admin capability".to_string(),
            ));
        }
        if conclusion.trim().is_empty() {
            return Err(FicheError::Validation("conclusion is required".to_string()));
        }
        if !(1..=5).contains(&rating) {
            return Err(FicheError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let mut fiche = self
            .fiches
            .fetch(&listing.id, kind)?
            .ok_or(FicheError::NotFound)?;
        fiche.conclusion = Some(conclusion);
        fiche.rating = Some(rating);
        fiche.validated_by = Some(actor.id.clone());
        fiche.validated_at = Some(Utc::now());

        Ok(self.fiches.upsert(fiche)?)
    }

    /// Expertise dimensions still missing a record for this listing.
    pub fn missing_kinds(&self, listing_id: &ListingId) -> Result<Vec<FicheKind>, RepositoryError> {
        let present: BTreeSet<FicheKind> = self
            .fiches
            .for_listing(listing_id)?
            .iter()
            .map(|fiche| fiche.kind)
            .collect();

        Ok(FicheKind::ordered()
            .into_iter()
            .filter(|kind| !present.contains(kind))
            .collect())
    }

    pub fn for_listing(&self, listing_id: &ListingId) -> Result<Vec<Fiche>, RepositoryError> {
        self.fiches.for_listing(listing_id)
    }

    /// Stamp every un-validated fiche as validated by `reviewer`.
    ///
    /// Used by the engine after a listing-level validate/publish commits;
    /// already-validated fiches keep their original stamp.
    pub(crate) fn stamp_validated(
        &self,
        listing_id: &ListingId,
        reviewer: &UserId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        for mut fiche in self.fiches.for_listing(listing_id)? {
            if !fiche.is_validated() {
                fiche.validated_by = Some(reviewer.clone());
                fiche.validated_at = Some(at);
                self.fiches.upsert(fiche)?;
            }
        }
        Ok(())
    }

    pub(crate) fn remove_for_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError> {
        self.fiches.remove_for_listing(listing_id)
    }
}

fn ensure_can_edit(actor: &Actor, listing: &Listing) -> Result<(), FicheError> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.has(Capability::Agent) {
        return match &listing.agent {
            None => Ok(()),
            Some(assigned) if *assigned == actor.id => Ok(()),
            Some(_) => Err(FicheError::Forbidden(
                "listing is assigned to another agent".to_string(),
            )),
        };
    }
    if actor.has(Capability::Owner) && actor.id == listing.owner {
        return Ok(());
    }
    Err(FicheError::Forbidden(
        "fiche edits require the listing owner, an agent, or an admin".to_string(),
    ))
}
