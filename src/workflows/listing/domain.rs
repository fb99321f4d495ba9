use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub String);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for marketplace users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities granted to a marketplace user by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Owner,
    Agent,
    Admin,
}

/// Opaque actor descriptor threaded into every workflow call.
///
/// The core never consults ambient identity state; callers resolve the
/// authenticated user into this descriptor before invoking the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub capabilities: BTreeSet<Capability>,
}

impl Actor {
    pub fn new(id: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            id: UserId(id.into()),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_admin(&self) -> bool {
        self.has(Capability::Admin)
    }

    /// Whether the actor may stamp review outcomes (agent or admin).
    pub fn is_reviewer(&self) -> bool {
        self.has(Capability::Agent) || self.has(Capability::Admin)
    }
}

/// Review status of a listing. Wire labels keep the legacy French tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingStatus {
    #[serde(rename = "brouillon")]
    Draft,
    #[serde(rename = "soumis")]
    Submitted,
    #[serde(rename = "en_revision")]
    InRevision,
    #[serde(rename = "valide")]
    Validated,
    #[serde(rename = "refuse")]
    Rejected,
    #[serde(rename = "publie")]
    Published,
    #[serde(rename = "vendu")]
    Sold,
}

impl ListingStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Draft,
            Self::Submitted,
            Self::InRevision,
            Self::Validated,
            Self::Rejected,
            Self::Published,
            Self::Sold,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "brouillon",
            Self::Submitted => "soumis",
            Self::InRevision => "en_revision",
            Self::Validated => "valide",
            Self::Rejected => "refuse",
            Self::Published => "publie",
            Self::Sold => "vendu",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Restricted,
}

/// The central marketplace entity: one land listing under review.
///
/// `status` is mutated exclusively by the workflow engine; the timestamp
/// trio is set at most once per review cycle and cleared together on
/// rejection or revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub owner: UserId,
    pub agent: Option<UserId>,
    pub status: ListingStatus,
    pub visibility: Visibility,
    pub submitted_at: Option<DateTime<Utc>>,
    pub validated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Fresh draft owned by `owner`; the only way a listing enters the FSM.
    pub fn draft(id: ListingId, owner: UserId, title: String, visibility: Visibility) -> Self {
        Self {
            id,
            title,
            owner,
            agent: None,
            status: ListingStatus::Draft,
            visibility,
            submitted_at: None,
            validated_at: None,
            published_at: None,
        }
    }
}

/// The three expertise dimensions reviewed on every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FicheKind {
    Technique,
    Financiere,
    Juridique,
}

impl FicheKind {
    pub const fn ordered() -> [Self; 3] {
        [Self::Technique, Self::Financiere, Self::Juridique]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technique => "technique",
            Self::Financiere => "financiere",
            Self::Juridique => "juridique",
        }
    }
}

impl fmt::Display for FicheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FicheKind {
    type Err = UnknownFicheKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "technique" => Ok(Self::Technique),
            "financiere" => Ok(Self::Financiere),
            "juridique" => Ok(Self::Juridique),
            other => Err(UnknownFicheKind(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown fiche kind '{0}'")]
pub struct UnknownFicheKind(pub String);

/// Expertise record attached to a listing, at most one per kind.
///
/// The validation stamp is privileged: only agents/admins set it, and edits
/// by anyone else clear it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiche {
    pub listing_id: ListingId,
    pub kind: FicheKind,
    pub expert_notes: String,
    pub conclusion: Option<String>,
    pub rating: Option<u8>,
    pub validated_by: Option<UserId>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl Fiche {
    pub fn new(listing_id: ListingId, kind: FicheKind, expert_notes: String) -> Self {
        Self {
            listing_id,
            kind,
            expert_notes,
            conclusion: None,
            rating: None,
            validated_by: None,
            validated_at: None,
        }
    }

    pub fn is_validated(&self) -> bool {
        self.validated_at.is_some()
    }
}

/// Identifier wrapper for notification records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RevisionRequested,
    ListingValidated,
    ListingRejected,
    ListingPublished,
    ListingSold,
    ListingDeleted,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RevisionRequested => "revision_requested",
            Self::ListingValidated => "listing_validated",
            Self::ListingRejected => "listing_rejected",
            Self::ListingPublished => "listing_published",
            Self::ListingSold => "listing_sold",
            Self::ListingDeleted => "listing_deleted",
        }
    }
}

/// Append-only user-facing event; `read` is the only mutable field after
/// creation and only the recipient flips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Guarded state changes requestable on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Submit,
    RequestRevision,
    Validate,
    Refuse,
    Publish,
    MarkSold,
    Reassign,
    Delete,
}

impl Transition {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Submit,
            Self::RequestRevision,
            Self::Validate,
            Self::Refuse,
            Self::Publish,
            Self::MarkSold,
            Self::Reassign,
            Self::Delete,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::RequestRevision => "request_revision",
            Self::Validate => "validate",
            Self::Refuse => "refuse",
            Self::Publish => "publish",
            Self::MarkSold => "mark_sold",
            Self::Reassign => "reassign",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
