//! Host collaborator traits
//!
//! The evaluator never owns sessions, minds, mobs or preferences. It reads
//! them through these traits, which the game host implements.

use playtime_api::MobState;
use playtime_util::{EntityId, MindId, TrackerId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A connected player's server-side session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub user_id: UserId,
    pub name: String,
    /// Entity the player currently controls, if any
    pub attached_entity: Option<EntityId>,
    pub whitelisted: bool,
}

impl PlayerSession {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            attached_entity: None,
            whitelisted: false,
        }
    }

    pub fn with_whitelist(mut self, whitelisted: bool) -> Self {
        self.whitelisted = whitelisted;
        self
    }
}

/// A role currently held by a mind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldRole {
    /// Role name (a job id for job roles)
    pub name: String,
    /// Play-time tracker this role accrues, if it has one
    pub tracker: Option<TrackerId>,
}

impl HeldRole {
    pub fn new(name: impl Into<String>, tracker: Option<TrackerId>) -> Self {
        Self {
            name: name.into(),
            tracker,
        }
    }
}

/// A player's selected character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    pub species: String,
}

/// Lookup of connected sessions
pub trait SessionRegistry: Send + Sync {
    /// Session for a connected user
    fn session(&self, user_id: &UserId) -> Option<PlayerSession>;
}

/// Minds and the roles they hold
pub trait MindRegistry: Send + Sync {
    /// Mind owned by a user
    fn mind_of(&self, user_id: &UserId) -> Option<MindId>;

    /// User owning a mind, if that user is connected
    fn user_of(&self, mind: MindId) -> Option<UserId>;

    /// Roles currently held by a mind
    fn roles_of(&self, mind: MindId) -> Vec<HeldRole>;
}

/// Entity component queries
pub trait EntityQuery: Send + Sync {
    /// Life state of an entity. `None` if the entity has no life state.
    fn mob_state(&self, entity: EntityId) -> Option<MobState>;

    /// User whose session controls the entity
    fn controlling_user(&self, entity: EntityId) -> Option<UserId>;
}

pub trait AdminAuthority: Send + Sync {
    fn is_admin(&self, user_id: &UserId) -> bool;
}

pub trait AfkAuthority: Send + Sync {
    fn is_afk(&self, user_id: &UserId) -> bool;
}

/// Character preferences
pub trait PreferencesStore: Send + Sync {
    /// The character the player has selected, if any
    fn selected_character(&self, user_id: &UserId) -> Option<CharacterProfile>;
}

/// Every host collaborator the evaluator needs, as shared trait objects
#[derive(Clone)]
pub struct HostServices {
    pub sessions: Arc<dyn SessionRegistry>,
    pub minds: Arc<dyn MindRegistry>,
    pub entities: Arc<dyn EntityQuery>,
    pub admins: Arc<dyn AdminAuthority>,
    pub afk: Arc<dyn AfkAuthority>,
    pub preferences: Arc<dyn PreferencesStore>,
}

impl HostServices {
    /// Use a single host object for every collaborator
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: SessionRegistry
            + MindRegistry
            + EntityQuery
            + AdminAuthority
            + AfkAuthority
            + PreferencesStore
            + 'static,
    {
        Self {
            sessions: host.clone(),
            minds: host.clone(),
            entities: host.clone(),
            admins: host.clone(),
            afk: host.clone(),
            preferences: host,
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
