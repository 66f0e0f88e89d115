//! Lifecycle events (engine -> evaluator) and client messages (service -> clients)

use chrono::{DateTime, Local};
use playtime_util::{EntityId, MindId, UserId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, MobState, TrackerTimes};

/// Engine lifecycle events the evaluator relays to the tracking service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The round is being cleaned up for a restart
    RoundRestartCleanup,

    /// A player's session was attached to an entity
    PlayerAttached { user_id: UserId, entity: EntityId },

    /// A player's session was detached from an entity
    PlayerDetached { user_id: UserId, entity: EntityId },

    /// A player went AFK
    PlayerAfk { user_id: UserId },

    /// A player came back from AFK
    PlayerUnAfk { user_id: UserId },

    /// A role was added to a mind
    RoleAdded { mind: MindId },

    /// A role was removed from a mind
    RoleRemoved { mind: MindId },

    /// A player's admin permissions changed (gained, lost, or re-adminned)
    AdminPermissionsChanged { user_id: UserId },

    /// A mob's life state changed
    MobStateChanged {
        entity: EntityId,
        old_state: MobState,
        new_state: MobState,
    },

    /// A player joined the pre-round lobby
    PlayerJoinedLobby { user_id: UserId },
}

impl LifecycleEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RoundRestartCleanup => "round_restart_cleanup",
            LifecycleEvent::PlayerAttached { .. } => "player_attached",
            LifecycleEvent::PlayerDetached { .. } => "player_detached",
            LifecycleEvent::PlayerAfk { .. } => "player_afk",
            LifecycleEvent::PlayerUnAfk { .. } => "player_un_afk",
            LifecycleEvent::RoleAdded { .. } => "role_added",
            LifecycleEvent::RoleRemoved { .. } => "role_removed",
            LifecycleEvent::AdminPermissionsChanged { .. } => "admin_permissions_changed",
            LifecycleEvent::MobStateChanged { .. } => "mob_state_changed",
            LifecycleEvent::PlayerJoinedLobby { .. } => "player_joined_lobby",
        }
    }
}

/// Event envelope for messages pushed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: ClientMessage,
}

impl Event {
    pub fn new(payload: ClientMessage) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: playtime_util::now(),
            payload,
        }
    }
}

/// Messages the tracking service pushes to a player's client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Current tracker totals, so the client can show locked jobs
    PlayTimes { user_id: UserId, trackers: TrackerTimes },

    /// Whether the player is whitelisted
    Whitelist { user_id: UserId, whitelisted: bool },
}

impl ClientMessage {
    /// The player this message is addressed to
    pub fn user_id(&self) -> UserId {
        match self {
            ClientMessage::PlayTimes { user_id, .. } | ClientMessage::Whitelist { user_id, .. } => {
                *user_id
            }
        }
    }
}
