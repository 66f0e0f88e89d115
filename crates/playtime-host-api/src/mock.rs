//! In-memory host for tests and the playtimed harness

use playtime_api::MobState;
use playtime_util::{EntityId, MindId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::{
    AdminAuthority, AfkAuthority, CharacterProfile, EntityQuery, HeldRole, MindRegistry,
    PlayerSession, PreferencesStore, SessionRegistry,
};

#[derive(Debug, Default)]
struct WorldState {
    sessions: HashMap<UserId, PlayerSession>,
    admins: HashSet<UserId>,
    afk: HashSet<UserId>,
    minds: HashMap<UserId, MindId>,
    roles: HashMap<MindId, Vec<HeldRole>>,
    mobs: HashMap<EntityId, MobState>,
    characters: HashMap<UserId, CharacterProfile>,
    next_mind: u64,
}

/// A whole game world in memory, implementing every host trait
///
/// Minds outlive sessions: a player who reconnects gets their old mind and
/// roles back, as they would in a real round.
#[derive(Debug, Default)]
pub struct MockWorld {
    state: Mutex<WorldState>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Connect a player. Reconnecting replaces the previous session.
    pub fn connect(&self, user_id: UserId, name: impl Into<String>, whitelisted: bool) -> PlayerSession {
        let session = PlayerSession::new(user_id, name).with_whitelist(whitelisted);
        self.with_state(|s| {
            s.sessions.insert(user_id, session.clone());
        });
        session
    }

    /// Disconnect a player. Admin and AFK flags go with the session.
    pub fn disconnect(&self, user_id: &UserId) -> Option<PlayerSession> {
        self.with_state(|s| {
            s.admins.remove(user_id);
            s.afk.remove(user_id);
            s.sessions.remove(user_id)
        })
    }

    /// Attach a player to an entity, returning the entity it was attached to before
    pub fn attach(&self, user_id: &UserId, entity: EntityId) -> Option<Option<EntityId>> {
        self.with_state(|s| {
            let session = s.sessions.get_mut(user_id)?;
            Some(session.attached_entity.replace(entity))
        })
    }

    /// Detach a player from its entity, returning that entity
    pub fn detach(&self, user_id: &UserId) -> Option<EntityId> {
        self.with_state(|s| s.sessions.get_mut(user_id)?.attached_entity.take())
    }

    pub fn set_admin(&self, user_id: UserId, admin: bool) {
        self.with_state(|s| {
            if admin {
                s.admins.insert(user_id);
            } else {
                s.admins.remove(&user_id);
            }
        });
    }

    pub fn set_afk(&self, user_id: UserId, afk: bool) {
        self.with_state(|s| {
            if afk {
                s.afk.insert(user_id);
            } else {
                s.afk.remove(&user_id);
            }
        });
    }

    /// Give an entity a life state, returning the previous one
    pub fn set_mob_state(&self, entity: EntityId, state: MobState) -> Option<MobState> {
        self.with_state(|s| s.mobs.insert(entity, state))
    }

    /// Strip an entity's life state component
    pub fn remove_mob_state(&self, entity: EntityId) -> Option<MobState> {
        self.with_state(|s| s.mobs.remove(&entity))
    }

    /// Mind of a user, creating one if the user has none yet
    fn ensure_mind_locked(s: &mut WorldState, user_id: UserId) -> MindId {
        if let Some(mind) = s.minds.get(&user_id) {
            return *mind;
        }
        s.next_mind += 1;
        let mind = MindId::new(s.next_mind);
        s.minds.insert(user_id, mind);
        mind
    }

    /// Give a role to the user's mind, returning the mind
    pub fn add_role(&self, user_id: UserId, role: HeldRole) -> MindId {
        self.with_state(|s| {
            let mind = Self::ensure_mind_locked(s, user_id);
            s.roles.entry(mind).or_default().push(role);
            mind
        })
    }

    /// Take a role by name from the user's mind, returning the mind if a role was removed
    pub fn remove_role(&self, user_id: &UserId, name: &str) -> Option<MindId> {
        self.with_state(|s| {
            let mind = *s.minds.get(user_id)?;
            let roles = s.roles.get_mut(&mind)?;
            let index = roles.iter().position(|r| r.name == name)?;
            roles.remove(index);
            Some(mind)
        })
    }

    pub fn select_character(&self, user_id: UserId, profile: CharacterProfile) {
        self.with_state(|s| {
            s.characters.insert(user_id, profile);
        });
    }
}

impl SessionRegistry for MockWorld {
    fn session(&self, user_id: &UserId) -> Option<PlayerSession> {
        self.with_state(|s| s.sessions.get(user_id).cloned())
    }
}

impl MindRegistry for MockWorld {
    fn mind_of(&self, user_id: &UserId) -> Option<MindId> {
        self.with_state(|s| s.minds.get(user_id).copied())
    }

    fn user_of(&self, mind: MindId) -> Option<UserId> {
        self.with_state(|s| {
            s.minds
                .iter()
                .find(|(user_id, m)| **m == mind && s.sessions.contains_key(*user_id))
                .map(|(user_id, _)| *user_id)
        })
    }

    fn roles_of(&self, mind: MindId) -> Vec<HeldRole> {
        self.with_state(|s| s.roles.get(&mind).cloned().unwrap_or_default())
    }
}

impl EntityQuery for MockWorld {
    fn mob_state(&self, entity: EntityId) -> Option<MobState> {
        self.with_state(|s| s.mobs.get(&entity).copied())
    }

    fn controlling_user(&self, entity: EntityId) -> Option<UserId> {
        self.with_state(|s| {
            s.sessions
                .values()
                .find(|session| session.attached_entity == Some(entity))
                .map(|session| session.user_id)
        })
    }
}

impl AdminAuthority for MockWorld {
    fn is_admin(&self, user_id: &UserId) -> bool {
        self.with_state(|s| s.admins.contains(user_id))
    }
}

impl AfkAuthority for MockWorld {
    fn is_afk(&self, user_id: &UserId) -> bool {
        self.with_state(|s| s.afk.contains(user_id))
    }
}

impl PreferencesStore for MockWorld {
    fn selected_character(&self, user_id: &UserId) -> Option<CharacterProfile> {
        self.with_state(|s| s.characters.get(user_id).cloned())
    }
}
