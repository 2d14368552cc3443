//! Relationship graphs consulted by the sharing policy: friends and clans.
//!
//! Both integrations are optional — a world without them simply never grants
//! friend- or clan-based bypass. Team membership lives on the world itself
//! since it is a host primitive, not an integration.

use std::collections::{BTreeMap, BTreeSet};

use contracts::PlayerId;

// ---------------------------------------------------------------------------
// FriendsRegistry
// ---------------------------------------------------------------------------

/// Directed friendship edges. Sharing requires the friendship to be mutual:
/// a one-sided add never grants bypass.
#[derive(Debug, Clone, Default)]
pub struct FriendsRegistry {
    edges: BTreeSet<(PlayerId, PlayerId)>,
}

impl FriendsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_friend(&mut self, from: PlayerId, to: PlayerId) {
        if from != to {
            self.edges.insert((from, to));
        }
    }

    pub fn remove_friend(&mut self, from: PlayerId, to: PlayerId) {
        self.edges.remove(&(from, to));
    }

    pub fn has_friend(&self, from: PlayerId, to: PlayerId) -> bool {
        self.edges.contains(&(from, to))
    }

    pub fn are_mutual_friends(&self, a: PlayerId, b: PlayerId) -> bool {
        self.has_friend(a, b) && self.has_friend(b, a)
    }
}

// ---------------------------------------------------------------------------
// ClanRegistry
// ---------------------------------------------------------------------------

/// Clan membership plus symmetric alliances between clan tags.
#[derive(Debug, Clone, Default)]
pub struct ClanRegistry {
    member_clan: BTreeMap<PlayerId, String>,
    alliances: BTreeSet<(String, String)>,
}

impl ClanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clan(&mut self, player_id: PlayerId, tag: impl Into<String>) {
        self.member_clan.insert(player_id, tag.into());
    }

    pub fn clear_clan(&mut self, player_id: PlayerId) {
        self.member_clan.remove(&player_id);
    }

    pub fn clan_of(&self, player_id: PlayerId) -> Option<&str> {
        self.member_clan.get(&player_id).map(String::as_str)
    }

    pub fn ally(&mut self, a: impl Into<String>, b: impl Into<String>) {
        let (a, b) = (a.into(), b.into());
        self.alliances.insert((a.clone(), b.clone()));
        self.alliances.insert((b, a));
    }

    pub fn same_clan(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.clan_of(a), self.clan_of(b)) {
            (Some(clan_a), Some(clan_b)) => clan_a == clan_b,
            _ => false,
        }
    }

    /// Same clan, or the two players' clans are allied.
    pub fn is_member_or_ally(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.clan_of(a), self.clan_of(b)) {
            (Some(clan_a), Some(clan_b)) => {
                clan_a == clan_b
                    || self
                        .alliances
                        .contains(&(clan_a.to_string(), clan_b.to_string()))
            }
            _ => false,
        }
    }
}
