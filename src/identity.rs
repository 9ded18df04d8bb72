//! Deciding whether an identity-sensitive event targets the local player.
//!
//! `leave`, `kick` and `ban` look the same on the wire whether they concern us
//! or someone else, but the two cases diverge in both the transition emitted
//! and the side effects (only removing ourselves stops the countdown).

use crate::protocol::Slot;
use crate::transition::LobbyTransition;

/// Returns `true` when the affected identity is the local participant.
///
/// Evaluated fresh for every event; the answer is never cached.
pub fn is_self(affected: &str, local: &str) -> bool {
    affected == local
}

/// The ways a player can be removed from a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Leave,
    Kick,
    Ban,
}

impl Removal {
    /// Notice shown to the local player when they are the one removed.
    /// Leaving voluntarily needs no notice.
    pub fn self_notice(self) -> Option<&'static str> {
        match self {
            Self::Leave => None,
            Self::Kick => Some("You have been kicked from the lobby."),
            Self::Ban => Some("You have been banned from the lobby."),
        }
    }

    /// Transition for the local player having been removed.
    pub fn self_transition(self) -> LobbyTransition {
        match self {
            Self::Leave => LobbyTransition::LeftSelf,
            Self::Kick => LobbyTransition::KickedSelf,
            Self::Ban => LobbyTransition::BannedSelf,
        }
    }

    /// Transition for another player having been removed.
    pub fn other_transition(self, player: Slot) -> LobbyTransition {
        match self {
            Self::Leave => LobbyTransition::Left { player },
            Self::Kick => LobbyTransition::Kicked { player },
            Self::Ban => LobbyTransition::Banned { player },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_comparison_is_exact() {
        assert!(is_self("Alice", "Alice"));
        assert!(!is_self("alice", "Alice"));
        assert!(!is_self("Bob", "Alice"));
    }

    #[test]
    fn only_kick_and_ban_carry_a_notice() {
        assert_eq!(Removal::Leave.self_notice(), None);
        assert!(Removal::Kick.self_notice().is_some());
        assert!(Removal::Ban.self_notice().is_some());
    }
}
