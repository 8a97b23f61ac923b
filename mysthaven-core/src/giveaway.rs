//! Giveaway transition guards.
//!
//! Pure checks over a loaded record. The storage layer repeats each guard as
//! a conditional filter on the atomic update, so these only decide which
//! error to report.

use crate::{Giveaway, GiveawayStatus, StateError};

/// Minimum number of participants before a winner can be rerolled.
pub const MIN_REROLL_PARTICIPANTS: usize = 2;

pub fn check_can_join(giveaway: &Giveaway, user_id: &str) -> Result<(), StateError> {
    if giveaway.status == GiveawayStatus::Ended {
        return Err(StateError::GiveawayEnded {
            giveaway_id: giveaway.giveaway_id.clone(),
        });
    }
    if giveaway.has_participant(user_id) {
        return Err(StateError::AlreadyJoined {
            giveaway_id: giveaway.giveaway_id.clone(),
            user_id: user_id.to_string(),
        });
    }
    Ok(())
}

pub fn check_can_leave(giveaway: &Giveaway) -> Result<(), StateError> {
    if giveaway.status == GiveawayStatus::Ended {
        return Err(StateError::GiveawayEnded {
            giveaway_id: giveaway.giveaway_id.clone(),
        });
    }
    Ok(())
}

pub fn check_can_end(giveaway: &Giveaway) -> Result<(), StateError> {
    check_can_leave(giveaway)
}

pub fn check_can_reroll(giveaway: &Giveaway) -> Result<(), StateError> {
    if giveaway.status != GiveawayStatus::Ended {
        return Err(StateError::GiveawayActive {
            giveaway_id: giveaway.giveaway_id.clone(),
        });
    }
    if giveaway.participants.len() < MIN_REROLL_PARTICIPANTS {
        return Err(StateError::NotEnoughParticipants {
            giveaway_id: giveaway.giveaway_id.clone(),
            count: giveaway.participants.len(),
            required: MIN_REROLL_PARTICIPANTS,
        });
    }
    Ok(())
}

/// Participants eligible in a reroll: everyone except the current winner.
pub fn reroll_pool(giveaway: &Giveaway) -> Vec<String> {
    giveaway
        .participants
        .iter()
        .filter(|p| giveaway.winner.as_deref() != Some(p.as_str()))
        .cloned()
        .collect()
}
