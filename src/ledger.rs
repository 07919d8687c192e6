//! Ledger collaborator contract.
//!
//! The ledger (an on-chain match registry) is external. The core only needs
//! the match record it hands out, to decide who plays which role, and it
//! produces a locally observed [`MatchReport`] for a later reporting step.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::game::{Outcome, Role, Side, SimulationState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    /// Creator of the match; plays as host on the left
    pub side_a: String,
    /// Invited opponent; plays as guest on the right. Empty or all-zero when
    /// nobody has been invited yet.
    pub side_b: String,
    pub stake: u128,
    pub outcome_already_finalized: bool,
}

impl MatchRecord {
    /// Resolve the role `identity` plays in this match.
    ///
    /// Identities compare case-insensitively (hex addresses arrive in mixed
    /// case). Fails before any connection is attempted when the identity is
    /// not a participant or the match is already settled.
    pub fn role_for(&self, identity: &str) -> Result<Role, SessionError> {
        if self.outcome_already_finalized {
            return Err(SessionError::AlreadyFinalized(self.match_id.clone()));
        }

        if same_identity(&self.side_a, identity) {
            Ok(Role::Host)
        } else if !is_vacant(&self.side_b) && same_identity(&self.side_b, identity) {
            Ok(Role::Guest)
        } else {
            Err(SessionError::NotAParticipant {
                match_id: self.match_id.clone(),
                identity: identity.to_string(),
            })
        }
    }

    pub fn identity_of(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.side_a,
            Side::Right => &self.side_b,
        }
    }
}

fn same_identity(a: &str, b: &str) -> bool {
    !is_vacant(a) && a.trim().eq_ignore_ascii_case(b.trim())
}

/// Empty string or a zero address
fn is_vacant(identity: &str) -> bool {
    let trimmed = identity.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    digits.chars().all(|c| c == '0')
}

/// Locally observed result, surfaced for reconciliation with the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub match_id: String,
    pub winning_side: Side,
    pub final_score_a: u32,
    pub final_score_b: u32,
}

impl MatchReport {
    /// Build a report from a finished match; None while still in progress
    pub fn from_state(record: &MatchRecord, state: &SimulationState) -> Option<Self> {
        match state.outcome {
            Outcome::InProgress => None,
            Outcome::Finished(winning_side) => Some(Self {
                match_id: record.match_id.clone(),
                winning_side,
                final_score_a: state.score.left,
                final_score_b: state.score.right,
            }),
        }
    }

    pub fn winner_identity<'a>(&self, record: &'a MatchRecord) -> &'a str {
        record.identity_of(self.winning_side)
    }
}
