//! Votes on a finished side-by-side comparison

use crate::error::VoteError;
use crate::streaming::{DualState, Side};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which output the user preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum VoteChoice {
    ModelA,
    ModelB,
    Tie,
    BothBad,
}

impl FromStr for VoteChoice {
    type Err = VoteError;

    /// Parse console input such as `a`, `B`, `tie` or `both_bad`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "a" | "model_a" => Ok(VoteChoice::ModelA),
            "b" | "model_b" => Ok(VoteChoice::ModelB),
            "t" | "tie" => Ok(VoteChoice::Tie),
            "bad" | "both_bad" => Ok(VoteChoice::BothBad),
            other => Err(VoteError::UnknownChoice(other.to_string())),
        }
    }
}

/// Request body for `POST /votes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Ballot {
    pub(crate) output_a_id: String,
    pub(crate) output_b_id: String,
    pub(crate) winner: VoteChoice,
}

impl Ballot {
    /// Build a ballot from a finished comparison.
    ///
    /// Both models must be complete, error-free and carry an output id.
    pub(crate) fn from_state(state: &DualState, winner: VoteChoice) -> Result<Self, VoteError> {
        if !state.both_complete() {
            return Err(VoteError::NotComplete);
        }
        for side in Side::BOTH {
            if state.side(side).error.is_some() {
                return Err(VoteError::ModelFailed(side));
            }
        }
        let output_id = |side: Side| {
            state
                .side(side)
                .output_id
                .clone()
                .ok_or(VoteError::MissingOutputId(side))
        };

        Ok(Self {
            output_a_id: output_id(Side::A)?,
            output_b_id: output_id(Side::B)?,
            winner,
        })
    }
}
