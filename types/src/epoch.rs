//! Protocol epochs.
//!
//! Epochs gate validation rules (work thresholds, allowed block forms). An
//! account moves from epoch N to N+1 only via an epoch block signed by the
//! registered epoch signer; the epoch of an account never decreases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version ordinal attached to every account and block sideband.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Epoch {
    #[default]
    Epoch0,
    Epoch1,
    Epoch2,
}

impl Epoch {
    pub const MAX: Self = Epoch::Epoch2;

    /// The next epoch, if any.
    pub fn successor(&self) -> Option<Epoch> {
        match self {
            Epoch::Epoch0 => Some(Epoch::Epoch1),
            Epoch::Epoch1 => Some(Epoch::Epoch2),
            Epoch::Epoch2 => None,
        }
    }

    pub fn as_number(&self) -> u8 {
        match self {
            Epoch::Epoch0 => 0,
            Epoch::Epoch1 => 1,
            Epoch::Epoch2 => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Epoch> {
        match n {
            0 => Some(Epoch::Epoch0),
            1 => Some(Epoch::Epoch1),
            2 => Some(Epoch::Epoch2),
            _ => None,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.as_number())
    }
}
