//! Mark kinds and their on-disk entry shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marks applied to a session id. Any mark disqualifies the id from
/// resume/recovery; `claimed` additionally blocks double payouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMark {
    Closed,
    Claimed,
    Killed,
}

impl fmt::Display for SessionMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionMark::Closed => "closed",
            SessionMark::Claimed => "claimed",
            SessionMark::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

/// Marks applied to a payout address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMark {
    Used,
}

impl fmt::Display for AddressMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "used")
    }
}

/// One key's marks plus the last-touched timestamp the sweep uses.
/// Field names are kept short because this struct is the bulk of the file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkEntry<M> {
    #[serde(rename = "m")]
    pub marks: Vec<M>,
    #[serde(rename = "t")]
    pub touched: u64,
}
