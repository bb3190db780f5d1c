//! Identity types, chat permission tiers, and operation codes.
//!
//! These are the small value types every other crate speaks in. They are
//! all `Copy` (or nearly so) and serialize to exactly the JSON shape the
//! browser client expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's 64-bit Steam identity.
///
/// Newtype over `u64` so it can't be confused with a [`ServerId`] or a
/// message id. On the wire it is a *string* (`"76561197960265729"`):
/// JavaScript numbers lose precision above 2^53, and Steam IDs live far
/// above that. Decoding also accepts a plain number for leniency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "SteamIdRepr")]
pub struct SteamId(u64);

impl SteamId {
    /// The lowest 64-bit id of an individual account in the public
    /// universe. Anything below it is not a player.
    pub const INDIVIDUAL_BASE: u64 = 76_561_197_960_265_728;

    /// Wraps a raw 64-bit id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Builds the id of the individual account with the given account
    /// number (the "32-bit" id).
    pub const fn from_account(account: u32) -> Self {
        Self(Self::INDIVIDUAL_BASE + account as u64)
    }

    /// Returns the raw 64-bit id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this id names an individual account.
    pub fn is_valid(self) -> bool {
        self.0 > Self::INDIVIDUAL_BASE && self.0 < Self::INDIVIDUAL_BASE + (1 << 32)
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self).map_err(|_| {
            ProtocolError::InvalidMessage(format!("invalid steam id {s:?}"))
        })
    }
}

impl From<SteamId> for String {
    fn from(id: SteamId) -> Self {
        id.to_string()
    }
}

/// Accepted JSON forms of a [`SteamId`].
#[derive(Deserialize)]
#[serde(untagged)]
enum SteamIdRepr {
    Text(String),
    Number(u64),
}

impl TryFrom<SteamIdRepr> for SteamId {
    type Error = ProtocolError;

    fn try_from(repr: SteamIdRepr) -> Result<Self, Self::Error> {
        match repr {
            SteamIdRepr::Text(text) => text.parse(),
            SteamIdRepr::Number(n) => Ok(Self(n)),
        }
    }
}

/// Identifier of a game server, and therefore of its lobby.
///
/// `#[serde(transparent)]` keeps it a plain integer on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServerId(pub u32);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChatStatus
// ---------------------------------------------------------------------------

/// A user's chat permission tier.
///
/// - `Readwrite`: sees and posts messages.
/// - `Readonly`: sees messages, cannot post.
/// - `Noaccess`: neither; still receives queue state, match starts and
///   the shutdown notice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Readwrite,
    Readonly,
    Noaccess,
}

impl ChatStatus {
    /// True unless the tier is `Noaccess`.
    pub fn has_message_access(self) -> bool {
        self != Self::Noaccess
    }

    /// Only `Readwrite` may post.
    pub fn can_post(self) -> bool {
        self == Self::Readwrite
    }

    /// The wire name of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readwrite => "readwrite",
            Self::Readonly => "readonly",
            Self::Noaccess => "noaccess",
        }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Op
// ---------------------------------------------------------------------------

/// Wire-protocol operation discriminant.
///
/// Serialized as its integer code. Decoding an integer goes through
/// [`TryFrom<i64>`], which rejects anything outside the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Op {
    JoinQueue = 0,
    LeaveQueue = 1,
    Message = 2,
    StateUpdate = 3,
    StartGame = 4,
    Purge = 5,
    Bye = 6,
    ChatStatusChange = 7,
}

impl From<Op> for u8 {
    fn from(op: Op) -> Self {
        op as u8
    }
}

impl TryFrom<i64> for Op {
    type Error = ProtocolError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::JoinQueue,
            1 => Self::LeaveQueue,
            2 => Self::Message,
            3 => Self::StateUpdate,
            4 => Self::StartGame,
            5 => Self::Purge,
            6 => Self::Bye,
            7 => Self::ChatStatusChange,
            other => return Err(ProtocolError::UnknownOp(other)),
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JoinQueue => "JoinQueue",
            Self::LeaveQueue => "LeaveQueue",
            Self::Message => "Message",
            Self::StateUpdate => "StateUpdate",
            Self::StartGame => "StartGame",
            Self::Purge => "Purge",
            Self::Bye => "Bye",
            Self::ChatStatusChange => "ChatStatusChange",
        };
        f.write_str(name)
    }
}

// =========================================================================
// Tests
// =========================================================================
