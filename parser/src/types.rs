use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A persistent player account identifier (64-bit Steam ID).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(pub u64);

impl SteamId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SteamId {
    fn from(v: u64) -> Self {
        SteamId(v)
    }
}

/// Opaque identifier of a match, assigned by whoever schedules the parse.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(v: &str) -> Self {
        MatchId(v.to_owned())
    }
}

impl From<String> for MatchId {
    fn from(v: String) -> Self {
        MatchId(v)
    }
}

/// A game clock value in seconds since the demo started recording.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameClock(pub f32);

impl GameClock {
    pub fn seconds(self) -> f32 {
        self.0
    }

    /// Time elapsed since `earlier`, clamped to zero when the clock went backwards.
    pub fn since(self, earlier: GameClock) -> Duration {
        Duration::from_secs_f32((self.0 - earlier.0).max(0.0))
    }
}

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}s", self.0)
    }
}

impl std::ops::Sub for GameClock {
    type Output = f32;
    fn sub(self, rhs: GameClock) -> f32 {
        self.0 - rhs.0
    }
}

/// One of the two factions a participant plays on during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Terrorists,
    CounterTerrorists,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Terrorists => Side::CounterTerrorists,
            Side::CounterTerrorists => Side::Terrorists,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Terrorists => f.write_str("T"),
            Side::CounterTerrorists => f.write_str("CT"),
        }
    }
}

/// Index of one of the two persistent team objects of a match. Slot `First`
/// starts the match as terrorists, `Second` as counter-terrorists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TeamSlot {
    First,
    Second,
}

impl TeamSlot {
    pub const ALL: [TeamSlot; 2] = [TeamSlot::First, TeamSlot::Second];

    pub fn index(self) -> usize {
        match self {
            TeamSlot::First => 0,
            TeamSlot::Second => 1,
        }
    }

    pub fn other(self) -> TeamSlot {
        match self {
            TeamSlot::First => TeamSlot::Second,
            TeamSlot::Second => TeamSlot::First,
        }
    }

    /// The side this slot started the match on.
    pub fn starting_side(self) -> Side {
        match self {
            TeamSlot::First => Side::Terrorists,
            TeamSlot::Second => Side::CounterTerrorists,
        }
    }
}

/// Maps a participant's current side to the persistent team slot. After the
/// halftime swap the mapping inverts.
pub fn team_slot_for(side: Side, sides_switched: bool) -> TeamSlot {
    let slot = match side {
        Side::Terrorists => TeamSlot::First,
        Side::CounterTerrorists => TeamSlot::Second,
    };
    if sides_switched { slot.other() } else { slot }
}

/// Inverse of [`team_slot_for`]: the side a team slot is currently playing.
pub fn side_for_slot(slot: TeamSlot, sides_switched: bool) -> Side {
    if sides_switched {
        slot.starting_side().opponent()
    } else {
        slot.starting_side()
    }
}
