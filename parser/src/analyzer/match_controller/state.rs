use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::analyzer::decoder::{EquipmentType, Participant, RoundEndReason};
use crate::demofile::{DemoHeader, TeamState};
use crate::types::{MatchId, Side, SteamId, TeamSlot};

/// Identity and scheduling data supplied by whoever requested the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub id: MatchId,
    pub time: DateTime<Utc>,
}

/// A human participant of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub steam_id: SteamId,
    pub name: String,
    pub team: TeamSlot,
    pub win_count: i32,
    /// Rank before the match, [`Player::RANK_UNKNOWN`] until a rank update arrives
    pub rank_old: i32,
    pub rank_new: i32,
}

impl Player {
    pub const RANK_UNKNOWN: i32 = -1;

    fn new(participant: &Participant, team: TeamSlot) -> Self {
        Self {
            steam_id: participant.steam_id,
            name: participant.name.clone(),
            team,
            win_count: 0,
            rank_old: Self::RANK_UNKNOWN,
            rank_new: Self::RANK_UNKNOWN,
        }
    }

    /// The first update establishes the pre-match rank; every update
    /// overwrites the post-match rank and win count.
    pub(crate) fn apply_rank_update(&mut self, rank_old: i32, rank_new: i32, win_count: i32) {
        if self.rank_old == Self::RANK_UNKNOWN {
            self.rank_old = rank_old;
        }
        self.rank_new = rank_new;
        self.win_count = win_count;
    }
}

/// One of the two persistent teams. The roster never moves between teams;
/// only the side a team plays on changes at halftime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    started_as: Side,
    state: TeamState,
    players: Vec<SteamId>,
}

impl Team {
    fn new(slot: TeamSlot) -> Self {
        Self {
            started_as: slot.starting_side(),
            state: TeamState::default(),
            players: Vec::new(),
        }
    }

    pub fn started_as(&self) -> Side {
        self.started_as
    }

    /// Last engine-side team state seen for this team.
    pub fn state(&self) -> &TeamState {
        &self.state
    }

    pub fn players(&self) -> &[SteamId] {
        self.players.as_slice()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KillFlags {
    /// False for kills after the round was decided
    pub during_round: bool,
    pub headshot: bool,
    pub flash_assist: bool,
    pub attacker_blind: bool,
    pub no_scope: bool,
    pub through_smoke: bool,
    pub through_wall: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Kill {
    /// Offset from match start
    pub time: Duration,
    pub victim: SteamId,
    /// `None` for world deaths
    pub killer: Option<SteamId>,
    pub assister: Option<SteamId>,
    pub weapon: EquipmentType,
    pub flags: KillFlags,
}

impl Kill {
    pub fn is_suicide(&self) -> bool {
        self.killer == Some(self.victim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Damage {
    pub attacker: SteamId,
    pub health_damage_taken: i32,
}

/// Kills and damage collected for one round (or for the warmup bucket).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundEvents {
    pub kills: Vec<Kill>,
    pub damage: Vec<Damage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    number: u32,
    duration: Duration,
    events: RoundEvents,
    winner: TeamSlot,
    win_reason: RoundEndReason,
    mvp: Option<SteamId>,
    /// Players on each team when the round started
    roster: [Vec<SteamId>; 2],
}

impl Round {
    pub(crate) fn new(
        number: u32,
        duration: Duration,
        events: RoundEvents,
        winner: TeamSlot,
        win_reason: RoundEndReason,
        mvp: Option<SteamId>,
        roster: [Vec<SteamId>; 2],
    ) -> Self {
        Self {
            number,
            duration,
            events,
            winner,
            win_reason,
            mvp,
            roster,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn kills(&self) -> &[Kill] {
        self.events.kills.as_slice()
    }

    pub fn damage(&self) -> &[Damage] {
        self.events.damage.as_slice()
    }

    pub fn winner(&self) -> TeamSlot {
        self.winner
    }

    pub fn win_reason(&self) -> RoundEndReason {
        self.win_reason
    }

    pub fn mvp(&self) -> Option<SteamId> {
        self.mvp
    }

    pub fn roster(&self, team: TeamSlot) -> &[SteamId] {
        self.roster[team.index()].as_slice()
    }
}

/// The reconstructed match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchData {
    id: MatchId,
    map: String,
    header: DemoHeader,
    players: Vec<Player>,
    teams: [Team; 2],
    duration: Duration,
    time: DateTime<Utc>,
    rounds: Vec<Round>,
    warmup: RoundEvents,
}

impl MatchData {
    pub fn new(info: MatchInfo, header: DemoHeader) -> Self {
        Self {
            id: info.id,
            map: header.map_name.clone(),
            header,
            players: Vec::new(),
            teams: [Team::new(TeamSlot::First), Team::new(TeamSlot::Second)],
            duration: Duration::ZERO,
            time: info.time,
            rounds: Vec::new(),
            warmup: RoundEvents::default(),
        }
    }

    pub fn id(&self) -> &MatchId {
        &self.id
    }

    pub fn map(&self) -> &str {
        self.map.as_ref()
    }

    pub fn header(&self) -> &DemoHeader {
        &self.header
    }

    pub fn players(&self) -> &[Player] {
        self.players.as_slice()
    }

    pub fn player(&self, steam_id: SteamId) -> Option<&Player> {
        self.players.iter().find(|p| p.steam_id == steam_id)
    }

    pub fn teams(&self) -> &[Team; 2] {
        &self.teams
    }

    pub fn team(&self, slot: TeamSlot) -> &Team {
        &self.teams[slot.index()]
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn rounds(&self) -> &[Round] {
        self.rounds.as_slice()
    }

    /// Events recorded before the first round started. Never counted.
    pub fn warmup(&self) -> &RoundEvents {
        &self.warmup
    }

    pub fn rounds_won(&self, slot: TeamSlot) -> u32 {
        self.rounds.iter().filter(|r| r.winner == slot).count() as u32
    }

    /// Drops everything learned so far, for when the match (re)starts.
    pub(crate) fn reset(&mut self) {
        self.players.clear();
        self.teams = [Team::new(TeamSlot::First), Team::new(TeamSlot::Second)];
        self.rounds.clear();
        self.warmup = RoundEvents::default();
    }

    /// Registers a new player in the global list and in its team's roster.
    pub(crate) fn add_player(&mut self, participant: &Participant, team: TeamSlot) -> SteamId {
        let player = Player::new(participant, team);
        let steam_id = player.steam_id;
        self.teams[team.index()].players.push(steam_id);
        self.players.push(player);
        steam_id
    }

    pub(crate) fn player_mut(&mut self, steam_id: SteamId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.steam_id == steam_id)
    }

    pub(crate) fn set_team_state(&mut self, slot: TeamSlot, state: TeamState) {
        self.teams[slot.index()].state = state;
    }

    pub(crate) fn push_round(&mut self, round: Round) {
        self.rounds.push(round);
    }

    /// Where events go while no round is live: the round that just ended,
    /// or the warmup bucket before the first round.
    pub(crate) fn post_round_events_mut(&mut self) -> &mut RoundEvents {
        match self.rounds.last_mut() {
            Some(round) => &mut round.events,
            None => &mut self.warmup,
        }
    }

    pub(crate) fn warmup_mut(&mut self) -> &mut RoundEvents {
        &mut self.warmup
    }

    /// Sets the MVP of the round that just ended. Returns false if no round
    /// has ended yet.
    pub(crate) fn set_last_round_mvp(&mut self, steam_id: SteamId) -> bool {
        match self.rounds.last_mut() {
            Some(round) => {
                round.mvp = Some(steam_id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }
}
