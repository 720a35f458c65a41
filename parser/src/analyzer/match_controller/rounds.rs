use serde::Serialize;
use tracing::{debug, warn};

use crate::analyzer::decoder::{GamePhase, RoundEndReason};
use crate::types::{GameClock, Side, SteamId, TeamSlot, team_slot_for};

use super::state::{Round, RoundEvents};

/// Lifecycle state of the match as far as rounds are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoundState {
    PreMatch,
    RoundActive,
    RoundEnded,
    MatchOver,
}

/// What a game phase change did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    SidesSwitched,
    /// Halftime arrived mid-round; the swap happens when the round ends
    SwapDeferred,
    /// A second halftime signal in the same break
    DuplicateHalftime,
    GameOver,
    Ignored,
}

/// A round that started but has not ended yet.
#[derive(Debug, Default)]
pub struct OpenRound {
    number: u32,
    started_at: GameClock,
    events: RoundEvents,
    mvp: Option<SteamId>,
    roster: [Vec<SteamId>; 2],
}

impl OpenRound {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub(crate) fn events_mut(&mut self) -> &mut RoundEvents {
        &mut self.events
    }

    pub(crate) fn set_mvp(&mut self, steam_id: SteamId) {
        self.mvp = Some(steam_id);
    }

    /// Records `steam_id` as playing for `team` when the round started.
    pub(crate) fn add_to_roster(&mut self, team: TeamSlot, steam_id: SteamId) {
        let roster = &mut self.roster[team.index()];
        if !roster.contains(&steam_id) {
            roster.push(steam_id);
        }
    }
}

/// Tracks round boundaries and side orientation.
#[derive(Debug)]
pub struct RoundTracker {
    halftime_phase: GamePhase,
    current_round: u32,
    open: Option<OpenRound>,
    /// Whether the last round end produced a [`Round`]
    last_round_sealed: bool,
    sides_switched: bool,
    swap_pending: bool,
    /// Set once sides swapped, cleared by the next round start
    swapped_this_break: bool,
    game_over: bool,
}

impl RoundTracker {
    pub fn new(halftime_phase: GamePhase) -> Self {
        Self {
            halftime_phase,
            current_round: 0,
            open: None,
            last_round_sealed: false,
            sides_switched: false,
            swap_pending: false,
            swapped_this_break: false,
            game_over: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.halftime_phase);
    }

    pub fn state(&self) -> RoundState {
        if self.open.is_some() {
            RoundState::RoundActive
        } else if self.game_over {
            RoundState::MatchOver
        } else if self.current_round == 0 {
            RoundState::PreMatch
        } else {
            RoundState::RoundEnded
        }
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn is_round_ongoing(&self) -> bool {
        self.open.is_some()
    }

    /// False after a round end was discarded, so events before the next
    /// round start belong to no round.
    pub fn last_round_sealed(&self) -> bool {
        self.last_round_sealed
    }

    pub fn sides_switched(&self) -> bool {
        self.sides_switched
    }

    pub fn game_over(&self) -> bool {
        self.game_over
    }

    pub fn team_slot(&self, side: Side) -> TeamSlot {
        team_slot_for(side, self.sides_switched)
    }

    pub(crate) fn open_round_mut(&mut self) -> Option<&mut OpenRound> {
        self.open.as_mut()
    }

    /// Opens a new round. Returns false if the match is already over.
    pub fn start_round(&mut self, clock: GameClock) -> bool {
        if self.game_over {
            warn!("round start at {clock} after the match ended; ignoring");
            return false;
        }

        match self.open.take() {
            // The unfinished round takes no winner and is dropped; its number is reused
            Some(unfinished) => warn!(
                "round {} never ended; discarding {} kills",
                unfinished.number,
                unfinished.events.kills.len()
            ),
            None => self.current_round += 1,
        }

        self.swapped_this_break = false;
        self.open = Some(OpenRound {
            number: self.current_round,
            started_at: clock,
            ..Default::default()
        });
        debug!("round {} started at {clock}", self.current_round);
        true
    }

    /// Seals the open round. The winner is attributed with the orientation
    /// that was in effect while the round was played.
    ///
    /// Returns `None` when there is no open round or no winner (draws, warmup
    /// round ends); such rounds are discarded.
    pub fn end_round(
        &mut self,
        clock: GameClock,
        winner: Option<Side>,
        reason: RoundEndReason,
    ) -> Option<Round> {
        let Some(open) = self.open.take() else {
            debug!("round end at {clock} without an open round; ignoring");
            return None;
        };

        let winner = winner.map(|side| self.team_slot(side));
        if self.swap_pending {
            self.swap_pending = false;
            self.switch_sides();
        }

        let Some(winner) = winner else {
            warn!(
                "round {} ended without a winner ({reason:?}); discarding",
                open.number
            );
            self.current_round = self.current_round.saturating_sub(1);
            self.last_round_sealed = false;
            return None;
        };

        let duration = clock.since(open.started_at);
        debug!(
            "round {} ended after {:.1}s, won by {winner:?} ({reason:?})",
            open.number,
            duration.as_secs_f32()
        );
        self.last_round_sealed = true;
        Some(Round::new(
            open.number,
            duration,
            open.events,
            winner,
            reason,
            open.mvp,
            open.roster,
        ))
    }

    pub fn phase_changed(&mut self, new_phase: GamePhase) -> PhaseTransition {
        if new_phase == GamePhase::GameEnded {
            self.game_over = true;
            return PhaseTransition::GameOver;
        }
        if new_phase != self.halftime_phase {
            return PhaseTransition::Ignored;
        }

        if self.swapped_this_break || self.swap_pending {
            return PhaseTransition::DuplicateHalftime;
        }
        if self.open.is_some() {
            self.swap_pending = true;
            return PhaseTransition::SwapDeferred;
        }
        self.switch_sides();
        PhaseTransition::SidesSwitched
    }

    fn switch_sides(&mut self) {
        self.sides_switched = !self.sides_switched;
        self.swapped_this_break = true;
    }
}
