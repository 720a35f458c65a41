use std::fmt;

use tracing::{Level, debug, span, trace, warn};

use crate::analyzer::analyzer::Analyzer;
use crate::analyzer::decoder::{
    DecodedEvent, DemoEvent, EquipmentType, GamePhase, Participant, RoundEndReason,
};
use crate::demofile::{DemoHeader, GameState};
use crate::error::ResolveError;
use crate::types::{GameClock, Side, SteamId, TeamSlot, side_for_slot};

use super::ParseOptions;
use super::identity;
use super::rounds::{PhaseTransition, RoundTracker};
use super::state::{Damage, Kill, KillFlags, MatchData, MatchInfo, RoundEvents};

/// Builds [`MatchData`] from the decoded event stream of one demo.
pub struct MatchController {
    match_data: MatchData,
    rounds: RoundTracker,
    trace_events: bool,
    match_started_at: GameClock,
    last_clock: GameClock,
}

impl MatchController {
    pub fn new(info: MatchInfo, header: DemoHeader, options: &ParseOptions) -> Self {
        Self {
            match_data: MatchData::new(info, header),
            rounds: RoundTracker::new(options.halftime_phase),
            trace_events: options.trace_events,
            match_started_at: GameClock::default(),
            last_clock: GameClock::default(),
        }
    }

    pub fn match_data(&self) -> &MatchData {
        &self.match_data
    }

    pub fn round_tracker(&self) -> &RoundTracker {
        &self.rounds
    }

    pub fn into_match_data(self) -> MatchData {
        self.match_data
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        if self.trace_events {
            trace!(
                match_id = %self.match_data.id(),
                round = self.rounds.current_round(),
                "{message}"
            );
        } else {
            debug!("{message}");
        }
    }

    fn resolve(
        &mut self,
        handle: &Participant,
        game_state: &GameState,
    ) -> Result<SteamId, ResolveError> {
        identity::resolve(
            &mut self.match_data,
            game_state,
            handle,
            self.rounds.sides_switched(),
        )
    }

    /// The open round, else the round that just ended, else warmup.
    fn events_mut(&mut self) -> &mut RoundEvents {
        let sealed = self.rounds.last_round_sealed();
        if let Some(open) = self.rounds.open_round_mut() {
            return open.events_mut();
        }
        if sealed {
            self.match_data.post_round_events_mut()
        } else {
            self.match_data.warmup_mut()
        }
    }

    fn refresh_team_states(&mut self, game_state: &GameState) {
        for slot in TeamSlot::ALL {
            let side = side_for_slot(slot, self.rounds.sides_switched());
            if let Some(state) = game_state.team(side) {
                self.match_data.set_team_state(slot, state.clone());
            }
        }
    }

    fn handle_match_start(&mut self, clock: GameClock, game_state: &GameState) {
        if !self.match_data.players().is_empty() || !self.match_data.rounds().is_empty() {
            debug!(
                "match restarted at {clock}; dropping {} rounds",
                self.match_data.rounds().len()
            );
        }
        self.match_data.reset();
        self.rounds.reset();
        self.match_started_at = clock;
        self.refresh_team_states(game_state);
        self.debug(format_args!("match started at {clock}"));
    }

    fn handle_game_phase_changed(&mut self, old_phase: GamePhase, new_phase: GamePhase) {
        match self.rounds.phase_changed(new_phase) {
            PhaseTransition::SidesSwitched => self.debug(format_args!(
                "sides switched after round {}",
                self.rounds.current_round()
            )),
            PhaseTransition::SwapDeferred => warn!(
                match_id = %self.match_data.id(),
                round = self.rounds.current_round(),
                "halftime signalled during a live round; switching sides when it ends"
            ),
            PhaseTransition::DuplicateHalftime => {
                self.debug(format_args!("ignoring repeated halftime signal"))
            }
            PhaseTransition::GameOver => self.debug(format_args!("game over")),
            PhaseTransition::Ignored => {
                self.debug(format_args!("game phase {old_phase} -> {new_phase}"))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_kill(
        &mut self,
        clock: GameClock,
        victim: &Participant,
        killer: Option<&Participant>,
        assister: Option<&Participant>,
        weapon: EquipmentType,
        flags: KillFlags,
        game_state: &GameState,
    ) {
        let victim = match self.resolve(victim, game_state) {
            Ok(victim) => victim,
            Err(e) => {
                self.debug(format_args!("skipping kill: victim unresolved: {e}"));
                return;
            }
        };
        let killer = match killer.map(|k| self.resolve(k, game_state)).transpose() {
            Ok(killer) => killer,
            Err(e) => {
                self.debug(format_args!("skipping kill of {victim}: killer unresolved: {e}"));
                return;
            }
        };
        let assister = match assister.map(|a| self.resolve(a, game_state)).transpose() {
            Ok(assister) => assister,
            Err(e) => {
                self.debug(format_args!("dropping assist on kill of {victim}: {e}"));
                None
            }
        };

        if !self.rounds.is_round_ongoing() && !self.rounds.last_round_sealed() {
            debug!(
                match_id = %self.match_data.id(),
                "kill of {victim} at {clock} outside any round; recording as warmup"
            );
        }

        let kill = Kill {
            time: clock.since(self.match_started_at),
            victim,
            killer,
            assister,
            weapon,
            flags: KillFlags {
                during_round: self.rounds.is_round_ongoing(),
                ..flags
            },
        };
        self.debug(format_args!(
            "kill: {killer:?} -> {victim} with {weapon} (headshot: {})",
            kill.flags.headshot
        ));
        self.events_mut().kills.push(kill);
    }

    fn handle_player_hurt(
        &mut self,
        victim: &Participant,
        attacker: Option<&Participant>,
        health_damage_taken: i32,
        game_state: &GameState,
    ) {
        let Some(attacker) = attacker else {
            return;
        };
        if attacker.steam_id == victim.steam_id || health_damage_taken <= 0 {
            return;
        }
        let attacker = match self.resolve(attacker, game_state) {
            Ok(attacker) => attacker,
            Err(e) => {
                self.debug(format_args!("skipping damage: {e}"));
                return;
            }
        };
        self.events_mut().damage.push(Damage {
            attacker,
            health_damage_taken,
        });
    }

    fn handle_mvp(&mut self, player: &Participant, game_state: &GameState) {
        let player = match self.resolve(player, game_state) {
            Ok(player) => player,
            Err(e) => {
                self.debug(format_args!("skipping MVP: {e}"));
                return;
            }
        };
        let sealed = self.rounds.last_round_sealed();
        if let Some(open) = self.rounds.open_round_mut() {
            open.set_mvp(player);
        } else if !sealed || !self.match_data.set_last_round_mvp(player) {
            self.debug(format_args!("MVP {player} awarded outside any round; ignoring"));
        }
    }

    fn handle_round_start(&mut self, clock: GameClock, game_state: &GameState) {
        if !self.rounds.start_round(clock) {
            return;
        }
        // Bring everybody who is playing into the rosters, including players
        // who may never show up in a kill or damage event.
        for participant in game_state.playing().filter(|p| !p.is_bot) {
            let steam_id = match self.resolve(participant, game_state) {
                Ok(steam_id) => steam_id,
                Err(e) => {
                    self.debug(format_args!("roster sync: {e}"));
                    continue;
                }
            };
            let team = self.match_data.player(steam_id).map(|p| p.team);
            if let (Some(team), Some(open)) = (team, self.rounds.open_round_mut()) {
                open.add_to_roster(team, steam_id);
            }
        }
    }

    fn handle_round_end(
        &mut self,
        clock: GameClock,
        winner: Option<Side>,
        reason: RoundEndReason,
        game_state: &GameState,
    ) {
        // Before a deferred halftime swap is applied: the engine still
        // reports the sides this round was played on.
        self.refresh_team_states(game_state);
        if let Some(round) = self.rounds.end_round(clock, winner, reason) {
            self.match_data.push_round(round);
        }
    }

    fn handle_rank_update(
        &mut self,
        player: &Participant,
        rank_old: i32,
        rank_new: i32,
        win_count: i32,
        game_state: &GameState,
    ) {
        let steam_id = match self.resolve(player, game_state) {
            Ok(steam_id) => steam_id,
            Err(e) => {
                self.debug(format_args!("skipping rank update: {e}"));
                return;
            }
        };
        if let Some(player) = self.match_data.player_mut(steam_id) {
            player.apply_rank_update(rank_old, rank_new, win_count);
        }
    }

    fn handle_parser_warning(&self, message: &str) {
        warn!(
            match_id = %self.match_data.id(),
            round = self.rounds.current_round(),
            "decoder warning: {message}"
        );
    }
}

impl Analyzer for MatchController {
    fn process(&mut self, event: &DecodedEvent, game_state: &GameState) {
        let span = span!(Level::TRACE, "event processing");
        let _enter = span.enter();

        let clock = event.clock;
        if clock > self.last_clock {
            self.last_clock = clock;
        }

        match &event.payload {
            DemoEvent::MatchStart => self.handle_match_start(clock, game_state),
            DemoEvent::GamePhaseChanged {
                old_phase,
                new_phase,
            } => self.handle_game_phase_changed(*old_phase, *new_phase),
            DemoEvent::Kill {
                victim,
                killer,
                assister,
                weapon,
                headshot,
                assisted_flash,
                attacker_blind,
                no_scope,
                through_smoke,
                penetrated_objects,
            } => {
                let flags = KillFlags {
                    during_round: false,
                    headshot: *headshot,
                    flash_assist: *assisted_flash,
                    attacker_blind: *attacker_blind,
                    no_scope: *no_scope,
                    through_smoke: *through_smoke,
                    through_wall: *penetrated_objects > 0,
                };
                self.handle_kill(
                    clock,
                    victim,
                    killer.as_ref(),
                    assister.as_ref(),
                    *weapon,
                    flags,
                    game_state,
                );
            }
            DemoEvent::PlayerHurt {
                player,
                attacker,
                health_damage_taken,
                ..
            } => self.handle_player_hurt(
                player,
                attacker.as_ref(),
                *health_damage_taken,
                game_state,
            ),
            DemoEvent::RoundMvp { player, .. } => self.handle_mvp(player, game_state),
            DemoEvent::RoundStart => self.handle_round_start(clock, game_state),
            DemoEvent::RoundEnd { winner, reason, .. } => {
                self.handle_round_end(clock, *winner, *reason, game_state)
            }
            DemoEvent::RankUpdate {
                player,
                rank_old,
                rank_new,
                win_count,
                ..
            } => self.handle_rank_update(player, *rank_old, *rank_new, *win_count, game_state),
            DemoEvent::ParserWarning { message } => self.handle_parser_warning(message),
        }
    }

    fn finish(&mut self) {
        if self.rounds.is_round_ongoing() {
            warn!(
                match_id = %self.match_data.id(),
                "round {} was still live when the demo ended; it is not counted",
                self.rounds.current_round()
            );
        }
        let duration = self.last_clock.since(self.match_started_at);
        self.match_data.set_duration(duration);
    }
}
