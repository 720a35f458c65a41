use crate::analyzer::decoder::Participant;
use crate::demofile::GameState;
use crate::error::ResolveError;
use crate::types::{SteamId, team_slot_for};

use super::state::MatchData;

/// Maps a decoder-level participant handle to the match's player, creating
/// the player on first sighting.
///
/// Known players are found by Steam ID. Unknown handles are only accepted if
/// the engine currently lists them as playing; they are then assigned to the
/// team derived from their side and the current side-swap flag. Bots are
/// never admitted.
pub fn resolve(
    match_data: &mut MatchData,
    game_state: &GameState,
    handle: &Participant,
    sides_switched: bool,
) -> Result<SteamId, ResolveError> {
    if handle.is_bot {
        return Err(ResolveError::BotRejected {
            name: handle.name.clone(),
        });
    }

    if let Some(player) = match_data.player(handle.steam_id) {
        return Ok(player.steam_id);
    }

    let Some(live) = game_state
        .playing()
        .find(|p| p.steam_id == handle.steam_id)
    else {
        return Err(ResolveError::PlayerNotFound(handle.steam_id));
    };
    if live.is_bot {
        return Err(ResolveError::BotRejected {
            name: handle.name.clone(),
        });
    }

    // `playing()` only yields participants with a side
    let side = handle
        .side
        .or(live.side)
        .ok_or(ResolveError::PlayerNotFound(handle.steam_id))?;
    let team = team_slot_for(side, sides_switched);
    Ok(match_data.add_player(handle, team))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::match_controller::state::MatchInfo;
    use crate::test_support::header;
    use crate::types::{MatchId, Side, TeamSlot};
    use chrono::Utc;

    fn match_data() -> MatchData {
        MatchData::new(
            MatchInfo {
                id: MatchId::from("resolve"),
                time: Utc::now(),
            },
            header("de_overpass"),
        )
    }

    fn state(players: &[Participant]) -> GameState {
        GameState {
            participants: players.to_vec(),
            teams: Vec::new(),
        }
    }

    #[test]
    fn first_sighting_materializes_player() {
        let mut data = match_data();
        let a = Participant::new(1, "A", Side::CounterTerrorists);
        let gs = state(&[a.clone()]);

        assert_eq!(resolve(&mut data, &gs, &a, false), Ok(SteamId(1)));
        assert_eq!(data.players().len(), 1);
        assert_eq!(data.team(TeamSlot::Second).players(), &[SteamId(1)]);

        // Second lookup finds the existing record without touching the engine state
        assert_eq!(resolve(&mut data, &state(&[]), &a, false), Ok(SteamId(1)));
        assert_eq!(data.players().len(), 1);
    }

    #[test]
    fn swapped_sides_invert_team_assignment() {
        let mut data = match_data();
        let a = Participant::new(1, "A", Side::CounterTerrorists);
        let gs = state(&[a.clone()]);
        resolve(&mut data, &gs, &a, true).unwrap();
        assert_eq!(data.player(SteamId(1)).unwrap().team, TeamSlot::First);
        assert_eq!(data.team(TeamSlot::First).players(), &[SteamId(1)]);
    }

    #[test]
    fn bots_are_rejected() {
        let mut data = match_data();
        let bot = Participant::bot(99, "BOT Kek", Side::Terrorists);
        let gs = state(&[bot.clone()]);
        assert_eq!(
            resolve(&mut data, &gs, &bot, false),
            Err(ResolveError::BotRejected {
                name: "BOT Kek".to_owned()
            })
        );
        assert!(data.players().is_empty());
    }

    #[test]
    fn unknown_participant_is_not_found() {
        let mut data = match_data();
        let ghost = Participant::new(5, "ghost", Side::Terrorists);
        assert_eq!(
            resolve(&mut data, &state(&[]), &ghost, false),
            Err(ResolveError::PlayerNotFound(SteamId(5)))
        );

        let mut spectator = ghost.clone();
        spectator.side = None;
        assert_eq!(
            resolve(&mut data, &state(&[spectator.clone()]), &spectator, false),
            Err(ResolveError::PlayerNotFound(SteamId(5)))
        );
        assert!(data.players().is_empty());
    }
}
