//! Per-player match statistics derived from a reconstructed match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::analyzer::match_controller::{MatchData, Round};
use crate::error::Error;
use crate::types::{MatchId, SteamId, TeamSlot};

fn required_match_id(id: &MatchId) -> Result<(), ValidationError> {
    if id.as_str().trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn required_steam_id(id: &SteamId) -> Result<(), ValidationError> {
    if id.raw() == 0 {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn required_time(time: &DateTime<Utc>) -> Result<(), ValidationError> {
    if time.timestamp() <= 0 {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// One player's performance in one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    #[validate(custom = "required_match_id")]
    pub match_id: MatchId,
    #[validate(custom = "required_time")]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub map: String,
    pub match_rounds: u32,
    pub score_own_team: u32,
    pub score_enemy_team: u32,
    #[serde(rename = "id")]
    #[validate(custom = "required_steam_id")]
    pub steam_id: SteamId,
    #[validate(length(min = 1))]
    pub name: String,
    pub kills: u32,
    pub entry_kills: u32,
    pub opening_duel_attempts: u32,
    pub headshots: u32,
    pub assists: u32,
    pub deaths: u32,
    pub damage_dealt: u32,
    pub mvps: u32,
    #[serde(rename = "won1v3")]
    pub won_1v3: u32,
    #[serde(rename = "won1v4")]
    pub won_1v4: u32,
    #[serde(rename = "won1v5")]
    pub won_1v5: u32,
    #[serde(rename = "roundsWith3k")]
    pub rounds_with_3k: u32,
    #[serde(rename = "roundsWith4k")]
    pub rounds_with_4k: u32,
    #[serde(rename = "roundsWith5k")]
    pub rounds_with_5k: u32,
    #[serde(rename = "wins")]
    pub win_count: i32,
    pub rank_old: i32,
    pub rank_new: i32,
}

/// A persisted player and every match result recorded for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    #[validate(custom = "required_steam_id")]
    pub id: SteamId,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faceit_id: Option<String>,
    #[validate]
    pub results: Vec<PlayerResult>,
}

impl PlayerRecord {
    pub fn new(id: SteamId) -> Result<Self, ValidationErrors> {
        let record = Self {
            id,
            created_at: Utc::now(),
            faceit_id: None,
            results: Vec::new(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Adds `result`, replacing an earlier result of the same match.
    pub fn add_result(&mut self, result: PlayerResult) -> Result<(), ValidationErrors> {
        result.validate()?;
        match self
            .results
            .iter_mut()
            .find(|r| r.match_id == result.match_id)
        {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
        Ok(())
    }
}

/// Match-level context shared by every result of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub time: DateTime<Utc>,
    pub map: String,
    pub rounds: u32,
    pub duration_secs: u64,
    pub score: [u32; 2],
    pub team_names: [String; 2],
}

impl From<&MatchData> for MatchSummary {
    fn from(data: &MatchData) -> Self {
        Self {
            match_id: data.id().clone(),
            time: data.time(),
            map: data.map().to_owned(),
            rounds: data.rounds().len() as u32,
            duration_secs: data.duration().as_secs(),
            score: TeamSlot::ALL.map(|slot| data.rounds_won(slot)),
            team_names: TeamSlot::ALL.map(|slot| data.team(slot).state().clan_name.clone()),
        }
    }
}

/// Folds a finished match into one [`PlayerResult`] per player, in the
/// order players were first seen.
pub fn aggregate(data: &MatchData) -> Vec<PlayerResult> {
    let match_rounds = data.rounds().len() as u32;
    let mut results: Vec<PlayerResult> = data
        .players()
        .iter()
        .map(|player| PlayerResult {
            match_id: data.id().clone(),
            time: data.time(),
            map: data.map().to_owned(),
            match_rounds,
            score_own_team: data.rounds_won(player.team),
            score_enemy_team: data.rounds_won(player.team.other()),
            steam_id: player.steam_id,
            name: player.name.clone(),
            kills: 0,
            entry_kills: 0,
            opening_duel_attempts: 0,
            headshots: 0,
            assists: 0,
            deaths: 0,
            damage_dealt: 0,
            mvps: 0,
            won_1v3: 0,
            won_1v4: 0,
            won_1v5: 0,
            rounds_with_3k: 0,
            rounds_with_4k: 0,
            rounds_with_5k: 0,
            win_count: player.win_count,
            rank_old: player.rank_old,
            rank_new: player.rank_new,
        })
        .collect();

    let index: HashMap<SteamId, usize> = results
        .iter()
        .enumerate()
        .map(|(i, r)| (r.steam_id, i))
        .collect();
    let mut tally = Tally {
        results: &mut results,
        index: &index,
    };

    for round in data.rounds() {
        tally.round(round);
    }

    debug!(
        match_id = %data.id(),
        "aggregated {} rounds for {} players",
        match_rounds,
        results.len()
    );
    results
}

struct Tally<'a> {
    results: &'a mut [PlayerResult],
    index: &'a HashMap<SteamId, usize>,
}

impl Tally<'_> {
    fn get(&mut self, steam_id: SteamId) -> Option<&mut PlayerResult> {
        let i = *self.index.get(&steam_id)?;
        self.results.get_mut(i)
    }

    fn round(&mut self, round: &Round) {
        let mut kills_this_round: HashMap<SteamId, u32> = HashMap::new();

        for kill in round.kills() {
            if let Some(victim) = self.get(kill.victim) {
                victim.deaths += 1;
            }
            if let Some(assister) = kill.assister {
                if let Some(result) = self.get(assister) {
                    result.assists += 1;
                }
            }
            let Some(killer) = kill.killer.filter(|_| !kill.is_suicide()) else {
                continue;
            };
            if let Some(result) = self.get(killer) {
                result.kills += 1;
                if kill.flags.headshot {
                    result.headshots += 1;
                }
                *kills_this_round.entry(killer).or_default() += 1;
            }
        }

        for (steam_id, count) in kills_this_round {
            let Some(result) = self.get(steam_id) else {
                continue;
            };
            match count {
                3 => result.rounds_with_3k += 1,
                4 => result.rounds_with_4k += 1,
                5 => result.rounds_with_5k += 1,
                _ => {}
            }
        }

        for damage in round.damage() {
            if let Some(result) = self.get(damage.attacker) {
                result.damage_dealt += damage.health_damage_taken.max(0) as u32;
            }
        }

        if let Some(mvp) = round.mvp() {
            if let Some(result) = self.get(mvp) {
                result.mvps += 1;
            }
        }

        self.opening_duel(round);
        self.clutch(round);
    }

    fn opening_duel(&mut self, round: &Round) {
        let Some(first) = round.kills().iter().find(|k| k.flags.during_round) else {
            return;
        };
        let Some(killer) = first.killer.filter(|_| !first.is_suicide()) else {
            return;
        };
        if let Some(result) = self.get(killer) {
            result.entry_kills += 1;
            result.opening_duel_attempts += 1;
        }
        if let Some(result) = self.get(first.victim) {
            result.opening_duel_attempts += 1;
        }
    }

    fn clutch(&mut self, round: &Round) {
        let mut alive = TeamSlot::ALL.map(|slot| round.roster(slot).to_vec());
        // (last player standing, opponents alive at that moment)
        let mut last_standing: [Option<(SteamId, usize)>; 2] = [None, None];

        for kill in round.kills().iter().filter(|k| k.flags.during_round) {
            for slot in TeamSlot::ALL {
                let team = &mut alive[slot.index()];
                let before = team.len();
                team.retain(|id| *id != kill.victim);
                if team.len() == before || team.len() != 1 {
                    continue;
                }
                if last_standing[slot.index()].is_none() {
                    let opponents = alive[slot.other().index()].len();
                    last_standing[slot.index()] = Some((alive[slot.index()][0], opponents));
                }
            }
        }

        let Some((survivor, opponents)) = last_standing[round.winner().index()] else {
            return;
        };
        let Some(result) = self.get(survivor) else {
            return;
        };
        match opponents {
            3 => result.won_1v3 += 1,
            4 => result.won_1v4 += 1,
            5 => result.won_1v5 += 1,
            _ => {}
        }
    }
}

/// The persistence collaborator receiving validated results.
pub trait ResultSink {
    fn store(&mut self, results: Vec<PlayerResult>) -> Result<(), Error>;
}

impl ResultSink for Vec<PlayerResult> {
    fn store(&mut self, results: Vec<PlayerResult>) -> Result<(), Error> {
        self.extend(results);
        Ok(())
    }
}

/// Validates every result and hands the batch to `sink` only if all of them
/// pass.
pub fn publish(results: Vec<PlayerResult>, sink: &mut dyn ResultSink) -> Result<(), Error> {
    for result in &results {
        result.validate().map_err(|source| Error::InvalidResult {
            steam_id: result.steam_id,
            source,
        })?;
    }
    info!("publishing {} player results", results.len());
    sink.store(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::decoder::{DemoEvent, EquipmentType, Participant};
    use crate::analyzer::match_controller::{MatchInfo, ParseOptions, parse_match};
    use crate::demofile::FeedRecord;
    use crate::test_support::{event, human, hurt, kill, match_feed, mvp, round_end, snapshot};
    use crate::types::Side;

    fn info() -> MatchInfo {
        MatchInfo {
            id: MatchId::from("62a4f0c1"),
            time: DateTime::<Utc>::from_timestamp(1_650_000_000, 0).unwrap(),
        }
    }

    fn parse(players: &[&Participant], body: Vec<FeedRecord>) -> MatchData {
        parse_match(match_feed(players, body), info(), &ParseOptions::default()).unwrap()
    }

    fn result_for(results: &[PlayerResult], id: u64) -> &PlayerResult {
        results
            .iter()
            .find(|r| r.steam_id == SteamId(id))
            .expect("player has a result")
    }

    #[test]
    fn two_round_scenario() {
        let a = human(1, "A", Side::Terrorists);
        let b = human(2, "B", Side::CounterTerrorists);
        let data = parse(
            &[&a, &b],
            vec![
                event(1.0, DemoEvent::RoundStart),
                event(10.0, kill(&a, &b, true)),
                event(20.0, round_end(Side::Terrorists)),
                event(20.5, mvp(&a)),
                event(30.0, DemoEvent::RoundStart),
                event(35.0, kill(&b, &a, false)),
                event(40.0, round_end(Side::CounterTerrorists)),
                event(40.5, mvp(&b)),
            ],
        );
        let results = aggregate(&data);
        assert_eq!(results.len(), 2);

        let ra = result_for(&results, 1);
        assert_eq!(
            (ra.kills, ra.headshots, ra.deaths, ra.mvps, ra.entry_kills),
            (1, 1, 1, 1, 1)
        );
        assert_eq!(ra.opening_duel_attempts, 2);
        let rb = result_for(&results, 2);
        assert_eq!(
            (rb.kills, rb.headshots, rb.deaths, rb.mvps, rb.entry_kills),
            (1, 0, 1, 1, 1)
        );
        for r in &results {
            assert_eq!(r.match_rounds, 2);
            assert_eq!((r.score_own_team, r.score_enemy_team), (1, 1));
            assert_eq!(r.map, "de_dust2");
        }
        assert_eq!(MatchSummary::from(&data).score, [1, 1]);
    }

    #[test]
    fn bots_never_score() {
        let a = human(1, "A", Side::CounterTerrorists);
        let bot = Participant::bot(66, "BOT Ringo", Side::Terrorists);
        let data = parse(
            &[&a, &bot],
            vec![
                event(1.0, DemoEvent::RoundStart),
                event(4.0, hurt(&bot, &a, 40)),
                event(5.0, kill(&bot, &a, true)),
                event(9.0, round_end(Side::Terrorists)),
            ],
        );
        let results = aggregate(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].deaths, 0);
        assert!(results.iter().all(|r| r.kills == 0 && r.damage_dealt == 0));
    }

    #[test]
    fn multi_kill_buckets_are_exclusive() {
        let ace = human(1, "ace", Side::CounterTerrorists);
        let enemies: Vec<Participant> = (10..15)
            .map(|id| human(id, &format!("t{id}"), Side::Terrorists))
            .collect();
        let mut roster: Vec<&Participant> = enemies.iter().collect();
        roster.push(&ace);

        let mut body = vec![event(1.0, DemoEvent::RoundStart)];
        for (i, victim) in enemies.iter().enumerate() {
            body.push(event(2.0 + i as f32, kill(&ace, victim, i % 2 == 0)));
        }
        body.push(event(10.0, round_end(Side::CounterTerrorists)));
        body.push(event(11.0, DemoEvent::RoundStart));
        for (i, victim) in enemies.iter().take(3).enumerate() {
            body.push(event(12.0 + i as f32, kill(&ace, victim, false)));
        }
        body.push(event(20.0, round_end(Side::CounterTerrorists)));

        let results = aggregate(&parse(&roster, body));
        let r = result_for(&results, 1);
        assert_eq!(r.kills, 8);
        assert_eq!(r.headshots, 3);
        assert_eq!(
            (r.rounds_with_3k, r.rounds_with_4k, r.rounds_with_5k),
            (1, 0, 1)
        );
        assert_eq!(r.entry_kills, 2);
        assert_eq!(result_for(&results, 10).opening_duel_attempts, 2);
    }

    #[test]
    fn clutch_1v3_is_credited_to_last_player_standing() {
        let ts: Vec<Participant> = (1..=3)
            .map(|id| human(id, &format!("t{id}"), Side::Terrorists))
            .collect();
        let cts: Vec<Participant> = (11..=13)
            .map(|id| human(id, &format!("ct{id}"), Side::CounterTerrorists))
            .collect();
        let roster: Vec<&Participant> = ts.iter().chain(cts.iter()).collect();

        let body = vec![
            event(1.0, DemoEvent::RoundStart),
            event(2.0, kill(&cts[0], &ts[0], false)),
            event(3.0, kill(&cts[1], &ts[1], false)),
            // t3 is alone against three
            event(4.0, kill(&ts[2], &cts[0], false)),
            event(5.0, kill(&ts[2], &cts[1], false)),
            event(6.0, kill(&ts[2], &cts[2], false)),
            event(7.0, round_end(Side::Terrorists)),
        ];
        let results = aggregate(&parse(&roster, body));
        let clutcher = result_for(&results, 3);
        assert_eq!((clutcher.won_1v3, clutcher.won_1v4, clutcher.won_1v5), (1, 0, 0));
        assert_eq!(clutcher.rounds_with_3k, 1);
        assert!(results.iter().filter(|r| r.steam_id != SteamId(3)).all(|r| r.won_1v3 == 0));
    }

    #[test]
    fn lost_clutch_counts_nothing() {
        let ts: Vec<Participant> = (1..=2)
            .map(|id| human(id, &format!("t{id}"), Side::Terrorists))
            .collect();
        let cts: Vec<Participant> = (11..=13)
            .map(|id| human(id, &format!("ct{id}"), Side::CounterTerrorists))
            .collect();
        let roster: Vec<&Participant> = ts.iter().chain(cts.iter()).collect();
        let body = vec![
            event(1.0, DemoEvent::RoundStart),
            event(2.0, kill(&cts[0], &ts[0], false)),
            event(3.0, kill(&cts[0], &ts[1], false)),
            event(7.0, round_end(Side::CounterTerrorists)),
        ];
        let results = aggregate(&parse(&roster, body));
        assert!(results.iter().all(|r| r.won_1v3 == 0));
    }

    /// One player left alone against `opponents`, who then kills them all.
    fn clutch_against(opponents: u64) -> PlayerResult {
        let ts: Vec<Participant> = (1..=2)
            .map(|id| human(id, &format!("t{id}"), Side::Terrorists))
            .collect();
        let cts: Vec<Participant> = (11..11 + opponents)
            .map(|id| human(id, &format!("ct{id}"), Side::CounterTerrorists))
            .collect();
        let roster: Vec<&Participant> = ts.iter().chain(cts.iter()).collect();

        let mut body = vec![
            event(1.0, DemoEvent::RoundStart),
            event(2.0, kill(&cts[0], &ts[0], false)),
        ];
        for (i, ct) in cts.iter().enumerate() {
            body.push(event(3.0 + i as f32, kill(&ts[1], ct, false)));
        }
        body.push(event(20.0, round_end(Side::Terrorists)));
        let results = aggregate(&parse(&roster, body));
        result_for(&results, 2).clone()
    }

    #[test]
    fn clutch_buckets_follow_opponents_alive() {
        let r = clutch_against(4);
        assert_eq!((r.won_1v3, r.won_1v4, r.won_1v5), (0, 1, 0));
        assert_eq!(r.rounds_with_4k, 1);

        let r = clutch_against(5);
        assert_eq!((r.won_1v3, r.won_1v4, r.won_1v5), (0, 0, 1));
        assert_eq!(r.rounds_with_5k, 1);

        let r = clutch_against(2);
        assert_eq!((r.won_1v3, r.won_1v4, r.won_1v5), (0, 0, 0));
    }

    #[test]
    fn clutch_uses_players_present_at_round_start() {
        let ts: Vec<Participant> = (1..=4)
            .map(|id| human(id, &format!("t{id}"), Side::Terrorists))
            .collect();
        let cts: Vec<Participant> = (11..=13)
            .map(|id| human(id, &format!("ct{id}"), Side::CounterTerrorists))
            .collect();
        let everyone: Vec<&Participant> = ts.iter().chain(cts.iter()).collect();
        let without_t4: Vec<&Participant> = ts[..3].iter().chain(cts.iter()).collect();

        let body = vec![
            event(1.0, DemoEvent::RoundStart),
            event(9.0, round_end(Side::Terrorists)),
            snapshot(&without_t4),
            event(10.0, DemoEvent::RoundStart),
            event(11.0, kill(&cts[0], &ts[0], false)),
            event(12.0, kill(&cts[1], &ts[1], false)),
            event(13.0, kill(&ts[2], &cts[0], false)),
            event(14.0, kill(&ts[2], &cts[1], false)),
            event(15.0, kill(&ts[2], &cts[2], false)),
            event(16.0, round_end(Side::Terrorists)),
        ];
        let data = parse(&everyone, body);
        assert!(data.team(TeamSlot::First).players().contains(&SteamId(4)));
        let results = aggregate(&data);
        assert_eq!(result_for(&results, 3).won_1v3, 1);
    }

    #[test]
    fn world_death_or_suicide_first_opens_no_duel() {
        let a = human(1, "A", Side::Terrorists);
        let b = human(2, "B", Side::CounterTerrorists);
        let fall = DemoEvent::Kill {
            victim: b.clone(),
            killer: None,
            assister: None,
            weapon: EquipmentType::World,
            headshot: false,
            assisted_flash: false,
            attacker_blind: false,
            no_scope: false,
            through_smoke: false,
            penetrated_objects: 0,
        };
        let data = parse(
            &[&a, &b],
            vec![
                event(1.0, DemoEvent::RoundStart),
                event(2.0, fall),
                event(3.0, kill(&a, &b, false)),
                event(9.0, round_end(Side::Terrorists)),
                event(10.0, DemoEvent::RoundStart),
                event(11.0, kill(&a, &a, false)),
                event(12.0, kill(&b, &a, false)),
                event(19.0, round_end(Side::CounterTerrorists)),
            ],
        );
        let results = aggregate(&data);
        assert!(results.iter().all(|r| r.entry_kills == 0 && r.opening_duel_attempts == 0));

        let ra = result_for(&results, 1);
        // The suicide is a death but not a kill
        assert_eq!((ra.kills, ra.deaths), (1, 2));
        let rb = result_for(&results, 2);
        assert_eq!((rb.kills, rb.deaths), (1, 2));
    }

    #[test]
    fn post_round_kills_do_not_open_duels() {
        let a = human(1, "A", Side::Terrorists);
        let b = human(2, "B", Side::CounterTerrorists);
        let data = parse(
            &[&a, &b],
            vec![
                event(1.0, DemoEvent::RoundStart),
                event(9.0, round_end(Side::CounterTerrorists)),
                event(10.0, kill(&a, &b, false)),
                event(11.0, hurt(&a, &b, 100)),
            ],
        );
        let results = aggregate(&data);
        let ra = result_for(&results, 1);
        assert_eq!((ra.kills, ra.entry_kills, ra.damage_dealt), (1, 0, 100));
        assert_eq!(result_for(&results, 2).opening_duel_attempts, 0);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let a = human(1, "A", Side::Terrorists);
        let b = human(2, "B", Side::CounterTerrorists);
        let data = parse(
            &[&a, &b],
            vec![
                event(1.0, DemoEvent::RoundStart),
                event(3.0, hurt(&b, &a, 33)),
                event(4.0, kill(&b, &a, true)),
                event(9.0, round_end(Side::CounterTerrorists)),
            ],
        );
        let first = serde_json::to_vec(&aggregate(&data)).unwrap();
        let second = serde_json::to_vec(&aggregate(&data)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn results_serialize_with_persisted_field_names() {
        let a = human(76561198000000001, "A", Side::Terrorists);
        let data = parse(&[&a], vec![event(1.0, DemoEvent::RoundStart)]);
        let value = serde_json::to_value(&aggregate(&data)[0]).unwrap();
        assert_eq!(value["id"], 76561198000000001u64);
        assert_eq!(value["matchId"], "62a4f0c1");
        for key in ["won1v3", "roundsWith5k", "wins", "rankOld", "damageDealt"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["rankOld"], -1);
    }

    #[test]
    fn publish_is_all_or_nothing() {
        let a = human(1, "A", Side::Terrorists);
        let b = human(2, "B", Side::CounterTerrorists);
        let data = parse(&[&a, &b], vec![event(1.0, DemoEvent::RoundStart)]);
        let mut results = aggregate(&data);
        results[1].name.clear();

        let mut sink: Vec<PlayerResult> = Vec::new();
        let err = publish(results.clone(), &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidResult { steam_id: SteamId(2), .. }));
        assert!(sink.is_empty());

        results[1].name = "B".to_owned();
        publish(results, &mut sink).unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn player_record_keeps_one_result_per_match() {
        assert!(PlayerRecord::new(SteamId(0)).is_err());

        let a = human(1, "A", Side::Terrorists);
        let data = parse(&[&a], vec![event(1.0, DemoEvent::RoundStart)]);
        let result = aggregate(&data).remove(0);

        let mut record = PlayerRecord::new(SteamId(1)).unwrap();
        record.add_result(result.clone()).unwrap();
        let mut replay = result.clone();
        replay.kills = 7;
        record.add_result(replay).unwrap();
        assert_eq!(record.results.len(), 1);
        assert_eq!(record.results[0].kills, 7);

        let mut other = result;
        other.match_id = MatchId::from("");
        assert!(record.add_result(other).is_err());
        assert!(record.validate().is_ok());
    }
}
