//! Builders for in-memory recorded feeds used by unit tests.

use std::io::Cursor;

use crate::analyzer::decoder::{DecodedEvent, DemoEvent, EquipmentType, Participant};
use crate::demofile::{DemoFile, DemoHeader, FeedRecord, GameState, TeamState};
use crate::types::Side;

pub(crate) fn header(map: &str) -> DemoHeader {
    DemoHeader {
        filestamp: "HL2DEMO".to_owned(),
        protocol: 4,
        network_protocol: 13_800,
        server_name: "Test Server".to_owned(),
        client_name: "GOTV Demo".to_owned(),
        map_name: map.to_owned(),
        game_directory: "csgo".to_owned(),
        playback_time: 2_400.0,
        playback_ticks: 307_200,
        playback_frames: 153_600,
        signon_length: 512,
    }
}

pub(crate) fn human(id: u64, name: &str, side: Side) -> Participant {
    Participant::new(id, name, side)
}

pub(crate) fn event(clock: f32, payload: DemoEvent) -> FeedRecord {
    FeedRecord::Event(DecodedEvent::new(clock, payload))
}

pub(crate) fn snapshot(players: &[&Participant]) -> FeedRecord {
    FeedRecord::GameState(GameState {
        participants: players.iter().map(|p| (*p).clone()).collect(),
        teams: vec![
            TeamState {
                side: Some(Side::Terrorists),
                clan_name: "Alpha".to_owned(),
                score: 0,
            },
            TeamState {
                side: Some(Side::CounterTerrorists),
                clan_name: "Bravo".to_owned(),
                score: 0,
            },
        ],
    })
}

pub(crate) fn kill(killer: &Participant, victim: &Participant, headshot: bool) -> DemoEvent {
    DemoEvent::Kill {
        victim: victim.clone(),
        killer: Some(killer.clone()),
        assister: None,
        weapon: EquipmentType::Ak47,
        headshot,
        assisted_flash: false,
        attacker_blind: false,
        no_scope: false,
        through_smoke: false,
        penetrated_objects: 0,
    }
}

pub(crate) fn hurt(attacker: &Participant, victim: &Participant, damage: i32) -> DemoEvent {
    DemoEvent::PlayerHurt {
        player: victim.clone(),
        attacker: Some(attacker.clone()),
        health_damage_taken: damage,
        weapon: EquipmentType::Ak47,
    }
}

pub(crate) fn round_end(winner: Side) -> DemoEvent {
    DemoEvent::RoundEnd {
        winner: Some(winner),
        reason: match winner {
            Side::Terrorists => crate::analyzer::decoder::RoundEndReason::TerroristsWin,
            Side::CounterTerrorists => crate::analyzer::decoder::RoundEndReason::CtWin,
        },
        message: String::new(),
    }
}

pub(crate) fn mvp(player: &Participant) -> DemoEvent {
    DemoEvent::RoundMvp {
        player: player.clone(),
        reason: crate::analyzer::decoder::MvpReason::MostEliminations,
    }
}

/// Serializes `records` as a JSON-lines feed and opens it.
pub(crate) fn feed(records: &[FeedRecord]) -> DemoFile<Cursor<Vec<u8>>> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record).expect("record serializes"));
        buf.push('\n');
    }
    DemoFile::from_reader(Cursor::new(buf.into_bytes()))
}

/// A feed starting with a `de_dust2` header, a game state listing `players`,
/// and a match start at clock 0.
pub(crate) fn match_feed(players: &[&Participant], body: Vec<FeedRecord>) -> DemoFile<Cursor<Vec<u8>>> {
    let mut records = vec![
        FeedRecord::Header(header("de_dust2")),
        snapshot(players),
        event(0.0, DemoEvent::MatchStart),
    ];
    records.extend(body);
    feed(&records)
}
