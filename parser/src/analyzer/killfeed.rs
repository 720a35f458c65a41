use crate::analyzer::decoder::{DecodedEvent, DemoEvent, EquipmentType, Participant};
use crate::demofile::{DemoHeader, GameState};
use crate::types::GameClock;

use super::analyzer::Analyzer;

pub struct KillFeedBuilder;

impl Default for KillFeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KillFeedBuilder {
    pub fn new() -> KillFeedBuilder {
        KillFeedBuilder
    }

    pub fn build(self, header: &DemoHeader) -> Box<dyn Analyzer> {
        println!("kill feed for {} on {}", header.map_name, header.server_name);
        Box::new(KillFeed { round: 0 })
    }
}

pub struct KillFeed {
    round: u32,
}

/// One kill-feed line, e.g. `61.3s: [3] alice ak47 (hs) bob`.
pub fn kill_line(
    clock: GameClock,
    round: u32,
    killer: Option<&Participant>,
    weapon: EquipmentType,
    headshot: bool,
    wallbang: bool,
    victim: &Participant,
) -> String {
    let mut markers = String::new();
    if headshot {
        markers.push_str(" (hs)");
    }
    if wallbang {
        markers.push_str(" (wb)");
    }
    format!(
        "{}: [{}] {} {}{} {}",
        clock,
        round,
        killer.map(|k| k.name.as_str()).unwrap_or("<WORLD>"),
        weapon,
        markers,
        victim.name
    )
}

impl Analyzer for KillFeed {
    fn finish(&mut self) {}

    fn process(&mut self, event: &DecodedEvent, _game_state: &GameState) {
        match &event.payload {
            DemoEvent::MatchStart => self.round = 0,
            DemoEvent::RoundStart => self.round += 1,
            DemoEvent::Kill {
                victim,
                killer,
                weapon,
                headshot,
                penetrated_objects,
                ..
            } => {
                println!(
                    "{}",
                    kill_line(
                        event.clock,
                        self.round,
                        killer.as_ref(),
                        *weapon,
                        *headshot,
                        *penetrated_objects > 0,
                        victim
                    )
                );
            }
            DemoEvent::RoundEnd {
                winner, message, ..
            } => {
                println!(
                    "{}: round {} over, winner {} {}",
                    event.clock,
                    self.round,
                    winner.map(|s| s.to_string()).unwrap_or_else(|| "-".to_owned()),
                    message
                );
            }
            _ => {}
        }
    }
}
