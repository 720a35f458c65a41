use crate::demofile::{DemoHeader, GameState};
use crate::types::{GameClock, Side, SteamId};
use kinded::Kinded;
use serde::{Deserialize, Serialize};
use std::io::Write;
use strum_macros::{Display, EnumString, IntoStaticStr};
use tracing::warn;

use super::analyzer::Analyzer;

pub struct EventDumpBuilder {
    no_meta: bool,
    path: Option<String>,
}

impl EventDumpBuilder {
    pub fn new(no_meta: bool, output: Option<&str>) -> Self {
        Self {
            no_meta,
            path: output.map(|s| s.to_string()),
        }
    }

    pub fn build(self, header: &DemoHeader) -> Result<Box<dyn Analyzer>, crate::Error> {
        let output = match self.path.as_ref() {
            Some(path) => Some(Box::new(std::fs::File::create(path)?) as Box<dyn Write>),
            None => None,
        };
        let mut dump = EventDump { output };
        if !self.no_meta {
            dump.write(&serde_json::to_string(header)?);
        }
        Ok(Box::new(dump))
    }
}

/// A participant as the decoding engine reports it at the moment of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub steam_id: SteamId,
    pub name: String,
    /// Current side, or `None` for spectators and unassigned connections
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub is_bot: bool,
}

impl Participant {
    pub fn new(steam_id: impl Into<SteamId>, name: &str, side: Side) -> Self {
        Self {
            steam_id: steam_id.into(),
            name: name.to_owned(),
            side: Some(side),
            is_bot: false,
        }
    }

    pub fn bot(steam_id: impl Into<SteamId>, name: &str, side: Side) -> Self {
        Self {
            is_bot: true,
            ..Self::new(steam_id, name, side)
        }
    }
}

/// Game phases as reported by the game rules entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum GamePhase {
    Init,
    Pregame,
    StartGamePhase,
    TeamSideSwitch,
    /// Halftime: the last round of a half has ended
    GameHalfEnded,
    GameEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    TargetBombed,
    VipEscaped,
    VipKilled,
    TerroristsEscaped,
    CtStoppedEscape,
    TerroristsStopped,
    BombDefused,
    CtWin,
    TerroristsWin,
    Draw,
    HostagesRescued,
    TargetSaved,
    HostagesNotRescued,
    TerroristsNotEscaped,
    VipNotEscaped,
    GameStart,
    TerroristsSurrender,
    CtSurrender,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvpReason {
    MostEliminations,
    BombDefused,
    BombPlanted,
    #[serde(other)]
    Unknown,
}

/// Equipment a kill or damage event was dealt with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EquipmentType {
    // Pistols
    P2000,
    Glock,
    P250,
    Deagle,
    FiveSeven,
    DualBerettas,
    Tec9,
    Cz75,
    Usp,
    Revolver,
    // SMGs
    Mp7,
    Mp9,
    Bizon,
    Mac10,
    Ump45,
    P90,
    Mp5,
    // Heavy
    SawedOff,
    Nova,
    Mag7,
    Xm1014,
    M249,
    Negev,
    // Rifles
    Galil,
    Famas,
    Ak47,
    M4a4,
    M4a1,
    Ssg08,
    Sg553,
    Aug,
    Awp,
    Scar20,
    G3sg1,
    // Equipment
    Zeus,
    Kevlar,
    Helmet,
    Bomb,
    Knife,
    DefuseKit,
    World,
    // Grenades
    Decoy,
    Molotov,
    Incendiary,
    Flash,
    Smoke,
    HeGrenade,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentClass {
    Pistol,
    Smg,
    Heavy,
    Rifle,
    Sniper,
    Equipment,
    Grenade,
    Knife,
    World,
    Unknown,
}

impl EquipmentType {
    pub fn class(self) -> EquipmentClass {
        use EquipmentType::*;
        match self {
            P2000 | Glock | P250 | Deagle | FiveSeven | DualBerettas | Tec9 | Cz75 | Usp
            | Revolver => EquipmentClass::Pistol,
            Mp7 | Mp9 | Bizon | Mac10 | Ump45 | P90 | Mp5 => EquipmentClass::Smg,
            SawedOff | Nova | Mag7 | Xm1014 | M249 | Negev => EquipmentClass::Heavy,
            Galil | Famas | Ak47 | M4a4 | M4a1 | Sg553 | Aug => EquipmentClass::Rifle,
            Ssg08 | Awp | Scar20 | G3sg1 => EquipmentClass::Sniper,
            Zeus | Kevlar | Helmet | Bomb | DefuseKit => EquipmentClass::Equipment,
            Decoy | Molotov | Incendiary | Flash | Smoke | HeGrenade => EquipmentClass::Grenade,
            Knife => EquipmentClass::Knife,
            World => EquipmentClass::World,
            Unknown => EquipmentClass::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Kinded)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DemoEvent {
    /// The match went live. Engines may deliver this more than once when
    /// warmup or a restart precedes the real match.
    MatchStart,
    GamePhaseChanged {
        old_phase: GamePhase,
        new_phase: GamePhase,
    },
    Kill {
        victim: Participant,
        /// `None` for world deaths (fall damage, bomb, ...)
        #[serde(default)]
        killer: Option<Participant>,
        #[serde(default)]
        assister: Option<Participant>,
        #[serde(default)]
        weapon: EquipmentType,
        #[serde(default)]
        headshot: bool,
        /// The assister helped by flashing the victim
        #[serde(default)]
        assisted_flash: bool,
        #[serde(default)]
        attacker_blind: bool,
        #[serde(default)]
        no_scope: bool,
        #[serde(default)]
        through_smoke: bool,
        /// Number of objects the bullet went through before the kill
        #[serde(default)]
        penetrated_objects: u32,
    },
    PlayerHurt {
        player: Participant,
        #[serde(default)]
        attacker: Option<Participant>,
        /// Health actually removed, capped at the victim's remaining health
        health_damage_taken: i32,
        #[serde(default)]
        weapon: EquipmentType,
    },
    RoundMvp {
        player: Participant,
        #[serde(default = "unknown_mvp_reason")]
        reason: MvpReason,
    },
    RoundStart,
    RoundEnd {
        /// Winning side, `None` for draws and non-competitive round ends
        #[serde(default)]
        winner: Option<Side>,
        reason: RoundEndReason,
        #[serde(default)]
        message: String,
    },
    /// Competitive rank change, usually delivered once per player at match end
    RankUpdate {
        player: Participant,
        rank_old: i32,
        rank_new: i32,
        win_count: i32,
        #[serde(default)]
        rank_change: f32,
    },
    /// A non-fatal problem the decoding engine encountered
    ParserWarning { message: String },
}

fn unknown_mvp_reason() -> MvpReason {
    MvpReason::Unknown
}

/// A decoded event together with the engine clock it was delivered at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub clock: GameClock,
    #[serde(flatten)]
    pub payload: DemoEvent,
}

impl DecodedEvent {
    pub fn new(clock: f32, payload: DemoEvent) -> Self {
        Self {
            clock: GameClock(clock),
            payload,
        }
    }
}

/// Writes every event as one line of JSON.
struct EventDump {
    output: Option<Box<dyn Write>>,
}

impl EventDump {
    fn write(&mut self, line: &str) {
        let result = match self.output.as_mut() {
            Some(f) => writeln!(f, "{}", line),
            None => writeln!(std::io::stdout(), "{}", line),
        };
        if let Err(e) = result {
            warn!("failed to write event dump line: {e}");
        }
    }
}

impl Analyzer for EventDump {
    fn finish(&mut self) {
        if let Some(f) = self.output.as_mut() {
            if let Err(e) = f.flush() {
                warn!("failed to flush event dump: {e}");
            }
        }
    }

    fn process(&mut self, event: &DecodedEvent, _: &GameState) {
        match serde_json::to_string(event) {
            Ok(encoded) => self.write(&encoded),
            Err(e) => warn!("failed to encode {:?} event: {e}", event.payload.kind()),
        }
    }
}
