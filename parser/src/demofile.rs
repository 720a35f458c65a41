use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzer::decoder::{DecodedEvent, Participant};
use crate::error::Error;
use crate::types::Side;

/// Demo file header as reported by the decoding engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoHeader {
    pub filestamp: String,
    pub protocol: i32,
    pub network_protocol: i32,
    pub server_name: String,
    pub client_name: String,
    pub map_name: String,
    pub game_directory: String,
    /// Length of the recording in seconds
    pub playback_time: f32,
    pub playback_ticks: i32,
    pub playback_frames: i32,
    pub signon_length: i32,
}

impl DemoHeader {
    fn validate(&self) -> Result<(), Error> {
        if self.map_name.trim().is_empty() {
            return Err(Error::MalformedHeader("map name is empty".to_owned()));
        }
        if !self.playback_time.is_finite() || self.playback_time < 0.0 {
            return Err(Error::MalformedHeader(format!(
                "invalid playback time {}",
                self.playback_time
            )));
        }
        Ok(())
    }
}

/// Engine-side state of the team currently playing a side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    pub side: Option<Side>,
    #[serde(default)]
    pub clan_name: String,
    #[serde(default)]
    pub score: i32,
}

/// Point-in-time game state the decoding engine can be queried for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub teams: Vec<TeamState>,
}

impl GameState {
    /// Participants currently assigned to one of the two sides.
    pub fn playing(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.side.is_some())
    }

    pub fn team(&self, side: Side) -> Option<&TeamState> {
        self.teams.iter().find(|t| t.side == Some(side))
    }
}

/// The decoding engine a demo is replayed through.
pub trait DemoSource {
    /// Parses the demo header. Must be called before any event is requested.
    fn parse_header(&mut self) -> Result<DemoHeader, Error>;

    /// Returns the next event in delivery order, or `None` once the demo is
    /// exhausted.
    fn next_event(&mut self) -> Result<Option<DecodedEvent>, Error>;

    /// Current game state, as of the last event returned.
    fn game_state(&self) -> &GameState;
}

/// One line of a recorded event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRecord {
    Header(DemoHeader),
    /// Replaces the game state snapshot from this point on
    GameState(GameState),
    Event(DecodedEvent),
}

/// A demo recorded as a JSON-lines event feed: a header record followed by
/// game state snapshots and events in delivery order.
pub struct DemoFile<R> {
    lines: std::io::Lines<R>,
    line: usize,
    header: Option<DemoHeader>,
    game_state: GameState,
}

impl DemoFile<BufReader<File>> {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        debug!("opened demo feed {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> DemoFile<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            header: None,
            game_state: GameState::default(),
        }
    }

    fn next_record(&mut self) -> Result<Option<FeedRecord>, Error> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| Error::Decode {
                line: self.line,
                source,
            })?;
            return Ok(Some(record));
        }
        Ok(None)
    }
}

impl<R: BufRead> DemoSource for DemoFile<R> {
    fn parse_header(&mut self) -> Result<DemoHeader, Error> {
        if let Some(header) = self.header.as_ref() {
            return Ok(header.clone());
        }
        let Some(FeedRecord::Header(header)) = self.next_record()? else {
            return Err(Error::MissingHeader);
        };
        header.validate()?;
        self.header = Some(header.clone());
        Ok(header)
    }

    fn next_event(&mut self) -> Result<Option<DecodedEvent>, Error> {
        if self.header.is_none() {
            return Err(Error::HeaderNotParsed);
        }
        while let Some(record) = self.next_record()? {
            match record {
                FeedRecord::Event(event) => return Ok(Some(event)),
                FeedRecord::GameState(state) => self.game_state = state,
                FeedRecord::Header(_) => {
                    warn!("ignoring repeated header on line {}", self.line)
                }
            }
        }
        Ok(None)
    }

    fn game_state(&self) -> &GameState {
        &self.game_state
    }
}
