//! Rebuilds a match (players, teams, rounds) from a demo's event stream.

pub mod controller;
pub mod identity;
pub mod rounds;
pub mod state;

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, span};

use crate::analyzer::decoder::GamePhase;
use crate::demofile::DemoSource;
use crate::error::Error;

pub use controller::MatchController;
pub use rounds::{PhaseTransition, RoundState, RoundTracker};
pub use state::{Damage, Kill, KillFlags, MatchData, MatchInfo, Player, Round, RoundEvents, Team};

/// Knobs for a single reconstruction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// The game phase that marks halftime
    pub halftime_phase: GamePhase,
    /// Log every reconstruction step at trace level, tagged with match and round
    pub trace_events: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            halftime_phase: GamePhase::GameHalfEnded,
            trace_events: false,
        }
    }
}

/// Parses one demo to completion.
///
/// Fails only if the header cannot be read or the feed cannot be decoded;
/// in that case nothing of the partially reconstructed match is returned.
pub fn parse_match<S: DemoSource>(
    mut source: S,
    info: MatchInfo,
    options: &ParseOptions,
) -> Result<MatchData, Error> {
    let span = span!(Level::DEBUG, "parse_match", match_id = %info.id);
    let _enter = span.enter();

    let header = source.parse_header()?;
    info!(
        "parsing match on {} ({:.0}s of playback)",
        header.map_name, header.playback_time
    );

    let mut controller = MatchController::new(info, header, options);
    super::drive(&mut source, &mut controller)?;

    let data = controller.into_match_data();
    debug!(
        "reconstructed {} rounds with {} players",
        data.rounds().len(),
        data.players().len()
    );
    Ok(data)
}
