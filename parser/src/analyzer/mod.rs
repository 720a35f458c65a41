#[allow(clippy::module_inception)]
pub mod analyzer;
pub mod decoder;
pub mod killfeed;
pub mod match_controller;
pub mod survey;

pub use analyzer::Analyzer;

use crate::demofile::DemoSource;

/// Feeds every remaining event of `source` to `analyzer` in delivery order,
/// then calls [`Analyzer::finish`]. The header must already have been parsed.
///
/// Returns the first unrecoverable stream error; `finish` is not called in
/// that case.
pub fn drive<S: DemoSource + ?Sized>(
    source: &mut S,
    analyzer: &mut dyn Analyzer,
) -> Result<(), crate::Error> {
    while let Some(event) = source.next_event()? {
        analyzer.process(&event, source.game_state());
    }
    analyzer.finish();
    Ok(())
}
