use crate::analyzer::decoder::DecodedEvent;
use crate::demofile::GameState;

pub trait Analyzer {
    fn process(&mut self, event: &DecodedEvent, game_state: &GameState);
    fn finish(&mut self);
}
