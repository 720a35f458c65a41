use crate::analyzer::decoder::{DecodedEvent, DemoEvent};
use kinded::Kinded;
use crate::demofile::{DemoHeader, GameState};
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::analyzer::Analyzer;

pub struct SurveyStats {
    pub total_events: usize,
    pub events_by_kind: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    pub map_name: String,
    pub max_participants: usize,
}

impl Default for SurveyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyStats {
    pub fn new() -> Self {
        Self {
            total_events: 0,
            events_by_kind: BTreeMap::new(),
            warnings: vec![],
            map_name: "".to_string(),
            max_participants: 0,
        }
    }
}

pub struct SurveyBuilder {
    stats: Rc<RefCell<SurveyStats>>,
}

impl SurveyBuilder {
    pub fn new(stats: Rc<RefCell<SurveyStats>>) -> Self {
        Self { stats }
    }

    pub fn build(&self, header: &DemoHeader) -> Box<dyn Analyzer> {
        {
            let mut stats: RefMut<_> = self.stats.borrow_mut();
            stats.map_name = header.map_name.clone();
        }
        Box::new(Survey {
            stats: self.stats.clone(),
        })
    }
}

struct Survey {
    stats: Rc<RefCell<SurveyStats>>,
}

impl Analyzer for Survey {
    fn finish(&mut self) {}

    fn process(&mut self, event: &DecodedEvent, game_state: &GameState) {
        let mut stats: RefMut<_> = self.stats.borrow_mut();
        if let DemoEvent::ParserWarning { message } = &event.payload {
            stats.warnings.push(format!("{}: {}", event.clock, message));
        }

        let kind = format!("{:?}", event.payload.kind());
        *stats.events_by_kind.entry(kind).or_default() += 1;
        stats.max_participants = stats.max_participants.max(game_state.participants.len());
        stats.total_events += 1;
    }
}
