use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::shared::STEPS_PER_PATTERN;

/// A playable sound, addressed by its category and its name within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId {
    pub category: String,
    pub name: String,
}

impl InstrumentId {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self { category: category.into(), name: name.into() }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

// "drums.shaker" style keys only show up in config files
impl FromStr for InstrumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((category, name)) if !category.is_empty() && !name.is_empty() => {
                Ok(Self::new(category, name))
            }
            _ => Err(Error::Config(format!("instrument \"{s}\" is not of the form category.name"))),
        }
    }
}

pub type Steps = [bool; STEPS_PER_PATTERN];

#[derive(Clone, Debug, PartialEq)]
pub struct PatternRow {
    pub instrument: InstrumentId,
    pub steps: Steps,
}

/// One bar loop at 16th-note resolution, one row per instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub rows: Vec<PatternRow>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, rows: Vec<PatternRow>) -> Self {
        Self { name: name.into(), rows }
    }

    // the instruments that hit on `step`, in row order
    pub fn hits_at(&self, step: usize) -> impl Iterator<Item = &InstrumentId> {
        self.rows
            .iter()
            .filter(move |r| r.steps.get(step).copied().unwrap_or(false))
            .map(|r| &r.instrument)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.rows.iter().map(|r| &r.instrument)
    }
}

/// Pattern as written in a config file: `{"name": .., "rows": [{"instrument": "drums.kick", "steps": [1,0,..]}]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub rows: Vec<RowSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowSpec {
    pub instrument: String,
    pub steps: Vec<u8>,
}

impl TryFrom<PatternSpec> for Pattern {
    type Error = Error;

    fn try_from(spec: PatternSpec) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidPattern { name: spec.name.clone(), reason };
        let mut rows = Vec::with_capacity(spec.rows.len());
        for row in &spec.rows {
            if row.steps.len() != STEPS_PER_PATTERN {
                return Err(invalid(format!(
                    "{} has {} steps, expected {STEPS_PER_PATTERN}",
                    row.instrument,
                    row.steps.len()
                )));
            }
            let instrument = row.instrument.parse::<InstrumentId>().map_err(|e| invalid(e.to_string()))?;
            let mut steps = [false; STEPS_PER_PATTERN];
            for (slot, v) in steps.iter_mut().zip(row.steps.iter()) {
                *slot = *v != 0;
            }
            rows.push(PatternRow { instrument, steps });
        }
        Ok(Pattern::new(spec.name.clone(), rows))
    }
}

/// The patterns available to the sequencer, in display order.
#[derive(Clone, Debug, Default)]
pub struct PatternLibrary {
    patterns: Vec<Arc<Pattern>>,
}

impl PatternLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut lib = Self::empty();
        for p in builtin_patterns() {
            lib.insert(p);
        }
        lib
    }

    // a pattern with an existing name replaces it in place
    pub fn insert(&mut self, pattern: Pattern) {
        let pattern = Arc::new(pattern);
        match self.patterns.iter_mut().find(|p| p.name == pattern.name) {
            Some(slot) => *slot = pattern,
            None => self.patterns.push(pattern),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Pattern>> {
        self.patterns
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| Error::UnknownPattern(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn row(name: &str, grid: [u8; STEPS_PER_PATTERN]) -> PatternRow {
    PatternRow {
        instrument: InstrumentId::new("drums", name),
        steps: grid.map(|v| v != 0),
    }
}

#[rustfmt::skip]
fn builtin_patterns() -> Vec<Pattern> {
    vec![
        Pattern::new("one_drop", vec![
            row("one_drop_kick",  [0,0,0,0, 0,0,0,0, 1,0,0,0, 0,0,0,0]), // kick on 3
            row("one_drop_snare", [0,0,0,0, 1,0,0,0, 0,0,0,0, 1,0,0,0]),
            row("one_drop_hihat", [1,0,1,0, 1,0,1,0, 1,0,1,0, 1,0,1,0]),
            row("one_drop_open",  [0,0,0,0, 0,1,0,0, 0,0,0,0, 0,1,0,0]),
        ]),
        Pattern::new("rockers", vec![
            row("rockers_kick",   [1,0,0,0, 0,0,0,0, 1,0,0,0, 0,0,0,0]),
            row("rockers_snare",  [0,0,0,0, 1,0,0,0, 0,0,0,0, 1,0,0,0]),
            row("rockers_hihat",  [1,0,1,0, 1,0,1,0, 1,0,1,0, 1,0,1,0]),
            row("rockers_open",   [0,1,0,1, 0,1,0,1, 0,1,0,1, 0,1,0,1]), // upbeats
        ]),
        Pattern::new("steppers", vec![
            row("steppers_kick",  [1,0,0,0, 1,0,0,0, 1,0,0,0, 1,0,0,0]), // four on the floor
            row("steppers_snare", [0,0,0,0, 1,0,0,0, 0,0,0,0, 1,0,0,0]),
            row("steppers_hihat", [1,1,1,1, 1,1,1,1, 1,1,1,1, 1,1,1,1]),
            row("steppers_open",  [0,0,0,0, 0,1,0,0, 0,0,0,0, 0,1,0,0]),
        ]),
        Pattern::new("dub", vec![
            row("steppers_kick",  [1,0,0,0, 0,0,1,0, 0,0,0,0, 1,0,0,0]),
            row("one_drop_snare", [0,0,0,0, 1,0,0,0, 0,0,0,0, 1,0,0,1]), // with a fill
            row("rim_shot1",      [0,0,1,0, 0,0,0,0, 0,0,1,0, 0,0,0,0]),
            row("shaker",         [0,1,0,1, 0,1,0,1, 0,1,0,1, 0,1,0,1]),
        ]),
        Pattern::new("roots", vec![
            row("one_drop_kick",  [0,0,0,0, 0,0,0,0, 1,0,0,0, 0,0,0,0]),
            row("rockers_snare",  [0,0,0,0, 1,0,0,0, 0,0,0,0, 1,0,0,0]),
            row("one_drop_hihat", [1,0,1,0, 1,0,1,0, 1,0,1,0, 1,0,1,0]),
            row("cowbell",        [0,0,1,0, 0,0,1,0, 0,0,1,0, 0,0,1,0]),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_order() {
        let lib = PatternLibrary::builtin();
        assert_eq!(lib.names(), vec!["one_drop", "rockers", "steppers", "dub", "roots"]);
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let lib = PatternLibrary::builtin();
        assert!(matches!(lib.get("ska"), Err(Error::UnknownPattern(n)) if n == "ska"));
    }

    #[test]
    fn hits_follow_the_grid() {
        let lib = PatternLibrary::builtin();
        let one_drop = lib.get("one_drop").unwrap();
        let at8: Vec<String> = one_drop.hits_at(8).map(|i| i.name.clone()).collect();
        assert_eq!(at8, vec!["one_drop_kick", "one_drop_hihat"]);
        assert_eq!(one_drop.hits_at(1).count(), 0);
        assert_eq!(one_drop.hits_at(16).count(), 0);
    }

    #[test]
    fn instrument_ids_parse_and_print() {
        let id: InstrumentId = "drums.rim_shot1".parse().unwrap();
        assert_eq!(id, InstrumentId::new("drums", "rim_shot1"));
        assert_eq!(id.to_string(), "drums.rim_shot1");
        assert!("drums".parse::<InstrumentId>().is_err());
        assert!(".kick".parse::<InstrumentId>().is_err());
    }

    #[test]
    fn spec_with_wrong_length_is_rejected() {
        let spec = PatternSpec {
            name: "short".into(),
            rows: vec![RowSpec { instrument: "drums.kick".into(), steps: vec![1, 0, 1] }],
        };
        assert!(matches!(Pattern::try_from(spec), Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn spec_converts_and_replaces_builtin() {
        let spec = PatternSpec {
            name: "dub".into(),
            rows: vec![RowSpec { instrument: "drums.shaker".into(), steps: vec![1; 16] }],
        };
        let mut lib = PatternLibrary::builtin();
        lib.insert(Pattern::try_from(spec).unwrap());
        assert_eq!(lib.len(), 5);
        assert_eq!(lib.get("dub").unwrap().rows.len(), 1);
    }
}
