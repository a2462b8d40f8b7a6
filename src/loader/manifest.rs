// the sound pads the app ships with, and where to look when one is missing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::pattern::InstrumentId;

/// One loadable sound. `label` and `key` are only carried for the UI layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDefinition {
    pub url: String,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub key: String,
}

impl SampleDefinition {
    pub fn new(url: &str, category: &str, name: &str, label: &str, key: &str) -> Self {
        Self {
            url: url.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            key: key.to_string(),
        }
    }

    pub fn instrument(&self) -> InstrumentId {
        InstrumentId::new(&self.category, &self.name)
    }
}

/// category -> the single substitute url tried when a primary url fails
pub type FallbackTable = BTreeMap<String, String>;

#[rustfmt::skip]
pub fn default_manifest() -> Vec<SampleDefinition> {
    let d = |url, name, label, key| SampleDefinition::new(url, "drums", name, label, key);
    vec![
        // one drop kit
        d("samples/drums/one_drop/kick.wav",         "one_drop_kick",  "One Drop Kick",   "1"),
        d("samples/drums/one_drop/snare.wav",        "one_drop_snare", "One Drop Snare",  "2"),
        d("samples/drums/one_drop/hihat-closed.wav", "one_drop_hihat", "One Drop Hi-Hat", "3"),
        d("samples/drums/one_drop/hihat-open.wav",   "one_drop_open",  "One Drop Open",   "4"),
        // rockers kit
        d("samples/drums/rockers/kick.wav",          "rockers_kick",   "Rockers Kick",    "q"),
        d("samples/drums/rockers/snare.wav",         "rockers_snare",  "Rockers Snare",   "w"),
        d("samples/drums/rockers/hihat-closed.wav",  "rockers_hihat",  "Rockers Hi-Hat",  "e"),
        d("samples/drums/rockers/hihat-open.wav",    "rockers_open",   "Rockers Open",    "r"),
        // steppers kit
        d("samples/drums/steppers/kick.wav",         "steppers_kick",  "Steppers Kick",   "a"),
        d("samples/drums/steppers/snare.wav",        "steppers_snare", "Steppers Snare",  "s"),
        d("samples/drums/steppers/hihat-closed.wav", "steppers_hihat", "Steppers Hi-Hat", "d"),
        d("samples/drums/steppers/hihat-open.wav",   "steppers_open",  "Steppers Open",   "f"),
        // percussion
        d("samples/drums/rim_shot/rim1.wav",         "rim_shot1",      "Rim Shot 1",      "z"),
        d("samples/drums/rim_shot/rim2.wav",         "rim_shot2",      "Rim Shot 2",      "x"),
        d("samples/drums/percussion/shaker.wav",     "shaker",         "Shaker",          "c"),
        d("samples/drums/percussion/cowbell.wav",    "cowbell",        "Cowbell",         "v"),
    ]
}

pub fn default_fallbacks() -> FallbackTable {
    let mut table = FallbackTable::new();
    table.insert("drums".into(), "samples/drums/fallback/fallback_drums.wav".into());
    for cat in ["bass", "guitar", "horns", "vocals", "percussion", "effects"] {
        table.insert(cat.into(), format!("samples/{cat}/fallback_{cat}.mp3"));
    }
    table
}
