// <project_dir>/.riddim/config.json, every field optional:
//
//   {
//     "samples_dir": ".",
//     "settings": { "tempo": 80, "effects": { "master_volume": 0.8, ... } },
//     "manifest": [ { "url": "samples/drums/one_drop/kick.wav", "category": "drums", "name": "one_drop_kick" } ],
//     "fallbacks": { "drums": "samples/drums/fallback/fallback_drums.wav" },
//     "patterns": [ { "name": "skank", "rows": [ { "instrument": "drums.shaker", "steps": [0,1,...] } ] } ]
//   }

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::loader::manifest::{default_fallbacks, default_manifest, FallbackTable, SampleDefinition};
use crate::pipeline::effects::EffectState;
use crate::pipeline::pattern::{Pattern, PatternLibrary, PatternSpec};
use crate::pipeline::persistence::RIDDIM_DIR;
use crate::pipeline::sequencer::Tempo;
use crate::shared::DEFAULT_TEMPO;

const CONFIG_FILE: &str = "config.json";

/// Starting values for a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub tempo: f64,
    pub effects: EffectState,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { tempo: DEFAULT_TEMPO, effects: EffectState::default() }
    }
}

impl SessionSettings {
    pub fn tempo(&self) -> Result<Tempo> {
        Tempo::new(self.tempo)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub samples_dir: PathBuf, // relative paths are taken from the project dir
    pub settings: SessionSettings,
    pub manifest: Vec<SampleDefinition>,
    pub fallbacks: FallbackTable,
    pub patterns: Vec<PatternSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            samples_dir: PathBuf::from("."),
            settings: SessionSettings::default(),
            manifest: default_manifest(),
            fallbacks: default_fallbacks(),
            patterns: Vec::new(),
        }
    }
}

impl Config {
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(RIDDIM_DIR).join(CONFIG_FILE)
    }

    /// Reads the project's config, or the defaults when there is none.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::path_for(project_dir);
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default().rooted_at(project_dir));
            }
            Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
        };
        let config = Self::parse(&data).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!(path = %path.display(), "config loaded");
        Ok(config.rooted_at(project_dir))
    }

    pub fn parse(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.settings.tempo()?;
        config.settings.effects = config.settings.effects.clamped();
        Ok(config)
    }

    fn rooted_at(mut self, project_dir: &Path) -> Self {
        if self.samples_dir.is_relative() {
            self.samples_dir = project_dir.join(&self.samples_dir);
        }
        self
    }

    /// Built-in patterns plus the configured ones, which replace built-ins of the same name.
    pub fn pattern_library(&self) -> Result<PatternLibrary> {
        let mut lib = PatternLibrary::builtin();
        for spec in &self.patterns {
            lib.insert(Pattern::try_from(spec.clone())?);
        }
        Ok(lib)
    }
}
