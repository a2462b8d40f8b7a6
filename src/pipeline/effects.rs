// The effect knobs, as the user sees them: four normalized values.
// `levels()` turns them into the gains/cutoff the routing graph applies.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audio_api::EffectLevels;

pub const FEEDBACK_CEILING: f32 = 0.6;
pub const MIN_CUTOFF_HZ: f32 = 200.0;
pub const MAX_CUTOFF_HZ: f32 = 20000.0;
// how much the dry path drops as reverb comes up
pub const DRY_DUCK: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectKnob {
    MasterVolume,
    Reverb,
    Delay,
    Filter,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectState {
    pub master_volume: f32,
    pub reverb_mix: f32,
    pub delay_mix: f32,
    pub filter: f32, // 1.0 = wide open
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            reverb_mix: 0.2,
            delay_mix: 0.0,
            filter: 1.0,
        }
    }
}

impl EffectState {
    /// Sets one knob, clamped to [0, 1]. Returns whether anything changed;
    /// non-finite values leave the state alone.
    pub fn set(&mut self, knob: EffectKnob, value: f32) -> bool {
        if !value.is_finite() {
            warn!(?knob, value, "ignoring non-finite effect value");
            return false;
        }
        let v = value.clamp(0.0, 1.0);
        let slot = match knob {
            EffectKnob::MasterVolume => &mut self.master_volume,
            EffectKnob::Reverb => &mut self.reverb_mix,
            EffectKnob::Delay => &mut self.delay_mix,
            EffectKnob::Filter => &mut self.filter,
        };
        if *slot == v {
            return false;
        }
        *slot = v;
        true
    }

    // a config file can hold anything, pull it back into range
    pub fn clamped(self) -> Self {
        let c = |v: f32, d: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { d };
        let d = Self::default();
        Self {
            master_volume: c(self.master_volume, d.master_volume),
            reverb_mix: c(self.reverb_mix, d.reverb_mix),
            delay_mix: c(self.delay_mix, d.delay_mix),
            filter: c(self.filter, d.filter),
        }
    }

    pub fn levels(&self) -> EffectLevels {
        EffectLevels {
            master: self.master_volume,
            dry: 1.0 - DRY_DUCK * self.reverb_mix,
            reverb_send: self.reverb_mix,
            delay_send: self.delay_mix,
            feedback: FEEDBACK_CEILING * self.delay_mix,
            cutoff_hz: cutoff_for(self.filter),
        }
    }
}

pub fn cutoff_for(filter: f32) -> f32 {
    MIN_CUTOFF_HZ + filter * (MAX_CUTOFF_HZ - MIN_CUTOFF_HZ)
}
