// Types shared between the session and whatever UI layer drives it.
//
// The UI is expected to:
//   - call the session's transport/effect/trigger operations on user input
//   - call `Session::tick()` from its own loop (every few ms) and react to the
//     returned `SessionEvent`s (light the current step, reset the play button
//     when a replay finishes, ...)
//   - read `Session::state()` to draw the transport buttons

use crate::pipeline::pattern::InstrumentId;

pub const STEPS_PER_PATTERN: usize = 16;
pub const DEFAULT_TEMPO: f64 = 80.0; // typical reggae tempo

// recording, pattern playback and replay are mutually exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    PlayingPattern,
    PlayingRecording,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    // the sequencer just played `step` of `pattern`
    Step { pattern: String, step: u8 },
    // a sequencer step or replayed event wanted a sound that isn't loaded
    Missing(InstrumentId),
    // replay hit its completion marker
    ReplayFinished,
}
