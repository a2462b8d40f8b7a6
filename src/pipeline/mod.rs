pub mod clock;
pub mod effects;
pub mod pattern;
pub mod persistence;
pub mod recorder;
pub mod sample_store;
pub mod schedule;
pub mod sequencer;
pub mod trigger;
