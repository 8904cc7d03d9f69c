pub mod image_recorder;
pub mod recording_sequencer;
