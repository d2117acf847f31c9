//! Transport control for a single loaded track.

pub mod clock;
pub mod engine;
pub mod events;
pub mod state;
pub mod volume;

pub use clock::ProgressClock;
pub use engine::PlaybackEngine;
pub use events::{EventHub, PlayerEvent, Subscription};
pub use state::{PlaybackState, StopReason, Track};
pub use volume::{Volume, DEFAULT_VOLUME};
