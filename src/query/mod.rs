pub mod engine;

pub use engine::PresenceEngine;
