pub mod engine;

pub use engine::{ActionOutcome, GamificationEngine};
