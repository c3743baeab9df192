// Core guard module - the moderation decision pipeline.
// Window counter and evaluator are platform-agnostic; the discord layer
// feeds them classified events and applies the resulting decisions.

pub mod executor;
pub mod guard_models;
pub mod guard_service;
pub mod window;

pub use executor::*;
pub use guard_models::*;
pub use guard_service::*;
pub use window::*;
