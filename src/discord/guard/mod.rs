// Discord-side guard plumbing: event classification, the serenity-backed
// action executor, and the admin log-channel logger.

pub mod classifier;
pub mod events;
pub mod executor;
pub mod logger;
