// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "guard/mod.rs"]
pub mod guard;
