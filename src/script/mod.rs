//! The embedded scripting bridge: one interpreter per request, a `server`
//! table of capabilities, and the `LuaValue` marshalling boundary.

pub mod bridge;
pub mod capabilities;
pub mod value;

pub use bridge::{ScriptBridge, ScriptOutcome};
pub use value::LuaValue;
