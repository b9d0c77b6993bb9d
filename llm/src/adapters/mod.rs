/// Bridge from rig completion models.
pub mod rig;
/// Replays scripted provider rounds.
pub mod scripted;

pub use self::rig::RigAdapter;
pub use self::scripted::{Capability, RecordedCall, ScriptedAdapter, ScriptedRound};
