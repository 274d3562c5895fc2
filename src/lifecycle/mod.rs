//! Reload/shutdown control of the agent
//!
//! - [`controller`]: the reload loop that owns one agent per cycle.
//! - [`signals`]: signal-to-intent routing, single-fire per run.
//! - [`reload`]: the single-slot reload token shared by both.

pub mod controller;
pub mod reload;
pub mod signals;

pub use controller::{Controller, RunOptions};
pub use reload::ReloadSlot;
pub use signals::{Intent, IntentSource, ManualSignals, OsSignals, SignalRouter};
