mod loader;
mod runtime;
mod view;

pub use loader::{AttemptLoader, LoadedAttempt};
pub use runtime::{
    AttemptCommand, AttemptCommands, AttemptEvent, AttemptHandle, AttemptReport, AttemptRuntime,
    RuntimeConfig,
};
pub use view::{LOW_TIME_SECS, TimerDisplay, palette_line};
