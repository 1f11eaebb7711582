pub mod commands;
pub mod progress;
pub mod ui;
pub mod util;

pub use progress::PhaseRenderer;
pub use ui::Output;
pub use util::{CommandContext, GlobalOptions};
