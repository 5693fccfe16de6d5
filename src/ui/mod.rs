pub mod add_window;
pub mod playground;
pub mod suggestions;

pub use add_window::{AddWindowAction, AddWindowState};
pub use playground::Playground;
