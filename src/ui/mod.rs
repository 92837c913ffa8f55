pub mod shortcuts;
pub mod inputs;
pub mod single_value_dialog;

pub use shortcuts::{ShortcutManager, ShortcutAction, AboutDialog};
pub use inputs::{InputListWindow, InputAction};
pub use single_value_dialog::SingleValueDialog;
