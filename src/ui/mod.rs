//! Foreground side of the pet: event dispatch, the speech bubble and the two
//! front ends (egui window and headless).

pub mod app;
pub mod bubble;
pub mod foreground;
pub mod headless;

pub use app::{run_windowed, PetApp};
pub use bubble::{Bubble, NotificationSurface, Rect, TerminalSurface};
pub use foreground::{Flow, Foreground, PetCommand};
pub use headless::run_headless;
