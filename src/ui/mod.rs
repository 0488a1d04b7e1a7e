pub mod button;
pub mod draw;
pub mod theme;

pub use button::{Button, ButtonBar, Selection};
