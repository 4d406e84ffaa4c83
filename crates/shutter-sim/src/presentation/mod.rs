//! Terminal stand-in for the graphical front end.

pub mod console;
pub mod render;
