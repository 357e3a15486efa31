//! Pure helpers shared by the engine and the presentation layer

pub mod directives;
pub mod relative_time;
