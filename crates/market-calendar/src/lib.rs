pub mod calendar;
pub mod schedule;

pub use calendar::*;
pub use schedule::*;
