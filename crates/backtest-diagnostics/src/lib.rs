pub mod report;
pub mod rules;


pub use report::*;
pub use rules::*;
