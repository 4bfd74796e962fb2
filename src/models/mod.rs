pub mod batch;
pub mod code;
pub mod rules;

pub use batch::Batch;
pub use code::CodeRecord;
pub use rules::{Rule, Rules};
