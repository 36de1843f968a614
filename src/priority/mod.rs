mod parser;
mod policy;

pub use parser::{PriorityEntry, PriorityWarning};
pub use policy::{Candidate, PriorityPolicy, Score, Tier};
