mod errors;

pub use errors::{GroupError, GroupResult};
