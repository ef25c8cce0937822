pub mod access;
pub mod poll;
pub mod tally;

pub use access::*;
pub use poll::*;
pub use tally::{EncryptedTally, TALLY_WIDTH};
