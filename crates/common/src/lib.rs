pub mod types;

pub use types::{Address, Hash, ParseError, ADDRESS_LENGTH, HASH_LENGTH};
