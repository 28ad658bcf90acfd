//! Protocol data structures the script engine consumes.

pub mod address;
pub mod encode;
pub mod hash;
pub mod transaction;
