//! Small shared helpers

pub mod hashing;

pub use hashing::content_hash;
