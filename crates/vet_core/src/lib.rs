pub mod error;
pub mod knowledge;
