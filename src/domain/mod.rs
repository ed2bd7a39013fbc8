pub mod error;
pub mod flow;
pub mod transaction;
