pub mod analyze;
pub mod filter;
pub mod schema;
