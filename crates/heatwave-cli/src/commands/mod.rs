pub mod connections;
pub mod contributions;
