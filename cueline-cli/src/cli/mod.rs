pub mod args;
pub mod probe;
