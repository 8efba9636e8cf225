pub mod default;
pub mod probe;
