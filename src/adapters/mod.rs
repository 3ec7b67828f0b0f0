pub mod profile;
pub mod settlement;
