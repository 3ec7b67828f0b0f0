pub mod request;
pub mod resolution;
