pub mod countdown;
pub mod placement;
pub mod presenter;
pub mod session;
