pub mod ai;
pub mod booking;
pub mod presentation;
pub mod session_store;
pub mod validation;
