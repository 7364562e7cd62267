pub mod base;
pub mod handler;
pub mod listener;
pub mod router;
