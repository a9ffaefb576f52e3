pub mod constant;
pub mod error;
pub mod event;
pub mod mutation;
