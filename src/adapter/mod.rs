pub mod event;
pub mod network;
pub mod remote;
pub mod storage;
