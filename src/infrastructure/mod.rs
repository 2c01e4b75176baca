pub mod client;
pub mod runners;
pub mod storage;
