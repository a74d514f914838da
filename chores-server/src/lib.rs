pub mod routines;
pub mod server;
pub mod storage;
