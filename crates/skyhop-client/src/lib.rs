pub mod config;
pub mod connection;
pub mod game;
pub mod storage;
