pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod hotkeys;
pub mod storage;
pub mod ui;
