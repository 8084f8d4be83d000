pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod install;
pub mod inventory;
pub mod logs;
pub mod optimize;
pub mod platform;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod scan;
pub mod scoring;
pub mod ui;
