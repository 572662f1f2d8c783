pub mod application;
pub mod build;
pub mod commands;
pub mod download;
pub mod http;
pub mod package;
pub mod process;
pub mod progress;
pub mod runtime;
