//! `relay` 命令行程序的应用装配

pub mod app;
pub mod telemetry;

pub use app::Application;
