pub mod bridge;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod picker;
pub mod shell;
pub mod supervisor;
pub mod updater;
