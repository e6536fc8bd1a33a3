pub mod app;
pub mod bridge;
pub mod command_executor;
pub mod format;
pub mod live;
pub mod notification;
pub mod theme;
pub mod views;
pub mod workflow_list;

#[cfg(test)]
mod tests;

pub use app::{AppSettings, TowerApp, ViewType};
