//! 核心模块 - 配置、状态、后台任务、HTTP 服务
//!
//! - [`Config`] - 服务配置
//! - [`AppState`] - 组合根
//! - [`BackgroundTasks`] - 后台任务
//! - [`Server`] - HTTP 服务器

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use server::Server;
pub use state::AppState;
pub use tasks::{BackgroundTasks, TaskKind};
