//! Taproom Edge - 酒吧 POS 边缘节点
//!
//! 本地优先的订单/桌台一致性与同步引擎：
//!
//! - **订单与桌台** (`orders`, `tables`): 带校验的内存集合，写入本地快照
//! - **联动协调** (`coordinator`): 开单占桌、加单、结账释放、一致性检查
//! - **目录数据** (`catalog`): 酒单、会员、设置
//! - **本地存储** (`storage`): redb 快照 + 文件回退，合并写入
//! - **远端同步** (`cloud_sync`): PostgREST 推送/拉取，last-write-wins
//! - **离线层** (`offline`): 连通性监控、离线队列与重放
//! - **HTTP API** (`api`): 供前端调用的 axum 路由
//!
//! # 模块结构
//!
//! ```text
//! taproom-edge/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── orders/        # 订单存储与金额校验
//! ├── tables/        # 桌台存储
//! ├── coordinator/   # 订单/桌台联动与一致性
//! ├── catalog/       # 酒单、会员、设置
//! ├── storage/       # 本地持久化
//! ├── message/       # 变更总线
//! ├── cloud_sync/    # 远端同步
//! ├── offline/       # 离线队列与连通性
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误与日志
//! ```

pub mod api;
pub mod catalog;
pub mod cloud_sync;
pub mod coordinator;
pub mod core;
pub mod data_transfer;
pub mod message;
pub mod offline;
pub mod orders;
pub mod storage;
pub mod tables;
pub mod utils;

// Re-export 公共类型
pub use catalog::{MemberStore, MenuStore, SettingsStore};
pub use cloud_sync::{SyncResult, SyncService};
pub use coordinator::{ConsistencyReport, Coordinator};
pub use core::{AppState, BackgroundTasks, Config, Server};
pub use message::{ChangeBus, Collection, StoreChange};
pub use offline::{ConnectivityMonitor, OfflineQueue};
pub use orders::OrderStore;
pub use tables::TableStore;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
  ______
 /_  __/___ _____  _________  ____  ____ ___
  / / / __ `/ __ \/ ___/ __ \/ __ \/ __ `__ \
 / / / /_/ / /_/ / /  / /_/ / /_/ / / / / / /
/_/  \__,_/ .___/_/   \____/\____/_/ /_/ /_/
         /_/                     edge
    "#
    );
}
