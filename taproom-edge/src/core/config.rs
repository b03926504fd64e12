use std::path::PathBuf;
use std::time::Duration;

/// 服务配置 - 边缘节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（`.env` 由 main 通过 dotenv 加载）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./taproom-data | 工作目录 (数据库、快照、日志) |
/// | HTTP_PORT | 3000 | HTTP API 端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | REMOTE_URL | (空) | 远端 REST 地址，空则使用进程内远端 |
/// | REMOTE_API_KEY | (空) | 远端 API key |
/// | REQUEST_TIMEOUT_MS | 10000 | 远端请求超时(毫秒) |
/// | PERSIST_DEBOUNCE_MS | 300 | 本地持久化合并窗口(毫秒) |
/// | SYNC_DEBOUNCE_MS | 500 | 变更推送合并窗口(毫秒) |
/// | PROBE_ATTEMPTS | 3 | 连通性探测次数 |
/// | PROBE_BACKOFF_MS | 1000 | 探测重试间隔(毫秒) |
/// | OFFLINE_MAX_RETRIES | 3 | 离线队列单条最大尝试次数 |
/// | CONNECTIVITY_CHECK_SECS | 30 | 连通性检查间隔(秒) |
/// | CONSISTENCY_SWEEP_SECS | 0 | 订单/桌台一致性巡检间隔(秒)，0 关闭 |
/// | CONSISTENCY_REPAIR | false | 巡检时自动修复桌台侧偏差 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/taproom HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,

    // === 远端同步 ===
    pub remote_url: Option<String>,
    pub remote_api_key: String,
    pub request_timeout_ms: u64,
    pub sync_debounce_ms: u64,
    pub probe_attempts: u32,
    pub probe_backoff_ms: u64,

    // === 本地持久化 / 离线 ===
    pub persist_debounce_ms: u64,
    pub offline_max_retries: u32,
    pub connectivity_check_secs: u64,

    // === 一致性巡检 ===
    pub consistency_sweep_secs: u64,
    pub consistency_repair: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./taproom-data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),

            remote_url: std::env::var("REMOTE_URL").ok().filter(|v| !v.trim().is_empty()),
            remote_api_key: std::env::var("REMOTE_API_KEY").unwrap_or_default(),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", 10_000),
            sync_debounce_ms: env_or("SYNC_DEBOUNCE_MS", 500),
            probe_attempts: env_or("PROBE_ATTEMPTS", 3),
            probe_backoff_ms: env_or("PROBE_BACKOFF_MS", 1000),

            persist_debounce_ms: env_or("PERSIST_DEBOUNCE_MS", 300),
            offline_max_retries: env_or("OFFLINE_MAX_RETRIES", 3),
            connectivity_check_secs: env_or("CONNECTIVITY_CHECK_SECS", 30),

            consistency_sweep_secs: env_or("CONSISTENCY_SWEEP_SECS", 0),
            consistency_repair: env_or("CONSISTENCY_REPAIR", false),
        }
    }

    /// 使用指定工作目录，其余取默认值
    ///
    /// 常用于测试场景：不读环境变量，探测不等待
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port: 0,
            environment: "test".into(),
            log_level: "debug".into(),
            log_json: false,
            remote_url: None,
            remote_api_key: String::new(),
            request_timeout_ms: 1000,
            sync_debounce_ms: 50,
            probe_attempts: 3,
            probe_backoff_ms: 0,
            persist_debounce_ms: 0,
            offline_max_retries: 3,
            connectivity_check_secs: 30,
            consistency_sweep_secs: 0,
            consistency_repair: false,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_backoff(&self) -> Duration {
        Duration::from_millis(self.probe_backoff_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_check_secs.max(1))
    }

    /// `None` when the sweep is disabled
    pub fn consistency_interval(&self) -> Option<Duration> {
        (self.consistency_sweep_secs > 0).then(|| Duration::from_secs(self.consistency_sweep_secs))
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
