use taproom_edge::{Config, Server, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载 .env
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 日志 (生产环境额外写入滚动文件)
    let log_dir = config.is_production().then(|| config.log_dir());
    init_logger_with_file(&config.log_level, config.log_json, log_dir.as_deref())?;

    print_banner();
    tracing::info!(
        work_dir = %config.work_dir,
        environment = %config.environment,
        "Taproom edge starting..."
    );

    // 4. 启动 HTTP 服务器 (Server::run 会自动启动后台任务)
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
