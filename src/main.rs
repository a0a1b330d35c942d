//! IronVault 主入口
//! 多链钱包交易引擎后端

use std::sync::Arc;

use anyhow::{Context, Result};
use ironvault::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{db, logging},
};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指向的 TOML 文件优先，其余取环境变量）
    let config = Config::from_env_and_file(std::env::var("CONFIG_PATH").ok())?;
    config.validate()?;
    let config = Arc::new(config);

    // ✅ 3. 初始化日志
    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to init logging: {}", e))?;

    tracing::info!("🚀 Starting IronVault transaction engine");

    // ✅ 4. 连接数据库
    let pool = db::init_pool(&config.database)
        .await
        .context("failed to connect to database")?;
    tracing::info!("✅ Database connected");

    // ✅ 5. 运行数据库迁移
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        db::run_migrations(&pool).await?;
    } else {
        tracing::info!("⏭️ Database migrations skipped (SKIP_MIGRATIONS=1)");
    }

    // ✅ 6. 装配服务与路由
    let state = Arc::new(AppState::new(pool, config.clone()));
    let app = api::routes(state);

    // ✅ 7. 启动服务器
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!("🌐 Server listening on {}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
