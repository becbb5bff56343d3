use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use flowrun_core::WorkerConfig;
use flowrun_core::app::WorkerBuilder;
use flowrun_core::app::dispatcher::DEFAULT_ANALYSIS_TEMPLATE;
use flowrun_core::impls::{HttpAgent, LocalArtifactStore, PgmqDeliveryQueue, PostgresStatusStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // (A) 設定を環境変数から読む
    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let analysis_template = match &config.analysis_template {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read analysis template {}", path.display()))?,
        None => DEFAULT_ANALYSIS_TEMPLATE.to_string(),
    };

    // (B) PostgreSQL（pgmq + tests_runs）に接続
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to PostgreSQL")?;

    // (C) ポートを組み立てる
    let queue = Arc::new(
        PgmqDeliveryQueue::new(pool.clone(), config.queue_name.clone(), config.visibility_timeout)
            .await,
    );
    let artifacts = Arc::new(LocalArtifactStore::new(config.artifact_root.clone()));
    info!(
        queue = %queue.queue_name(),
        agent = %config.agent_url,
        artifacts = %artifacts.root().display(),
        "flowrun worker starting"
    );

    let worker = WorkerBuilder::new()
        .queue(queue)
        .agent(Arc::new(HttpAgent::new(config.agent_url.clone())))
        .artifacts(artifacts)
        .status(Arc::new(PostgresStatusStore::new(pool.clone())))
        .settings(config.dispatch_settings(analysis_template))
        .poison_policy(config.poison_policy)
        .run_mode(config.run_mode)
        .idle_delay(config.idle_delay)
        .build()?;

    // (D) Ctrl-C で新規受け取りを止める（処理中のタスクは最後まで実行）
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            // dropping the sender would stop the worker, so keep it alive
            warn!(error = %err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested; finishing the current task");
        request_shutdown(&shutdown_tx);
    });

    let stats = worker.run(shutdown_rx).await;
    info!(
        acknowledged = stats.acknowledged,
        redelivered = stats.redelivered,
        dead_lettered = stats.dead_lettered,
        transport_errors = stats.transport_errors,
        "flowrun worker exited"
    );

    pool.close().await;
    Ok(())
}

/// ワーカーに停止を伝える。ワーカーが既に終わっていれば `false`
fn request_shutdown(shutdown_tx: &watch::Sender<bool>) -> bool {
    match shutdown_tx.send(true) {
        Ok(()) => true,
        Err(_) => {
            debug!("worker already stopped; shutdown signal not delivered");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_reaches_a_running_worker() {
        let (tx, rx) = watch::channel(false);
        assert!(request_shutdown(&tx));
        assert!(*rx.borrow());
    }

    #[test]
    fn shutdown_after_the_worker_exited_is_reported() {
        let (tx, rx) = watch::channel(false);
        drop(rx);
        assert!(!request_shutdown(&tx));
    }
}
