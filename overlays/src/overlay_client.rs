use anyhow::{Context, Result};
use lib_overlay::transport::connect;
use lib_overlay::{BindingSet, Pipeline, Tweener};
use std::sync::Arc;
use tokio::signal;

mod overlay_logic;
use overlay_logic::{config, logger, runner, sinks};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let (config, notices) = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;
    for (level, message) in notices {
        log::log!(level, "{}", message);
    }

    let bindings_path = config.bindings_path();
    let bindings = BindingSet::from_file(&bindings_path)
        .with_context(|| format!("Cannot load bindings from {}", bindings_path.display()))?;
    let endpoint = config.endpoint(bindings.endpoint.as_deref())?;

    let sink = sinks::build_sink(config.sink.unwrap_or_default(), &config.output_dir())?;
    let pipeline = Pipeline::new(Arc::new(bindings), sink, Tweener::new())
        .with_policy(config.reconnect_policy());
    log::info!(
        "Starting overlay client: endpoint={}, bindings={}, policy={:?}",
        endpoint,
        bindings_path.display(),
        pipeline.policy()
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let (transport, events) = connect(endpoint, config.transport_config());

    let runner_handle = tokio::spawn(runner::run(
        pipeline,
        transport,
        events,
        config.frame_interval(),
        shutdown_tx.subscribe(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to the runner
    let _ = shutdown_tx.send(());

    // Wait for the runner to cancel animations, flush and close the transport
    if let Err(e) = runner_handle.await {
        log::error!("Runner task failed: {}", e);
    }

    log::info!("Shutdown complete.");
    Ok(())
}
