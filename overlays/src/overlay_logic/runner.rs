use lib_overlay::transport::{TransportEvents, TransportHandle};
use lib_overlay::{Pipeline, RenderSink, Tweener};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

/// Feeds transport events into the pipeline and drives animation frames
/// until shutdown. Closes the transport on the way out.
pub async fn run<S: RenderSink>(
    mut pipeline: Pipeline<S, Tweener>,
    transport: TransportHandle,
    mut events: TransportEvents,
    frame_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> Pipeline<S, Tweener> {
    let mut ticker = interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("Overlay running against {}", transport.endpoint());

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Runner shutting down...");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    pipeline.handle_event(event);
                }
                None => {
                    log::warn!("Transport task ended unexpectedly");
                    break;
                }
            },
            _ = ticker.tick() => {
                pipeline.frame(Instant::now());
            }
        }
    }

    pipeline.shutdown();
    transport.close().await;
    pipeline
}
