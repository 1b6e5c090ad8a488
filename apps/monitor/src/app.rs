//! Monitor runtime: connect every configured host and log what happens.

use tokio::task::JoinSet;
use tracing::{info, warn};

use hostlink_connection::{ConnectionManager, ConnectionState, HostEvent, HostEvents};

use crate::config::MonitorConfig;

/// Runs until Ctrl-C, then disconnects every host.
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let manager = ConnectionManager::new(config.connection.clone());

    let mut loggers = JoinSet::new();
    for host in &config.hosts {
        let events = manager.connect(&host.id, &host.token).await;
        loggers.spawn(log_events(events));
    }

    if config.hosts.is_empty() {
        warn!("no hosts configured");
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    manager.shutdown().await;
    // Channels close once their sessions are gone.
    while loggers.join_next().await.is_some() {}
    Ok(())
}

/// Logs one session's events until its channel closes.
async fn log_events(mut events: HostEvents) {
    while let Some(event) = events.recv().await {
        match event {
            HostEvent::Message { host_id, message } => {
                info!(
                    host = %host_id,
                    msg_type = message.msg_type().unwrap_or("-"),
                    "{}",
                    message.as_value()
                );
            }
            HostEvent::Error { host_id, error } => {
                warn!(host = %host_id, error = %error, "link error");
            }
            HostEvent::StateChanged { host_id, state } => match state {
                ConnectionState::Disconnected => {
                    warn!(host = %host_id, "agent unreachable, gave up reconnecting");
                }
                state => info!(host = %host_id, ?state, "state changed"),
            },
        }
    }
}
