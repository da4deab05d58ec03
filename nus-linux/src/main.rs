// NUS console daemon: emulated radio over TCP, advertising beacon, line console.

mod advertise;
mod config;
mod console;
mod radio;
mod transport;

use std::sync::Arc;

use anyhow::Context;
use nus_core::advertising::device_name;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("nus-linux {}", VERSION);
            return Ok(());
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = config::load().context("loading configuration")?;
    let address = cfg.address.unwrap_or_else(rand::random);
    let name = device_name(address);
    log::info!("{} starting (nus-linux {})", name, VERSION);

    let radio = Arc::new(radio::EmulatedRadio::new(cfg.tick()));
    let (handler, io) = nus_core::split(Arc::clone(&radio), cfg.link_config());

    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || console::run_console(io))
        .context("spawning console thread")?;

    let rt = tokio::runtime::Runtime::new().context("starting runtime")?;
    rt.block_on(async {
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(transport::run_events(handler, Arc::clone(&radio), event_rx));

        let transport = tokio::spawn(transport::run_transport(
            cfg.listen_port,
            Arc::clone(&radio),
            event_tx,
            cfg.notify_queue,
            cfg.idle_timeout(),
        ));

        let beacon = advertise::Beacon {
            name,
            address,
            listen_port: cfg.listen_port,
            advertising_port: cfg.advertising_port,
            interval: cfg.advertising_interval(),
        };
        let adv_radio = Arc::clone(&radio);
        tokio::spawn(async move {
            if let Err(e) = advertise::run_advertising(beacon, adv_radio).await {
                log::warn!("advertising stopped: {}", e);
            }
        });

        tokio::select! {
            res = transport => {
                res.context("transport task")?
                    .with_context(|| format!("listening on port {}", cfg.listen_port))?;
            }
            res = shutdown_signal() => res?,
        }
        anyhow::Ok(())
    })?;
    log::info!("shutting down");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl+C")?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    }
    Ok(())
}
