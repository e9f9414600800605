// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use mmwave_presence::config::{Args, EngineConfig};
use mmwave_presence::reporter::Reporter;
use mmwave_presence::session::UartSession;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let rust_log = args.rust_log;

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(rust_log);
    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(rust_log)),
        Err(_) => None,
    };
    let subscriber = Registry::default().with(stdout_log).with(journald);
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
    tracing_log::LogTracer::init()?;

    let config = EngineConfig::try_from(args)?;

    info!(uart = %config.uart_path, baud = config.baud.as_u32(), "opening mmwave sensor");
    let session = UartSession::open(&config.uart_path, config.baud, config.eng_mode).await?;

    if config.eng_mode {
        if let Err(err) = session.set_eng_mode(true).await {
            error!(error = %err, "failed to enable engineering mode at startup");
        }
    }

    if config.autostart_ha {
        match config.reporter.clone() {
            Some(reporter_config) => {
                info!(host = %reporter_config.host, "starting home assistant reporter");
                let shutdown = session.shutdown_flag();
                let reporter = Reporter::new(session.clone(), reporter_config, shutdown);
                tokio::spawn(async move {
                    reporter.run().await;
                });
            }
            None => {
                error!("autostart_ha requested but no reporter configuration was supplied");
            }
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    session.shutdown();

    Ok(())
}
