//! jpip-plan - schedule JPIP responses for one view window.
//!
//! Opens a codestream layout, runs the chosen scheduler for one or more
//! successive responses of a single client session and prints them as JSON.

use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jpip_streamer::{
    config::Config,
    geometry::frame_size,
    service::{CodestreamRegistry, DeliveryRequest, DeliveryService, LayoutSource, LedgerStore},
    Schedule, SchedulerKind, ViewWindow,
};

/// Session name used for every round of one run.
const SESSION: &str = "jpip-plan";

#[derive(Serialize)]
struct Report<'a> {
    layout: String,
    scheduler: SchedulerKind,
    window: &'a ViewWindow,
    responses: &'a [Schedule],
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (root, target) = config.layout_target();
    let registry = CodestreamRegistry::new(LayoutSource::new(root));
    let service = DeliveryService::new(registry, LedgerStore::with_capacity(config.cache_sessions))
        .with_settings(config.scheduler_settings());

    let opened = match service.registry().get(&target).await {
        Ok(opened) => opened,
        Err(e) => {
            error!("Failed to open {}: {}", config.layout.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let image = frame_size(&opened.codestream.image(), 0);
    info!(
        layout = %config.layout.display(),
        width = image.width,
        height = image.height,
        tiles = opened.codestream.num_tiles(),
        components = opened.codestream.num_components(),
        "Opened codestream"
    );

    let window = config.view_window(image);
    let mut request = DeliveryRequest::new(target, window.clone())
        .with_scheduler(config.scheduler)
        .with_order(config.order);
    request.max_bytes = config.max_bytes;

    let mut responses = Vec::new();
    for round in 0..config.rounds {
        let schedule = match service.deliver(SESSION, &request).await {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("Scheduling failed: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let done = schedule.is_empty();
        responses.push(schedule);
        if done {
            info!(round, "Window fully delivered");
            break;
        }
    }

    let report = Report {
        layout: config.layout.display().to_string(),
        scheduler: config.scheduler,
        window: &window,
        responses: &responses,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize schedule: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem. Logs go to stderr so stdout
/// stays valid JSON.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "jpip_streamer=debug,jpip_plan=debug"
    } else {
        "jpip_streamer=info,jpip_plan=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
