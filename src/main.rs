use anyhow::{bail, Context};
use openspatial::infrastructure::logging::init_logger;
use openspatial::infrastructure::replay::{load_capture, ReplayTransport};
use openspatial::{
    DataType, DeviceHandle, OpenSpatialService, SensorEvent, ServiceConfig, SettingsService,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const USAGE: &str = "usage: openspatial-replay <capture.jsonl> [--settings <path>]";

struct Args {
    capture: PathBuf,
    settings: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut capture = None;
    let mut settings = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                settings = Some(PathBuf::from(path));
            }
            _ if capture.is_none() => capture = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument {:?}\n{}", other, USAGE),
        }
    }

    Ok(Args {
        capture: capture.context(USAGE)?,
        settings,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let settings_service = match args.settings {
        Some(path) => SettingsService::from_path(path),
        None => SettingsService::new()?,
    };
    let settings = settings_service.get();
    let _log_guard = init_logger(&settings.log_settings)?;
    info!("Replaying {}", args.capture.display());

    let capture = load_capture(&args.capture)?;
    let config = ServiceConfig::from_settings(settings)?;
    debug!("Service {}", config.table.service());
    let (service, mut status) = OpenSpatialService::new(Arc::new(ReplayTransport), &config)?;

    let status_task = tokio::spawn(async move {
        while let Some(event) = status.recv().await {
            debug!("Status: {:?}", event);
        }
    });

    let counts: Arc<Mutex<BTreeMap<&'static str, usize>>> = Arc::default();
    let devices: BTreeSet<DeviceHandle> = capture.iter().map(|n| n.handle()).collect();
    for &device in &devices {
        service.connect(device)?;
        for &data_type in DataType::ALL.iter().filter(|t| t.is_stream()) {
            let counts = counts.clone();
            service.register(device, data_type, move |event: &SensorEvent| {
                info!("{} {:?}", event.device, event.data);
                if let Ok(mut counts) = counts.lock() {
                    *counts.entry(event.data_type().name()).or_default() += 1;
                }
            })?;
        }
    }

    let dispatcher = service.dispatcher();
    let mut delivered = 0;
    for notification in &capture {
        delivered += dispatcher.on_characteristic_changed(
            notification.handle(),
            notification.characteristic,
            &notification.data,
        );
    }

    service.shutdown();
    drop(dispatcher);
    drop(service);
    if let Err(e) = status_task.await {
        warn!("Status logger stopped: {}", e);
    }

    info!(
        "Replayed {} notifications from {} devices, {} events delivered",
        capture.len(),
        devices.len(),
        delivered
    );
    if let Ok(counts) = counts.lock() {
        for (data_type, count) in counts.iter() {
            info!("  {:<28} {}", data_type, count);
        }
    }
    Ok(())
}
