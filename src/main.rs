pub mod ble;
pub mod config;
pub mod inspector;
pub mod mqtt;
pub mod relay;
pub mod ui;

use crate::ble::btle_session::BtleSession;
use crate::ble::BleError;
use crate::config::AppConfig;
use crate::inspector::inspector_handle::{InspectorEndpoint, InspectorHandle, InspectorWorker};
use crate::mqtt::mqtt_handler::MQTTHandle;
use crate::relay::{run_relay, NotificationRelay};
use crate::ui::inspector_menu::InspectorMenuData;
use crate::ui::mqtt_menu::MQTTMenuData;
use crate::ui::GattBridgeUI;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const BLE_EVENT_CAPACITY: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::default_path()?;
    let config = AppConfig::load_or_create(&config_path).await?;
    info!("Using configuration {}", config_path.display());

    let cancel = CancellationToken::new();

    // MQTT bridge
    let (mqtt_handle, mqtt_updates, mqtt_task) =
        MQTTHandle::spawn(config.mqtt.clone(), cancel.clone());

    // BLE session -> relay -> inspector
    let (inspector_handle, inspector_endpoint) = InspectorHandle::channels();
    let (ble_tx, ble_rx) = mpsc::channel(BLE_EVENT_CAPACITY);
    let (inspector_tx, inspector_rx) = mpsc::channel(BLE_EVENT_CAPACITY);

    let relay = NotificationRelay::from_settings(&config.mqtt);
    let relay_task = tokio::spawn(run_relay(
        relay,
        ble_rx,
        inspector_tx,
        mqtt_handle.sender(),
        cancel.clone(),
    ));

    let ble_settings = config.ble.clone();
    let ble_cancel = cancel.clone();
    let ble_task = tokio::spawn(async move {
        if let Err(e) = run_ble(ble_settings, ble_tx, inspector_rx, inspector_endpoint, ble_cancel).await {
            error!("BLE session ended: {}", e);
        }
    });

    info!("Starting UI");
    let native_options = eframe::NativeOptions::default();
    let ui_settings = config.ui.clone();
    let inspector_menu = InspectorMenuData::new(inspector_handle);
    let mqtt_menu = MQTTMenuData::new(mqtt_handle, mqtt_updates, &config.mqtt);

    let ui_result = eframe::run_native(
        "gattbridge",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(GattBridgeUI::new(
                cc,
                &ui_settings,
                inspector_menu,
                mqtt_menu,
            )))
        }),
    );

    info!("UI closed, shutting down");
    cancel.cancel();
    for (name, task) in [("mqtt", mqtt_task), ("relay", relay_task), ("ble", ble_task)] {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    }

    ui_result.map_err(|e| eyre!("UI failed: {}", e))
}

/// Connects to the configured peripheral and runs the inspector until the
/// link drops or the application shuts down.
async fn run_ble(
    settings: config::BleSettings,
    events: mpsc::Sender<ble::BleEvent>,
    inspector_events: mpsc::Receiver<ble::BleEvent>,
    endpoint: InspectorEndpoint,
    cancel: CancellationToken,
) -> Result<()> {
    let session = match BtleSession::connect(&settings, &events, &cancel).await {
        Ok(session) => session,
        Err(BleError::Cancelled) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let worker = InspectorWorker::new(session.clone(), inspector_events, endpoint);
    let inspector_task = tokio::spawn(worker.run(cancel.clone()));

    session.run(events, cancel).await?;
    inspector_task
        .await
        .map_err(|e| eyre!("Inspector task failed: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
