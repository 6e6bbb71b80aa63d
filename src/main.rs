use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use eframe::egui;
use log::{error, info, warn};

use trackhub::app::TrackHubApp;
use trackhub::calibration::{CalibrationData, CalibrationTap};
use trackhub::config::ConfigManager;
use trackhub::logger;
use trackhub::mqtt::run_mqtt_client;
use trackhub::postural::{InteractionBox, PosturalRecorder};
use trackhub::task::{RunContext, SampleProducer};
use trackhub::types::{FrameFanout, FrameSink, Vector3};

const CONFIG_PATH: &str = "trackhub.toml";

fn main() {
    logger::init_logger();
    info!("Application starting");

    let config = match ConfigManager::load_or_default(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration in {}: {}", CONFIG_PATH, e);
            std::process::exit(1);
        }
    };
    let app_config = config.get_config().clone();

    let context = Arc::new(RunContext::new((
        f64::from(app_config.window.width),
        f64::from(app_config.window.height),
    )));
    match CalibrationData::load(app_config.calibration_path()) {
        Ok(calibration) => {
            info!("Calibration loaded: {:.3} px/mm", calibration.ppmm);
            context.set_calibration(calibration);
        }
        Err(e) => warn!("No usable calibration ({}), calibration required", e),
    }

    let (tap, calibration_receiver) = CalibrationTap::new(app_config.channels.calibration_channel_capacity);
    let tap = Arc::new(tap);
    let [cx, cy, cz] = app_config.postural.box_center_mm;
    let [sx, sy, sz] = app_config.postural.box_size_mm;
    let recorder = Arc::new(PosturalRecorder::new(
        app_config.postural.trigger,
        InteractionBox::new(Vector3::new(cx, cy, cz), Vector3::new(sx, sy, sz)),
        app_config.postural.duration_s,
    ));

    let sinks: Vec<Arc<dyn FrameSink>> = vec![
        Arc::new(SampleProducer::new(Arc::clone(&context))),
        Arc::clone(&tap) as Arc<dyn FrameSink>,
        Arc::clone(&recorder) as Arc<dyn FrameSink>,
    ];
    let fanout: Arc<dyn FrameSink> = Arc::new(FrameFanout::new(sinks));

    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let mqtt_shutdown = Arc::clone(&shutdown_signal);
    let mqtt_config = app_config.mqtt.clone();
    let mqtt_handle = thread::spawn(move || {
        if let Err(e) = run_mqtt_client(mqtt_config, fanout, mqtt_shutdown) {
            error!("MQTT thread failed: {}", e);
        }
    });

    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([app_config.window.width, app_config.window.height])
        .with_resizable(true);
    if app_config.window.fullscreen {
        viewport = viewport.with_fullscreen(true);
    }
    let options = eframe::NativeOptions {
        vsync: app_config.window.vsync,
        hardware_acceleration: eframe::HardwareAcceleration::Preferred,
        viewport,
        ..Default::default()
    };

    let title = app_config.window.title.clone();
    if let Err(e) = eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| {
            Ok(Box::new(TrackHubApp::new(
                config,
                context,
                tap,
                calibration_receiver,
                recorder,
            )))
        }),
    ) {
        error!("GUI failed: {}", e);
        std::process::exit(1);
    }

    info!("GUI closed, signaling MQTT thread to shutdown");
    shutdown_signal.store(true, Ordering::Relaxed);

    match mqtt_handle.join() {
        Ok(()) => info!("MQTT thread shut down gracefully"),
        Err(e) => error!("MQTT thread panicked: {:?}", e),
    }
}
