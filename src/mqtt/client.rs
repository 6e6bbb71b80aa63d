use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use log::{error, info, warn};
use rumqttc::{Client, Event, LastWill, MqttOptions, Packet, QoS};

use crate::config::MqttConfig;
use crate::types::{FrameSink, SensorFrame};

/// Receives tracking frames and hands each one to `sink` on this thread.
///
/// Credentials come from `MQTT_USER` / `MQTT_PASS` (a `.env` file is read
/// first); `MQTT_HOST` and `MQTT_PORT` override the configured broker.
pub fn run_mqtt_client(
    config: MqttConfig,
    sink: Arc<dyn FrameSink>,
    shutdown_signal: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let mqtt_user = env::var("MQTT_USER")?;
    let mqtt_pass = env::var("MQTT_PASS")?;
    let mqtt_host = env::var("MQTT_HOST").unwrap_or_else(|_| config.broker.clone());
    let mqtt_port = match env::var("MQTT_PORT") {
        Ok(port) => port.parse::<u16>()?,
        Err(_) => config.port,
    };

    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), mqtt_host.clone(), mqtt_port);
    mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    mqtt_options
        .set_keep_alive(Duration::from_secs(u64::from(config.keep_alive.max(1))))
        .set_last_will(LastWill::new(
            format!("{}/status", config.client_id),
            "offline",
            QoS::AtLeastOnce,
            false,
        ));

    let (client, mut connection) = Client::new(mqtt_options, 10);
    client.subscribe(config.topic.as_str(), qos_level(config.qos))?;
    info!("Subscribed to {} on {}:{}", config.topic, mqtt_host, mqtt_port);

    let mut frames: u64 = 0;
    for event in connection.iter() {
        if shutdown_signal.load(Ordering::Relaxed) {
            info!("MQTT thread received shutdown signal after {} frames", frames);
            break;
        }

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == config.topic => {
                match parse_frame(&publish.payload) {
                    Ok(frame) => {
                        frames += 1;
                        sink.on_frame(&frame);
                    }
                    Err(e) => warn!("Invalid frame: {}", e),
                }
            }
            Ok(Event::Incoming(_)) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                return Err(e.into());
            }
            _ => {}
        }
    }

    Ok(())
}

fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

pub fn parse_frame(payload: &[u8]) -> Result<SensorFrame, String> {
    let payload_str = std::str::from_utf8(payload).map_err(|e| format!("Invalid UTF-8: {}", e))?;

    serde_json::from_str::<SensorFrame>(payload_str).map_err(|e| format!("JSON parsing error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_frame_payload() {
        let payload = br#"{"timestamp_us": 42, "hands": [{"palm_position": [1, 2, 3]}]}"#;
        let frame = parse_frame(payload).unwrap();
        assert_eq!(frame.timestamp_us, 42);
        assert_eq!(frame.hands.len(), 1);
        assert!(frame.fingers.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_frame(&[0xff, 0xfe]).unwrap_err().starts_with("Invalid UTF-8"));
        assert!(parse_frame(b"{\"fingers\": []}").unwrap_err().starts_with("JSON"));
    }

    #[test]
    fn qos_defaults_to_at_least_once() {
        assert_eq!(qos_level(0), QoS::AtMostOnce);
        assert_eq!(qos_level(7), QoS::AtLeastOnce);
    }
}
