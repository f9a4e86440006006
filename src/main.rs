use std::time::Duration;

use clap::Parser;
use pl320_bridge::{
    bridge::{Bridge, MqttPublisher},
    error::Result,
    prologix::Prologix,
    psu::Pl320,
    topics,
};
use rumqttc::{AsyncClient, MqttOptions, QoS, Transport};
use tracing::{error, info};

/// How often the full state snapshot is republished.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

const BAUD_RATE: u32 = 9600;
/// Bounds every exchange with the supply.
const SERIAL_TIMEOUT: Duration = Duration::from_secs(1);
const MQTT_CLIENT_ID: &str = "PL320";

/// Bridge a PL320 bench power supply to an MQTT broker.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// MQTT broker hostname (TLS).
    broker: String,
    /// MQTT broker port.
    port: u16,
    /// MQTT username.
    username: String,
    /// MQTT password.
    password: String,
    /// Serial device the GPIB controller is attached to.
    device: String,
    /// GPIB bus address of the power supply.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=30))]
    address: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let port = serialport::new(&args.device, BAUD_RATE)
        .timeout(SERIAL_TIMEOUT)
        .open()?;
    let link = Prologix::open(port, args.address)?;
    info!(device = %args.device, address = args.address, "controller ready");

    let mut options = MqttOptions::new(MQTT_CLIENT_ID, &args.broker, args.port);
    options.set_credentials(&args.username, &args.password);
    options.set_transport(Transport::tls_with_default_config());
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    for topic in topics::SUBSCRIPTIONS {
        client.subscribe(topic, QoS::AtMostOnce).await?;
    }

    let mut bridge = Bridge::new(Pl320::new(link), MqttPublisher::new(client.clone()));
    info!(broker = %args.broker, port = args.port, "running");

    let outcome = tokio::select! {
        result = bridge.run(&mut eventloop, TICK_INTERVAL) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };
    if let Err(e) = &outcome {
        error!(error = %e, "bridge stopped");
    }

    // Disconnect the broker session cleanly; the serial port is released by
    // drop on every exit path.
    let _ = client.disconnect().await;
    outcome
}
