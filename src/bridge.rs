//! Synchronization loop keeping bus-visible state consistent with the
//! supply.

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    psu::Pl320,
    topics,
};

/// Sink for outbound state publishes.
///
/// The loop only needs fire-and-forget text publishes; keeping this behind
/// a trait lets tests capture the outbound traffic without a broker.
#[async_trait]
pub trait StatePublisher {
    async fn publish(&mut self, topic: &str, payload: String) -> Result<()>;
}

/// [`StatePublisher`] backed by the shared MQTT client.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatePublisher for MqttPublisher {
    async fn publish(&mut self, topic: &str, payload: String) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }
}

/// A control message parsed off the bus.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    SetVoltage(u32),
    SetCurrentLimit(u32),
    SetReportDraw(bool),
}

impl Command {
    /// Parse an inbound message. `None` for topics the bridge does not
    /// handle.
    fn parse(topic: &str, payload: &[u8]) -> Result<Option<Command>> {
        let cmd = match topic {
            topics::SET_VOLTAGE => Command::SetVoltage(parse_milli(topic, payload)?),
            topics::SET_CURRENT_LIMIT => Command::SetCurrentLimit(parse_milli(topic, payload)?),
            // Anything but the exact literal means false.
            topics::SET_REPORT_DRAW => {
                Command::SetReportDraw(payload == topics::TRUE_LITERAL.as_bytes())
            }
            _ => return Ok(None),
        };
        Ok(Some(cmd))
    }
}

fn parse_milli(topic: &str, payload: &[u8]) -> Result<u32> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|text| text.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::InvalidPayload {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
}

/// Outbound topics, in the order a snapshot publishes them.
#[derive(Debug, Clone, Copy, EnumIter)]
enum ReadTopic {
    CurrentDraw,
    VoltageSetpoint,
    CurrentLimit,
    ReportDraw,
}

impl ReadTopic {
    fn name(self) -> &'static str {
        match self {
            ReadTopic::CurrentDraw => topics::CURRENT_DRAW,
            ReadTopic::VoltageSetpoint => topics::VOLTAGE_SETPOINT,
            ReadTopic::CurrentLimit => topics::CURRENT_LIMIT,
            ReadTopic::ReportDraw => topics::REPORT_DRAW,
        }
    }
}

/// Single-actor loop tying the instrument to the bus.
///
/// Every handler runs to completion before the next message or tick is
/// looked at, so the state needs no locking. Serial exchanges inside a
/// handler block the loop for at most one read timeout.
pub struct Bridge<S: Read + Write, P: StatePublisher> {
    psu: Pl320<S>,
    publisher: P,
    report_draw: bool,
}

impl<S: Read + Write, P: StatePublisher> Bridge<S, P> {
    /// Build the loop state. Draw reporting starts disabled.
    pub fn new(psu: Pl320<S>, publisher: P) -> Self {
        Self {
            psu,
            publisher,
            report_draw: false,
        }
    }

    /// Apply one inbound bus message to the instrument state.
    ///
    /// Unparseable payloads are a recoverable error and leave state
    /// unchanged; unrecognized topics are ignored.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        match Command::parse(topic, payload)? {
            Some(Command::SetVoltage(mv)) => {
                debug!(mv, "setting output voltage");
                self.psu.set_voltage_mv(mv)
            }
            Some(Command::SetCurrentLimit(ma)) => {
                debug!(ma, "setting current limit");
                self.psu.set_current_limit_ma(ma)
            }
            Some(Command::SetReportDraw(enabled)) => {
                debug!(enabled, "draw reporting toggled");
                self.report_draw = enabled;
                Ok(())
            }
            None => {
                debug!(topic, "ignoring message on unhandled topic");
                Ok(())
            }
        }
    }

    /// Publish the complete observable state, one message per topic.
    ///
    /// Runs unconditionally every tick, whether or not anything changed, so
    /// observers always see a full self-consistent snapshot.
    pub async fn publish_snapshot(&mut self) -> Result<()> {
        for topic in ReadTopic::iter() {
            let payload = self.topic_value(topic)?;
            self.publisher.publish(topic.name(), payload).await?;
        }
        Ok(())
    }

    fn topic_value(&mut self, topic: ReadTopic) -> Result<String> {
        let value = match topic {
            // The device is only consulted while reporting is enabled.
            ReadTopic::CurrentDraw if !self.report_draw => "0".to_string(),
            ReadTopic::CurrentDraw => match self.psu.read_current_draw_ma() {
                Ok(ma) => ma.to_string(),
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "draw read failed, republishing last value");
                    self.psu.current_draw_ma().to_string()
                }
                Err(e) => return Err(e),
            },
            ReadTopic::VoltageSetpoint => self.psu.voltage_mv().to_string(),
            ReadTopic::CurrentLimit => self.psu.current_limit_ma().to_string(),
            ReadTopic::ReportDraw => topics::bool_literal(self.report_draw).to_string(),
        };
        Ok(value)
    }

    /// Drive the loop until a fatal error.
    ///
    /// The zeroed startup snapshot goes out before anything else so
    /// observers get a deterministic starting point. After that the loop
    /// applies inbound messages as they arrive and republishes the full
    /// snapshot once per tick.
    pub async fn run(&mut self, eventloop: &mut EventLoop, tick: Duration) -> Result<()> {
        self.publish_snapshot().await?;

        let mut ticker = tokio::time::interval(tick);
        // The first interval tick completes immediately and is already
        // covered by the startup snapshot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.publish_snapshot().await?,
                event = eventloop.poll() => match event? {
                    Event::Incoming(Packet::Publish(msg)) => {
                        if let Err(e) = self.handle_message(&msg.topic, &msg.payload) {
                            if e.is_recoverable() {
                                warn!(error = %e, "rejected inbound message");
                            } else {
                                return Err(e);
                            }
                        }
                    }
                    _ => {}
                },
            }
        }
    }
}
