// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT ingress.
//!
//! Subscribes to every configured topic and hands each publish to
//! [`Bridge::on_message`]. Subscriptions are re-issued on every ConnAck so
//! they survive broker reconnects.

use crate::bridge::Bridge;
use crate::config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use std::sync::Arc;
use std::time::Duration;

/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the request channel between client handle and event loop.
const REQUEST_CAPACITY: usize = 64;

/// MQTT subscriber feeding a [`Bridge`].
pub struct MqttIngress {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Vec<String>,
    endpoint: String,
}

impl MqttIngress {
    /// Create the client. No connection is made until [`run`](Self::run).
    pub fn new(config: &MqttConfig, topics: Vec<String>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let Some(user) = config.username.as_deref() {
            options.set_credentials(user, config.password.as_deref().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Self {
            client,
            eventloop,
            topics,
            endpoint: format!("{}:{}", config.host, config.port),
        }
    }

    /// Client handle, used to disconnect on shutdown.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Poll the connection forever, forwarding publishes to `bridge`.
    pub async fn run(mut self, bridge: Arc<Bridge>) {
        tracing::info!(endpoint = %self.endpoint, "MQTT connecting");

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    bridge.on_message(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(endpoint = %self.endpoint, "MQTT connected");
                    self.subscribe_all();
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("MQTT disconnected by broker");
                }
                Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                    tracing::info!("MQTT disconnected");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "MQTT connection error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn subscribe_all(&self) {
        if self.topics.is_empty() {
            return;
        }
        let filters = self
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce));

        // The event loop is the one draining the request channel, so it must
        // not block on it here.
        match self.client.try_subscribe_many(filters) {
            Ok(()) => tracing::info!(topics = self.topics.len(), "MQTT subscribed"),
            Err(e) => tracing::error!(error = %e, "MQTT subscribe failed"),
        }
    }
}
