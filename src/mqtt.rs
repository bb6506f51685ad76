/*!
ÉCOUTE MQTT - Abonnement aux topics OpenWebRX et boucle de poll rumqttc

Abonnements : `<base>/+` (décodeurs sans récepteur) et `<base>/+/+`
(récepteur/action), QoS AtLeastOnce, réabonnement à chaque ConnAck pour
survivre aux reconnexions du broker. Une erreur de poll est loggée puis la
boucle repart après une courte pause.
*/

use crate::bot::RelayBot;
use crate::config::{parse_broker_addr, Config};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, info};

pub fn mqtt_options(cfg: &Config) -> anyhow::Result<MqttOptions> {
    let (host, port) = parse_broker_addr(&cfg.mqtt_broker_url)?;
    let mut opts = MqttOptions::new("owrx-telegram-bot", host, port);
    opts.set_keep_alive(Duration::from_secs(30));
    if let (Some(user), Some(pass)) = (&cfg.mqtt_username, &cfg.mqtt_password) {
        opts.set_credentials(user.clone(), pass.clone());
    }
    Ok(opts)
}

pub fn spawn_mqtt_listener(opts: MqttOptions, topic_base: String, bot: Arc<RelayBot>) {
    task::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!(target: "mqtt", "connected to broker, subscribing to {}/#", topic_base);
                    for pattern in [format!("{topic_base}/+"), format!("{topic_base}/+/+")] {
                        if let Err(e) = client.subscribe(&pattern, QoS::AtLeastOnce).await {
                            error!(target: "mqtt", "subscribe {} failed: {}", pattern, e);
                        }
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    debug!(target: "mqtt", "message on {}", publish.topic);
                    bot.handle_bus_message(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(target: "mqtt", "MQTT error: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
