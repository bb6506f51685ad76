/*!
OPENWEBRX TELEGRAM BOT - Point d'entrée du relais de notifications

RÔLE :
Bootstrap complet : .env, logging, vérification de la configuration
(fatale si incomplète), ouverture de la base géo, chargement des alias,
puis démarrage des deux boucles d'événements (poll MQTT, long polling
Telegram) et attente d'un signal d'arrêt.

ARCHITECTURE : MQTT → formatteurs/buffers → Telegram, état partagé possédé
par le RelayBot. Voir bot.rs pour le dispatch.
*/

mod aliases;
mod bot;
mod client_event;
mod config;
mod decoders;
mod geo;
mod markup;
mod models;
mod mqtt;
mod ring;
mod rx_status;
mod telegram;

use crate::aliases::AliasTable;
use crate::bot::RelayBot;
use crate::geo::{GeoResolver, MaxmindResolver, NoGeo};
use crate::telegram::TelegramApi;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // .env optionnel, les variables d'environnement réelles priment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting owrx-telegram-bot v{}...", env!("CARGO_PKG_VERSION"));

    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[bot] {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cfg.data_dir) {
        warn!("failed to create data dir {}: {}", cfg.data_dir.display(), e);
    }

    let geo: Box<dyn GeoResolver> = match MaxmindResolver::open(&cfg.geodata_dir) {
        Ok(resolver) => Box::new(resolver),
        Err(e) => {
            warn!(target: "geo", "GeoLite2 database unavailable ({e}), notifications will have no geo line");
            Box::new(NoGeo)
        }
    };

    let aliases = AliasTable::load(cfg.data_dir.join("aliases.json"));
    let api = TelegramApi::new(&cfg.bot_token);

    let opts = match mqtt::mqtt_options(&cfg) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("[bot] invalid MQTT configuration: {e}");
            std::process::exit(1);
        }
    };

    info!("connecting to MQTT broker at {}...", cfg.mqtt_broker_url);
    let topic_base = cfg.mqtt_topic_base.clone();
    let bot = Arc::new(RelayBot::new(cfg, api, geo, aliases));
    mqtt::spawn_mqtt_listener(opts, topic_base, bot.clone());

    info!("starting Telegram bot...");
    tokio::select! {
        _ = bot.run_telegram_loop() => {}
        _ = shutdown_signal() => {
            info!("terminating...");
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            // au pire il reste Ctrl-C
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
