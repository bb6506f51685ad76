/*!
CONFIGURATION - Variables d'environnement du relais

Requises : MQTT_BROKER_URL, BOT_TOKEN, BOT_CHAT_ID, DATA_DIR, GEODATADIR.
Optionnelles : MQTT_USERNAME, MQTT_PASSWORD, MQTT_TOPIC_BASE (défaut
"openwebrx"), BOT_ADMIN_ID (ids séparés par des virgules), REPORT_EU_FLAG
(défaut activé), RUST_LOG.

Toutes les variables manquantes sont rapportées d'un bloc avant de quitter,
aucune connexion n'est tentée avec une configuration incomplète.
*/

use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt_broker_url: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_base: String,
    pub bot_token: String,
    pub bot_chat_id: i64,
    pub admin_ids: Vec<i64>,
    pub data_dir: PathBuf,
    pub geodata_dir: PathBuf,
    pub report_eu_flag: bool,
}

const REQUIRED_VARS: [&str; 5] = [
    "MQTT_BROKER_URL",
    "BOT_TOKEN",
    "BOT_CHAT_ID",
    "DATA_DIR",
    "GEODATADIR",
];

pub fn load_config() -> anyhow::Result<Config> {
    let missing: Vec<&str> = REQUIRED_VARS
        .iter()
        .filter(|key| env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!(
            "missing required environment variables: {}",
            missing.join(", ")
        );
    }

    let bot_chat_id = env::var("BOT_CHAT_ID")
        .unwrap()
        .trim()
        .parse::<i64>()
        .context("BOT_CHAT_ID must be a numeric chat id")?;

    Ok(Config {
        mqtt_broker_url: env::var("MQTT_BROKER_URL").unwrap(),
        mqtt_username: env::var("MQTT_USERNAME").ok().filter(|v| !v.is_empty()),
        mqtt_password: env::var("MQTT_PASSWORD").ok().filter(|v| !v.is_empty()),
        mqtt_topic_base: env::var("MQTT_TOPIC_BASE").unwrap_or_else(|_| "openwebrx".into()),
        bot_token: env::var("BOT_TOKEN").unwrap(),
        bot_chat_id,
        admin_ids: parse_admin_ids(&env::var("BOT_ADMIN_ID").unwrap_or_default()),
        data_dir: PathBuf::from(env::var("DATA_DIR").unwrap()),
        geodata_dir: PathBuf::from(env::var("GEODATADIR").unwrap()),
        report_eu_flag: parse_flag(env::var("REPORT_EU_FLAG").ok().as_deref(), true),
    })
}

/// Liste d'ids admin séparés par des virgules ; les entrées non numériques
/// sont ignorées silencieusement.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|id| id.parse::<i64>().ok())
        .collect()
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(v) => !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no"),
        None => default,
    }
}

/// `mqtt://host[:port]`, `tcp://host[:port]` ou `host[:port]` nu ;
/// port par défaut 1883.
pub fn parse_broker_addr(url: &str) -> anyhow::Result<(String, u16)> {
    let stripped = url
        .trim()
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://")
        .trim_end_matches('/');
    if stripped.is_empty() {
        bail!("empty MQTT broker URL");
    }
    match stripped.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid MQTT broker port in {url}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((stripped.to_string(), 1883)),
    }
}
