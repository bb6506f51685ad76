/*!
RELAY CONTROLLER - Cœur du relais : dispatch bus + dispatch commandes

RÔLE :
Possède l'état partagé du process (ring buffers, table d'alias, politique
"show banned") et route chaque message MQTT vers le bon formatteur ou le
bon buffer, chaque commande Telegram vers la bonne opération.

FONCTIONNEMENT :
- topic CLIENT / RX → mise en forme immédiate puis envoi Telegram
- tout autre action = mode décodeur → ring buffer, rien n'est envoyé
- /last retire du buffer, formate, découpe en tranches ≤ 4096 caractères
  (jamais au milieu d'une ligne) et envoie dans l'ordre

Les constructeurs de réponse sont des méthodes synchrones séparées de
l'envoi, sur le modèle de process_command : l'I/O reste aux frontières.
Les verrous parking_lot ne sont jamais tenus à travers un await.
*/

use crate::aliases::{AliasError, AliasTable};
use crate::client_event::{format_client_event, ClientFormatPolicy};
use crate::config::Config;
use crate::decoders::format_last_messages;
use crate::geo::GeoResolver;
use crate::markup::escape;
use crate::models::{DecoderMode, ParsedTopic};
use crate::ring::RingBufferStore;
use crate::rx_status::format_rx_status;
use crate::telegram::{BotCommand, TelegramApi, Update};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Limite Telegram par message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_LAST_COUNT: usize = 10;

pub struct RelayBot {
    cfg: Config,
    api: TelegramApi,
    geo: Box<dyn GeoResolver>,
    buffers: Mutex<RingBufferStore>,
    aliases: Mutex<AliasTable>,
    show_banned: AtomicBool,
}

impl RelayBot {
    pub fn new(cfg: Config, api: TelegramApi, geo: Box<dyn GeoResolver>, aliases: AliasTable) -> Self {
        Self {
            cfg,
            api,
            geo,
            buffers: Mutex::new(RingBufferStore::new()),
            aliases: Mutex::new(aliases),
            show_banned: AtomicBool::new(true),
        }
    }

    pub fn commands() -> Vec<BotCommand> {
        vec![
            BotCommand { command: "help", description: "Show help message" },
            BotCommand { command: "whoami", description: "Get your chat ID and admin status" },
            BotCommand { command: "getid", description: "Get your chat ID and admin status" },
            BotCommand { command: "last", description: "Show the last messages in the specified mode" },
            BotCommand { command: "reportbanned", description: "[admin] Show or hide banned clients when they try to connect" },
            BotCommand { command: "alias", description: "[admin] Alias CIDR (IP/Net Address) to name" },
        ]
    }

    fn is_admin(&self, chat_id: i64) -> bool {
        self.cfg.admin_ids.contains(&chat_id)
    }

    // ------------------------------------------------------------------
    // Côté bus MQTT
    // ------------------------------------------------------------------

    /// Un message bus mal formé est loggé puis ignoré, jamais fatal.
    pub async fn handle_bus_message(&self, topic: &str, payload: &[u8]) {
        let parsed = ParsedTopic::parse(topic);
        let data: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "mqtt", "invalid JSON payload on {}: {}", topic, e);
                return;
            }
        };
        let prefix = parsed
            .receiver
            .as_deref()
            .map(|r| format!("[__*{}*__]: ", escape(r)))
            .unwrap_or_default();

        match parsed.action.as_str() {
            "CLIENT" => {
                debug!(target: "mqtt", "client message on {}", topic);
                if self.is_suppressed_ban(&data) {
                    debug!(target: "mqtt", "banned disconnect suppressed");
                    return;
                }
                let text = {
                    let aliases = self.aliases.lock();
                    let policy = ClientFormatPolicy { show_eu_flag: self.cfg.report_eu_flag };
                    format!(
                        "{prefix}{}",
                        format_client_event(&data, self.geo.as_ref(), &aliases, policy)
                    )
                };
                self.send_notification(&text).await;
            }
            "RX" => {
                debug!(target: "mqtt", "rx message on {}", topic);
                let text = format!("{prefix}{}", format_rx_status(&data));
                self.send_notification(&text).await;
            }
            _ => {
                debug!(target: "decoders", "decoder message on {}", topic);
                self.store_decoder_record(&parsed.action, data);
            }
        }
    }

    fn is_suppressed_ban(&self, data: &Value) -> bool {
        data.get("state").and_then(Value::as_str) == Some("Disconnected")
            && data.get("banned").and_then(Value::as_bool).unwrap_or(false)
            && !self.show_banned.load(Ordering::Relaxed)
    }

    fn store_decoder_record(&self, action: &str, data: Value) {
        // Certains décodeurs publient du JSON ré-encodé dans une chaîne
        let mut record = match data {
            Value::String(inner) => serde_json::from_str(&inner).unwrap_or(Value::String(inner)),
            other => other,
        };
        let mode = record
            .get("mode")
            .and_then(Value::as_str)
            .map(str::to_uppercase)
            .unwrap_or_else(|| action.to_uppercase());
        // `raw` est volumineux et redondant, jamais stocké
        if let Some(fields) = record.as_object_mut() {
            fields.remove("raw");
        }
        self.buffers.lock().push(&mode, record);
    }

    async fn send_notification(&self, text: &str) {
        debug!(target: "telegram", "sending notification: {}", text);
        if let Err(e) = self.api.send_markdown(self.cfg.bot_chat_id, text, true).await {
            // best effort : le message est perdu, le relais continue
            error!(target: "telegram", "failed to send notification: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Côté commandes Telegram
    // ------------------------------------------------------------------

    pub async fn run_telegram_loop(&self) {
        if let Err(e) = self.api.set_my_commands(&Self::commands()).await {
            warn!(target: "telegram", "failed to register commands: {}", e);
        }
        let mut offset = 0i64;
        loop {
            match self.api.get_updates(offset, 30).await {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        self.handle_update(&update).await;
                    }
                }
                Err(e) => {
                    error!(target: "telegram", "getUpdates failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    }

    pub async fn handle_update(&self, update: &Update) {
        let Some(message) = &update.message else { return };
        let Some(text) = message.text.as_deref() else { return };
        let chat_id = message.chat.id;

        let Some(stripped) = text.strip_prefix('/') else {
            let first_name = message
                .from
                .as_ref()
                .map(|u| u.first_name.as_str())
                .unwrap_or("");
            self.reply(chat_id, &self.greeting_reply(first_name, chat_id)).await;
            return;
        };

        let mut tokens = stripped.split_whitespace();
        let Some(command) = tokens.next() else { return };
        // /last@MonBot est équivalent à /last
        let command = command.split('@').next().unwrap_or(command).to_lowercase();
        let args: Vec<&str> = tokens.collect();

        match command.as_str() {
            "start" => self.reply(chat_id, "Type /help to see available commands.").await,
            "help" => self.reply(chat_id, &Self::help_reply()).await,
            "getid" | "whoami" => self.reply(chat_id, &self.getid_reply(chat_id)).await,
            "reportbanned" => self.reply(chat_id, &self.reportbanned_reply(chat_id, &args)).await,
            "alias" => self.reply(chat_id, &self.alias_reply(chat_id, &args)).await,
            "last" => {
                for chunk in self.last_chunks(&args) {
                    self.reply_markdown(chat_id, chunk.trim()).await;
                }
            }
            other => debug!(target: "telegram", "ignoring unknown command /{}", other),
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text).await {
            error!(target: "telegram", "failed to reply: {}", e);
        }
    }

    async fn reply_markdown(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.api.send_markdown(chat_id, text, false).await {
            error!(target: "telegram", "failed to reply: {}", e);
        }
    }

    fn help_reply() -> String {
        Self::commands()
            .iter()
            .map(|c| format!("/{} - {}", c.command, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn greeting_reply(&self, first_name: &str, chat_id: i64) -> String {
        format!(
            "Hello {first_name}, your Chat ID is: {chat_id} (Admin: {}).\nType /help to see available commands.",
            if self.is_admin(chat_id) { "Yes" } else { "No" }
        )
    }

    fn getid_reply(&self, chat_id: i64) -> String {
        format!(
            "Your chat ID is: {chat_id} (Admin: {})",
            if self.is_admin(chat_id) { "Yes" } else { "No" }
        )
    }

    fn reportbanned_reply(&self, chat_id: i64, args: &[&str]) -> String {
        if !self.is_admin(chat_id) {
            return "You are not an admin, this command is restricted.".into();
        }
        match args.first().map(|a| a.to_lowercase()) {
            None => format!(
                "Show banned is currently {}.\nUsage: /reportbanned <on|off>",
                if self.show_banned.load(Ordering::Relaxed) { "ON" } else { "OFF" }
            ),
            Some(arg) if arg == "on" || arg == "off" => {
                self.show_banned.store(arg == "on", Ordering::Relaxed);
                format!(
                    "Show banned is now {}.",
                    if arg == "on" { "ON" } else { "OFF" }
                )
            }
            Some(_) => "Usage: /reportbanned <on|off>".into(),
        }
    }

    fn alias_reply(&self, chat_id: i64, args: &[&str]) -> String {
        if !self.is_admin(chat_id) {
            return "You are not an admin, this command is restricted.".into();
        }
        if args.is_empty() {
            let aliases = self.aliases.lock();
            if aliases.is_empty() {
                return "No IP aliases are currently set.".into();
            }
            let listing = aliases
                .iter()
                .map(|(name, ranges)| format!("{}: {}", name, ranges.join(", ")))
                .collect::<Vec<_>>()
                .join("\n");
            return format!("Current IP aliases:\n{listing}");
        }
        if args.len() < 3 {
            return "Usage: /alias <add|del> <name> <CIDR>".into();
        }
        let (action, name, cidr) = (args[0], args[1], args[2]);
        match action {
            "add" => match self.aliases.lock().add(name, cidr) {
                Ok(()) => format!("Alias added: {name} -> {cidr}"),
                Err(AliasError::Duplicate(..)) => format!("Alias already exists: {name} -> {cidr}"),
                Err(AliasError::InvalidCidr(..)) => {
                    format!("Invalid CIDR: {cidr}\nUsage: /alias <add|del> <name> <CIDR>")
                }
                Err(e) => e.to_string(),
            },
            "del" => match self.aliases.lock().remove(name, cidr) {
                Ok(()) => format!("Alias removed: {name} -> {cidr}"),
                Err(AliasError::UnknownName(..)) => format!("Alias name not found: {name}"),
                Err(AliasError::UnknownRange(..)) => format!("Alias not found: {name} -> {cidr}"),
                Err(e) => e.to_string(),
            },
            _ => "First argument must be 'add' or 'del'.\nUsage: /alias <add|del> <name> <CIDR>".into(),
        }
    }

    /// Construit la ou les réponses de /last ; les cas d'usage invalide
    /// tiennent en un seul message, un historique long est découpé en
    /// tranches ≤ 4096 caractères aux frontières de ligne.
    fn last_chunks(&self, args: &[&str]) -> Vec<String> {
        if args.is_empty() {
            return vec![format!(
                "Use \\/last \\<_mode_\\> \\[_how many_\\] to see the last messages\\.\nAvailable modes: *{}*",
                self.modes_markdown()
            )];
        }
        let mode = args[0].to_uppercase();
        let count = args
            .get(1)
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(DEFAULT_LAST_COUNT);

        let (known, records) = {
            let buffers = self.buffers.lock();
            (buffers.contains(&mode), buffers.last_n(&mode, count))
        };
        if !known {
            return vec![format!(
                "Mode *{}* not found\\.\nAvailable modes: *{}*",
                escape(args[0]),
                self.modes_markdown()
            )];
        }
        if records.is_empty() {
            return vec![format!("No messages found in mode *{}*\\.", escape(&mode))];
        }

        let reply = format_last_messages(&records, &DecoderMode::from_tag(&mode));
        split_chunks(&reply, MAX_MESSAGE_LENGTH)
    }

    fn modes_markdown(&self) -> String {
        self.buffers
            .lock()
            .modes()
            .iter()
            .map(|m| escape(m))
            .collect::<Vec<_>>()
            .join("*\\, *")
    }
}

/// Découpe `text` en tranches d'au plus `max_len` caractères, uniquement
/// aux frontières de ligne, ordre préservé. Chaque tranche se termine par
/// un unique '\n'.
pub fn split_chunks(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for line in text.trim().split('\n') {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            parts.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
