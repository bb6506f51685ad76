/*!
CLIENT TELEGRAM - Accès minimal au Bot API (sendMessage, getUpdates,
setMyCommands)

RÔLE :
Le relais n'a besoin que de trois méthodes de l'API ; plutôt qu'un
framework complet, un client HTTP fin au-dessus de reqwest, réponses
désérialisées via serde. Le long polling getUpdates (30 s) remplace les
webhooks : aucune exposition réseau entrante.
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize, Clone)]
pub struct BotCommand {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

pub struct TelegramApi {
    client: reqwest::Client,
    base: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        let client = reqwest::Client::builder()
            // marge au-dessus des 30 s de long polling
            .timeout(Duration::from_secs(50))
            .build()
            .expect("reqwest client");
        Self {
            client,
            base: format!("https://api.telegram.org/bot{token}"),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(&body)
            .send()
            .await?;
        let api: ApiResponse<T> = response.json().await?;
        if api.ok {
            api.result
                .ok_or_else(|| TelegramError::Api("empty result".into()))
        } else {
            Err(TelegramError::Api(
                api.description.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }

    /// Réponse de commande en texte brut.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.call::<Message>("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Notification MarkdownV2, aperçu de lien coupé ; `silent` contrôle la
    /// notification sonore côté client (true pour le trafic relayé).
    pub async fn send_markdown(
        &self,
        chat_id: i64,
        text: &str,
        silent: bool,
    ) -> Result<(), TelegramError> {
        self.call::<Message>(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "MarkdownV2",
                "disable_notification": silent,
                "link_preview_options": { "is_disabled": true }
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"]
            }),
        )
        .await
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TelegramError> {
        self.call::<bool>("setMyCommands", json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}
