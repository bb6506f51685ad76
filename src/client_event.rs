/*!
FORMATTEUR CLIENT - Événements de session utilisateur (topic .../CLIENT)

RÔLE :
Transforme un payload CLIENT en ligne MarkdownV2 : corps selon `state`,
puis ligne IP (lien ip-api.com + ville/pays/UE si la géo résout), puis
ligne "Aliases:" quand l'IP tombe dans une plage connue de la table.

Fonction pure hormis l'appel au résolveur géo. Un champ manquant dégrade
en segment omis, jamais en erreur.
*/

use crate::aliases::AliasTable;
use crate::geo::GeoResolver;
use crate::markup::escape;
use serde_json::Value;

/// Politique d'affichage contrôlée par l'appelant.
#[derive(Debug, Clone, Copy)]
pub struct ClientFormatPolicy {
    /// La source géo produit des faux positifs UE, l'annotation est donc
    /// débrayable.
    pub show_eu_flag: bool,
}

impl Default for ClientFormatPolicy {
    fn default() -> Self {
        Self { show_eu_flag: true }
    }
}

pub fn format_client_event(
    data: &Value,
    geo: &dyn GeoResolver,
    aliases: &AliasTable,
    policy: ClientFormatPolicy,
) -> String {
    let mut msg = String::new();

    // Les IP OpenWebRX arrivent souvent en IPv4-mappé-IPv6
    let ip = data
        .get("ip")
        .and_then(Value::as_str)
        .map(|s| s.trim_start_matches("::ffff:").to_string());

    match data.get("state").and_then(Value::as_str) {
        Some("Connected") => msg.push_str("_client connected_"),
        Some("Disconnected") => {
            if data.get("banned").and_then(Value::as_bool).unwrap_or(false) {
                msg.push_str("_client banned_");
            } else {
                msg.push_str("_client disconnected_");
            }
        }
        Some("ChatMessage") => {
            let name = data.get("name").and_then(Value::as_str).unwrap_or("");
            let text = data.get("message").and_then(Value::as_str).unwrap_or("");
            msg.push_str(&format!("*{}*: {}", escape(name), escape(text)));
        }
        // État inconnu : dump JSON échappé du payload complet
        _ => msg.push_str(&escape(&data.to_string())),
    }

    let parsed_ip: Option<std::net::IpAddr> = ip.as_deref().and_then(|s| s.parse().ok());

    if let Some(ip) = ip.as_deref() {
        match parsed_ip.and_then(|addr| geo.resolve(addr)) {
            Some(info) => {
                msg.push_str(&format!(
                    "\n[{}]({})",
                    escape(ip),
                    escape(&format!("https://ip-api.com#{ip}"))
                ));
                if let Some(city) = &info.city {
                    msg.push_str(&format!(", {}", escape(city)));
                }
                if let Some(country) = &info.country {
                    msg.push_str(&format!(", {}", escape(country)));
                }
                if info.is_eu && policy.show_eu_flag {
                    msg.push_str(" \\(EU\\)");
                }
            }
            None => msg.push_str(&format!("\n{}", escape(ip))),
        }
    }

    if let Some(addr) = parsed_ip {
        let names = aliases.lookup(addr);
        if !names.is_empty() {
            let joined: Vec<String> = names.iter().map(|n| escape(n)).collect();
            msg.push_str(&format!("\nAliases: {}", joined.join(", ")));
        }
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::testing::StaticResolver;
    use crate::geo::{GeoInfo, NoGeo};
    use serde_json::json;
    use tempfile::TempDir;

    fn empty_aliases(dir: &TempDir) -> AliasTable {
        AliasTable::load(dir.path().join("aliases.json"))
    }

    #[test]
    fn connected_with_mapped_ipv6_prefix() {
        let dir = TempDir::new().unwrap();
        let msg = format_client_event(
            &json!({ "ip": "::ffff:8.8.8.8", "state": "Connected" }),
            &NoGeo,
            &empty_aliases(&dir),
            ClientFormatPolicy::default(),
        );
        assert!(msg.contains("_client connected_"));
        // préfixe IPv6 retiré, IP échappée
        assert!(msg.contains("8\\.8\\.8\\.8"));
        assert!(!msg.contains("::ffff:"));
    }

    #[test]
    fn geo_data_becomes_hyperlink_city_country() {
        let dir = TempDir::new().unwrap();
        let geo = StaticResolver::new(vec![(
            "8.8.8.8".parse().unwrap(),
            GeoInfo {
                city: Some("Mountain View".into()),
                country: Some("US".into()),
                is_eu: false,
            },
        )]);
        let msg = format_client_event(
            &json!({ "ip": "8.8.8.8", "state": "Connected" }),
            &geo,
            &empty_aliases(&dir),
            ClientFormatPolicy::default(),
        );
        assert!(msg.contains("[8\\.8\\.8\\.8](https://ip\\-api\\.com\\#8\\.8\\.8\\.8)"));
        assert!(msg.contains(", Mountain View, US"));
        assert!(!msg.contains("(EU)"));
    }

    #[test]
    fn eu_flag_follows_caller_policy() {
        let dir = TempDir::new().unwrap();
        let geo = StaticResolver::new(vec![(
            "1.2.3.4".parse().unwrap(),
            GeoInfo {
                city: None,
                country: Some("FR".into()),
                is_eu: true,
            },
        )]);
        let data = json!({ "ip": "1.2.3.4", "state": "Connected" });
        let aliases = empty_aliases(&dir);

        let with_eu =
            format_client_event(&data, &geo, &aliases, ClientFormatPolicy { show_eu_flag: true });
        assert!(with_eu.contains("\\(EU\\)"));

        let without_eu =
            format_client_event(&data, &geo, &aliases, ClientFormatPolicy { show_eu_flag: false });
        assert!(!without_eu.contains("EU"));
    }

    #[test]
    fn banned_disconnect_and_plain_disconnect() {
        let dir = TempDir::new().unwrap();
        let aliases = empty_aliases(&dir);
        let banned = format_client_event(
            &json!({ "ip": "1.1.1.1", "state": "Disconnected", "banned": true }),
            &NoGeo,
            &aliases,
            ClientFormatPolicy::default(),
        );
        assert!(banned.contains("_client banned_"));

        let plain = format_client_event(
            &json!({ "ip": "1.1.1.1", "state": "Disconnected" }),
            &NoGeo,
            &aliases,
            ClientFormatPolicy::default(),
        );
        assert!(plain.contains("_client disconnected_"));
    }

    #[test]
    fn chat_message_bolds_sender_and_escapes_text() {
        let dir = TempDir::new().unwrap();
        let msg = format_client_event(
            &json!({ "state": "ChatMessage", "name": "op_1", "message": "hello. world!" }),
            &NoGeo,
            &empty_aliases(&dir),
            ClientFormatPolicy::default(),
        );
        assert!(msg.contains("*op\\_1*: hello\\. world\\!"));
    }

    #[test]
    fn unknown_state_dumps_escaped_payload() {
        let dir = TempDir::new().unwrap();
        let msg = format_client_event(
            &json!({ "state": "Weird", "extra": 1 }),
            &NoGeo,
            &empty_aliases(&dir),
            ClientFormatPolicy::default(),
        );
        assert!(msg.contains("Weird"));
        assert!(msg.contains("\\{"));
    }

    #[test]
    fn matching_aliases_are_listed() {
        let dir = TempDir::new().unwrap();
        let mut aliases = empty_aliases(&dir);
        aliases.add("HOME", "192.168.0.0/24").unwrap();
        aliases.add("LAN", "192.168.0.0/16").unwrap();
        let msg = format_client_event(
            &json!({ "ip": "::ffff:192.168.0.7", "state": "Connected" }),
            &NoGeo,
            &aliases,
            ClientFormatPolicy::default(),
        );
        assert!(msg.contains("\nAliases: HOME, LAN"));
    }

    #[test]
    fn missing_ip_degrades_to_body_only() {
        let dir = TempDir::new().unwrap();
        let msg = format_client_event(
            &json!({ "state": "Connected" }),
            &NoGeo,
            &empty_aliases(&dir),
            ClientFormatPolicy::default(),
        );
        assert_eq!(msg, "_client connected_");
    }
}
