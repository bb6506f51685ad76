//! Types partagés : topic MQTT décomposé et identifiant de mode décodeur.

/// Topic `base/[receiver/]action` décomposé. `receiver` n'existe que pour
/// les topics à trois segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub receiver: Option<String>,
    pub action: String,
}

impl ParsedTopic {
    pub fn parse(topic: &str) -> Self {
        let parts: Vec<&str> = topic.split('/').collect();
        let receiver = if parts.len() == 3 {
            Some(parts[1].to_string())
        } else {
            None
        };
        let action = parts.last().copied().unwrap_or_default().to_string();
        Self { receiver, action }
    }
}

/// Tag de mode décodeur, normalisé en majuscules. Les modes connus ont une
/// mise en forme dédiée dans `decoders`, tout le reste passe par le rendu
/// générique clé/valeur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderMode {
    Ft8,
    Ft4,
    Adsb,
    Ais,
    Aprs,
    Vdl2,
    Other(String),
}

impl DecoderMode {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_uppercase().as_str() {
            "FT8" => Self::Ft8,
            "FT4" => Self::Ft4,
            "ADSB" => Self::Adsb,
            "AIS" => Self::Ais,
            "APRS" => Self::Aprs,
            "VDL2" => Self::Vdl2,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Ft8 => "FT8",
            Self::Ft4 => "FT4",
            Self::Adsb => "ADSB",
            Self::Ais => "AIS",
            Self::Aprs => "APRS",
            Self::Vdl2 => "VDL2",
            Self::Other(tag) => tag,
        }
    }
}
