//! Formatteur RX : changement d'état matériel ou activation de profil
//! (topic .../RX). Une seule ligne, aucun champ n'est obligatoire.

use crate::markup::{escape, json_number};
use serde_json::Value;

pub fn format_rx_status(data: &Value) -> String {
    let source = data.get("source").and_then(Value::as_str).unwrap_or("");
    match data.get("state").and_then(Value::as_str) {
        Some(state) if !state.is_empty() => {
            format!("Device *{}* _{}_", escape(source), escape(state))
        }
        _ => {
            let profile = data.get("profile").and_then(Value::as_str).unwrap_or("");
            // freq absente → NaN MHz, comme le reste de la chaîne l'affiche
            let freq = data
                .get("freq")
                .and_then(json_number)
                .unwrap_or(f64::NAN);
            format!(
                "_Profile on_ *{}*  ⇾  *{}* \\({} MHz\\)",
                escape(source),
                escape(profile),
                escape(&format!("{:.3}", freq / 1e6))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_activation_renders_mhz_with_escaping() {
        let line = format_rx_status(&json!({
            "source": "sdr0", "profile": "20m", "freq": 14_074_000
        }));
        assert!(line.contains("_Profile on_ *sdr0*"));
        assert!(line.contains("⇾  *20m*"));
        assert!(line.contains("\\(14\\.074 MHz\\)"));
    }

    #[test]
    fn device_state_change() {
        let line = format_rx_status(&json!({ "source": "airspy", "state": "failed" }));
        assert_eq!(line, "Device *airspy* _failed_");
    }

    #[test]
    fn missing_freq_renders_nan_instead_of_failing() {
        let line = format_rx_status(&json!({ "source": "sdr1", "profile": "40m" }));
        assert!(line.contains("NaN MHz"));
    }

    #[test]
    fn string_freq_is_parsed() {
        let line = format_rx_status(&json!({
            "source": "sdr0", "profile": "2m", "freq": "145500000"
        }));
        assert!(line.contains("145\\.500 MHz"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let data = json!({ "source": "sdr0", "profile": "20m", "freq": 14_074_000 });
        assert_eq!(format_rx_status(&data), format_rx_status(&data));
    }
}
