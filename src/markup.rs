/*!
MARKUP - Échappement MarkdownV2 et petites conversions d'unités

RÔLE :
Tout texte issu d'un payload MQTT passe par escape() avant d'être inséré
dans un message Telegram. Les balises insérées volontairement par les
formatteurs (gras, liens) ne sont jamais échappées ici.

Contient aussi les helpers numériques partagés par les formatteurs :
timestamp → "YY-MM-DD HH:MM:SS", pieds → km, nœuds → km/h, degrés → rose
des vents 16 secteurs.
*/

use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

/// Caractères réservés par Telegram MarkdownV2 (plus le backslash lui-même).
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Échappe une chaîne pour MarkdownV2. Chaîne vide → chaîne vide.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Rend un timestamp epoch (millisecondes) en "YY-MM-DD HH:MM:SS", fuseau
/// local du process (UTC si l'offset local est indisponible).
pub fn format_timestamp(epoch_millis: i64) -> String {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(epoch_millis as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let local = utc.to_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC));
    format!(
        "{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
        local.year().rem_euclid(100),
        local.month() as u8,
        local.day(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

/// Les payloads décodeurs mélangent nombres et nombres-sous-forme-de-chaîne.
/// Échec de parse → None, l'appelant omet le champ.
pub fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn feet_to_km(feet: f64) -> f64 {
    feet * 0.000_304_8
}

pub fn knots_to_kmh(knots: f64) -> f64 {
    knots * 1.852
}

/// Rose des vents : 16 secteurs de 22,5°, libellé + glyphe directionnel.
/// 360° et 0° retombent tous deux sur le nord.
pub fn degrees_to_compass(degrees: f64) -> &'static str {
    const DIRECTIONS: [&str; 16] = [
        "(N 🢁)", "(NNE 🢁🢅)", "(NE 🢅)", "(ENE 🢂🢅)",
        "(E 🢂)", "(ESE 🢂🢆)", "(SE 🢆)", "(SSE 🢃🢆)",
        "(S 🢃)", "(SSW 🢃🢇)", "(SW 🢇)", "(WSW 🢀🢇)",
        "(W 🢀)", "(WNW 🢀🢄)", "(NW 🢄)", "(NNW 🢁🢄)",
    ];
    let index = (degrees.rem_euclid(360.0) / 22.5).round() as usize % 16;
    DIRECTIONS[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escape_reserved_characters_exactly_once() {
        assert_eq!(escape("8.8.8.8"), "8\\.8\\.8\\.8");
        assert_eq!(escape("a_b*c[d]e"), "a\\_b\\*c\\[d\\]e");
        assert_eq!(escape("(EU)!"), "\\(EU\\)\\!");
        // Les caractères non réservés restent intacts
        assert_eq!(escape("hello world éà"), "hello world éà");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn escape_counts_each_reserved_occurrence() {
        let escaped = escape("a.b.c");
        assert_eq!(escaped.matches('\\').count(), 2);
    }

    #[test]
    fn json_number_accepts_numbers_and_numeric_strings() {
        assert_eq!(json_number(&json!(42)), Some(42.0));
        assert_eq!(json_number(&json!(14.074)), Some(14.074));
        assert_eq!(json_number(&json!("37.5")), Some(37.5));
        assert_eq!(json_number(&json!("pas un nombre")), None);
        assert_eq!(json_number(&json!(null)), None);
        assert_eq!(json_number(&json!({"n": 1})), None);
    }

    #[test]
    fn unit_conversions() {
        assert!((feet_to_km(10_000.0) - 3.048).abs() < 1e-9);
        assert!((knots_to_kmh(100.0) - 185.2).abs() < 1e-9);
    }

    #[test]
    fn compass_sectors() {
        assert_eq!(degrees_to_compass(0.0), "(N 🢁)");
        assert_eq!(degrees_to_compass(360.0), "(N 🢁)");
        assert_eq!(degrees_to_compass(90.0), "(E 🢂)");
        assert_eq!(degrees_to_compass(180.0), "(S 🢃)");
        assert_eq!(degrees_to_compass(270.0), "(W 🢀)");
        // 22.5/2 = 11.25 est la frontière N / NNE, round() bascule sur NNE
        assert_eq!(degrees_to_compass(11.3), "(NNE 🢁🢅)");
        assert_eq!(degrees_to_compass(348.0), "(NNW 🢁🢄)");
        assert_eq!(degrees_to_compass(-90.0), "(W 🢀)");
    }

    #[test]
    fn timestamp_is_zero_padded() {
        // 2021-02-03 04:05:06 UTC = 1612325106000 ms ; seul le motif est
        // vérifié, le fuseau du process pouvant décaler les chiffres.
        let rendered = format_timestamp(1_612_325_106_000);
        assert_eq!(rendered.len(), "YY-MM-DD HH:MM:SS".len());
        assert_eq!(&rendered[2..3], "-");
        assert_eq!(&rendered[8..9], " ");
    }
}
