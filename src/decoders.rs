/*!
FORMATTEUR DÉCODEURS - Rendu /last par mode (FT8/FT4, ADSB, AIS, APRS, VDL2)

RÔLE :
Transforme une tranche d'enregistrements (déjà triés du plus récent au plus
ancien par l'appelant) en un message MarkdownV2 multi-lignes, une entrée
"▶" par enregistrement, rendu spécifique au mode.

Chaque segment optionnel est gardé individuellement : champ absent ou
invalide → segment omis, le formatteur ne lève jamais. Les modes inconnus
passent par le rendu générique clé/valeur.
*/

use crate::markup::{
    degrees_to_compass, escape, feet_to_km, format_timestamp, json_number, knots_to_kmh,
};
use crate::models::DecoderMode;
use serde_json::Value;

pub fn format_last_messages(records: &[Value], mode: &DecoderMode) -> String {
    let mut reply = format!("Last messages in mode *{}*\\:\n", escape(mode.tag()));

    for record in records {
        reply.push_str("\n▶ ");
        match mode {
            DecoderMode::Ft8 | DecoderMode::Ft4 => push_ft8(&mut reply, record),
            DecoderMode::Adsb => push_adsb(&mut reply, record),
            DecoderMode::Ais => push_ais(&mut reply, record),
            DecoderMode::Aprs => push_aprs(&mut reply, record),
            DecoderMode::Vdl2 => push_vdl2(&mut reply, record),
            DecoderMode::Other(_) => push_generic(&mut reply, record),
        }
    }

    reply
}

fn str_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn num_field(record: &Value, key: &str) -> Option<f64> {
    record.get(key).and_then(json_number)
}

/// Champ affichable tel quel : chaîne ou nombre (les ICAO arrivent sous les
/// deux formes selon le décodeur).
fn display_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_field(record: &Value) -> Option<String> {
    num_field(record, "timestamp").map(|ms| format_timestamp(ms as i64))
}

fn freq_mhz(record: &Value) -> Option<String> {
    num_field(record, "freq").map(|f| format!("{:.3}", f / 1e6))
}

fn map_link(record: &Value) -> Option<String> {
    let lat = num_field(record, "lat")?;
    let lon = num_field(record, "lon")?;
    Some(format!(
        "[Map](https://www.openstreetmap.org/?mlat={lat}&mlon={lon}) "
    ))
}

fn push_ft8(reply: &mut String, record: &Value) {
    let ts = timestamp_field(record).unwrap_or_default();
    let freq = freq_mhz(record).unwrap_or_else(|| "NaN".into());
    let callsign = str_field(record, "callsign").unwrap_or("");
    let locator = str_field(record, "locator").unwrap_or("");
    let country = str_field(record, "country").unwrap_or("");
    let text = str_field(record, "msg").unwrap_or("");
    reply.push_str(&format!(
        "__{}__ \\({} _MHz_\\) *[{}](https://qrz.com/db/{})* \\[_QTH_\\: {}, {}\\]\\: {}",
        escape(&ts),
        escape(&freq),
        escape(callsign),
        callsign,
        escape(locator),
        escape(country),
        escape(text)
    ));
}

fn push_adsb(reply: &mut String, record: &Value) {
    let ts = timestamp_field(record).unwrap_or_default();
    let aircraft = str_field(record, "aircraft").unwrap_or("");
    let icao = display_field(record, "icao").unwrap_or_default();
    reply.push_str(&format!(
        "__{}__ *{} [{}](https://www.planespotters.net/hex/{})* ",
        escape(&ts),
        escape(aircraft),
        escape(&icao),
        icao
    ));
    if let Some(flight) = str_field(record, "flight") {
        reply.push_str(&format!(
            "\\[[{}](https://www.flightradar24.com/{})\\] ",
            escape(flight),
            flight
        ));
    }
    if let Some(alt) = num_field(record, "altitude") {
        reply.push_str(&format!(
            "Alt: *{}* km ",
            escape(&format!("{:.2}", feet_to_km(alt)))
        ));
    }
    if let Some(speed) = num_field(record, "speed") {
        reply.push_str(&format!(
            "Spd: *{}* km/h ",
            escape(&format!("{:.2}", knots_to_kmh(speed)))
        ));
    }
    if let Some(course) = num_field(record, "course") {
        reply.push_str(&format!("Dir: *{}* ", escape(degrees_to_compass(course))));
    }
    if let Some(country) = str_field(record, "country") {
        reply.push_str(&format!("\\[{}\\] ", escape(country)));
    }
    if let Some(link) = map_link(record) {
        reply.push_str(&link);
    }
}

fn push_ais(reply: &mut String, record: &Value) {
    // Les trames NMEA brutes ne portent rien d'affichable
    if str_field(record, "type") == Some("nmea") {
        reply.push_str("NMEA Message");
        return;
    }
    let ts = timestamp_field(record).unwrap_or_default();
    reply.push_str(&format!("__{}__ ", escape(&ts)));
    if let Some(object) = str_field(record, "object") {
        reply.push_str(&format!(
            "\\[[{}](https://www.vesselfinder.com/vessels/details/{})\\] ",
            escape(object),
            object
        ));
    }
    if let Some(speed) = num_field(record, "speed") {
        reply.push_str(&format!(
            "Spd: *{}* km/h ",
            escape(&format!("{:.2}", knots_to_kmh(speed)))
        ));
    }
    if let Some(course) = num_field(record, "course") {
        reply.push_str(&format!("Dir: *{}* ", escape(degrees_to_compass(course))));
    }
    if let Some(country) = str_field(record, "country") {
        reply.push_str(&format!("\\({}\\) ", escape(country)));
    }
    if let Some(link) = map_link(record) {
        reply.push_str(&link);
    }
    if let Some(comment) = str_field(record, "comment") {
        reply.push_str(&format!("\\[{}\\] ", escape(comment)));
    }
}

/// Retire un suffixe SSID "-<chiffres>" d'un indicatif APRS.
fn strip_ssid(callsign: &str) -> &str {
    match callsign.rfind('-') {
        Some(i)
            if i + 1 < callsign.len()
                && callsign[i + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &callsign[..i]
        }
        _ => callsign,
    }
}

fn push_aprs(reply: &mut String, record: &Value) {
    // Le timestamp n'est rendu que s'il est présent (la source historique
    // avait un défaut de précédence qui le rendait inopérant)
    if let Some(ts) = timestamp_field(record) {
        reply.push_str(&format!("__{}__ ", escape(&ts)));
    }
    if let Some(source) = str_field(record, "source") {
        reply.push_str(&format!(
            "*[{}](https://aprs.fi/#!z=11&call=a%2F{}&timerange=3600&tail=3600) \\[[QRZ](https://www.qrz.com/db/{})\\]* ",
            escape(source),
            source,
            escape(strip_ssid(source))
        ));
    }
    if let Some(destination) = str_field(record, "destination") {
        reply.push_str(&format!("→ *{}* ", escape(destination)));
    }
    // Altitude APRS déjà en mètres, pas de conversion
    if let Some(alt) = num_field(record, "altitude") {
        reply.push_str(&format!("Alt: *{}* m ", escape(&format!("{alt:.2}"))));
    }
    if let Some(speed) = num_field(record, "speed") {
        reply.push_str(&format!(
            "Spd: *{}* km/h ",
            escape(&format!("{:.2}", knots_to_kmh(speed)))
        ));
    }
    if let Some(course) = num_field(record, "course") {
        reply.push_str(&format!("Dir: *{}* ", escape(degrees_to_compass(course))));
    }
    if let Some(country) = str_field(record, "country") {
        reply.push_str(&format!("\\({}\\) ", escape(country)));
    }
    if let Some(link) = map_link(record) {
        reply.push_str(&link);
    }
    if let Some(comment) = str_field(record, "comment") {
        reply.push_str(&format!("\\[{}\\] ", escape(comment)));
    }
}

fn push_vdl2(reply: &mut String, record: &Value) {
    let Some(vdl2) = record.pointer("/data/vdl2") else {
        // structure imbriquée absente → dump JSON brut
        reply.push_str(&escape(&record.to_string()));
        return;
    };
    let ts = timestamp_field(record).unwrap_or_default();
    reply.push_str(&format!("__{}__", escape(&ts)));
    if let Some(freq) = num_field(vdl2, "freq").map(|f| format!("{:.3}", f / 1e6)) {
        reply.push_str(&format!(" \\({} _MHz_\\)", escape(&freq)));
    }
    if let Some(icao) = display_field(record, "icao") {
        reply.push_str(&format!(
            " *[{}](https://www.planespotters.net/hex/{})*",
            escape(&icao),
            icao
        ));
    }
    if let Some(country) = str_field(record, "country") {
        reply.push_str(&format!(" \\[{}\\]", escape(country)));
    }
    if let Some(kind) = str_field(record, "type") {
        reply.push_str(&format!(" \\({}\\)", escape(kind)));
    }
    if let Some(avlc) = vdl2.get("avlc") {
        if let Some(addr) = avlc.pointer("/src/addr").and_then(Value::as_str) {
            reply.push_str(&format!(
                " SRC: *[{}](https://www.planespotters.net/hex/{})*",
                escape(addr),
                addr
            ));
        }
        if let Some(kind) = avlc.pointer("/src/type").and_then(Value::as_str) {
            reply.push_str(&format!(" \\({}\\)", escape(kind)));
        }
        if let Some(addr) = avlc.pointer("/dst/addr").and_then(Value::as_str) {
            reply.push_str(&format!(
                " → DST: *[{}](https://www.planespotters.net/hex/{})*",
                escape(addr),
                addr
            ));
        }
        if let Some(kind) = avlc.pointer("/dst/type").and_then(Value::as_str) {
            reply.push_str(&format!(" \\({}\\)", escape(kind)));
        }
        if let Some(pkt) = avlc.pointer("/x25/pkt_type_name").and_then(Value::as_str) {
            reply.push_str(&format!(" \\[{}\\]", escape(pkt)));
        }
        if let Some(pdu) = avlc.pointer("/x25/clnp/pdu_id") {
            if !pdu.is_null() {
                reply.push_str(&format!(" PDU: {}", escape(&scalar_to_string(pdu))));
            }
        }
    }
    if let Some(link) = map_link(record) {
        reply.push_str(&link);
    }
}

fn push_generic(reply: &mut String, record: &Value) {
    if let Some(ts) = timestamp_field(record) {
        reply.push_str(&format!("__{}__\\: ", escape(&ts)));
    }
    if let Some(freq) = freq_mhz(record) {
        reply.push_str(&format!("Freq: *{}* _MHz_", escape(&freq)));
    }
    match record.as_object() {
        Some(fields) => {
            for (key, value) in fields {
                if key == "timestamp" || key == "freq" {
                    continue;
                }
                reply.push_str(&format!(
                    ", *{}*: {}",
                    escape(key),
                    escape(&scalar_to_string(value))
                ));
            }
        }
        None => reply.push_str(&escape(&record.to_string())),
    }
}

/// Scalaires affichés nus, objets et tableaux en JSON compact.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => other.to_string(),
    }
}
