/*!
ALIAS IP - Table alias → plages CIDR, persistée dans aliases.json

RÔLE :
Associe un nom lisible ("HOME", "VPN"...) à une liste de plages IP/CIDR.
Le formatteur CLIENT s'en sert pour annoter les connexions d'IP connues.

PERSISTANCE :
Réécriture complète du fichier JSON après chaque mutation, via fichier
temporaire puis rename pour ne jamais laisser un fichier tronqué. Un échec
d'écriture est loggé sans annuler la mutation en mémoire : l'état de la
session reste autoritaire, le prochain démarrage repart du dernier état
écrit avec succès.
*/

use ipnetwork::IpNetwork;
use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),
    #[error("alias already exists: {0} -> {1}")]
    Duplicate(String, String),
    #[error("alias name not found: {0}")]
    UnknownName(String),
    #[error("alias not found: {0} -> {1}")]
    UnknownRange(String, String),
}

#[derive(Debug)]
pub struct AliasTable {
    entries: BTreeMap<String, Vec<String>>,
    path: PathBuf,
}

impl AliasTable {
    /// Charge la table depuis `path`. Fichier absent → table vide ; fichier
    /// illisible ou invalide → loggé, table vide.
    pub fn load(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, Vec<String>>>(&raw) {
                Ok(entries) => {
                    info!(target: "aliases", "loaded {} aliases from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    warn!(target: "aliases", "invalid alias file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(target: "aliases", "no alias file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!(target: "aliases", "failed to read {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self { entries, path }
    }

    /// Insère `cidr` dans la liste de `name` puis persiste. Le CIDR doit
    /// être parsable (IP nue acceptée, traitée en réseau hôte).
    pub fn add(&mut self, name: &str, cidr: &str) -> Result<(), AliasError> {
        if cidr.parse::<IpNetwork>().is_err() {
            return Err(AliasError::InvalidCidr(cidr.to_string()));
        }
        let ranges = self.entries.entry(name.to_string()).or_default();
        if ranges.iter().any(|r| r == cidr) {
            return Err(AliasError::Duplicate(name.to_string(), cidr.to_string()));
        }
        ranges.push(cidr.to_string());
        self.save();
        Ok(())
    }

    /// Retire `cidr` de la liste de `name` ; un alias vidé disparaît.
    pub fn remove(&mut self, name: &str, cidr: &str) -> Result<(), AliasError> {
        let ranges = self
            .entries
            .get_mut(name)
            .ok_or_else(|| AliasError::UnknownName(name.to_string()))?;
        let idx = ranges
            .iter()
            .position(|r| r == cidr)
            .ok_or_else(|| AliasError::UnknownRange(name.to_string(), cidr.to_string()))?;
        ranges.remove(idx);
        if ranges.is_empty() {
            self.entries.remove(name);
        }
        self.save();
        Ok(())
    }

    /// Tous les alias dont au moins une plage contient `ip`.
    pub fn lookup(&self, ip: IpAddr) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, ranges)| {
                ranges
                    .iter()
                    .filter_map(|r| r.parse::<IpNetwork>().ok())
                    .any(|net| net.contains(ip))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    // Écriture atomique : temporaire dans le même répertoire puis rename.
    fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!(target: "aliases", "failed to save {}: {}", self.path.display(), e);
        }
    }

    fn try_save(&self) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(dir: &TempDir) -> AliasTable {
        AliasTable::load(dir.path().join("aliases.json"))
    }

    #[test]
    fn add_then_lookup_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.add("HOME", "192.168.0.0/24").unwrap();
        let hits = t.lookup("192.168.0.42".parse().unwrap());
        assert_eq!(hits, vec!["HOME".to_string()]);
        assert!(t.lookup("10.0.0.1".parse().unwrap()).is_empty());
    }

    #[test]
    fn duplicate_range_is_reported_and_list_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.add("HOME", "192.168.0.0/24").unwrap();
        assert_eq!(
            t.add("HOME", "192.168.0.0/24"),
            Err(AliasError::Duplicate("HOME".into(), "192.168.0.0/24".into()))
        );
        let ranges: Vec<_> = t.iter().flat_map(|(_, r)| r.clone()).collect();
        assert_eq!(ranges.len(), 1);
    }

    #[test]
    fn removing_last_range_deletes_the_alias() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.add("VPN", "10.8.0.0/16").unwrap();
        t.remove("VPN", "10.8.0.0/16").unwrap();
        assert!(t.is_empty());
        assert_eq!(
            t.remove("VPN", "10.8.0.0/16"),
            Err(AliasError::UnknownName("VPN".into()))
        );
    }

    #[test]
    fn missing_range_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.add("LAB", "172.16.0.0/12").unwrap();
        assert_eq!(
            t.remove("LAB", "172.16.0.0/16"),
            Err(AliasError::UnknownRange("LAB".into(), "172.16.0.0/16".into()))
        );
    }

    #[test]
    fn invalid_cidr_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        assert_eq!(
            t.add("BAD", "pas-un-cidr"),
            Err(AliasError::InvalidCidr("pas-un-cidr".into()))
        );
        assert!(t.is_empty());
    }

    #[test]
    fn bare_ip_and_ipv6_are_accepted() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.add("DNS", "8.8.8.8").unwrap();
        t.add("V6", "2001:db8::/32").unwrap();
        assert_eq!(t.lookup("8.8.8.8".parse().unwrap()), vec!["DNS".to_string()]);
        assert_eq!(t.lookup("2001:db8::1".parse().unwrap()), vec!["V6".to_string()]);
    }

    #[test]
    fn mutations_survive_a_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aliases.json");
        {
            let mut t = AliasTable::load(path.clone());
            t.add("HOME", "192.168.0.0/24").unwrap();
            t.add("HOME", "192.168.1.0/24").unwrap();
        }
        let t = AliasTable::load(path);
        let ranges: Vec<_> = t.iter().flat_map(|(_, r)| r.clone()).collect();
        // l'ordre d'insertion est conservé
        assert_eq!(ranges, vec!["192.168.0.0/24", "192.168.1.0/24"]);
    }

    #[test]
    fn unreadable_file_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aliases.json");
        fs::write(&path, "{ pas du json").unwrap();
        let t = AliasTable::load(path);
        assert!(t.is_empty());
    }
}
