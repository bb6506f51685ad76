//! Collaborateur géo-IP : trait + implémentation MaxMind (GeoLite2-City).
//!
//! Le formatteur CLIENT ne connaît que le trait, ce qui permet de tester la
//! mise en forme sans base sur disque. Base absente ou illisible → `NoGeo`,
//! les notifications sortent simplement sans ligne géo.

use maxminddb::geoip2;
use std::net::IpAddr;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_eu: bool,
}

pub trait GeoResolver: Send + Sync {
    /// Échec de résolution = absence de données, jamais une erreur.
    fn resolve(&self, ip: IpAddr) -> Option<GeoInfo>;
}

pub struct MaxmindResolver {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxmindResolver {
    pub fn open(geodata_dir: &Path) -> anyhow::Result<Self> {
        let path = geodata_dir.join("GeoLite2-City.mmdb");
        let reader = maxminddb::Reader::open_readfile(&path)?;
        Ok(Self { reader })
    }
}

impl GeoResolver for MaxmindResolver {
    fn resolve(&self, ip: IpAddr) -> Option<GeoInfo> {
        let record: geoip2::City = self.reader.lookup(ip).ok()?;
        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|name| name.to_string());
        let country = record
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(str::to_string);
        let is_eu = record
            .country
            .as_ref()
            .and_then(|c| c.is_in_european_union)
            .unwrap_or(false);
        if city.is_none() && country.is_none() {
            return None;
        }
        Some(GeoInfo { city, country, is_eu })
    }
}

/// Résolveur nul, utilisé quand la base GeoLite2 n'est pas disponible.
pub struct NoGeo;

impl GeoResolver for NoGeo {
    fn resolve(&self, _ip: IpAddr) -> Option<GeoInfo> {
        None
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Résolveur en mémoire pour les tests de formatteurs.
    pub struct StaticResolver {
        entries: HashMap<IpAddr, GeoInfo>,
    }

    impl StaticResolver {
        pub fn new(entries: Vec<(IpAddr, GeoInfo)>) -> Self {
            Self {
                entries: entries.into_iter().collect(),
            }
        }
    }

    impl GeoResolver for StaticResolver {
        fn resolve(&self, ip: IpAddr) -> Option<GeoInfo> {
            self.entries.get(&ip).cloned()
        }
    }
}
