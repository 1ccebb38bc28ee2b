use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::MappingWarning;
use crate::xmltv::Icon;

/// Manifest of rating icons keyed by uppercased rating code
pub const TV_RATING_MANIFEST: &str = "tv_rating";
/// Manifest of metascore badges keyed by score
pub const METASCORE_MANIFEST: &str = "metascore";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconInfo {
    /// Path below `{base_url}/images/icons`
    pub path: String,
    pub width: u32,
    pub height: u32,
}

pub type IconManifest = HashMap<String, IconInfo>;

/// Icon manifests available to the guide builder
#[derive(Debug, Clone, Default)]
pub struct IconCatalog {
    base_url: String,
    manifests: HashMap<String, IconManifest>,
}

impl IconCatalog {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            manifests: HashMap::new(),
        }
    }

    pub fn with_manifest(mut self, name: &str, manifest: IconManifest) -> Self {
        self.manifests.insert(name.to_string(), manifest);
        self
    }

    /// Read `{dir}/{name}.json` for every name; unreadable manifests count as empty
    pub fn load(dir: &Path, base_url: &str, names: &[&str]) -> Self {
        let mut catalog = Self::new(base_url);
        for name in names {
            let path = dir.join(format!("{name}.json"));
            let manifest = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<IconManifest>(&text).map_err(|e| e.to_string())
                });
            match manifest {
                Ok(manifest) => {
                    debug!("Loaded {} icons from {}", manifest.len(), path.display());
                    catalog.manifests.insert(name.to_string(), manifest);
                }
                Err(e) => {
                    warn!("Icon manifest {} is unavailable: {}", path.display(), e);
                    catalog.manifests.insert(name.to_string(), IconManifest::new());
                }
            }
        }
        catalog
    }

    pub fn icon(&self, manifest: &str, key: &str) -> Result<Icon, MappingWarning> {
        self.manifests
            .get(manifest)
            .and_then(|icons| icons.get(key))
            .map(|info| {
                Icon::new(
                    format!(
                        "{}/images/icons/{}",
                        self.base_url,
                        info.path.trim_start_matches('/')
                    ),
                    info.width,
                    info.height,
                )
            })
            .ok_or_else(|| MappingWarning::MissingIcon {
                manifest: manifest.to_string(),
                key: key.to_string(),
            })
    }
}
