use std::future::Future;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::settings::ConfigurationTable;
use crate::error::{Error, Result};

/// Asset listing path on the data server.
pub const ASSET_INDEX_PATH: &str = "/api/system/assets";

/// One-shot fetch-and-decode of an event bundle.
pub trait ConfigLoader: Send + Sync + 'static {
    fn load(&self, bundle_name: &str) -> impl Future<Output = Result<ConfigurationTable>> + Send;
}

fn bundle_stem(bundle_name: &str) -> &str {
    Path::new(bundle_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(bundle_name)
}

/// Reads bundles that were already unpacked to JSON on disk.
///
/// `SexualDatingSetting.zip` resolves to `<dir>/SexualDatingSetting.json`.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    dir: PathBuf,
}

impl FileConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, bundle_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", bundle_stem(bundle_name)))
    }

    /// Writes a decoded bundle where `load` will find it.
    pub async fn store(&self, bundle_name: &str, config: &ConfigurationTable) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(self.path_for(bundle_name), json).await?;
        Ok(())
    }
}

impl ConfigLoader for FileConfigLoader {
    async fn load(&self, bundle_name: &str) -> Result<ConfigurationTable> {
        let path = self.path_for(bundle_name);
        debug!("Loading event bundle from {}", path.display());
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Config(format!("cannot read bundle {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Deserialize)]
struct AssetListing {
    response: AssetIndex,
}

/// The data server's list of downloadable asset archives.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndex {
    pub download_url: String,
    #[serde(default)]
    assets: AssetPatches,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AssetPatches {
    /// `[name, path, ...]` rows.
    #[serde(default)]
    asset_patchs: Vec<Vec<serde_json::Value>>,
}

impl AssetIndex {
    /// Download URL of the archive called `name`.
    pub fn locate(&self, name: &str) -> Option<String> {
        self.assets.asset_patchs.iter().find_map(|row| {
            match (row.first().and_then(|v| v.as_str()), row.get(1).and_then(|v| v.as_str())) {
                (Some(file), Some(path)) if file == name => Some(format!("{}{}", self.download_url, path)),
                _ => None,
            }
        })
    }
}

/// Unpacks `<stem>.byte` from a bundle archive and decodes its msgpack body.
pub fn decode_bundle(archive: &[u8], bundle_name: &str) -> Result<ConfigurationTable> {
    let entry_name = format!("{}.byte", bundle_stem(bundle_name));
    let mut archive = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::Config(format!("{}: not a zip archive: {}", bundle_name, e)))?;
    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|e| Error::Config(format!("{}: no {}: {}", bundle_name, entry_name, e)))?;

    let mut body = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut body)?;
    rmp_serde::from_slice(&body)
        .map_err(|e| Error::Config(format!("{}: undecodable settings: {}", entry_name, e)))
}

/// Downloads bundles from the game's asset server.
///
/// With a cache directory, every decoded bundle is also written there as JSON
/// and served from it when the server cannot be reached.
#[derive(Debug, Clone)]
pub struct HttpConfigLoader {
    client: Client,
    index_url: String,
    cache: Option<FileConfigLoader>,
}

impl HttpConfigLoader {
    pub fn new(client: Client, data_url: &str) -> Self {
        Self {
            client,
            index_url: format!("{}{}", data_url.trim_end_matches('/'), ASSET_INDEX_PATH),
            cache: None,
        }
    }

    pub fn with_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(FileConfigLoader::new(dir));
        self
    }

    pub async fn asset_index(&self) -> Result<AssetIndex> {
        let listing: AssetListing = self
            .client
            .get(&self.index_url)
            .query(&[("asset_v", "0"), ("device_type", "web")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing.response)
    }

    async fn download(&self, bundle_name: &str) -> Result<ConfigurationTable> {
        let index = self.asset_index().await?;
        let url = index
            .locate(bundle_name)
            .ok_or_else(|| Error::Config(format!("no asset named {}", bundle_name)))?;
        debug!(%url, "Downloading event bundle");
        let archive = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        decode_bundle(&archive, bundle_name)
    }
}

impl ConfigLoader for HttpConfigLoader {
    async fn load(&self, bundle_name: &str) -> Result<ConfigurationTable> {
        match self.download(bundle_name).await {
            Ok(config) => {
                info!(
                    bundle = bundle_name,
                    events = config.sexual_dating_settings.len(),
                    "Downloaded event bundle"
                );
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store(bundle_name, &config).await {
                        warn!(error = %e, "Could not cache event bundle");
                    }
                }
                Ok(config)
            }
            Err(e) => match &self.cache {
                Some(cache) => {
                    warn!(error = %e, "Bundle download failed, using cached copy");
                    cache.load(bundle_name).await
                }
                None => Err(e),
            },
        }
    }
}
