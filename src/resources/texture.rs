//! Byte sources for models and other assets.
//!
//! Natively assets are read from `./assets`, on the web they are fetched from
//! `<origin>/assets/`. Both report transfer progress while the bytes arrive.

use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

/// Progress of a single transfer. `total` is unknown when the server sends
/// no content length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub received: u64,
    pub total: Option<u64>,
}

impl Transfer {
    /// Rounded percentage in `0..=100`, if the total is known and non-zero.
    pub fn percent(&self) -> Option<u32> {
        match self.total {
            Some(total) if total > 0 => {
                Some(((self.received.min(total) * 100 + total / 2) / total) as u32)
            }
            _ => None,
        }
    }
}

/// Somewhere model files can be fetched from.
pub trait ModelSource {
    /// Fetches the whole file at `path`, calling `on_transfer` as chunks arrive.
    fn fetch(
        &self,
        path: &str,
        on_transfer: &dyn Fn(Transfer),
    ) -> impl Future<Output = anyhow::Result<Vec<u8>>>;
}

/// Files below a directory on disk.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct AssetDir {
    root: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetDir {
    const CHUNK: usize = 64 * 1024;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for AssetDir {
    fn default() -> Self {
        Self::new(std::path::Path::new("./").join("assets"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ModelSource for AssetDir {
    async fn fetch(&self, path: &str, on_transfer: &dyn Fn(Transfer)) -> anyhow::Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let path = self.root.join(path);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        let total = file.metadata().await.ok().map(|m| m.len());
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; Self::CHUNK];
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            on_transfer(Transfer {
                received: data.len() as u64,
                total,
            });
        }
        Ok(data)
    }
}

/// Files served next to the page.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug)]
pub struct HttpSource {
    base: reqwest::Url,
}

#[cfg(target_arch = "wasm32")]
impl HttpSource {
    /// `<origin>/assets/` of the current page.
    pub fn from_location() -> anyhow::Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| anyhow::anyhow!("no origin: {:?}", e))?;
        let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
        Ok(Self { base })
    }

    fn url(&self, file_name: &str) -> anyhow::Result<reqwest::Url> {
        Ok(self.base.join(file_name)?)
    }
}

#[cfg(target_arch = "wasm32")]
impl ModelSource for HttpSource {
    async fn fetch(&self, path: &str, on_transfer: &dyn Fn(Transfer)) -> anyhow::Result<Vec<u8>> {
        use futures::StreamExt;

        let response = reqwest::get(self.url(path)?).await?.error_for_status()?;
        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
            on_transfer(Transfer {
                received: data.len() as u64,
                total,
            });
        }
        Ok(data)
    }
}

/// The source assets are read from on this platform.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformSource = AssetDir;
#[cfg(target_arch = "wasm32")]
pub type PlatformSource = HttpSource;

#[cfg(not(target_arch = "wasm32"))]
pub fn default_source() -> anyhow::Result<PlatformSource> {
    Ok(AssetDir::default())
}

#[cfg(target_arch = "wasm32")]
pub fn default_source() -> anyhow::Result<PlatformSource> {
    HttpSource::from_location()
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    default_source()?.fetch(file_name, &|_| {}).await
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    Ok(String::from_utf8(load_binary(file_name).await?)?)
}
