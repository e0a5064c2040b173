use std::time::Duration;

use m3u8_rs::Playlist;
use thiserror::Error;
use tracing::debug;

use super::state::PlaybackMode;
use crate::loader::{LoadError, Loader};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Invalid manifest at {url}: {message}")]
    Manifest { url: String, message: String },
    #[error("Master playlist at {url} lists no playable variants")]
    NoVariants { url: String },
    #[error("Playlist at {url} has no segments")]
    EmptyPlaylist { url: String },
    #[error("Unsupported media type '{content_type}' at {url}")]
    UnsupportedMedia { url: String, content_type: String },
    #[error("Attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// A URL the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Attached {
    pub url: String,
    pub mode: PlaybackMode,
    /// Media playlist followed from a master playlist.
    pub variant_url: Option<String>,
    pub segment_count: usize,
    pub target_duration: Option<f64>,
}

/// True for HLS manifests, including ones wrapped in a proxy query string.
pub fn is_manifest_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains(".m3u8") || lower.contains("%2em3u8")
}

pub fn select_mode(url: &str, native_hls: bool) -> PlaybackMode {
    match (is_manifest_url(url), native_hls) {
        (true, false) => PlaybackMode::Hls,
        (true, true) => PlaybackMode::Native,
        (false, _) => PlaybackMode::Progressive,
    }
}

fn playable_content_type(ct: &str) -> bool {
    let ct = ct.to_ascii_lowercase();
    ct.starts_with("video/")
        || ct.starts_with("audio/")
        || ct.starts_with("application/octet-stream")
        || ct.starts_with("binary/octet-stream")
}

fn resolve_uri(base: &str, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(uri)) {
        Ok(u) => u.to_string(),
        Err(_) => match base.rfind('/') {
            Some(idx) => format!("{}/{}", &base[..idx], uri),
            None => uri.to_string(),
        },
    }
}

/// Attaches `url` to the backend. Any error is fatal for this URL.
pub async fn attach(loader: &dyn Loader, url: &str, native_hls: bool) -> Result<Attached, StreamError> {
    match select_mode(url, native_hls) {
        PlaybackMode::Hls => attach_hls(loader, url).await,
        PlaybackMode::Native => {
            loader.probe(url).await?;
            Ok(Attached {
                url: url.to_string(),
                mode: PlaybackMode::Native,
                variant_url: None,
                segment_count: 0,
                target_duration: None,
            })
        }
        PlaybackMode::Progressive => {
            let info = loader.probe(url).await?;
            // Extensionless manifests are only recognisable by content type.
            if info.is_manifest() {
                return if native_hls {
                    Ok(Attached {
                        url: url.to_string(),
                        mode: PlaybackMode::Native,
                        variant_url: None,
                        segment_count: 0,
                        target_duration: None,
                    })
                } else {
                    attach_hls(loader, url).await
                };
            }
            match info.content_type {
                Some(ct) if !playable_content_type(&ct) => Err(StreamError::UnsupportedMedia {
                    url: url.to_string(),
                    content_type: ct,
                }),
                _ => Ok(Attached {
                    url: url.to_string(),
                    mode: PlaybackMode::Progressive,
                    variant_url: None,
                    segment_count: 0,
                    target_duration: None,
                }),
            }
        }
    }
}

async fn attach_hls(loader: &dyn Loader, url: &str) -> Result<Attached, StreamError> {
    let body = loader.load(url).await?;
    let playlist = m3u8_rs::parse_playlist_res(body.as_bytes()).map_err(|e| StreamError::Manifest {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let (media_url, media) = match playlist {
        Playlist::MediaPlaylist(pl) => (url.to_string(), pl),
        Playlist::MasterPlaylist(master) => {
            let variant = master
                .variants
                .iter()
                .find(|v| !v.is_i_frame && !v.uri.trim().is_empty())
                .ok_or_else(|| StreamError::NoVariants {
                    url: url.to_string(),
                })?;
            let variant_url = resolve_uri(url, &variant.uri);
            debug!(master = url, variant = %variant_url, bandwidth = variant.bandwidth, "Following variant");
            let body = loader.load(&variant_url).await?;
            let media = m3u8_rs::parse_media_playlist_res(body.as_bytes()).map_err(|e| {
                StreamError::Manifest {
                    url: variant_url.clone(),
                    message: e.to_string(),
                }
            })?;
            (variant_url, media)
        }
    };

    if media.segments.is_empty() {
        return Err(StreamError::EmptyPlaylist { url: media_url });
    }

    Ok(Attached {
        url: url.to_string(),
        mode: PlaybackMode::Hls,
        variant_url: (media_url != url).then_some(media_url),
        segment_count: media.segments.len(),
        target_duration: Some(media.target_duration as f64),
    })
}
