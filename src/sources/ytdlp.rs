use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::ResolutionError,
    sources::{Track, TrackResolver},
};

/// Resolver respaldado por yt-dlp: convierte búsquedas y URLs en metadatos
/// reproducibles sin descargar el audio.
pub struct YtDlpResolver;

/// Metadatos que entrega `yt-dlp -j`
#[derive(Debug, Deserialize)]
struct YtDlpMetadata {
    title: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    artist: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self
    }

    fn is_youtube_url(url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        matches!(
            parsed.host_str(),
            Some("www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com"
                | "youtu.be")
        )
    }

    /// Extrae el id de video de una URL de YouTube
    fn extract_video_id(url: &str) -> Result<Option<String>, ResolutionError> {
        let id_regex = Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
            .map_err(|e| ResolutionError::Extraction(e.to_string()))?;
        Ok(id_regex
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()))
    }

    /// Deducción best-effort del artista: la parte previa de un
    /// "Artista - Título", con el uploader como respaldo. Nunca falla la
    /// resolución completa.
    fn infer_artist(title: &str, uploader: Option<&str>) -> Option<String> {
        if let Some((artist, _)) = title.split_once(" - ") {
            let artist = artist.trim();
            if !artist.is_empty() {
                return Some(artist.to_string());
            }
        }
        uploader
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
    }

    fn track_from_metadata(
        meta: YtDlpMetadata,
        query: &str,
        requested_by: UserId,
    ) -> Result<Track, ResolutionError> {
        let title = meta.title.unwrap_or_default();
        let artist = meta
            .artist
            .filter(|a| !a.trim().is_empty())
            .or_else(|| Self::infer_artist(&title, meta.uploader.as_deref()));

        let canonical = match meta.webpage_url {
            Some(url) => Some(url),
            // reconstruir la URL canónica si yt-dlp solo devolvió el id
            None => match Self::extract_video_id(query)? {
                Some(id) => Some(format!("https://www.youtube.com/watch?v={id}")),
                None => None,
            },
        };

        let live = meta.is_live.unwrap_or(false);
        let duration = meta
            .duration
            .filter(|_| !live)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64);

        let mut track = Track::new(title, requested_by);
        if let Some(url) = canonical {
            track = track.with_url(url);
        } else if Url::parse(query).is_ok() && !Self::is_youtube_url(query) {
            // URL directa de audio sin página canónica: el sink puede
            // reproducirla sin pasar otra vez por yt-dlp
            track = track.with_url(query.to_string()).with_stream_url(query.to_string());
        }
        if let Some(duration) = duration {
            track = track.with_duration(duration);
        }
        if let Some(thumbnail) = meta.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        if let Some(artist) = artist {
            track = track.with_artist(artist);
        }

        Ok(track)
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, ResolutionError> {
        let target = if self.is_valid_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        debug!("🔍 Resolviendo con yt-dlp: {}", target);
        let output = tokio::process::Command::new("yt-dlp")
            .args([
                "-j",
                "--no-playlist",
                "--no-warnings",
                "--quiet",
                "--format",
                "bestaudio/best",
            ])
            .arg(&target)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para '{}': {}", target, stderr.trim());
            return Err(ResolutionError::Extraction(
                stderr.lines().last().unwrap_or("sin detalle").to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or(ResolutionError::NoResults)?;

        let meta: YtDlpMetadata = serde_json::from_str(line)?;
        let track = Self::track_from_metadata(meta, query, requested_by)?;
        info!("✅ Resuelto: {}", track.title());
        Ok(track)
    }

    fn is_valid_url(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false)
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YtDlpResolver::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YtDlpResolver::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YtDlpResolver::is_youtube_url("https://example.com/video"));
        assert!(!YtDlpResolver::is_youtube_url("no es una url"));
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            YtDlpResolver::extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .unwrap(),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            YtDlpResolver::extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            YtDlpResolver::extract_video_id("https://example.com/cancion.mp3").unwrap(),
            None
        );
    }

    #[test]
    fn test_infer_artist() {
        assert_eq!(
            YtDlpResolver::infer_artist("Queen - Bohemian Rhapsody", Some("SomeChannel")),
            Some("Queen".to_string())
        );
        assert_eq!(
            YtDlpResolver::infer_artist("Bohemian Rhapsody", Some("Queen Official")),
            Some("Queen Official".to_string())
        );
        assert_eq!(YtDlpResolver::infer_artist("Sin guion", None), None);
        // un guion sin espacios no parte el título
        assert_eq!(YtDlpResolver::infer_artist("AC-DC Thunderstruck", None), None);
    }

    #[test]
    fn test_track_from_metadata_regular() {
        let meta: YtDlpMetadata = serde_json::from_str(
            r#"{
                "title": "Queen - Bohemian Rhapsody",
                "webpage_url": "https://www.youtube.com/watch?v=fJ9rUzIMcZQ",
                "duration": 354.0,
                "thumbnail": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/hq720.jpg",
                "uploader": "Queen Official"
            }"#,
        )
        .unwrap();

        let track =
            YtDlpResolver::track_from_metadata(meta, "bohemian rhapsody", UserId::new(1)).unwrap();
        assert_eq!(track.title(), "Queen - Bohemian Rhapsody");
        assert_eq!(track.artist(), Some("Queen"));
        assert_eq!(track.duration(), Some(Duration::from_secs(354)));
        assert_eq!(
            track.url(),
            Some("https://www.youtube.com/watch?v=fJ9rUzIMcZQ")
        );
        assert!(track.stream_url().is_none());
    }

    #[test]
    fn test_track_from_metadata_live_has_no_duration() {
        let meta: YtDlpMetadata = serde_json::from_str(
            r#"{
                "title": "lofi hip hop radio",
                "webpage_url": "https://www.youtube.com/watch?v=jfKfPfyJRdk",
                "duration": 0.0,
                "is_live": true
            }"#,
        )
        .unwrap();

        let track = YtDlpResolver::track_from_metadata(meta, "lofi", UserId::new(1)).unwrap();
        assert!(track.duration().is_none());
    }

    #[test]
    fn test_track_from_metadata_direct_url_keeps_stream() {
        let meta: YtDlpMetadata =
            serde_json::from_str(r#"{"title": "episodio.mp3"}"#).unwrap();

        let track = YtDlpResolver::track_from_metadata(
            meta,
            "https://example.com/episodio.mp3",
            UserId::new(1),
        )
        .unwrap();
        assert_eq!(track.stream_url(), Some("https://example.com/episodio.mp3"));
    }

    #[test]
    fn test_track_from_metadata_missing_title_uses_sentinel() {
        let meta: YtDlpMetadata = serde_json::from_str("{}").unwrap();
        let track = YtDlpResolver::track_from_metadata(meta, "algo", UserId::new(1)).unwrap();
        assert_eq!(track.title(), crate::sources::UNKNOWN_TITLE);
        assert!(track.artist().is_none());
    }
}
