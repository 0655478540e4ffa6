pub mod ytdlp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;

pub use ytdlp::YtDlpResolver;

use crate::error::ResolutionError;

/// Título centinela cuando el extractor no entrega uno
pub const UNKNOWN_TITLE: &str = "Título desconocido";

/// Trait común para los resolvers de búsquedas
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Convierte una búsqueda o URL en un track reproducible
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, ResolutionError>;

    /// Verifica si la URL es válida para este resolver
    fn is_valid_url(&self, url: &str) -> bool;

    /// Nombre del resolver
    #[allow(dead_code)]
    fn source_name(&self) -> &'static str;
}

/// Representa un track ya resuelto. Inmutable una vez construido: la cola y
/// la sesión solo lo mueven y lo clonan, nunca lo modifican.
#[derive(Debug, Clone)]
pub struct Track {
    title: String,
    url: Option<String>,
    stream_url: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    artist: Option<String>,
    requested_by: UserId,
    requested_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, requested_by: UserId) -> Self {
        let title = title.into();
        Self {
            title: if title.is_empty() {
                UNKNOWN_TITLE.to_string()
            } else {
                title
            },
            url: None,
            stream_url: None,
            duration: None,
            thumbnail: None,
            artist: None,
            requested_by,
            requested_at: Utc::now(),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }
    /// `None` significa duración desconocida o transmisión en vivo
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    #[allow(dead_code)]
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    // Setters estilo builder
    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_stream_url(mut self, stream_url: String) -> Self {
        self.stream_url = Some(stream_url);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_artist(mut self, artist: String) -> Self {
        self.artist = Some(artist);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_title_uses_sentinel() {
        let track = Track::new("", UserId::new(1));
        assert_eq!(track.title(), UNKNOWN_TITLE);
    }

    #[test]
    fn test_builder_fields() {
        let track = Track::new("Bohemian Rhapsody", UserId::new(7))
            .with_url("https://youtu.be/fJ9rUzIMcZQ".to_string())
            .with_artist("Queen".to_string())
            .with_duration(Duration::from_secs(354));

        assert_eq!(track.title(), "Bohemian Rhapsody");
        assert_eq!(track.artist(), Some("Queen"));
        assert_eq!(track.duration(), Some(Duration::from_secs(354)));
        assert_eq!(track.requested_by(), UserId::new(7));
        assert!(track.stream_url().is_none());
    }
}
