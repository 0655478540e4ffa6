use thiserror::Error;

/// Errores del motor de reproducción
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no hay ninguna canción reproduciéndose")]
    NothingPlaying,

    #[error("operación inválida en el estado actual: {0}")]
    InvalidState(&'static str),

    #[error("argumento inválido: {0}")]
    InvalidArgument(String),

    #[error("posición {position} fuera de rango (la cola tiene {len} canciones)")]
    OutOfRange { position: usize, len: usize },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("la sesión de reproducción ya terminó")]
    SessionClosed,
}

/// Errores del sink de audio (songbird / transporte de voz)
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no se pudo crear el stream de audio: {0}")]
    StreamCreation(String),

    #[error("el control de la pista falló: {0}")]
    Control(String),
}

/// Errores al resolver una búsqueda en un track reproducible
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no se encontraron resultados para la búsqueda")]
    NoResults,

    #[error("el extractor falló: {0}")]
    Extraction(String),

    #[error("metadatos inválidos del extractor: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no se pudo ejecutar yt-dlp: {0}")]
    Io(#[from] std::io::Error),
}
