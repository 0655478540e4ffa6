use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::session::{NowPlayingView, QueueView},
    sources::Track,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Ritmo Bot";

/// Tracks por página en la cola y el historial
pub const TRACKS_PER_PAGE: usize = 10;

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.artist().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", format_track_duration(track.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(url) = track.url() {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed detallado para el comando `nowplaying`
pub fn create_player_status_embed(view: &NowPlayingView) -> CreateEmbed {
    let estado = if view.paused {
        "⏸️ Pausado"
    } else {
        "▶️ Reproduciendo"
    };

    create_now_playing_embed(&view.track)
        .field("📟 Estado", estado, true)
        .field("🔊 Volumen", format!("{}%", (view.volume * 100.0) as u32), true)
        .field(
            "🔂 Repetición",
            if view.looping { "Activada" } else { "Desactivada" },
            true,
        )
}

/// Crea un embed para mostrar que se agregó una canción a la cola
pub fn create_track_queued_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!(
            "**{}** se agregó a la cola en la posición {}",
            track.title(),
            position
        ))
        .color(colors::INFO_BLUE)
        .field("⏱️ Duración", format_track_duration(track.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed con una página de la cola de reproducción
pub fn create_queue_embed(view: &QueueView, page: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎶 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = &view.current {
        embed = embed.field(
            "▶️ Sonando ahora",
            format!(
                "**{}** | ⏱️ {}{}",
                current.title(),
                format_track_duration(current.duration()),
                if view.looping { " | 🔂 en repetición" } else { "" }
            ),
            false,
        );
    }

    if view.pending.is_empty() {
        return embed
            .description("No hay canciones en espera")
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let total_pages = view.pending.len().div_ceil(TRACKS_PER_PAGE);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * TRACKS_PER_PAGE;

    for (offset, track) in view.pending.iter().skip(start).take(TRACKS_PER_PAGE).enumerate() {
        embed = embed.field(
            format!("{}. {}", start + offset + 1, track.title()),
            format!(
                "⏱️ {} | 👤 <@{}>",
                format_track_duration(track.duration()),
                track.requested_by()
            ),
            false,
        );
    }

    embed.footer(CreateEmbedFooter::new(format!(
        "Página {}/{} | {} canciones en espera",
        page,
        total_pages,
        view.pending.len()
    )))
}

/// Crea un embed con una página del historial de reproducción
pub fn create_history_embed(history: &[Track], page: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("⏪ Historial de Reproducción")
        .color(colors::NEUTRAL_GRAY);

    if history.is_empty() {
        return embed
            .description("Todavía no se ha reproducido nada")
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let total_pages = history.len().div_ceil(TRACKS_PER_PAGE);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * TRACKS_PER_PAGE;

    for (offset, track) in history.iter().skip(start).take(TRACKS_PER_PAGE).enumerate() {
        embed = embed.field(
            format!("{}. {}", start + offset + 1, track.title()),
            format!(
                "⏱️ {} | 👤 <@{}>",
                format_track_duration(track.duration()),
                track.requested_by()
            ),
            false,
        );
    }

    embed.footer(CreateEmbedFooter::new(format!(
        "Página {}/{} | {} canciones reproducidas",
        page,
        total_pages,
        history.len()
    )))
}

/// Embed genérico de éxito / información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title.to_string())
        .description(description.to_string())
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed genérico de advertencia
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title.to_string())
        .description(description.to_string())
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed genérico de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title.to_string())
        .description(description.to_string())
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formatea la duración de un track; sin duración significa en vivo o
/// desconocida
pub fn format_track_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format_duration(d),
        None => "∞ En vivo".to_string(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours:02}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes:02}m {seconds:02}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00m 00s");
        assert_eq!(format_duration(Duration::from_secs(59)), "00m 59s");
        assert_eq!(format_duration(Duration::from_secs(354)), "05m 54s");
        assert_eq!(format_duration(Duration::from_secs(3605)), "01h 00m 05s");
    }

    #[test]
    fn test_format_track_duration_live_sentinel() {
        assert_eq!(format_track_duration(None), "∞ En vivo");
        assert_eq!(
            format_track_duration(Some(Duration::from_secs(61))),
            "01m 01s"
        );
    }
}
