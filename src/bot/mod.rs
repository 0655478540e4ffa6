//! # Bot Module
//!
//! Integración con Discord: registro de comandos slash, despacho de
//! interacciones y manejo de la conexión de voz. La lógica de reproducción
//! vive en [`crate::audio`]; este módulo solo traduce interacciones a
//! llamadas sobre el [`SessionHandle`] de cada guild y renderiza los
//! resultados como embeds.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
    builder::CreateMessage,
    http::Http,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        player::AudioPlayer,
        session::{SessionEvent, SessionHandle},
    },
    config::Config,
    sources::{TrackResolver, YtDlpResolver},
    storage::PlaylistStore,
    ui::embeds,
};

/// Handler principal del bot. Mantiene el registro de sesiones de audio, el
/// resolver de búsquedas y el almacenamiento de playlists.
pub struct RitmoBot {
    pub config: Arc<Config>,
    pub player: Arc<AudioPlayer>,
    pub resolver: Arc<dyn TrackResolver>,
    pub storage: Arc<tokio::sync::Mutex<PlaylistStore>>,
}

impl RitmoBot {
    pub fn new(config: Config, storage: Arc<tokio::sync::Mutex<PlaylistStore>>) -> Self {
        let config = Arc::new(config);
        Self {
            player: Arc::new(AudioPlayer::new(config.default_volume)),
            resolver: Arc::new(YtDlpResolver::new()),
            config,
            storage,
        }
    }

    /// Registra comandos globales o por guild según configuración
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta (o reconecta) al canal de voz y devuelve la sesión de la
    /// guild, creándola si no existe. Los anuncios asíncronos de la sesión
    /// se publican en `text_channel`.
    pub async fn ensure_session(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<SessionHandle> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        // join reutiliza el Call de la guild y reconecta si el transporte
        // fue liberado al vaciarse la cola
        let call = manager.join(guild_id, voice_channel).await.map_err(|e| {
            error!("Error al conectar al canal de voz: {:?}", e);
            anyhow::anyhow!("no se pudo conectar al canal de voz")
        })?;
        info!("🔊 Conectado al canal de voz en guild {}", guild_id);

        if let Some(handle) = self.player.session(guild_id) {
            return Ok(handle);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        spawn_event_forwarder(ctx.http.clone(), text_channel, events_rx);
        Ok(self.player.get_or_create(guild_id, call, events_tx))
    }

    /// Detiene la sesión de la guild y abandona el canal de voz
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        if let Some(handle) = self.player.session(guild_id) {
            let _ = handle.stop().await;
        }
        self.player.remove(guild_id);

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        // stop() ya liberó el transporte; por si la sesión no existía
        let _ = manager.remove(guild_id).await;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

/// Publica los eventos asíncronos de una sesión en su canal de texto. La
/// sesión nunca toca la API de Discord: este es el único puente.
fn spawn_event_forwarder(
    http: Arc<Http>,
    channel: ChannelId,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let embed = match event {
                SessionEvent::Started(track) => embeds::create_now_playing_embed(&track),
                SessionEvent::Failed { track, reason } => embeds::create_error_embed(
                    "💥 Error de Reproducción",
                    &format!("**{}** falló: {}", track.title(), reason),
                ),
                SessionEvent::Finished => embeds::create_warning_embed(
                    "📭 Cola Terminada",
                    "No quedan canciones, saliendo del canal de voz",
                ),
            };

            if let Err(e) = channel
                .send_message(&http, CreateMessage::new().embed(embed))
                .await
            {
                warn!("No se pudo publicar el anuncio en {}: {:?}", channel, e);
            }
        }
    });
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} conectado y listo", ready.user.name);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error registrando comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Error manejando comando: {:?}", e);
            }
        }
    }
}
