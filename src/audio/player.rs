use dashmap::DashMap;
use serenity::model::id::GuildId;
use songbird::Call;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::audio::{
    session::{spawn_session, SessionEvent, SessionHandle},
    sink::SongbirdSink,
};

/// Registro de sesiones de reproducción, una por guild. Cada sesión es dueña
/// exclusiva del transporte de voz de su guild.
pub struct AudioPlayer {
    sessions: DashMap<GuildId, SessionHandle>,
    default_volume: f32,
}

impl AudioPlayer {
    pub fn new(default_volume: f32) -> Self {
        Self {
            sessions: DashMap::new(),
            default_volume,
        }
    }

    /// Devuelve la sesión viva de la guild, si existe
    pub fn session(&self, guild_id: GuildId) -> Option<SessionHandle> {
        let handle = self.sessions.get(&guild_id).map(|h| h.value().clone())?;
        if handle.is_closed() {
            self.sessions.remove(&guild_id);
            return None;
        }
        Some(handle)
    }

    /// Obtiene la sesión de la guild, creándola sobre el `Call` dado si no
    /// existe o si la anterior ya terminó.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        call: Arc<Mutex<Call>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionHandle {
        if let Some(handle) = self.session(guild_id) {
            return handle;
        }

        info!("🎧 Creando sesión de reproducción para guild {}", guild_id);
        let handle = spawn_session(
            move |completions| SongbirdSink::new(call, guild_id, completions),
            self.default_volume,
            events,
        );
        self.sessions.insert(guild_id, handle.clone());
        handle
    }

    /// Termina y descarta la sesión de la guild
    pub fn remove(&self, guild_id: GuildId) {
        if let Some((_, handle)) = self.sessions.remove(&guild_id) {
            handle.shutdown();
            info!("🛑 Sesión descartada para guild {}", guild_id);
        }
    }
}
