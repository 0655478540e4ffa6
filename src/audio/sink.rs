use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    audio::session::{PlayerCommand, StreamOutcome},
    error::SinkError,
    sources::Track,
};

/// Salida de audio de una sesión. `begin` arranca el streaming de un track y
/// garantiza que al terminar (fin natural, stop o error) llegue exactamente
/// una señal de término con el `stream_id` entregado; las señales viejas se
/// descartan por id en la sesión.
#[async_trait]
pub trait AudioSink: Send {
    async fn begin(&mut self, track: &Track, gain: f32, stream_id: u64) -> Result<(), SinkError>;

    /// Interrumpe el stream activo. La señal de término llega por el camino
    /// normal, igual que un fin natural.
    async fn stop(&mut self);

    async fn pause(&mut self) -> Result<(), SinkError>;

    async fn resume(&mut self) -> Result<(), SinkError>;

    /// Aplica la ganancia al stream activo, si hay uno
    async fn set_gain(&mut self, gain: f32) -> Result<(), SinkError>;

    /// Libera el transporte de voz (desconecta el canal)
    async fn release(&mut self);
}

/// Estado interno del sink: o no hay stream, o hay exactamente uno activo
enum SinkState {
    Idle,
    Active { handle: TrackHandle },
}

/// Sink respaldado por songbird: reproduce sobre el `Call` de la guild y
/// reporta los términos de pista al mailbox de la sesión.
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    guild_id: GuildId,
    completions: mpsc::UnboundedSender<PlayerCommand>,
    state: SinkState,
}

impl SongbirdSink {
    pub fn new(
        call: Arc<Mutex<Call>>,
        guild_id: GuildId,
        completions: mpsc::UnboundedSender<PlayerCommand>,
    ) -> Self {
        Self {
            call,
            guild_id,
            completions,
            state: SinkState::Idle,
        }
    }

    /// Crea el input de songbird a partir del descriptor: URL directa de
    /// stream si la hay, si no delega la extracción en yt-dlp.
    fn build_input(&self, track: &Track) -> Result<Input, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::StreamCreation(e.to_string()))?;

        if let Some(stream_url) = track.stream_url() {
            debug!("🎯 Usando URL directa de stream para: {}", track.title());
            return Ok(Input::from(HttpRequest::new(client, stream_url.to_string())));
        }

        if let Some(url) = track.url() {
            debug!("🔗 Delegando extracción a yt-dlp para: {}", url);
            return Ok(Input::from(YoutubeDl::new(client, url.to_string())));
        }

        Err(SinkError::StreamCreation(format!(
            "el track '{}' no tiene URL reproducible",
            track.title()
        )))
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn begin(&mut self, track: &Track, gain: f32, stream_id: u64) -> Result<(), SinkError> {
        let input = self.build_input(track)?;

        let mut call = self.call.lock().await;
        let handle = call.play_input(input);
        drop(call);

        handle
            .set_volume(gain)
            .map_err(|e| SinkError::Control(e.to_string()))?;

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                StreamEndNotifier {
                    stream_id,
                    outcome: StreamOutcome::Completed,
                    completions: self.completions.clone(),
                },
            )
            .map_err(|e| SinkError::Control(e.to_string()))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                StreamEndNotifier {
                    stream_id,
                    outcome: StreamOutcome::Failed(
                        "la pista terminó con un error de reproducción".to_string(),
                    ),
                    completions: self.completions.clone(),
                },
            )
            .map_err(|e| SinkError::Control(e.to_string()))?;

        info!("🎵 Stream iniciado: {} (stream {})", track.title(), stream_id);
        self.state = SinkState::Active { handle };
        Ok(())
    }

    async fn stop(&mut self) {
        if let SinkState::Active { handle } = std::mem::replace(&mut self.state, SinkState::Idle) {
            let _ = handle.stop();
        }
    }

    async fn pause(&mut self) -> Result<(), SinkError> {
        match &self.state {
            SinkState::Active { handle } => handle
                .pause()
                .map_err(|e| SinkError::Control(e.to_string())),
            SinkState::Idle => Err(SinkError::Control("no hay stream activo".to_string())),
        }
    }

    async fn resume(&mut self) -> Result<(), SinkError> {
        match &self.state {
            SinkState::Active { handle } => {
                handle.play().map_err(|e| SinkError::Control(e.to_string()))
            }
            SinkState::Idle => Err(SinkError::Control("no hay stream activo".to_string())),
        }
    }

    async fn set_gain(&mut self, gain: f32) -> Result<(), SinkError> {
        if let SinkState::Active { handle } = &self.state {
            handle
                .set_volume(gain)
                .map_err(|e| SinkError::Control(e.to_string()))?;
        }
        Ok(())
    }

    // leave() desconecta pero deja el Call registrado en songbird: un join
    // posterior reconecta el mismo Call que este sink ya tiene.
    async fn release(&mut self) {
        self.state = SinkState::Idle;
        let mut call = self.call.lock().await;
        if let Err(e) = call.leave().await {
            warn!("Error al liberar el canal de voz: {:?}", e);
        } else {
            info!("👋 Canal de voz liberado en guild {}", self.guild_id);
        }
    }
}

/// Notificador de término de stream: entrega la señal al mailbox de la
/// sesión en vez de mutar estado desde el contexto del driver de audio.
struct StreamEndNotifier {
    stream_id: u64,
    outcome: StreamOutcome,
    completions: mpsc::UnboundedSender<PlayerCommand>,
}

#[async_trait]
impl VoiceEventHandler for StreamEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Señal de término para stream {}", self.stream_id);
        let _ = self.completions.send(PlayerCommand::TrackEnded {
            stream_id: self.stream_id,
            outcome: self.outcome.clone(),
        });
        Some(Event::Cancel)
    }
}
