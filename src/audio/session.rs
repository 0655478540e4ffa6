use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{queue::TrackQueue, sink::AudioSink},
    error::{PlayerError, SinkError},
    sources::Track,
};

/// Estados de la máquina de reproducción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Cómo terminó un stream
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
}

/// Resultado de una petición de reproducción: arrancó de inmediato o quedó
/// en espera detrás de lo que ya está sonando
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    Started(Track),
    Queued { track: Track, position: usize },
}

/// Eventos asíncronos que la sesión emite hacia la capa de presentación.
/// La sesión nunca toca la API de Discord directamente.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started(Track),
    Failed { track: Track, reason: String },
    Finished,
}

/// Vista de solo lectura de la cola
#[derive(Debug, Clone)]
pub struct QueueView {
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub looping: bool,
}

/// Estado del track actual para `nowplaying`
#[derive(Debug, Clone)]
pub struct NowPlayingView {
    pub track: Track,
    pub paused: bool,
    pub looping: bool,
    pub volume: f32,
}

/// Comandos del mailbox de la sesión. Todas las mutaciones de la cola y del
/// estado de reproducción pasan por aquí, incluida la señal de término que
/// el sink entrega desde su propio contexto de ejecución.
pub enum PlayerCommand {
    Play {
        track: Track,
        reply: oneshot::Sender<Result<PlayOutcome, PlayerError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Skip {
        reply: oneshot::Sender<Result<Track, PlayerError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SetVolume {
        percent: u32,
        reply: oneshot::Sender<Result<f32, PlayerError>>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    Shuffle {
        reply: oneshot::Sender<Result<usize, PlayerError>>,
    },
    RemoveAt {
        position: usize,
        reply: oneshot::Sender<Result<Track, PlayerError>>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
    Queue {
        reply: oneshot::Sender<QueueView>,
    },
    History {
        reply: oneshot::Sender<Vec<Track>>,
    },
    NowPlaying {
        reply: oneshot::Sender<Option<NowPlayingView>>,
    },
    TrackEnded {
        stream_id: u64,
        outcome: StreamOutcome,
    },
    Shutdown,
}

/// Handle clonable hacia la sesión. Cada operación viaja como comando por el
/// mailbox y espera su respuesta, así las peticiones del front-end quedan
/// serializadas con las señales de término del sink.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T, PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| PlayerError::SessionClosed)?;
        rx.await.map_err(|_| PlayerError::SessionClosed)
    }

    pub async fn play(&self, track: Track) -> Result<PlayOutcome, PlayerError> {
        self.request(|reply| PlayerCommand::Play { track, reply })
            .await?
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.request(|reply| PlayerCommand::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.request(|reply| PlayerCommand::Resume { reply }).await?
    }

    pub async fn skip(&self) -> Result<Track, PlayerError> {
        self.request(|reply| PlayerCommand::Skip { reply }).await?
    }

    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.request(|reply| PlayerCommand::Stop { reply }).await
    }

    pub async fn set_volume(&self, percent: u32) -> Result<f32, PlayerError> {
        self.request(|reply| PlayerCommand::SetVolume { percent, reply })
            .await?
    }

    pub async fn toggle_loop(&self) -> Result<bool, PlayerError> {
        self.request(|reply| PlayerCommand::ToggleLoop { reply })
            .await
    }

    pub async fn shuffle(&self) -> Result<usize, PlayerError> {
        self.request(|reply| PlayerCommand::Shuffle { reply }).await?
    }

    pub async fn remove_at(&self, position: usize) -> Result<Track, PlayerError> {
        self.request(|reply| PlayerCommand::RemoveAt { position, reply })
            .await?
    }

    pub async fn clear(&self) -> Result<usize, PlayerError> {
        self.request(|reply| PlayerCommand::Clear { reply }).await
    }

    pub async fn queue_view(&self) -> Result<QueueView, PlayerError> {
        self.request(|reply| PlayerCommand::Queue { reply }).await
    }

    pub async fn history(&self) -> Result<Vec<Track>, PlayerError> {
        self.request(|reply| PlayerCommand::History { reply }).await
    }

    pub async fn now_playing(&self) -> Result<Option<NowPlayingView>, PlayerError> {
        self.request(|reply| PlayerCommand::NowPlaying { reply })
            .await
    }

    /// Termina la tarea de la sesión. Las señales pendientes se descartan.
    pub fn shutdown(&self) {
        let _ = self.tx.send(PlayerCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Crea una sesión y la deja corriendo como tarea propia. `make_sink` recibe
/// el sender del mailbox para que el sink entregue sus señales de término
/// por el mismo camino que los comandos.
pub fn spawn_session<S, F>(
    make_sink: F,
    default_volume: f32,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionHandle
where
    S: AudioSink + 'static,
    F: FnOnce(mpsc::UnboundedSender<PlayerCommand>) -> S,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let session = PlayerSession {
        rx,
        sink: make_sink(tx.clone()),
        queue: TrackQueue::new(),
        state: PlaybackState::Idle,
        looping: false,
        volume: default_volume.clamp(0.0, 2.0),
        active_stream: None,
        stream_seq: 0,
        events,
    };
    tokio::spawn(session.run());
    SessionHandle { tx }
}

/// La máquina de estados de reproducción. Dueña única de la cola, del flag
/// de loop, del volumen y del sink: corre como una sola tarea que drena su
/// mailbox, así que ninguna mutación corre en paralelo con otra.
struct PlayerSession<S: AudioSink> {
    rx: mpsc::UnboundedReceiver<PlayerCommand>,
    sink: S,
    queue: TrackQueue,
    state: PlaybackState,
    looping: bool,
    volume: f32,
    /// id del stream cuyo término seguimos esperando
    active_stream: Option<u64>,
    stream_seq: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<S: AudioSink> PlayerSession<S> {
    async fn run(mut self) {
        info!("🎧 Sesión de reproducción iniciada");
        while let Some(cmd) = self.rx.recv().await {
            if !self.handle(cmd).await {
                break;
            }
        }
        info!("🛑 Sesión de reproducción terminada");
    }

    async fn handle(&mut self, cmd: PlayerCommand) -> bool {
        match cmd {
            PlayerCommand::Play { track, reply } => {
                let _ = reply.send(self.request_play(track).await);
            }
            PlayerCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            PlayerCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            PlayerCommand::Skip { reply } => {
                let res = self.skip().await;
                let _ = reply.send(res);
            }
            PlayerCommand::Stop { reply } => {
                self.stop_all().await;
                let _ = reply.send(());
            }
            PlayerCommand::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent).await);
            }
            PlayerCommand::ToggleLoop { reply } => {
                self.looping = !self.looping;
                info!(
                    "{} Repetición {}",
                    if self.looping { "🔂" } else { "➡️" },
                    if self.looping { "activada" } else { "desactivada" }
                );
                let _ = reply.send(self.looping);
            }
            PlayerCommand::Shuffle { reply } => {
                let _ = reply.send(self.shuffle());
            }
            PlayerCommand::RemoveAt { position, reply } => {
                let _ = reply.send(self.remove_at(position));
            }
            PlayerCommand::Clear { reply } => {
                let _ = reply.send(self.queue.clear());
            }
            PlayerCommand::Queue { reply } => {
                let _ = reply.send(QueueView {
                    current: self.queue.current().cloned(),
                    pending: self.queue.snapshot(),
                    looping: self.looping,
                });
            }
            PlayerCommand::History { reply } => {
                let _ = reply.send(self.queue.history().to_vec());
            }
            PlayerCommand::NowPlaying { reply } => {
                let view = self.queue.current().cloned().map(|track| NowPlayingView {
                    track,
                    paused: self.state == PlaybackState::Paused,
                    looping: self.looping,
                    volume: self.volume,
                });
                let _ = reply.send(view);
            }
            PlayerCommand::TrackEnded { stream_id, outcome } => {
                self.on_track_ended(stream_id, outcome).await;
            }
            PlayerCommand::Shutdown => return false,
        }
        true
    }

    /// Si no hay nada sonando arranca de inmediato; si no, encola. La
    /// reproducción en curso nunca se interrumpe por una petición nueva.
    async fn request_play(&mut self, track: Track) -> Result<PlayOutcome, PlayerError> {
        if self.state != PlaybackState::Idle {
            let position = self.queue.enqueue(track.clone());
            return Ok(PlayOutcome::Queued { track, position });
        }

        self.queue.enqueue(track);
        let started = match self.queue.advance() {
            Some(t) => t.clone(),
            None => return Err(PlayerError::InvalidState("la cola está vacía")),
        };

        match self.begin_stream(&started).await {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                Ok(PlayOutcome::Started(started))
            }
            Err(e) => {
                // la pista fallida queda en el historial y la sesión sigue
                // utilizable para reintentar
                self.queue.retire_current();
                self.state = PlaybackState::Idle;
                self.active_stream = None;
                Err(PlayerError::Sink(e))
            }
        }
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Playing => {
                self.sink.pause().await?;
                self.state = PlaybackState::Paused;
                info!("⏸️ Reproducción pausada");
                Ok(())
            }
            PlaybackState::Paused => Err(PlayerError::InvalidState(
                "la reproducción ya está pausada",
            )),
            PlaybackState::Idle => Err(PlayerError::InvalidState("no hay nada reproduciéndose")),
        }
    }

    async fn resume(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Paused => {
                self.sink.resume().await?;
                self.state = PlaybackState::Playing;
                info!("▶️ Reproducción reanudada");
                Ok(())
            }
            PlaybackState::Playing => {
                Err(PlayerError::InvalidState("la reproducción no está pausada"))
            }
            PlaybackState::Idle => Err(PlayerError::InvalidState("no hay nada reproduciéndose")),
        }
    }

    /// Interrumpe el stream activo. El avance ocurre al procesar la señal de
    /// término que dispara la interrupción: un salto y un fin natural
    /// comparten la misma rutina de avance.
    async fn skip(&mut self) -> Result<Track, PlayerError> {
        if self.state == PlaybackState::Idle {
            return Err(PlayerError::NothingPlaying);
        }
        let skipped = self
            .queue
            .current()
            .cloned()
            .ok_or(PlayerError::NothingPlaying)?;
        self.sink.stop().await;
        info!("⏭️ Saltando: {}", skipped.title());
        Ok(skipped)
    }

    async fn stop_all(&mut self) {
        self.queue.clear();
        self.queue.retire_current();
        // invalida la señal de término que va a disparar el stop
        self.active_stream = None;
        self.state = PlaybackState::Idle;
        self.sink.stop().await;
        self.sink.release().await;
        info!("⏹️ Reproducción detenida y cola limpiada");
    }

    async fn set_volume(&mut self, percent: u32) -> Result<f32, PlayerError> {
        if percent > 200 {
            return Err(PlayerError::InvalidArgument(format!(
                "el volumen debe estar entre 0 y 200, no {percent}"
            )));
        }
        let gain = percent as f32 / 100.0;
        self.volume = gain;
        if self.active_stream.is_some() {
            self.sink.set_gain(gain).await?;
            info!("🔊 Volumen aplicado en vivo: {}%", percent);
        } else {
            info!("🔊 Volumen guardado para el próximo stream: {}%", percent);
        }
        Ok(gain)
    }

    fn shuffle(&mut self) -> Result<usize, PlayerError> {
        if self.queue.len() < 2 {
            return Err(PlayerError::InvalidState(
                "se necesitan al menos 2 canciones en espera para mezclar",
            ));
        }
        self.queue.shuffle();
        Ok(self.queue.len())
    }

    fn remove_at(&mut self, position: usize) -> Result<Track, PlayerError> {
        let len = self.queue.len();
        self.queue
            .remove_at(position)
            .ok_or(PlayerError::OutOfRange { position, len })
    }

    /// Señal de término de un stream. Llega por el mailbox desde el contexto
    /// del sink; una señal cuyo id ya no es el activo es un no-op.
    async fn on_track_ended(&mut self, stream_id: u64, outcome: StreamOutcome) {
        if self.active_stream != Some(stream_id) {
            debug!("Señal de término obsoleta para stream {}, ignorada", stream_id);
            return;
        }
        self.active_stream = None;

        let failed = match outcome {
            StreamOutcome::Completed => false,
            StreamOutcome::Failed(reason) => {
                if let Some(track) = self.queue.current() {
                    error!("💥 La pista '{}' falló: {}", track.title(), reason);
                    let _ = self.events.send(SessionEvent::Failed {
                        track: track.clone(),
                        reason,
                    });
                }
                true
            }
        };

        // Con loop activo se repite el mismo track sin consultar la cola.
        // Una pista que falló no se repite: se avanza.
        if self.looping && !failed {
            if let Some(track) = self.queue.current().cloned() {
                match self.begin_stream(&track).await {
                    Ok(()) => {
                        self.state = PlaybackState::Playing;
                        info!("🔂 Repitiendo: {}", track.title());
                        return;
                    }
                    Err(e) => {
                        warn!("❌ No se pudo repetir '{}': {}", track.title(), e);
                        let _ = self.events.send(SessionEvent::Failed {
                            track,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        self.advance_playback().await;
    }

    /// Avanza hasta el siguiente track reproducible; si la cola se agota, la
    /// sesión queda en reposo y libera el transporte de voz.
    async fn advance_playback(&mut self) {
        loop {
            let next = match self.queue.advance() {
                Some(t) => t.clone(),
                None => {
                    self.go_idle().await;
                    return;
                }
            };

            match self.begin_stream(&next).await {
                Ok(()) => {
                    self.state = PlaybackState::Playing;
                    let _ = self.events.send(SessionEvent::Started(next));
                    return;
                }
                Err(e) => {
                    warn!("❌ No se pudo iniciar '{}', saltando: {}", next.title(), e);
                    let _ = self.events.send(SessionEvent::Failed {
                        track: next,
                        reason: e.to_string(),
                    });
                    // el próximo advance la retira al historial
                }
            }
        }
    }

    async fn begin_stream(&mut self, track: &Track) -> Result<(), SinkError> {
        let stream_id = self.stream_seq;
        self.stream_seq += 1;
        self.sink.begin(track, self.volume, stream_id).await?;
        self.active_stream = Some(stream_id);
        Ok(())
    }

    async fn go_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.active_stream = None;
        self.sink.release().await;
        let _ = self.events.send(SessionEvent::Finished);
        info!("📭 Cola vacía, sesión en reposo");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeSinkState {
        begun: Vec<(String, f32, u64)>,
        active: Option<u64>,
        stops: usize,
        pauses: usize,
        resumes: usize,
        gains: Vec<f32>,
        releases: usize,
        fail_next_begin: bool,
    }

    /// Sink de prueba: registra las llamadas y entrega las señales de
    /// término por el mismo mailbox que usaría el sink real.
    struct FakeSink {
        state: Arc<Mutex<FakeSinkState>>,
        completions: mpsc::UnboundedSender<PlayerCommand>,
    }

    #[async_trait]
    impl AudioSink for FakeSink {
        async fn begin(
            &mut self,
            track: &Track,
            gain: f32,
            stream_id: u64,
        ) -> Result<(), SinkError> {
            let mut st = self.state.lock().unwrap();
            if st.fail_next_begin {
                st.fail_next_begin = false;
                return Err(SinkError::StreamCreation("stream roto".to_string()));
            }
            st.begun.push((track.title().to_string(), gain, stream_id));
            st.active = Some(stream_id);
            Ok(())
        }

        async fn stop(&mut self) {
            let mut st = self.state.lock().unwrap();
            st.stops += 1;
            if let Some(id) = st.active.take() {
                let _ = self.completions.send(PlayerCommand::TrackEnded {
                    stream_id: id,
                    outcome: StreamOutcome::Completed,
                });
            }
        }

        async fn pause(&mut self) -> Result<(), SinkError> {
            self.state.lock().unwrap().pauses += 1;
            Ok(())
        }

        async fn resume(&mut self) -> Result<(), SinkError> {
            self.state.lock().unwrap().resumes += 1;
            Ok(())
        }

        async fn set_gain(&mut self, gain: f32) -> Result<(), SinkError> {
            self.state.lock().unwrap().gains.push(gain);
            Ok(())
        }

        async fn release(&mut self) {
            self.state.lock().unwrap().releases += 1;
        }
    }

    struct Harness {
        handle: SessionHandle,
        sink: Arc<Mutex<FakeSinkState>>,
        cmd_tx: mpsc::UnboundedSender<PlayerCommand>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    impl Harness {
        fn new(default_volume: f32) -> Self {
            let sink = Arc::new(Mutex::new(FakeSinkState::default()));
            let (events_tx, events) = mpsc::unbounded_channel();
            let tx_slot: Arc<Mutex<Option<mpsc::UnboundedSender<PlayerCommand>>>> =
                Arc::new(Mutex::new(None));

            let sink_clone = sink.clone();
            let slot_clone = tx_slot.clone();
            let handle = spawn_session(
                move |tx| {
                    *slot_clone.lock().unwrap() = Some(tx.clone());
                    FakeSink {
                        state: sink_clone,
                        completions: tx,
                    }
                },
                default_volume,
                events_tx,
            );

            let cmd_tx = tx_slot.lock().unwrap().take().unwrap();
            Self {
                handle,
                sink,
                cmd_tx,
                events,
            }
        }

        /// Simula el fin natural del stream activo
        fn finish_current(&self, outcome: StreamOutcome) {
            let id = self
                .sink
                .lock()
                .unwrap()
                .active
                .take()
                .expect("no hay stream activo en el sink");
            self.cmd_tx
                .send(PlayerCommand::TrackEnded {
                    stream_id: id,
                    outcome,
                })
                .unwrap();
        }

        /// Espera a que la sesión haya drenado todo lo enviado hasta ahora
        async fn barrier(&self) -> QueueView {
            self.handle.queue_view().await.unwrap()
        }
    }

    fn track(title: &str) -> Track {
        Track::new(title, UserId::new(42)).with_url(format!("https://example.com/{title}"))
    }

    fn titles(tracks: &[Track]) -> Vec<String> {
        tracks.iter().map(|t| t.title().to_string()).collect()
    }

    #[tokio::test]
    async fn test_play_from_idle_starts_and_empty_queue_goes_idle() {
        let mut h = Harness::new(0.5);

        let outcome = h.handle.play(track("t1")).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Started(ref t) if t.title() == "t1"));

        let np = h.handle.now_playing().await.unwrap().unwrap();
        assert_eq!(np.track.title(), "t1");
        assert!(!np.paused);

        h.finish_current(StreamOutcome::Completed);
        h.barrier().await;

        assert!(h.handle.now_playing().await.unwrap().is_none());
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1"]);
        assert_eq!(h.sink.lock().unwrap().releases, 1);

        // el último evento es el fin de la cola
        let mut last = None;
        while let Ok(ev) = h.events.try_recv() {
            last = Some(ev);
        }
        assert!(matches!(last, Some(SessionEvent::Finished)));
    }

    #[tokio::test]
    async fn test_play_while_busy_queues_without_interrupting() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        let outcome = h.handle.play(track("t2")).await.unwrap();

        match outcome {
            PlayOutcome::Queued { ref track, position } => {
                assert_eq!(track.title(), "t2");
                assert_eq!(position, 1);
            }
            other => panic!("se esperaba Queued, llegó {other:?}"),
        }

        let view = h.barrier().await;
        assert_eq!(view.current.as_ref().map(|t| t.title()), Some("t1"));
        assert_eq!(titles(&view.pending), vec!["t2"]);
        // un solo begin: la reproducción en curso no se interrumpió
        assert_eq!(h.sink.lock().unwrap().begun.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_advances_through_the_completion_path() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        h.handle.play(track("t2")).await.unwrap();

        let skipped = h.handle.skip().await.unwrap();
        assert_eq!(skipped.title(), "t1");

        let view = h.barrier().await;
        assert_eq!(view.current.as_ref().map(|t| t.title()), Some("t2"));
        assert!(view.pending.is_empty());
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1"]);
        // sigue reproduciendo, no pausado ni en reposo
        let np = h.handle.now_playing().await.unwrap().unwrap();
        assert_eq!(np.track.title(), "t2");
        assert!(!np.paused);
    }

    #[tokio::test]
    async fn test_skip_from_idle_reports_nothing_playing() {
        let h = Harness::new(0.5);
        let err = h.handle.skip().await.unwrap_err();
        assert!(matches!(err, PlayerError::NothingPlaying));
    }

    #[tokio::test]
    async fn test_remove_out_of_range_rejected_without_mutation() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        for name in ["t2", "t3", "t4"] {
            h.handle.play(track(name)).await.unwrap();
        }

        let err = h.handle.remove_at(5).await.unwrap_err();
        assert!(matches!(
            err,
            PlayerError::OutOfRange {
                position: 5,
                len: 3
            }
        ));

        let view = h.barrier().await;
        assert_eq!(titles(&view.pending), vec!["t2", "t3", "t4"]);
    }

    #[tokio::test]
    async fn test_volume_validation_and_live_gain() {
        let h = Harness::new(1.0);

        let err = h.handle.set_volume(250).await.unwrap_err();
        assert!(matches!(err, PlayerError::InvalidArgument(_)));

        // sin stream activo: se guarda para el próximo begin
        let gain = h.handle.set_volume(50).await.unwrap();
        assert!((gain - 0.5).abs() < f32::EPSILON);
        assert!(h.sink.lock().unwrap().gains.is_empty());

        h.handle.play(track("t1")).await.unwrap();
        assert_eq!(h.sink.lock().unwrap().begun[0].1, 0.5);

        // con stream activo: se aplica en vivo
        h.handle.set_volume(200).await.unwrap();
        assert_eq!(h.sink.lock().unwrap().gains, vec![2.0]);
    }

    #[tokio::test]
    async fn test_loop_replays_without_touching_queue_or_history() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        assert!(h.handle.toggle_loop().await.unwrap());

        for _ in 0..3 {
            h.finish_current(StreamOutcome::Completed);
            let view = h.barrier().await;
            assert_eq!(view.current.as_ref().map(|t| t.title()), Some("t1"));
            assert!(view.pending.is_empty());
            assert!(h.handle.history().await.unwrap().is_empty());
        }

        // cada repetición es un begin nuevo del mismo track
        assert_eq!(h.sink.lock().unwrap().begun.len(), 4);
        assert_eq!(h.sink.lock().unwrap().releases, 0);
    }

    #[tokio::test]
    async fn test_duplicate_completion_signal_is_ignored() {
        let mut h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        let id = h.sink.lock().unwrap().active.unwrap();

        h.finish_current(StreamOutcome::Completed);
        h.barrier().await;
        assert_eq!(h.sink.lock().unwrap().releases, 1);

        // señal duplicada para un stream que ya no es el activo
        h.cmd_tx
            .send(PlayerCommand::TrackEnded {
                stream_id: id,
                outcome: StreamOutcome::Completed,
            })
            .unwrap();
        h.barrier().await;

        assert!(h.handle.now_playing().await.unwrap().is_none());
        assert_eq!(h.handle.history().await.unwrap().len(), 1);
        assert_eq!(h.sink.lock().unwrap().releases, 1);
        while h.events.try_recv().is_ok() {}
    }

    #[tokio::test]
    async fn test_pause_resume_state_machine() {
        let h = Harness::new(0.5);

        assert!(matches!(
            h.handle.pause().await.unwrap_err(),
            PlayerError::InvalidState(_)
        ));

        h.handle.play(track("t1")).await.unwrap();
        h.handle.pause().await.unwrap();
        assert!(h.handle.now_playing().await.unwrap().unwrap().paused);
        assert!(matches!(
            h.handle.pause().await.unwrap_err(),
            PlayerError::InvalidState(_)
        ));

        // una petición nueva estando en pausa se encola, no interrumpe
        let outcome = h.handle.play(track("t2")).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Queued { position: 1, .. }));

        h.handle.resume().await.unwrap();
        assert!(!h.handle.now_playing().await.unwrap().unwrap().paused);
        assert!(matches!(
            h.handle.resume().await.unwrap_err(),
            PlayerError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn test_stop_clears_everything_and_releases_transport() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        h.handle.play(track("t2")).await.unwrap();
        h.handle.stop().await.unwrap();

        let view = h.barrier().await;
        assert!(view.current.is_none());
        assert!(view.pending.is_empty());
        // el track que sonaba queda en el historial
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1"]);
        assert_eq!(h.sink.lock().unwrap().releases, 1);

        // la señal de término que disparó el stop quedó obsoleta: nada cambia
        h.barrier().await;
        assert!(h.handle.now_playing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_stream_advances_and_surfaces_failure() {
        let mut h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        h.handle.play(track("t2")).await.unwrap();

        h.finish_current(StreamOutcome::Failed("códec no soportado".to_string()));
        let view = h.barrier().await;

        assert_eq!(view.current.as_ref().map(|t| t.title()), Some("t2"));
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1"]);

        let mut saw_failure = false;
        while let Ok(ev) = h.events.try_recv() {
            if let SessionEvent::Failed { track, reason } = ev {
                assert_eq!(track.title(), "t1");
                assert_eq!(reason, "códec no soportado");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_failed_stream_does_not_loop_replay() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        h.handle.toggle_loop().await.unwrap();

        h.finish_current(StreamOutcome::Failed("stream muerto".to_string()));
        h.barrier().await;

        // con la cola vacía y la pista rota, la sesión queda en reposo
        assert!(h.handle.now_playing().await.unwrap().is_none());
        assert_eq!(h.handle.history().await.unwrap().len(), 1);
        assert_eq!(h.sink.lock().unwrap().releases, 1);
    }

    #[tokio::test]
    async fn test_begin_failure_from_idle_leaves_session_usable() {
        let h = Harness::new(0.5);

        h.sink.lock().unwrap().fail_next_begin = true;
        let err = h.handle.play(track("t1")).await.unwrap_err();
        assert!(matches!(err, PlayerError::Sink(_)));

        // la sesión no quedó atascada: el siguiente play arranca normal
        assert!(h.handle.now_playing().await.unwrap().is_none());
        let outcome = h.handle.play(track("t2")).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Started(_)));
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1"]);
    }

    #[tokio::test]
    async fn test_begin_failure_during_advancement_skips_to_next() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        h.handle.play(track("t2")).await.unwrap();
        h.handle.play(track("t3")).await.unwrap();

        h.sink.lock().unwrap().fail_next_begin = true;
        h.finish_current(StreamOutcome::Completed);
        let view = h.barrier().await;

        // t2 falló al arrancar y se saltó hasta t3
        assert_eq!(view.current.as_ref().map(|t| t.title()), Some("t3"));
        assert_eq!(titles(&h.handle.history().await.unwrap()), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_fifo_order_across_full_session() {
        let h = Harness::new(0.5);

        for name in ["t1", "t2", "t3", "t4"] {
            h.handle.play(track(name)).await.unwrap();
        }

        for _ in 0..4 {
            h.finish_current(StreamOutcome::Completed);
            h.barrier().await;
        }

        let begun = h.sink.lock().unwrap().begun.clone();
        let order: Vec<&str> = begun.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(order, vec!["t1", "t2", "t3", "t4"]);
        assert_eq!(
            titles(&h.handle.history().await.unwrap()),
            vec!["t1", "t2", "t3", "t4"]
        );
    }

    #[tokio::test]
    async fn test_shuffle_requires_two_pending() {
        let h = Harness::new(0.5);

        h.handle.play(track("t1")).await.unwrap();
        assert!(matches!(
            h.handle.shuffle().await.unwrap_err(),
            PlayerError::InvalidState(_)
        ));

        h.handle.play(track("t2")).await.unwrap();
        h.handle.play(track("t3")).await.unwrap();
        assert_eq!(h.handle.shuffle().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_mailbox() {
        let h = Harness::new(0.5);
        h.handle.shutdown();

        // la tarea terminó: cualquier petición nueva reporta sesión cerrada
        let err = h.handle.now_playing().await.unwrap_err();
        assert!(matches!(err, PlayerError::SessionClosed));
    }
}
