use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::sources::Track;

/// Cola de reproducción de una sesión de voz.
///
/// Un track vive en exactamente uno de tres lugares: `pending` (en espera,
/// orden FIFO), `current` (sonando ahora) o `history` (ya reproducido,
/// del más antiguo al más reciente). `advance` es la única transición de
/// `pending` a reproducido.
#[derive(Debug, Default)]
pub struct TrackQueue {
    pending: VecDeque<Track>,
    current: Option<Track>,
    history: Vec<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola y devuelve su posición (1-based)
    pub fn enqueue(&mut self, track: Track) -> usize {
        info!("➕ Agregado a la cola: {}", track.title());
        self.pending.push_back(track);
        self.pending.len()
    }

    /// Avanza la cola: retira el track actual hacia el historial y saca el
    /// frente de `pending` como nuevo actual. Devuelve el nuevo actual, o
    /// `None` si la cola quedó vacía.
    pub fn advance(&mut self) -> Option<&Track> {
        self.retire_current();

        match self.pending.pop_front() {
            Some(next) => {
                info!("➡️ Siguiente en cola (FIFO): {}", next.title());
                self.current = Some(next);
                self.current.as_ref()
            }
            None => {
                debug!("📭 Cola vacía, no hay siguiente track");
                None
            }
        }
    }

    /// Mueve el track actual al historial sin sacar uno nuevo
    pub fn retire_current(&mut self) {
        if let Some(finished) = self.current.take() {
            self.history.push(finished);
        }
    }

    /// Mezcla los tracks en espera. No toca el actual ni el historial.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.pending.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} canciones)", self.pending.len());
    }

    /// Vacía la cola en espera y devuelve cuántos tracks se descartaron.
    /// El historial queda intacto.
    pub fn clear(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        if removed > 0 {
            info!("🗑️ Cola limpiada ({} canciones)", removed);
        }
        removed
    }

    /// Elimina el track en la posición dada (1-based). Fuera de rango
    /// devuelve `None` sin tocar la cola.
    pub fn remove_at(&mut self, position: usize) -> Option<Track> {
        if position == 0 || position > self.pending.len() {
            return None;
        }
        let removed = self.pending.remove(position - 1);
        if let Some(ref track) = removed {
            info!("❌ Eliminado de la posición {}: {}", position, track.title());
        }
        removed
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Copia de solo lectura de los tracks en espera
    pub fn snapshot(&self) -> Vec<Track> {
        self.pending.iter().cloned().collect()
    }

    pub fn history(&self) -> &[Track] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(title, UserId::new(42))
    }

    fn titles(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.title()).collect()
    }

    #[test]
    fn test_fifo_exactly_once() {
        let mut queue = TrackQueue::new();
        for name in ["a", "b", "c"] {
            queue.enqueue(track(name));
        }

        let mut played = Vec::new();
        while let Some(current) = queue.advance() {
            played.push(current.title().to_string());
        }

        assert_eq!(played, vec!["a", "b", "c"]);
        // Todo lo sacado termina en el historial, una sola vez
        assert_eq!(titles(queue.history()), vec!["a", "b", "c"]);
        assert_eq!(queue.len(), 0);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_enqueue_positions() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.enqueue(track("a")), 1);
        assert_eq!(queue.enqueue(track("b")), 2);
        assert_eq!(queue.enqueue(track("c")), 3);
    }

    #[test]
    fn test_advance_retires_superseded_current() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("t1"));
        queue.enqueue(track("t2"));

        queue.advance();
        assert_eq!(queue.current().map(Track::title), Some("t1"));
        assert!(queue.history().is_empty());

        queue.advance();
        assert_eq!(queue.current().map(Track::title), Some("t2"));
        assert_eq!(titles(queue.history()), vec!["t1"]);
    }

    #[test]
    fn test_shuffle_is_permutation_of_pending_only() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("now"));
        queue.advance();
        for i in 0..20 {
            queue.enqueue(track(&format!("t{i}")));
        }
        let history_before = queue.history().len();
        let mut before = queue
            .snapshot()
            .iter()
            .map(|t| t.title().to_string())
            .collect::<Vec<_>>();

        queue.shuffle();

        let mut after = queue
            .snapshot()
            .iter()
            .map(|t| t.title().to_string())
            .collect::<Vec<_>>();
        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(queue.current().map(Track::title), Some("now"));
        assert_eq!(queue.history().len(), history_before);
    }

    #[test]
    fn test_remove_at_out_of_range_does_not_mutate() {
        let mut queue = TrackQueue::new();
        for name in ["a", "b", "c"] {
            queue.enqueue(track(name));
        }

        assert!(queue.remove_at(0).is_none());
        assert!(queue.remove_at(5).is_none());
        assert_eq!(titles(&queue.snapshot()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_at_keeps_relative_order() {
        let mut queue = TrackQueue::new();
        for name in ["a", "b", "c"] {
            queue.enqueue(track(name));
        }

        let removed = queue.remove_at(2);
        assert_eq!(removed.as_ref().map(|t| t.title()), Some("b"));
        assert_eq!(titles(&queue.snapshot()), vec!["a", "c"]);
    }

    #[test]
    fn test_clear_leaves_history_and_current() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.advance();
        queue.enqueue(track("b"));
        queue.enqueue(track("c"));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.current().map(Track::title), Some("a"));
        assert!(queue.history().is_empty());
    }
}
