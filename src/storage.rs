use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::sources::Track;

/// Entrada persistida de una playlist: lo mínimo para re-resolver el track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
}

/// Playlist nombrada de un usuario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPlaylist {
    pub name: String,
    pub owner_id: u64,
    pub saved_at: DateTime<Utc>,
    pub tracks: Vec<PlaylistEntry>,
}

/// Almacenamiento de playlists en archivos JSON, uno por playlist,
/// identificadas por (usuario, nombre)
pub struct PlaylistStore {
    data_dir: PathBuf,
}

impl PlaylistStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(data_dir.join("playlists")).await?;
        info!("📁 Storage de playlists inicializado en: {}", data_dir.display());
        Ok(Self { data_dir })
    }

    /// Guarda los tracks como playlist del usuario. Devuelve cuántos se
    /// guardaron; los que no tienen URL canónica se omiten.
    pub async fn save(&self, owner: UserId, name: &str, tracks: &[Track]) -> Result<usize> {
        let entries: Vec<PlaylistEntry> = tracks
            .iter()
            .filter_map(|t| {
                t.url().map(|url| PlaylistEntry {
                    title: t.title().to_string(),
                    url: url.to_string(),
                })
            })
            .collect();

        if entries.is_empty() {
            anyhow::bail!("no hay canciones con URL para guardar");
        }

        let playlist = StoredPlaylist {
            name: name.to_string(),
            owner_id: owner.get(),
            saved_at: Utc::now(),
            tracks: entries,
        };

        let path = self.playlist_path(owner, name);
        let content = serde_json::to_string_pretty(&playlist)?;
        fs::write(&path, content).await?;

        info!(
            "💾 Playlist '{}' guardada ({} canciones)",
            name,
            playlist.tracks.len()
        );
        Ok(playlist.tracks.len())
    }

    pub async fn load(&self, owner: UserId, name: &str) -> Result<StoredPlaylist> {
        let path = self.playlist_path(owner, name);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|_| anyhow::anyhow!("la playlist '{}' no existe", name))?;
        let playlist: StoredPlaylist = serde_json::from_str(&content)?;
        Ok(playlist)
    }

    /// Un archivo por playlist; el nombre se sanea para que no pueda salirse
    /// del directorio de datos
    fn playlist_path(&self, owner: UserId, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.data_dir
            .join("playlists")
            .join(format!("{}_{}.json", owner.get(), safe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str, url: Option<&str>) -> Track {
        let t = Track::new(title, UserId::new(9));
        match url {
            Some(url) => t.with_url(url.to_string()),
            None => t,
        }
    }

    #[tokio::test]
    async fn test_save_skips_urlless_tracks_and_load_restores() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().to_path_buf()).await.unwrap();

        let tracks = vec![
            track("uno", Some("https://youtu.be/aaaaaaaaaaa")),
            track("sin url", None),
            track("dos", Some("https://youtu.be/bbbbbbbbbbb")),
        ];

        let saved = store.save(UserId::new(9), "favoritas", &tracks).await.unwrap();
        assert_eq!(saved, 2);

        let loaded = store.load(UserId::new(9), "favoritas").await.unwrap();
        assert_eq!(loaded.owner_id, 9);
        assert_eq!(loaded.tracks.len(), 2);
        assert_eq!(loaded.tracks[0].title, "uno");
        assert_eq!(loaded.tracks[1].url, "https://youtu.be/bbbbbbbbbbb");
    }

    #[tokio::test]
    async fn test_load_missing_playlist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().to_path_buf()).await.unwrap();

        let err = store.load(UserId::new(9), "nada").await.unwrap_err();
        assert!(err.to_string().contains("no existe"));
    }

    #[tokio::test]
    async fn test_playlist_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().to_path_buf()).await.unwrap();

        let tracks = vec![track("uno", Some("https://youtu.be/aaaaaaaaaaa"))];
        store
            .save(UserId::new(9), "../../etc/passwd", &tracks)
            .await
            .unwrap();

        // el archivo queda dentro del directorio de playlists
        let mut entries = tokio::fs::read_dir(dir.path().join("playlists")).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().starts_with("9_"));

        // y se puede volver a cargar con el mismo nombre
        let loaded = store.load(UserId::new(9), "../../etc/passwd").await.unwrap();
        assert_eq!(loaded.tracks.len(), 1);
    }

    #[tokio::test]
    async fn test_save_empty_queue_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().to_path_buf()).await.unwrap();

        let err = store.save(UserId::new(9), "vacia", &[]).await.unwrap_err();
        assert!(err.to_string().contains("no hay canciones"));
    }

    #[tokio::test]
    async fn test_playlists_are_keyed_by_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path().to_path_buf()).await.unwrap();

        let tracks = vec![track("uno", Some("https://youtu.be/aaaaaaaaaaa"))];
        store.save(UserId::new(9), "mia", &tracks).await.unwrap();

        // otro usuario no ve la playlist del primero
        assert!(store.load(UserId::new(10), "mia").await.is_err());
    }
}
