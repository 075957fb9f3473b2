use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;

use super::Dispatcher;
use crate::{
    error::Result,
    executor::{Executors, Subsystem},
    protocol::{
        media::{Album, Song},
        status::PlayState,
    },
    remote::{ControlClient, MusicClient},
    response::AsyncResult,
};

/// Outcome of queueing songs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Enqueued {
    /// Songs the media center accepted.
    pub queued: usize,
    /// Playlist position at which playback was started, if it was.
    pub started_at: Option<usize>,
}

/// Music library and playlist, run on the music loop.
#[derive(Clone)]
pub struct MusicManager {
    dispatcher: Dispatcher,
    music: Arc<dyn MusicClient>,
    control: Arc<dyn ControlClient>,
}

/// Clients available to a music task.
#[derive(Clone)]
struct Clients {
    music: Arc<dyn MusicClient>,
    control: Arc<dyn ControlClient>,
}

impl MusicManager {
    #[must_use]
    pub fn new(
        executors: Arc<Executors>,
        music: Arc<dyn MusicClient>,
        control: Arc<dyn ControlClient>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(executors, Subsystem::Music),
            music,
            control,
        }
    }

    /// Returns a manager whose operations are cancelled with `token`.
    #[must_use]
    pub fn scoped(&self, token: &CancellationToken) -> Self {
        Self {
            dispatcher: self.dispatcher.scoped(token),
            ..self.clone()
        }
    }

    fn run<F, Fut, T>(&self, operation: F) -> AsyncResult<T>
    where
        F: FnOnce(Clients) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let clients = Clients {
            music: Arc::clone(&self.music),
            control: Arc::clone(&self.control),
        };
        self.dispatcher.submit(move || operation(clients))
    }

    pub fn albums(&self) -> AsyncResult<Vec<Album>> {
        self.run(|clients| async move { clients.music.albums().await })
    }

    pub fn songs(&self, album: &Album) -> AsyncResult<Vec<Song>> {
        let album = album.clone();
        self.run(move |clients| async move { clients.music.songs(&album).await })
    }

    /// Paths in the music playlist. An empty playlist is an empty list.
    pub fn playlist(&self) -> AsyncResult<Vec<String>> {
        self.run(|clients| async move { clients.music.playlist().await })
    }

    pub fn playlist_position(&self) -> AsyncResult<Option<usize>> {
        self.run(|clients| async move { clients.music.playlist_position().await })
    }

    /// Jumps to `position` in the music playlist.
    pub fn set_playlist_position(&self, position: usize) -> AsyncResult<bool> {
        self.run(move |clients| async move { clients.music.play_playlist_item(position).await })
    }

    pub fn remove_from_playlist(&self, position: usize) -> AsyncResult<bool> {
        self.run(move |clients| async move { clients.music.remove_from_playlist(position).await })
    }

    pub fn clear_playlist(&self) -> AsyncResult<bool> {
        self.run(|clients| async move { clients.music.clear_playlist().await })
    }

    pub fn play_next(&self) -> AsyncResult<bool> {
        self.run(|clients| async move { clients.music.play_next().await })
    }

    /// Appends `songs` to the music playlist and, if nothing is playing,
    /// starts playback at the first of them.
    pub fn enqueue(&self, songs: Vec<Song>) -> AsyncResult<Enqueued> {
        self.run(move |clients| async move {
            let previous = clients.music.playlist_size().await?;
            let queued = clients.add_all(&songs).await?;

            let started_at = if queued > 0 {
                clients.start_if_stopped(previous).await?
            } else {
                None
            };

            Ok(Enqueued { queued, started_at })
        })
    }

    /// Queues a song picked from an album.
    ///
    /// If the playlist is empty, the whole album is queued so that playback
    /// continues with the rest of it, otherwise only the song. If nothing is
    /// playing, playback starts at the song. The play state is read after the
    /// songs are queued, not before.
    ///
    /// Resolves to `true` if the whole album was queued.
    pub fn enqueue_from_album(&self, album: &Album, song: &Song) -> AsyncResult<bool> {
        let album = album.clone();
        let song = song.clone();
        self.run(move |clients| async move {
            let previous = clients.music.playlist_size().await?;

            let (whole_album, position) = if previous == 0 {
                let songs = clients.music.songs(&album).await?;
                clients.add_all(&songs).await?;
                (true, index_of(&songs, &song))
            } else {
                clients.add(&song).await?;
                (false, previous)
            };

            clients.start_if_stopped(position).await?;
            Ok(whole_album)
        })
    }

    /// Replaces the playlist with `album` and plays it from `song`.
    pub fn play_from_album(&self, album: &Album, song: &Song) -> AsyncResult<bool> {
        let album = album.clone();
        let song = song.clone();
        self.run(move |clients| async move {
            let songs = clients.music.songs(&album).await?;
            let position = index_of(&songs, &song);
            info!("playing {album} from position {position}");
            clients.replace_and_play(&songs, position).await
        })
    }

    /// Replaces the playlist with `album` and plays it from the start.
    pub fn play_album(&self, album: &Album) -> AsyncResult<bool> {
        let album = album.clone();
        self.run(move |clients| async move {
            let songs = clients.music.songs(&album).await?;
            info!("playing {album}");
            clients.replace_and_play(&songs, 0).await
        })
    }

    /// Replaces the playlist with `song` alone and plays it.
    pub fn play_song(&self, song: &Song) -> AsyncResult<bool> {
        let song = song.clone();
        self.run(move |clients| async move {
            info!("playing {song}");
            clients.replace_and_play(std::slice::from_ref(&song), 0).await
        })
    }

    /// Appends `song` to the music playlist. Playback is left alone.
    pub fn add_song(&self, song: &Song) -> AsyncResult<bool> {
        let song = song.clone();
        self.run(move |clients| async move { clients.add(&song).await })
    }
}

impl Clients {
    async fn add(&self, song: &Song) -> Result<bool> {
        let added = self.music.add_to_playlist(song).await?;
        if !added {
            warn!("media center refused to queue {}", song.path);
        }
        Ok(added)
    }

    /// Adds songs in order, returning how many were accepted.
    async fn add_all(&self, songs: &[Song]) -> Result<usize> {
        let mut queued = 0;
        for song in songs {
            if self.add(song).await? {
                queued += 1;
            }
        }
        debug!("queued {queued} of {} songs", songs.len());
        Ok(queued)
    }

    /// Clears the music playlist, stops playback, queues `songs` and plays
    /// from `position`.
    async fn replace_and_play(&self, songs: &[Song], position: usize) -> Result<bool> {
        self.music.clear_playlist().await?;
        self.control.stop().await?;
        self.add_all(songs).await?;

        self.music.set_current_playlist().await?;
        self.music.play_playlist_item(position).await
    }

    /// Starts the music playlist at `position` unless something is playing
    /// or paused.
    async fn start_if_stopped(&self, position: usize) -> Result<Option<usize>> {
        let state = self.control.play_state().await?;
        if state != PlayState::Stopped {
            trace!("not starting playback: {state}");
            return Ok(None);
        }

        self.music.set_current_playlist().await?;
        if self.music.play_playlist_item(position).await? {
            debug!("started playback at position {position}");
            Ok(Some(position))
        } else {
            warn!("media center refused to start playback at position {position}");
            Ok(None)
        }
    }
}

/// Position of `song` within `songs`, or the first position if absent.
fn index_of(songs: &[Song], song: &Song) -> usize {
    songs
        .iter()
        .position(|candidate| candidate.id == song.id)
        .unwrap_or_default()
}
