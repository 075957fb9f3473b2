//! Test doubles shared by the unit tests.

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::watch;

use crate::{
    error::{Error, Result},
    protocol::{
        media::{Album, Library, Song},
        status::{CurrentlyPlaying, PlayState, Seek},
    },
    remote::{ControlClient, MusicClient, ThumbnailSource},
};

/// Encodes a gradient PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            u8::try_from(x % 256).unwrap(),
            u8::try_from(y % 256).unwrap(),
            0x80,
        ])
    });

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Thumbnail source serving canned payloads.
///
/// References without a payload fail like an unreachable server. A gated
/// source holds every download until [`release`](Self::release) is called.
pub struct MockThumbnailSource {
    payloads: Mutex<HashMap<String, Bytes>>,
    calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl MockThumbnailSource {
    pub fn new() -> Self {
        Self {
            payloads: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            gate: watch::Sender::new(true),
        }
    }

    pub fn gated() -> Self {
        let source = Self::new();
        source.gate.send_replace(false);
        source
    }

    pub fn insert(&self, reference: &str, payload: Vec<u8>) {
        self.payloads
            .lock()
            .unwrap()
            .insert(reference.to_owned(), Bytes::from(payload));
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailSource for MockThumbnailSource {
    async fn fetch_thumbnail(&self, reference: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        while !*gate.borrow_and_update() {
            gate.changed()
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
        }

        self.payloads
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::unavailable(format!("connection refused fetching {reference}")))
    }
}

/// A mutation sent to [`MockRemote`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    PlayFile(String),
    PlayUrl(String),
    PlayNext,
    PlayPrevious,
    Pause,
    Stop,
    Mute,
    Seek(Seek),
    SetVolume(u8),
    QueuePath(String),
    SetPlaylistId(u8),
    UpdateLibrary(Library),
    AddToPlaylist(String),
    RemoveFromPlaylist(usize),
    ClearPlaylist,
    SetCurrentPlaylist,
    PlayPlaylistItem(usize),
}

#[derive(Default)]
struct RemoteState {
    calls: Vec<Call>,
    playlist: Vec<String>,
    position: Option<usize>,
    state: PlayState,
    volume: u8,
    muted: bool,
    playlist_id: u8,
    library: Vec<(Album, Vec<Song>)>,
    offline: bool,
    play_state_fails: bool,
}

/// In-memory media center implementing both control and music clients.
///
/// Records every mutation and updates its playlist and play state the way
/// the media center would.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<RemoteState>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that start playback of a playlist item.
    pub fn playback_starts(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::PlayPlaylistItem(position) => Some(position),
                _ => None,
            })
            .collect()
    }

    pub fn playlist_items(&self) -> Vec<String> {
        self.state.lock().unwrap().playlist.clone()
    }

    pub fn set_play_state(&self, state: PlayState) {
        self.state.lock().unwrap().state = state;
    }

    pub fn set_playlist(&self, paths: &[&str]) {
        self.state.lock().unwrap().playlist = paths.iter().map(|&path| path.to_owned()).collect();
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Makes play state queries fail while everything else keeps working.
    pub fn fail_play_state(&self) {
        self.state.lock().unwrap().play_state_fails = true;
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    pub fn add_album(&self, album: Album, songs: Vec<Song>) {
        self.state.lock().unwrap().library.push((album, songs));
    }

    fn record(&self, call: Call) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(Error::unavailable("media center offline"));
        }

        match &call {
            Call::PlayFile(_) | Call::PlayUrl(_) => state.state = PlayState::Playing,
            Call::Stop => {
                state.state = PlayState::Stopped;
                state.position = None;
            }
            Call::Pause => {
                state.state = match state.state {
                    PlayState::Playing => PlayState::Paused,
                    PlayState::Paused => PlayState::Playing,
                    PlayState::Stopped => return Ok(false),
                };
            }
            Call::Mute => state.muted = !state.muted,
            Call::SetVolume(volume) => state.volume = *volume,
            Call::SetPlaylistId(id) => state.playlist_id = *id,
            Call::AddToPlaylist(path) | Call::QueuePath(path) => state.playlist.push(path.clone()),
            Call::RemoveFromPlaylist(position) => {
                if *position >= state.playlist.len() {
                    state.calls.push(call);
                    return Ok(false);
                }
                state.playlist.remove(*position);
            }
            Call::ClearPlaylist => state.playlist.clear(),
            Call::PlayPlaylistItem(position) => {
                if *position >= state.playlist.len() {
                    state.calls.push(call);
                    return Ok(false);
                }
                state.position = Some(*position);
                state.state = PlayState::Playing;
            }
            Call::PlayNext => {
                let next = state.position.map_or(0, |position| position + 1);
                state.position = (next < state.playlist.len()).then_some(next);
            }
            Call::PlayPrevious | Call::Seek(_) | Call::UpdateLibrary(_) => {}
            Call::SetCurrentPlaylist => state.playlist_id = 0,
        }

        state.calls.push(call);
        Ok(true)
    }

    fn query<T>(&self, f: impl FnOnce(&RemoteState) -> T) -> Result<T> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(Error::unavailable("media center offline"));
        }
        Ok(f(&state))
    }
}

#[async_trait]
impl ControlClient for MockRemote {
    async fn play_file(&self, path: &str) -> Result<bool> {
        self.record(Call::PlayFile(path.to_owned()))
    }

    async fn play_url(&self, url: &str) -> Result<bool> {
        self.record(Call::PlayUrl(url.to_owned()))
    }

    async fn play_next(&self) -> Result<bool> {
        self.record(Call::PlayNext)
    }

    async fn play_previous(&self) -> Result<bool> {
        self.record(Call::PlayPrevious)
    }

    async fn pause(&self) -> Result<bool> {
        self.record(Call::Pause)
    }

    async fn stop(&self) -> Result<bool> {
        self.record(Call::Stop)
    }

    async fn mute(&self) -> Result<bool> {
        self.record(Call::Mute)
    }

    async fn seek(&self, seek: Seek) -> Result<bool> {
        self.record(Call::Seek(seek.validate()?))
    }

    async fn set_volume(&self, volume: u8) -> Result<bool> {
        self.record(Call::SetVolume(volume))
    }

    async fn volume(&self) -> Result<u8> {
        self.query(|state| state.volume)
    }

    async fn position(&self) -> Result<u8> {
        self.query(|_| 42)
    }

    async fn currently_playing(&self) -> Result<CurrentlyPlaying> {
        self.query(|state| {
            let Some(position) = state.position else {
                return CurrentlyPlaying::default();
            };
            CurrentlyPlaying {
                state: state.state,
                filename: state.playlist.get(position).cloned(),
                playlist_position: Some(position),
                ..CurrentlyPlaying::default()
            }
        })
    }

    async fn play_state(&self) -> Result<PlayState> {
        self.query(|state| {
            if state.play_state_fails {
                return Err(Error::unavailable("play state query timed out"));
            }
            Ok(state.state)
        })?
    }

    async fn queue_path(&self, path: &str) -> Result<bool> {
        self.record(Call::QueuePath(path.to_owned()))
    }

    async fn playlist_id(&self) -> Result<u8> {
        self.query(|state| state.playlist_id)
    }

    async fn set_playlist_id(&self, id: u8) -> Result<bool> {
        self.record(Call::SetPlaylistId(id))
    }

    async fn update_library(&self, library: Library) -> Result<bool> {
        self.record(Call::UpdateLibrary(library))
    }
}

#[async_trait]
impl MusicClient for MockRemote {
    async fn albums(&self) -> Result<Vec<Album>> {
        self.query(|state| state.library.iter().map(|(album, _)| album.clone()).collect())
    }

    async fn songs(&self, album: &Album) -> Result<Vec<Song>> {
        self.query(|state| {
            state
                .library
                .iter()
                .find(|(candidate, _)| candidate.id == album.id)
                .map(|(_, songs)| songs.clone())
                .unwrap_or_default()
        })
    }

    async fn playlist(&self) -> Result<Vec<String>> {
        self.query(|state| state.playlist.clone())
    }

    async fn playlist_size(&self) -> Result<usize> {
        self.query(|state| state.playlist.len())
    }

    async fn playlist_position(&self) -> Result<Option<usize>> {
        self.query(|state| state.position)
    }

    async fn add_to_playlist(&self, song: &Song) -> Result<bool> {
        self.record(Call::AddToPlaylist(song.path.clone()))
    }

    async fn remove_from_playlist(&self, position: usize) -> Result<bool> {
        self.record(Call::RemoveFromPlaylist(position))
    }

    async fn clear_playlist(&self) -> Result<bool> {
        self.record(Call::ClearPlaylist)
    }

    async fn set_current_playlist(&self) -> Result<bool> {
        self.record(Call::SetCurrentPlaylist)
    }

    async fn play_playlist_item(&self, position: usize) -> Result<bool> {
        self.record(Call::PlayPlaylistItem(position))
    }

    async fn play_next(&self) -> Result<bool> {
        self.record(Call::PlayNext)
    }
}

/// A song with a path derived from its id.
pub fn song(id: u32, track: u32) -> Song {
    Song {
        id,
        title: format!("Song {id}"),
        artist: "Artist".to_owned(),
        track,
        path: format!("/music/{id:03}.flac"),
    }
}

/// An album with `count` songs, numbered from `first_id`.
pub fn album(id: u32, first_id: u32, count: u32) -> (Album, Vec<Song>) {
    let album = Album {
        id,
        name: format!("Album {id}"),
        artist: "Artist".to_owned(),
        thumbnail: Some(format!("special://thumbs/{id}.tbn")),
    };
    let songs = (0..count)
        .map(|track| song(first_id + track, track + 1))
        .collect();
    (album, songs)
}
