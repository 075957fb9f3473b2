//! Clients for the media center.
//!
//! The managers and the thumbnail cache talk to the media center only
//! through the traits in this module:
//!
//! * [`ControlClient`] - playback commands and state queries
//! * [`MusicClient`] - music library queries and playlist mutation
//! * [`ThumbnailSource`] - thumbnail downloads
//!
//! Commands that the media center refuses resolve to `Ok(false)`. Only
//! transport failures and unparseable responses are errors.
//!
//! [`HttpApiClient`] implements all three against the XBMC HTTP API.

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use url::Url;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    http,
    protocol::{
        self,
        media::{Album, Library, Song},
        status::{CurrentlyPlaying, PlayState, Seek},
        Command, MUSIC_PLAYLIST,
    },
};

/// Playback commands and state queries.
#[async_trait]
pub trait ControlClient: Send + Sync {
    /// Starts playing a file on the media center's file system.
    async fn play_file(&self, path: &str) -> Result<bool>;

    /// Starts playing a media file at `url`.
    async fn play_url(&self, url: &str) -> Result<bool>;

    async fn play_next(&self) -> Result<bool>;

    async fn play_previous(&self) -> Result<bool>;

    /// Toggles pause.
    async fn pause(&self) -> Result<bool>;

    async fn stop(&self) -> Result<bool>;

    /// Toggles muting.
    async fn mute(&self) -> Result<bool>;

    async fn seek(&self, seek: Seek) -> Result<bool>;

    /// Sets the volume, from 0 to 100.
    async fn set_volume(&self, volume: u8) -> Result<bool>;

    /// Current volume, from 0 to 100.
    async fn volume(&self) -> Result<u8>;

    /// Progress through the current item, from 0 to 100.
    async fn position(&self) -> Result<u8>;

    async fn currently_playing(&self) -> Result<CurrentlyPlaying>;

    async fn play_state(&self) -> Result<PlayState> {
        Ok(self.currently_playing().await?.state)
    }

    /// Appends a file, or every file in a folder, to the active playlist.
    async fn queue_path(&self, path: &str) -> Result<bool>;

    /// Number of the active playlist.
    async fn playlist_id(&self) -> Result<u8>;

    /// Makes playlist `id` the active one.
    async fn set_playlist_id(&self, id: u8) -> Result<bool>;

    /// Starts rescanning `library` for new media.
    async fn update_library(&self, library: Library) -> Result<bool>;
}

/// Music library queries and music playlist mutation.
#[async_trait]
pub trait MusicClient: Send + Sync {
    async fn albums(&self) -> Result<Vec<Album>>;

    /// Songs of `album`, in track order.
    async fn songs(&self, album: &Album) -> Result<Vec<Song>>;

    /// Paths of the items in the music playlist.
    async fn playlist(&self) -> Result<Vec<String>>;

    async fn playlist_size(&self) -> Result<usize>;

    /// Position of the current item in the music playlist, if any.
    async fn playlist_position(&self) -> Result<Option<usize>>;

    /// Appends a song to the music playlist.
    async fn add_to_playlist(&self, song: &Song) -> Result<bool>;

    async fn remove_from_playlist(&self, position: usize) -> Result<bool>;

    async fn clear_playlist(&self) -> Result<bool>;

    /// Makes the music playlist the active one.
    async fn set_current_playlist(&self) -> Result<bool>;

    /// Starts playback of the active playlist at `position`.
    async fn play_playlist_item(&self, position: usize) -> Result<bool>;

    /// Advances the active playlist.
    async fn play_next(&self) -> Result<bool>;
}

/// Where the thumbnail cache downloads from.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Downloads the encoded thumbnail at `reference`.
    ///
    /// Empty bytes mean the media center has no such thumbnail.
    async fn fetch_thumbnail(&self, reference: &str) -> Result<Bytes>;
}

/// Client for the XBMC HTTP API.
pub struct HttpApiClient {
    http: http::Client,
    base_url: Url,
}

impl HttpApiClient {
    /// Creates a client for the media center configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.base_url()?;
        debug!("media center at {base_url}");

        Ok(Self {
            http: http::Client::new(config)?,
            base_url,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call(&self, command: Command) -> Result<String> {
        let url = command.url(&self.base_url)?;
        trace!("{} -> {url}", command.name());
        self.http.get_text(url).await
    }

    /// Runs a command whose response is a bare acknowledgement.
    async fn execute(&self, command: Command) -> Result<bool> {
        let name = command.name();
        let body = self.call(command).await?;

        let ok = protocol::is_ok(&body);
        if !ok {
            debug!("{name} refused: {}", protocol::entries(&body).join(" "));
        }
        Ok(ok)
    }

    async fn integer(&self, command: Command) -> Result<i64> {
        let name = command.name();
        let body = self.call(command).await?;
        protocol::integer(name, &body)
    }

    async fn percentage(&self, command: Command) -> Result<u8> {
        let value = self.integer(command).await?;
        Ok(u8::try_from(value.clamp(0, 100)).unwrap_or_default())
    }

    async fn query_music(&self, sql: &str, columns: usize) -> Result<Vec<Vec<String>>> {
        let body = self
            .call(Command::new("QueryMusicDatabase").with(sql))
            .await?;
        protocol::records(&body, columns)
    }
}

#[async_trait]
impl ControlClient for HttpApiClient {
    async fn play_file(&self, path: &str) -> Result<bool> {
        self.execute(Command::new("PlayFile").with(path)).await
    }

    async fn play_url(&self, url: &str) -> Result<bool> {
        let url = Url::parse(url)?;
        self.execute(Command::new("PlayFile").with(url)).await
    }

    async fn play_next(&self) -> Result<bool> {
        self.execute(Command::new("PlayNext")).await
    }

    async fn play_previous(&self) -> Result<bool> {
        self.execute(Command::new("PlayPrev")).await
    }

    async fn pause(&self) -> Result<bool> {
        self.execute(Command::new("Pause")).await
    }

    async fn stop(&self) -> Result<bool> {
        self.execute(Command::new("Stop")).await
    }

    async fn mute(&self) -> Result<bool> {
        self.execute(Command::new("Mute")).await
    }

    async fn seek(&self, seek: Seek) -> Result<bool> {
        let command = match seek.validate()? {
            Seek::Absolute(percent) => Command::new("SeekPercentage").with(percent.to_string()),
            Seek::Relative(percent) => {
                Command::new("SeekPercentageRelative").with(percent.to_string())
            }
        };
        self.execute(command).await
    }

    async fn set_volume(&self, volume: u8) -> Result<bool> {
        if volume > 100 {
            return Err(Error::out_of_range(format!("volume {volume} exceeds 100")));
        }
        self.execute(Command::new("SetVolume").with(volume.to_string()))
            .await
    }

    async fn volume(&self) -> Result<u8> {
        self.percentage(Command::new("GetVolume")).await
    }

    async fn position(&self) -> Result<u8> {
        self.percentage(Command::new("GetPercentage")).await
    }

    async fn currently_playing(&self) -> Result<CurrentlyPlaying> {
        let body = self.call(Command::new("GetCurrentlyPlaying")).await?;
        Ok(CurrentlyPlaying::from_entries(&protocol::entries(&body)))
    }

    async fn queue_path(&self, path: &str) -> Result<bool> {
        self.execute(Command::new("AddToPlayList").with(path)).await
    }

    async fn playlist_id(&self) -> Result<u8> {
        let id = self.integer(Command::new("GetCurrentPlaylist")).await?;
        u8::try_from(id).map_err(|_| Error::out_of_range(format!("playlist {id} does not exist")))
    }

    async fn set_playlist_id(&self, id: u8) -> Result<bool> {
        self.execute(Command::new("SetCurrentPlaylist").with(id.to_string()))
            .await
    }

    async fn update_library(&self, library: Library) -> Result<bool> {
        self.execute(Command::new("ExecBuiltIn").with(library.update_builtin()))
            .await
    }
}

#[async_trait]
impl MusicClient for HttpApiClient {
    async fn albums(&self) -> Result<Vec<Album>> {
        self.query_music(Album::QUERY, Album::COLUMNS)
            .await?
            .iter()
            .map(|record| Album::from_record(record))
            .collect()
    }

    async fn songs(&self, album: &Album) -> Result<Vec<Song>> {
        self.query_music(&album.songs_query(), Song::COLUMNS)
            .await?
            .iter()
            .map(|record| Song::from_record(record))
            .collect()
    }

    async fn playlist(&self) -> Result<Vec<String>> {
        let body = self
            .call(Command::new("GetPlaylistContents").with(MUSIC_PLAYLIST.to_string()))
            .await?;
        Ok(protocol::playlist(&body))
    }

    async fn playlist_size(&self) -> Result<usize> {
        let size = self
            .integer(Command::new("GetPlaylistLength").with(MUSIC_PLAYLIST.to_string()))
            .await?;
        Ok(usize::try_from(size).unwrap_or_default())
    }

    async fn playlist_position(&self) -> Result<Option<usize>> {
        match self.integer(Command::new("GetPlaylistSong")).await {
            Ok(position) => Ok(usize::try_from(position).ok()),
            // Reported as an error when nothing is selected.
            Err(e) if e.kind == ErrorKind::FailedPrecondition => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn add_to_playlist(&self, song: &Song) -> Result<bool> {
        self.execute(
            Command::new("AddToPlayList").with(format!("{};{MUSIC_PLAYLIST}", song.path)),
        )
        .await
    }

    async fn remove_from_playlist(&self, position: usize) -> Result<bool> {
        self.execute(
            Command::new("RemoveFromPlaylist").with(format!("{position};{MUSIC_PLAYLIST}")),
        )
        .await
    }

    async fn clear_playlist(&self) -> Result<bool> {
        self.execute(Command::new("ClearPlayList").with(MUSIC_PLAYLIST.to_string()))
            .await
    }

    async fn set_current_playlist(&self) -> Result<bool> {
        self.execute(Command::new("SetCurrentPlaylist").with(MUSIC_PLAYLIST.to_string()))
            .await
    }

    async fn play_playlist_item(&self, position: usize) -> Result<bool> {
        self.execute(Command::new("SetPlaylistSong").with(position.to_string()))
            .await
    }

    async fn play_next(&self) -> Result<bool> {
        self.execute(Command::new("PlayNext")).await
    }
}

#[async_trait]
impl ThumbnailSource for HttpApiClient {
    async fn fetch_thumbnail(&self, reference: &str) -> Result<Bytes> {
        let body = self
            .call(Command::new("FileDownload").with(reference))
            .await?;
        decode_download(&body)
    }
}

/// Decodes a `FileDownload` response.
///
/// The media center answers with the base64-encoded file, or with an error
/// entry if there is no such file, which maps to empty bytes.
fn decode_download(body: &str) -> Result<Bytes> {
    let Some(entry) = protocol::entries(body).into_iter().next() else {
        return Ok(Bytes::new());
    };
    if entry.starts_with("Error") {
        return Ok(Bytes::new());
    }

    let encoded: String = entry.split_whitespace().collect();
    let decoded = BASE64_STANDARD.decode(encoded)?;
    Ok(Bytes::from(decoded))
}
