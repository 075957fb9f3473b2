//! Playback state reported by the media center, and seek requests.

use std::{fmt, time::Duration};

use crate::error::{Error, Result};

/// Whether the media center is playing anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayState {
    /// Parses the `PlayStatus` value of a status report.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status.trim() {
            s if s.eq_ignore_ascii_case("Playing") => Self::Playing,
            s if s.eq_ignore_ascii_case("Paused") => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// What the media center is currently playing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurrentlyPlaying {
    pub state: PlayState,
    pub filename: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub time: Duration,
    pub duration: Duration,
    /// Progress through the current item, from 0 to 100.
    pub percentage: f32,
    pub playlist_position: Option<usize>,
}

impl CurrentlyPlaying {
    /// Filename the server reports when nothing is loaded.
    const NOTHING_PLAYING: &'static str = "[Nothing Playing]";

    /// Parses the `Key:Value` entries of a `GetCurrentlyPlaying` response.
    ///
    /// Unknown keys are ignored; malformed times and numbers are treated as
    /// absent.
    #[must_use]
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut playing = Self::default();

        for entry in entries {
            let Some((key, value)) = entry.as_ref().split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "Filename" if value == Self::NOTHING_PLAYING => return Self::default(),
                "Filename" => playing.filename = non_empty(value),
                "PlayStatus" => playing.state = PlayState::from_status(value),
                "Title" => playing.title = non_empty(value),
                "Artist" => playing.artist = non_empty(value),
                "Album" => playing.album = non_empty(value),
                "Time" => playing.time = parse_time(value).unwrap_or_default(),
                "Duration" => playing.duration = parse_time(value).unwrap_or_default(),
                "Percentage" => playing.percentage = value.parse().unwrap_or_default(),
                "SongNo" => playing.playlist_position = value.parse().ok(),
                _ => trace!("ignoring status field {key}"),
            }
        }

        playing
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }
}

impl fmt::Display for CurrentlyPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(filename) = &self.filename else {
            return write!(f, "nothing playing");
        };

        let title = self.title.as_deref().unwrap_or(filename);
        write!(f, "[{}] ", self.state)?;
        if let Some(artist) = &self.artist {
            write!(f, "{artist} - ")?;
        }
        write!(
            f,
            "{title} ({}/{})",
            format_time(self.time),
            format_time(self.duration)
        )
    }
}

/// A seek request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Seek {
    /// Jump to a percentage of the current item's length.
    Absolute(u8),
    /// Move by a percentage of the current item's length.
    Relative(i8),
}

impl Seek {
    /// Validates the seek request.
    ///
    /// # Errors
    ///
    /// Returns an error if an absolute seek exceeds 100 percent or a relative
    /// seek exceeds 100 percent in either direction.
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::Absolute(percent) if percent > 100 => Err(Error::out_of_range(format!(
                "cannot seek to {percent}%"
            ))),
            Self::Relative(percent) if percent.unsigned_abs() > 100 => Err(Error::out_of_range(
                format!("cannot seek by {percent}%"),
            )),
            _ => Ok(self),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Parses `ss`, `mm:ss` or `hh:mm:ss`.
fn parse_time(value: &str) -> Option<Duration> {
    let mut seconds = 0u64;
    for part in value.split(':') {
        seconds = seconds
            .checked_mul(60)?
            .checked_add(part.trim().parse::<u64>().ok()?)?;
    }
    Some(Duration::from_secs(seconds))
}

fn format_time(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds >= 3600 {
        format!("{}:{:02}:{:02}", seconds / 3600, seconds / 60 % 60, seconds % 60)
    } else {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}
