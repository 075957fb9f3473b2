//! Music library items as returned by the media center's database queries.

use std::fmt;

use crate::{
    cache::Cover,
    error::{Error, Result},
};

/// A media library the media center can rescan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Library {
    Music,
    Video,
}

impl Library {
    /// Builtin that starts rescanning the library.
    #[must_use]
    pub fn update_builtin(self) -> String {
        format!("UpdateLibrary({self})")
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music => f.write_str("music"),
            Self::Video => f.write_str("video"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Album {
    pub id: u32,
    pub name: String,
    pub artist: String,
    /// Path of the album's thumbnail on the media center, if it has one.
    pub thumbnail: Option<String>,
}

impl Album {
    /// Columns selected by [`Album::QUERY`], in order.
    pub const COLUMNS: usize = 4;

    pub const QUERY: &'static str =
        "SELECT idAlbum, strAlbum, strArtist, strThumb FROM albumview ORDER BY strAlbum";

    /// Builds an album from one database record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has the wrong shape or a malformed id.
    pub fn from_record(record: &[String]) -> Result<Self> {
        let [id, name, artist, thumbnail] = record else {
            return Err(Error::invalid_argument(format!(
                "album record has {} columns, expected {}",
                record.len(),
                Self::COLUMNS
            )));
        };

        Ok(Self {
            id: id.trim().parse()?,
            name: name.clone(),
            artist: artist.clone(),
            thumbnail: thumbnail_path(thumbnail),
        })
    }

    /// The album's cover art, keyed by a fingerprint of its thumbnail path.
    #[must_use]
    pub fn cover(&self) -> Option<Cover> {
        self.thumbnail.as_deref().map(Cover::new)
    }

    /// Query for the songs on this album, in track order.
    #[must_use]
    pub fn songs_query(&self) -> String {
        format!(
            "SELECT idSong, strTitle, strArtist, iTrack, strPath, strFileName \
             FROM songview WHERE idAlbum = {} ORDER BY iTrack",
            self.id
        )
    }
}

impl fmt::Display for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Song {
    pub id: u32,
    pub title: String,
    pub artist: String,
    pub track: u32,
    /// Full path of the file on the media center.
    pub path: String,
}

impl Song {
    /// Columns selected by [`Album::songs_query`], in order.
    pub const COLUMNS: usize = 6;

    /// Builds a song from one database record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has the wrong shape or malformed
    /// numbers.
    pub fn from_record(record: &[String]) -> Result<Self> {
        let [id, title, artist, track, directory, file] = record else {
            return Err(Error::invalid_argument(format!(
                "song record has {} columns, expected {}",
                record.len(),
                Self::COLUMNS
            )));
        };

        // The database stores the track number with the disc number in the
        // upper 16 bits.
        let track = track.trim().parse::<u32>().unwrap_or_default() & 0xffff;

        Ok(Self {
            id: id.trim().parse()?,
            title: title.clone(),
            artist: artist.clone(),
            track,
            path: format!("{directory}{file}"),
        })
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}. {}", self.track, self.title)
    }
}

fn thumbnail_path(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("NONE") {
        None
    } else {
        Some(field.to_owned())
    }
}
