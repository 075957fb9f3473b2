//! Protocol types and parsing for the media center's HTTP API.
//!
//! Every call is a `GET` on `/xbmcCmds/xbmcHttp` with a `command` and an
//! optional `parameter` query argument. Responses are pseudo-HTML:
//!
//! ```text
//! <html>
//! <li>OK
//! </html>
//! ```
//!
//! Lists come back as one `<li>` entry per line, key/value status reports as
//! `<li>Key:Value` entries, and music database queries as a flat sequence of
//! `<field>…</field>` values that are grouped into records by column count.
//!
//! # Submodules
//!
//! * [`media`] - library items (albums and songs)
//! * [`status`] - playback state and seek requests

pub mod media;
pub mod status;

use url::Url;

use crate::error::{Error, Result};

/// Path of the command endpoint, relative to the server root.
pub const COMMAND_PATH: &str = "xbmcCmds/xbmcHttp";

/// Playlist number of the music playlist.
pub const MUSIC_PLAYLIST: u8 = 0;

/// Entry the server returns for an empty playlist.
const EMPTY_PLAYLIST: &str = "[Empty]";

/// A single HTTP API command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    parameter: Option<String>,
}

impl Command {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            parameter: None,
        }
    }

    /// Adds a parameter. Multiple arguments are separated by `;`.
    #[must_use]
    pub fn with(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolves the command against the server's base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` cannot be joined with the command path.
    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut url = base.join(COMMAND_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("command", self.name);
            if let Some(parameter) = &self.parameter {
                query.append_pair("parameter", parameter);
            }
        }
        Ok(url)
    }
}

/// Splits a response into its `<li>` entries.
#[must_use]
pub fn entries(body: &str) -> Vec<String> {
    body.split("<li>")
        .skip(1)
        .map(|entry| entry.replace("</html>", "").trim().to_owned())
        .collect()
}

/// Returns the first entry, or an error naming `command` if there is none.
///
/// # Errors
///
/// Returns an error if the response holds no entry or reports an error.
pub fn single(command: &str, body: &str) -> Result<String> {
    let entry = entries(body)
        .into_iter()
        .next()
        .ok_or_else(|| Error::invalid_argument(format!("{command}: empty response")))?;

    if let Some(message) = entry.strip_prefix("Error:") {
        return Err(Error::failed_precondition(format!(
            "{command}: {}",
            message.trim()
        )));
    }

    Ok(entry)
}

/// Whether a command response acknowledges success.
#[must_use]
pub fn is_ok(body: &str) -> bool {
    entries(body)
        .first()
        .is_some_and(|entry| entry.eq_ignore_ascii_case("OK"))
}

/// Parses a response holding a single integer.
///
/// # Errors
///
/// Returns an error if the response is empty, reports an error, or is not a
/// number.
pub fn integer(command: &str, body: &str) -> Result<i64> {
    let entry = single(command, body)?;
    entry
        .parse::<i64>()
        .map_err(|e| Error::invalid_argument(format!("{command}: {entry:?} is not a number: {e}")))
}

/// Parses a playlist listing, mapping the server's empty sentinel to an empty
/// list.
#[must_use]
pub fn playlist(body: &str) -> Vec<String> {
    let entries = entries(body);
    if entries.first().is_some_and(|first| first == EMPTY_PLAYLIST) {
        return Vec::new();
    }

    entries.into_iter().filter(|entry| !entry.is_empty()).collect()
}

/// Groups the `<field>` values of a database query into records of `columns`
/// values each.
///
/// # Errors
///
/// Returns an error if the number of fields is not a multiple of `columns`.
pub fn records(body: &str, columns: usize) -> Result<Vec<Vec<String>>> {
    const OPEN: &str = "<field>";
    const CLOSE: &str = "</field>";

    let mut fields = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| Error::invalid_argument("unterminated <field> in response"))?;
        fields.push(after[..end].to_owned());
        rest = &after[end + CLOSE.len()..];
    }

    if columns == 0 || fields.len() % columns != 0 {
        return Err(Error::invalid_argument(format!(
            "{} fields cannot be split into records of {columns} columns",
            fields.len()
        )));
    }

    Ok(fields.chunks(columns).map(<[String]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builds_command_url() {
        let base: Url = "http://htpc:8080/".parse().unwrap();
        let url = Command::new("AddToPlayList")
            .with("smb://nas/music/a b.mp3;0")
            .url(&base)
            .unwrap();

        assert_eq!(url.path(), "/xbmcCmds/xbmcHttp");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("command".to_owned(), "AddToPlayList".to_owned()),
                ("parameter".to_owned(), "smb://nas/music/a b.mp3;0".to_owned()),
            ]
        );
    }

    #[test]
    fn acknowledges_ok() {
        assert!(is_ok("<html>\n<li>OK\n</html>"));
        assert!(!is_ok("<html>\n<li>Error:Not playing\n</html>"));
        assert!(!is_ok("<html></html>"));
    }

    #[test]
    fn parses_integers_and_errors() {
        assert_eq!(integer("GetVolume", "<html>\n<li>85</html>").unwrap(), 85);

        let err = integer("GetVolume", "<html>\n<li>Error:Unknown</html>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);

        let err = integer("GetVolume", "<html>\n<li>loud</html>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn empty_playlist_sentinel_is_dropped() {
        assert!(playlist("<html>\n<li>[Empty]\n</html>").is_empty());
        assert_eq!(
            playlist("<html>\n<li>a.mp3\n<li>b.mp3\n</html>"),
            vec!["a.mp3", "b.mp3"]
        );
    }

    #[test]
    fn groups_fields_into_records() {
        let body = "<html>\n<field>1</field><field>Abbey Road</field>\n\
                    <field>2</field><field>Revolver</field>\n</html>";
        let albums = records(body, 2).unwrap();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[1], vec!["2", "Revolver"]);

        assert!(records(body, 3).is_err());
        assert!(records("<html></html>", 4).unwrap().is_empty());
    }
}
