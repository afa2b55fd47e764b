//! Tidal content resolution.
//!
//! Pure string-to-struct mapping; no network access happens here.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Result, RiptideError};

/// What kind of content a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Track,
    Album,
    Playlist,
    Video,
    Artist,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Track => "track",
            ContentKind::Album => "album",
            ContentKind::Playlist => "playlist",
            ContentKind::Video => "video",
            ContentKind::Artist => "artist",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed reference to one piece of Tidal content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    kind: ContentKind,
    id: String,
    source: String,
}

impl ContentReference {
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Content id extracted from the input. Numeric except for playlists,
    /// whose ids may contain hyphens.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The original input string. Passed through to the remote tool, which
    /// does its own URL handling.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// The `browse/` path segment is optional: both
/// `tidal.com/browse/track/123` and `tidal.com/track/123` resolve.
fn patterns() -> &'static [(ContentKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(ContentKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ContentKind::Track, r"tidal\.com/(?:browse/)?track/(\d+)"),
            (ContentKind::Album, r"tidal\.com/(?:browse/)?album/(\d+)"),
            (
                ContentKind::Playlist,
                r"tidal\.com/(?:browse/)?playlist/([a-zA-Z0-9-]+)",
            ),
            (ContentKind::Video, r"tidal\.com/(?:browse/)?video/(\d+)"),
            (ContentKind::Artist, r"tidal\.com/(?:browse/)?artist/(\d+)"),
        ]
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("pattern is valid")))
        .collect()
    })
}

/// Resolve a user-supplied string into a content reference.
///
/// A Tidal browse URL yields its kind and id verbatim; a bare numeric
/// string defaults to a track; anything else is `InvalidInput`.
pub fn resolve(input: &str) -> Result<ContentReference> {
    let input = input.trim();

    for (kind, pattern) in patterns() {
        if let Some(captures) = pattern.captures(input) {
            return Ok(ContentReference {
                kind: *kind,
                id: captures[1].to_string(),
                source: input.to_string(),
            });
        }
    }

    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(ContentReference {
            kind: ContentKind::Track,
            id: input.to_string(),
            source: input.to_string(),
        });
    }

    Err(RiptideError::InvalidInput(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_input_is_a_track() {
        let reference = resolve("46755209").unwrap();
        assert_eq!(reference.kind(), ContentKind::Track);
        assert_eq!(reference.id(), "46755209");
        assert_eq!(reference.source(), "46755209");
    }

    #[test]
    fn test_browse_urls_for_every_kind() {
        let cases = [
            ("https://tidal.com/browse/track/46755209", ContentKind::Track, "46755209"),
            ("https://tidal.com/browse/album/123456", ContentKind::Album, "123456"),
            ("https://tidal.com/browse/video/99887766", ContentKind::Video, "99887766"),
            ("https://tidal.com/browse/artist/3529422", ContentKind::Artist, "3529422"),
        ];
        for (url, kind, id) in cases {
            let reference = resolve(url).unwrap();
            assert_eq!(reference.kind(), kind, "for {}", url);
            assert_eq!(reference.id(), id, "for {}", url);
            assert_eq!(reference.source(), url);
        }
    }

    #[test]
    fn test_browse_segment_is_optional() {
        let reference = resolve("https://tidal.com/track/46755209").unwrap();
        assert_eq!(reference.kind(), ContentKind::Track);
        assert_eq!(reference.id(), "46755209");
    }

    #[test]
    fn test_playlist_ids_may_contain_hyphens() {
        let reference =
            resolve("https://tidal.com/browse/playlist/5a5f2b5c-9268-4fc5-8b4a-6b1d7e0f93ab")
                .unwrap();
        assert_eq!(reference.kind(), ContentKind::Playlist);
        assert_eq!(reference.id(), "5a5f2b5c-9268-4fc5-8b4a-6b1d7e0f93ab");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let reference = resolve("  46755209\n").unwrap();
        assert_eq!(reference.id(), "46755209");
        assert_eq!(reference.source(), "46755209");
    }

    #[test]
    fn test_unrecognized_input_fails() {
        for input in [
            "https://spotify.com/track/123",
            "not a url",
            "12a3",
            "",
            "https://tidal.com/browse/mix/abc",
        ] {
            let err = resolve(input).unwrap_err();
            assert!(
                matches!(err, RiptideError::InvalidInput(_)),
                "expected InvalidInput for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_invalid_input_carries_the_original_string() {
        let err = resolve("gopher://tidal.example").unwrap_err();
        assert!(err.to_string().contains("gopher://tidal.example"));
    }
}
