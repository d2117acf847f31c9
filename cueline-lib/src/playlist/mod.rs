//! Ordered track lists and the controller that walks them.

pub mod advance;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};

pub use advance::{AdvanceState, AutoAdvanceController, RetrySession};

/// One playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TrackRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title if set, otherwise the file name.
    pub fn display_name(&self) -> &str {
        if let Some(title) = self.title.as_deref() {
            return title;
        }
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }
}

impl From<&str> for TrackRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Tracks plus a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    tracks: Vec<TrackRef>,
    current: Option<usize>,
}

impl Playlist {
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self {
            tracks,
            current: None,
        }
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackRef> {
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&TrackRef> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    pub fn set_current(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            if index >= self.tracks.len() {
                return Err(PlayerError::IndexOutOfBounds(index));
            }
        }
        self.current = index;
        Ok(())
    }

    /// Entry after the cursor. With no cursor this is the first entry.
    pub fn next_index(&self) -> Option<usize> {
        let candidate = self.current.map_or(0, |index| index + 1);
        (candidate < self.tracks.len()).then_some(candidate)
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.current
            .and_then(|index| index.checked_sub(1))
            .filter(|index| *index < self.tracks.len())
    }

    /// Swap in new tracks and clear the cursor.
    pub fn replace(&mut self, tracks: Vec<TrackRef>) {
        self.tracks = tracks;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(paths: &[&str]) -> Playlist {
        Playlist::new(paths.iter().map(|p| TrackRef::new(*p)).collect())
    }

    #[test]
    fn navigation_respects_the_bounds() {
        let mut list = playlist(&["a.mp3", "b.mp3"]);
        assert_eq!(list.next_index(), Some(0));
        assert_eq!(list.previous_index(), None);

        list.set_current(Some(1)).expect("in range");
        assert_eq!(list.next_index(), None);
        assert_eq!(list.previous_index(), Some(0));

        assert_eq!(
            list.set_current(Some(2)),
            Err(PlayerError::IndexOutOfBounds(2))
        );
        list.replace(vec![TrackRef::new("c.mp3")]);
        assert_eq!(list.current_index(), None);
    }

    #[test]
    fn display_name_prefers_the_title() {
        let plain = TrackRef::new("/music/album/01 intro.flac");
        assert_eq!(plain.display_name(), "01 intro.flac");
        assert_eq!(plain.clone().with_title("Intro").display_name(), "Intro");
    }

    #[test]
    fn untitled_refs_serialize_without_a_title() {
        let json = serde_json::to_string(&TrackRef::new("a.mp3")).expect("serialize");
        assert_eq!(json, r#"{"path":"a.mp3"}"#);
        let back: TrackRef = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, TrackRef::new("a.mp3"));
    }
}
