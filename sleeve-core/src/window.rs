use crate::track::{Track, TrackId};

// Tracks kept after a now-playing change: the track that just ended and the
// one that replaced it.
const RECENT_KEEP: usize = 2;

// Tracks kept while an upcoming track is previewed at the end of the strip.
const WINDOW_KEEP: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowChange {
    Changed,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueue {
    Added,
    SkippedDuplicate,
}

/// Bounded, deduplicated window of recently played, current and upcoming
/// tracks, in play order.  Owned by the sync controller; every mutation goes
/// through `set_current` or `enqueue_upcoming`.
pub struct TrackWindow {
    tracks: Vec<Track>,
    current_id: Option<TrackId>,
}

impl TrackWindow {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current_id: None,
        }
    }

    /// Make `track` the current one.  Appends it when absent and shrinks the
    /// window back to the previous/current pair, evicting from the front.
    pub fn set_current(&mut self, track: Track) -> WindowChange {
        if self.current_id.as_ref() == Some(&track.id) {
            return WindowChange::Unchanged;
        }
        let id = track.id.clone();
        if !self.contains(&id) {
            self.tracks.push(track);
        }
        self.current_id = Some(id);
        self.trim_front(RECENT_KEEP);
        WindowChange::Changed
    }

    /// Append an upcoming track unless its id is already present.
    pub fn enqueue_upcoming(&mut self, track: Track) -> Enqueue {
        if self.contains(&track.id) {
            return Enqueue::SkippedDuplicate;
        }
        self.tracks.push(track);
        self.trim_front(WINDOW_KEEP);
        Enqueue::Added
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        let current = self.current_id.as_ref()?;
        self.tracks.iter().position(|track| &track.id == current)
    }

    pub fn current_track(&self) -> Option<&Track> {
        let current = self.current_id.as_ref()?;
        self.tracks.iter().find(|track| &track.id == current)
    }

    pub fn current_id(&self) -> Option<&TrackId> {
        self.current_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn contains(&self, id: &TrackId) -> bool {
        self.tracks.iter().any(|track| &track.id == id)
    }

    /// Evict from the front until at most `keep` tracks remain, passing over
    /// the current one.
    fn trim_front(&mut self, keep: usize) {
        let mut index = 0;
        while self.tracks.len() > keep && index < self.tracks.len() {
            if self.current_id.as_ref() == Some(&self.tracks[index].id) {
                index += 1;
            } else {
                self.tracks.remove(index);
            }
        }
    }
}
