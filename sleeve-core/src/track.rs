use std::{fmt, sync::Arc};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(Arc<str>);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One entry of the cover strip.  Cheap to clone; equality is keyed on `id`
/// alone, which is what window dedup and staleness checks compare.
#[derive(Clone, Debug)]
pub struct Track {
    pub id: TrackId,
    pub title: Arc<str>,
    pub album: Arc<str>,
    pub artist: Arc<str>,
    pub art_url: Arc<str>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}
