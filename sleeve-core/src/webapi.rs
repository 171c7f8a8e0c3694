use std::{io::Read, sync::Arc};

use serde::Deserialize;
use ureq::Agent;

use crate::{
    auth::TokenStoreHandle,
    error::Error,
    track::{Track, TrackId},
    util::default_ureq_agent_builder,
};

const API_URL: &str = "https://api.spotify.com/v1";

/// Polling seam of the sync controller.  Implementations are called from the
/// worker pool on every poll tick.
pub trait PlaybackSource: Send + Sync {
    /// The track the account is playing right now.
    fn fetch_currently_playing(&self) -> Result<Track, Error>;

    /// Upcoming tracks, in play order.
    fn fetch_queue(&self) -> Result<Vec<Track>, Error>;
}

/// Read-only client for the player endpoints of the Spotify Web API.
pub struct SpotifyPlayback {
    agent: Agent,
    tokens: TokenStoreHandle,
}

impl SpotifyPlayback {
    pub fn new(tokens: TokenStoreHandle, proxy_url: Option<&str>) -> Self {
        Self {
            agent: default_ureq_agent_builder(proxy_url).build().into(),
            tokens,
        }
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>, Error> {
        let token = self.tokens.get().ok_or(Error::AuthRequired)?;
        let response = self
            .agent
            .get(format!("{API_URL}/{path}"))
            .header("Authorization", &format!("Bearer {}", token))
            .call()?;

        let mut body = Vec::new();
        response.into_body().into_reader().read_to_end(&mut body)?;
        Ok(body)
    }
}

impl PlaybackSource for SpotifyPlayback {
    fn fetch_currently_playing(&self) -> Result<Track, Error> {
        let body = self.get_bytes("me/player/currently-playing")?;
        parse_currently_playing(&body)
    }

    fn fetch_queue(&self) -> Result<Vec<Track>, Error> {
        let body = self.get_bytes("me/player/queue")?;
        parse_queue(&body)
    }
}

#[derive(Deserialize)]
struct TrackItem {
    id: String,
    name: String,
    album: AlbumItem,
    artists: Vec<ArtistItem>,
}

#[derive(Deserialize)]
struct AlbumItem {
    name: String,
    #[serde(default)]
    images: Vec<ImageItem>,
}

#[derive(Deserialize)]
struct ImageItem {
    url: String,
}

#[derive(Deserialize)]
struct ArtistItem {
    name: String,
}

impl TryFrom<TrackItem> for Track {
    type Error = Error;

    fn try_from(item: TrackItem) -> Result<Track, Error> {
        let AlbumItem { name: album, images } = item.album;
        let artist = item
            .artists
            .into_iter()
            .next()
            .ok_or_else(|| Error::ParseError("track has no artists".into()))?;
        let art = images
            .into_iter()
            .next()
            .ok_or_else(|| Error::ParseError("album has no artwork".into()))?;

        Ok(Track {
            id: TrackId::from(item.id),
            title: Arc::from(item.name),
            album: Arc::from(album),
            artist: Arc::from(artist.name),
            art_url: Arc::from(art.url),
        })
    }
}

fn parse_currently_playing(body: &[u8]) -> Result<Track, Error> {
    #[derive(Deserialize)]
    struct CurrentlyPlaying {
        item: Option<TrackItem>,
    }

    let playing: CurrentlyPlaying = serde_json::from_slice(body)?;
    match playing.item {
        Some(item) => item.try_into(),
        None => Err(Error::ParseError("no track is playing".into())),
    }
}

fn parse_queue(body: &[u8]) -> Result<Vec<Track>, Error> {
    #[derive(Deserialize)]
    struct PlayerQueue {
        queue: Vec<TrackItem>,
    }

    let parsed: PlayerQueue = serde_json::from_slice(body)?;
    parsed.queue.into_iter().map(Track::try_from).collect()
}
