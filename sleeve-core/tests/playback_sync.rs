use std::{
    collections::VecDeque,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use sleeve_core::{
    artwork::{CoverImage, ImagePipeline, Palette, Rgb},
    auth::AuthProvider,
    error::Error,
    sync::{RenderHost, SyncConfig, SyncController, SyncEvent},
    track::{Track, TrackId},
    webapi::PlaybackSource,
};

const BACKDROP: Palette = Palette {
    primary: Rgb::new(120, 40, 40),
    secondary: Rgb::new(20, 20, 60),
};

fn track(id: &str) -> Track {
    Track {
        id: TrackId::from(id),
        title: Arc::from("Title"),
        album: Arc::from("Album"),
        artist: Arc::from("Artist"),
        art_url: Arc::from("https://covers.invalid/cover.jpg"),
    }
}

/// Playback source that replays canned poll results in order.  Once a script
/// runs out, fetches keep failing, which the controller treats as transient.
struct ScriptedSource {
    playing: Mutex<VecDeque<Result<Track, Error>>>,
    queues: Mutex<VecDeque<Result<Vec<Track>, Error>>>,
}

impl PlaybackSource for ScriptedSource {
    fn fetch_currently_playing(&self) -> Result<Track, Error> {
        self.playing
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::ParseError("script exhausted".into())))
    }

    fn fetch_queue(&self) -> Result<Vec<Track>, Error> {
        self.queues
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::ParseError("script exhausted".into())))
    }
}

struct StaticAuth;

impl AuthProvider for StaticAuth {
    fn cached_token(&self) -> Option<String> {
        Some("cached-token".into())
    }

    fn authorize(&self) -> Result<String, Error> {
        Ok("fresh-token".into())
    }
}

struct StaticImages;

impl ImagePipeline for StaticImages {
    fn load_image(&self, _url: &str) -> Result<CoverImage, Error> {
        Ok(CoverImage::new(RgbaImage::from_pixel(
            2,
            2,
            Rgba([120, 40, 40, 255]),
        )))
    }

    fn extract_palette(&self, _image: &CoverImage) -> Option<Palette> {
        Some(BACKDROP)
    }
}

#[derive(Debug, PartialEq)]
enum HostCall {
    Refresh(Vec<String>, Option<usize>),
    Backdrop(Palette),
}

/// Host that records controller calls for the test thread and acknowledges
/// every scroll right away, as if the animation were instantaneous.
struct ChannelHost {
    calls: Sender<HostCall>,
    events: Sender<SyncEvent>,
}

impl RenderHost for ChannelHost {
    fn refresh_items(&mut self, tracks: Vec<Track>, current: Option<usize>) {
        let ids = tracks.iter().map(|track| track.id.to_string()).collect();
        self.calls.send(HostCall::Refresh(ids, current)).unwrap();
    }

    fn scroll_to(&mut self, _index: usize) {
        self.events.send(SyncEvent::ScrollCompleted).unwrap();
    }

    fn apply_backdrop(&mut self, palette: Palette) {
        self.calls.send(HostCall::Backdrop(palette)).unwrap();
    }
}

fn refresh(ids: &[&str], current: Option<usize>) -> HostCall {
    HostCall::Refresh(ids.iter().map(|id| id.to_string()).collect(), current)
}

fn collect_session_calls(calls: &Receiver<HostCall>) -> Vec<HostCall> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut collected = Vec::new();
    while Instant::now() < deadline {
        let call = match calls.recv_timeout(Duration::from_secs(2)) {
            Ok(call) => call,
            Err(_) => break,
        };
        collected.push(call);
        let settled = collected.contains(&refresh(&["a", "b", "c"], Some(1)))
            && collected.iter().any(|call| matches!(call, HostCall::Backdrop(_)));
        if settled {
            break;
        }
    }
    collected
}

#[test]
fn controller_follows_a_polled_playback_session() {
    let source = ScriptedSource {
        playing: Mutex::new(VecDeque::from([Ok(track("a")), Ok(track("b"))])),
        queues: Mutex::new(VecDeque::from([Ok(Vec::new()), Ok(vec![track("c"), track("x")])])),
    };
    let mut controller = SyncController::new(
        Arc::new(StaticAuth),
        Arc::new(source),
        Arc::new(StaticImages),
        SyncConfig {
            poll_interval: Duration::from_millis(10),
        },
    );
    let status = controller.status();
    let events = controller.sender();

    let (calls_tx, calls_rx) = unbounded();
    let worker = thread::spawn(move || {
        let mut host = ChannelHost {
            calls: calls_tx,
            events: controller.sender(),
        };
        controller.run(&mut host);
    });

    let collected = collect_session_calls(&calls_rx);

    events.send(SyncEvent::Shutdown).unwrap();
    worker.join().unwrap();

    // The first track lands alone in the window and gets centered.
    assert_eq!(collected.first(), Some(&refresh(&["a"], Some(0))));

    // The second poll shifts the current item, and the follow-up queue poll
    // appends the preview of the next one.
    let pair_at = collected
        .iter()
        .position(|call| call == &refresh(&["a", "b"], Some(1)))
        .unwrap();
    let preview_at = collected
        .iter()
        .position(|call| call == &refresh(&["a", "b", "c"], Some(1)))
        .unwrap();
    assert!(pair_at < preview_at);

    // Scroll completion fed the cover through the image pipeline.
    assert!(collected.contains(&HostCall::Backdrop(BACKDROP)));

    assert!(status.lock().authorized);
    assert!(status.lock().last_sync.is_some());
}
