use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use threadpool::ThreadPool;

use crate::{
    artwork::{ImagePipeline, Palette},
    auth::AuthProvider,
    error::Error,
    track::{Track, TrackId},
    webapi::PlaybackSource,
    window::{Enqueue, TrackWindow, WindowChange},
};

// Worker threads shared by playback polls and artwork processing.
const WORKER_THREADS: usize = 4;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Controller state shared with status indicators.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub authorized: bool,
    pub last_sync: Option<Instant>,
}

pub type StatusHandle = Arc<Mutex<SyncStatus>>;

#[derive(Debug)]
pub enum SyncEvent {
    /// Poll timer fired.
    Tick,
    Authorized(Result<String, Error>),
    NowPlaying(Result<Track, Error>),
    UpcomingQueue(Result<Vec<Track>, Error>),
    /// The host finished centering the current item.
    ScrollCompleted,
    /// Color extraction of a cover finished.
    PaletteReady {
        id: TrackId,
        palette: Option<Palette>,
    },
    Shutdown,
}

/// Presentation seam driven by the controller.  Calls arrive on the
/// controller thread, in event order.
pub trait RenderHost {
    /// Replace the rendered strip with a fresh window snapshot.
    fn refresh_items(&mut self, tracks: Vec<Track>, current: Option<usize>);

    /// Center `index` in the viewport.  Once the movement settles, the host
    /// reports back with a `ScrollCompleted` event.
    fn scroll_to(&mut self, index: usize);

    /// Recolor the backdrop with the palette of the focused cover.
    fn apply_backdrop(&mut self, palette: Palette);
}

pub struct SyncController {
    window: TrackWindow,
    auth: Arc<dyn AuthProvider>,
    source: Arc<dyn PlaybackSource>,
    images: Arc<dyn ImagePipeline>,
    status: StatusHandle,
    config: SyncConfig,
    sender: Sender<SyncEvent>,
    receiver: Receiver<SyncEvent>,
    worker_pool: ThreadPool,
    auth_in_flight: bool,
}

impl SyncController {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        source: Arc<dyn PlaybackSource>,
        images: Arc<dyn ImagePipeline>,
        config: SyncConfig,
    ) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            window: TrackWindow::new(),
            auth,
            source,
            images,
            status: Arc::new(Mutex::new(SyncStatus::default())),
            config,
            sender,
            receiver,
            worker_pool: ThreadPool::with_name("sync_io".into(), WORKER_THREADS),
            auth_in_flight: false,
        }
    }

    pub fn sender(&self) -> Sender<SyncEvent> {
        self.sender.clone()
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn window(&self) -> &TrackWindow {
        &self.window
    }

    /// Enable polling if a usable access token is already stored, otherwise
    /// kick off the authorization flow.
    pub fn start(&mut self) {
        if self.auth.cached_token().is_some() {
            self.status.lock().authorized = true;
            log::info!("access token found, polling enabled");
        } else {
            self.begin_authorization();
        }
    }

    /// Drive the controller until `Shutdown` or until all senders are gone.
    /// A tick is synthesized whenever the queue stays idle for one poll
    /// interval, so the first poll happens an interval after startup.
    pub fn run(&mut self, host: &mut dyn RenderHost) {
        self.start();
        loop {
            let event = match self.receiver.recv_timeout(self.config.poll_interval) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => SyncEvent::Tick,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if !self.handle_event(event, host) {
                break;
            }
        }
    }

    /// Process a single event.  Returns `false` when the controller should
    /// shut down.
    pub fn handle_event(&mut self, event: SyncEvent, host: &mut dyn RenderHost) -> bool {
        match event {
            SyncEvent::Tick => {
                self.handle_tick();
            }
            SyncEvent::Authorized(result) => {
                self.handle_authorized(result);
            }
            SyncEvent::NowPlaying(result) => {
                self.handle_now_playing(result, host);
            }
            SyncEvent::UpcomingQueue(result) => {
                self.handle_upcoming(result, host);
            }
            SyncEvent::ScrollCompleted => {
                self.handle_scroll_completed();
            }
            SyncEvent::PaletteReady { id, palette } => {
                self.handle_palette(id, palette, host);
            }
            SyncEvent::Shutdown => {
                return false;
            }
        }
        true
    }

    fn handle_tick(&mut self) {
        if !self.status.lock().authorized {
            self.begin_authorization();
            return;
        }
        let sender = self.sender.clone();
        let source = self.source.clone();
        self.worker_pool.execute(move || {
            let result = source.fetch_currently_playing();
            sender.send(SyncEvent::NowPlaying(result)).unwrap();
        });
    }

    fn begin_authorization(&mut self) {
        if self.auth_in_flight {
            return;
        }
        self.auth_in_flight = true;
        log::info!("starting authorization flow");
        let sender = self.sender.clone();
        let auth = self.auth.clone();
        self.worker_pool.execute(move || {
            let result = auth.authorize();
            sender.send(SyncEvent::Authorized(result)).unwrap();
        });
    }

    fn handle_authorized(&mut self, result: Result<String, Error>) {
        self.auth_in_flight = false;
        match result {
            Ok(_) => {
                self.status.lock().authorized = true;
                log::info!("authorization complete, polling enabled");
            }
            Err(err) => {
                // The next tick retries the flow.
                log::error!("authorization failed: {}", err);
            }
        }
    }

    fn handle_now_playing(&mut self, result: Result<Track, Error>, host: &mut dyn RenderHost) {
        let track = match result {
            Ok(track) => track,
            Err(err) => {
                self.handle_fetch_error(err);
                return;
            }
        };
        self.status.lock().last_sync = Some(Instant::now());
        match self.window.set_current(track) {
            WindowChange::Unchanged => {}
            WindowChange::Changed => {
                host.refresh_items(self.window.snapshot(), self.window.current_index());
                if let Some(index) = self.window.current_index() {
                    host.scroll_to(index);
                }
                self.poll_upcoming();
            }
        }
    }

    fn handle_upcoming(&mut self, result: Result<Vec<Track>, Error>, host: &mut dyn RenderHost) {
        let queue = match result {
            Ok(queue) => queue,
            Err(err) => {
                self.handle_fetch_error(err);
                return;
            }
        };
        let next = match queue.into_iter().next() {
            Some(track) => track,
            None => {
                log::info!("upcoming queue is empty");
                return;
            }
        };
        if self.window.enqueue_upcoming(next) == Enqueue::Added {
            host.refresh_items(self.window.snapshot(), self.window.current_index());
        }
    }

    fn handle_scroll_completed(&self) {
        let track = match self.window.current_track() {
            Some(track) => track,
            None => return,
        };
        let id = track.id.clone();
        let url = track.art_url.clone();
        let sender = self.sender.clone();
        let images = self.images.clone();
        self.worker_pool.execute(move || {
            let palette = match images.load_image(&url) {
                Ok(image) => images.extract_palette(&image),
                Err(err) => {
                    log::warn!("failed to load cover art: {}", err);
                    None
                }
            };
            sender.send(SyncEvent::PaletteReady { id, palette }).unwrap();
        });
    }

    fn handle_palette(&mut self, id: TrackId, palette: Option<Palette>, host: &mut dyn RenderHost) {
        if self.window.current_id() != Some(&id) {
            log::info!("stale palette received, ignoring");
            return;
        }
        if let Some(palette) = palette {
            host.apply_backdrop(palette);
        }
    }

    fn handle_fetch_error(&mut self, err: Error) {
        match err {
            Error::AuthRequired => {
                log::info!("access token rejected, reauthorizing");
                self.status.lock().authorized = false;
                self.begin_authorization();
            }
            err => {
                // Transient, the next tick retries.
                log::warn!("playback fetch failed: {}", err);
            }
        }
    }

    fn poll_upcoming(&self) {
        let sender = self.sender.clone();
        let source = self.source.clone();
        self.worker_pool.execute(move || {
            let result = source.fetch_queue();
            sender.send(SyncEvent::UpcomingQueue(result)).unwrap();
        });
    }
}
