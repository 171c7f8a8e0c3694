use std::{env, io, io::BufRead, sync::Arc, thread};

use crossbeam_channel::Sender;
use env_logger::{Builder, Env};

use sleeve_core::{
    artwork::{ArtworkFetcher, Palette},
    auth::{SpotifyAuth, TokenStore},
    geometry::{FlowParams, Viewport},
    layout::FlowLayout,
    sync::{RenderHost, SyncConfig, SyncController, SyncEvent},
    track::Track,
    webapi::SpotifyPlayback,
};

const ENV_LOG: &str = "SLEEVE_LOG";
const ENV_LOG_STYLE: &str = "SLEEVE_LOG_STYLE";

const DEFAULT_REDIRECT_PORT: u16 = 8888;

const TERM_VIEWPORT_WIDTH: f64 = 900.0;

fn main() {
    // Setup logging from the env variables, with defaults.
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    let proxy_url = env::var("SLEEVE_PROXY").ok();
    let redirect_port = env::var("SLEEVE_REDIRECT_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_REDIRECT_PORT);

    let tokens = TokenStore::new();
    let auth = SpotifyAuth::new(tokens.clone(), redirect_port);
    let playback = SpotifyPlayback::new(tokens, proxy_url.as_deref());
    let artwork = ArtworkFetcher::new(proxy_url.as_deref());

    let mut controller = SyncController::new(
        Arc::new(auth),
        Arc::new(playback),
        Arc::new(artwork),
        SyncConfig::default(),
    );

    let _input_thread = thread::spawn({
        let events = controller.sender();
        move || {
            for line in io::stdin().lock().lines() {
                match line.as_ref().map(|s| s.as_str()) {
                    Ok("q") => {
                        events.send(SyncEvent::Shutdown).unwrap();
                        break;
                    }
                    _ => log::warn!("unknown command, 'q' quits"),
                }
            }
        }
    });

    let mut strip = TermStrip::new(controller.sender());
    controller.run(&mut strip);
}

/// Renders the cover strip as text, one cover per line, with the perspective
/// transforms spelled out.
struct TermStrip {
    layout: FlowLayout,
    tracks: Vec<Track>,
    offset: f64,
    events: Sender<SyncEvent>,
}

impl TermStrip {
    fn new(events: Sender<SyncEvent>) -> Self {
        Self {
            layout: FlowLayout::new(
                FlowParams::default(),
                Viewport {
                    width: TERM_VIEWPORT_WIDTH,
                },
            ),
            tracks: Vec::new(),
            offset: 0.0,
            events,
        }
    }

    fn print_strip(&self) {
        let transforms = self.layout.layout_items(self.tracks.len(), self.offset);
        for (track, transform) in self.tracks.iter().zip(&transforms) {
            let marker = if transform.focused { '>' } else { ' ' };
            println!(
                "{} {:24}  scale {:.2}  tilt {:+5.0} deg  z {}",
                marker,
                track.title,
                transform.scale,
                transform.rotation.to_degrees(),
                transform.z_index,
            );
        }
    }
}

impl RenderHost for TermStrip {
    fn refresh_items(&mut self, tracks: Vec<Track>, current: Option<usize>) {
        let titles: Vec<String> = tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                if current == Some(index) {
                    format!("[{}]", track.title)
                } else {
                    track.title.to_string()
                }
            })
            .collect();
        println!("window: {}", titles.join("  "));
        self.tracks = tracks;
    }

    fn scroll_to(&mut self, index: usize) {
        self.offset = self.layout.offset_centering(index);
        self.print_strip();
        // There is no animation here, report completion right away.
        self.events.send(SyncEvent::ScrollCompleted).unwrap();
    }

    fn apply_backdrop(&mut self, palette: Palette) {
        println!("backdrop: {} over {}", palette.primary, palette.secondary);
    }
}
