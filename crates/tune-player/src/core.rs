//! PlayerCore: single-owner event loop for all player state.
//!
//! Owns the playback engine and every controller.  Terminal input arrives as
//! `PlayerInput` over one mpsc channel, media observations over a second one,
//! and a 25 ms tick drives the debounce and cooldown timers.  Controllers
//! never call each other: each operation returns `PlayerEvent`s which the core
//! routes through a FIFO queue until it drains.
//!
//! After every input the core publishes a `PlayerView` snapshot on a
//! `tokio::sync::watch` channel for the UI task to draw.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::event::KeyEvent;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tune_proto::{MarkerEdit, SongId};

use crate::breathing::Breathing;
use crate::events::PlayerEvent;
use crate::gateway::CatalogApi;
use crate::keymap::{map_key, Command, SearchFocus};
use crate::media::{MediaBackend, MediaEvent};
use crate::notice::{NoticeBoard, Severity, DEFAULT_NOTICE, DISCONNECTED_NOTICE};
use crate::play_mode::{PlayMode, PlayModeSelector};
use crate::playback::{format_minutes, PlaybackEngine};
use crate::search::SearchController;
use crate::seek::{MarkerJob, MarkerUploads, SeekController, SeekState, UploadTicket};
use crate::settings::SettingsStore;
use crate::song::{MarkerState, Song, SortOrder};
use crate::song_list::{PageCursor, SongList};

const TICK: Duration = Duration::from_millis(25);
const SEARCH_LIMIT: usize = 20;
const DISCONNECTED: &str = "Disconnected";

// ── inputs ────────────────────────────────────────────────────────────────────

/// Pointer input already resolved to the widget it landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerInput {
    /// Column relative to the seek bar's left edge.
    SeekDown(u16),
    SeekDrag(u16),
    SeekUp(u16),
    SeekHover(bool),
    /// Row relative to the top of the list viewport.
    ListClick(usize),
    ListScroll(isize),
    /// Wheel over the seek bar or now-playing panel; `true` is up.
    VolumeWheel(bool),
    NowPlayingClick,
    Resize { seek_width: u16, list_height: u16 },
}

#[derive(Debug)]
pub enum PlayerInput {
    Key(KeyEvent),
    Pointer(PointerInput),
    /// A spawned marker upload completed.
    MarkerUploadFinished {
        ticket: UploadTicket,
        result: Result<Vec<f64>, String>,
    },
}

// ── view ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub highlighted: bool,
    pub playing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub cursor: usize,
    pub input_focused: bool,
    pub results: Vec<(String, String)>,
    pub highlighted: Option<usize>,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub rows: Vec<RowView>,
    pub list_len: usize,
    pub list_exhausted: bool,
    pub now_playing: Option<(String, String)>,
    pub has_image: bool,
    pub paused: bool,
    pub progress: f64,
    pub elapsed: String,
    pub duration: String,
    pub seek: SeekState,
    pub readout: Option<String>,
    pub markers: Vec<f64>,
    pub volume: u8,
    pub play_mode: PlayMode,
    pub sort: SortOrder,
    /// Breathing pulse, `None` with animations off.
    pub pulse: Option<f64>,
    pub endpoint: String,
    pub search: Option<SearchView>,
    pub notice: Option<(String, Severity)>,
    pub quit: bool,
}

impl Default for PlayerView {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            list_len: 0,
            list_exhausted: false,
            now_playing: None,
            has_image: false,
            paused: true,
            progress: 0.0,
            elapsed: format_minutes(0.0),
            duration: String::new(),
            seek: SeekState {
                shrunken: true,
                mouse_over: false,
                drag_active: false,
            },
            readout: None,
            markers: Vec::new(),
            volume: 0,
            play_mode: PlayMode::default(),
            sort: SortOrder::Modified,
            pulse: None,
            endpoint: String::new(),
            search: None,
            notice: None,
            quit: false,
        }
    }
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore<M> {
    api: Arc<dyn CatalogApi>,
    engine: PlaybackEngine<M>,
    seek: SeekController,
    uploads: MarkerUploads,
    list: SongList,
    search: SearchController,
    modes: PlayModeSelector,
    breathing: Breathing,
    notices: NoticeBoard,
    settings: SettingsStore,
    /// Spawned work reports back through this sender.
    loopback: mpsc::Sender<PlayerInput>,
    view: watch::Sender<PlayerView>,
    quit: bool,
}

impl<M: MediaBackend + 'static> PlayerCore<M> {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        media: M,
        settings: SettingsStore,
        loopback: mpsc::Sender<PlayerInput>,
        view: watch::Sender<PlayerView>,
    ) -> Self {
        let s = settings.get().clone();
        Self {
            api,
            engine: PlaybackEngine::new(media, s.volume),
            seek: SeekController::new(),
            uploads: MarkerUploads::new(),
            list: SongList::new(SortOrder::from_flag(s.sort_by_modified_date)),
            search: SearchController::new(),
            modes: PlayModeSelector::new(s.play_mode),
            breathing: Breathing::new(s.animations_enabled),
            notices: NoticeBoard::new(),
            settings,
            loopback,
            view,
            quit: false,
        }
    }

    /// Run the core loop.  Returns on quit or when the input channel closes.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<PlayerInput>,
        mut media: mpsc::Receiver<MediaEvent>,
    ) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        self.engine.apply_volume().await;
        self.initial_load(Instant::now()).await;
        self.publish();

        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle(input, Instant::now()).await,
                    None => {
                        info!("PlayerCore: input channel closed, shutting down");
                        break;
                    }
                },
                Some(evt) = media.recv() => {
                    self.handle_media(evt, Instant::now()).await;
                }
                _ = tick.tick() => self.tick(Instant::now()).await,
            }
            self.publish();
            if self.quit {
                info!("PlayerCore: quit requested");
                break;
            }
        }
        Ok(())
    }

    /// First page.  A failure here shows a long-lived notice.
    pub async fn initial_load(&mut self, now: Instant) {
        match self.list.get_new_songs(self.api.as_ref()).await {
            Ok(added) => {
                info!("PlayerCore: initial page gave {} songs", added.len());
                self.list.after_load(now);
            }
            Err(e) => {
                warn!("PlayerCore: initial load failed: {}", e);
                self.notices
                    .show(DISCONNECTED, Severity::Error, DISCONNECTED_NOTICE, now);
            }
        }
    }

    pub async fn handle(&mut self, input: PlayerInput, now: Instant) {
        let events = match input {
            PlayerInput::Key(key) => match map_key(&key, self.search_focus()) {
                Some(cmd) => self.command(cmd, now).await,
                None => Vec::new(),
            },
            PlayerInput::Pointer(p) => self.pointer(p, now).await,
            PlayerInput::MarkerUploadFinished { ticket, result } => {
                self.marker_upload_finished(ticket, result)
            }
        };
        self.dispatch(events, now).await;
    }

    pub async fn handle_media(&mut self, evt: MediaEvent, now: Instant) {
        let events = self.engine.handle_media(evt);
        self.dispatch(events, now).await;
    }

    pub async fn tick(&mut self, now: Instant) {
        self.notices.tick(now);
        self.breathing.tick(now);
        self.search.tick(now);

        let mut events = self.engine.tick(now).await;
        events.extend(self.uploads.tick(now));

        if let Some(text) = self.search.take_due_query(now) {
            self.run_search(&text, now).await;
        }
        if self.list.tick(now) {
            self.load_page(now).await;
        }
        self.dispatch(events, now).await;
    }

    fn search_focus(&self) -> SearchFocus {
        if !self.search.is_visible() {
            SearchFocus::Closed
        } else if self.search.input_focused() {
            SearchFocus::Input
        } else {
            SearchFocus::Results
        }
    }

    // ── event routing ─────────────────────────────────────────────────────────

    async fn dispatch(&mut self, events: Vec<PlayerEvent>, now: Instant) {
        let mut queue: VecDeque<PlayerEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            queue.extend(self.route(event, now).await);
        }
    }

    async fn route(&mut self, event: PlayerEvent, now: Instant) -> Vec<PlayerEvent> {
        match event {
            PlayerEvent::ProgressChanged { fraction } => {
                self.seek.sync_progress(fraction);
                Vec::new()
            }
            PlayerEvent::DurationKnown(d) => {
                self.seek.set_duration(d);
                Vec::new()
            }
            PlayerEvent::TrackEnded => self.on_track_end(now).await,
            PlayerEvent::AdvanceRequested => self.advance(now).await,
            PlayerEvent::SongSelected(song) => self.select_and_play(song, now).await,
            PlayerEvent::PausePlayback => self.engine.pause().await,
            PlayerEvent::ResumePlayback => self.engine.play().await,
            PlayerEvent::SeekTo(fraction) => self.engine.set_progress_fraction(fraction).await,
            PlayerEvent::InteractionTone => {
                self.engine.play_interaction_tone(now).await;
                Vec::new()
            }
            PlayerEvent::Notice {
                text,
                severity,
                duration,
            } => {
                self.notices.show(text, severity, duration, now);
                Vec::new()
            }
            PlayerEvent::PauseImage => {
                self.breathing.set_image_paused(true);
                Vec::new()
            }
            PlayerEvent::ResumeImage => {
                self.breathing.set_image_paused(false);
                Vec::new()
            }
            PlayerEvent::VolumeChanged(v) => {
                self.settings.update(|s| s.volume = v);
                Vec::new()
            }
        }
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn command(&mut self, cmd: Command, now: Instant) -> Vec<PlayerEvent> {
        debug!("PlayerCore: command {:?}", cmd);
        match cmd {
            Command::Quit => {
                self.quit = true;
                Vec::new()
            }
            Command::TogglePlayback => self.engine.toggle().await,
            Command::Scrub(secs) => self.engine.scrub(f64::from(secs), now).await,
            Command::SelectPrevious => {
                if self.list.select_previous(now).is_some() {
                    self.breathing.hold(now);
                }
                Vec::new()
            }
            Command::SelectNext => {
                if self.list.select_next(now).is_some() {
                    self.breathing.hold(now);
                }
                Vec::new()
            }
            Command::PlayActive => match self.list.active_song().cloned() {
                Some(song) => vec![PlayerEvent::SongSelected(song)],
                None => Vec::new(),
            },
            Command::VolumeUp => self.engine.change_volume(true, now).await,
            Command::VolumeDown => self.engine.change_volume(false, now).await,
            Command::ToggleRepeat => {
                let mode = self.modes.toggle_repeat();
                self.settings.update(|s| s.play_mode = mode);
                vec![PlayerEvent::info(mode.label())]
            }
            Command::RotatePlayMode => {
                let mode = self.modes.rotate();
                self.settings.update(|s| s.play_mode = mode);
                vec![PlayerEvent::info(mode.label())]
            }
            Command::ToggleAnimations => {
                let enabled = self.breathing.toggle();
                self.settings.update(|s| s.animations_enabled = enabled);
                let word = if enabled { "enabled" } else { "disabled" };
                vec![PlayerEvent::info(format!("Animations {}", word))]
            }
            Command::AddMarker => self.add_marker(now),
            Command::ClearMarkers => self.clear_markers(now),
            Command::ToggleSort => {
                let sort = self.list.toggle_sort_order();
                self.settings
                    .update(|s| s.sort_by_modified_date = sort.is_modified());
                if self.load_page(now).await {
                    let word = if sort.is_modified() { "modified" } else { "added" };
                    vec![PlayerEvent::info(format!("Date {}", word))]
                } else {
                    Vec::new()
                }
            }
            Command::RotateEndpoint => {
                let (index, endpoint) = self.api.rotate_endpoint();
                info!("PlayerCore: switched to endpoint {} ({})", index, endpoint);
                self.settings.update(|s| s.current_endpoint = index);
                self.list.reset();
                self.load_page(now).await;
                vec![PlayerEvent::info(endpoint)]
            }
            Command::OpenSearch(key) => {
                self.search.open(Some(key), now);
                Vec::new()
            }
            Command::SearchEdit(key) => {
                self.search.edit(key, now);
                Vec::new()
            }
            Command::SearchPrevious => {
                self.search.highlight_previous();
                Vec::new()
            }
            Command::SearchNext => {
                self.search.highlight_next();
                Vec::new()
            }
            Command::SearchConfirm => match self.search.confirm(now) {
                Some(song) => vec![PlayerEvent::SongSelected(song)],
                None => Vec::new(),
            },
            Command::CloseSearch => {
                self.search.close(now);
                Vec::new()
            }
        }
    }

    async fn pointer(&mut self, input: PointerInput, now: Instant) -> Vec<PlayerEvent> {
        match input {
            PointerInput::SeekDown(x) => self.seek.pointer_down(x, now),
            PointerInput::SeekDrag(x) => self.seek.pointer_move(x, now),
            PointerInput::SeekUp(x) => self.seek.pointer_up(x),
            PointerInput::SeekHover(over) => {
                self.seek.hover(over, self.engine.is_paused());
                Vec::new()
            }
            PointerInput::ListClick(row) => match self.list.song_at_row(row).cloned() {
                Some(song) => vec![PlayerEvent::SongSelected(song)],
                None => Vec::new(),
            },
            PointerInput::ListScroll(delta) => {
                self.list.scroll_by(delta, now);
                Vec::new()
            }
            PointerInput::VolumeWheel(up) => self.engine.change_volume(up, now).await,
            PointerInput::NowPlayingClick => self.engine.toggle().await,
            PointerInput::Resize {
                seek_width,
                list_height,
            } => {
                self.seek.set_width(seek_width);
                self.list.set_viewport(usize::from(list_height), now);
                Vec::new()
            }
        }
    }

    // ── playback ──────────────────────────────────────────────────────────────

    /// List the song if needed, highlight it, and play it.
    async fn select_and_play(&mut self, song: Song, now: Instant) -> Vec<PlayerEvent> {
        let id = song.id;
        self.list.add(song);
        self.list.set_active_by_id(id, now);
        self.play_song(id).await
    }

    async fn play_song(&mut self, id: SongId) -> Vec<PlayerEvent> {
        let Some(song) = self.list.song(id).cloned() else {
            warn!("PlayerCore: song {} is not listed", id);
            return Vec::new();
        };
        info!("PlayerCore: playing {} - {} ({})", song.artist, song.title, id);
        let url = self.api.file_url(id);
        let mut events = self.engine.set_song(&song, url).await;
        self.seek.reset_for_song();
        events.extend(self.engine.play().await);
        events.extend(self.load_markers(song).await);
        events
    }

    /// Show the song's markers, fetching them on first use.
    async fn load_markers(&mut self, song: Song) -> Vec<PlayerEvent> {
        if let MarkerState::Loaded(markers) = &song.markers {
            self.seek.show_markers(markers);
            return Vec::new();
        }
        match self.api.markers(song.id).await {
            Ok(markers) => {
                debug!("PlayerCore: {} markers for song {}", markers.len(), song.id);
                if self.engine.current() == Some(song.id) {
                    self.seek.show_markers(&markers);
                }
                self.list.set_markers(song.id, MarkerState::Loaded(markers));
                Vec::new()
            }
            Err(e) => {
                warn!("PlayerCore: markers for song {} failed: {}", song.id, e);
                vec![PlayerEvent::error(DISCONNECTED)]
            }
        }
    }

    async fn advance(&mut self, now: Instant) -> Vec<PlayerEvent> {
        match self.list.advance(now) {
            Some(song) => self.play_song(song.id).await,
            None => Vec::new(),
        }
    }

    async fn on_track_end(&mut self, now: Instant) -> Vec<PlayerEvent> {
        let mode = self.modes.current();
        debug!("PlayerCore: track ended, mode {:?}", mode);
        match mode {
            PlayMode::Autoplay => self.advance(now).await,
            PlayMode::Random => match self.api.random_song().await {
                Ok(record) => vec![PlayerEvent::SongSelected(Song::from(record))],
                Err(e) => {
                    warn!("PlayerCore: random song failed: {}", e);
                    vec![PlayerEvent::error(DISCONNECTED)]
                }
            },
            PlayMode::Repeat => self.engine.restart().await,
            PlayMode::Once => Vec::new(),
        }
    }

    // ── markers ───────────────────────────────────────────────────────────────

    fn add_marker(&mut self, now: Instant) -> Vec<PlayerEvent> {
        let Some(id) = self.engine.current() else {
            return Vec::new();
        };
        if self.engine.duration().is_none() {
            return Vec::new();
        }
        let fraction = self.engine.progress();
        let visual = self.seek.add_marker_visual(fraction);
        let ticket = self
            .uploads
            .begin(id, MarkerJob::Add { visual, fraction }, now);
        self.spawn_upload(ticket, id, MarkerEdit::Add(fraction));
        Vec::new()
    }

    fn clear_markers(&mut self, now: Instant) -> Vec<PlayerEvent> {
        let Some(id) = self.engine.current() else {
            return Vec::new();
        };
        let has_markers = self
            .list
            .song(id)
            .is_some_and(|s| !s.markers.as_slice().is_empty());
        if !has_markers && self.seek.markers().is_empty() {
            return Vec::new();
        }
        let ticket = self.uploads.begin(id, MarkerJob::Clear, now);
        self.spawn_upload(ticket, id, MarkerEdit::Clear);
        Vec::new()
    }

    fn spawn_upload(&self, ticket: UploadTicket, id: SongId, edit: MarkerEdit) {
        let api = Arc::clone(&self.api);
        let tx = self.loopback.clone();
        tokio::spawn(async move {
            let result = api.edit_marker(id, edit).await.map_err(|e| e.to_string());
            if tx
                .send(PlayerInput::MarkerUploadFinished { ticket, result })
                .await
                .is_err()
            {
                debug!("marker upload for song {} finished after shutdown", id);
            }
        });
    }

    fn marker_upload_finished(
        &mut self,
        ticket: UploadTicket,
        result: Result<Vec<f64>, String>,
    ) -> Vec<PlayerEvent> {
        let Some((id, job)) = self.uploads.finish(ticket, result.is_ok()) else {
            return Vec::new();
        };
        match result {
            Ok(markers) => {
                if job == MarkerJob::Clear && self.engine.current() == Some(id) {
                    self.seek.clear_marker_visuals();
                }
                self.list.set_markers(id, MarkerState::Loaded(markers));
                Vec::new()
            }
            Err(e) => {
                warn!("PlayerCore: marker upload for song {} failed: {}", id, e);
                if let MarkerJob::Add { visual, .. } = job {
                    self.seek.remove_marker_visual(visual);
                }
                vec![PlayerEvent::error("Failed")]
            }
        }
    }

    // ── catalog ───────────────────────────────────────────────────────────────

    /// Next page of the list.  Returns false when the request failed.
    async fn load_page(&mut self, now: Instant) -> bool {
        match self.list.get_new_songs(self.api.as_ref()).await {
            Ok(added) => {
                // A page of already-listed ids still moves the cursor, so the
                // trigger is re-checked even when nothing was added.
                debug!("PlayerCore: page added {} songs", added.len());
                self.list.after_load(now);
                true
            }
            Err(e) => {
                warn!("PlayerCore: page load failed: {}", e);
                self.notices
                    .show(DISCONNECTED, Severity::Error, DEFAULT_NOTICE, now);
                false
            }
        }
    }

    async fn run_search(&mut self, text: &str, now: Instant) {
        debug!("PlayerCore: searching for {:?}", text);
        let found = match self.api.query_ids(text, SEARCH_LIMIT, 0).await {
            Ok(ids) => self.list.lookup(&ids, self.api.as_ref()).await,
            Err(e) => Err(e),
        };
        match found {
            Ok(songs) => self.search.apply_results(songs, self.list.sort()),
            Err(e) => {
                warn!("PlayerCore: search failed: {}", e);
                self.notices
                    .show(DISCONNECTED, Severity::Error, DEFAULT_NOTICE, now);
            }
        }
    }

    // ── view ──────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> PlayerView {
        let playing = self.engine.current();
        let rows = self
            .list
            .visible()
            .map(|(song, highlighted)| RowView {
                id: song.id,
                title: song.title.clone(),
                artist: song.artist.clone(),
                highlighted,
                playing: playing == Some(song.id),
            })
            .collect();
        let current = playing.and_then(|id| self.list.song(id));
        let search = self.search.is_visible().then(|| SearchView {
            query: self.search.input().value().to_string(),
            cursor: self.search.input().cursor(),
            input_focused: self.search.input_focused(),
            results: self
                .search
                .results()
                .iter()
                .map(|s| (s.title.clone(), s.artist.clone()))
                .collect(),
            highlighted: self.search.highlighted(),
        });
        PlayerView {
            rows,
            list_len: self.list.len(),
            list_exhausted: self.list.cursor() == PageCursor::Exhausted,
            now_playing: current.map(|s| (s.title.clone(), s.artist.clone())),
            has_image: current.is_some_and(|s| s.has_image),
            paused: self.engine.is_paused(),
            progress: self.seek.progress(),
            elapsed: format_minutes(self.engine.current_time()),
            duration: self.seek.duration_text(),
            seek: self.seek.state(),
            readout: self.seek.readout().map(str::to_string),
            markers: self.seek.markers().iter().map(|m| m.fraction).collect(),
            volume: self.engine.volume(),
            play_mode: self.modes.current(),
            sort: self.list.sort(),
            pulse: self.breathing.intensity(),
            endpoint: self.api.current_endpoint().1,
            search,
            notice: self
                .notices
                .current()
                .map(|(text, severity)| (text.to_string(), severity)),
            quit: self.quit,
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.snapshot());
    }
}
