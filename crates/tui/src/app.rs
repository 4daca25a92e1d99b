use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gameshelf_core::{
    config::ColorScheme,
    error::{PermissionDenied, StoreError},
    forms::{FormMode, GameForm, LocationForm, Navigation, PendingWrite, PlatformForm, WriteReceipt},
    i18n::{Language, LanguagePicker, LanguageSettings, MessageKey, Strings},
    models::{
        resolve_platform, Collection, Coordinates, Entity, Game, GameLocation, Location,
        Platform, PlatformRef, Record,
    },
    selection::{Decision, DeletePrompt, Expansion, PendingChoice},
    services::{Geolocator, ImagePicker, ImageSource},
    store::RecordStore,
    view::CollectionView,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{
    spawn,
    sync::{mpsc, watch},
};
use tracing::{debug, error, info};

use crate::{
    device::{ConfiguredGeolocator, TerminalImagePicker},
    widgets::{centered_rect, ListCursor, TextInput, Theme},
};

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    GameForm,
    PlatformSelect,
    LocationSelect,
    Platforms,
    PlatformForm,
    LocationForm,
    Settings,
}

/// Which part of the UI issued a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOrigin {
    GameForm,
    PlatformForm,
    LocationForm,
    DeletePrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

enum AppEvent {
    Input(Event),
    Tick,
    WriteFinished {
        origin: WriteOrigin,
        result: Result<WriteReceipt, StoreError>,
    },
    ImagePicked {
        path: String,
        result: Result<Option<String>, PermissionDenied>,
    },
    PositionFound(Result<Coordinates, PermissionDenied>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameField {
    Name,
    Description,
}

struct GameFormState {
    form: GameForm,
    name: TextInput,
    description: TextInput,
    focus: GameField,
    image_prompt: Option<TextInput>,
}

impl GameFormState {
    fn new(form: GameForm) -> Self {
        Self {
            name: TextInput::with_value(form.name()),
            description: TextInput::with_value(form.description()),
            form,
            focus: GameField::Name,
            image_prompt: None,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            GameField::Name => GameField::Description,
            GameField::Description => GameField::Name,
        };
    }

    fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            GameField::Name => &mut self.name,
            GameField::Description => &mut self.description,
        }
    }

    fn sync(&mut self) {
        self.form.set_name(self.name.value());
        self.form.set_description(self.description.value());
    }
}

struct PlatformFormState {
    form: PlatformForm,
    input: TextInput,
    return_to: Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationField {
    Name,
    Latitude,
    Longitude,
}

struct LocationFormState {
    form: LocationForm,
    name: TextInput,
    latitude: TextInput,
    longitude: TextInput,
    focus: LocationField,
    return_to: Screen,
}

impl LocationFormState {
    fn new(return_to: Screen) -> Self {
        Self {
            form: LocationForm::new(),
            name: TextInput::default(),
            latitude: TextInput::default(),
            longitude: TextInput::default(),
            focus: LocationField::Name,
            return_to,
        }
    }

    fn next_focus(&mut self) {
        self.focus = match self.focus {
            LocationField::Name => LocationField::Latitude,
            LocationField::Latitude => LocationField::Longitude,
            LocationField::Longitude => LocationField::Name,
        };
    }

    fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            LocationField::Name => &mut self.name,
            LocationField::Latitude => &mut self.latitude,
            LocationField::Longitude => &mut self.longitude,
        }
    }

    fn show_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = TextInput::with_value(&format!("{:.6}", coordinates.latitude));
        self.longitude = TextInput::with_value(&format!("{:.6}", coordinates.longitude));
    }

    /// Copy the typed values into the form. Fails when a number does not parse.
    fn sync(&mut self) -> bool {
        self.form.set_name(self.name.value());
        let latitude = self.latitude.value().trim();
        let longitude = self.longitude.value().trim();
        if latitude.is_empty() && longitude.is_empty() {
            self.form.clear_coordinates();
            return true;
        }
        match (latitude.parse::<f64>(), longitude.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => {
                self.form
                    .set_coordinates(Coordinates::new(latitude, longitude));
                true
            }
            _ => false,
        }
    }
}

/// Terminal front-end over a record store.
pub struct GameshelfApp<S: RecordStore> {
    store: S,
    games: CollectionView<Game>,
    platforms: Option<CollectionView<Platform>>,
    locations: Option<CollectionView<Location>>,
    settings: LanguageSettings,
    language_rx: watch::Receiver<Language>,
    strings: Strings,
    geolocator: ConfiguredGeolocator,
    theme: Theme,
    state: UiState,
    screen: Screen,
    expansion: Expansion,
    game_form: Option<GameFormState>,
    platform_form: Option<PlatformFormState>,
    location_form: Option<LocationFormState>,
    language_picker: Option<LanguagePicker>,
    delete_prompt: Option<DeletePrompt>,
    platform_choice: PendingChoice<String>,
    location_choice: PendingChoice<Record<Location>>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
}

impl<S: RecordStore> GameshelfApp<S> {
    pub fn new(
        store: S,
        settings: LanguageSettings,
        geolocator: ConfiguredGeolocator,
        scheme: ColorScheme,
    ) -> Self {
        let games = CollectionView::open(&store);
        let language_rx = settings.subscribe();
        Self {
            games,
            platforms: None,
            locations: None,
            strings: settings.strings(),
            language_rx,
            settings,
            store,
            geolocator,
            theme: Theme::for_scheme(scheme),
            state: UiState::default(),
            screen: Screen::Home,
            expansion: Expansion::default(),
            game_form: None,
            platform_form: None,
            location_form: None,
            language_picker: None,
            delete_prompt: None,
            platform_choice: PendingChoice::default(),
            location_choice: PendingChoice::default(),
            event_tx: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);
        info!(games = self.games.len(), "Catalog opened");

        loop {
            self.sync_views();
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                changed = self.language_rx.changed() => {
                    if changed.is_ok() {
                        self.apply_language();
                    }
                }
            }

            if self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    /// Open the platform and location views while a screen shows them and
    /// release them once it closes.
    fn sync_views(&mut self) {
        let expanded = self.expansion.selected().is_some();
        let wants_platforms = match self.screen {
            Screen::Home => expanded,
            Screen::PlatformSelect | Screen::Platforms | Screen::PlatformForm => true,
            _ => false,
        };
        let wants_locations = match self.screen {
            Screen::LocationSelect => true,
            Screen::LocationForm => self
                .location_form
                .as_ref()
                .is_some_and(|state| state.return_to == Screen::LocationSelect),
            _ => false,
        };
        sync_view(&mut self.platforms, wants_platforms, &self.store);
        sync_view(&mut self.locations, wants_locations, &self.store);
    }

    fn apply_language(&mut self) {
        let language = *self.language_rx.borrow_and_update();
        self.strings = Strings::new(language);
        debug!(%language, "Strings reloaded");
    }

    fn text(&self, key: MessageKey) -> &'static str {
        self.strings.get(key)
    }

    fn notify(&mut self, kind: StatusKind, key: MessageKey) {
        self.state.set_status(kind, self.strings.get(key).to_string());
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                self.handle_input(event);
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            Some(AppEvent::WriteFinished { origin, result }) => {
                self.handle_write_finished(origin, result);
                true
            }
            Some(AppEvent::ImagePicked { path, result }) => {
                self.handle_image_picked(path, result);
                true
            }
            Some(AppEvent::PositionFound(result)) => {
                self.handle_position_found(result);
                true
            }
            None => false,
        }
    }

    fn handle_tick(&mut self) {
        let ids = self
            .games
            .with_records(|games| games.iter().map(|game| game.id.clone()).collect::<Vec<_>>());
        self.expansion.retain(ids.iter());
    }

    fn send_later(&self) -> Option<mpsc::Sender<AppEvent>> {
        self.event_tx.clone()
    }

    fn spawn_write(&self, origin: WriteOrigin, write: PendingWrite) {
        let Some(sender) = self.send_later() else {
            return;
        };
        let store = self.store.clone();
        spawn(async move {
            let result = write.execute(&store).await;
            if sender
                .send(AppEvent::WriteFinished { origin, result })
                .await
                .is_err()
            {
                debug!(?origin, "UI closed before write finished");
            }
        });
    }

    fn spawn_image_pick(&self, path: String, source: ImageSource) {
        let Some(sender) = self.send_later() else {
            return;
        };
        spawn(async move {
            let picker = TerminalImagePicker::new(path.clone());
            let result = picker.pick(source).await;
            let _ = sender.send(AppEvent::ImagePicked { path, result }).await;
        });
    }

    fn spawn_position_lookup(&self) {
        let Some(sender) = self.send_later() else {
            return;
        };
        let geolocator = self.geolocator;
        spawn(async move {
            let result = geolocator.current_position().await;
            let _ = sender.send(AppEvent::PositionFound(result)).await;
        });
    }

    fn handle_write_finished(&mut self, origin: WriteOrigin, result: Result<WriteReceipt, StoreError>) {
        match origin {
            WriteOrigin::GameForm => {
                let Some(state) = self
                    .game_form
                    .as_mut()
                    .filter(|state| state.form.is_submitting())
                else {
                    self.report_detached(result);
                    return;
                };
                match state.form.complete(result) {
                    Ok(outcome) => {
                        self.notify(StatusKind::Success, MessageKey::Saved);
                        if outcome.navigation == Navigation::Back {
                            self.close_game_form();
                        }
                    }
                    Err(err) => self.notify(StatusKind::Error, err.message_key()),
                }
            }
            WriteOrigin::PlatformForm => {
                let Some(state) = self
                    .platform_form
                    .as_mut()
                    .filter(|state| state.form.is_submitting())
                else {
                    self.report_detached(result);
                    return;
                };
                match state.form.complete(result) {
                    Ok(outcome) => {
                        match outcome.navigation {
                            Navigation::Back => {
                                self.screen = state.return_to;
                                self.platform_form = None;
                            }
                            Navigation::Stay => state.input.clear(),
                        }
                        self.notify(StatusKind::Success, MessageKey::Saved);
                    }
                    Err(err) => self.notify(StatusKind::Error, err.message_key()),
                }
            }
            WriteOrigin::LocationForm => {
                let Some(state) = self
                    .location_form
                    .as_mut()
                    .filter(|state| state.form.is_submitting())
                else {
                    self.report_detached(result);
                    return;
                };
                match state.form.complete(result) {
                    Ok(_) => {
                        self.screen = state.return_to;
                        self.location_form = None;
                        self.notify(StatusKind::Success, MessageKey::Saved);
                    }
                    Err(err) => self.notify(StatusKind::Error, err.message_key()),
                }
            }
            WriteOrigin::DeletePrompt => match result {
                Ok(receipt) => {
                    info!(collection = %receipt.collection, id = %receipt.id, "Record deleted");
                    self.notify(StatusKind::Success, MessageKey::Deleted);
                }
                Err(err) => {
                    error!(%err, "Delete failed");
                    self.notify(StatusKind::Error, err.message_key());
                }
            },
        }
    }

    /// Result of a write whose form has since been closed.
    fn report_detached(&mut self, result: Result<WriteReceipt, StoreError>) {
        match result {
            Ok(_) => self.notify(StatusKind::Success, MessageKey::Saved),
            Err(err) => {
                error!(%err, "Write from a closed form failed");
                self.notify(StatusKind::Error, err.message_key());
            }
        }
    }

    fn handle_image_picked(&mut self, path: String, result: Result<Option<String>, PermissionDenied>) {
        let Some(state) = self.game_form.as_mut() else {
            return;
        };
        match result {
            Ok(Some(uri)) => state.form.set_image(uri),
            Ok(None) if path.trim().is_empty() => {}
            Ok(None) => self.notify(StatusKind::Warning, MessageKey::ImageNotFound),
            Err(denied) => self.notify(StatusKind::Warning, denied.message_key()),
        }
    }

    fn handle_position_found(&mut self, result: Result<Coordinates, PermissionDenied>) {
        let Some(state) = self.location_form.as_mut() else {
            return;
        };
        match result {
            Ok(position) => {
                state.form.set_coordinates(position);
                state.show_coordinates(position);
            }
            Err(denied) => self.notify(StatusKind::Warning, denied.message_key()),
        }
    }

    fn handle_input(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return;
        }
        if self.delete_prompt.is_some() {
            self.handle_delete_prompt_key(key);
            return;
        }
        match self.screen {
            Screen::Home => match self.state.mode {
                Mode::Filter => self.handle_filter_key(key),
                Mode::Browse => self.handle_home_key(key),
            },
            Screen::GameForm => self.handle_game_form_key(key),
            Screen::PlatformSelect => self.handle_platform_select_key(key),
            Screen::LocationSelect => self.handle_location_select_key(key),
            Screen::Platforms | Screen::PlatformForm => self.handle_platform_form_key(key),
            Screen::LocationForm => self.handle_location_form_key(key),
            Screen::Settings => self.handle_settings_key(key),
        }
    }

    fn visible_games(&self) -> Vec<Record<Game>> {
        self.games.matching(&self.state.filter)
    }

    fn current_game(&self) -> Option<Record<Game>> {
        self.visible_games().into_iter().nth(self.state.home.cursor)
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.state.mode = Mode::Browse,
            KeyCode::Backspace => {
                self.state.filter.pop();
                self.state.home.reset();
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.state.filter.push(c);
                    self.state.home.reset();
                }
            }
            _ => {}
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        let len = self.visible_games().len();
        match key.code {
            KeyCode::Char('q') if key.modifiers.is_empty() => self.state.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.home.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.home.move_by(-1, len),
            KeyCode::Home => self.state.home.move_by(-(len as isize), len),
            KeyCode::End => self.state.home.move_to_end(len),
            KeyCode::PageDown => self.state.home.page(1, len),
            KeyCode::PageUp => self.state.home.page(-1, len),
            KeyCode::Char('/') => {
                self.state.mode = Mode::Filter;
            }
            KeyCode::Enter => {
                if let Some(game) = self.current_game() {
                    self.expansion.tap(&game.id);
                }
            }
            KeyCode::Esc => self.expansion.clear(),
            KeyCode::Char('a') => self.open_game_form(GameForm::add()),
            KeyCode::Char('e') => {
                if let Some(game) = self.current_game() {
                    self.open_game_form(GameForm::edit(&game));
                }
            }
            KeyCode::Char('d') => {
                if let Some(game) = self.current_game() {
                    self.delete_prompt = Some(DeletePrompt::new(
                        Collection::Games,
                        game.id.clone(),
                        game.data.name.clone(),
                    ));
                }
            }
            KeyCode::Char('p') => self.open_platform_form(PlatformForm::manage(), Screen::Home),
            KeyCode::Char('l') => self.open_location_form(Screen::Home),
            KeyCode::Char('s') => {
                self.language_picker = Some(LanguagePicker::new(self.settings.current()));
                self.screen = Screen::Settings;
            }
            _ => {}
        }
    }

    fn handle_delete_prompt_key(&mut self, key: KeyEvent) {
        let decision = match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Decision::Confirm,
            KeyCode::Char('n') | KeyCode::Esc => Decision::Cancel,
            _ => return,
        };
        let Some(prompt) = self.delete_prompt.take() else {
            return;
        };
        if let Some(write) = prompt.resolve(decision) {
            self.spawn_write(WriteOrigin::DeletePrompt, write);
        }
    }

    fn open_game_form(&mut self, form: GameForm) {
        self.platform_choice.reset();
        self.location_choice.reset();
        self.game_form = Some(GameFormState::new(form));
        self.screen = Screen::GameForm;
    }

    fn close_game_form(&mut self) {
        self.platform_choice.reset();
        self.location_choice.reset();
        self.game_form = None;
        self.screen = Screen::Home;
    }

    fn return_to_game_form(&mut self) {
        self.screen = Screen::GameForm;
        let Some(state) = self.game_form.as_mut() else {
            self.screen = Screen::Home;
            return;
        };
        if let Some(platform) = self.platform_choice.take() {
            state.form.choose_platform(platform);
        }
        if let Some(location) = self.location_choice.take() {
            state.form.choose_location(&location);
        }
    }

    fn open_platform_form(&mut self, form: PlatformForm, return_to: Screen) {
        self.screen = if return_to == Screen::Home {
            Screen::Platforms
        } else {
            Screen::PlatformForm
        };
        self.state.picker.reset();
        self.platform_form = Some(PlatformFormState {
            form,
            input: TextInput::default(),
            return_to,
        });
    }

    fn open_location_form(&mut self, return_to: Screen) {
        self.location_form = Some(LocationFormState::new(return_to));
        self.screen = Screen::LocationForm;
    }

    fn handle_game_form_key(&mut self, key: KeyEvent) {
        let Some(state) = self.game_form.as_mut() else {
            self.screen = Screen::Home;
            return;
        };

        if let Some(prompt) = state.image_prompt.as_mut() {
            match key.code {
                KeyCode::Esc => state.image_prompt = None,
                KeyCode::Enter => {
                    let path = prompt.value().to_string();
                    state.image_prompt = None;
                    self.spawn_image_pick(path, ImageSource::Library);
                }
                _ => {
                    edit_text(prompt, key);
                }
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => self.submit_game_form(),
                KeyCode::Char('p') => {
                    self.state.picker.reset();
                    self.screen = Screen::PlatformSelect;
                }
                KeyCode::Char('l') => {
                    self.state.picker.reset();
                    self.screen = Screen::LocationSelect;
                }
                KeyCode::Char('x') => state.form.clear_location(),
                KeyCode::Char('o') => state.image_prompt = Some(TextInput::default()),
                KeyCode::Char('t') => self.spawn_image_pick(String::new(), ImageSource::Camera),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.close_game_form(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => state.toggle_focus(),
            KeyCode::Enter => match state.focus {
                GameField::Name => state.toggle_focus(),
                GameField::Description => self.submit_game_form(),
            },
            _ => {
                if edit_text(state.focused_mut(), key) {
                    state.sync();
                }
            }
        }
    }

    fn submit_game_form(&mut self) {
        let Some(state) = self.game_form.as_mut() else {
            return;
        };
        state.sync();
        match state.form.begin_submit() {
            Ok(write) => self.spawn_write(WriteOrigin::GameForm, write),
            Err(err) => self.notify(StatusKind::Error, err.message_key()),
        }
    }

    fn handle_platform_select_key(&mut self, key: KeyEvent) {
        let platforms = view_records(&self.platforms);
        match key.code {
            KeyCode::Esc => self.return_to_game_form(),
            KeyCode::Char('j') | KeyCode::Down => self.state.picker.move_by(1, platforms.len()),
            KeyCode::Char('k') | KeyCode::Up => self.state.picker.move_by(-1, platforms.len()),
            KeyCode::Char('a') => self.open_platform_form(PlatformForm::add(), Screen::PlatformSelect),
            KeyCode::Enter => {
                if let Some(platform) = platforms.into_iter().nth(self.state.picker.cursor) {
                    self.platform_choice.offer(platform.data.name);
                }
                self.return_to_game_form();
            }
            _ => {}
        }
    }

    fn handle_location_select_key(&mut self, key: KeyEvent) {
        let locations = view_records(&self.locations);
        match key.code {
            KeyCode::Esc => self.return_to_game_form(),
            KeyCode::Char('j') | KeyCode::Down => self.state.picker.move_by(1, locations.len()),
            KeyCode::Char('k') | KeyCode::Up => self.state.picker.move_by(-1, locations.len()),
            KeyCode::Char('a') => self.open_location_form(Screen::LocationSelect),
            KeyCode::Enter => {
                if let Some(location) = locations.into_iter().nth(self.state.picker.cursor) {
                    self.location_choice.offer(location);
                }
                self.return_to_game_form();
            }
            _ => {}
        }
    }

    fn handle_platform_form_key(&mut self, key: KeyEvent) {
        let managing = self.screen == Screen::Platforms;
        let platforms = view_records(&self.platforms);
        let Some(state) = self.platform_form.as_mut() else {
            self.screen = Screen::Home;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.screen = state.return_to;
                self.platform_form = None;
            }
            KeyCode::Enter => {
                state.form.set_name(state.input.value());
                match state.form.begin_submit() {
                    Ok(write) => self.spawn_write(WriteOrigin::PlatformForm, write),
                    Err(err) => self.notify(StatusKind::Error, err.message_key()),
                }
            }
            KeyCode::Down if managing => self.state.picker.move_by(1, platforms.len()),
            KeyCode::Up if managing => self.state.picker.move_by(-1, platforms.len()),
            KeyCode::Char('d') if managing && key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(platform) = platforms.get(self.state.picker.cursor) {
                    self.delete_prompt = Some(state.form.delete(platform));
                }
            }
            _ => {
                edit_text(&mut state.input, key);
            }
        }
    }

    fn handle_location_form_key(&mut self, key: KeyEvent) {
        let Some(state) = self.location_form.as_mut() else {
            self.screen = Screen::Home;
            return;
        };
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.screen = state.return_to;
                self.location_form = None;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => state.next_focus(),
            KeyCode::Char('g') if control => self.spawn_position_lookup(),
            KeyCode::Char('s') if control => self.submit_location_form(),
            KeyCode::Enter => self.submit_location_form(),
            _ => {
                edit_text(state.focused_mut(), key);
            }
        }
    }

    fn submit_location_form(&mut self) {
        let Some(state) = self.location_form.as_mut() else {
            return;
        };
        if !state.sync() {
            self.notify(StatusKind::Error, MessageKey::InvalidCoordinates);
            return;
        }
        match state.form.begin_submit() {
            Ok(write) => self.spawn_write(WriteOrigin::LocationForm, write),
            Err(err) => self.notify(StatusKind::Error, err.message_key()),
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let Some(picker) = self.language_picker.as_mut() else {
            self.screen = Screen::Home;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.language_picker = None;
                self.screen = Screen::Home;
            }
            KeyCode::Char('j') | KeyCode::Down => picker.step(1),
            KeyCode::Char('k') | KeyCode::Up => picker.step(-1),
            KeyCode::Enter => {
                picker.confirm(&self.settings);
                self.language_picker = None;
                self.screen = Screen::Home;
                self.state.set_status(
                    StatusKind::Success,
                    Strings::new(self.settings.current())
                        .get(MessageKey::Saved)
                        .to_string(),
                );
            }
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(area);

        let (title, help) = match self.screen {
            Screen::Home => (MessageKey::MyGameCollection, MessageKey::HelpHome),
            Screen::GameForm => match self.game_form.as_ref().map(|state| state.form.mode()) {
                Some(FormMode::Edit(_)) => {
                    (MessageKey::EditGameTitle, MessageKey::HelpForm)
                }
                _ => (MessageKey::AddGameTitle, MessageKey::HelpForm),
            },
            Screen::PlatformSelect => (MessageKey::SelectPlatformTitle, MessageKey::HelpList),
            Screen::LocationSelect => (MessageKey::SelectLocationTitle, MessageKey::HelpList),
            Screen::Platforms => (MessageKey::ManagePlatformsTitle, MessageKey::HelpManage),
            Screen::PlatformForm => (MessageKey::AddPlatformTitle, MessageKey::HelpPlatformForm),
            Screen::LocationForm => (MessageKey::AddLocationTitle, MessageKey::HelpLocationForm),
            Screen::Settings => (MessageKey::SettingsTitle, MessageKey::HelpSettings),
        };

        self.render_title(frame, chunks[0], title);
        match self.screen {
            Screen::Home => self.render_home(frame, chunks[1]),
            Screen::GameForm => self.render_game_form(frame, chunks[1]),
            Screen::PlatformSelect => {
                let names = view_records(&self.platforms)
                    .into_iter()
                    .map(|platform| platform.data.name)
                    .collect();
                self.render_picker(frame, chunks[1], MessageKey::Platform, names);
            }
            Screen::LocationSelect => {
                let names = view_records(&self.locations)
                    .into_iter()
                    .map(|location| describe_location(&location.data.name, location.data.coordinates))
                    .collect();
                self.render_picker(frame, chunks[1], MessageKey::Location, names);
            }
            Screen::Platforms | Screen::PlatformForm => self.render_platform_form(frame, chunks[1]),
            Screen::LocationForm => self.render_location_form(frame, chunks[1]),
            Screen::Settings => self.render_settings(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2], help);

        if let Some(prompt) = &self.delete_prompt {
            self.render_delete_prompt(frame, prompt);
        }
        if let Some(prompt) = self.game_form.as_ref().and_then(|state| state.image_prompt.as_ref()) {
            self.render_image_prompt(frame, prompt);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect, title: MessageKey) {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            self.text(title),
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_home(&mut self, frame: &mut Frame, area: Rect) {
        let games = self.visible_games();
        self.state.home.height = area.height.saturating_sub(2) as usize;
        self.state.home.clamp(games.len());

        let title = if self.state.mode == Mode::Filter || !self.state.filter.is_empty() {
            format!("{}: {}", self.text(MessageKey::Search), self.state.filter)
        } else {
            format!("{} ({})", self.text(MessageKey::MyGameCollection), games.len())
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if games.is_empty() {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                self.text(MessageKey::NoGames),
                Style::default().fg(self.theme.muted),
            )))
            .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let platforms = view_records(&self.platforms);
        let offset = self.state.home.offset;
        let items: Vec<ListItem> = games
            .iter()
            .enumerate()
            .skip(offset)
            .map(|(index, game)| {
                let is_selected = self.state.home.cursor == index;
                let marker = if is_selected {
                    Span::styled(
                        "▶ ",
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("  ")
                };
                let mut header = vec![
                    marker,
                    Span::styled(
                        game.data.name.clone(),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                ];
                if let Some(platform) = game.data.platform() {
                    header.push(Span::styled(
                        format!(" · {platform}"),
                        Style::default().fg(self.theme.muted),
                    ));
                }
                let mut lines = vec![Line::from(header)];
                if self.expansion.is_expanded(&game.id) {
                    lines.extend(self.game_details(&game.data, &platforms));
                }
                ListItem::new(lines)
            })
            .collect();

        let mut list_state = ListState::default();
        list_state.select(Some(self.state.home.cursor.saturating_sub(offset)));
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn game_details(&self, game: &Game, platforms: &[Record<Platform>]) -> Vec<Line<'static>> {
        let muted = Style::default().fg(self.theme.muted);
        let detail = |label: MessageKey, value: String, style: Style| {
            Line::from(vec![
                Span::styled(format!("    {}: ", self.text(label)), muted),
                Span::styled(value, style),
            ])
        };
        let plain = Style::default().fg(self.theme.primary_fg);

        let mut lines = Vec::new();
        if let Some(description) = game.description() {
            lines.push(detail(MessageKey::GameDescription, description.to_string(), plain));
        }
        lines.push(match resolve_platform(game, platforms) {
            PlatformRef::Unset => detail(MessageKey::Platform, "-".to_string(), muted),
            PlatformRef::Known(platform) => detail(MessageKey::Platform, platform.data.name.clone(), plain),
            PlatformRef::Orphaned(name) => detail(
                MessageKey::Platform,
                format!("{name} ({})", self.text(MessageKey::UnknownPlatform)),
                Style::default().fg(self.theme.warning),
            ),
        });
        lines.push(match &game.location {
            Some(location) => detail(MessageKey::Location, describe_game_location(location), plain),
            None => detail(MessageKey::Location, self.text(MessageKey::NoLocation).to_string(), muted),
        });
        lines.push(match game.image_url() {
            Some(uri) => detail(MessageKey::Image, uri.to_string(), plain),
            None => detail(MessageKey::Image, self.text(MessageKey::NoImage).to_string(), muted),
        });
        lines
    }

    fn render_input(&self, frame: &mut Frame, area: Rect, label: MessageKey, input: &TextInput, focused: bool) {
        let border = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        let paragraph = Paragraph::new(input.value().to_string()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(self.text(label)),
        );
        frame.render_widget(paragraph, area);
        if focused {
            let cursor_x = (area.x + 1 + input.cursor() as u16).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1);
        }
    }

    fn render_game_form(&self, frame: &mut Frame, area: Rect) {
        let Some(state) = self.game_form.as_ref() else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
            ])
            .split(area);
        let prompt_open = state.image_prompt.is_some();
        self.render_input(
            frame,
            chunks[0],
            MessageKey::GameName,
            &state.name,
            !prompt_open && state.focus == GameField::Name,
        );
        self.render_input(
            frame,
            chunks[1],
            MessageKey::GameDescription,
            &state.description,
            !prompt_open && state.focus == GameField::Description,
        );

        let muted = Style::default().fg(self.theme.muted);
        let plain = Style::default().fg(self.theme.primary_fg);
        let field = |label: MessageKey, value: Option<String>, fallback: MessageKey| {
            let (text, style) = match value {
                Some(value) => (value, plain),
                None => (self.text(fallback).to_string(), muted),
            };
            Line::from(vec![
                Span::styled(format!("{}: ", self.text(label)), muted),
                Span::styled(text, style),
            ])
        };
        let form = &state.form;
        let mut lines = vec![
            field(MessageKey::Platform, form.platform().map(str::to_string), MessageKey::NoPlatform),
            field(
                MessageKey::Location,
                form.location().map(describe_game_location),
                MessageKey::NoLocation,
            ),
            field(MessageKey::Image, form.image_url().map(str::to_string), MessageKey::NoImage),
        ];
        if form.is_submitting() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                self.text(MessageKey::SaveInProgress),
                Style::default().fg(self.theme.warning),
            )));
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, chunks[2]);
    }

    fn render_picker(&mut self, frame: &mut Frame, area: Rect, title: MessageKey, names: Vec<String>) {
        self.state.picker.height = area.height.saturating_sub(2) as usize;
        self.state.picker.clamp(names.len());
        let block = Block::default().borders(Borders::ALL).title(self.text(title));
        let items: Vec<ListItem> = names
            .into_iter()
            .skip(self.state.picker.offset)
            .map(|name| ListItem::new(Line::from(name)))
            .collect();
        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.state.picker.cursor.saturating_sub(self.state.picker.offset)));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(self.theme.selection_bg)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_platform_form(&mut self, frame: &mut Frame, area: Rect) {
        let managing = self.screen == Screen::Platforms;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);
        if let Some(state) = self.platform_form.as_ref() {
            self.render_input(frame, chunks[0], MessageKey::PlatformName, &state.input, true);
        }
        if managing {
            let names = view_records(&self.platforms)
                .into_iter()
                .map(|platform| platform.data.name)
                .collect();
            self.render_picker(frame, chunks[1], MessageKey::ManagePlatformsTitle, names);
        }
    }

    fn render_location_form(&self, frame: &mut Frame, area: Rect) {
        let Some(state) = self.location_form.as_ref() else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(area);
        self.render_input(
            frame,
            chunks[0],
            MessageKey::LocationName,
            &state.name,
            state.focus == LocationField::Name,
        );
        self.render_input(
            frame,
            chunks[1],
            MessageKey::Latitude,
            &state.latitude,
            state.focus == LocationField::Latitude,
        );
        self.render_input(
            frame,
            chunks[2],
            MessageKey::Longitude,
            &state.longitude,
            state.focus == LocationField::Longitude,
        );
        if state.form.is_submitting() {
            let paragraph = Paragraph::new(Span::styled(
                self.text(MessageKey::SaveInProgress),
                Style::default().fg(self.theme.warning),
            ));
            frame.render_widget(paragraph, chunks[3]);
        }
    }

    fn render_settings(&self, frame: &mut Frame, area: Rect) {
        let Some(picker) = self.language_picker.as_ref() else {
            return;
        };
        let lines: Vec<Line> = Language::ALL
            .iter()
            .map(|language| {
                let label = self.text(language.label_key());
                let confirmed = if *language == picker.confirmed() { " ✓" } else { "" };
                if *language == picker.pending() {
                    Line::from(Span::styled(
                        format!("▶ {label}{confirmed}"),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("  {label}{confirmed}"),
                        Style::default().fg(self.theme.primary_fg),
                    ))
                }
            })
            .collect();
        let width = 32.min(area.width.max(1));
        let height = (lines.len() as u16 + 2).min(area.height);
        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(self.text(MessageKey::LanguageLabel)),
        );
        frame.render_widget(paragraph, centered_rect(width, height, area));
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, help: MessageKey) {
        let color = match self.state.status_kind {
            StatusKind::Info => self.theme.primary_fg,
            StatusKind::Success => self.theme.success,
            StatusKind::Warning => self.theme.warning,
            StatusKind::Error => self.theme.danger,
        };
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(self.state.status.clone(), Style::default().fg(color))),
            Line::from(Span::styled(self.text(help), Style::default().fg(self.theme.muted))),
        ])
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_delete_prompt(&self, frame: &mut Frame, prompt: &DeletePrompt) {
        let title = match prompt.collection() {
            Collection::Games => MessageKey::DeleteGame,
            Collection::Platforms => MessageKey::DeletePlatform,
            Collection::Locations => MessageKey::DeleteLocation,
        };
        let area = modal_area(frame.size(), 7);
        frame.render_widget(Clear, area);
        let key_style = Style::default().add_modifier(Modifier::BOLD);
        let paragraph = Paragraph::new(vec![
            Line::from(self.text(MessageKey::DeleteConfirmation)),
            Line::from(Span::styled(prompt.label().to_string(), key_style)),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", key_style.fg(self.theme.danger)),
                Span::raw(format!(" {}  ", self.text(MessageKey::Delete))),
                Span::styled("n", key_style),
                Span::raw(format!(" {}", self.text(MessageKey::Cancel))),
            ]),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.danger))
                .title(self.text(title)),
        )
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_image_prompt(&self, frame: &mut Frame, prompt: &TextInput) {
        let area = modal_area(frame.size(), 3);
        frame.render_widget(Clear, area);
        self.render_input(frame, area, MessageKey::ImagePathPrompt, prompt, true);
    }
}

fn sync_view<T: Entity, S: RecordStore>(view: &mut Option<CollectionView<T>>, wanted: bool, store: &S) {
    match (view.is_some(), wanted) {
        (false, true) => {
            debug!(collection = %T::COLLECTION, "Opening view");
            *view = Some(CollectionView::open(store));
        }
        (true, false) => {
            debug!(collection = %T::COLLECTION, "Releasing view");
            *view = None;
        }
        _ => {}
    }
}

fn view_records<T: Entity>(view: &Option<CollectionView<T>>) -> Vec<Record<T>> {
    view.as_ref().map(CollectionView::records).unwrap_or_default()
}

fn modal_area(frame_area: Rect, height: u16) -> Rect {
    let width = 60_u16.min(frame_area.width.saturating_sub(4)).max(24);
    centered_rect(width, height.min(frame_area.height), frame_area)
}

fn describe_location(name: &str, coordinates: Option<Coordinates>) -> String {
    match coordinates {
        Some(position) => format!("{name} ({:.4}, {:.4})", position.latitude, position.longitude),
        None => name.to_string(),
    }
}

fn describe_game_location(location: &GameLocation) -> String {
    describe_location(&location.name, location.coordinates)
}

/// Apply an editing key to `input`. Returns whether the key was consumed.
fn edit_text(input: &mut TextInput, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Left => input.move_cursor(-1),
        KeyCode::Right => input.move_cursor(1),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Char(ch) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            input.insert(ch)
        }
        _ => return false,
    }
    true
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    filter: String,
    mode: Mode,
    home: ListCursor,
    picker: ListCursor,
    status: String,
    status_kind: StatusKind,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            filter: String::new(),
            mode: Mode::Browse,
            home: ListCursor::default(),
            picker: ListCursor::default(),
            status: String::new(),
            status_kind: StatusKind::Info,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, kind: StatusKind, message: String) {
        self.status = format!("{}  {message}", Local::now().format("%H:%M:%S"));
        self.status_kind = kind;
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use gameshelf_core::store::MemoryStore;
    use serde_json::json;

    use super::*;

    fn new_app(store: &MemoryStore) -> GameshelfApp<MemoryStore> {
        GameshelfApp::new(
            store.clone(),
            LanguageSettings::new(Language::En),
            ConfiguredGeolocator::new(None),
            ColorScheme::Dark,
        )
    }

    fn press(app: &mut GameshelfApp<MemoryStore>, code: KeyCode, modifiers: KeyModifiers) {
        app.handle_input(Event::Key(KeyEvent::new(code, modifiers)));
        app.sync_views();
    }

    #[test]
    fn pickers_hold_subscriptions_only_while_shown() {
        let store = MemoryStore::new();
        let mut app = new_app(&store);
        app.sync_views();
        assert_eq!(store.subscriber_count(), 1);

        press(&mut app, KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(app.screen, Screen::GameForm);
        assert!(app.platforms.is_none());

        press(&mut app, KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(app.screen, Screen::PlatformSelect);
        assert!(app.platforms.is_some());
        assert_eq!(store.subscriber_count(), 2);

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.screen, Screen::GameForm);
        assert!(app.platforms.is_none());

        press(&mut app, KeyCode::Char('l'), KeyModifiers::CONTROL);
        assert!(app.locations.is_some());
        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.locations.is_none());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn expanded_game_keeps_platforms_open() -> Result<()> {
        let store = MemoryStore::new();
        store
            .create(Collection::Games, json!({ "name": "Chess", "platform": "PC" }))
            .await?;
        let mut app = new_app(&store);
        app.sync_views();
        assert!(app.platforms.is_none());

        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.platforms.is_some());

        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.platforms.is_none());
        assert_eq!(store.subscriber_count(), 1);
        Ok(())
    }

    #[test]
    fn location_form_opened_from_picker_keeps_locations() {
        let store = MemoryStore::new();
        let mut app = new_app(&store);
        press(&mut app, KeyCode::Char('a'), KeyModifiers::NONE);
        press(&mut app, KeyCode::Char('l'), KeyModifiers::CONTROL);
        press(&mut app, KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(app.screen, Screen::LocationForm);
        assert!(app.locations.is_some());

        let mut standalone = new_app(&store);
        press(&mut standalone, KeyCode::Char('l'), KeyModifiers::NONE);
        assert_eq!(standalone.screen, Screen::LocationForm);
        assert!(standalone.locations.is_none());
    }
}
