//! Pure session transitions.
//!
//! [`Session::step`] applies one [`Event`] and returns the [`Command`]s the
//! driver must run. Nothing here performs I/O.

use std::collections::VecDeque;

use crate::models::Track;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a search query.
    Input,
    /// A search is in flight.
    Loading,
    /// Browsing and selecting results.
    List,
    /// Working through the download queue.
    Downloading,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Replace the query text.
    Edit(String),
    Confirm,
    CursorUp,
    CursorDown,
    /// Toggle the row under the cursor.
    ToggleSelection,
    /// Toggle row `n` (zero-based).
    ToggleIndex(usize),
    SelectAll,
    ClearSelection,
    /// Return from the list to the query prompt.
    Back,
    Quit,
    /// One line typed into the line-based front-end.
    Line(String),
    SearchFinished(Result<Vec<Track>, String>),
    DownloadFinished {
        track: Track,
        outcome: Result<(), String>,
    },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search { keyword: String },
    Download { track: Track },
    Exit,
}

/// Interactive search-and-download session.
#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    input: String,
    results: Vec<Track>,
    /// Selected result indices in the order they were picked.
    selection: Vec<usize>,
    cursor: usize,
    /// Head is the download in flight.
    queue: VecDeque<Track>,
    total: usize,
    downloaded: usize,
    failed: usize,
    status: String,
    error: Option<String>,
}

impl Session {
    /// A session starting at the prompt, or already loading when
    /// `initial_query` is non-blank. Call [`start`](Self::start) to get the
    /// initial search command.
    pub fn new(initial_query: Option<&str>) -> Self {
        let query = initial_query.map(str::trim).unwrap_or_default();
        let phase = if query.is_empty() {
            Phase::Input
        } else {
            Phase::Loading
        };
        Self {
            phase,
            input: query.to_string(),
            results: Vec::new(),
            selection: Vec::new(),
            cursor: 0,
            queue: VecDeque::new(),
            total: 0,
            downloaded: 0,
            failed: 0,
            status: String::new(),
            error: None,
        }
    }

    /// Commands needed to enter the initial phase.
    pub fn start(&mut self) -> Vec<Command> {
        if self.phase == Phase::Loading {
            self.status = format!("Searching '{}'...", self.input);
            vec![Command::Search {
                keyword: self.input.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn results(&self) -> &[Track] {
        &self.results
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.contains(&index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fraction of the batch completed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.downloaded as f64 / self.total as f64
        }
    }

    /// Apply `event`. Events the current phase has no use for are ignored.
    pub fn step(&mut self, event: Event) -> Vec<Command> {
        if let Event::Line(line) = event {
            let mut commands = Vec::new();
            for event in line_events(self.phase, &line) {
                commands.extend(self.step(event));
            }
            return commands;
        }

        match self.phase {
            Phase::Input => self.on_input(event),
            Phase::Loading => self.on_loading(event),
            Phase::List => self.on_list(event),
            Phase::Downloading => self.on_downloading(event),
        }
    }

    fn on_input(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Edit(text) => self.input = text,
            Event::Confirm => {
                let keyword = self.input.trim().to_string();
                if keyword.is_empty() {
                    return Vec::new();
                }
                self.phase = Phase::Loading;
                self.error = None;
                self.status = format!("Searching '{}'...", keyword);
                return vec![Command::Search { keyword }];
            }
            Event::Quit => return vec![Command::Exit],
            _ => {}
        }
        Vec::new()
    }

    fn on_loading(&mut self, event: Event) -> Vec<Command> {
        if let Event::SearchFinished(outcome) = event {
            match outcome {
                Ok(tracks) if !tracks.is_empty() => {
                    self.status = format!("Found {} tracks", tracks.len());
                    self.results = tracks;
                    self.selection.clear();
                    self.cursor = 0;
                    self.error = None;
                    self.phase = Phase::List;
                }
                Ok(_) => self.fail_search("No results found".to_string()),
                Err(e) => self.fail_search(e),
            }
        }
        Vec::new()
    }

    fn fail_search(&mut self, message: String) {
        self.status.clear();
        self.error = Some(message);
        self.phase = Phase::Input;
    }

    fn on_list(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::CursorUp => self.cursor = self.cursor.saturating_sub(1),
            Event::CursorDown => {
                if self.cursor + 1 < self.results.len() {
                    self.cursor += 1;
                }
            }
            Event::ToggleSelection => self.toggle(self.cursor),
            Event::ToggleIndex(index) => self.toggle(index),
            Event::SelectAll => self.selection = (0..self.results.len()).collect(),
            Event::ClearSelection => self.selection.clear(),
            Event::Back => {
                self.phase = Phase::Input;
                self.status.clear();
                self.error = None;
            }
            Event::Confirm => return self.begin_downloads(),
            Event::Quit => return vec![Command::Exit],
            _ => {}
        }
        Vec::new()
    }

    fn toggle(&mut self, index: usize) {
        if index >= self.results.len() {
            return;
        }
        if let Some(pos) = self.selection.iter().position(|&i| i == index) {
            self.selection.remove(pos);
        } else {
            self.selection.push(index);
        }
    }

    fn begin_downloads(&mut self) -> Vec<Command> {
        if self.results.is_empty() {
            return Vec::new();
        }
        if self.selection.is_empty() {
            self.selection.push(self.cursor);
        }

        self.queue = self
            .selection
            .iter()
            .map(|&i| self.results[i].clone())
            .collect();
        self.total = self.queue.len();
        self.downloaded = 0;
        self.failed = 0;
        self.error = None;
        self.phase = Phase::Downloading;

        self.next_download()
    }

    fn next_download(&mut self) -> Vec<Command> {
        match self.queue.front() {
            Some(track) => {
                self.status = format!(
                    "Downloading ({}/{}): {} - {}",
                    self.downloaded + 1,
                    self.total,
                    track.title,
                    track.artist
                );
                vec![Command::Download {
                    track: track.clone(),
                }]
            }
            None => Vec::new(),
        }
    }

    fn on_downloading(&mut self, event: Event) -> Vec<Command> {
        let Event::DownloadFinished { track, outcome } = event else {
            return Vec::new();
        };

        self.downloaded += 1;
        self.status = match outcome {
            Ok(()) => format!("Downloaded: {} - {}", track.title, track.artist),
            Err(e) => {
                self.failed += 1;
                format!("Failed: {} - {}: {}", track.title, track.artist, e)
            }
        };
        self.queue.pop_front();

        if self.downloaded < self.total {
            return self.next_download();
        }

        self.phase = Phase::List;
        self.selection.clear();
        self.queue.clear();
        self.status = if self.failed == 0 {
            format!("Downloaded {} tracks", self.total)
        } else {
            format!(
                "Downloaded {} of {} tracks ({} failed)",
                self.total - self.failed,
                self.total,
                self.failed
            )
        };
        Vec::new()
    }
}

/// Translate one typed line into events for `phase`.
///
/// At the prompt the whole line is the query. In the list, `j`/`k` move,
/// a number toggles that (one-based) row, a blank line of spaces toggles the
/// cursor row, `a` selects all, `n` clears, `b` goes back, an empty line
/// confirms and `q` quits. While loading or downloading a line means
/// nothing; [`run`](super::run) holds such lines back until the session
/// settles.
pub fn line_events(phase: Phase, line: &str) -> Vec<Event> {
    match phase {
        Phase::Input => {
            if line.trim().is_empty() {
                vec![Event::Confirm]
            } else {
                vec![Event::Edit(line.trim().to_string()), Event::Confirm]
            }
        }
        Phase::List => {
            if line.is_empty() {
                return vec![Event::Confirm];
            }
            let command = line.trim();
            if command.is_empty() {
                return vec![Event::ToggleSelection];
            }
            if let Ok(row) = command.parse::<usize>() {
                return match row.checked_sub(1) {
                    Some(index) => vec![Event::ToggleIndex(index)],
                    None => Vec::new(),
                };
            }
            match command {
                "j" => vec![Event::CursorDown],
                "k" => vec![Event::CursorUp],
                "a" => vec![Event::SelectAll],
                "n" => vec![Event::ClearSelection],
                "b" => vec![Event::Back],
                "q" => vec![Event::Quit],
                _ => Vec::new(),
            }
        }
        Phase::Loading | Phase::Downloading => Vec::new(),
    }
}
