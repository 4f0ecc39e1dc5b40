use super::debounce::debounce_queries;
use crate::error::{AppError, MSG_DELETE_FAILED, MSG_IMPORT_FAILED, MSG_NOT_YET_VISIBLE, MSG_SAVE_FAILED};
use crate::models::GalleryItem;
use crate::services::GalleryRepository;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Tuning of the controller's timing and retry behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Quiet period before search text triggers a fetch
    pub debounce: Duration,
    /// Shortest non-empty query that reaches the remote search
    pub min_query_len: usize,
    /// Fetches issued after a local change before giving up on seeing it
    pub refresh_attempts: u32,
    pub refresh_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_query_len: 3,
            refresh_attempts: 5,
            refresh_delay: Duration::from_secs(1),
        }
    }
}

/// Unread events kept for a subscriber that has not caught up
pub const EVENT_BUFFER: usize = 8;

/// One-shot notifications, delivered once and never replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    DeleteSucceeded,
}

/// What a refresh after a local change waits to see in the local list
#[derive(Debug, Clone)]
enum Expectation {
    Visible(Vec<String>),
    Gone(String),
}

impl Expectation {
    fn satisfied(&self, local: &[GalleryItem]) -> bool {
        match self {
            Expectation::Visible(locators) => {
                !local.is_empty()
                    && locators
                        .iter()
                        .all(|locator| local.iter().any(|item| &item.id == locator))
            }
            Expectation::Gone(locator) => !local.iter().any(|item| &item.id == locator),
        }
    }
}

enum Message {
    SetSearchText(String),
    Query(String),
    Refresh,
    Select(Option<GalleryItem>),
    Capture {
        temp_file: PathBuf,
        display_name: String,
    },
    Import(Vec<String>),
    Delete(GalleryItem),
    Items {
        generation: u64,
        items: Vec<GalleryItem>,
    },
    Failed {
        generation: u64,
        message: String,
    },
    Finished {
        generation: u64,
    },
    Written(Vec<String>),
    Deleted(String),
    Error(String),
}

/// Owns the watch senders. Every state change goes through this task;
/// workers report back through the inbox.
struct StateActor {
    repository: GalleryRepository,
    settings: ControllerSettings,
    cancel: CancellationToken,
    inbox: mpsc::UnboundedSender<Message>,
    generation: u64,
    term: String,
    items: watch::Sender<Vec<GalleryItem>>,
    selected: watch::Sender<Option<GalleryItem>>,
    search_text: watch::Sender<String>,
    error: watch::Sender<Option<String>>,
    loading: watch::Sender<bool>,
    events: mpsc::Sender<GalleryEvent>,
}

impl StateActor {
    async fn run(mut self, mut messages: mpsc::UnboundedReceiver<Message>) {
        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = messages.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.handle(message);
        }
        log::debug!("Gallery controller stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::SetSearchText(text) => {
                self.search_text.send_if_modified(|current| {
                    if *current == text {
                        return false;
                    }
                    *current = text;
                    true
                });
            }
            Message::Query(term) => self.start_fetch(term, None),
            Message::Refresh => self.start_fetch(self.term.clone(), None),
            Message::Select(item) => {
                self.selected.send_replace(item);
            }
            Message::Capture {
                temp_file,
                display_name,
            } => self.spawn_capture(temp_file, display_name),
            Message::Import(sources) => self.spawn_import(sources),
            Message::Delete(item) => self.spawn_delete(item),
            Message::Items { generation, items } if generation == self.generation => {
                self.items.send_replace(items);
            }
            Message::Failed {
                generation,
                message,
            } if generation == self.generation => {
                self.error.send_replace(Some(message));
            }
            Message::Finished { generation } if generation == self.generation => {
                self.loading.send_replace(false);
            }
            Message::Items { generation, .. }
            | Message::Failed { generation, .. }
            | Message::Finished { generation } => {
                log::debug!("Discarding result of superseded fetch {}", generation);
            }
            Message::Written(locators) => {
                let term = self.term.clone();
                self.start_fetch(term, Some(Expectation::Visible(locators)));
            }
            Message::Deleted(locator) => {
                self.selected.send_replace(None);
                if self.events.try_send(GalleryEvent::DeleteSucceeded).is_err() {
                    log::debug!("Dropping delete event, nobody is listening");
                }
                let term = self.term.clone();
                self.start_fetch(term, Some(Expectation::Gone(locator)));
            }
            Message::Error(message) => {
                self.error.send_replace(Some(message));
            }
        }
    }

    fn start_fetch(&mut self, term: String, expectation: Option<Expectation>) {
        self.generation += 1;
        self.term = term.clone();
        self.error.send_replace(None);
        self.loading.send_replace(true);
        log::debug!("Starting fetch {} for {:?}", self.generation, term);

        let worker = FetchWorker {
            repository: self.repository.clone(),
            inbox: self.inbox.clone(),
            cancel: self.cancel.child_token(),
            generation: self.generation,
            attempts: self.settings.refresh_attempts.max(1),
            delay: self.settings.refresh_delay,
        };
        tokio::spawn(worker.run(term, expectation));
    }

    fn spawn_capture(&self, temp_file: PathBuf, display_name: String) {
        let repository = self.repository.clone();
        let inbox = self.inbox.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            match repository
                .persist_captured_photo(&temp_file, &display_name, &cancel)
                .await
            {
                Ok(Some(locator)) => {
                    let _ = inbox.send(Message::Written(vec![locator]));
                }
                Ok(None) => {
                    let _ = inbox.send(Message::Error(MSG_SAVE_FAILED.to_string()));
                }
                Err(_) => log::debug!("Saving capture cancelled"),
            }
        });
    }

    fn spawn_import(&self, sources: Vec<String>) {
        let repository = self.repository.clone();
        let inbox = self.inbox.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let mut written = Vec::new();
            let mut failed = 0usize;
            for source in &sources {
                match repository.import_external_image(source, &cancel).await {
                    Ok(Some(locator)) => written.push(locator),
                    Ok(None) => failed += 1,
                    Err(_) => {
                        log::debug!("Import batch cancelled");
                        return;
                    }
                }
            }
            log::info!("Imported {} of {} images", written.len(), sources.len());

            if !written.is_empty() {
                let _ = inbox.send(Message::Written(written));
            }
            if failed > 0 {
                let _ = inbox.send(Message::Error(MSG_IMPORT_FAILED.to_string()));
            }
        });
    }

    fn spawn_delete(&self, item: GalleryItem) {
        if !item.is_deletable() {
            log::warn!("Ignoring delete of non-owned item {}", item.id);
            return;
        }

        let repository = self.repository.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let message = if repository.delete_owned_image(&item.id).await {
                Message::Deleted(item.id)
            } else {
                Message::Error(MSG_DELETE_FAILED.to_string())
            };
            let _ = inbox.send(message);
        });
    }
}

/// Consumes fetch sequences for one generation, retrying while an expected
/// local change is not visible yet
struct FetchWorker {
    repository: GalleryRepository,
    inbox: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    generation: u64,
    attempts: u32,
    delay: Duration,
}

impl FetchWorker {
    async fn run(self, term: String, expectation: Option<Expectation>) {
        let attempts = if expectation.is_some() { self.attempts } else { 1 };
        let mut satisfied = expectation.is_none();
        let mut failure = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            let mut sequence = self.repository.fetch(&term);
            let mut first = true;
            loop {
                let next = tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    next = sequence.next() => next,
                };
                let Some(items) = next else { break };
                if first {
                    if let Some(expectation) = &expectation {
                        satisfied = expectation.satisfied(&items);
                    }
                    first = false;
                }
                self.send(Message::Items {
                    generation: self.generation,
                    items,
                });
            }
            failure = sequence.failure().await;

            if satisfied {
                break;
            }
            log::debug!(
                "Refresh {}/{}: local change not visible yet",
                attempt,
                attempts
            );
        }

        if !satisfied {
            log::warn!("Local change still not visible after {} fetches", attempts);
            self.send(Message::Failed {
                generation: self.generation,
                message: MSG_NOT_YET_VISIBLE.to_string(),
            });
        } else if let Some(e) = failure {
            self.send(Message::Failed {
                generation: self.generation,
                message: AppError::Remote(e).user_message(),
            });
        }
        self.send(Message::Finished {
            generation: self.generation,
        });
    }

    fn send(&self, message: Message) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.inbox.send(message);
    }
}

/// UI-facing view state of the gallery.
///
/// State is observable through `watch` receivers and changed only by the
/// controller's own task. Commands never block; their effects show up in
/// the observable state.
pub struct GalleryController {
    inbox: mpsc::UnboundedSender<Message>,
    items: watch::Receiver<Vec<GalleryItem>>,
    selected: watch::Receiver<Option<GalleryItem>>,
    search_text: watch::Receiver<String>,
    error: watch::Receiver<Option<String>>,
    loading: watch::Receiver<bool>,
    events: Mutex<Option<mpsc::Receiver<GalleryEvent>>>,
    cancel: CancellationToken,
}

impl GalleryController {
    /// Starts the controller with a random-sample fetch.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(repository: GalleryRepository, settings: ControllerSettings) -> Self {
        Self::start_with_query(repository, settings, String::new())
    }

    /// Starts the controller with `query` as the initial search text
    pub fn start_with_query(
        repository: GalleryRepository,
        settings: ControllerSettings,
        query: impl Into<String>,
    ) -> Self {
        let query = query.into();
        let cancel = CancellationToken::new();
        let (inbox, messages) = mpsc::unbounded_channel();
        let (items_tx, items) = watch::channel(Vec::new());
        let (selected_tx, selected) = watch::channel(None);
        let (search_tx, search_text) = watch::channel(query.clone());
        let (error_tx, error) = watch::channel(None);
        let (loading_tx, loading) = watch::channel(false);
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);

        let (query_tx, mut query_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_queries(
            search_text.clone(),
            settings.debounce,
            settings.min_query_len,
            query_tx,
            cancel.clone(),
        ));
        let forward = inbox.clone();
        tokio::spawn(async move {
            while let Some(query) = query_rx.recv().await {
                if forward.send(Message::Query(query)).is_err() {
                    break;
                }
            }
        });

        let mut actor = StateActor {
            repository,
            settings,
            cancel: cancel.clone(),
            inbox: inbox.clone(),
            generation: 0,
            term: String::new(),
            items: items_tx,
            selected: selected_tx,
            search_text: search_tx,
            error: error_tx,
            loading: loading_tx,
            events: events_tx,
        };
        actor.start_fetch(query.trim().to_string(), None);
        tokio::spawn(actor.run(messages));

        Self {
            inbox,
            items,
            selected,
            search_text,
            error,
            loading,
            events: Mutex::new(Some(events)),
            cancel,
        }
    }

    pub fn items(&self) -> watch::Receiver<Vec<GalleryItem>> {
        self.items.clone()
    }

    pub fn selected(&self) -> watch::Receiver<Option<GalleryItem>> {
        self.selected.clone()
    }

    pub fn search_text(&self) -> watch::Receiver<String> {
        self.search_text.clone()
    }

    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.error.clone()
    }

    /// True while a fetch or refresh is running
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    /// The one-shot event stream; only the first call gets it.
    ///
    /// Holds at most [`EVENT_BUFFER`] unread events; later ones are dropped.
    pub fn take_events(&self) -> Option<mpsc::Receiver<GalleryEvent>> {
        self.events.lock().ok().and_then(|mut events| events.take())
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        self.send(Message::SetSearchText(text.into()));
    }

    pub fn select(&self, item: Option<GalleryItem>) {
        self.send(Message::Select(item));
    }

    /// Re-fetches the current query
    pub fn refresh(&self) {
        self.send(Message::Refresh);
    }

    /// Stores a photo the camera wrote to `temp_file`, then refreshes
    pub fn capture_completed(&self, temp_file: PathBuf, display_name: impl Into<String>) {
        self.send(Message::Capture {
            temp_file,
            display_name: display_name.into(),
        });
    }

    /// Copies the given locators or paths into owned storage, then refreshes
    pub fn import_images(&self, sources: Vec<String>) {
        if sources.is_empty() {
            return;
        }
        self.send(Message::Import(sources));
    }

    pub fn delete_item(&self, item: GalleryItem) {
        self.send(Message::Delete(item));
    }

    pub fn delete_selected(&self) {
        let selected = self.selected.borrow().clone();
        match selected {
            Some(item) => self.delete_item(item),
            None => log::debug!("Nothing selected to delete"),
        }
    }

    /// Waits until no fetch is running
    pub async fn settled(&self) {
        let mut loading = self.loading.clone();
        let _ = loading.wait_for(|busy| !*busy).await;
    }

    /// Stops the controller; in-flight work is cancelled and leaves state as is
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn send(&self, message: Message) {
        if self.inbox.send(message).is_err() {
            log::warn!("Gallery controller is not running");
        }
    }
}

impl Drop for GalleryController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
