//! Async driver for [`Session`].
//!
//! The driver is the only owner of the session. Front-end events arrive on
//! an mpsc channel; searches and downloads run as tasks on a [`JoinSet`] and
//! hand their outcome back as an [`Event`]. Returning from [`run`] drops the
//! set, which aborts whatever is still in flight.
//!
//! Lines typed while a search or download is running are held back and
//! replayed once the session is back at the prompt or the list. When the
//! front-end closes, the driver stops reading and keeps joining tasks until
//! the session settles there, then returns.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::state::{Command, Event, Phase, Session};
use crate::error::Result;
use crate::models::Track;

/// The work a session delegates.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>>;

    async fn download(&self, track: &Track) -> Result<()>;
}

/// Draws the session after every transition.
pub trait Render {
    fn render(&mut self, session: &Session);
}

fn is_busy(session: &Session) -> bool {
    matches!(session.phase(), Phase::Loading | Phase::Downloading)
}

/// Run `session` until it asks to exit, or until the front-end channel has
/// closed and no search or download is left running.
///
/// Returns the final session state.
pub async fn run<R: Render>(
    mut session: Session,
    backend: Arc<dyn Backend>,
    mut events: mpsc::Receiver<Event>,
    render: &mut R,
) -> Session {
    let mut tasks: JoinSet<Event> = JoinSet::new();
    let mut deferred: VecDeque<String> = VecDeque::new();
    let mut closed = false;
    let mut pending = session.start();

    loop {
        for command in pending.drain(..) {
            match command {
                Command::Exit => {
                    debug!("Session exit, aborting {} tasks", tasks.len());
                    render.render(&session);
                    return session;
                }
                other => spawn(&mut tasks, Arc::clone(&backend), other),
            }
        }
        render.render(&session);

        if closed && (!is_busy(&session) || tasks.is_empty()) {
            if !deferred.is_empty() {
                debug!("Dropping {} unread lines", deferred.len());
            }
            debug!("Front-end closed, ending session in {:?}", session.phase());
            return session;
        }

        let event = tokio::select! {
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                Ok(event) => event,
                Err(e) => {
                    error!("Session task failed: {}", e);
                    continue;
                }
            },
            received = events.recv(), if !closed => match received {
                Some(Event::Line(line)) if is_busy(&session) => {
                    deferred.push_back(line);
                    continue;
                }
                Some(event) => event,
                None => {
                    debug!("Front-end closed, {} tasks still running", tasks.len());
                    closed = true;
                    continue;
                }
            },
        };

        pending = session.step(event);
        while pending.is_empty() && !is_busy(&session) {
            let Some(line) = deferred.pop_front() else {
                break;
            };
            pending = session.step(Event::Line(line));
        }
    }
}

fn spawn(tasks: &mut JoinSet<Event>, backend: Arc<dyn Backend>, command: Command) {
    match command {
        Command::Search { keyword } => {
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(backend.search(&keyword))
                    .catch_unwind()
                    .await;
                Event::SearchFinished(match outcome {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("search task panicked".to_string()),
                })
            });
        }
        Command::Download { track } => {
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(backend.download(&track))
                    .catch_unwind()
                    .await;
                let outcome = match outcome {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("download task panicked".to_string()),
                };
                Event::DownloadFinished { track, outcome }
            });
        }
        Command::Exit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MusicError;
    use crate::testing::track_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        phases: Vec<Phase>,
    }

    impl Render for Recorder {
        fn render(&mut self, session: &Session) {
            if self.phases.last() != Some(&session.phase()) {
                self.phases.push(session.phase());
            }
        }
    }

    #[derive(Default)]
    struct Scripted {
        downloads: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Backend for Scripted {
        async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
            if keyword == "nothing" {
                return Err(MusicError::NoResults);
            }
            Ok((0..3)
                .map(|i| track_on("qq", &i.to_string(), keyword, "周杰伦", 0))
                .collect())
        }

        async fn download(&self, track: &Track) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.downloads.lock().unwrap().push(track.id.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Stuck;

    #[async_trait]
    impl Backend for Stuck {
        async fn search(&self, _keyword: &str) -> Result<Vec<Track>> {
            std::future::pending().await
        }

        async fn download(&self, _track: &Track) -> Result<()> {
            Ok(())
        }
    }

    struct Exploding;

    #[async_trait]
    impl Backend for Exploding {
        async fn search(&self, _keyword: &str) -> Result<Vec<Track>> {
            panic!("adapter bug");
        }

        async fn download(&self, _track: &Track) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_search_select_download_quit() {
        let backend = Arc::new(Scripted::default());
        let (tx, rx) = mpsc::channel(16);
        let mut recorder = Recorder::default();

        let driver = tokio::spawn({
            let backend: Arc<dyn Backend> = backend.clone();
            async move {
                let session = run(Session::new(Some("晴天")), backend, rx, &mut recorder).await;
                (session, recorder)
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Event::SelectAll).await.unwrap();
        tx.send(Event::Confirm).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(Event::Quit).await.unwrap();

        let (session, recorder) = driver.await.unwrap();
        assert_eq!(session.downloaded(), 3);
        assert_eq!(session.phase(), Phase::List);
        assert_eq!(*backend.downloads.lock().unwrap(), vec!["0", "1", "2"]);
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.phases,
            vec![Phase::Loading, Phase::List, Phase::Downloading, Phase::List]
        );
    }

    #[tokio::test]
    async fn test_search_error_becomes_status() {
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        let driver = tokio::spawn(async move {
            run(Session::new(None), Arc::new(Scripted::default()), rx, &mut recorder).await
        });

        tx.send(Event::Line("nothing".to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Event::Quit).await.unwrap();

        let session = driver.await.unwrap();
        assert_eq!(session.phase(), Phase::Input);
        assert_eq!(session.error(), Some("No results found"));
    }

    #[tokio::test]
    async fn test_panicking_search_is_reported() {
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        let driver = tokio::spawn(async move {
            run(Session::new(Some("x")), Arc::new(Exploding), rx, &mut recorder).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Event::Quit).await.unwrap();
        let session = driver.await.unwrap();
        assert_eq!(session.phase(), Phase::Input);
        assert_eq!(session.error(), Some("search task panicked"));
    }

    #[tokio::test]
    async fn test_closing_front_end_at_prompt_returns() {
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        drop(tx);
        let session = run(Session::new(None), Arc::new(Stuck), rx, &mut recorder).await;
        assert_eq!(session.phase(), Phase::Input);
    }

    #[tokio::test]
    async fn test_closing_front_end_lets_search_finish() {
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        drop(tx);
        let session = run(
            Session::new(Some("晴天")),
            Arc::new(Scripted::default()),
            rx,
            &mut recorder,
        )
        .await;
        assert_eq!(session.phase(), Phase::List);
        assert_eq!(session.results().len(), 3);
        assert_eq!(recorder.phases, vec![Phase::Loading, Phase::List]);
    }

    #[tokio::test]
    async fn test_piped_lines_reach_the_download() {
        let backend = Arc::new(Scripted::default());
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();

        tx.send(Event::Line("晴天".to_string())).await.unwrap();
        tx.send(Event::Line(String::new())).await.unwrap();
        drop(tx);

        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let session = tokio::time::timeout(
            Duration::from_secs(1),
            run(Session::new(None), dyn_backend, rx, &mut recorder),
        )
        .await
        .unwrap();

        assert_eq!(session.phase(), Phase::List);
        assert_eq!(session.downloaded(), 1);
        assert_eq!(*backend.downloads.lock().unwrap(), vec!["0"]);
    }

    #[tokio::test]
    async fn test_lines_during_download_wait_for_the_list() {
        let backend = Arc::new(Scripted::default());
        let (tx, rx) = mpsc::channel(8);
        let mut recorder = Recorder::default();

        for line in ["3", "", "1", "", "q"] {
            tx.send(Event::Line(line.to_string())).await.unwrap();
        }

        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let session = tokio::time::timeout(
            Duration::from_secs(1),
            run(Session::new(Some("晴天")), dyn_backend, rx, &mut recorder),
        )
        .await
        .unwrap();

        assert_eq!(session.phase(), Phase::List);
        assert_eq!(session.downloaded(), 1);
        assert_eq!(*backend.downloads.lock().unwrap(), vec!["2", "0"]);
        drop(tx);
    }

    #[tokio::test]
    async fn test_closing_front_end_waits_for_running_search() {
        let (tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        drop(tx);
        let driver = run(Session::new(Some("x")), Arc::new(Stuck), rx, &mut recorder);
        assert!(tokio::time::timeout(Duration::from_millis(50), driver)
            .await
            .is_err());
    }
}
