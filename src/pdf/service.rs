//! Render service - runs effects against the worker thread

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use flume::{Receiver, Sender};
use log::{error, warn};

use super::request::{RenderRequest, RenderResponse};
use super::types::DocumentBackend;
use super::worker::{WorkerContext, render_worker};
use crate::fetch::Fetcher;
use crate::reader::{Command, Effect, FitPolicy};

/// Bridges `ReaderController` effects to the render worker and turns the
/// worker's responses back into controller commands
pub struct RenderService {
    request_tx: Sender<RenderRequest>,
    /// Loopback for failures answered without the worker
    response_tx: Sender<RenderResponse>,
    response_rx: Receiver<RenderResponse>,
    worker_running: bool,
}

const WORKER_DOWN: &str = "render worker is not running";

impl RenderService {
    pub fn spawn(
        backend: Box<dyn DocumentBackend>,
        fetcher: Fetcher,
        asset_root: PathBuf,
        policy: FitPolicy,
    ) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let ctx = WorkerContext {
            backend,
            fetcher,
            asset_root,
            policy,
        };
        let worker_tx = response_tx.clone();
        let spawned = thread::Builder::new()
            .name("render-worker".into())
            .spawn(move || render_worker(ctx, request_rx, worker_tx));
        if let Err(e) = &spawned {
            error!("Failed to start render worker: {e}");
        }

        Self {
            request_tx,
            response_tx,
            response_rx,
            worker_running: spawned.is_ok(),
        }
    }

    pub fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            let request = match effect {
                Effect::LoadDocument { session, document } => {
                    RenderRequest::Open { session, document }
                }
                Effect::RenderPage(job) => RenderRequest::Page(job),
                Effect::ReleaseDocument(session) => RenderRequest::Close(session),
            };
            if !self.worker_running {
                self.reject(request);
                continue;
            }
            if let Err(flume::SendError(request)) = self.request_tx.send(request) {
                error!("Render worker is gone");
                self.reject(request);
            }
        }
    }

    /// Answer a request the worker will never see. Only document loads
    /// need a reply; the reader would otherwise wait in Opening.
    fn reject(&self, request: RenderRequest) {
        if let RenderRequest::Open { session, document } = request {
            warn!("Cannot open {document}: {WORKER_DOWN}");
            let _ = self.response_tx.send(RenderResponse::LoadFailed {
                session,
                reason: WORKER_DOWN.to_string(),
            });
        }
    }

    /// Drain finished work without blocking
    pub fn poll(&self) -> Vec<Command> {
        self.response_rx.try_iter().map(Command::from).collect()
    }

    /// Block until the next response or the timeout
    pub fn wait(&self, timeout: Duration) -> Option<Command> {
        self.response_rx.recv_timeout(timeout).ok().map(Command::from)
    }

    pub fn shutdown(&self) {
        let _ = self.request_tx.send(RenderRequest::Shutdown);
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SessionId;

    /// Service whose worker never took the request channel
    fn without_worker(worker_running: bool) -> RenderService {
        let (request_tx, _) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        RenderService {
            request_tx,
            response_tx,
            response_rx,
            worker_running,
        }
    }

    fn load(session: u64) -> Effect {
        Effect::LoadDocument {
            session: SessionId(session),
            document: "pdfs/a.pdf".into(),
        }
    }

    #[test]
    fn load_fails_when_worker_never_started() {
        let service = without_worker(false);
        service.execute(vec![load(3)]);

        let commands = service.poll();
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            &commands[0],
            Command::DocumentFailed { session: SessionId(3), reason } if reason == WORKER_DOWN
        ));
    }

    #[test]
    fn load_fails_when_worker_has_exited() {
        let service = without_worker(true);
        service.execute(vec![load(1)]);

        let command = service.wait(Duration::from_millis(100));
        assert!(matches!(
            command,
            Some(Command::DocumentFailed { session: SessionId(1), .. })
        ));
    }

    #[test]
    fn only_loads_are_answered_without_worker() {
        let service = without_worker(false);
        service.execute(vec![Effect::ReleaseDocument(SessionId(2))]);
        assert!(service.poll().is_empty());
    }
}
