use std::collections::VecDeque;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use collector_logging::{
    collector_debug, collector_error, collector_info, collector_warn, set_session_label,
};
use timeline_core::{
    build_resume_payload, merge, merge_with_resume, now_millis, project_minimal, update,
    CompletionPolicy, Effect, Event, MergeOutcome, Millis, PacingPolicy, ParsedResume,
    ResumeDraft, ResumePayload, Session, Settings,
};
use tokio::runtime::Runtime;

use crate::bus::{Background, BusRequest};
use crate::export::ExportWriter;
use crate::last_export_store::LastExportStore;
use crate::resume_store::ResumeStore;
use crate::settings_store::SettingsStore;
use crate::{CollectorEvent, ExportSummary};

enum CollectorCommand {
    Event(Event),
    Shutdown,
}

/// Everything a collector worker needs for one session.
pub struct CollectorSetup {
    pub username: String,
    pub pacing: PacingPolicy,
    pub completion: CompletionPolicy,
    pub resume_store: Arc<dyn ResumeStore>,
    pub settings_store: Arc<dyn SettingsStore>,
    /// Finished exports are recorded here through the bus.
    pub last_export_store: Arc<dyn LastExportStore>,
    pub export_writer: ExportWriter,
    /// Items imported from a user-supplied file, merged after the stored resume.
    pub imported: Option<ParsedResume>,
    pub created_at: Millis,
}

/// Handle to a worker thread that owns one collection session. Events are processed
/// strictly in send order.
pub struct CollectorHandle {
    cmd_tx: mpsc::Sender<CollectorCommand>,
    event_rx: mpsc::Receiver<CollectorEvent>,
    worker: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    pub fn start(setup: CollectorSetup) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = event_tx.send(CollectorEvent::Failed {
                        message: format!("could not start runtime: {err}"),
                    });
                    return;
                }
            };
            set_session_label(Some(&setup.username));
            let (worker, session) = Worker::open(setup, runtime, event_tx);
            worker.run(session, cmd_rx);
            set_session_label(None);
        });

        Self {
            cmd_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn send(&self, event: Event) {
        if self.cmd_tx.send(CollectorCommand::Event(event)).is_err() {
            collector_debug!("collector worker has exited; event dropped");
        }
    }

    pub fn try_recv(&self) -> Option<CollectorEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<CollectorEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Stops the worker after the events already sent and waits for it.
    pub fn shutdown(mut self) {
        let _ = self.cmd_tx.send(CollectorCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                collector_error!("collector worker panicked");
            }
        }
    }
}

struct Worker {
    runtime: Runtime,
    resume_store: Arc<dyn ResumeStore>,
    export_writer: ExportWriter,
    bus: Background,
    previous: Option<ResumePayload>,
    event_tx: mpsc::Sender<CollectorEvent>,
}

impl Worker {
    fn open(
        setup: CollectorSetup,
        runtime: Runtime,
        event_tx: mpsc::Sender<CollectorEvent>,
    ) -> (Self, Session) {
        let settings = runtime
            .block_on(setup.settings_store.get())
            .unwrap_or_else(|err| {
                collector_warn!("Falling back to default settings: {}", err);
                Settings::default()
            });
        let stored = runtime
            .block_on(setup.resume_store.load(&setup.username))
            .unwrap_or_else(|err| {
                collector_warn!("Could not load resume: {}", err);
                None
            });

        let session = Session::new(
            &setup.username,
            settings,
            setup.pacing,
            setup.completion,
            setup.created_at,
        );
        let previous = combine_previous(session.username(), stored, setup.imported);
        let resumed_items = previous.as_ref().map_or(0, |payload| payload.tweets.len());
        let _ = event_tx.send(CollectorEvent::Started {
            username: session.username().to_string(),
            resumed_items,
        });

        let worker = Self {
            runtime,
            resume_store: setup.resume_store,
            export_writer: setup.export_writer,
            bus: Background::new(setup.settings_store, setup.last_export_store),
            previous,
            event_tx,
        };
        (worker, session)
    }

    fn run(mut self, mut session: Session, cmd_rx: mpsc::Receiver<CollectorCommand>) {
        while let Ok(command) = cmd_rx.recv() {
            match command {
                CollectorCommand::Event(event) => {
                    session = self.process(session, event);
                    self.emit(CollectorEvent::Progress(session.view()));
                    if session.status().is_terminal() {
                        self.emit(CollectorEvent::Finished {
                            status: session.status(),
                        });
                        break;
                    }
                }
                CollectorCommand::Shutdown => break,
            }
        }
    }

    fn process(&mut self, mut session: Session, event: Event) -> Session {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let (next, effects) = update(session, event);
            session = next;
            for effect in effects {
                self.execute(&session, effect, &mut pending);
            }
        }
        session
    }

    fn execute(&mut self, session: &Session, effect: Effect, pending: &mut VecDeque<Event>) {
        match effect {
            Effect::SetPacing { delay_ms } => self.emit(CollectorEvent::Pacing { delay_ms }),
            Effect::BeginCooldown {
                reason,
                duration_ms,
            } => self.emit(CollectorEvent::Cooldown {
                reason,
                duration_ms,
            }),
            Effect::PauseForRateLimit {
                reason,
                retry_after_ms,
            } => self.emit(CollectorEvent::Paused {
                reason,
                retry_after_ms,
            }),
            Effect::PromptLooksDone { collected } => {
                self.emit(CollectorEvent::LooksDone { collected })
            }
            Effect::PersistResume => self.persist(session),
            Effect::FinalizeExport => {
                let outcome = self.merged(session);
                match self.export_writer.write(
                    &outcome,
                    session.settings().minimal_data,
                    now_millis(),
                ) {
                    Ok(summary) => {
                        self.record_export(session, &summary);
                        self.emit(CollectorEvent::ExportWritten(summary));
                        pending.push_back(Event::ExportWritten { at: now_millis() });
                    }
                    Err(err) => {
                        collector_error!("Export failed: {}", err);
                        self.emit(CollectorEvent::Failed {
                            message: err.to_string(),
                        });
                        // Keep everything for the next attempt.
                        self.persist(session);
                    }
                }
            }
            Effect::ClearResume => {
                if let Err(err) = self
                    .runtime
                    .block_on(self.resume_store.clear(session.username()))
                {
                    collector_warn!("Could not clear resume: {}", err);
                }
            }
        }
    }

    fn record_export(&mut self, session: &Session, summary: &ExportSummary) {
        let request = BusRequest::ExportComplete {
            username: summary
                .meta
                .username
                .clone()
                .unwrap_or_else(|| session.username().to_string()),
            count: summary.meta.final_count,
        };
        if let Err(err) = self.runtime.block_on(self.bus.handle(request)) {
            collector_warn!("Could not record last export: {}", err);
        }
    }

    fn merged(&self, session: &Session) -> MergeOutcome {
        merge_with_resume(
            self.previous.as_ref(),
            session.collected(),
            Some(session.username()),
        )
    }

    fn persist(&self, session: &Session) {
        let outcome = self.merged(session);
        let tweets = if session.settings().minimal_data {
            outcome.items.iter().map(project_minimal).collect()
        } else {
            outcome.items
        };
        let count = tweets.len();
        let payload = build_resume_payload(ResumeDraft {
            username: session.username().to_string(),
            tweets,
            meta: Some(outcome.meta),
            saved_at: None,
        });
        match self.runtime.block_on(self.resume_store.save(&payload)) {
            Ok(()) => self.emit(CollectorEvent::ResumeSaved { count }),
            Err(err) => {
                collector_error!("Could not save resume: {}", err);
                self.emit(CollectorEvent::Failed {
                    message: err.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: CollectorEvent) {
        if let Err(err) = self.event_tx.send(event) {
            collector_debug!("no listener for collector event: {}", err.0);
        }
    }
}

/// Stored resume first, then imported items; duplicates keep the stored copy.
fn combine_previous(
    username: &str,
    stored: Option<ResumePayload>,
    imported: Option<ParsedResume>,
) -> Option<ResumePayload> {
    let Some(imported) = imported else {
        return stored;
    };
    let stored_items = stored.map(|payload| payload.tweets).unwrap_or_default();
    let combined = merge(&stored_items, &imported.tweets, Some(username));
    collector_info!(
        "Resuming from {} stored + {} imported items",
        stored_items.len(),
        imported.tweets.len()
    );
    Some(build_resume_payload(ResumeDraft {
        username: username.to_string(),
        tweets: combined.items,
        meta: Some(combined.meta),
        saved_at: None,
    }))
}
