//! Message bus: runs commands and fans their events out to handlers.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use domain::{DomainEvent, Event};
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::commands::{Command, CommandResult};
use crate::config::Config;
use crate::event_handlers::EventHandler;
use crate::handlers;
use crate::unit_of_work::{Repositories, UnitOfWork};
use crate::{Result, ServiceError};

/// Counts of what happened during one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handler runs that finished and committed.
    pub completed: usize,

    /// Handler runs that returned an error or panicked.
    pub failed: usize,

    /// Handler runs aborted when the deadline passed.
    pub cancelled: usize,
}

impl DispatchReport {
    /// Returns true if every handler run completed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Result of a handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// What the command produced.
    pub result: CommandResult,

    /// Number of events the command recorded.
    pub events: usize,

    /// How dispatching those events (and everything they caused) went.
    pub dispatch: DispatchReport,
}

enum HandlerOutcome {
    Completed(Vec<Event>),
    Failed(String),
}

struct HandlerRun {
    handler: &'static str,
    event_type: &'static str,
    depth: usize,
    outcome: HandlerOutcome,
}

type HandlerMap = HashMap<&'static str, Vec<Arc<dyn EventHandler>>>;

/// Routes commands to their handler and events to every subscriber.
///
/// A command runs in its own unit of work; once it is committed, its events
/// are dispatched. Every (event, handler) pair runs as a separate task in its
/// own unit of work, and events those tasks produce are dispatched in turn,
/// all under one deadline. Handler failures never reach the caller.
#[derive(Clone)]
pub struct MessageBus {
    repositories: Repositories,
    handlers: Arc<HandlerMap>,
    dispatch_timeout: Duration,
    max_dispatch_depth: usize,
}

impl MessageBus {
    /// Creates a bus with no event subscribers.
    pub fn new(repositories: Repositories, config: &Config) -> Self {
        Self {
            repositories,
            handlers: Arc::new(HashMap::new()),
            dispatch_timeout: config.dispatch_timeout,
            max_dispatch_depth: config.max_dispatch_depth,
        }
    }

    /// Registers `handler` for events of `event_type`.
    ///
    /// Clones of the bus made earlier keep their own subscriber list.
    pub fn subscribe(&mut self, event_type: &'static str, handler: Arc<dyn EventHandler>) {
        Arc::make_mut(&mut self.handlers)
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Registers `handler` for several event types.
    pub fn subscribe_all(&mut self, event_types: &[&'static str], handler: Arc<dyn EventHandler>) {
        for event_type in event_types {
            self.subscribe(*event_type, Arc::clone(&handler));
        }
    }

    /// Returns the number of handlers registered for `event_type`.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    /// Returns the repositories commands and handlers work against.
    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    /// Handles a command, then dispatches the events it recorded.
    ///
    /// A failing command commits nothing and dispatches nothing.
    pub async fn handle_command(&self, command: impl Into<Command>) -> Result<CommandOutcome> {
        self.execute(command.into()).await
    }

    #[tracing::instrument(skip(self, command), fields(command = command.name()))]
    async fn execute(&self, command: Command) -> Result<CommandOutcome> {
        let name = command.name();
        let started = std::time::Instant::now();

        let mut uow = UnitOfWork::begin(&self.repositories);
        let result = match handlers::handle(command, &mut uow).await {
            Ok(result) => result,
            Err(err) => {
                uow.rollback();
                tracing::info!(error = %err, "command rejected");
                return Err(err);
            }
        };
        if let Err(err) = uow.commit().await {
            uow.rollback();
            tracing::warn!(error = %err, "command could not be committed");
            return Err(err);
        }
        let events = uow.collect_new_events();

        metrics::counter!("commands_handled_total", "command" => name).increment(1);
        metrics::histogram!("command_duration_seconds").record(started.elapsed().as_secs_f64());

        let recorded = events.len();
        let dispatch = self.dispatch(events).await;
        Ok(CommandOutcome {
            result,
            events: recorded,
            dispatch,
        })
    }

    /// Dispatches a single event.
    pub async fn handle_event(&self, event: Event) -> DispatchReport {
        self.dispatch(vec![event]).await
    }

    /// Dispatches events to their handlers concurrently.
    ///
    /// Returns once every handler run, including runs for events produced
    /// along the way, has finished or the deadline has passed. Runs still
    /// going at the deadline are aborted.
    #[tracing::instrument(skip_all, fields(events = events.len()))]
    pub async fn dispatch(&self, events: Vec<Event>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut tasks = JoinSet::new();
        for event in events {
            self.spawn_handlers(&mut tasks, event, 0);
        }

        let deadline = Instant::now() + self.dispatch_timeout;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(run))) => self.record_run(&mut tasks, &mut report, run),
                Ok(Some(Err(err))) => {
                    report.failed += 1;
                    tracing::error!(error = %err, "event handler task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    report.cancelled = tasks.len();
                    tasks.abort_all();
                    metrics::counter!("event_dispatch_timeouts_total").increment(1);
                    tracing::warn!(
                        cancelled = report.cancelled,
                        timeout_ms = self.dispatch_timeout.as_millis() as u64,
                        "event dispatch timed out"
                    );
                    break;
                }
            }
        }

        tracing::debug!(
            completed = report.completed,
            failed = report.failed,
            cancelled = report.cancelled,
            "dispatch finished"
        );
        report
    }

    fn spawn_handlers(&self, tasks: &mut JoinSet<HandlerRun>, event: Event, depth: usize) {
        let Some(handlers) = self.handlers.get(event.event_type()) else {
            tracing::trace!(event_type = event.event_type(), "no handlers registered");
            return;
        };

        metrics::counter!("events_dispatched_total", "event_type" => event.event_type())
            .increment(1);
        for handler in handlers {
            tasks.spawn(run_handler(
                Arc::clone(handler),
                event.clone(),
                self.repositories.clone(),
                depth,
            ));
        }
    }

    fn record_run(
        &self,
        tasks: &mut JoinSet<HandlerRun>,
        report: &mut DispatchReport,
        run: HandlerRun,
    ) {
        match run.outcome {
            HandlerOutcome::Completed(events) => {
                report.completed += 1;
                let depth = run.depth + 1;
                for event in events {
                    if depth >= self.max_dispatch_depth {
                        tracing::warn!(
                            event_type = event.event_type(),
                            depth,
                            "dispatch depth exceeded, dropping event"
                        );
                        continue;
                    }
                    self.spawn_handlers(tasks, event, depth);
                }
            }
            HandlerOutcome::Failed(error) => {
                report.failed += 1;
                metrics::counter!("event_handler_failures_total", "handler" => run.handler)
                    .increment(1);
                tracing::error!(
                    handler = run.handler,
                    event_type = run.event_type,
                    %error,
                    "event handler failed"
                );
            }
        }
    }
}

/// Runs one handler for one event in a fresh unit of work.
async fn run_handler(
    handler: Arc<dyn EventHandler>,
    event: Event,
    repositories: Repositories,
    depth: usize,
) -> HandlerRun {
    let work = async {
        let mut uow = UnitOfWork::begin(&repositories);
        handler.handle(&event, &mut uow).await?;
        uow.commit().await?;
        Ok::<_, ServiceError>(uow.collect_new_events())
    };

    let outcome = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(events)) => HandlerOutcome::Completed(events),
        Ok(Err(err)) => HandlerOutcome::Failed(err.to_string()),
        Err(_) => HandlerOutcome::Failed("handler panicked".to_string()),
    };
    HandlerRun {
        handler: handler.name(),
        event_type: event.event_type(),
        depth,
        outcome,
    }
}
