use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::LocalSet;
use tokio::time::Instant;

use decor_core::{
    config::load_config_at,
    manifest::{self, SourceManifest},
    types::SourceId,
    DecorError,
};
use decor_sync::{CoordinatorOptions, COORDINATOR_ID};

use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path, sources_dir, DAEMON_LABEL};
use crate::protocol::{DaemonRequest, DaemonResponse, CMD_DECORATIONS, CMD_STATUS, CMD_STOP};
use crate::state::{ApplyOutcome, DecorState, SourceDecorations, StatusReport};

/// Work for the coordinator task.
#[derive(Debug)]
enum Command {
    Upsert {
        id: SourceId,
        manifest: SourceManifest,
    },
    Remove(SourceId),
    Status,
    Decorations(Option<SourceId>),
}

#[derive(Debug)]
enum Reply {
    Applied(ApplySummary),
    Status(StatusReport),
    Decorations(Vec<SourceDecorations>),
}

struct Job {
    command: Command,
    origin: &'static str,
    respond_to: oneshot::Sender<Result<Reply, String>>,
}

#[derive(Debug, Clone)]
struct ApplySummary {
    source: SourceId,
    origin: &'static str,
    outcome: ApplyOutcome,
    decorated: usize,
    duration_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchAction {
    Upsert,
    Remove,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
///
/// The coordinator and its registries are single-threaded, so they live on a
/// [`LocalSet`]; every other task reaches them through the job queue.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let config = load_config_at(&home)?;
    let started_at_unix = unix_seconds_now();

    let (job_tx, job_rx) = mpsc::channel::<Job>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let local = LocalSet::new();
    local
        .run_until(async move {
            let coordinator_handle = {
                let shutdown = shutdown_tx.clone();
                let home = home.clone();
                let options = CoordinatorOptions::from(&config);
                tokio::task::spawn_local(async move {
                    let result =
                        coordinator_task(home, options, job_rx, shutdown.subscribe()).await;
                    let _ = shutdown.send(());
                    result
                })
            };

            let watcher_handle = {
                let shutdown = shutdown_tx.clone();
                let home = home.clone();
                let job_tx = job_tx.clone();
                let window = config.debounce();
                tokio::spawn(async move {
                    let result = watcher_task(home, window, job_tx, shutdown.subscribe()).await;
                    let _ = shutdown.send(());
                    result
                })
            };

            let socket_handle = {
                let shutdown = shutdown_tx.clone();
                let home = home.clone();
                let job_tx = job_tx.clone();
                tokio::spawn(async move {
                    let result = socket_server_task(
                        home,
                        job_tx,
                        shutdown.clone(),
                        shutdown.subscribe(),
                        started_at_unix,
                    )
                    .await;
                    let _ = shutdown.send(());
                    result
                })
            };

            let signal_handle = {
                let shutdown = shutdown_tx.clone();
                tokio::spawn(async move {
                    let mut shutdown_rx = shutdown.subscribe();
                    tokio::select! {
                        _ = shutdown_rx.recv() => Ok(()),
                        signal = tokio::signal::ctrl_c() => {
                            match signal {
                                Ok(()) => {
                                    tracing::info!("received ctrl-c, shutting down daemon");
                                    let _ = shutdown.send(());
                                    Ok(())
                                }
                                Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                            }
                        }
                    }
                })
            };

            let (coordinator_result, watcher_result, socket_result, signal_result) = tokio::join!(
                coordinator_handle,
                watcher_handle,
                socket_handle,
                signal_handle
            );

            handle_join("coordinator", coordinator_result)?;
            handle_join("watcher", watcher_result)?;
            handle_join("socket_server", socket_result)?;
            handle_join("signal_handler", signal_result)?;
            Ok(())
        })
        .await
}

// ---------------------------------------------------------------------------
// Coordinator task
// ---------------------------------------------------------------------------

async fn coordinator_task(
    home: PathBuf,
    options: CoordinatorOptions,
    mut job_rx: mpsc::Receiver<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut state = DecorState::new(options);

    let initial = tokio::task::spawn_blocking(move || load_all_manifests(&home))
        .await
        .map_err(|err| DaemonError::Protocol(format!("manifest load join error: {err}")))??;
    for (id, manifest) in initial {
        let command = Command::Upsert { id, manifest };
        if let Err(err) = handle_command(&mut state, command, "startup") {
            tracing::warn!(error = %err, "startup manifest rejected");
        }
    }
    tracing::info!(
        coordinator = COORDINATOR_ID,
        sources = state.status().sources.len(),
        "decoration coordinator ready",
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = handle_command(&mut state, job.command, job.origin);
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    state.shutdown();
    Ok(())
}

fn handle_command(
    state: &mut DecorState,
    command: Command,
    origin: &'static str,
) -> Result<Reply, String> {
    match command {
        Command::Upsert { id, manifest } => {
            let started = std::time::Instant::now();
            let outcome = state
                .upsert(id.clone(), manifest)
                .map_err(|err| err.to_string())?;
            Ok(Reply::Applied(ApplySummary {
                decorated: state.decorated(&id),
                source: id,
                origin,
                outcome,
                duration_ms: started.elapsed().as_millis(),
            }))
        }
        Command::Remove(id) => {
            let started = std::time::Instant::now();
            let outcome = state.remove(&id);
            Ok(Reply::Applied(ApplySummary {
                source: id,
                origin,
                outcome,
                decorated: 0,
                duration_ms: started.elapsed().as_millis(),
            }))
        }
        Command::Status => Ok(Reply::Status(state.status())),
        Command::Decorations(filter) => state.decorations(filter.as_ref()).map(Reply::Decorations),
    }
}

/// Every readable manifest; unreadable ones are logged and skipped.
fn load_all_manifests(home: &Path) -> Result<Vec<(SourceId, SourceManifest)>, DaemonError> {
    let mut loaded = Vec::new();
    for id in manifest::list_source_ids_at(home)? {
        match manifest::load_manifest_at(home, &id) {
            Ok(manifest) => loaded.push((id, manifest)),
            Err(err) => {
                tracing::warn!(source = %id, error = %err, "skipping unreadable manifest");
            }
        }
    }
    Ok(loaded)
}

async fn enqueue(
    job_tx: &mpsc::Sender<Job>,
    command: Command,
    origin: &'static str,
) -> Result<Reply, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(Job {
            command,
            origin,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("job queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("job response"))?;
    outcome.map_err(DaemonError::Protocol)
}

// ---------------------------------------------------------------------------
// Watcher task
// ---------------------------------------------------------------------------

async fn watcher_task(
    home: PathBuf,
    debounce_window: Duration,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let sources = sources_dir(&home);
    if !sources.exists() {
        fs::create_dir_all(&sources).map_err(|e| io_err(&sources, e))?;
    }

    // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
    // /private/var/... on macOS) match the parent checks below.
    let sources = fs::canonicalize(&sources).unwrap_or(sources);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&sources, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %sources.display(), "watching sources directory");

    let mut pending = Debouncer::<PathBuf>::new(debounce_window);

    loop {
        let next_flush = pending.next_deadline();
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep_until(next_flush.unwrap_or_else(Instant::now)), if next_flush.is_some() => {
                for path in pending.take_due(Instant::now()) {
                    let Some(command) = command_for_path(&home, &sources, &path).await else {
                        continue;
                    };
                    apply_watch_command(&job_tx, command).await;
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                for path in event.paths {
                    if classify_path(&path, &sources).is_some() {
                        pending.touch(path, Instant::now());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Job for a manifest path whose events have settled.
///
/// The file is classified and read at flush time, so the job reflects the
/// last write of a burst.
async fn command_for_path(home: &Path, sources: &Path, path: &Path) -> Option<Command> {
    let (id, action) = classify_path(path, sources)?;
    match action {
        WatchAction::Remove => Some(Command::Remove(id)),
        WatchAction::Upsert => match read_manifest(home.to_path_buf(), id.clone()).await {
            Ok(manifest) => Some(Command::Upsert { id, manifest }),
            Err(DaemonError::Decor(DecorError::ManifestNotFound { .. })) => {
                Some(Command::Remove(id))
            }
            Err(err) => {
                tracing::warn!(source = %id, error = %err, "skipping unreadable manifest");
                None
            }
        },
    }
}

async fn apply_watch_command(job_tx: &mpsc::Sender<Job>, command: Command) {
    match enqueue(job_tx, command, "watcher").await {
        Ok(Reply::Applied(summary)) => {
            tracing::info!(
                source = %summary.source,
                origin = summary.origin,
                outcome = ?summary.outcome,
                decorated = summary.decorated,
                duration_ms = summary.duration_ms,
                "manifest change applied",
            );
        }
        Ok(other) => {
            tracing::warn!(reply = ?other, "unexpected reply to manifest change");
        }
        Err(err) => {
            tracing::error!(error = %err, "manifest change failed");
        }
    }
}

async fn read_manifest(home: PathBuf, id: SourceId) -> Result<SourceManifest, DaemonError> {
    tokio::task::spawn_blocking(move || manifest::load_manifest_at(&home, &id))
        .await
        .map_err(|err| DaemonError::Protocol(format!("manifest read join error: {err}")))?
        .map_err(DaemonError::from)
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Source id and action for a manifest path inside `sources`.
///
/// A path that still exists is (re)loaded; a vanished one is removed. Renames
/// are covered by the same rule.
fn classify_path(path: &Path, sources: &Path) -> Option<(SourceId, WatchAction)> {
    if path.parent() != Some(sources) {
        return None;
    }
    let id = manifest::source_id_for_path(path)?;
    let action = if path.exists() {
        WatchAction::Upsert
    } else {
        WatchAction::Remove
    };
    Some((id, action))
}

/// Trailing-edge debounce: a key comes due once no event has touched it for
/// one full window.
#[derive(Debug)]
struct Debouncer<K> {
    window: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Ord + Clone> Debouncer<K> {
    fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Record an event for `key`, pushing its deadline one window past `now`.
    fn touch(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.window);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key whose deadline has passed, ascending.
    fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.sort();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }
}

// ---------------------------------------------------------------------------
// Socket server
// ---------------------------------------------------------------------------

async fn socket_server_task(
    home: PathBuf,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        job_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    job_tx: mpsc::Sender<Job>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            CMD_STATUS => match enqueue(&job_tx, Command::Status, "socket").await {
                Ok(Reply::Status(report)) => {
                    DaemonResponse::ok(build_status_payload(&home, &report, started_at_unix))
                }
                Ok(other) => DaemonResponse::error(format!("unexpected reply: {other:?}")),
                Err(err) => error_response(err),
            },
            CMD_DECORATIONS => {
                let filter = request.source.clone().map(SourceId::from);
                match enqueue(&job_tx, Command::Decorations(filter), "socket").await {
                    Ok(Reply::Decorations(list)) => DaemonResponse::ok(json!(list)),
                    Ok(other) => DaemonResponse::error(format!("unexpected reply: {other:?}")),
                    Err(err) => error_response(err),
                }
            }
            CMD_STOP => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == CMD_STOP {
            break;
        }
    }

    Ok(())
}

fn error_response(err: DaemonError) -> DaemonResponse {
    match err {
        DaemonError::Protocol(message) => DaemonResponse::error(message),
        other => DaemonResponse::error(other.to_string()),
    }
}

fn build_status_payload(home: &Path, report: &StatusReport, started_at_unix: u64) -> Value {
    json!({
        "running": true,
        "label": DAEMON_LABEL,
        "coordinator": COORDINATOR_ID,
        "started_at_unix": started_at_unix,
        "sources": report.sources,
        "decorations": report.decorations,
        "socket": socket_path(home).display().to_string(),
        "sources_dir": sources_dir(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    manifest::ensure_sources_dir_at(home)?;
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
