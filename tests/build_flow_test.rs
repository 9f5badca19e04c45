//! End-to-end orchestration tests against a scripted backend.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use imagectl::backend::{BackendConnection, SolveOutput};
use imagectl::build;
use imagectl::error::BuildError;
use imagectl::progress::{ProgressEvent, ProgressMode, ProgressPhase, ProgressRelay};
use imagectl::solve::{BuildOptions, SolveRequest};

/// Backend double that replays a scripted event stream, records the request
/// it was handed, and then succeeds or fails as configured.
struct ScriptedBackend {
    events: Vec<ProgressEvent>,
    fail_with: Option<String>,
    seen_request: Arc<Mutex<Option<SolveRequest>>>,
}

impl ScriptedBackend {
    fn new(events: Vec<ProgressEvent>) -> Self {
        Self {
            events,
            fail_with: None,
            seen_request: Arc::new(Mutex::new(None)),
        }
    }

    fn failing(events: Vec<ProgressEvent>, message: &str) -> Self {
        let mut backend = Self::new(events);
        backend.fail_with = Some(message.to_string());
        backend
    }
}

#[async_trait]
impl BackendConnection for ScriptedBackend {
    async fn solve(
        &self,
        request: SolveRequest,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<SolveOutput, BuildError> {
        *self.seen_request.lock().unwrap() = Some(request);
        if let Some(tx) = progress {
            for event in self.events.clone() {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
        match &self.fail_with {
            Some(message) => Err(BuildError::Solve(message.clone())),
            None => {
                let mut output = SolveOutput::default();
                output
                    .exporter_response
                    .insert("image.name".to_string(), "docker.io/library/app:latest".to_string());
                Ok(output)
            }
        }
    }

    async fn tag(&self, _source: &str, _targets: &[String]) -> Result<(), BuildError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8(buf.clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"))
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn started(vertex: &str) -> ProgressEvent {
    ProgressEvent {
        vertex: vertex.to_string(),
        phase: ProgressPhase::Started,
        detail: None,
    }
}

fn options(context: &str) -> BuildOptions {
    BuildOptions {
        context: context.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_all_events_rendered_in_order_before_return() {
    let events: Vec<ProgressEvent> = (0..50).map(|i| started(&format!("step-{}", i))).collect();
    let backend = ScriptedBackend::new(events);

    let buf = SharedBuf::default();
    let (relay, sender) = ProgressRelay::with_writer(buf.clone());
    let request = SolveRequest::from_options(&options("/app"));

    let output = build::run_with_relay(&backend, request, relay, sender)
        .await
        .unwrap();

    // The orchestrator has returned, so the relay must have drained fully.
    let lines = buf.lines();
    assert_eq!(lines.len(), 50);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line, &format!("=> step-{}", i));
    }
    assert_eq!(
        output.exporter_response.get("image.name").map(String::as_str),
        Some("docker.io/library/app:latest")
    );
}

#[tokio::test]
async fn test_solve_error_wins_over_render_error() {
    let backend = ScriptedBackend::failing(vec![started("step-0")], "frontend rejected request");

    let (relay, sender) = ProgressRelay::with_writer(BrokenWriter);
    let request = SolveRequest::from_options(&options("/app"));

    let err = build::run_with_relay(&backend, request, relay, sender)
        .await
        .unwrap_err();
    match err {
        BuildError::Solve(message) => assert_eq!(message, "frontend rejected request"),
        other => panic!("expected solve error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_render_error_surfaces_when_solve_succeeds() {
    let backend = ScriptedBackend::new(vec![started("step-0")]);

    let (relay, sender) = ProgressRelay::with_writer(BrokenWriter);
    let request = SolveRequest::from_options(&options("/app"));

    let err = build::run_with_relay(&backend, request, relay, sender)
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::Render(_)));
}

#[tokio::test]
async fn test_silent_mode_runs_without_relay() {
    let backend = ScriptedBackend::new(vec![]);
    let mut opts = options("/app");
    opts.progress = ProgressMode::None;

    let output = build::run(&backend, &opts).await.unwrap();
    assert!(output.exporter_response.contains_key("image.name"));
}

#[tokio::test]
async fn test_request_translation_reaches_backend() {
    let backend = ScriptedBackend::new(vec![]);
    let seen = backend.seen_request.clone();

    let mut opts = options("/app");
    opts.progress = ProgressMode::None;
    opts.build_args = vec!["VERSION=1.2=rc".to_string()];
    opts.tags = vec!["myimg:latest".to_string(), "bad ref".to_string()];
    opts.pull = true;

    build::run(&backend, &opts).await.unwrap();

    let request = seen.lock().unwrap().take().expect("backend saw no request");
    assert_eq!(request.frontend, "dockerfile.v0");
    assert_eq!(
        request.frontend_attrs.get("build-arg:VERSION").map(String::as_str),
        Some("1.2=rc")
    );
    assert_eq!(
        request.frontend_attrs.get("image-resolve-mode").map(String::as_str),
        Some("pull")
    );
    assert_eq!(
        request.local_dirs.get("context").map(String::as_str),
        Some("/app")
    );
    assert_eq!(
        request.local_dirs.get("dockerfile").map(String::as_str),
        Some("/app")
    );
    // The invalid tag was dropped; only the normalized survivor is exported.
    assert_eq!(request.exports.len(), 1);
    assert_eq!(
        request.exports[0].attrs.get("name").map(String::as_str),
        Some("docker.io/library/myimg:latest")
    );
}
