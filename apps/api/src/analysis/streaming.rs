//! Incremental delivery: growing text snapshots over one streaming call, and
//! the event sequence for a streamed analysis.
//!
//! Cancellation only stops reading. The HTTP response is dropped, but no cancel
//! message exists in the backend protocol, so the backend may keep generating
//! after a subscriber stops.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::analyzer::{aggregate_or_total_failure, Analyzer, SectionProgress};
use crate::analysis::document::Document;
use crate::analysis::error::{AnalysisError, FailureKind};
use crate::analysis::report::{status_for, AnalysisMode, AnalysisStatus};
use crate::inference::{FragmentStream, GenerationOptions, InferenceError};
use crate::prompts::AnalysisPrompts;

/// Shared stop flag for a `SnapshotStream`. Clone it into whatever decides to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Yields the accumulated text after every non-empty fragment, so each item
/// extends the previous one. Ends on the backend's done marker, the first
/// error, or cancellation.
pub struct SnapshotStream {
    inner: Option<FragmentStream>,
    text: String,
    cancel: CancelHandle,
}

impl SnapshotStream {
    pub fn new(fragments: FragmentStream) -> Self {
        Self {
            inner: Some(fragments),
            text: String::new(),
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Stream for SnapshotStream {
    type Item = Result<String, InferenceError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.cancel.is_cancelled() {
                this.inner = None;
                return Poll::Ready(None);
            }
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    this.text.push_str(&fragment);
                    return Poll::Ready(Some(Ok(this.text.clone())));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.inner = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// One item of a streamed analysis, serialized as an SSE payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    Started {
        analysis_id: Uuid,
        mode: AnalysisMode,
        word_count: usize,
        sections: usize,
    },
    Progress {
        section: usize,
        total: usize,
        succeeded: bool,
    },
    Snapshot {
        text: String,
    },
    Done {
        analysis_id: Uuid,
        status: AnalysisStatus,
        text: String,
        elapsed_ms: u64,
    },
    Error {
        kind: Option<FailureKind>,
        message: String,
    },
}

impl AnalysisEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisEvent::Started { .. } => "started",
            AnalysisEvent::Progress { .. } => "progress",
            AnalysisEvent::Snapshot { .. } => "snapshot",
            AnalysisEvent::Done { .. } => "done",
            AnalysisEvent::Error { .. } => "error",
        }
    }

    pub fn from_error(error: &AnalysisError) -> Self {
        AnalysisEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub type AnalysisEvents = Pin<Box<dyn Stream<Item = AnalysisEvent> + Send>>;

/// Starts a streamed analysis.
///
/// Input problems are returned immediately. Everything after that arrives as
/// events: `started`, `progress` per section (chunked mode), `snapshot`s of the
/// final call, then `done` or `error`. Dropping the returned stream stops the
/// run and drops any in-flight backend request.
pub fn stream_analysis(
    analyzer: Analyzer,
    document: Document,
    model: String,
    prompts: AnalysisPrompts,
    options: GenerationOptions,
) -> Result<AnalysisEvents, AnalysisError> {
    let mode = analyzer.prepare(&document, &prompts, &options)?;
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let run = StreamRun {
            analyzer: &analyzer,
            document: &document,
            model: &model,
            prompts: &prompts,
            options,
            tx: &tx,
        };
        // A subscriber that goes away mid-call drops the in-flight request too.
        let outcome = tokio::select! {
            outcome = run.drive(mode) => outcome,
            _ = tx.closed() => Err(AnalysisError::Cancelled),
        };
        if let Err(e) = outcome {
            match e {
                AnalysisError::Cancelled => info!("Streamed analysis abandoned by subscriber"),
                other => {
                    warn!("Streamed analysis failed: {other}");
                    let _ = tx.send(AnalysisEvent::from_error(&other));
                }
            }
        }
    });

    Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })))
}

struct StreamRun<'a> {
    analyzer: &'a Analyzer,
    document: &'a Document,
    model: &'a str,
    prompts: &'a AnalysisPrompts,
    options: GenerationOptions,
    tx: &'a mpsc::UnboundedSender<AnalysisEvent>,
}

impl StreamRun<'_> {
    fn send(&self, event: AnalysisEvent) -> Result<(), AnalysisError> {
        self.tx.send(event).map_err(|_| AnalysisError::Cancelled)
    }

    async fn drive(&self, mode: AnalysisMode) -> Result<(), AnalysisError> {
        let analysis_id = Uuid::new_v4();
        let clock = Instant::now();
        let sections = match mode {
            AnalysisMode::SingleShot => 0,
            AnalysisMode::Chunked => self
                .document
                .word_count()
                .div_ceil(self.analyzer.settings().max_words),
        };

        self.send(AnalysisEvent::Started {
            analysis_id,
            mode,
            word_count: self.document.word_count(),
            sections,
        })?;

        let (request, status) = match mode {
            AnalysisMode::SingleShot => (
                self.analyzer.single_shot_request(
                    self.document,
                    self.model,
                    self.prompts,
                    self.options,
                )?,
                AnalysisStatus::Complete,
            ),
            AnalysisMode::Chunked => {
                let tx = self.tx;
                let mut report_progress = |progress: SectionProgress| {
                    tx.send(AnalysisEvent::Progress {
                        section: progress.index,
                        total: progress.total,
                        succeeded: progress.succeeded,
                    })
                    .is_ok()
                };
                let results = self
                    .analyzer
                    .run_sections(
                        self.document,
                        self.model,
                        self.prompts,
                        self.options,
                        &mut report_progress,
                    )
                    .await?;
                let aggregate = aggregate_or_total_failure(&results)?;
                let request = self.analyzer.consolidation_request(
                    &aggregate,
                    self.model,
                    self.prompts,
                    self.options,
                )?;
                (request, status_for(&results))
            }
        };

        let fragments = self.analyzer.client().generate_stream(&request).await?;
        let mut snapshots = SnapshotStream::new(fragments);
        let stop = snapshots.cancel_handle();
        while let Some(snapshot) = snapshots.next().await {
            let text = match snapshot {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        "Final call failed after {} characters: {e}",
                        snapshots.text().len()
                    );
                    return Err(e.into());
                }
            };
            if self.send(AnalysisEvent::Snapshot { text }).is_err() {
                stop.cancel();
            }
        }
        if stop.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let text = snapshots.into_text();
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyResponse.into());
        }

        self.send(AnalysisEvent::Done {
            analysis_id,
            status,
            text,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        })
    }
}
