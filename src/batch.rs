//! The batch extraction orchestrator.
//!
//! A batch is derived from (documents x pages x regions) at the moment the
//! run starts: work units are snapshotted up front and are immutable for the
//! run's duration, so the region store may keep changing underneath without
//! corrupting an active run.
//!
//! Units run strictly sequentially. The extraction backend is assumed to be
//! single-flight-friendly, and sequential execution also gives the consumer
//! incremental, orderly progress for free: results arrive in unit order, no
//! reordering, even when a later unit would have resolved faster.
//!
//! Cancellation is cooperative and checked at unit boundaries. An in-flight
//! extraction call is allowed to finish; once cancellation was requested, a
//! late failure must not overwrite the `Canceled` terminal status.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{SinkExt as _, StreamExt as _, channel::mpsc};

use crate::{
    async_utils::BoxedStream,
    document::{Document, DocumentKind},
    error::BatchError,
    extract::{ExtractRequest, Extractor},
    prelude::*,
    region::Region,
    store::RegionStore,
};

/// What a batch run should extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// One unit per (document, page, region) triple, for every page that
    /// has at least one region.
    Regions,
    /// One unit per (document, page), with no region restriction.
    WholePage,
}

/// Identifies a unit for display: "report.pdf - Page 2 - Region 1".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitLabel {
    /// The source document's display name.
    pub document: String,
    /// The 1-based page number; `None` for single-page documents.
    pub page: Option<u32>,
    /// The 1-based region ordinal on its page; `None` in whole-page mode.
    pub region: Option<usize>,
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)?;
        if let Some(page) = self.page {
            write!(f, " - Page {page}")?;
        }
        if let Some(region) = self.region {
            write!(f, " - Region {region}")?;
        }
        Ok(())
    }
}

/// One scheduled extraction call.
///
/// Work units are derived, not persisted: they are recomputed from the
/// region store and the loaded documents when a run starts. The region is a
/// snapshot clone, deliberately detached from the live store.
#[derive(Clone, Debug)]
pub struct WorkUnit {
    /// Index into the document list the batch was built from.
    pub document: usize,
    /// 1-based page number within that document.
    pub page: u32,
    /// The region to crop, or `None` for the whole page.
    pub region: Option<Region>,
    /// Display label for progress and results.
    pub label: UnitLabel,
}

/// A successful unit's output, emitted as soon as the unit completes.
#[derive(Clone, Debug)]
pub struct UnitResult {
    /// Which unit this came from.
    pub label: UnitLabel,
    /// The extracted text.
    pub text: String,
    /// Preview of the image that was sent to the backend.
    pub preview_png: Vec<u8>,
}

/// How a batch run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every unit was processed.
    Completed,
    /// The user stopped the run. Not a failure; already-emitted results
    /// remain valid.
    Canceled,
    /// A unit's extraction call failed. The run stops at the first failure
    /// rather than silently skipping units.
    Failed {
        /// The unit that failed.
        label: UnitLabel,
        /// Human-readable detail for the user.
        detail: String,
    },
}

/// Progress and results, streamed as the run advances.
#[derive(Clone, Debug)]
pub enum BatchEvent {
    /// A unit is about to be processed.
    UnitStarted {
        /// Zero-based position in the run.
        index: usize,
        /// Total number of units in the run.
        total: usize,
        /// The unit's display label.
        label: UnitLabel,
    },
    /// A unit finished successfully. Emitted immediately, never buffered
    /// until the end of the run.
    UnitCompleted(UnitResult),
    /// The run reached a terminal status. Always the final event.
    Finished(BatchStatus),
}

/// Cooperative cancellation flag for a batch run.
///
/// Cloneable so the UI can hold one end while the run holds the other.
/// Checked at unit boundaries; cancellation never rips an in-flight call
/// apart.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create a new, un-canceled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has cancellation been requested?
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Derive the ordered unit list for a run.
///
/// Order is significant for display: documents in upload order, pages
/// ascending within a document, regions in store order within a page.
pub fn build_work_units(
    documents: &[Document],
    store: &RegionStore,
    mode: BatchMode,
) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    for (doc_index, document) in documents.iter().enumerate() {
        let paged = document.kind() == DocumentKind::MultiPage;
        for page in 1..=document.page_count() {
            let label_page = paged.then_some(page);
            match mode {
                BatchMode::WholePage => units.push(WorkUnit {
                    document: doc_index,
                    page,
                    region: None,
                    label: UnitLabel {
                        document: document.name().to_string(),
                        page: label_page,
                        region: None,
                    },
                }),
                BatchMode::Regions => {
                    let key = document.page_key(page);
                    for (ordinal, region) in store.regions(key).iter().enumerate() {
                        units.push(WorkUnit {
                            document: doc_index,
                            page,
                            region: Some(region.clone()),
                            label: UnitLabel {
                                document: document.name().to_string(),
                                page: label_page,
                                region: Some(ordinal + 1),
                            },
                        });
                    }
                }
            }
        }
    }
    units
}

/// Run a batch, streaming [`BatchEvent`]s as units complete.
///
/// Rejects an empty unit list up front: zero units is a precondition
/// failure, not a zero-length success. The returned stream always ends with
/// exactly one [`BatchEvent::Finished`].
#[instrument(level = "debug", skip_all, fields(units = units.len()))]
pub fn run(
    documents: Arc<Vec<Document>>,
    units: Vec<WorkUnit>,
    extractor: Arc<dyn Extractor>,
    prompt: String,
    cancel: CancelHandle,
) -> Result<BoxedStream<BatchEvent>, BatchError> {
    if units.is_empty() {
        return Err(BatchError::NoWorkUnits);
    }

    let (mut tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let total = units.len();
        for (index, unit) in units.iter().enumerate() {
            if cancel.is_canceled() {
                debug!(index, "batch canceled before unit");
                emit(&mut tx, BatchEvent::Finished(BatchStatus::Canceled)).await;
                return;
            }

            let started = BatchEvent::UnitStarted {
                index,
                total,
                label: unit.label.clone(),
            };
            if !emit(&mut tx, started).await {
                return;
            }

            let request = match build_request(&documents, unit, &prompt) {
                Ok(request) => request,
                Err(err) => {
                    let status = BatchStatus::Failed {
                        label: unit.label.clone(),
                        detail: format!("{err:#}"),
                    };
                    emit(&mut tx, BatchEvent::Finished(status)).await;
                    return;
                }
            };

            let result = extractor.extract(request).await;

            // Canceled wins over anything that happened while the call was
            // in flight, including a late failure.
            if cancel.is_canceled() && result.is_err() {
                debug!(index, "discarding in-flight failure after cancellation");
                emit(&mut tx, BatchEvent::Finished(BatchStatus::Canceled)).await;
                return;
            }

            match result {
                Ok(extraction) => {
                    let completed = BatchEvent::UnitCompleted(UnitResult {
                        label: unit.label.clone(),
                        text: extraction.text,
                        preview_png: extraction.preview_png,
                    });
                    if !emit(&mut tx, completed).await {
                        return;
                    }
                }
                Err(err) => {
                    warn!(index, label = %unit.label, "unit failed: {err}");
                    let status = BatchStatus::Failed {
                        label: unit.label.clone(),
                        detail: err.to_string(),
                    };
                    emit(&mut tx, BatchEvent::Finished(status)).await;
                    return;
                }
            }
        }
        emit(&mut tx, BatchEvent::Finished(BatchStatus::Completed)).await;
    });

    Ok(rx.boxed())
}

/// Send an event, reporting whether the receiver is still listening.
async fn emit(tx: &mut mpsc::Sender<BatchEvent>, event: BatchEvent) -> bool {
    if tx.send(event).await.is_err() {
        debug!("batch event receiver dropped; stopping run");
        false
    } else {
        true
    }
}

/// Resolve a unit into an extraction request.
///
/// The region, if any, is projected at the unit's own page's native
/// resolution, not the currently-displayed viewport: a unit belonging to a
/// non-active page must use that page's own dimensions.
fn build_request(
    documents: &[Document],
    unit: &WorkUnit,
    prompt: &str,
) -> Result<ExtractRequest> {
    let document = documents
        .get(unit.document)
        .ok_or_else(|| anyhow!("work unit references unknown document {}", unit.document))?;
    let surface = document.page(unit.page).ok_or_else(|| {
        anyhow!("{} has no page {}", document.name(), unit.page)
    })?;
    let image = match &unit.region {
        Some(region) => surface.crop_png(&region.rect).with_context(|| {
            format!("failed to crop {} from {}", unit.label, document.name())
        })?,
        None => surface.encode_png().with_context(|| {
            format!("failed to encode {} of {}", unit.label, document.name())
        })?,
    };
    Ok(ExtractRequest {
        image,
        prompt: prompt.to_string(),
        filename: document.name().to_string(),
        page_number: unit.label.page,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::Duration,
    };

    use async_trait::async_trait;
    use futures::StreamExt as _;
    use image::{DynamicImage, RgbaImage};

    use super::*;
    use crate::{
        document::PageSurface,
        error::ExtractError,
        extract::Extraction,
        geometry::PctRect,
        region::PageKey,
    };

    fn surface() -> PageSurface {
        PageSurface::new(DynamicImage::ImageRgba8(RgbaImage::new(100, 100)))
    }

    fn image_doc(name: &str) -> Document {
        Document::single_page(name, surface())
    }

    fn pdf_doc(name: &str, pages: u32) -> Document {
        Document::multi_page(name, (0..pages).map(|_| surface()).collect()).unwrap()
    }

    /// A scripted extractor: returns canned text per call, with optional
    /// per-call latency, failure injection, and a cancel trigger.
    struct StubExtractor {
        calls: Mutex<usize>,
        texts: Vec<&'static str>,
        delays_ms: Vec<u64>,
        fail_on_call: Option<usize>,
        cancel_on_call: Option<(usize, CancelHandle)>,
    }

    impl StubExtractor {
        fn returning(texts: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(0),
                texts,
                delays_ms: vec![],
                fail_on_call: None,
                cancel_on_call: None,
            }
        }
    }

    #[async_trait]
    impl Extractor for StubExtractor {
        async fn extract(
            &self,
            request: ExtractRequest,
        ) -> Result<Extraction, ExtractError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let call = *calls;
                *calls += 1;
                call
            };
            if let Some(delay) = self.delays_ms.get(call) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }
            if let Some((at, cancel)) = &self.cancel_on_call
                && call == *at
            {
                cancel.cancel();
            }
            if self.fail_on_call == Some(call) {
                return Err(ExtractError {
                    filename: request.filename,
                    page_number: request.page_number,
                    detail: "backend exploded".to_string(),
                });
            }
            Ok(Extraction {
                text: self.texts.get(call).copied().unwrap_or("?").to_string(),
                preview_png: request.image,
                filename: request.filename,
            })
        }
    }

    async fn collect(stream: BoxedStream<BatchEvent>) -> Vec<BatchEvent> {
        stream.collect().await
    }

    fn result_labels(events: &[BatchEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                BatchEvent::UnitCompleted(result) => Some(result.label.to_string()),
                _ => None,
            })
            .collect()
    }

    fn terminal(events: &[BatchEvent]) -> &BatchStatus {
        match events.last() {
            Some(BatchEvent::Finished(status)) => status,
            other => panic!("expected Finished as the last event, got {other:?}"),
        }
    }

    #[test]
    fn units_follow_document_page_region_order() {
        let documents = vec![pdf_doc("a.pdf", 2), image_doc("b.png")];
        let mut store = RegionStore::new();
        store
            .create_region(PageKey::Page(1), PctRect::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        store
            .create_region(PageKey::Page(1), PctRect::new(20.0, 0.0, 10.0, 10.0))
            .unwrap();
        store
            .create_region(PageKey::Single, PctRect::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();

        let units = build_work_units(&documents, &store, BatchMode::Regions);
        let labels: Vec<String> = units.iter().map(|u| u.label.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "a.pdf - Page 1 - Region 1",
                "a.pdf - Page 1 - Region 2",
                "b.png - Region 1",
            ]
        );
    }

    #[test]
    fn whole_page_mode_ignores_regions() {
        // A 2-page document yields exactly 2 units, with labels that
        // distinguish the pages.
        let documents = vec![pdf_doc("doc.pdf", 2)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.region.is_none()));
        assert_eq!(units[0].label.to_string(), "doc.pdf - Page 1");
        assert_eq!(units[1].label.to_string(), "doc.pdf - Page 2");
    }

    #[test]
    fn units_snapshot_regions_at_build_time() {
        let documents = vec![image_doc("scan.png")];
        let mut store = RegionStore::new();
        let id = store
            .create_region(PageKey::Single, PctRect::new(10.0, 10.0, 20.0, 20.0))
            .unwrap()
            .id
            .clone();
        let units = build_work_units(&documents, &store, BatchMode::Regions);

        // Mutating the store after the snapshot must not touch the units.
        store.delete_region(&id);
        assert_eq!(units.len(), 1);
        assert_eq!(
            units[0].region.as_ref().unwrap().rect,
            PctRect::new(10.0, 10.0, 20.0, 20.0)
        );
    }

    #[tokio::test]
    async fn single_region_run_yields_one_result() {
        let documents = vec![image_doc("scan.png")];
        let mut store = RegionStore::new();
        store
            .create_region(PageKey::Single, PctRect::new(10.0, 10.0, 20.0, 20.0))
            .unwrap();
        let units = build_work_units(&documents, &store, BatchMode::Regions);
        assert_eq!(units.len(), 1);

        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(StubExtractor::returning(vec!["ABC"])),
                "read".to_string(),
                CancelHandle::new(),
            )
            .unwrap(),
        )
        .await;

        let results: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                BatchEvent::UnitCompleted(result) => Some(result),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "ABC");
        assert!(!results[0].preview_png.is_empty());
        assert_eq!(terminal(&events), &BatchStatus::Completed);
    }

    #[tokio::test]
    async fn results_arrive_in_unit_order_despite_latency_variance() {
        // Emitted labels must match the order computed at run start.
        let documents = vec![pdf_doc("doc.pdf", 3)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);
        let expected: Vec<String> = units.iter().map(|u| u.label.to_string()).collect();

        let extractor = StubExtractor {
            delays_ms: vec![30, 1, 10],
            ..StubExtractor::returning(vec!["one", "two", "three"])
        };
        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(extractor),
                "read".to_string(),
                CancelHandle::new(),
            )
            .unwrap(),
        )
        .await;

        assert_eq!(result_labels(&events), expected);
        assert_eq!(terminal(&events), &BatchStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_stops_at_the_unit_boundary() {
        // No results for units strictly after the cancellation point, and
        // the terminal status is canceled, not completed.
        let documents = vec![pdf_doc("doc.pdf", 4)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);

        let cancel = CancelHandle::new();
        let extractor = StubExtractor {
            cancel_on_call: Some((1, cancel.clone())),
            ..StubExtractor::returning(vec!["a", "b", "c", "d"])
        };
        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(extractor),
                "read".to_string(),
                cancel,
            )
            .unwrap(),
        )
        .await;

        // The in-flight unit (index 1) is allowed to finish; units 2 and 3
        // never run.
        let labels = result_labels(&events);
        assert!(labels.len() <= 2, "too many results: {labels:?}");
        assert_eq!(terminal(&events), &BatchStatus::Canceled);
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_late_failure() {
        let documents = vec![pdf_doc("doc.pdf", 3)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);

        let cancel = CancelHandle::new();
        let extractor = StubExtractor {
            cancel_on_call: Some((1, cancel.clone())),
            fail_on_call: Some(1),
            ..StubExtractor::returning(vec!["a", "b", "c"])
        };
        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(extractor),
                "read".to_string(),
                cancel,
            )
            .unwrap(),
        )
        .await;

        assert_eq!(terminal(&events), &BatchStatus::Canceled);
    }

    #[tokio::test]
    async fn first_failure_aborts_but_keeps_earlier_results() {
        let documents = vec![pdf_doc("doc.pdf", 3)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);

        let extractor = StubExtractor {
            fail_on_call: Some(1),
            ..StubExtractor::returning(vec!["a", "b", "c"])
        };
        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(extractor),
                "read".to_string(),
                CancelHandle::new(),
            )
            .unwrap(),
        )
        .await;

        assert_eq!(result_labels(&events), vec!["doc.pdf - Page 1"]);
        match terminal(&events) {
            BatchStatus::Failed { label, detail } => {
                assert_eq!(label.to_string(), "doc.pdf - Page 2");
                assert!(detail.contains("backend exploded"));
                assert!(detail.contains("page 2"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_unit_list_is_rejected_up_front() {
        let err = run(
            Arc::new(vec![]),
            vec![],
            Arc::new(StubExtractor::returning(vec![])),
            "read".to_string(),
            CancelHandle::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, BatchError::NoWorkUnits));
    }

    #[tokio::test]
    async fn progress_events_carry_index_and_total() {
        let documents = vec![pdf_doc("doc.pdf", 2)];
        let store = RegionStore::new();
        let units = build_work_units(&documents, &store, BatchMode::WholePage);

        let events = collect(
            run(
                Arc::new(documents),
                units,
                Arc::new(StubExtractor::returning(vec!["a", "b"])),
                "read".to_string(),
                CancelHandle::new(),
            )
            .unwrap(),
        )
        .await;

        let starts: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|event| match event {
                BatchEvent::UnitStarted { index, total, .. } => Some((*index, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![(0, 2), (1, 2)]);
    }
}
