use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::expression::domain::detection::FaceDetection;
use crate::expression::domain::expression_classifier::ExpressionClassifier;
use crate::expression::domain::expression_selector;
use crate::overlay::domain::display_mapper::{DisplayMapper, DisplaySize};
use crate::overlay::domain::overlay_positioner;
use crate::overlay::domain::render_sink::{DrawingSurface, SymbolSink};
use crate::sampling::session::{
    AnnotationSession, PhaseError, RenderCommand, TickObservation,
};
use crate::sampling::tick_logger::TickLogger;
use crate::shared::constants::TICK_PERIOD;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("failed to acquire frame source: {0}")]
    Acquire(#[source] CaptureError),
    #[error("classifier worker exited unexpectedly")]
    WorkerGone,
}

/// Tuning for one session run.
#[derive(Clone)]
pub struct LoopConfig {
    pub tick_period: Duration,
    /// Stop after this many scheduled ticks; `None` runs until the
    /// source exhausts or `cancelled` is raised.
    pub max_ticks: Option<u64>,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_period: TICK_PERIOD,
            max_ticks: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Counters for one completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Ticks the ticker fired and the loop acted on.
    pub ticks_scheduled: u64,
    /// Results that updated the session and reached the sinks.
    pub committed: u64,
    /// Results rejected by the sequence/stop guard.
    pub discarded: u64,
    /// Capture or inference failures (tick skipped, loop continued).
    pub failed: u64,
    /// Ticks dropped because the classifier was still busy.
    pub lagged: u64,
}

struct ClassifyJob {
    seq: u64,
    frame: Frame,
}

struct ClassifyReport {
    seq: u64,
    elapsed_ms: f64,
    outcome: Result<Vec<FaceDetection>, String>,
}

/// Drives the sense → decide → render cycle.
///
/// Owns every collaborator as a boxed port. Inference runs on a
/// dedicated worker thread so a slow model never blocks the ticker;
/// results come back tagged with their tick sequence number and go
/// through [`AnnotationSession::commit`], which rejects anything stale
/// or post-stop before it can reach a sink.
pub struct SamplingLoopController {
    classifier: Option<Box<dyn ExpressionClassifier>>,
    source: Box<dyn FrameSource>,
    surface: Box<dyn DrawingSurface>,
    sink: Box<dyn SymbolSink>,
    logger: Box<dyn TickLogger>,
    config: LoopConfig,
    display: Option<DisplaySize>,
    mapper: Option<DisplayMapper>,
    session: AnnotationSession,
}

impl SamplingLoopController {
    /// `display: None` sizes the display 1:1 with the source's native
    /// dimensions once they are known.
    pub fn new(
        classifier: Box<dyn ExpressionClassifier>,
        source: Box<dyn FrameSource>,
        surface: Box<dyn DrawingSurface>,
        sink: Box<dyn SymbolSink>,
        logger: Box<dyn TickLogger>,
        display: Option<DisplaySize>,
        config: LoopConfig,
    ) -> Self {
        Self {
            classifier: Some(classifier),
            source,
            surface,
            sink,
            logger,
            config,
            display,
            mapper: None,
            session: AnnotationSession::new(),
        }
    }

    /// Raise this flag to stop the loop from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.config.cancelled.clone()
    }

    /// Acquire the frame source and fix the display geometry.
    ///
    /// Failure here is fatal to the session: the loop never starts and
    /// the error goes to the embedder.
    pub fn start(&mut self) -> Result<(), LoopError> {
        self.session.begin_acquire()?;

        let meta = self.source.open().map_err(LoopError::Acquire)?;
        let display = self.display.unwrap_or(DisplaySize {
            width: meta.width,
            height: meta.height,
        });
        self.mapper = Some(DisplayMapper::new(meta.width, meta.height, display));

        self.session.mark_ready()?;
        self.logger.info(&format!(
            "source ready: {}x{} native, {}x{} display",
            meta.width, meta.height, display.width, display.height
        ));
        Ok(())
    }

    /// Run ticks until the source exhausts, `max_ticks` is reached, or
    /// the stop flag is raised. Returns the run's counters.
    pub fn run(&mut self) -> Result<SessionSummary, LoopError> {
        let initial = self.session.begin_running()?;
        self.present(&initial);

        let classifier = self
            .classifier
            .take()
            .expect("classifier is present until the first run");

        let halted = Arc::new(AtomicBool::new(false));
        let (job_tx, job_rx) = bounded::<ClassifyJob>(2);
        let (report_tx, report_rx) = bounded::<ClassifyReport>(4);
        let worker = spawn_classifier_worker(classifier, job_rx, report_tx, halted.clone());

        let ticker = tick(self.config.tick_period);
        let mut summary = SessionSummary::default();
        let mut next_seq: u64 = 0;
        let mut outstanding: u64 = 0;
        let mut worker_gone = false;

        loop {
            if self.config.cancelled.load(Ordering::Relaxed) {
                self.logger.info("stop requested");
                break;
            }

            select! {
                recv(ticker) -> _ => {
                    if self.config.max_ticks.is_some_and(|m| next_seq >= m) {
                        if outstanding == 0 {
                            break;
                        }
                        continue;
                    }

                    next_seq += 1;
                    summary.ticks_scheduled += 1;
                    self.logger.tick(next_seq);

                    match self.source.current_frame() {
                        Ok(frame) => {
                            match job_tx.try_send(ClassifyJob { seq: next_seq, frame }) {
                                Ok(()) => outstanding += 1,
                                Err(TrySendError::Full(_)) => {
                                    summary.lagged += 1;
                                    log::debug!("classifier busy, tick {next_seq} dropped");
                                }
                                Err(TrySendError::Disconnected(_)) => {
                                    worker_gone = true;
                                    break;
                                }
                            }
                        }
                        Err(CaptureError::Exhausted) => {
                            self.logger.info("frame source exhausted");
                            break;
                        }
                        Err(e) => {
                            summary.failed += 1;
                            log::warn!("tick {next_seq} capture failed: {e}");
                        }
                    }
                }
                recv(report_rx) -> msg => {
                    match msg {
                        Ok(report) => {
                            outstanding -= 1;
                            self.handle_report(report, &mut summary);
                            if self.config.max_ticks.is_some_and(|m| next_seq >= m)
                                && outstanding == 0
                            {
                                break;
                            }
                        }
                        Err(_) => {
                            worker_gone = true;
                            break;
                        }
                    }
                }
            }
        }

        // Teardown: no classify call may start after this point, and no
        // result that arrives from here on reaches a sink.
        self.session.stop();
        halted.store(true, Ordering::Relaxed);
        drop(job_tx);

        for report in report_rx {
            summary.discarded += 1;
            log::debug!("discarding late result for tick {}", report.seq);
        }

        match worker.join() {
            Ok(classifier) => self.classifier = Some(classifier),
            Err(_) => worker_gone = true,
        }
        self.source.close();
        self.logger.summary();

        if worker_gone {
            return Err(LoopError::WorkerGone);
        }
        Ok(summary)
    }

    fn handle_report(&mut self, report: ClassifyReport, summary: &mut SessionSummary) {
        self.logger.timing("classify", report.elapsed_ms);

        let detections = match report.outcome {
            Ok(detections) => detections,
            Err(message) => {
                summary.failed += 1;
                log::warn!("tick {} inference failed: {message}", report.seq);
                return;
            }
        };
        self.logger.metric("faces", detections.len() as f64);

        let observation = match detections.first() {
            Some(primary) => {
                let mapper = self
                    .mapper
                    .as_ref()
                    .expect("display geometry is fixed in start()");
                let mapped = mapper.map_box(&primary.face_box);
                let (_, glyph) = expression_selector::select(&primary.scores);
                TickObservation::Face {
                    glyph,
                    anchor: overlay_positioner::anchor_for(&mapped),
                }
            }
            None => TickObservation::NoFace,
        };

        match self.session.commit(report.seq, observation) {
            Some(command) => {
                summary.committed += 1;
                if let Err(e) = self.surface.clear() {
                    log::warn!("surface clear failed: {e}");
                }
                self.present(&command);
            }
            None => summary.discarded += 1,
        }
    }

    fn present(&mut self, command: &RenderCommand) {
        if let Err(e) = self.sink.present(command.glyph, command.anchor) {
            log::warn!("symbol sink write failed: {e}");
        }
    }
}

fn spawn_classifier_worker(
    mut classifier: Box<dyn ExpressionClassifier>,
    jobs: Receiver<ClassifyJob>,
    reports: Sender<ClassifyReport>,
    halted: Arc<AtomicBool>,
) -> thread::JoinHandle<Box<dyn ExpressionClassifier>> {
    thread::spawn(move || {
        for job in jobs {
            if halted.load(Ordering::Relaxed) {
                break;
            }
            let started = Instant::now();
            let outcome = classifier.classify(&job.frame).map_err(|e| e.to_string());
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let report = ClassifyReport {
                seq: job.seq,
                elapsed_ms,
                outcome,
            };
            if reports.send(report).is_err() {
                break;
            }
        }
        classifier
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::expression::domain::expression::{Expression, ExpressionScores};
    use crate::overlay::domain::overlay_positioner::AnchorPoint;
    use crate::sampling::tick_logger::NullTickLogger;
    use crate::shared::capture_metadata::CaptureMetadata;
    use crate::shared::face_box::FaceBox;

    // --- Stubs ---

    struct ScriptedClassifier {
        script: VecDeque<Result<Vec<FaceDetection>, String>>,
        delay: Duration,
    }

    impl ScriptedClassifier {
        fn new(script: Vec<Result<Vec<FaceDetection>, String>>) -> Self {
            Self {
                script: script.into(),
                delay: Duration::ZERO,
            }
        }

        fn slow(script: Vec<Result<Vec<FaceDetection>, String>>, delay: Duration) -> Self {
            Self {
                script: script.into(),
                delay,
            }
        }
    }

    impl ExpressionClassifier for ScriptedClassifier {
        fn classify(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            match self.script.pop_front() {
                Some(Ok(detections)) => Ok(detections),
                Some(Err(message)) => Err(message.into()),
                None => Ok(Vec::new()),
            }
        }
    }

    struct ScriptedSource {
        width: u32,
        height: u32,
        script: VecDeque<Result<(), String>>,
    }

    impl ScriptedSource {
        /// `frames` successful frames, then exhaustion.
        fn with_frames(frames: usize) -> Self {
            Self {
                width: 100,
                height: 100,
                script: std::iter::repeat_with(|| Ok(())).take(frames).collect(),
            }
        }

        fn with_script(script: Vec<Result<(), String>>) -> Self {
            Self {
                width: 100,
                height: 100,
                script: script.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<CaptureMetadata, CaptureError> {
            Ok(CaptureMetadata {
                width: self.width,
                height: self.height,
                fps: 30.0,
                source_path: None,
            })
        }

        fn current_frame(&mut self) -> Result<Frame, CaptureError> {
            match self.script.pop_front() {
                Some(Ok(())) => Ok(Frame::new(
                    vec![0u8; (self.width * self.height * 3) as usize],
                    self.width,
                    self.height,
                    3,
                )),
                Some(Err(message)) => Err(CaptureError::Decode(message)),
                None => Err(CaptureError::Exhausted),
            }
        }

        fn close(&mut self) {}
    }

    type WriteLog = Arc<Mutex<Vec<(String, Option<AnchorPoint>)>>>;

    struct RecordingSink {
        writes: WriteLog,
    }

    impl SymbolSink for RecordingSink {
        fn present(
            &mut self,
            glyph: &str,
            anchor: Option<AnchorPoint>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.writes.lock().unwrap().push((glyph.to_string(), anchor));
            Ok(())
        }
    }

    struct CountingSurface {
        clears: Arc<Mutex<usize>>,
    }

    impl DrawingSurface for CountingSurface {
        fn clear(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.clears.lock().unwrap() += 1;
            Ok(())
        }
    }

    // --- Helpers ---

    fn face_at(x: f64, y: f64, w: f64, h: f64, expression: Expression) -> FaceDetection {
        let mut scores = ExpressionScores::default();
        scores.set(expression, 0.9);
        FaceDetection::new(FaceBox::new(x, y, w, h), None, scores)
    }

    #[allow(clippy::type_complexity)]
    fn controller(
        classifier: ScriptedClassifier,
        source: ScriptedSource,
        display: Option<DisplaySize>,
        max_ticks: Option<u64>,
    ) -> (SamplingLoopController, WriteLog, Arc<Mutex<usize>>) {
        let writes: WriteLog = Arc::new(Mutex::new(Vec::new()));
        let clears = Arc::new(Mutex::new(0));
        let config = LoopConfig {
            tick_period: Duration::from_millis(5),
            max_ticks,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let controller = SamplingLoopController::new(
            Box::new(classifier),
            Box::new(source),
            Box::new(CountingSurface {
                clears: clears.clone(),
            }),
            Box::new(RecordingSink {
                writes: writes.clone(),
            }),
            Box::new(NullTickLogger),
            display,
            config,
        );
        (controller, writes, clears)
    }

    // --- Tests ---

    #[test]
    fn test_run_before_start_is_phase_error() {
        let (mut c, _writes, _) = controller(
            ScriptedClassifier::new(vec![]),
            ScriptedSource::with_frames(0),
            None,
            None,
        );
        assert!(matches!(c.run(), Err(LoopError::Phase(_))));
    }

    #[test]
    fn test_start_twice_is_phase_error() {
        let (mut c, _writes, _) = controller(
            ScriptedClassifier::new(vec![]),
            ScriptedSource::with_frames(0),
            None,
            None,
        );
        c.start().unwrap();
        assert!(matches!(c.start(), Err(LoopError::Phase(_))));
    }

    #[test]
    fn test_initial_render_is_neutral_unanchored() {
        let (mut c, writes, _) = controller(
            ScriptedClassifier::new(vec![]),
            ScriptedSource::with_frames(0),
            None,
            None,
        );
        c.start().unwrap();
        c.run().unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes[0], ("😐".to_string(), None));
    }

    #[test]
    fn test_face_tick_presents_glyph_at_anchor() {
        let (mut c, writes, clears) = controller(
            ScriptedClassifier::new(vec![Ok(vec![face_at(
                100.0,
                100.0,
                50.0,
                50.0,
                Expression::Happy,
            )])]),
            ScriptedSource::with_frames(5),
            None,
            Some(1),
        );
        c.start().unwrap();
        let summary = c.run().unwrap();

        assert_eq!(summary.ticks_scheduled, 1);
        assert_eq!(summary.committed, 1);

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 2); // initial + one tick
        assert_eq!(
            writes[1],
            (
                "😄".to_string(),
                Some(AnchorPoint {
                    left: 93.0,
                    top: 40.0
                })
            )
        );
        assert_eq!(*clears.lock().unwrap(), 1);
    }

    #[test]
    fn test_display_scale_applied_before_anchoring() {
        // Native 100x100, display 200x200: box (10,10,20,20) maps to
        // (20,20,40,40) → anchor (20+20-32, 20-60) = (8, -40)
        let (mut c, writes, _) = controller(
            ScriptedClassifier::new(vec![Ok(vec![face_at(
                10.0,
                10.0,
                20.0,
                20.0,
                Expression::Surprised,
            )])]),
            ScriptedSource::with_frames(5),
            Some(DisplaySize {
                width: 200,
                height: 200,
            }),
            Some(1),
        );
        c.start().unwrap();
        c.run().unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(
            writes[1],
            (
                "😮".to_string(),
                Some(AnchorPoint {
                    left: 8.0,
                    top: -40.0
                })
            )
        );
    }

    #[test]
    fn test_no_face_falls_back_to_neutral_keeping_anchor() {
        let (mut c, writes, _) = controller(
            ScriptedClassifier::new(vec![
                Ok(vec![face_at(100.0, 100.0, 50.0, 50.0, Expression::Happy)]),
                Ok(vec![]),
            ]),
            ScriptedSource::with_frames(5),
            None,
            Some(2),
        );
        c.start().unwrap();
        let summary = c.run().unwrap();

        assert_eq!(summary.committed, 2);
        let writes = writes.lock().unwrap();
        assert_eq!(writes[1].0, "😄");
        // Fallback write carries no anchor — placement stays put
        assert_eq!(writes[2], ("😐".to_string(), None));
    }

    #[test]
    fn test_primary_detection_is_first() {
        let (mut c, writes, _) = controller(
            ScriptedClassifier::new(vec![Ok(vec![
                face_at(100.0, 100.0, 50.0, 50.0, Expression::Angry),
                face_at(300.0, 300.0, 50.0, 50.0, Expression::Happy),
            ])]),
            ScriptedSource::with_frames(5),
            None,
            Some(1),
        );
        c.start().unwrap();
        c.run().unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes[1].0, "😡");
    }

    #[test]
    fn test_inference_failure_skips_tick_and_continues() {
        let (mut c, writes, clears) = controller(
            ScriptedClassifier::new(vec![
                Err("model exploded".to_string()),
                Ok(vec![face_at(100.0, 100.0, 50.0, 50.0, Expression::Sad)]),
            ]),
            ScriptedSource::with_frames(5),
            None,
            Some(2),
        );
        c.start().unwrap();
        let summary = c.run().unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.committed, 1);

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 2); // initial + the one good tick
        assert_eq!(writes[1].0, "🙁");
        // Failed tick never cleared the surface either
        assert_eq!(*clears.lock().unwrap(), 1);
    }

    #[test]
    fn test_capture_failure_skips_tick_and_continues() {
        let (mut c, _writes, _) = controller(
            ScriptedClassifier::new(vec![Ok(vec![face_at(
                100.0,
                100.0,
                50.0,
                50.0,
                Expression::Happy,
            )])]),
            ScriptedSource::with_script(vec![Err("bus glitch".to_string()), Ok(())]),
            None,
            Some(2),
        );
        c.start().unwrap();
        let summary = c.run().unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.committed, 1);
    }

    #[test]
    fn test_no_sink_write_after_stop() {
        // Classifier far slower than the tick: its result lands only
        // after the stop flag has torn the session down.
        let (mut c, writes, _) = controller(
            ScriptedClassifier::slow(
                vec![Ok(vec![face_at(
                    100.0,
                    100.0,
                    50.0,
                    50.0,
                    Expression::Happy,
                )])],
                Duration::from_millis(150),
            ),
            ScriptedSource::with_frames(50),
            None,
            None,
        );
        c.start().unwrap();
        let cancel = c.stop_handle();

        let runner = thread::spawn(move || c.run().unwrap());
        thread::sleep(Duration::from_millis(40));
        cancel.store(true, Ordering::Relaxed);
        let summary = runner.join().unwrap();

        let writes = writes.lock().unwrap();
        // Only the initial neutral render ever reached the sink
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "😐");
        assert!(summary.discarded >= 1);
        assert_eq!(summary.committed, 0);
    }

    #[test]
    fn test_source_exhaustion_ends_run() {
        let (mut c, _writes, _) = controller(
            ScriptedClassifier::new(vec![]),
            ScriptedSource::with_frames(2),
            None,
            None,
        );
        c.start().unwrap();
        let summary = c.run().unwrap();
        // Two frames served, third tick hit exhaustion
        assert_eq!(summary.ticks_scheduled, 3);
    }

    #[test]
    fn test_summary_counts_scheduled_ticks() {
        let (mut c, _writes, _) = controller(
            ScriptedClassifier::new(vec![]),
            ScriptedSource::with_frames(10),
            None,
            Some(4),
        );
        c.start().unwrap();
        let summary = c.run().unwrap();
        assert_eq!(summary.ticks_scheduled, 4);
        assert_eq!(summary.committed, 4);
        assert_eq!(summary.failed, 0);
    }
}
