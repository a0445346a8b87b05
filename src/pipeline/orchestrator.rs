use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::Receiver;

use super::{
    depth::{depth_buffer_from_image, map_to_depth, sample_depth},
    detector::HandTracker,
    mailbox::{HandMailbox, QueryMailbox},
    rgba_converter::convert_planar_image,
    source::FrameSource,
};
use crate::{
    config::PipelineConfig,
    display::{DEPTH_NOT_AVAILABLE_MESSAGE, DisplaySurface, Overlay},
    error::{FrameError, FrameResult},
    types::{DepthReading, DetectionResult, HandLandmark, RgbaFrame},
};

#[derive(Debug)]
pub enum FrameOutcome {
    Paused,
    Skipped(FrameError),
    Rendered(FrameReport),
}

#[derive(Clone, Debug)]
pub struct FrameReport {
    pub sequence: u64,
    /// Whether the detector accepted this frame's bitmap.
    pub submitted: bool,
    /// Depth sampled during this frame, if any.
    pub depth: Option<DepthReading>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rendered: u64,
    pub skipped: u64,
    pub submitted: u64,
    pub dropped_submissions: u64,
    pub depth_samples: u64,
}

/// Drives one pass of acquire → convert → detect → sample depth per
/// rendered frame. Detection results arrive on a listener thread and reach
/// the render loop only through the query mailbox.
pub struct FrameOrchestrator<S: FrameSource, D: DisplaySurface> {
    source: S,
    display: D,
    tracker: Option<HandTracker>,
    listener: Option<thread::JoinHandle<()>>,
    mailbox: QueryMailbox,
    hand: HandMailbox,
    config: PipelineConfig,
    latest_depth: Option<DepthReading>,
    paused: bool,
    stats: FrameStats,
}

impl<S: FrameSource, D: DisplaySurface> FrameOrchestrator<S, D> {
    pub fn new(
        source: S,
        display: D,
        tracker: HandTracker,
        results: Receiver<DetectionResult>,
        config: PipelineConfig,
    ) -> Self {
        let mailbox = QueryMailbox::new();
        let hand = HandMailbox::new();
        let listener = {
            let mailbox = mailbox.clone();
            let hand = hand.clone();
            thread::spawn(move || run_result_listener(results, mailbox, hand))
        };

        let options = tracker.options();
        log::info!(
            "frame pipeline started (detector on {}, up to {} hands, {:?} depth mapping)",
            if options.run_on_gpu { "gpu" } else { "cpu" },
            options.max_num_hands,
            config.depth_mapping
        );

        if !source.depth_supported() {
            log::warn!("{DEPTH_NOT_AVAILABLE_MESSAGE}");
        }

        Self {
            source,
            display,
            tracker: Some(tracker),
            listener: Some(listener),
            mailbox,
            hand,
            config,
            latest_depth: None,
            paused: false,
            stats: FrameStats::default(),
        }
    }

    pub fn render_frame(&mut self) -> FrameOutcome {
        if self.paused {
            return FrameOutcome::Paused;
        }

        match self.try_render_frame() {
            Ok(report) => {
                self.stats.rendered += 1;
                FrameOutcome::Rendered(report)
            }
            Err(err) => {
                if err.is_transient() {
                    log::debug!("camera image not ready, skipping frame");
                } else {
                    log::warn!("dropping frame: {err}");
                }
                self.stats.skipped += 1;
                FrameOutcome::Skipped(err)
            }
        }
    }

    /// Renders until `stop` is set or `max_frames` frames (skipped ones
    /// included) have gone by, keeping at least `frame_interval` between
    /// frames when one is configured.
    pub fn run(&mut self, max_frames: Option<u64>, stop: &AtomicBool) -> FrameStats {
        let mut frames = 0u64;
        while !stop.load(Ordering::Relaxed) {
            if max_frames.is_some_and(|max| frames >= max) {
                break;
            }
            let started = Instant::now();
            self.render_frame();
            frames += 1;
            if let Some(interval) = self.config.frame_interval {
                if let Some(rest) = interval.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }
        log::info!(
            "render loop finished: {} rendered, {} skipped, {} depth samples",
            self.stats.rendered,
            self.stats.skipped,
            self.stats.depth_samples
        );
        self.stats.clone()
    }

    pub fn pause(&mut self) {
        log::info!("pausing frame pipeline");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        log::info!("resuming frame pipeline");
        self.paused = false;
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        self.display.viewport_changed(width, height);
    }

    pub fn mailbox(&self) -> &QueryMailbox {
        &self.mailbox
    }

    pub fn latest_depth(&self) -> Option<DepthReading> {
        self.latest_depth
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn try_render_frame(&mut self) -> FrameResult<FrameReport> {
        // Color and depth arrive independently; a color image that is not
        // ready yet still leaves this frame's depth lookup to run.
        let frame = match self.acquire_color_frame() {
            Ok(frame) => Some(Arc::new(frame)),
            Err(FrameError::NotReady) => None,
            Err(err) => return Err(err),
        };

        let submitted = frame.as_ref().is_some_and(|frame| self.submit(frame));

        let depth_supported = self.source.depth_supported();
        let depth = if depth_supported {
            self.sample_depth_at_query()
        } else {
            None
        };

        let Some(frame) = frame else {
            return Err(FrameError::NotReady);
        };

        let overlay = Overlay {
            hand: self.hand.latest(),
            fingertip: self.mailbox.latest(),
            depth: self.latest_depth,
            status: (!depth_supported).then_some(DEPTH_NOT_AVAILABLE_MESSAGE),
        };
        self.display.present(&frame, &overlay);

        Ok(FrameReport {
            sequence: frame.sequence,
            submitted,
            depth,
        })
    }

    fn acquire_color_frame(&mut self) -> FrameResult<RgbaFrame> {
        let image = self.source.acquire_color_image()?;
        convert_planar_image(&image, self.config.color)
    }

    fn submit(&mut self, frame: &Arc<RgbaFrame>) -> bool {
        let submitted = self
            .tracker
            .as_ref()
            .is_some_and(|tracker| tracker.submit(frame.clone()));
        if submitted {
            self.stats.submitted += 1;
        } else {
            self.stats.dropped_submissions += 1;
            log::debug!("detector busy, frame {} not submitted", frame.sequence);
        }
        submitted
    }

    fn sample_depth_at_query(&mut self) -> Option<DepthReading> {
        let image = match self.source.acquire_depth_image() {
            Ok(image) => image,
            Err(FrameError::NotReady) => {
                log::debug!("depth image not ready");
                return None;
            }
            Err(err) => {
                log::warn!("failed to acquire depth image: {err}");
                return None;
            }
        };

        let depth = match depth_buffer_from_image(&image) {
            Ok(depth) => depth,
            Err(err) => {
                log::warn!("unusable depth image: {err}");
                return None;
            }
        };
        drop(image);

        let query = self.mailbox.latest()?;
        let (x, y) = map_to_depth(&query, self.config.depth_mapping, depth.width, depth.height);
        match sample_depth(&depth, x, y) {
            Ok(sample) => {
                let reading = DepthReading {
                    x,
                    y,
                    sample,
                    query_sequence: query.sequence,
                };
                log::debug!("fingertip depth at ({x}, {y}): {}", reading.display_text());
                self.latest_depth = Some(reading);
                self.stats.depth_samples += 1;
                Some(reading)
            }
            Err(err) => {
                log::warn!("skipping depth lookup: {err}");
                None
            }
        }
    }
}

impl<S: FrameSource, D: DisplaySurface> Drop for FrameOrchestrator<S, D> {
    fn drop(&mut self) {
        // Stopping the detector closes the result channel, which ends the
        // listener.
        self.tracker.take();
        if let Some(listener) = self.listener.take() {
            if listener.join().is_err() {
                log::error!("detection listener panicked");
            }
        }
    }
}

fn run_result_listener(
    results: Receiver<DetectionResult>,
    mailbox: QueryMailbox,
    hand: HandMailbox,
) {
    while let Ok(result) = results.recv() {
        on_detection_result(&result, &mailbox, &hand);
    }
}

/// Publishes the first hand's index fingertip as the new depth query point
/// and its landmarks for drawing. Results without hands leave the previous
/// point in place and clear the drawn hand.
pub fn on_detection_result(
    result: &DetectionResult,
    mailbox: &QueryMailbox,
    hand: &HandMailbox,
) {
    if result.is_empty() {
        hand.clear();
        return;
    }
    log_wrist_landmark(result, true);
    if let Some(tracked) = result.tracked_hand() {
        hand.post(tracked);
    }
    match result.index_fingertip() {
        Some(tip) if tip.x.is_finite() && tip.y.is_finite() => mailbox.post(tip),
        Some(tip) => log::warn!(
            "ignoring fingertip ({}, {}) from frame {}",
            tip.x,
            tip.y,
            tip.sequence
        ),
        None => {}
    }
}

fn log_wrist_landmark(result: &DetectionResult, show_pixel_values: bool) {
    let Some(hand) = result.hands.first() else {
        return;
    };

    if let Some(wrist) = hand.landmark(HandLandmark::Wrist) {
        if show_pixel_values {
            let (x, y) = wrist.to_pixels(result.input_width, result.input_height);
            log::info!("hand wrist coordinates (pixel values): x={x:.1}, y={y:.1}");
        } else {
            log::info!(
                "hand wrist normalized coordinates (value range: [0, 1]): x={:.3}, y={:.3}",
                wrist.x,
                wrist.y
            );
        }
    }

    if let Some(world) = hand.world_landmark(HandLandmark::Wrist) {
        log::info!(
            "hand wrist world coordinates (meters, origin at the hand's approximate \
             geometric center): x={:.3} m, y={:.3} m, z={:.3} m",
            world.x,
            world.y,
            world.z
        );
    }
}
