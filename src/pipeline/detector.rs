use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    config::DetectorOptions,
    error::{FrameError, FrameResult},
    types::{
        DetectionResult, Hand, HandLandmark, LandmarkPoint, NUM_LANDMARKS, RgbaFrame,
        WorldLandmark,
    },
};

/// The hand landmark model behind the tracker. Implementations run on the
/// tracker's worker thread, one frame at a time.
pub trait HandposeEngine: Send + 'static {
    fn detect(&mut self, frame: &RgbaFrame) -> FrameResult<DetectionResult>;

    fn label(&self) -> &'static str;
}

#[derive(Clone, Debug, Default)]
pub enum DetectorBackend {
    /// Never finds a hand.
    #[default]
    Placeholder,
    /// Reports the same hands for every frame.
    FixedPose { hands: Vec<Hand> },
}

type ErrorListener = Box<dyn FnMut(&FrameError) + Send>;

/// Submission side of the detection worker. Frames go in through a
/// single-slot channel without blocking; results come out on the receiver
/// returned by [`HandTracker::start`], where an unread result is replaced by
/// a newer one.
pub struct HandTracker {
    frame_tx: Option<Sender<Arc<RgbaFrame>>>,
    handle: Option<thread::JoinHandle<()>>,
    options: DetectorOptions,
}

impl HandTracker {
    pub fn start<E: HandposeEngine>(
        engine: E,
        options: DetectorOptions,
    ) -> (Self, Receiver<DetectionResult>) {
        Self::start_with_error_listener(engine, options, |err| {
            log::error!("hand detector error: {err}");
        })
    }

    pub fn start_with_error_listener<E, F>(
        engine: E,
        options: DetectorOptions,
        on_error: F,
    ) -> (Self, Receiver<DetectionResult>)
    where
        E: HandposeEngine,
        F: FnMut(&FrameError) + Send + 'static,
    {
        log::info!(
            "starting hand detector: {} (gpu: {}, max hands: {}, static image mode: {})",
            engine.label(),
            options.run_on_gpu,
            options.max_num_hands,
            options.static_image_mode
        );

        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);
        let stale_rx = result_rx.clone();
        let max_hands = options.max_num_hands;
        let on_error: ErrorListener = Box::new(on_error);

        let handle = thread::spawn(move || {
            run_worker_loop(engine, max_hands, frame_rx, result_tx, stale_rx, on_error);
        });

        let tracker = Self {
            frame_tx: Some(frame_tx),
            handle: Some(handle),
            options,
        };
        (tracker, result_rx)
    }

    /// Hands a frame to the worker. Returns `false` when the worker is still
    /// busy with an earlier frame and this one was dropped.
    pub fn submit(&self, frame: Arc<RgbaFrame>) -> bool {
        match &self.frame_tx {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }
}

impl Drop for HandTracker {
    fn drop(&mut self) {
        // Closing the input channel ends the worker loop.
        self.frame_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("hand detector worker panicked");
            }
        }
    }
}

pub fn start_detector(
    backend: DetectorBackend,
    options: DetectorOptions,
) -> (HandTracker, Receiver<DetectionResult>) {
    match backend {
        DetectorBackend::Placeholder => HandTracker::start(PlaceholderEngine, options),
        DetectorBackend::FixedPose { hands } => {
            HandTracker::start(FixedPoseEngine::new(hands), options)
        }
    }
}

fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    max_hands: usize,
    frame_rx: Receiver<Arc<RgbaFrame>>,
    result_tx: Sender<DetectionResult>,
    stale_rx: Receiver<DetectionResult>,
    mut on_error: ErrorListener,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        match engine.detect(&frame) {
            Ok(mut result) => {
                result.hands.truncate(max_hands);
                publish_latest(&result_tx, &stale_rx, result);
            }
            Err(err) => {
                let err = match err {
                    FrameError::DetectorFailure(_) => err,
                    other => FrameError::DetectorFailure(other.to_string()),
                };
                on_error(&err);
            }
        }
    }
    log::debug!("hand detector worker stopped");
}

fn recv_latest_frame(frame_rx: &Receiver<Arc<RgbaFrame>>) -> Option<Arc<RgbaFrame>> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

fn publish_latest(
    result_tx: &Sender<DetectionResult>,
    stale_rx: &Receiver<DetectionResult>,
    result: DetectionResult,
) {
    match result_tx.try_send(result) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(result)) => {
            // Nobody picked up the previous result; the new one wins.
            let _ = stale_rx.try_recv();
            let _ = result_tx.try_send(result);
        }
    }
}

pub struct PlaceholderEngine;

impl HandposeEngine for PlaceholderEngine {
    fn detect(&mut self, frame: &RgbaFrame) -> FrameResult<DetectionResult> {
        Ok(DetectionResult::empty(frame))
    }

    fn label(&self) -> &'static str {
        "placeholder"
    }
}

pub struct FixedPoseEngine {
    hands: Vec<Hand>,
}

impl FixedPoseEngine {
    pub fn new(hands: Vec<Hand>) -> Self {
        Self { hands }
    }
}

impl HandposeEngine for FixedPoseEngine {
    fn detect(&mut self, frame: &RgbaFrame) -> FrameResult<DetectionResult> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.rgba.len() != expected {
            return Err(FrameError::DetectorFailure(format!(
                "frame buffer size mismatch: got {}, expected {expected}",
                frame.rgba.len()
            )));
        }

        Ok(DetectionResult {
            hands: self.hands.clone(),
            sequence: frame.sequence,
            input_width: frame.width,
            input_height: frame.height,
        })
    }

    fn label(&self) -> &'static str {
        "fixed-pose"
    }
}

// Right hand, palm facing the camera, fingers up. Offsets from the wrist in
// units of hand length, y pointing down.
const OPEN_PALM: [(f32, f32); NUM_LANDMARKS] = [
    (0.0, 0.0),
    (-0.10, -0.08),
    (-0.18, -0.16),
    (-0.24, -0.24),
    (-0.29, -0.31),
    (-0.08, -0.36),
    (-0.09, -0.52),
    (-0.10, -0.62),
    (-0.10, -0.72),
    (0.0, -0.38),
    (0.0, -0.56),
    (0.0, -0.67),
    (0.0, -0.78),
    (0.08, -0.35),
    (0.09, -0.51),
    (0.10, -0.61),
    (0.10, -0.70),
    (0.15, -0.30),
    (0.18, -0.42),
    (0.20, -0.50),
    (0.22, -0.57),
];

const HAND_LENGTH_METERS: f32 = 0.18;

/// An open palm whose index fingertip lands on `tip` (normalized image
/// coordinates). `scale` is the hand length as a fraction of the image.
pub fn open_palm_hand(tip: (f32, f32), scale: f32) -> Hand {
    let anchor = OPEN_PALM[HandLandmark::IndexFingerTip.index()];
    let wrist = (tip.0 - anchor.0 * scale, tip.1 - anchor.1 * scale);

    let landmarks = OPEN_PALM
        .iter()
        .map(|(dx, dy)| LandmarkPoint::new(wrist.0 + dx * scale, wrist.1 + dy * scale, 0.0))
        .collect();

    let (sum_x, sum_y) = OPEN_PALM
        .iter()
        .fold((0.0f32, 0.0f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    let center = (sum_x / NUM_LANDMARKS as f32, sum_y / NUM_LANDMARKS as f32);
    let world_landmarks = OPEN_PALM
        .iter()
        .map(|(dx, dy)| WorldLandmark {
            x: (dx - center.0) * HAND_LENGTH_METERS,
            y: (dy - center.1) * HAND_LENGTH_METERS,
            z: 0.0,
        })
        .collect();

    Hand {
        landmarks,
        world_landmarks,
        handedness: 1.0,
    }
}
