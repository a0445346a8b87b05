pub mod depth;
pub mod detector;
pub mod mailbox;
pub mod orchestrator;
pub mod rgba_converter;
pub mod source;

// Re-exports for convenience
pub use depth::{depth_buffer_from_image, map_to_depth, sample_depth};
pub use detector::{
    DetectorBackend, FixedPoseEngine, HandTracker, HandposeEngine, PlaceholderEngine,
    open_palm_hand, start_detector,
};
pub use mailbox::{HandMailbox, Mailbox, QueryMailbox};
pub use orchestrator::{
    FrameOrchestrator, FrameOutcome, FrameReport, FrameStats, on_detection_result,
};
pub use rgba_converter::{convert_planar_image, rgba_to_planar, to_interleaved, to_rgba};
pub use source::{Acquired, FrameSource, StillImageSource, load_color_image, load_depth_image};
