use std::time::Duration;

use yuv::{YuvRange, YuvStandardMatrix};

/// Options handed to the hand detector once, at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorOptions {
    pub run_on_gpu: bool,
    pub max_num_hands: usize,
    pub static_image_mode: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            run_on_gpu: true,
            max_num_hands: 2,
            static_image_mode: true,
        }
    }
}

/// How a fingertip found in the color image is placed on the depth image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthMapping {
    /// Use the color-image pixel as a depth-image pixel unchanged.
    Direct,
    /// Rescale by the ratio of depth to color resolution.
    Scaled,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorConversion {
    pub range: YuvRange,
    pub matrix: YuvStandardMatrix,
}

impl Default for ColorConversion {
    fn default() -> Self {
        Self {
            range: YuvRange::Full,
            matrix: YuvStandardMatrix::Bt601,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub detector: DetectorOptions,
    pub depth_mapping: DepthMapping,
    pub color: ColorConversion,
    /// Minimum time between frames in `run`. `None` renders back to back.
    pub frame_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorOptions::default(),
            depth_mapping: DepthMapping::Scaled,
            color: ColorConversion::default(),
            frame_interval: None,
        }
    }
}
