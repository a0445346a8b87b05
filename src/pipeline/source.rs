use std::{
    ops::Deref,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use anyhow::{Context, Result, anyhow};

use super::rgba_converter::rgba_to_planar;
use crate::{
    error::{FrameError, FrameResult},
    types::{DepthBuffer16, PlanarImage},
};

/// Camera and depth provider, queried once per rendered frame.
pub trait FrameSource {
    fn acquire_color_image(&mut self) -> FrameResult<Acquired<PlanarImage>>;

    /// A single-plane `Depth16` image.
    fn acquire_depth_image(&mut self) -> FrameResult<Acquired<PlanarImage>>;

    fn depth_supported(&self) -> bool;
}

/// An image handle borrowed from the provider. The release hook runs when the
/// guard is dropped, whichever way the frame ends.
pub struct Acquired<T> {
    image: T,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Acquired<T> {
    pub fn with_release<F>(image: T, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            image,
            release: Some(Box::new(release)),
        }
    }
}

impl<T> Deref for Acquired<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.image
    }
}

impl<T> Drop for Acquired<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Replays one still color image (and optionally one depth image) as a live
/// camera. The first `warmup_frames` acquisitions report `NotReady`, the way
/// a tracking session does before its first frame.
pub struct StillImageSource {
    color: PlanarImage,
    depth: Option<PlanarImage>,
    warmup_frames: usize,
    sequence: u64,
    open_handles: Arc<AtomicUsize>,
}

impl StillImageSource {
    pub fn new(color: PlanarImage, depth: Option<DepthBuffer16>) -> Self {
        Self {
            color,
            depth: depth.map(|depth| depth.into_image(0)),
            warmup_frames: 0,
            sequence: 0,
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_paths(color_path: &Path, depth_path: Option<&Path>) -> Result<Self> {
        let color = load_color_image(color_path)?;
        let depth = depth_path.map(load_depth_image).transpose()?;
        Ok(Self::new(color, depth))
    }

    pub fn with_warmup_frames(mut self, frames: usize) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Handles acquired but not yet released.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    fn track<T>(&self, image: T) -> Acquired<T> {
        let open = self.open_handles.clone();
        open.fetch_add(1, Ordering::SeqCst);
        Acquired::with_release(image, move || {
            open.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

impl FrameSource for StillImageSource {
    fn acquire_color_image(&mut self) -> FrameResult<Acquired<PlanarImage>> {
        if self.warmup_frames > 0 {
            self.warmup_frames -= 1;
            return Err(FrameError::NotReady);
        }

        self.sequence += 1;
        let mut image = self.color.clone();
        image.sequence = self.sequence;
        image.timestamp = Instant::now();
        Ok(self.track(image))
    }

    fn acquire_depth_image(&mut self) -> FrameResult<Acquired<PlanarImage>> {
        let Some(depth) = &self.depth else {
            return Err(FrameError::NotReady);
        };
        let mut image = depth.clone();
        image.sequence = self.sequence;
        image.timestamp = Instant::now();
        Ok(self.track(image))
    }

    fn depth_supported(&self) -> bool {
        self.depth.is_some()
    }
}

pub fn load_color_image(path: &Path) -> Result<PlanarImage> {
    let rgba = image::open(path)
        .with_context(|| format!("failed to read color image {}", path.display()))?
        .into_rgba8();
    let (width, height) = rgba.dimensions();
    rgba_to_planar(rgba.as_raw(), width, height, 0)
        .map_err(|err| anyhow!("failed to build YUV planes for {}: {err}", path.display()))
}

/// Reads a single-channel 16-bit image whose values are millimeters.
pub fn load_depth_image(path: &Path) -> Result<DepthBuffer16> {
    let depth = image::open(path)
        .with_context(|| format!("failed to read depth image {}", path.display()))?
        .into_luma16();
    let (width, height) = depth.dimensions();
    Ok(DepthBuffer16::new(depth.into_raw(), width, height))
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Luma, Rgba};

    use super::*;
    use crate::pipeline::depth::depth_buffer_from_image;

    fn gray_source(depth: Option<DepthBuffer16>) -> StillImageSource {
        let color = rgba_to_planar(&[60u8; 4 * 4 * 4], 4, 4, 0).unwrap();
        StillImageSource::new(color, depth)
    }

    #[test]
    fn warmup_frames_report_not_ready() {
        let mut source = gray_source(None).with_warmup_frames(2);
        assert!(matches!(source.acquire_color_image(), Err(FrameError::NotReady)));
        assert!(matches!(source.acquire_color_image(), Err(FrameError::NotReady)));
        let image = source.acquire_color_image().unwrap();
        assert_eq!(image.sequence, 1);
        assert_eq!(image.width, 4);
    }

    #[test]
    fn handles_are_released_on_drop() {
        let mut source = gray_source(Some(DepthBuffer16::new(vec![1; 4], 2, 2)));
        let color = source.acquire_color_image().unwrap();
        let depth = source.acquire_depth_image().unwrap();
        assert_eq!(source.open_handles(), 2);
        drop(color);
        assert_eq!(source.open_handles(), 1);
        drop(depth);
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn depth_is_not_ready_without_a_depth_image() {
        let mut source = gray_source(None);
        assert!(!source.depth_supported());
        assert!(matches!(source.acquire_depth_image(), Err(FrameError::NotReady)));
    }

    #[test]
    fn loads_color_and_depth_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let color_path = dir.path().join("color.png");
        let depth_path = dir.path().join("depth.png");

        ImageBuffer::from_pixel(8, 6, Rgba([200u8, 200, 200, 255]))
            .save(&color_path)
            .unwrap();
        ImageBuffer::from_fn(4, 3, |x, y| Luma([(1000 + y * 4 + x) as u16]))
            .save(&depth_path)
            .unwrap();

        let mut source = StillImageSource::from_paths(&color_path, Some(&depth_path)).unwrap();
        assert!(source.depth_supported());

        let color = source.acquire_color_image().unwrap();
        assert_eq!((color.width, color.height), (8, 6));
        assert!(color.planes[0].data.iter().all(|&y| y.abs_diff(200) <= 1));

        let image = source.acquire_depth_image().unwrap();
        let depth = depth_buffer_from_image(&image).unwrap();
        assert_eq!((depth.width, depth.height), (4, 3));
        assert_eq!(depth.samples[5], 1005);
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_color_image(Path::new("/nonexistent/frame.png")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read color image"));
    }
}
