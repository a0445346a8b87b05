mod overlay;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

use crate::types::RgbaFrame;

pub use overlay::{DEPTH_NOT_AVAILABLE_MESSAGE, Overlay, draw_overlay};

/// Where converted camera frames end up each frame.
pub trait DisplaySurface {
    fn present(&mut self, frame: &RgbaFrame, overlay: &Overlay);

    fn viewport_changed(&mut self, width: u32, height: u32);
}

/// Keeps the most recent frame and overlay so they can be written out as an
/// image on demand.
#[derive(Default)]
pub struct SnapshotSurface {
    last: Option<(RgbaFrame, Overlay)>,
    viewport: Option<(u32, u32)>,
    presented: u64,
    last_status: Option<&'static str>,
}

impl SnapshotSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn last_overlay(&self) -> Option<&Overlay> {
        self.last.as_ref().map(|(_, overlay)| overlay)
    }

    /// The last presented frame with its overlay drawn in.
    pub fn composite(&self) -> Option<RgbaFrame> {
        let (frame, overlay) = self.last.as_ref()?;
        let mut composed = frame.clone();
        draw_overlay(&mut composed.rgba, composed.width, composed.height, overlay);
        Some(composed)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let frame = self
            .composite()
            .ok_or_else(|| anyhow!("no frame has been presented yet"))?;
        let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba)
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        log::info!("snapshot written to {}", path.display());
        Ok(())
    }
}

impl DisplaySurface for SnapshotSurface {
    fn present(&mut self, frame: &RgbaFrame, overlay: &Overlay) {
        if overlay.status != self.last_status {
            if let Some(status) = overlay.status {
                log::info!("{status}");
            }
            self.last_status = overlay.status;
        }
        self.presented += 1;
        self.last = Some((frame.clone(), overlay.clone()));
    }

    fn viewport_changed(&mut self, width: u32, height: u32) {
        log::debug!("viewport changed to {width}x{height}");
        self.viewport = Some((width, height));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::types::QueryPoint;

    fn frame(width: u32, height: u32) -> RgbaFrame {
        RgbaFrame {
            rgba: vec![10; (width * height * 4) as usize],
            width,
            height,
            sequence: 1,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn save_without_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SnapshotSurface::new().save(&dir.path().join("out.png")).is_err());
    }

    #[test]
    fn saves_composited_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let mut surface = SnapshotSurface::new();
        surface.viewport_changed(1080, 1920);
        let overlay = Overlay {
            fingertip: Some(QueryPoint {
                x: 16.0,
                y: 16.0,
                image_width: 32,
                image_height: 32,
                sequence: 1,
            }),
            ..Overlay::default()
        };
        surface.present(&frame(32, 32), &overlay);

        surface.save(&path).unwrap();

        let written = image::open(&path).unwrap().into_rgba8();
        assert_eq!(written.dimensions(), (32, 32));
        assert_ne!(written.get_pixel(16, 16).0, [10, 10, 10, 10]);
        assert_eq!(written.get_pixel(0, 31).0, [10, 10, 10, 10]);
        assert_eq!(surface.presented(), 1);
        assert_eq!(surface.viewport(), Some((1080, 1920)));
    }
}
