use crate::{
    config::DepthMapping,
    error::{FrameError, FrameResult},
    types::{DepthBuffer16, DepthSample, ImageFormat, PlanarImage, QueryPoint},
};

/// Unpacks a single-plane `Depth16` image. The plane may carry row padding.
pub fn depth_buffer_from_image(image: &PlanarImage) -> FrameResult<DepthBuffer16> {
    if image.format != ImageFormat::Depth16 || image.planes.len() != 1 {
        return Err(FrameError::UnsupportedFormat {
            format: image.format,
            planes: image.planes.len(),
        });
    }

    let plane = &image.planes[0];
    if plane.pixel_stride != 2 {
        return Err(FrameError::InvalidBuffer(format!(
            "depth pixel stride {} is not 2",
            plane.pixel_stride
        )));
    }
    DepthBuffer16::from_plane_bytes(&plane.data, image.width, image.height, plane.row_stride)
        .ok_or_else(|| {
            FrameError::InvalidBuffer(format!(
                "depth plane of {} bytes at stride {} too small for {}x{}",
                plane.len(),
                plane.row_stride,
                image.width,
                image.height
            ))
        })
}

/// Nearest-pixel depth lookup. Coordinates outside the buffer are an error,
/// never clamped and never read from a neighbouring row.
pub fn sample_depth(depth: &DepthBuffer16, x: i32, y: i32) -> FrameResult<DepthSample> {
    let out_of_bounds = || FrameError::OutOfBounds {
        x,
        y,
        width: depth.width,
        height: depth.height,
    };

    let (Ok(col), Ok(row)) = (u32::try_from(x), u32::try_from(y)) else {
        return Err(out_of_bounds());
    };
    if col >= depth.width || row >= depth.height {
        return Err(out_of_bounds());
    }

    let idx = row as usize * depth.width as usize + col as usize;
    depth
        .samples
        .get(idx)
        .copied()
        .map(DepthSample::from_raw)
        .ok_or_else(|| {
            FrameError::InvalidBuffer(format!(
                "depth buffer holds {} samples, expected {}x{}",
                depth.samples.len(),
                depth.width,
                depth.height
            ))
        })
}

/// Places a color-image query point on the depth image. The result is
/// truncated toward zero and may still fall outside the depth buffer.
pub fn map_to_depth(
    point: &QueryPoint,
    mapping: DepthMapping,
    depth_width: u32,
    depth_height: u32,
) -> (i32, i32) {
    let (x, y) = match mapping {
        DepthMapping::Direct => (point.x, point.y),
        DepthMapping::Scaled => {
            let sx = depth_width as f32 / point.image_width.max(1) as f32;
            let sy = depth_height as f32 / point.image_height.max(1) as f32;
            (point.x * sx, point.y * sy)
        }
    };

    (truncate(x), truncate(y))
}

fn truncate(value: f32) -> i32 {
    if value.is_nan() {
        return -1;
    }
    value.trunc().clamp(i32::MIN as f32, i32::MAX as f32) as i32
}
