use std::time::Instant;

use yuv::{
    BufferStoreMut, YuvBiPlanarImage, YuvChromaSubsampling, YuvConversionMode, YuvPlanarImage,
    YuvPlanarImageMut, YuvRange, YuvStandardMatrix, rgba_to_yuv420, yuv_nv21_to_rgba,
    yuv420_to_rgba,
};

use crate::{
    config::ColorConversion,
    error::{FrameError, FrameResult},
    types::{ImageFormat, InterleavedBuffer, PlanarImage, Plane, RgbaFrame},
};

/// Converts a camera image straight to RGBA.
pub fn convert_planar_image(
    image: &PlanarImage,
    color: ColorConversion,
) -> FrameResult<RgbaFrame> {
    let packed = to_interleaved(image)?;
    to_rgba(&packed, color)
}

/// Packs a three-plane YUV_420_888 image into one buffer: the Y plane, then
/// the V plane, then the U plane, each copied verbatim.
///
/// With a chroma pixel stride of 2 the V and U planes alias one VU buffer,
/// so the result reads as NV21. With a pixel stride of 1 it is a planar
/// `[Y][V][U]` image.
pub fn to_interleaved(image: &PlanarImage) -> FrameResult<InterleavedBuffer> {
    if image.format != ImageFormat::Yuv420_888 || image.planes.len() != 3 {
        return Err(FrameError::UnsupportedFormat {
            format: image.format,
            planes: image.planes.len(),
        });
    }
    if image.width == 0 || image.height == 0 {
        return Err(FrameError::InvalidBuffer(format!(
            "empty image {}x{}",
            image.width, image.height
        )));
    }

    let y = &image.planes[0];
    let u = &image.planes[1];
    let v = &image.planes[2];

    check_plane("Y", y, image.width as usize, image.height as usize)?;
    check_plane("U", u, image.chroma_width(), image.chroma_height())?;
    check_plane("V", v, image.chroma_width(), image.chroma_height())?;

    if u.pixel_stride != v.pixel_stride || u.row_stride != v.row_stride {
        return Err(FrameError::InvalidBuffer(format!(
            "chroma planes disagree: U stride {}/{}, V stride {}/{}",
            u.row_stride, u.pixel_stride, v.row_stride, v.pixel_stride
        )));
    }
    if !matches!(v.pixel_stride, 1 | 2) {
        return Err(FrameError::InvalidBuffer(format!(
            "unsupported chroma pixel stride {}",
            v.pixel_stride
        )));
    }

    let mut data = Vec::with_capacity(y.len() + v.len() + u.len());
    data.extend_from_slice(&y.data);
    data.extend_from_slice(&v.data);
    data.extend_from_slice(&u.data);

    Ok(InterleavedBuffer {
        data,
        width: image.width,
        height: image.height,
        y_stride: y.row_stride as u32,
        uv_stride: v.row_stride as u32,
        chroma_pixel_stride: v.pixel_stride as u32,
        uv_offset: y.len(),
        u_offset: y.len() + v.len(),
        sequence: image.sequence,
        timestamp: image.timestamp,
    })
}

/// Expands a packed `[Y][V][U]` buffer to opaque RGBA pixels.
pub fn to_rgba(buffer: &InterleavedBuffer, color: ColorConversion) -> FrameResult<RgbaFrame> {
    let width = buffer.width;
    let height = buffer.height;
    if width == 0 || height == 0 {
        return Err(FrameError::InvalidBuffer(format!(
            "empty image {width}x{height}"
        )));
    }
    if buffer.uv_offset > buffer.u_offset || buffer.u_offset > buffer.data.len() {
        return Err(FrameError::InvalidBuffer(format!(
            "chroma offsets {}/{} outside {} byte buffer",
            buffer.uv_offset,
            buffer.u_offset,
            buffer.data.len()
        )));
    }

    let chroma_rows = (height as usize).div_ceil(2);
    let chroma_cols = (width as usize).div_ceil(2);
    let y_plane = &buffer.data[..buffer.uv_offset];
    let mut rgba = vec![0u8; width as usize * height as usize * 4];

    match buffer.chroma_pixel_stride {
        2 => {
            let uv_plane = &buffer.data[buffer.uv_offset..];
            check_chroma(uv_plane.len(), buffer.uv_stride, chroma_rows, chroma_cols * 2)?;
            let image = YuvBiPlanarImage {
                y_plane,
                y_stride: buffer.y_stride,
                uv_plane,
                uv_stride: buffer.uv_stride,
                width,
                height,
            };
            yuv_nv21_to_rgba(
                &image,
                &mut rgba,
                width * 4,
                color.range,
                color.matrix,
                YuvConversionMode::Balanced,
            )
            .map_err(|err| FrameError::Conversion(format!("NV21→RGBA failed: {err:?}")))?;
        }
        1 => {
            let v_plane = &buffer.data[buffer.uv_offset..buffer.u_offset];
            let u_plane = &buffer.data[buffer.u_offset..];
            check_chroma(v_plane.len(), buffer.uv_stride, chroma_rows, chroma_cols)?;
            check_chroma(u_plane.len(), buffer.uv_stride, chroma_rows, chroma_cols)?;
            let image = YuvPlanarImage {
                y_plane,
                y_stride: buffer.y_stride,
                u_plane,
                u_stride: buffer.uv_stride,
                v_plane,
                v_stride: buffer.uv_stride,
                width,
                height,
            };
            yuv420_to_rgba(&image, &mut rgba, width * 4, color.range, color.matrix)
                .map_err(|err| FrameError::Conversion(format!("YUV420→RGBA failed: {err:?}")))?;
        }
        other => {
            return Err(FrameError::InvalidBuffer(format!(
                "unsupported chroma pixel stride {other}"
            )));
        }
    }

    Ok(RgbaFrame {
        rgba,
        width,
        height,
        sequence: buffer.sequence,
        timestamp: buffer.timestamp,
    })
}

/// Builds a fully planar YUV_420_888 image from RGBA pixels (full range
/// BT.601).
pub fn rgba_to_planar(
    rgba: &[u8],
    width: u32,
    height: u32,
    sequence: u64,
) -> FrameResult<PlanarImage> {
    let mut planar = YuvPlanarImageMut::<u8>::alloc(width, height, YuvChromaSubsampling::Yuv420);
    rgba_to_yuv420(
        &mut planar,
        rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt601,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| FrameError::InvalidBuffer(format!("RGBA→YUV420 failed: {err:?}")))?;

    let (y_stride, u_stride, v_stride) = (
        planar.y_stride as usize,
        planar.u_stride as usize,
        planar.v_stride as usize,
    );
    Ok(PlanarImage {
        format: ImageFormat::Yuv420_888,
        width,
        height,
        planes: vec![
            Plane::new(into_owned(planar.y_plane), y_stride, 1),
            Plane::new(into_owned(planar.u_plane), u_stride, 1),
            Plane::new(into_owned(planar.v_plane), v_stride, 1),
        ],
        sequence,
        timestamp: Instant::now(),
    })
}

fn into_owned(store: BufferStoreMut<'_, u8>) -> Vec<u8> {
    match store {
        BufferStoreMut::Owned(data) => data,
        BufferStoreMut::Borrowed(data) => data.to_vec(),
    }
}

fn check_chroma(len: usize, stride: u32, rows: usize, row_bytes: usize) -> FrameResult<()> {
    let needed = (rows - 1) * stride as usize + row_bytes;
    if (stride as usize) < row_bytes || len < needed {
        return Err(FrameError::InvalidBuffer(format!(
            "chroma too small: got {len} bytes at stride {stride}, need {rows} rows of {row_bytes}"
        )));
    }
    Ok(())
}

fn check_plane(name: &str, plane: &Plane, width: usize, height: usize) -> FrameResult<()> {
    if plane.pixel_stride == 0 || plane.row_stride < (width - 1) * plane.pixel_stride + 1 {
        return Err(FrameError::InvalidBuffer(format!(
            "{name} plane strides {}/{} too small for width {width}",
            plane.row_stride, plane.pixel_stride
        )));
    }
    let needed = (height - 1) * plane.row_stride + (width - 1) * plane.pixel_stride + 1;
    if plane.len() < needed {
        return Err(FrameError::InvalidBuffer(format!(
            "{name} plane too small: got {}, expected {needed}",
            plane.len()
        )));
    }
    Ok(())
}
