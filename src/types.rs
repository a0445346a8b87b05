use std::time::Instant;

/// Pixel layout reported by the camera for an acquired image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Yuv420_888,
    Nv21,
    Rgba8888,
    Depth16,
}

#[derive(Clone, Debug)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A camera image as handed out by the tracking provider: planes are stored
/// in `[Y, U, V]` order, exactly as the sensor reports them.
#[derive(Clone, Debug)]
pub struct PlanarImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
    pub sequence: u64,
    pub timestamp: Instant,
}

impl PlanarImage {
    pub fn chroma_width(&self) -> usize {
        (self.width as usize).div_ceil(2)
    }

    pub fn chroma_height(&self) -> usize {
        (self.height as usize).div_ceil(2)
    }
}

/// The Y, V and U planes packed back to back. A chroma pixel stride of 2
/// makes this NV21; a stride of 1 makes it a planar `[Y][V][U]` image.
#[derive(Clone, Debug)]
pub struct InterleavedBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub y_stride: u32,
    /// Row stride of the V plane (and of the U plane, which matches it).
    pub uv_stride: u32,
    pub chroma_pixel_stride: u32,
    /// Byte offset of the first V sample.
    pub uv_offset: usize,
    /// Byte offset of the first U sample.
    pub u_offset: usize,
    pub sequence: u64,
    pub timestamp: Instant,
}

#[derive(Clone, Debug)]
pub struct RgbaFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub timestamp: Instant,
}

impl RgbaFrame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba
            .get(idx..idx + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

/// Raw sensor depth in millimeters, row-major.
#[derive(Clone, Debug)]
pub struct DepthBuffer16 {
    pub samples: Vec<u16>,
    pub width: u32,
    pub height: u32,
}

impl DepthBuffer16 {
    pub fn new(samples: Vec<u16>, width: u32, height: u32) -> Self {
        Self {
            samples,
            width,
            height,
        }
    }

    /// Reads a depth plane stored in native byte order. `row_stride` is in
    /// bytes and may include padding past `width * 2`.
    pub fn from_plane_bytes(
        bytes: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
    ) -> Option<Self> {
        let row_bytes = width as usize * 2;
        if row_stride < row_bytes {
            return None;
        }
        let needed = match height as usize {
            0 => 0,
            rows => (rows - 1) * row_stride + row_bytes,
        };
        if bytes.len() < needed {
            return None;
        }

        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height as usize {
            let start = row * row_stride;
            samples.extend(
                bytes[start..start + row_bytes]
                    .chunks_exact(2)
                    .map(|pair| u16::from_ne_bytes([pair[0], pair[1]])),
            );
        }

        Some(Self::new(samples, width, height))
    }

    /// Packs the samples as a single-plane `Depth16` image, the way the depth
    /// sensor hands them out.
    pub fn into_image(self, sequence: u64) -> PlanarImage {
        let row_stride = self.width as usize * 2;
        let data = self
            .samples
            .iter()
            .flat_map(|sample| sample.to_ne_bytes())
            .collect();
        PlanarImage {
            format: ImageFormat::Depth16,
            width: self.width,
            height: self.height,
            planes: vec![Plane::new(data, row_stride, 2)],
            sequence,
            timestamp: Instant::now(),
        }
    }
}

/// The 21 hand landmarks in detector output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

pub const NUM_LANDMARKS: usize = 21;

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Image-space landmark, normalized to the detector's input bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Hand-centered landmark in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug)]
pub struct Hand {
    pub landmarks: Vec<LandmarkPoint>,
    pub world_landmarks: Vec<WorldLandmark>,
    pub handedness: f32,
}

impl Hand {
    pub fn landmark(&self, which: HandLandmark) -> Option<LandmarkPoint> {
        self.landmarks.get(which.index()).copied()
    }

    pub fn world_landmark(&self, which: HandLandmark) -> Option<WorldLandmark> {
        self.world_landmarks.get(which.index()).copied()
    }
}

#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub hands: Vec<Hand>,
    pub sequence: u64,
    pub input_width: u32,
    pub input_height: u32,
}

impl DetectionResult {
    /// Landmarks of the first hand in pixels of the detection bitmap.
    pub fn tracked_hand(&self) -> Option<TrackedHand> {
        let hand = self.hands.first()?;
        Some(TrackedHand {
            points: hand
                .landmarks
                .iter()
                .map(|point| point.to_pixels(self.input_width, self.input_height))
                .collect(),
            image_width: self.input_width,
            image_height: self.input_height,
            sequence: self.sequence,
        })
    }

    pub fn empty(frame: &RgbaFrame) -> Self {
        Self {
            hands: Vec::new(),
            sequence: frame.sequence,
            input_width: frame.width,
            input_height: frame.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Index fingertip of the first hand, in pixels of the bitmap this
    /// result was computed from.
    pub fn index_fingertip(&self) -> Option<QueryPoint> {
        let tip = self.hands.first()?.landmark(HandLandmark::IndexFingerTip)?;
        let (x, y) = tip.to_pixels(self.input_width, self.input_height);
        Some(QueryPoint {
            x,
            y,
            image_width: self.input_width,
            image_height: self.input_height,
            sequence: self.sequence,
        })
    }
}

/// A detected hand ready to be drawn over a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedHand {
    pub points: Vec<(f32, f32)>,
    pub image_width: u32,
    pub image_height: u32,
    pub sequence: u64,
}

/// Where the render loop should look up depth, in color-image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryPoint {
    pub x: f32,
    pub y: f32,
    pub image_width: u32,
    pub image_height: u32,
    pub sequence: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthSample {
    Measured(u16),
    /// The sensor reports 0 where it has no estimate.
    Unknown,
}

impl DepthSample {
    pub fn from_raw(raw: u16) -> Self {
        if raw == 0 {
            DepthSample::Unknown
        } else {
            DepthSample::Measured(raw)
        }
    }

    pub fn raw(&self) -> u16 {
        match self {
            DepthSample::Measured(mm) => *mm,
            DepthSample::Unknown => 0,
        }
    }

    pub fn millimeters(&self) -> Option<u16> {
        match self {
            DepthSample::Measured(mm) => Some(*mm),
            DepthSample::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthReading {
    pub x: i32,
    pub y: i32,
    pub sample: DepthSample,
    pub query_sequence: u64,
}

impl DepthReading {
    pub fn display_text(&self) -> String {
        match self.sample {
            DepthSample::Measured(mm) => format!("{mm} mm"),
            DepthSample::Unknown => "no depth".to_string(),
        }
    }
}
