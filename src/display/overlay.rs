use crate::types::{DepthReading, DepthSample, QueryPoint, TrackedHand};

pub const DEPTH_NOT_AVAILABLE_MESSAGE: &str = "[Depth not supported on this device]";

/// Landmark index pairs joined by bones, wrist first.
const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const MARKER_RADIUS: i32 = 10;
const MARKER_THICKNESS: i32 = 3;
const BONE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 3;
const GAUGE_HEIGHT: i32 = 8;
const GAUGE_MARGIN: i32 = 6;
// Raw depth tops out around 8 m.
const GAUGE_MAX_MM: f32 = 8_000.0;

const MEASURED_COLOR: [u8; 4] = [56, 189, 248, 255];
const UNKNOWN_COLOR: [u8; 4] = [148, 163, 184, 255];
const GAUGE_TRACK_COLOR: [u8; 4] = [30, 41, 59, 255];
const BONE_COLOR: [u8; 4] = [74, 222, 128, 255];
const JOINT_COLOR: [u8; 4] = [248, 113, 113, 255];

/// What gets drawn on top of the camera image for one frame.
#[derive(Clone, Debug, Default)]
pub struct Overlay {
    pub hand: Option<TrackedHand>,
    pub fingertip: Option<QueryPoint>,
    pub depth: Option<DepthReading>,
    pub status: Option<&'static str>,
}

/// Draws the hand skeleton, marks the fingertip and adds a depth gauge along
/// the bottom edge.
pub fn draw_overlay(buffer: &mut [u8], width: u32, height: u32, overlay: &Overlay) {
    let mut canvas = Canvas {
        buffer,
        width,
        height,
    };

    if let Some(hand) = &overlay.hand {
        draw_skeleton(&mut canvas, hand);
    }

    let color = match overlay.depth.map(|d| d.sample) {
        Some(DepthSample::Measured(_)) => MEASURED_COLOR,
        _ => UNKNOWN_COLOR,
    };

    // The tip may come from an earlier, differently sized frame.
    let center = overlay
        .fingertip
        .and_then(|tip| canvas.project(tip.x, tip.y, tip.image_width, tip.image_height));
    if let Some(center) = center {
        let reach = MARKER_RADIUS * 2;
        canvas.draw_ring(center, MARKER_RADIUS, MARKER_THICKNESS, color);
        canvas.draw_line(
            (center.0.saturating_sub(reach), center.1),
            (center.0.saturating_add(reach), center.1),
            color,
            1,
        );
        canvas.draw_line(
            (center.0, center.1.saturating_sub(reach)),
            (center.0, center.1.saturating_add(reach)),
            color,
            1,
        );
    }

    if let Some(reading) = &overlay.depth {
        let top = height as i32 - GAUGE_MARGIN - GAUGE_HEIGHT;
        let right = width as i32 - GAUGE_MARGIN;
        canvas.fill_rect(
            (GAUGE_MARGIN, top),
            (right, top + GAUGE_HEIGHT),
            GAUGE_TRACK_COLOR,
        );
        if let Some(mm) = reading.sample.millimeters() {
            let fraction = (mm as f32 / GAUGE_MAX_MM).clamp(0.0, 1.0);
            let span = ((right - GAUGE_MARGIN) as f32 * fraction) as i32;
            canvas.fill_rect(
                (GAUGE_MARGIN, top),
                (GAUGE_MARGIN + span, top + GAUGE_HEIGHT),
                MEASURED_COLOR,
            );
        }
    }
}

fn draw_skeleton(canvas: &mut Canvas<'_>, hand: &TrackedHand) {
    let points: Vec<Option<(i32, i32)>> = hand
        .points
        .iter()
        .map(|&(x, y)| canvas.project(x, y, hand.image_width, hand.image_height))
        .collect();
    if points.len() < 2 {
        return;
    }

    for &(a, b) in HAND_CONNECTIONS {
        if let (Some(Some(pa)), Some(Some(pb))) = (points.get(a), points.get(b)) {
            canvas.draw_line(*pa, *pb, BONE_COLOR, BONE_THICKNESS);
        }
    }
    for point in points.iter().flatten() {
        canvas.draw_disc(*point, JOINT_RADIUS, JOINT_COLOR);
    }
}

struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl Canvas<'_> {
    /// Scales a point from a `source_width`x`source_height` image onto this
    /// canvas. Non-finite points, and points further than one canvas size
    /// outside it, have nothing to draw.
    fn project(&self, x: f32, y: f32, source_width: u32, source_height: u32) -> Option<(i32, i32)> {
        let px = x * self.width as f32 / source_width.max(1) as f32;
        let py = y * self.height as f32 / source_height.max(1) as f32;
        let (w, h) = (self.width as f32, self.height as f32);
        let visible = px.is_finite()
            && py.is_finite()
            && (-w..=2.0 * w).contains(&px)
            && (-h..=2.0 * h).contains(&py);
        visible.then_some((px as i32, py as i32))
    }

    fn draw_ring(&mut self, center: (i32, i32), radius: i32, thickness: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        let outer = radius * radius;
        let inner = (radius - thickness).max(0).pow(2);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d = dx * dx + dy * dy;
                if d <= outer && d >= inner {
                    self.put_pixel(cx.saturating_add(dx), cy.saturating_add(dy), color);
                }
            }
        }
    }

    fn draw_disc(&mut self, center: (i32, i32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx.saturating_add(dx), cy.saturating_add(dy), color);
                }
            }
        }
    }

    fn draw_line(&mut self, p0: (i32, i32), p1: (i32, i32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = p0;
        let (x1, y1) = p1;
        let dx = x1.abs_diff(x0) as i64;
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1.abs_diff(y0) as i64);
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.put_pixel(x0.saturating_add(ox), y0.saturating_add(oy), color);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn fill_rect(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: [u8; 4]) {
        for y in top_left.1..bottom_right.1 {
            for x in top_left.0..bottom_right.0 {
                self.put_pixel(x, y, color);
            }
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let (Ok(ux), Ok(uy)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = (uy as usize * self.width as usize + ux as usize) * 4;
        if let Some(px) = self.buffer.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(buffer: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * width + x) * 4) as usize;
        [buffer[idx], buffer[idx + 1], buffer[idx + 2], buffer[idx + 3]]
    }

    #[test]
    fn marker_is_drawn_at_scaled_fingertip() {
        let (width, height) = (64u32, 64u32);
        let mut buffer = vec![0u8; (width * height * 4) as usize];
        let overlay = Overlay {
            fingertip: Some(QueryPoint {
                x: 16.0,
                y: 16.0,
                image_width: 32,
                image_height: 32,
                sequence: 1,
            }),
            depth: Some(DepthReading {
                x: 0,
                y: 0,
                sample: DepthSample::Measured(4_000),
                query_sequence: 1,
            }),
            status: None,
            hand: None,
        };

        draw_overlay(&mut buffer, width, height, &overlay);

        // Crosshair passes through the center at (32, 32).
        assert_eq!(pixel(&buffer, width, 32, 32), MEASURED_COLOR);
        assert_eq!(pixel(&buffer, width, 32 + MARKER_RADIUS as u32, 32), MEASURED_COLOR);
        // Gauge is half full at 4 m.
        let gauge_y = height - (GAUGE_MARGIN + 1) as u32;
        assert_eq!(pixel(&buffer, width, GAUGE_MARGIN as u32 + 1, gauge_y), MEASURED_COLOR);
        let track_x = width - GAUGE_MARGIN as u32 - 2;
        assert_eq!(pixel(&buffer, width, track_x, gauge_y), GAUGE_TRACK_COLOR);
    }

    #[test]
    fn unknown_depth_uses_neutral_marker_and_empty_gauge() {
        let (width, height) = (48u32, 48u32);
        let mut buffer = vec![0u8; (width * height * 4) as usize];
        let overlay = Overlay {
            fingertip: Some(QueryPoint {
                x: 24.0,
                y: 24.0,
                image_width: width,
                image_height: height,
                sequence: 3,
            }),
            depth: Some(DepthReading {
                x: 24,
                y: 24,
                sample: DepthSample::Unknown,
                query_sequence: 3,
            }),
            status: None,
            hand: None,
        };

        draw_overlay(&mut buffer, width, height, &overlay);

        assert_eq!(pixel(&buffer, width, 24, 24), UNKNOWN_COLOR);
        let gauge_y = height - (GAUGE_MARGIN + 1) as u32;
        assert_eq!(pixel(&buffer, width, GAUGE_MARGIN as u32 + 1, gauge_y), GAUGE_TRACK_COLOR);
    }

    #[test]
    fn off_screen_marker_is_clipped() {
        let mut buffer = vec![0u8; 16 * 16 * 4];
        let overlay = Overlay {
            fingertip: Some(QueryPoint {
                x: -100.0,
                y: 500.0,
                image_width: 16,
                image_height: 16,
                sequence: 1,
            }),
            ..Overlay::default()
        };
        draw_overlay(&mut buffer, 16, 16, &overlay);
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn non_finite_fingertip_draws_nothing() {
        for (x, y) in [(f32::INFINITY, 4.0), (4.0, f32::NEG_INFINITY), (f32::NAN, 4.0)] {
            let mut buffer = vec![0u8; 16 * 16 * 4];
            let overlay = Overlay {
                fingertip: Some(QueryPoint {
                    x,
                    y,
                    image_width: 16,
                    image_height: 16,
                    sequence: 1,
                }),
                ..Overlay::default()
            };
            draw_overlay(&mut buffer, 16, 16, &overlay);
            assert!(buffer.iter().all(|&b| b == 0), "({x}, {y})");
        }
    }

    #[test]
    fn skeleton_joins_landmarks() {
        let (width, height) = (40u32, 40u32);
        let mut buffer = vec![0u8; (width * height * 4) as usize];
        // Wrist at (5, 30), everything else stacked at (5, 10); the bone from
        // the wrist runs straight up.
        let mut points = vec![(5.0, 10.0); 21];
        points[0] = (5.0, 30.0);
        let overlay = Overlay {
            hand: Some(TrackedHand {
                points,
                image_width: width,
                image_height: height,
                sequence: 1,
            }),
            ..Overlay::default()
        };

        draw_overlay(&mut buffer, width, height, &overlay);

        assert_eq!(pixel(&buffer, width, 5, 30), JOINT_COLOR);
        assert_eq!(pixel(&buffer, width, 5, 20), BONE_COLOR);
        assert_eq!(pixel(&buffer, width, 30, 20), [0, 0, 0, 0]);
    }

    #[test]
    fn skeleton_skips_unusable_landmarks() {
        let mut buffer = vec![0u8; 16 * 16 * 4];
        let overlay = Overlay {
            hand: Some(TrackedHand {
                points: vec![(f32::NAN, 0.0); 21],
                image_width: 16,
                image_height: 16,
                sequence: 1,
            }),
            ..Overlay::default()
        };
        draw_overlay(&mut buffer, 16, 16, &overlay);
        assert!(buffer.iter().all(|&b| b == 0));
    }
}
