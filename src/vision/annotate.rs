//! Detection box annotation on display frames

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::{BoundingBox, Detection};

/// Box colour
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Box outline thickness in pixels
pub const BOX_THICKNESS: u32 = 2;

/// Draw every detection as a green outline on the frame
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
        draw_box(image, &det.bbox, BOX_COLOR, BOX_THICKNESS);
    }
}

/// Draw a rectangle outline from `(x1, y1)` to `(x2, y2)` inclusive.
///
/// Thicker lines grow around the box edges, half outwards and half inwards;
/// anything off the image is clipped.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (x1, y1) = (bbox.x1 as i64, bbox.y1 as i64);
    let width = bbox.x2.saturating_sub(bbox.x1) as i64 + 1;
    let height = bbox.y2.saturating_sub(bbox.y1) as i64 + 1;
    let t = thickness.max(1) as i64;
    let outward = t / 2;

    for k in 0..t {
        // Offset of this ring from the box edge, positive is outwards
        let d = outward - k;
        let (w, h) = (width + 2 * d, height + 2 * d);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at((x1 - d) as i32, (y1 - d) as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
