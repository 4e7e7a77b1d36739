//! Box and label rendering for detector output.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::result::Detection;
use crate::frame::Frame;
use crate::overlay::{draw_text, text_size, TextStyle};

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: u32 = 1;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Copy `frame` and draw each detection's box with a `name 0.87` label.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut annotated = frame.clone();
    let img = annotated.image_mut();

    for det in detections {
        let color = class_color(det.class_id);
        let bbox = det.bbox.clamp_to(img.width(), img.height());
        let (x, y) = (bbox.x1.round() as i32, bbox.y1.round() as i32);
        let (w, h) = (bbox.width().round() as u32, bbox.height().round() as u32);
        if w == 0 || h == 0 {
            continue;
        }

        for offset in 0..BOX_THICKNESS {
            let rect = Rect::at(x - offset, y - offset)
                .of_size(w + 2 * offset as u32, h + 2 * offset as u32);
            draw_hollow_rect_mut(img, rect, color);
        }

        let label = format!("{} {:.2}", det.class_name, det.confidence);
        let (_, label_h) = text_size(&label, LABEL_SCALE);
        // Above the box when there is room, inside it otherwise.
        let label_y = if y >= label_h as i32 + 4 {
            y - label_h as i32 - 3
        } else {
            y + 3
        };
        let style = TextStyle::new(LABEL_SCALE, LABEL_TEXT).with_background(color);
        draw_text(img, &label, x + 1, label_y, &style);
    }

    annotated
}

/// Deterministic per-class color, kept mid-dark so white label text stays readable.
pub fn class_color(class_id: u32) -> Rgb<u8> {
    let mut hash = class_id.wrapping_add(1).wrapping_mul(2654435761);
    let mut channel = || {
        let value = ((hash >> 8) & 0xFF) as u8;
        hash = hash.wrapping_mul(2654435761);
        value
    };
    let (r, g, b) = (channel(), channel(), channel());
    let squash = |v: u8| 40 + (v as u16 * 140 / 255) as u8;
    Rgb([squash(r), squash(g), squash(b)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: "person".to_string(),
            confidence: 0.87,
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }

    #[test]
    fn annotate_draws_box_edges_on_copy() {
        let frame = Frame::filled(100, 100, [0, 0, 0], 1);
        let annotated = annotate(&frame, &[person(20.0, 30.0, 60.0, 80.0)]);

        let color = class_color(0);
        assert_eq!(annotated.image().get_pixel(20, 50), &color);
        assert_eq!(annotated.image().get_pixel(40, 79), &color);
        assert_eq!(annotated.image().get_pixel(40, 55), &Rgb([0, 0, 0]));
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn degenerate_and_offscreen_boxes_are_skipped() {
        let frame = Frame::filled(50, 50, [0, 0, 0], 1);
        let annotated = annotate(
            &frame,
            &[person(10.0, 10.0, 10.0, 30.0), person(80.0, 80.0, 90.0, 90.0)],
        );
        assert_eq!(annotated.pixels(), frame.pixels());
    }

    #[test]
    fn class_colors_are_stable_and_never_black() {
        for id in 0..80 {
            let color = class_color(id);
            assert_eq!(color, class_color(id));
            assert!(color.0.iter().all(|&c| c >= 40 && c <= 180));
        }
        assert_ne!(class_color(0), class_color(1));
    }
}
