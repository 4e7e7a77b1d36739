//! On-frame text rendering.
//!
//! - `draw_text`: scaled 5x7 bitmap text with optional background
//! - `draw_hud`: the fixed heads-up display (throughput, counts, threshold, tip)
//!
//! HUD positions are fixed; lines never overlap for frames at least 180px tall.

mod font;

use image::{Rgb, RgbImage};

use crate::frame::Frame;
use font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const USAGE_TIP: &str = "Tips: Good lighting, hold closer";

const HUD_LEFT: i32 = 10;
const HUD_TOP: i32 = 12;
const HUD_ROW: i32 = 30;
const HUD_SCALE: u32 = 2;
const TIP_SCALE: u32 = 1;
const TIP_BOTTOM_MARGIN: i32 = 20;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const MAGENTA: Rgb<u8> = Rgb([255, 0, 255]);
const GREY: Rgb<u8> = Rgb([200, 200, 200]);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Integer pixel multiplier for the 5x7 glyphs.
    pub scale: u32,
    pub color: Rgb<u8>,
    pub background: Option<Rgb<u8>>,
}

impl TextStyle {
    pub fn new(scale: u32, color: Rgb<u8>) -> Self {
        Self {
            scale: scale.max(1),
            color,
            background: None,
        }
    }

    pub fn with_background(mut self, background: Rgb<u8>) -> Self {
        self.background = Some(background);
        self
    }
}

/// Rendered size of `text` in pixels, one glyph column of spacing between characters.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    let width = if chars == 0 {
        0
    } else {
        (chars * (GLYPH_WIDTH + 1) - 1) * scale
    };
    (width, GLYPH_HEIGHT * scale)
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels off the image are skipped.
pub fn draw_text(img: &mut RgbImage, text: &str, x: i32, y: i32, style: &TextStyle) {
    let scale = style.scale.max(1) as i32;

    if let Some(bg) = style.background {
        let (w, h) = text_size(text, style.scale);
        fill_rect(
            img,
            x - scale,
            y - scale,
            w as i32 + 2 * scale,
            h as i32 + 2 * scale,
            bg,
        );
    }

    let advance = (GLYPH_WIDTH as i32 + 1) * scale;
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i32 * advance;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i32 {
                if (bits >> (GLYPH_WIDTH as i32 - 1 - col)) & 1 == 1 {
                    fill_rect(
                        img,
                        origin_x + col * scale,
                        y + row as i32 * scale,
                        scale,
                        scale,
                        style.color,
                    );
                }
            }
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: Rgb<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(img.width() as i32);
    let y1 = (y + h).min(img.height() as i32);
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// Values shown on the heads-up display.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HudStats {
    pub fps: f64,
    pub people: usize,
    pub objects: usize,
    pub confidence_threshold: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HudLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub style: TextStyle,
}

impl HudLine {
    fn new(text: String, x: i32, y: i32, style: TextStyle) -> Self {
        Self { text, x, y, style }
    }

    /// Bounding box as `(x, y, width, height)`.
    pub fn bounds(&self) -> (i32, i32, u32, u32) {
        let (w, h) = text_size(&self.text, self.style.scale);
        (self.x, self.y, w, h)
    }
}

/// Lay out the HUD for a frame of the given height.
pub fn hud_lines(stats: &HudStats, frame_height: u32) -> Vec<HudLine> {
    let rows = [
        (format!("FPS: {:.1}", stats.fps), GREEN),
        (format!("People: {}", stats.people), GREEN),
        (format!("Objects: {}", stats.objects), YELLOW),
        (format!("Total: {}", stats.people + stats.objects), WHITE),
        (format!("Conf: {:.2}", stats.confidence_threshold), MAGENTA),
    ];

    let mut lines: Vec<HudLine> = rows
        .into_iter()
        .enumerate()
        .map(|(i, (text, color))| {
            HudLine::new(
                text,
                HUD_LEFT,
                HUD_TOP + i as i32 * HUD_ROW,
                TextStyle::new(HUD_SCALE, color),
            )
        })
        .collect();

    let tip_y = frame_height as i32 - TIP_BOTTOM_MARGIN - (GLYPH_HEIGHT * TIP_SCALE) as i32;
    lines.push(HudLine::new(
        USAGE_TIP.to_string(),
        HUD_LEFT,
        tip_y.max(0),
        TextStyle::new(TIP_SCALE, GREY),
    ));
    lines
}

/// Draw the HUD onto `frame` in place.
pub fn draw_hud(frame: &mut Frame, stats: &HudStats) {
    let lines = hud_lines(stats, frame.height());
    let img = frame.image_mut();
    for line in &lines {
        draw_text(img, &line.text, line.x, line.y, &line.style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (i32, i32, u32, u32), b: (i32, i32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 as i32
            && b.0 < a.0 + a.2 as i32
            && a.1 < b.1 + b.3 as i32
            && b.1 < a.1 + a.3 as i32
    }

    #[test]
    fn hud_text_formats() {
        let stats = HudStats {
            fps: 14.26,
            people: 2,
            objects: 3,
            confidence_threshold: 0.6,
        };
        let texts: Vec<String> = hud_lines(&stats, 720).into_iter().map(|l| l.text).collect();
        assert_eq!(
            texts,
            vec![
                "FPS: 14.3",
                "People: 2",
                "Objects: 3",
                "Total: 5",
                "Conf: 0.60",
                USAGE_TIP,
            ]
        );
    }

    #[test]
    fn hud_lines_do_not_overlap() {
        let lines = hud_lines(&HudStats::default(), 720);
        for (i, a) in lines.iter().enumerate() {
            for b in lines.iter().skip(i + 1) {
                assert!(!overlaps(a.bounds(), b.bounds()), "{:?} vs {:?}", a.text, b.text);
            }
        }
    }

    #[test]
    fn tip_sits_near_bottom() {
        let lines = hud_lines(&HudStats::default(), 720);
        let tip = lines.last().map(|l| l.y).unwrap_or_default();
        assert_eq!(tip, 720 - 20 - 7);
    }

    #[test]
    fn draw_text_marks_pixels_and_clips() {
        let mut img = RgbImage::new(20, 10);
        let style = TextStyle::new(1, WHITE);
        draw_text(&mut img, "I", 0, 0, &style);
        // Top row of 'I' is 01110.
        assert_eq!(img.get_pixel(1, 0), &WHITE);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));

        // Entirely off-image text must not panic.
        draw_text(&mut img, "FPS", -100, 50, &style.with_background(GREY));
    }

    #[test]
    fn text_size_scales() {
        assert_eq!(text_size("AB", 1), (11, 7));
        assert_eq!(text_size("AB", 2), (22, 14));
        assert_eq!(text_size("", 3), (0, 21));
    }

    #[test]
    fn draw_hud_changes_frame() {
        let mut frame = Frame::filled(320, 240, [0, 0, 0], 1);
        draw_hud(&mut frame, &HudStats::default());
        assert!(frame.pixels().iter().any(|&b| b != 0));
    }
}
