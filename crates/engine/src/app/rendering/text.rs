use super::canvas::{Canvas, Color};

pub const GLYPH_WIDTH: i32 = 3;
pub const GLYPH_HEIGHT: i32 = 5;

/// 3x5 bitmaps for ASCII 32..=126, five 3-bit rows packed top row first.
const ASCII_GLYPHS: [u16; 95] = [
    0x0000, 0x2482, 0x5A00, 0x5F7D, 0x7DDF, 0x52A5, 0x2AAB, 0x2400, //
    0x1491, 0x4494, 0x0AA8, 0x05D0, 0x0014, 0x01C0, 0x0002, 0x12A4, //
    0x7B6F, 0x2C97, 0x73E7, 0x73CF, 0x5BC9, 0x79CF, 0x79EF, 0x7292, //
    0x7BEF, 0x7BCF, 0x0410, 0x0414, 0x1511, 0x0E38, 0x4454, 0x72C2, //
    0x7BE7, 0x2BED, 0x6BAE, 0x7927, 0x6B6E, 0x79A7, 0x79A4, 0x796F, //
    0x5BED, 0x7497, 0x726F, 0x5BAD, 0x4927, 0x5FED, 0x5FFD, 0x7B6F, //
    0x6BA4, 0x7B79, 0x6BAD, 0x79CF, 0x7492, 0x5B6F, 0x5B6A, 0x5BFD, //
    0x5AAD, 0x5A92, 0x72A7, 0x6926, 0x4889, 0x324B, 0x2A00, 0x0007, //
    0x4400, 0x0E7F, 0x49AE, 0x0F27, 0x13EF, 0x0FA7, 0x39A4, 0x0F79, //
    0x49AD, 0x2092, 0x106A, 0x4BAD, 0x4927, 0x0DED, 0x0D6D, 0x0F6F, //
    0x0D74, 0x0F79, 0x0D64, 0x0F8F, 0x2E93, 0x0B6F, 0x0B6A, 0x0B7A, //
    0x0A95, 0x0B79, 0x0E57, 0x3593, 0x2492, 0x64D6, 0x0780,
];
const MIDDLE_DOT: u16 = 0x0080;
const FALLBACK: u16 = 0x72C2;

pub fn glyph_advance(scale: i32) -> i32 {
    (GLYPH_WIDTH + 1) * scale.max(1)
}

pub fn line_advance(scale: i32) -> i32 {
    (GLYPH_HEIGHT + 2) * scale.max(1)
}

pub fn text_width(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        return 0;
    }
    count * glyph_advance(scale) - scale.max(1)
}

fn glyph_bits(ch: char) -> u16 {
    match ch {
        ' '..='~' => ASCII_GLYPHS[ch as usize - 32],
        '·' => MIDDLE_DOT,
        _ => FALLBACK,
    }
}

/// Longest prefix of `text` that fits in `max_width` pixels.
pub fn fit_text(text: &str, scale: i32, max_width: i32) -> &str {
    let advance = glyph_advance(scale);
    let mut width = -scale.max(1);
    for (index, _) in text.char_indices() {
        width += advance;
        if width > max_width {
            return &text[..index];
        }
    }
    text
}

/// Draws `text` with its top-left at (x, y). Returns the x after the last glyph.
pub fn draw_text(
    canvas: &mut Canvas<'_>,
    x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: Color,
) -> i32 {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        if pen_x >= canvas.width() as i32 {
            break;
        }
        draw_glyph(canvas, pen_x, y, glyph_bits(ch), scale, color);
        pen_x += glyph_advance(scale);
    }
    pen_x
}

fn draw_glyph(canvas: &mut Canvas<'_>, x: i32, y: i32, bits: u16, scale: i32, color: Color) {
    for row in 0..GLYPH_HEIGHT {
        let row_bits = (bits >> (GLYPH_WIDTH * (GLYPH_HEIGHT - 1 - row))) & 0b111;
        for col in 0..GLYPH_WIDTH {
            if row_bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            canvas.fill_rect(x + col * scale, y + row * scale, scale, scale, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(text: &str, scale: i32) -> usize {
        let (width, height) = (64u32, 16u32);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        let mut canvas = Canvas::new(&mut frame, width, height);
        draw_text(&mut canvas, 0, 0, text, scale, [255, 255, 255, 255]);
        frame.chunks_exact(4).filter(|pixel| pixel[0] == 255).count()
    }

    #[test]
    fn table_covers_printable_ascii() {
        assert_eq!(ASCII_GLYPHS.len(), ('~' as usize) - (' ' as usize) + 1);
        assert_eq!(glyph_bits(' '), 0);
        assert_ne!(glyph_bits('A'), glyph_bits('B'));
    }

    #[test]
    fn width_follows_scale() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("a", 1), 3);
        assert_eq!(text_width("abc", 2), 3 * 8 - 2);
        assert_eq!(line_advance(3), 21);
    }

    #[test]
    fn glyph_rows_decode_top_first() {
        // '-' is a single lit middle row.
        assert_eq!(lit_pixels("-", 1), 3);
        assert_eq!(lit_pixels("-", 2), 12);
        // '.' is the bottom-centre pixel only.
        let mut frame = vec![0u8; 3 * 5 * 4];
        let mut canvas = Canvas::new(&mut frame, 3, 5);
        draw_text(&mut canvas, 0, 0, ".", 1, [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(1, 4), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn non_ascii_draws_fallback_except_middle_dot() {
        assert_eq!(lit_pixels("·", 1), 1);
        assert!(lit_pixels("\u{1F7E1}", 1) > 0);
    }

    #[test]
    fn fit_text_truncates_on_char_boundaries() {
        assert_eq!(fit_text("hello", 1, 100), "hello");
        assert_eq!(fit_text("hello", 1, 7), "he");
        assert_eq!(fit_text("héllo", 1, 11), "hél");
        assert_eq!(fit_text("hello", 1, 2), "");
    }

    #[test]
    fn drawing_off_canvas_is_safe() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        let mut canvas = Canvas::new(&mut frame, 4, 4);
        draw_text(&mut canvas, -20, -3, "WORLD", 3, [1, 1, 1, 255]);
        draw_text(&mut canvas, 100, 100, "WORLD", 3, [1, 1, 1, 255]);
    }
}
