use super::sprites::LoadedSprite;

pub type Color = [u8; 4];

pub const fn hex(rgb: u32) -> Color {
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255]
}

pub fn with_alpha(color: Color, alpha: f32) -> Color {
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    [color[0], color[1], color[2], alpha]
}

/// Where and how to stamp a sprite. Rotation is in radians around the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpritePlacement {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub flip_x: bool,
    pub rotation: f32,
    pub tint: Option<Color>,
}

/// Clipped drawing over an RGBA8 frame. Out-of-bounds writes are ignored.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let offset = self.offset(x, y)?;
        let mut color = [0; 4];
        color.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(color)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let byte = pixel.checked_mul(4)?;
        if byte.checked_add(4)? > self.frame.len() {
            return None;
        }
        Some(byte)
    }

    pub fn clear(&mut self, color: Color) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    pub fn put(&mut self, x: i32, y: i32, color: Color) {
        if let Some(offset) = self.offset(x, y) {
            self.frame[offset..offset + 4].copy_from_slice(&color);
        }
    }

    /// Source-over blend using the colour's own alpha; the frame stays opaque.
    pub fn blend(&mut self, x: i32, y: i32, color: Color) {
        match color[3] {
            0 => {}
            255 => self.put(x, y, color),
            alpha => {
                let Some(offset) = self.offset(x, y) else {
                    return;
                };
                let alpha = alpha as u32;
                for channel in 0..3 {
                    let dst = self.frame[offset + channel] as u32;
                    let src = color[channel] as u32;
                    self.frame[offset + channel] =
                        ((src * alpha + dst * (255 - alpha) + 127) / 255) as u8;
                }
                self.frame[offset + 3] = 255;
            }
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(w).min(self.width as i32);
        let end_y = y.saturating_add(h).min(self.height as i32);
        for py in start_y..end_y {
            for px in start_x..end_x {
                self.blend(px, py, color);
            }
        }
    }

    /// Outline drawn inward from the rect edge.
    pub fn stroke_rect(&mut self, x: i32, y: i32, w: i32, h: i32, thickness: i32, color: Color) {
        if w <= 0 || h <= 0 {
            return;
        }
        let t = thickness.max(1).min(w).min(h);
        self.fill_rect(x, y, w, t, color);
        self.fill_rect(x, y + h - t, w, t, color);
        self.fill_rect(x, y + t, t, h - 2 * t, color);
        self.fill_rect(x + w - t, y + t, t, h - 2 * t, color);
    }

    pub fn fill_rounded_rect(&mut self, x: i32, y: i32, w: i32, h: i32, radius: i32, color: Color) {
        let radius = radius.clamp(0, w.min(h) / 2);
        let r = radius as f32;
        for py in y.max(0)..(y + h).min(self.height as i32) {
            for px in x.max(0)..(x + w).min(self.width as i32) {
                let cx = if px < x + radius {
                    (x + radius) as f32
                } else if px >= x + w - radius {
                    (x + w - radius) as f32
                } else {
                    px as f32 + 0.5
                };
                let cy = if py < y + radius {
                    (y + radius) as f32
                } else if py >= y + h - radius {
                    (y + h - radius) as f32
                } else {
                    py as f32 + 0.5
                };
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r + 0.25 {
                    self.blend(px, py, color);
                }
            }
        }
    }

    /// Every pixel whose centre lies within `width / 2` of the segment.
    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        let half = (width.max(1.0)) * 0.5;
        let (min_x, max_x) = (from.0.min(to.0) - half, from.0.max(to.0) + half);
        let (min_y, max_y) = (from.1.min(to.1) - half, from.1.max(to.1) + half);
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let length_sq = dx * dx + dy * dy;

        let x0 = (min_x.floor() as i32).max(0);
        let x1 = (max_x.ceil() as i32).min(self.width as i32);
        let y0 = (min_y.floor() as i32).max(0);
        let y1 = (max_y.ceil() as i32).min(self.height as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                let t = if length_sq > 0.0 {
                    (((cx - from.0) * dx + (cy - from.1) * dy) / length_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let ex = cx - (from.0 + dx * t);
                let ey = cy - (from.1 + dy * t);
                if ex * ex + ey * ey <= half * half {
                    self.blend(px, py, color);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        self.circle_band(center, 0.0, radius, color);
    }

    pub fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: Color) {
        let half = width.max(1.0) * 0.5;
        self.circle_band(center, (radius - half).max(0.0), radius + half, color);
    }

    fn circle_band(&mut self, center: (f32, f32), inner: f32, outer: f32, color: Color) {
        if outer.is_nan() || outer <= 0.0 {
            return;
        }
        let x0 = ((center.0 - outer).floor() as i32).max(0);
        let x1 = ((center.0 + outer).ceil() as i32).min(self.width as i32);
        let y0 = ((center.1 - outer).floor() as i32).max(0);
        let y1 = ((center.1 + outer).ceil() as i32).min(self.height as i32);
        let (inner_sq, outer_sq) = (inner * inner, outer * outer);
        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - center.0;
                let dy = py as f32 + 0.5 - center.1;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq <= outer_sq && (inner <= 0.0 || dist_sq >= inner_sq) {
                    self.blend(px, py, color);
                }
            }
        }
    }

    /// Nearest-neighbour sprite stamp. Fully transparent texels are skipped.
    pub fn draw_sprite(&mut self, sprite: &LoadedSprite, placement: SpritePlacement) {
        let SpritePlacement {
            center_x,
            center_y,
            width,
            height,
            flip_x,
            rotation,
            tint,
        } = placement;
        let too_small = width.is_nan() || height.is_nan() || width < 1.0 || height < 1.0;
        if too_small || sprite.width() == 0 || sprite.height() == 0 {
            return;
        }
        let (sin, cos) = rotation.sin_cos();
        let reach = if rotation == 0.0 {
            (width * 0.5, height * 0.5)
        } else {
            let radius = (width * width + height * height).sqrt() * 0.5;
            (radius, radius)
        };

        let x0 = ((center_x - reach.0).floor() as i32).max(0);
        let x1 = ((center_x + reach.0).ceil() as i32).min(self.width as i32);
        let y0 = ((center_y - reach.1).floor() as i32).max(0);
        let y1 = ((center_y + reach.1).ceil() as i32).min(self.height as i32);
        let (sprite_w, sprite_h) = (sprite.width(), sprite.height());

        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - center_x;
                let dy = py as f32 + 0.5 - center_y;
                let local_x = dx * cos + dy * sin;
                let local_y = -dx * sin + dy * cos;
                let mut u = local_x / width + 0.5;
                let v = local_y / height + 0.5;
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                if flip_x {
                    u = 1.0 - u;
                }
                let src_x = ((u * sprite_w as f32) as u32).min(sprite_w - 1);
                let src_y = ((v * sprite_h as f32) as u32).min(sprite_h - 1);
                let mut texel = sprite.pixel(src_x, src_y);
                if texel[3] == 0 {
                    continue;
                }
                if let Some(tint) = tint {
                    texel = mix(texel, tint);
                }
                self.blend(px, py, texel);
            }
        }
    }
}

fn mix(base: Color, tint: Color) -> Color {
    let amount = tint[3] as u32;
    let channel = |index: usize| {
        ((tint[index] as u32 * amount + base[index] as u32 * (255 - amount) + 127) / 255) as u8
    };
    [channel(0), channel(1), channel(2), base[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> Vec<u8> {
        vec![0; (width * height * 4) as usize]
    }

    #[test]
    fn hex_and_alpha_helpers() {
        assert_eq!(hex(0x6B4423), [0x6B, 0x44, 0x23, 255]);
        assert_eq!(with_alpha(hex(0xFFFFFF), 0.4), [255, 255, 255, 102]);
        assert_eq!(with_alpha(hex(0), 7.0)[3], 255);
    }

    #[test]
    fn writes_outside_the_frame_are_ignored() {
        let mut frame = blank(4, 4);
        let mut canvas = Canvas::new(&mut frame, 4, 4);
        canvas.put(-1, 0, [1, 1, 1, 255]);
        canvas.put(4, 0, [1, 1, 1, 255]);
        canvas.fill_rect(-10, -10, 5, 5, [9, 9, 9, 255]);
        canvas.stroke_line((-50.0, -50.0), (-20.0, -10.0), 3.0, [9, 9, 9, 255]);
        canvas.fill_circle((100.0, 100.0), 5.0, [9, 9, 9, 255]);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn fill_rect_is_clipped_to_frame() {
        let mut frame = blank(4, 4);
        let mut canvas = Canvas::new(&mut frame, 4, 4);
        canvas.fill_rect(2, 2, 10, 10, [5, 6, 7, 255]);
        assert_eq!(canvas.pixel(3, 3), Some([5, 6, 7, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(4, 4), None);
    }

    #[test]
    fn blend_mixes_by_source_alpha() {
        let mut frame = blank(1, 1);
        let mut canvas = Canvas::new(&mut frame, 1, 1);
        canvas.put(0, 0, [0, 0, 0, 255]);
        canvas.blend(0, 0, [255, 255, 255, 128]);
        let [r, g, b, a] = canvas.pixel(0, 0).expect("pixel");
        assert_eq!((r, g, b, a), (128, 128, 128, 255));
        canvas.blend(0, 0, [10, 10, 10, 0]);
        assert_eq!(canvas.pixel(0, 0), Some([128, 128, 128, 255]));
    }

    #[test]
    fn stroke_rect_leaves_interior_untouched() {
        let mut frame = blank(6, 6);
        let mut canvas = Canvas::new(&mut frame, 6, 6);
        canvas.stroke_rect(0, 0, 6, 6, 1, [200, 0, 0, 255]);
        assert_eq!(canvas.pixel(0, 0), Some([200, 0, 0, 255]));
        assert_eq!(canvas.pixel(5, 3), Some([200, 0, 0, 255]));
        assert_eq!(canvas.pixel(2, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn horizontal_line_covers_its_row() {
        let mut frame = blank(10, 5);
        let mut canvas = Canvas::new(&mut frame, 10, 5);
        canvas.stroke_line((0.0, 2.5), (10.0, 2.5), 1.0, [0, 255, 0, 255]);
        for x in 0..10 {
            assert_eq!(canvas.pixel(x, 2), Some([0, 255, 0, 255]), "x={x}");
        }
        assert_eq!(canvas.pixel(5, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn circle_stroke_is_hollow() {
        let mut frame = blank(21, 21);
        let mut canvas = Canvas::new(&mut frame, 21, 21);
        canvas.stroke_circle((10.5, 10.5), 8.0, 2.0, [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(10, 10), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(18, 10), Some([255, 255, 255, 255]));

        canvas.fill_circle((10.5, 10.5), 3.0, [1, 2, 3, 255]);
        assert_eq!(canvas.pixel(10, 10), Some([1, 2, 3, 255]));
    }

    #[test]
    fn sprite_flip_mirrors_columns_and_skips_transparent_texels() {
        let sprite =
            LoadedSprite::from_rgba(2, 1, vec![255, 0, 0, 255, 0, 0, 0, 0]).expect("sprite");
        let placement = SpritePlacement {
            center_x: 2.0,
            center_y: 1.0,
            width: 4.0,
            height: 2.0,
            flip_x: false,
            rotation: 0.0,
            tint: None,
        };

        let mut frame = blank(4, 2);
        let mut canvas = Canvas::new(&mut frame, 4, 2);
        canvas.draw_sprite(&sprite, placement);
        assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(3, 0), Some([0, 0, 0, 0]));

        let mut frame = blank(4, 2);
        let mut canvas = Canvas::new(&mut frame, 4, 2);
        canvas.draw_sprite(
            &sprite,
            SpritePlacement {
                flip_x: true,
                ..placement
            },
        );
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(3, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn tint_pulls_texels_toward_tint_colour() {
        let sprite = LoadedSprite::from_rgba(1, 1, vec![0, 0, 255, 255]).expect("sprite");
        let mut frame = blank(2, 2);
        let mut canvas = Canvas::new(&mut frame, 2, 2);
        canvas.draw_sprite(
            &sprite,
            SpritePlacement {
                center_x: 1.0,
                center_y: 1.0,
                width: 2.0,
                height: 2.0,
                flip_x: false,
                rotation: 0.0,
                tint: Some([255, 0, 0, 255]),
            },
        );
        assert_eq!(canvas.pixel(1, 1), Some([255, 0, 0, 255]));
    }
}
