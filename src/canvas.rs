use crossterm::style::Color;

use crate::color::Rgb;
use crate::math::ScreenPoint;
use crate::surface::Paint;

// Halo radius beyond which glow is clipped; keeps per-primitive cost bounded.
const MAX_GLOW: f32 = 6.0;
// Luma spread below which a cell is drawn as a flat background.
const FLAT_CELL: f32 = 0.06;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        (x < self.w && y < self.h).then(|| &self.cells[self.idx(x, y)])
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
}

struct TextSpan {
    col: u16,
    row: u16,
    text: String,
    color: Rgb,
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    px: Vec<Rgb>,
    spans: Vec<TextSpan>,
    crossings: Vec<f32>,
}

fn to_color(c: Rgb) -> Color {
    Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Rgb::BLACK; (w as usize) * (h as usize)],
            spans: Vec::new(),
            crossings: Vec::with_capacity(16),
        }
    }

    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub(crate) fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        (x < self.w && y < self.h).then(|| self.px[self.idx(x, y)])
    }

    pub(crate) fn clear(&mut self, c: Rgb) {
        self.px.fill(c);
        self.spans.clear();
    }

    fn blend(&mut self, x: i32, y: i32, c: Rgb, alpha: f32) {
        if x < 0 || y < 0 || alpha <= 0.0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        self.px[i] = if alpha >= 1.0 { c } else { self.px[i].lerp(c, alpha) };
    }

    fn span(&mut self, y: i32, x0: f32, x1: f32, c: Rgb, alpha: f32) -> bool {
        if y < 0 || y as u32 >= self.h {
            return false;
        }
        let a = (x0 - 0.5).ceil().max(0.0) as i32;
        let b = (x1 - 0.5).floor().min(self.w as f32 - 1.0) as i32;
        for x in a..=b {
            self.blend(x, y, c, alpha);
        }
        b >= a
    }

    // Clips `a`-`b` to the canvas (plus a one pixel margin). Works in f64 so
    // far-off endpoints keep their precision.
    fn clip(&self, a: ScreenPoint, b: ScreenPoint) -> Option<((f64, f64), (f64, f64))> {
        let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
        let (xmin, ymin) = (-1.0f64, -1.0f64);
        let (xmax, ymax) = (self.w as f64 + 1.0, self.h as f64 + 1.0);
        let (dx, dy) = (bx - ax, by - ay);
        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        for (p, q) in [(-dx, ax - xmin), (dx, xmax - ax), (-dy, ay - ymin), (dy, ymax - ay)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
            } else {
                let r = q / p;
                if p < 0.0 {
                    t0 = t0.max(r);
                } else {
                    t1 = t1.min(r);
                }
                if t0 > t1 {
                    return None;
                }
            }
        }
        Some(((ax + dx * t0, ay + dy * t0), (ax + dx * t1, ay + dy * t1)))
    }

    fn stroke(&mut self, a: ScreenPoint, b: ScreenPoint, c: Rgb, alpha: f32) {
        let Some(((ax, ay), (bx, by))) = self.clip(a, b) else { return };
        let (dx, dy) = (bx - ax, by - ay);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
        let n = steps as i32;
        for i in 0..=n {
            let x = ax + dx * i as f64 / steps;
            let y = ay + dy * i as f64 / steps;
            self.blend(x.floor() as i32, y.floor() as i32, c, alpha);
        }
    }

    pub(crate) fn line(&mut self, a: ScreenPoint, b: ScreenPoint, paint: Paint) {
        if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
            return;
        }
        let glow = paint.glow.min(MAX_GLOW);
        if glow >= 1.0 {
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = (dx * dx + dy * dy).sqrt().max(1e-3);
            let (nx, ny) = (-dy / len, dx / len);
            let rings = glow as i32;
            for k in 1..=rings {
                let fall = 1.0 - k as f32 / (rings + 1) as f32;
                let alpha = paint.alpha * 0.3 * fall * fall;
                for side in [-1.0f32, 1.0] {
                    let off = side * k as f32;
                    let o = |p: ScreenPoint| ScreenPoint::new(p.x + nx * off, p.y + ny * off);
                    self.stroke(o(a), o(b), paint.color, alpha);
                }
            }
        }
        self.stroke(a, b, paint.color, paint.alpha);
    }

    pub(crate) fn circle(&mut self, center: ScreenPoint, radius: f32, paint: Paint) {
        if !(center.x.is_finite() && center.y.is_finite() && radius.is_finite()) {
            return;
        }
        let r = radius.max(0.5);
        let glow = paint.glow.clamp(0.0, MAX_GLOW);
        let outer = r + glow;
        let x0 = (center.x - outer).floor().max(0.0) as i32;
        let x1 = (center.x + outer).ceil().min(self.w as f32 - 1.0) as i32;
        let y0 = (center.y - outer).floor().max(0.0) as i32;
        let y1 = (center.y + outer).ceil().min(self.h as f32 - 1.0) as i32;
        if x0 > x1 || y0 > y1 {
            return;
        }
        let mut hit = false;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = ScreenPoint::new(x as f32 + 0.5, y as f32 + 0.5).dist(center);
                if d <= r {
                    self.blend(x, y, paint.color, paint.alpha);
                    hit = true;
                } else if glow > 0.0 && d < outer {
                    let fall = 1.0 - (d - r) / glow;
                    self.blend(x, y, paint.color, paint.alpha * 0.35 * fall * fall);
                }
            }
        }
        if !hit {
            self.blend(center.x.floor() as i32, center.y.floor() as i32, paint.color, paint.alpha);
        }
    }

    pub(crate) fn fill_polygon(&mut self, pts: &[ScreenPoint], paint: Paint) {
        if pts.len() < 3 || pts.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return;
        }
        let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in pts {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if max_x < 0.0 || max_y < 0.0 || min_x >= self.w as f32 || min_y >= self.h as f32 {
            return;
        }

        let y0 = min_y.floor().max(0.0) as i32;
        let y1 = max_y.ceil().min(self.h as f32 - 1.0) as i32;
        let mut crossings = std::mem::take(&mut self.crossings);
        let mut filled = false;
        for y in y0..=y1 {
            let yc = y as f32 + 0.5;
            crossings.clear();
            for (i, a) in pts.iter().enumerate() {
                let b = pts[(i + 1) % pts.len()];
                if (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y) {
                    crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                filled |= self.span(y, pair[0], pair[1], paint.color, paint.alpha);
            }
        }
        self.crossings = crossings;

        // sub-pixel polygons still leave a mark
        if !filled {
            let n = pts.len() as f32;
            let cx = pts.iter().map(|p| p.x).sum::<f32>() / n;
            let cy = pts.iter().map(|p| p.y).sum::<f32>() / n;
            self.blend(cx.floor() as i32, cy.floor() as i32, paint.color, paint.alpha);
        }
    }

    pub(crate) fn text(&mut self, at: ScreenPoint, s: &str, paint: Paint) {
        if !(at.x.is_finite() && at.y.is_finite()) || at.x < 0.0 || at.y < 0.0 {
            return;
        }
        let col = (at.x / 2.0) as u32;
        let row = (at.y / 4.0) as u32;
        if col >= self.w / 2 || row >= self.h / 4 {
            return;
        }
        self.spans.push(TextSpan {
            col: col as u16,
            row: row as u16,
            text: s.to_string(),
            color: paint.color,
        });
    }

    // Converts the raster to braille cells. Each cell's brighter pixels become
    // dots in the averaged foreground; the rest average into the background.
    pub(crate) fn to_cells(&self, out: &mut CellBuffer) {
        let cols = out.w as u32;
        let rows = out.h as u32;

        for cy in 0..rows {
            for cx in 0..cols {
                let mut samples = [(Rgb::BLACK, 0.0f32, 0u8); 8];
                let mut n = 0;
                let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
                for dy in 0..4 {
                    for dx in 0..2 {
                        let Some(p) = self.get(cx * 2 + dx, cy * 4 + dy) else {
                            continue;
                        };
                        let l = p.luma();
                        lo = lo.min(l);
                        hi = hi.max(l);
                        samples[n] = (p, l, braille_bit(dx, dy));
                        n += 1;
                    }
                }
                if n == 0 {
                    continue;
                }

                let cell = if hi - lo < FLAT_CELL {
                    let bg = to_color(average(samples[..n].iter().map(|s| s.0)));
                    Cell { ch: ' ', fg: bg, bg }
                } else {
                    let mid = (hi + lo) * 0.5;
                    let mut mask = 0u8;
                    for s in &samples[..n] {
                        if s.1 > mid {
                            mask |= s.2;
                        }
                    }
                    let fg = average(samples[..n].iter().filter(|s| s.1 > mid).map(|s| s.0));
                    let bg = average(samples[..n].iter().filter(|s| s.1 <= mid).map(|s| s.0));
                    Cell {
                        ch: char::from_u32(0x2800 + mask as u32).unwrap_or(' '),
                        fg: to_color(fg),
                        bg: to_color(bg),
                    }
                };
                out.set(cx as u16, cy as u16, cell);
            }
        }

        for span in &self.spans {
            for (i, ch) in span.text.chars().enumerate() {
                let x = span.col as usize + i;
                if x >= out.w as usize {
                    break;
                }
                let x = x as u16;
                let bg = out.get(x, span.row).map_or(Color::Black, |c| c.bg);
                out.set(
                    x,
                    span.row,
                    Cell {
                        ch,
                        fg: to_color(span.color),
                        bg,
                    },
                );
            }
        }
    }
}

fn average(colors: impl Iterator<Item = Rgb>) -> Rgb {
    let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
    for c in colors {
        r += c.r as u32;
        g += c.g as u32;
        b += c.b as u32;
        n += 1;
    }
    match n {
        0 => Rgb::BLACK,
        n => Rgb::new((r / n) as u8, (g / n) as u8, (b / n) as u8),
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(c: &PixelCanvas) -> usize {
        c.px.iter().filter(|p| **p != Rgb::BLACK).count()
    }

    fn pt(x: f32, y: f32) -> ScreenPoint {
        ScreenPoint::new(x, y)
    }

    #[test]
    fn square_fill_covers_its_area() {
        let mut c = PixelCanvas::new(20, 20);
        c.fill_polygon(
            &[pt(2.0, 2.0), pt(12.0, 2.0), pt(12.0, 12.0), pt(2.0, 12.0)],
            Paint::solid(Rgb::WHITE),
        );
        assert_eq!(lit(&c), 100);
        assert_eq!(c.get(2, 2), Some(Rgb::WHITE));
        assert_eq!(c.get(12, 12), Some(Rgb::BLACK));
    }

    #[test]
    fn tiny_polygons_leave_one_pixel() {
        let mut c = PixelCanvas::new(10, 10);
        c.fill_polygon(
            &[pt(4.1, 4.1), pt(4.3, 4.1), pt(4.3, 4.3)],
            Paint::solid(Rgb::WHITE),
        );
        assert_eq!(lit(&c), 1);
        assert_eq!(c.get(4, 4), Some(Rgb::WHITE));
    }

    #[test]
    fn lines_clip_instead_of_walking_forever() {
        let mut c = PixelCanvas::new(40, 20);
        c.line(pt(-1e9, 10.0), pt(1e9, 10.0), Paint::solid(Rgb::WHITE));
        assert_eq!(lit(&c), 40);
        c.line(pt(-5.0, -5.0), pt(-50.0, -50.0), Paint::solid(Rgb::BLACK.lerp(Rgb::WHITE, 0.5)));
        assert_eq!(lit(&c), 40);
        c.line(pt(f32::NAN, 0.0), pt(3.0, 3.0), Paint::solid(Rgb::WHITE));
    }

    #[test]
    fn glow_widens_lines_softly() {
        let mut c = PixelCanvas::new(20, 20);
        c.line(pt(0.0, 10.5), pt(19.0, 10.5), Paint::solid(Rgb::WHITE).glow(2.0));
        assert_eq!(c.get(5, 10), Some(Rgb::WHITE));
        let halo = c.get(5, 8).map(|p| p.luma()).unwrap_or(0.0);
        assert!(halo > 0.0 && halo < 0.5);
    }

    #[test]
    fn alpha_blends_toward_paint() {
        let mut c = PixelCanvas::new(4, 4);
        c.circle(pt(2.0, 2.0), 1.0, Paint::solid(Rgb::WHITE).alpha(0.5));
        let p = c.get(2, 2).unwrap();
        assert!((120..=135).contains(&p.r));
    }

    #[test]
    fn braille_cells_split_bright_and_dark() {
        let mut c = PixelCanvas::new(2, 4);
        c.clear(Rgb::new(10, 10, 40));
        // left column lit
        c.fill_polygon(
            &[pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 4.0), pt(0.0, 4.0)],
            Paint::solid(Rgb::WHITE),
        );
        let mut out = CellBuffer::new(1, 1);
        c.to_cells(&mut out);
        let cell = out.cells[0];
        assert_eq!(cell.ch, char::from_u32(0x2800 + 0x47).unwrap());
        assert_eq!(cell.fg, Color::Rgb { r: 255, g: 255, b: 255 });
        assert_eq!(cell.bg, Color::Rgb { r: 10, g: 10, b: 40 });
    }

    #[test]
    fn flat_cells_are_plain_background() {
        let mut c = PixelCanvas::new(4, 4);
        c.clear(Rgb::new(30, 0, 60));
        let mut out = CellBuffer::new(2, 1);
        c.to_cells(&mut out);
        assert!(out.cells.iter().all(|cell| cell.ch == ' '));
        assert_eq!(out.cells[1].bg, Color::Rgb { r: 30, g: 0, b: 60 });
    }

    #[test]
    fn text_overlays_cells_and_clears_with_frame() {
        let mut c = PixelCanvas::new(20, 8);
        c.text(pt(4.0, 4.0), "hi", Paint::solid(Rgb::WHITE));
        let mut out = CellBuffer::new(10, 2);
        c.to_cells(&mut out);
        assert_eq!(out.get(2, 1).map(|c| c.ch), Some('h'));
        assert_eq!(out.get(3, 1).map(|c| c.ch), Some('i'));

        c.clear(Rgb::BLACK);
        let mut out = CellBuffer::new(10, 2);
        c.to_cells(&mut out);
        assert_eq!(out.get(2, 1).map(|c| c.ch), Some(' '));
    }
}
