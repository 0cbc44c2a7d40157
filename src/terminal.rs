use std::io::{self, Write};
use std::time::Instant;

use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture, Event, MouseEvent, MouseEventKind},
    execute, queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};

use crate::canvas::{CellBuffer, PixelCanvas};
use crate::color::Rgb;
use crate::input::InputEvent;
use crate::math::ScreenPoint;
use crate::projector::Viewport;
use crate::surface::{Clock, Listener, Listeners, Paint, Surface};

pub(crate) struct Terminal {
    out: io::Stdout,
    cols: u16,
    rows: u16,
    prev: CellBuffer,
    cur: CellBuffer,
    canvas: PixelCanvas,
    full_redraw: bool,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        let (cols, rows) = match enter(&mut out, terminal::size) {
            Ok(size) => size,
            Err(e) => {
                let _ = terminal::disable_raw_mode();
                return Err(e.into());
            }
        };
        log::info!("terminal {cols}x{rows} cells");
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
            // Braille: 2×4 pixels per cell
            canvas: PixelCanvas::new(cols as u32 * 2, rows as u32 * 4),
            full_redraw: true,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.prev = CellBuffer::new(cols, rows);
        self.cur = CellBuffer::new(cols, rows);
        self.canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);
        self.full_redraw = true;
    }

    pub(crate) fn viewport(&self) -> Option<Viewport> {
        Viewport::new(self.canvas.w as f32, self.canvas.h as f32, 1.0)
    }
}

impl Surface for Terminal {
    fn clear(&mut self, color: Rgb) {
        self.canvas.clear(color);
    }

    fn line(&mut self, a: ScreenPoint, b: ScreenPoint, paint: Paint) {
        self.canvas.line(a, b, paint);
    }

    fn fill_polygon(&mut self, pts: &[ScreenPoint], paint: Paint) {
        self.canvas.fill_polygon(pts, paint);
    }

    fn circle(&mut self, center: ScreenPoint, radius: f32, paint: Paint) {
        self.canvas.circle(center, radius, paint);
    }

    fn text(&mut self, at: ScreenPoint, s: &str, paint: Paint) {
        self.canvas.text(at, s, paint);
    }

    fn present(&mut self) -> io::Result<()> {
        self.canvas.to_cells(&mut self.cur);
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if !self.full_redraw && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        self.full_redraw = false;
        Ok(())
    }
}

// Switches to the alternate screen and reads the size; any failure leaves
// the screen again before returning.
fn enter<W: Write>(
    out: &mut W,
    size: impl FnOnce() -> io::Result<(u16, u16)>,
) -> io::Result<(u16, u16)> {
    let entered = execute!(
        out,
        EnterAlternateScreen,
        cursor::Hide,
        DisableLineWrap,
        terminal::Clear(ClearType::All)
    )
    .and_then(|()| size());
    if entered.is_err() {
        let _ = execute!(out, cursor::Show, EnableLineWrap, LeaveAlternateScreen);
    }
    entered
}

pub(crate) struct TerminalClock {
    start: Instant,
    requested: bool,
}

impl TerminalClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            requested: false,
        }
    }

    pub(crate) fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.requested)
    }
}

impl Clock for TerminalClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn request_tick(&mut self) {
        self.requested = true;
    }
}

// Keyboard and resize come with raw mode; pointer needs mouse capture.
// Terminals have no touch or orientation sources.
#[derive(Default)]
pub(crate) struct TerminalListeners {
    mouse: bool,
}

impl Listeners for TerminalListeners {
    fn attach(&mut self, listener: Listener) -> bool {
        match listener {
            Listener::Keyboard | Listener::Resize => true,
            Listener::Pointer => match execute!(io::stdout(), EnableMouseCapture) {
                Ok(()) => {
                    self.mouse = true;
                    true
                }
                Err(e) => {
                    log::warn!("mouse capture unavailable: {e}");
                    false
                }
            },
            Listener::Touch | Listener::Orientation => false,
        }
    }

    fn detach(&mut self, listener: Listener) {
        if listener == Listener::Pointer && self.mouse {
            if let Err(e) = execute!(io::stdout(), DisableMouseCapture) {
                log::warn!("could not release mouse capture: {e}");
            }
            self.mouse = false;
        }
    }
}

pub(crate) fn map_event(ev: &Event) -> Option<InputEvent> {
    match ev {
        Event::Mouse(MouseEvent {
            kind, column, row, ..
        }) => {
            // centre of the cell in braille pixels
            let x = *column as f32 * 2.0 + 1.0;
            let y = *row as f32 * 4.0 + 2.0;
            match kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                    Some(InputEvent::PointerMove { x, y })
                }
                MouseEventKind::Down(_) => Some(InputEvent::PointerDown { x, y }),
                _ => None,
            }
        }
        Event::Resize(cols, rows) => Some(InputEvent::Resize {
            width: *cols as f32 * 2.0,
            height: *rows as f32 * 4.0,
            dpr: 1.0,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyModifiers, MouseButton};

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn mouse_maps_to_subpixels() {
        assert_eq!(
            map_event(&mouse(MouseEventKind::Moved, 10, 5)),
            Some(InputEvent::PointerMove { x: 21.0, y: 22.0 })
        );
        assert_eq!(
            map_event(&mouse(MouseEventKind::Down(MouseButton::Left), 0, 0)),
            Some(InputEvent::PointerDown { x: 1.0, y: 2.0 })
        );
        assert_eq!(map_event(&mouse(MouseEventKind::ScrollUp, 0, 0)), None);
    }

    #[test]
    fn resize_maps_to_pixels() {
        assert_eq!(
            map_event(&Event::Resize(80, 24)),
            Some(InputEvent::Resize {
                width: 160.0,
                height: 96.0,
                dpr: 1.0
            })
        );
        assert_eq!(
            map_event(&Event::Resize(0, 0)),
            Some(InputEvent::Resize {
                width: 0.0,
                height: 0.0,
                dpr: 1.0
            })
        );
    }

    #[test]
    fn unsupported_listeners_refuse() {
        let mut l = TerminalListeners::default();
        assert!(!l.attach(Listener::Touch));
        assert!(!l.attach(Listener::Orientation));
        assert!(l.attach(Listener::Keyboard));
        l.detach(Listener::Keyboard);
    }

    #[test]
    fn failed_setup_leaves_the_alternate_screen() {
        let mut out = Vec::new();
        let r = enter(&mut out, || Err(io::Error::new(io::ErrorKind::Other, "no tty")));
        assert!(r.is_err());
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("\x1b[?1049h"));
        assert!(text.ends_with("\x1b[?1049l"));

        let mut out = Vec::new();
        assert_eq!(enter(&mut out, || Ok((80, 24))).ok(), Some((80, 24)));
        assert!(!String::from_utf8_lossy(&out).contains("\x1b[?1049l"));
    }

    #[test]
    fn clock_requests_are_taken_once() {
        let mut c = TerminalClock::new();
        assert!(!c.take_request());
        c.request_tick();
        assert!(c.take_request());
        assert!(!c.take_request());
        assert!(c.now() >= 0.0);
    }
}
