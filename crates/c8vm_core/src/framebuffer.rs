use std::fmt;

use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// The 64×32 monochrome display.
///
/// One `u64` per row; the most significant bit is the leftmost column.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Framebuffer {
    rows: [u64; SCREEN_HEIGHT],
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            rows: [0; SCREEN_HEIGHT],
        }
    }
}

impl Framebuffer {
    pub fn rows(&self) -> &[u64; SCREEN_HEIGHT] {
        &self.rows
    }

    #[inline]
    fn mask(x: usize) -> u64 {
        (1u64 << 63) >> (x % SCREEN_WIDTH)
    }

    /// Coordinates wrap around the screen edges.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.rows[y % SCREEN_HEIGHT] & Self::mask(x) != 0
    }

    /// Flip one pixel and return its new state.
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let row = &mut self.rows[y % SCREEN_HEIGHT];
        *row ^= Self::mask(x);
        *row & Self::mask(x) != 0
    }

    pub fn clear(&mut self) {
        self.rows = [0; SCREEN_HEIGHT];
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|row| *row == 0)
    }

    /// Every pixel in row-major order as `(x, y, lit)`.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        (0..SCREEN_HEIGHT)
            .flat_map(|y| (0..SCREEN_WIDTH).map(move |x| (x, y)))
            .map(|(x, y)| (x, y, self.pixel(x, y)))
    }
}

/// Renders lit pixels as `#` and dark ones as `.`, one line per row.
impl fmt::Display for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                f.write_str(if self.pixel(x, y) { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rows.iter().map(|row| format!("{:064b}", row)))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelChange {
    pub x: usize,
    pub y: usize,
    /// State after the change.
    pub lit: bool,
}

/// What the last cycle did to the display.
///
/// When `cleared` is set the screen was blanked before `pixels` were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameChanges {
    pub changed: bool,
    pub cleared: bool,
    pub pixels: Vec<PixelChange>,
}

impl FrameChanges {
    pub(crate) fn reset(&mut self) {
        self.changed = false;
        self.cleared = false;
        self.pixels.clear();
    }

    pub(crate) fn mark_cleared(&mut self) {
        self.changed = true;
        self.cleared = true;
        self.pixels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_is_leftmost_column() {
        let mut fb = Framebuffer::default();
        assert!(fb.toggle(0, 0));
        assert_eq!(fb.rows()[0], 0x8000_0000_0000_0000);
        fb.toggle(63, 1);
        assert_eq!(fb.rows()[1], 0x1);
    }

    #[test]
    fn coordinates_wrap() {
        let mut fb = Framebuffer::default();
        fb.toggle(64 + 3, 32 + 2);
        assert!(fb.pixel(3, 2));
    }

    #[test]
    fn toggle_twice_restores() {
        let mut fb = Framebuffer::default();
        fb.toggle(10, 10);
        assert!(!fb.toggle(10, 10));
        assert!(fb.is_blank());
    }

    #[test]
    fn renders_as_text() {
        let mut fb = Framebuffer::default();
        fb.toggle(1, 0);
        let text = fb.to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first.len(), SCREEN_WIDTH);
        assert!(first.starts_with(".#."));
        assert_eq!(text.lines().count(), SCREEN_HEIGHT);
    }

    #[test]
    fn pixels_iterates_row_major() {
        let mut fb = Framebuffer::default();
        fb.toggle(2, 1);
        let lit: Vec<_> = fb.pixels().filter(|(_, _, on)| *on).collect();
        assert_eq!(lit, vec![(2, 1, true)]);
        assert_eq!(fb.pixels().count(), SCREEN_WIDTH * SCREEN_HEIGHT);
    }
}
