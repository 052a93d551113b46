use std::borrow::Cow;
use std::io::Write;

use anyhow::Result;
use c8vm_core::{Framebuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
use c8vm_sdl2::c8vm_common::Color;

/// Hundredths of a second each frame is shown for.
pub const FRAME_DELAY: u16 = 2;

/// Encode `frames` as a looping two-color GIF, one image per frame.
pub fn write_gif<W: Write>(
    out: W,
    frames: &[Framebuffer],
    foreground: Color,
    background: Color,
) -> Result<()> {
    // index 0 is dark, index 1 is lit
    let palette = [
        background.r,
        background.g,
        background.b,
        foreground.r,
        foreground.g,
        foreground.b,
    ];
    let mut encoder = gif::Encoder::new(out, SCREEN_WIDTH as u16, SCREEN_HEIGHT as u16, &palette)?;
    encoder.set_repeat(gif::Repeat::Infinite)?;
    for frame in frames {
        let indices: Vec<u8> = frame.pixels().map(|(_, _, lit)| lit as u8).collect();
        let image = gif::Frame {
            width: SCREEN_WIDTH as u16,
            height: SCREEN_HEIGHT as u16,
            delay: FRAME_DELAY,
            buffer: Cow::Owned(indices),
            ..gif::Frame::default()
        };
        encoder.write_frame(&image)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = gif::DecodeOptions::new().read_info(bytes).unwrap();
        let mut images = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            assert_eq!(frame.width as usize, SCREEN_WIDTH);
            assert_eq!(frame.height as usize, SCREEN_HEIGHT);
            images.push(frame.buffer.to_vec());
        }
        images
    }

    #[test]
    fn writes_one_image_per_frame() {
        let mut first = Framebuffer::default();
        first.toggle(0, 0);
        let mut second = first;
        second.toggle(63, 31);
        let frames = [first, second, Framebuffer::default()];

        let mut bytes = Vec::new();
        write_gif(&mut bytes, &frames, Color::WHITE, Color::BLACK).unwrap();

        let images = decode(&bytes);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0][0], 1);
        assert_eq!(images[0][SCREEN_WIDTH * SCREEN_HEIGHT - 1], 0);
        assert_eq!(images[1][SCREEN_WIDTH * SCREEN_HEIGHT - 1], 1);
        assert!(images[2].iter().all(|i| *i == 0));
    }
}
