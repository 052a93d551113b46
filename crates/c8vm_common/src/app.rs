use crate::key::Key;

/// A machine that a windowed front-end can drive once per frame.
pub trait App {
    fn init(&mut self);
    /// Advance one frame and write the picture into `screen` as packed RGB24.
    fn update(&mut self, screen: &mut [u8]);
    fn handle_key_event(&mut self, key: Key, is_down: bool);
    fn should_exit(&self) -> bool;
    fn exit(&mut self);

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn scale(&self) -> u32;
    fn title(&self) -> String;
}
