/// Host keys the front-ends forward to an [`App`](crate::App).
///
/// Only the keys some machine reacts to are listed; everything else maps to
/// [`Key::None`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    Num1,
    Num2,
    Num3,
    Num4,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
    P,
    Escape,
    None,
}

impl Key {
    /// The COSMAC VIP hex keypad value for this key, using the usual
    /// left-hand QWERTY layout:
    ///
    /// ```text
    /// 1 2 3 4        1 2 3 C
    /// Q W E R   ->   4 5 6 D
    /// A S D F        7 8 9 E
    /// Z X C V        A 0 B F
    /// ```
    pub fn hex_keypad(self) -> Option<u8> {
        match self {
            Key::Num1 => Some(0x1),
            Key::Num2 => Some(0x2),
            Key::Num3 => Some(0x3),
            Key::Num4 => Some(0xC),
            Key::Q => Some(0x4),
            Key::W => Some(0x5),
            Key::E => Some(0x6),
            Key::R => Some(0xD),
            Key::A => Some(0x7),
            Key::S => Some(0x8),
            Key::D => Some(0x9),
            Key::F => Some(0xE),
            Key::Z => Some(0xA),
            Key::X => Some(0x0),
            Key::C => Some(0xB),
            Key::V => Some(0xF),
            Key::P | Key::Escape | Key::None => None,
        }
    }
}
