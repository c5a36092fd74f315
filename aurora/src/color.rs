use std::fmt;

/// A linear RGB triple with each channel in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#RRGGBB` or `RRGGBB`, case-insensitive.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .ok()
                .map(|value| f32::from(value) / 255.0)
        };

        Some(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }

    /// Malformed colors are drawn as black. They never halt a frame.
    pub fn from_hex_or_black(hex: &str) -> Self {
        Self::from_hex(hex).unwrap_or(Self::BLACK)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_byte = |channel: f32| (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(
            f,
            "#{:02x}{:02x}{:02x}",
            to_byte(self.red),
            to_byte(self.green),
            to_byte(self.blue)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_hex_with_and_without_hash() {
        let cyan = Rgb::from_hex("#00d4ff").unwrap();
        assert_relative_eq!(cyan.red, 0.0);
        assert_relative_eq!(cyan.green, 212.0 / 255.0);
        assert_relative_eq!(cyan.blue, 1.0);

        assert_eq!(Rgb::from_hex("8B5CF6"), Rgb::from_hex("#8b5cf6"));
    }

    #[test]
    fn rejects_malformed_hex() {
        for input in ["", "#", "#fff", "#00d4f", "#00d4ff0", "#00g4ff", "#+0d4ff", "##00d4ff"] {
            assert_eq!(Rgb::from_hex(input), None, "accepted {:?}", input);
        }
    }

    #[test]
    fn falls_back_to_black() {
        assert_eq!(Rgb::from_hex_or_black("not a color"), Rgb::BLACK);
        assert_eq!(Rgb::from_hex_or_black("#ffffff"), Rgb::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn formats_back_to_hex() {
        for hex in ["#00d4ff", "#8b5cf6", "#0c1218"] {
            assert_eq!(Rgb::from_hex_or_black(hex).to_string(), hex);
        }
    }
}
