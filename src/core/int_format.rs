use crate::core::bits;
use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Fraction bits used for the fixed point entries of [`IntFormat::ALL`]
pub const DEFAULT_FRAC_BITS: u8 = 4;

/// How a multi-bit value is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntFormat {
    /// Decimal for narrow values, hex otherwise
    Def,
    Dec,
    DecSigned,
    Hex,
    Bin,
    Oct,
    Ascii,
    /// IEEE 754 for 32 and 64 bit values
    Float,
    /// Unsigned fixed point with the given number of fraction bits
    Fixed(u8),
    /// Signed fixed point with the given number of fraction bits
    FixedSigned(u8),
}

impl Default for IntFormat {
    fn default() -> Self {
        IntFormat::Def
    }
}

impl IntFormat {
    /// Every known format, in menu order
    pub const ALL: [IntFormat; 10] = [
        IntFormat::Def,
        IntFormat::Dec,
        IntFormat::DecSigned,
        IntFormat::Hex,
        IntFormat::Bin,
        IntFormat::Oct,
        IntFormat::Ascii,
        IntFormat::Float,
        IntFormat::Fixed(DEFAULT_FRAC_BITS),
        IntFormat::FixedSigned(DEFAULT_FRAC_BITS),
    ];

    /// Stable identifier of the format, as written in circuit files
    pub fn name(&self) -> &'static str {
        match self {
            IntFormat::Def => "def",
            IntFormat::Dec => "dec",
            IntFormat::DecSigned => "dec_signed",
            IntFormat::Hex => "hex",
            IntFormat::Bin => "bin",
            IntFormat::Oct => "oct",
            IntFormat::Ascii => "ascii",
            IntFormat::Float => "float",
            IntFormat::Fixed(_) => "fixed",
            IntFormat::FixedSigned(_) => "fixed_signed",
        }
    }

    /// Label shown in the UI
    pub fn display_name(&self) -> &'static str {
        match self {
            IntFormat::Def => "Default",
            IntFormat::Dec => "Decimal",
            IntFormat::DecSigned => "Signed Decimal",
            IntFormat::Hex => "Hexadecimal",
            IntFormat::Bin => "Binary",
            IntFormat::Oct => "Octal",
            IntFormat::Ascii => "ASCII",
            IntFormat::Float => "Floating Point",
            IntFormat::Fixed(_) => "Fixed Point",
            IntFormat::FixedSigned(_) => "Signed Fixed Point",
        }
    }

    pub fn is_fixed_point(&self) -> bool {
        matches!(self, IntFormat::Fixed(_) | IntFormat::FixedSigned(_))
    }

    /// Render a value as text suitable for editing
    pub fn format_to_edit(&self, value: &Value) -> String {
        if value.is_high_z() {
            return "Z".to_string();
        }

        let v = value.value();
        let width = value.bits();
        match self {
            IntFormat::Def => {
                if width <= 3 {
                    v.to_string()
                } else {
                    to_hex(v, width)
                }
            }
            IntFormat::Dec => v.to_string(),
            IntFormat::DecSigned => bits::sign_extend(v, width).to_string(),
            IntFormat::Hex => to_hex(v, width),
            IntFormat::Bin => format!("0b{:0w$b}", v, w = width as usize),
            IntFormat::Oct => format!("0{:0w$o}", v, w = (width as usize + 2) / 3),
            IntFormat::Ascii => match u32::try_from(v).ok().and_then(char::from_u32) {
                Some(c) if !c.is_control() => format!("'{}'", c),
                _ => v.to_string(),
            },
            IntFormat::Float => match width {
                32 => format!("{:?}", f32::from_bits(v as u32)),
                64 => format!("{:?}", f64::from_bits(v)),
                _ => v.to_string(),
            },
            IntFormat::Fixed(frac) => {
                let scaled = v as f64 / 2f64.powi(*frac as i32);
                scaled.to_string()
            }
            IntFormat::FixedSigned(frac) => {
                let scaled = bits::sign_extend(v, width) as f64 / 2f64.powi(*frac as i32);
                scaled.to_string()
            }
        }
    }
}

fn to_hex(v: u64, width: u8) -> String {
    format!("0x{:0w$X}", v, w = (width as usize + 3) / 4)
}
