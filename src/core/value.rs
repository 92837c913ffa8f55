use crate::core::bits;
use crate::core::observable::ObservableValue;
use std::fmt;

/// An immutable snapshot of a multi-bit logic value
///
/// Bits set in `high_z` are floating; a value with every bit floating is
/// the high impedance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    value: u64,
    high_z: u64,
    bits: u8,
}

impl Value {
    /// Create a defined value, masking the magnitude to the bit width
    pub fn new(value: u64, bits: u8) -> Self {
        let bits = bits.clamp(1, 64);
        Self {
            value: value & bits::mask(bits),
            high_z: 0,
            bits,
        }
    }

    /// Create a value with every bit in the high impedance state
    pub fn high_z(bits: u8) -> Self {
        let bits = bits.clamp(1, 64);
        Self {
            value: 0,
            high_z: bits::mask(bits),
            bits,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// True if any bit is floating
    pub fn is_high_z(&self) -> bool {
        self.high_z != 0
    }

    /// Check a single bit of the defined part of the value
    pub fn bit(&self, bit: u8) -> bool {
        bit < self.bits && self.value & (1u64 << bit) != 0
    }

    /// Return a defined copy with `bit` set or cleared
    pub fn with_bit(&self, bit: u8, set: bool) -> Self {
        if bit >= self.bits {
            return *self;
        }
        let flag = 1u64 << bit;
        if set {
            Self::new(self.value | flag, self.bits)
        } else {
            Self::new(self.value & !flag, self.bits)
        }
    }

    /// Write this value into a target cell
    pub fn apply_to(&self, target: &ObservableValue) {
        if self.is_high_z() {
            target.set_to_high_z();
        } else {
            target.set_value(self.value);
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high_z == bits::mask(self.bits) {
            return write!(f, "Z");
        }
        for bit in (0..self.bits).rev() {
            let flag = 1u64 << bit;
            let c = if self.high_z & flag != 0 {
                'z'
            } else if self.value & flag != 0 {
                '1'
            } else {
                '0'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
