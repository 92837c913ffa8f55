use crate::core::bits;
use crate::core::value::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A shared, mutable multi-bit signal owned by the model
///
/// Writes are expected to happen inside [`crate::core::model::ModelAccess::modify`].
#[derive(Debug)]
pub struct ObservableValue {
    name: String,
    bits: u8,
    supports_high_z: bool,
    state: Mutex<Value>,
}

impl ObservableValue {
    pub fn new(name: &str, bits: u8, supports_high_z: bool) -> Self {
        Self {
            name: name.to_string(),
            bits: bits.clamp(1, 64),
            supports_high_z,
            state: Mutex::new(Value::new(0, bits)),
        }
    }

    /// Set the initial value, consuming the builder
    pub fn with_value(self, value: u64) -> Self {
        self.set_value(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn supports_high_z(&self) -> bool {
        self.supports_high_z
    }

    /// Snapshot of the current value
    pub fn get_copy(&self) -> Value {
        *self.lock()
    }

    /// Current magnitude, masked to the bit width
    pub fn value(&self) -> u64 {
        self.lock().value()
    }

    pub fn set_value(&self, value: u64) {
        *self.lock() = Value::new(value & bits::mask(self.bits), self.bits);
    }

    pub fn set_to_high_z(&self) {
        *self.lock() = Value::high_z(self.bits);
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        // A Value is replaced wholesale, so a poisoned guard still holds a consistent value
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
