pub mod bits;
pub mod value;
pub mod int_format;
pub mod observable;
pub mod model;
pub mod circuit;

pub use value::Value;
pub use int_format::IntFormat;
pub use observable::ObservableValue;
pub use model::{Model, ModelAccess, ModelError, ModelEvent};
