//! Per-instance attributes of a layer and the manager that uploads them.

pub mod attribute;
pub mod manager;

pub use attribute::Attribute;
pub use manager::AttributeManager;

use snafu::Snafu;

pub type Result<T, E = AttributeError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum AttributeError {
    #[snafu(display("Attribute '{name}' isn't registered"))]
    UnknownAttribute { name: String },

    #[snafu(display(
        "Attribute '{name}' got {len} values, which isn't a multiple of its size {size}"
    ))]
    InvalidLength { name: String, len: usize, size: usize },
}
