//! Views, view states and the viewports they resolve to.

pub mod manager;
pub mod view;
pub mod viewport;

pub use manager::{DEFAULT_VIEW_ID, ViewManager};
pub use view::{Extent, View, ViewStates};
pub use viewport::{ViewState, Viewport};
