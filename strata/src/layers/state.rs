use crate::attributes::AttributeManager;
use std::any::Any;
use strata_render::GpuContext;
use strata_utils::{RedrawFlag, RedrawReason};

/// State a layer keeps across descriptor updates.
///
/// When a new descriptor matches an existing layer by id it takes this state over, so
/// attributes, GPU buffers and running transitions survive prop changes.
pub struct LayerState {
    pub attribute_manager: AttributeManager,
    needs_redraw: RedrawFlag,
    needs_update: bool,
    user: Option<Box<dyn Any>>,
}

impl LayerState {
    pub fn new(id: &str, context: GpuContext) -> Self {
        Self {
            attribute_manager: AttributeManager::new(id, context),
            needs_redraw: RedrawFlag::marked("Layer created"),
            needs_update: false,
            user: None,
        }
    }

    pub fn set_needs_redraw(&mut self, reason: impl Into<RedrawReason>) {
        self.needs_redraw.mark(reason);
    }

    /// Requests an update on the next frame, outside of any prop change.
    pub fn set_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub(crate) fn clear_needs_update(&mut self) {
        self.needs_update = false;
    }

    /// Own flag or any attribute flag. Every flag is queried, and cleared when `clear` is set.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        let own = self.needs_redraw.check(clear);
        let attributes = self.attribute_manager.needs_redraw(clear);
        own.or(attributes)
    }

    pub fn set<T: Any>(&mut self, value: T) {
        self.user = Some(Box::new(value));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.user.as_ref()?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.user.as_mut()?.downcast_mut()
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        match self.user.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.user = Some(other);
                None
            }
        }
    }
}
