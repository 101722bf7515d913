use crate::layers::ChangeFlags;
use crate::picking::PickInfo;
use crate::transitions::TransitionMap;
use bon::Builder;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Pick handler of a layer. Returning `true` marks the event handled.
pub type LayerCallback = Rc<dyn Fn(&PickInfo) -> bool>;

/// Props every layer shares.
#[derive(Clone, Builder)]
pub struct LayerProps {
    #[builder(into)]
    pub id: String,
    #[builder(default = true)]
    pub visible: bool,
    #[builder(default)]
    pub pickable: bool,
    #[builder(default = 1.0)]
    pub opacity: f32,
    /// Transition configuration by accessor name.
    #[builder(default)]
    pub transitions: TransitionMap,
    /// Bumping a trigger forces the named accessor to be recomputed.
    #[builder(default)]
    pub update_triggers: BTreeMap<String, u64>,
    pub on_hover: Option<LayerCallback>,
    pub on_click: Option<LayerCallback>,
}

impl LayerProps {
    pub fn diff(&self, old: &LayerProps) -> ChangeFlags {
        let mut changes = ChangeFlags::empty();

        let same_callbacks = same_callback(&self.on_hover, &old.on_hover)
            && same_callback(&self.on_click, &old.on_click);
        if self.visible != old.visible
            || self.pickable != old.pickable
            || self.opacity.to_bits() != old.opacity.to_bits()
            || self.transitions != old.transitions
            || !same_callbacks
        {
            changes |= ChangeFlags::PROPS_CHANGED;
        }
        if self.update_triggers != old.update_triggers {
            changes |= ChangeFlags::UPDATE_TRIGGERS_CHANGED;
        }
        changes
    }

    /// Props for a sublayer: inherits everything but the id and the handlers.
    pub fn sublayer(&self, id: impl Into<String>) -> LayerProps {
        LayerProps {
            id: id.into(),
            on_hover: None,
            on_click: None,
            ..self.clone()
        }
    }
}

fn same_callback(a: &Option<LayerCallback>, b: &Option<LayerCallback>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl Debug for LayerProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerProps")
            .field("id", &self.id)
            .field("visible", &self.visible)
            .field("pickable", &self.pickable)
            .field("opacity", &self.opacity)
            .field("transitions", &self.transitions)
            .field("update_triggers", &self.update_triggers)
            .field("on_hover", &self.on_hover.is_some())
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Duration;

    #[test]
    fn identical_props_have_no_changes() {
        let props = LayerProps::builder().id("points").build();
        assert!(props.diff(&props.clone()).is_empty());
    }

    #[test]
    fn detects_prop_and_trigger_changes() {
        let old = LayerProps::builder().id("points").build();
        let mut new = old.clone();
        new.transitions.insert(
            "get_position".to_string(),
            Duration::from_millis(100).into(),
        );
        assert_eq!(new.diff(&old), ChangeFlags::PROPS_CHANGED);

        let mut triggered = old.clone();
        triggered.update_triggers.insert("get_color".to_string(), 1);
        assert_eq!(triggered.diff(&old), ChangeFlags::UPDATE_TRIGGERS_CHANGED);
    }

    #[test]
    fn nan_opacity_is_stable() {
        let old = LayerProps::builder().id("points").opacity(f32::NAN).build();
        assert!(old.clone().diff(&old).is_empty());

        let opaque = LayerProps::builder().id("points").build();
        assert_eq!(opaque.diff(&old), ChangeFlags::PROPS_CHANGED);
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler: LayerCallback = Rc::new(|_: &PickInfo| true);
        let old = LayerProps::builder()
            .id("points")
            .on_click(handler.clone())
            .build();
        let same = LayerProps::builder().id("points").on_click(handler).build();
        let other = LayerProps::builder()
            .id("points")
            .on_click(Rc::new(|_: &PickInfo| true))
            .build();

        assert!(same.diff(&old).is_empty());
        assert_eq!(other.diff(&old), ChangeFlags::PROPS_CHANGED);
    }
}
