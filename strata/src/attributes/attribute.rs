use crate::attributes::{InvalidLengthErr, Result};
use crate::transitions::{TransitionMap, TransitionSettings};
use bon::Builder;
use snafu::ensure;
use strata_render::{GpuBuffer, GpuContext};
use strata_utils::RedrawFlag;

/// A named per-instance `f32` array and the GPU buffer it is uploaded to.
#[derive(Debug, Builder)]
#[builder(finish_fn = build_inner)]
pub struct Attribute {
    #[builder(into)]
    name: String,
    /// Components per instance.
    #[builder(default = 1)]
    size: usize,
    /// Accessor name that transition settings are looked up by.
    #[builder(into)]
    transition: Option<String>,

    #[builder(skip)]
    value: Vec<f32>,
    #[builder(skip)]
    buffer: Option<GpuBuffer>,
    #[builder(skip)]
    num_instances: usize,
    #[builder(skip)]
    needs_upload: bool,
    #[builder(skip)]
    needs_redraw: RedrawFlag,
}

impl<S: attribute_builder::IsComplete> AttributeBuilder<S> {
    pub fn build(self) -> Attribute {
        let mut attribute = self.build_inner();
        attribute.size = attribute.size.max(1);
        attribute
    }
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    pub fn value(&self) -> &[f32] {
        &self.value
    }

    /// The raw, untransitioned buffer. `None` until the first upload.
    pub fn buffer(&self) -> Option<&GpuBuffer> {
        self.buffer.as_ref()
    }

    pub fn supports_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub fn transition_accessor(&self) -> Option<&str> {
        self.transition.as_deref()
    }

    /// Resolves the transition settings that apply to this attribute, if any.
    pub fn transition_setting(
        &self,
        transitions: &TransitionMap,
    ) -> crate::transitions::Result<Option<TransitionSettings>> {
        let Some(accessor) = &self.transition else {
            return Ok(None);
        };
        transitions
            .get(accessor)
            .map(|config| config.resolve())
            .transpose()
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw.is_set()
    }

    pub fn check_redraw(&mut self, clear: bool) -> bool {
        self.needs_redraw.check(clear).is_some()
    }

    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    pub fn set_value(&mut self, value: Vec<f32>) -> Result<()> {
        ensure!(
            value.len() % self.size == 0,
            InvalidLengthErr {
                name: self.name.clone(),
                len: value.len(),
                size: self.size,
            }
        );

        self.num_instances = value.len() / self.size;
        self.value = value;
        self.needs_upload = true;
        self.needs_redraw.mark(format!("{} changed", self.name));
        Ok(())
    }

    /// Uploads pending values. Returns whether anything was uploaded.
    pub fn upload(&mut self, context: &GpuContext) -> bool {
        if !self.needs_upload {
            return false;
        }
        self.needs_upload = false;

        match &mut self.buffer {
            Some(buffer) if buffer.context().same_context(context) => buffer.upload(&self.value),
            _ => self.buffer = Some(context.create_buffer(&self.name, &self.value)),
        }
        true
    }

    /// Releases the GPU buffer. The values stay and get uploaded again on demand.
    pub fn release(&mut self) {
        if self.buffer.take().is_some() {
            self.needs_upload = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::TransitionConfig;
    use web_time::Duration;

    #[test]
    fn rejects_partial_instances() {
        let mut attribute = Attribute::builder().name("positions").size(2).build();
        assert!(attribute.set_value(vec![1.0, 2.0, 3.0]).is_err());
        assert!(attribute.set_value(vec![1.0, 2.0, 3.0, 4.0]).is_ok());
        assert_eq!(attribute.num_instances(), 2);
        assert!(attribute.needs_redraw());
    }

    #[test]
    fn uploads_once_per_change() {
        let context = GpuContext::headless();
        let mut attribute = Attribute::builder().name("radius").build();
        attribute.set_value(vec![1.0, 2.0]).unwrap();

        assert!(attribute.upload(&context));
        assert!(!attribute.upload(&context));
        assert_eq!(attribute.buffer().unwrap().read(), vec![1.0, 2.0]);

        attribute.set_value(vec![5.0]).unwrap();
        assert!(attribute.upload(&context));
        assert_eq!(attribute.buffer().unwrap().read(), vec![5.0]);
    }

    #[test]
    fn looks_up_settings_by_accessor() {
        let attribute = Attribute::builder()
            .name("instancePositions")
            .transition("get_position")
            .build();
        let mut transitions = TransitionMap::new();
        assert_eq!(attribute.transition_setting(&transitions).unwrap(), None);

        transitions.insert(
            "get_position".to_string(),
            TransitionConfig::from(Duration::from_millis(200)),
        );
        assert_eq!(
            attribute.transition_setting(&transitions).unwrap(),
            Some(Duration::from_millis(200).into())
        );
    }
}
