//! Effects hook into the screen pass before and after layers are drawn.

use std::collections::HashSet;
use strata_render::GpuContext;
use strata_utils::{RedrawFlag, RedrawReason};
use tracing::debug;

/// Passed to the effect hooks of one render pass.
pub struct EffectContext<'a> {
    pub gpu: &'a GpuContext,
    pub pass: &'a str,
    pub frame_number: u64,
}

pub trait Effect {
    fn id(&self) -> &str;

    fn pre_render(&mut self, _context: &EffectContext) {}

    fn post_render(&mut self, _context: &EffectContext) {}

    /// Releases resources once the effect is removed or the deck is finalized.
    fn cleanup(&mut self) {}
}

pub struct EffectManager {
    effects: Vec<Box<dyn Effect>>,
    needs_redraw: RedrawFlag,
    finalized: bool,
}

impl Default for EffectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectManager {
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            needs_redraw: RedrawFlag::default(),
            finalized: false,
        }
    }

    pub fn effects(&self) -> impl Iterator<Item = &dyn Effect> {
        self.effects.iter().map(|effect| effect.as_ref())
    }

    /// Replaces the effect list. Effects whose id is gone are cleaned up.
    pub fn set_effects(&mut self, effects: Vec<Box<dyn Effect>>) {
        if self.finalized {
            return;
        }

        let kept: HashSet<&str> = effects.iter().map(|effect| effect.id()).collect();
        for old in &mut self.effects {
            if !kept.contains(old.id()) {
                debug!("Cleaning up effect {:?}", old.id());
                old.cleanup();
            }
        }

        self.effects = effects;
        self.needs_redraw.mark("Effects changed");
    }

    pub fn pre_render(&mut self, context: &EffectContext) {
        for effect in &mut self.effects {
            effect.pre_render(context);
        }
    }

    pub fn post_render(&mut self, context: &EffectContext) {
        for effect in self.effects.iter_mut().rev() {
            effect.post_render(context);
        }
    }

    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        self.needs_redraw.check(clear)
    }

    pub fn finalize(&mut self) {
        for effect in &mut self.effects {
            effect.cleanup();
        }
        self.effects.clear();
        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        id: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Effect for Recording {
        fn id(&self) -> &str {
            self.id
        }

        fn pre_render(&mut self, context: &EffectContext) {
            self.log.borrow_mut().push(format!("pre {} {}", self.id, context.pass));
        }

        fn post_render(&mut self, _context: &EffectContext) {
            self.log.borrow_mut().push(format!("post {}", self.id));
        }

        fn cleanup(&mut self) {
            self.log.borrow_mut().push(format!("cleanup {}", self.id));
        }
    }

    fn effect(id: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Effect> {
        Box::new(Recording {
            id,
            log: log.clone(),
        })
    }

    #[test]
    fn removed_effects_are_cleaned_up() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = EffectManager::new();

        manager.set_effects(vec![effect("a", &log), effect("b", &log)]);
        assert!(manager.needs_redraw(true).is_some());

        manager.set_effects(vec![effect("b", &log)]);
        assert_eq!(*log.borrow(), ["cleanup a"]);
        assert!(manager.needs_redraw(true).is_some());

        manager.finalize();
        assert_eq!(*log.borrow(), ["cleanup a", "cleanup b"]);
    }

    #[test]
    fn hooks_wrap_the_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let gpu = GpuContext::headless();
        let mut manager = EffectManager::new();
        manager.set_effects(vec![effect("a", &log), effect("b", &log)]);

        let context = EffectContext {
            gpu: &gpu,
            pass: "screen",
            frame_number: 1,
        };
        manager.pre_render(&context);
        manager.post_render(&context);

        assert_eq!(
            *log.borrow(),
            ["pre a screen", "pre b screen", "post b", "post a"]
        );
    }
}
