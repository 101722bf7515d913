use more_asserts::assert_ge;
use std::sync::Arc;
use strata_render::backend::HeadlessBackend;
use strata_render::{Capabilities, GpuContext, TransformJob};

#[test]
fn spring_pass_reports_settling() {
    let backend = Arc::new(HeadlessBackend::new());
    let context = GpuContext::from_backend(backend.clone());

    let mut previous = context.create_buffer("previous", &[0.0, 0.0]);
    let mut current = context.create_buffer("current", &[0.0, 0.0]);
    let target = context.create_buffer("target", &[10.0, -10.0]);
    let next = context.create_buffer("next", &[0.0, 0.0]);

    let mut steps = 0;
    loop {
        let status = context.run_transform(&TransformJob::Spring {
            previous: &previous,
            current: &current,
            target: &target,
            next: &next,
            stiffness: 0.05,
            damping: 0.5,
        });
        steps += 1;
        if status.settled {
            break;
        }
        assert!(steps < 2000, "spring never settled");

        previous.copy_from(&current);
        current.copy_from(&next);
    }

    let values = next.read();
    assert!((values[0] - 10.0).abs() < 1e-3);
    assert!((values[1] + 10.0).abs() < 1e-3);
    assert_ge!(backend.stats().transforms_run, steps);
}

#[test]
fn context_reports_backend_capabilities() {
    let full = GpuContext::headless();
    assert!(full.supports(Capabilities::TRANSFORM));

    let storage_only = GpuContext::from_backend(Arc::new(HeadlessBackend::without_transform()));
    assert!(!storage_only.supports(Capabilities::TRANSFORM));
    assert!(storage_only.supports(Capabilities::READBACK));
    assert!(!storage_only.same_context(&full));
}

#[test]
fn upload_reallocates_on_length_change() {
    let context = GpuContext::headless();
    let mut buffer = context.create_buffer("upload", &[1.0, 2.0, 3.0]);

    buffer.upload(&[4.0, 5.0]);
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.read(), vec![4.0, 5.0]);
}
