/// Unit tests for DeletionQueue

use crate::renderer::DeletionQueue;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    FenceHandle, GraphicsDevice, PipelineHandle, PipelineLayoutHandle, Resource, SemaphoreHandle,
};

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_flush_releases_in_reverse_push_order() {
    let mut queue = DeletionQueue::new();
    for raw in 1..=5 {
        queue.push(Resource::Semaphore(SemaphoreHandle(raw)));
    }

    let mut released = Vec::new();
    queue.flush_with(|resource| released.push(resource.raw()));

    assert_eq!(released, vec![5, 4, 3, 2, 1]);
    assert!(queue.is_empty());
}

#[test]
fn test_flush_releases_each_entry_exactly_once() {
    let mut queue = DeletionQueue::new();
    queue.push(Resource::Fence(FenceHandle(1)));
    queue.push(Resource::Fence(FenceHandle(2)));

    let mut count = 0;
    queue.flush_with(|_| count += 1);
    queue.flush_with(|_| count += 1);

    assert_eq!(count, 2);
}

#[test]
fn test_flush_empty_queue_is_noop() {
    let mut queue = DeletionQueue::new();
    let mut called = false;

    queue.flush_with(|_| called = true);

    assert!(!called);
    assert!(queue.is_empty());
}

#[test]
fn test_push_after_flush_starts_fresh() {
    let mut queue = DeletionQueue::new();
    queue.push(Resource::Fence(FenceHandle(1)));
    queue.flush_with(|_| {});

    queue.push(Resource::Fence(FenceHandle(2)));

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pending(), &[Resource::Fence(FenceHandle(2))]);
}

// ============================================================================
// DEVICE RELEASE
// ============================================================================

#[test]
fn test_flush_through_device_destroys_dependents_first() {
    let mut device = MockGraphicsDevice::new();
    let layout = device.create_pipeline_layout(&Default::default()).unwrap();
    let pipeline = PipelineHandle(layout.raw() + 100);

    let mut queue = DeletionQueue::new();
    queue.push(Resource::PipelineLayout(layout));
    queue.push(Resource::Pipeline(pipeline));
    device.clear_events();

    queue.flush(&mut device);

    assert_eq!(
        device.events(),
        vec![
            format!("destroy:pipeline:{}", pipeline.raw()),
            format!("destroy:pipeline_layout:{}", layout.raw()),
        ]
    );
    assert!(!device.is_live(layout.raw()));
}

#[test]
fn test_flush_leaves_no_live_resources() {
    let mut device = MockGraphicsDevice::new();
    let mut queue = DeletionQueue::new();

    let fence = device.create_fence(true).unwrap();
    queue.push(Resource::Fence(fence));
    let semaphore = device.create_semaphore().unwrap();
    queue.push(Resource::Semaphore(semaphore));
    let layout: PipelineLayoutHandle = device.create_pipeline_layout(&Default::default()).unwrap();
    queue.push(Resource::PipelineLayout(layout));

    queue.flush(&mut device);

    assert_eq!(device.live_count(), 0);
    assert!(device.bad_destroys().is_empty());
}
