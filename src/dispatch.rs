//! Bounded playback request queue
//!
//! Many producers (the debounce timer service) push without ever blocking;
//! the single render task awaits `pop`. A full queue drops the new request.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::DISPATCH_QUEUE_CAPACITY;
use crate::types::DispatchRequest;

/// Returned by [`DispatchQueue::push`] when the request was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct QueueFull(pub DispatchRequest);

pub struct DispatchQueue {
    channel: Channel<CriticalSectionRawMutex, DispatchRequest, DISPATCH_QUEUE_CAPACITY>,
}

impl DispatchQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without waiting. Fails immediately when the queue is full.
    pub fn push(&self, request: DispatchRequest) -> Result<(), QueueFull> {
        self.channel.try_send(request).map_err(|e| match e {
            embassy_sync::channel::TrySendError::Full(request) => QueueFull(request),
        })
    }

    /// Wait until a request is available
    pub async fn pop(&self) -> DispatchRequest {
        self.channel.receive().await
    }

    pub fn try_pop(&self) -> Option<DispatchRequest> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnimationId, SurfaceIndex};

    fn request(surface: usize) -> DispatchRequest {
        DispatchRequest {
            surface: SurfaceIndex::new(surface).unwrap(),
            animation: AnimationId::new("1.GIF"),
        }
    }

    #[test]
    fn sixth_push_is_dropped_and_first_five_stay_fifo() {
        let queue = DispatchQueue::new();
        for i in 0..5 {
            assert!(queue.push(request(i)).is_ok());
        }
        assert_eq!(queue.push(request(5)), Err(QueueFull(request(5))));
        assert_eq!(queue.push(request(0)), Err(QueueFull(request(0))));
        assert_eq!(queue.len(), 5);

        for i in 0..5 {
            assert_eq!(queue.try_pop(), Some(request(i)));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn pop_waits_for_a_request() {
        let queue = DispatchQueue::new();
        queue.push(request(3)).unwrap();
        let popped = embassy_futures::block_on(queue.pop());
        assert_eq!(popped, request(3));
    }

    #[test]
    fn space_frees_up_after_pop() {
        let queue = DispatchQueue::new();
        for i in 0..5 {
            queue.push(request(i)).unwrap();
        }
        assert!(queue.try_pop().is_some());
        assert!(queue.push(request(5)).is_ok());
    }
}
