//! The engine's inbound event queue: strict priority-band precedence
//! (high > normal > low) with FIFO ordering within a band.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::event::{EventPriorityBand, SystemEvent};

struct Lanes {
    high: VecDeque<SystemEvent>,
    normal: VecDeque<SystemEvent>,
    low: VecDeque<SystemEvent>,
}

impl Lanes {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    fn lane_mut(&mut self, band: EventPriorityBand) -> &mut VecDeque<SystemEvent> {
        match band {
            EventPriorityBand::High => &mut self.high,
            EventPriorityBand::Normal => &mut self.normal,
            EventPriorityBand::Low => &mut self.low,
        }
    }

    fn pop_highest(&mut self) -> Option<SystemEvent> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}

/// Priority-banded event queue. Pushing is synchronous and cheap;
/// popping suspends (without busy-looping) when the queue is empty.
pub struct EventQueue {
    lanes: Mutex<Lanes>,
    notify: Notify,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, event: SystemEvent, band: EventPriorityBand) {
        self.lanes.lock().lane_mut(band).push_back(event);
        self.notify.notify_one();
    }

    /// Pops the highest-banded, earliest-arrived event. Suspends on the
    /// queue's internal notifier when empty — this is one of the
    /// engine's designated suspension points (§5), never a busy loop.
    pub async fn pop(&self) -> SystemEvent {
        loop {
            if let Some(event) = self.lanes.lock().pop_highest() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking pop, used by tests and by shutdown draining.
    pub fn try_pop(&self) -> Option<SystemEvent> {
        self.lanes.lock().pop_highest()
    }

    pub fn len(&self) -> usize {
        self.lanes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
