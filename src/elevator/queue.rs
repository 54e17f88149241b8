use crate::elevator::hardware::Door;
use std::rc::Rc;

/// A pending stop. The pistons distance is captured when the stop is queued,
/// so a later configuration change on the door does not move a stop that is
/// already pending.
#[derive(Clone)]
pub struct StopRequest {
    pub door: Rc<dyn Door>,
    pub pistons_distance: f32,
}

/// Pending stops, head first. The head is the stop currently being serviced.
/// No door appears in the queue twice.
#[derive(Default)]
pub struct StopQueue {
    requests: Vec<StopRequest>,
}

impl StopQueue {
    /// Inserts a stop next to the queued stop closest in travel distance
    /// (first strictly smaller distance wins; an empty queue inserts at the
    /// front). Returns false without touching the queue when the same door
    /// already has a stop pending.
    pub fn insert(&mut self, request: StopRequest) -> bool {
        let mut insertion_index = 0;
        let mut closest_distance = f32::INFINITY;
        for (index, enqueued) in self.requests.iter().enumerate() {
            if Rc::ptr_eq(&request.door, &enqueued.door) {
                return false;
            }
            let distance = (request.pistons_distance - enqueued.pistons_distance).abs();
            if closest_distance > distance {
                closest_distance = distance;
                insertion_index = index;
            }
        }
        self.requests.insert(insertion_index, request);
        true
    }

    pub fn head(&self) -> Option<&StopRequest> {
        self.requests.first()
    }

    /// Drops the stop currently being serviced.
    pub fn pop_head(&mut self) {
        if !self.requests.is_empty() {
            self.requests.remove(0);
        }
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
impl StopQueue {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.requests
            .iter()
            .map(|request| request.pistons_distance)
            .collect()
    }
}
