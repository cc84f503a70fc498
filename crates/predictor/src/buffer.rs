//! Bounded, time-ordered queue of coast-phase acceleration samples.

use std::collections::VecDeque;

/// One coast sample: time since the first accepted sample and vertical acceleration
/// including gravity (negative while decelerating upward motion).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t_s: f64,
    pub accel_m_s2: f64,
}

/// FIFO buffer keeping the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    accepted: u64,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            accepted: 0,
        }
    }

    /// Append a sample, evicting the oldest one when the buffer is full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.accepted += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of samples accepted since the last clear, including evicted ones.
    ///
    /// Unlike `len`, this keeps increasing once the buffer is saturated.
    pub fn accepted_total(&self) -> u64 {
        self.accepted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Time between the oldest and newest retained samples; zero when empty.
    pub fn span_s(&self) -> f64 {
        match (self.oldest(), self.newest()) {
            (Some(oldest), Some(newest)) => newest.t_s - oldest.t_s,
            _ => 0.0,
        }
    }

    /// Contiguous view of the retained samples in time order.
    pub fn contiguous(&mut self) -> &[Sample] {
        self.samples.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.accepted = 0;
    }
}
