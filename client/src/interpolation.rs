//! Time-delayed interpolation over server snapshots
//!
//! Snapshots are shown `delay_ms` after the server produced them, so that at almost any
//! render time there is an older and a newer snapshot to blend between. Events attached to a
//! snapshot are handed out once, as soon as its timestamp has been reached.

use std::collections::VecDeque;

/// Blends two states by a fraction in `[0, 1]`.
pub type LerpFn<T> = fn(&T, &T, f32) -> T;

#[derive(Debug, Clone)]
struct Entry<T, E> {
    /// `None` only for the initial state, which precedes every timed snapshot.
    timestamp: Option<u64>,
    state: T,
    events: Vec<E>,
}

impl<T, E> Entry<T, E> {
    fn is_reached(&self, render_time: u64) -> bool {
        self.timestamp.map_or(true, |t| t <= render_time)
    }
}

/// Result of one query: the state to draw and the events that became due.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated<T, E> {
    pub state: T,
    pub events: Vec<E>,
}

pub struct InterpolationBuffer<T, E> {
    entries: VecDeque<Entry<T, E>>,
    delay_ms: u64,
    lerp: LerpFn<T>,
}

impl<T: Clone, E> InterpolationBuffer<T, E> {
    pub fn new(initial: T, delay_ms: u64, lerp: LerpFn<T>) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(Entry {
            timestamp: None,
            state: initial,
            events: Vec::new(),
        });

        Self {
            entries,
            delay_ms,
            lerp,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a snapshot, keeping entries ordered by timestamp even when datagrams arrive out
    /// of order.
    pub fn enqueue(&mut self, state: T, events: Vec<E>, timestamp: u64) {
        let position = self
            .entries
            .iter()
            .rposition(|entry| entry.timestamp.map_or(true, |t| t <= timestamp))
            .map_or(0, |index| index + 1);

        self.entries.insert(
            position,
            Entry {
                timestamp: Some(timestamp),
                state,
                events,
            },
        );
    }

    /// Renders the world as it was at `now - delay_ms`.
    pub fn get_interpolated_state(&mut self, now: u64) -> Interpolated<T, E> {
        let render_time = now.saturating_sub(self.delay_ms);

        let mut events = Vec::new();
        for entry in self.entries.iter_mut() {
            if !entry.is_reached(render_time) {
                break;
            }
            events.append(&mut entry.events);
        }

        // Keep only the newest reached entry and everything after it
        while self.entries.len() > 1 && self.entries[1].is_reached(render_time) {
            self.entries.pop_front();
        }

        // Pruning never removes the last entry
        let from = &self.entries[0];
        let state = match self.entries.get(1) {
            Some(to) => match (from.timestamp, to.timestamp) {
                (Some(t0), Some(t1)) => {
                    let fraction = if t1 > t0 {
                        (render_time.saturating_sub(t0) as f32 / (t1 - t0) as f32).clamp(0.0, 1.0)
                    } else {
                        1.0
                    };
                    (self.lerp)(&from.state, &to.state, fraction)
                }
                // Nothing timed has been reached yet
                _ => from.state.clone(),
            },
            None => from.state.clone(),
        };

        Interpolated { state, events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn lerp(a: &f32, b: &f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    fn buffer(delay: u64) -> InterpolationBuffer<f32, &'static str> {
        InterpolationBuffer::new(-1.0, delay, lerp)
    }

    #[test]
    fn test_initial_state_returned_alone() {
        let mut buffer = buffer(100);

        let result = buffer.get_interpolated_state(5_000);

        assert_eq!(result.state, -1.0);
        assert!(result.events.is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_midpoint_between_two_snapshots() {
        let mut buffer = buffer(100);
        buffer.enqueue(0.0, vec![], 1_000);
        buffer.enqueue(10.0, vec![], 1_100);

        let result = buffer.get_interpolated_state(1_050 + 100);

        assert_approx_eq!(result.state, 5.0, 1e-4);
    }

    #[test]
    fn test_render_time_before_first_snapshot_keeps_initial() {
        let mut buffer = buffer(100);
        buffer.enqueue(0.0, vec!["start"], 1_000);

        let result = buffer.get_interpolated_state(1_050);

        assert_eq!(result.state, -1.0);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_no_extrapolation_past_newest() {
        let mut buffer = buffer(50);
        buffer.enqueue(0.0, vec![], 1_000);
        buffer.enqueue(10.0, vec![], 1_100);

        let result = buffer.get_interpolated_state(9_999);

        assert_eq!(result.state, 10.0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_sole_snapshot_returned_unmodified() {
        let mut buffer = buffer(50);
        buffer.enqueue(3.5, vec![], 1_000);

        assert_eq!(buffer.get_interpolated_state(2_000).state, 3.5);
    }

    #[test]
    fn test_events_drained_exactly_once() {
        let mut buffer = buffer(100);
        buffer.enqueue(0.0, vec!["start"], 1_000);
        buffer.enqueue(10.0, vec!["jump"], 1_100);
        buffer.enqueue(20.0, vec!["finish"], 1_200);

        let first = buffer.get_interpolated_state(1_150);
        assert_eq!(first.events, vec!["start"]);

        let again = buffer.get_interpolated_state(1_160);
        assert!(again.events.is_empty());

        let later = buffer.get_interpolated_state(1_400);
        assert_eq!(later.events, vec!["jump", "finish"]);
        assert!(buffer.get_interpolated_state(1_500).events.is_empty());
    }

    #[test]
    fn test_endpoint_reuse_does_not_repeat_events() {
        let mut buffer = buffer(0);
        buffer.enqueue(0.0, vec!["frozen"], 100);
        buffer.enqueue(10.0, vec![], 200);

        assert_eq!(buffer.get_interpolated_state(120).events, vec!["frozen"]);
        assert!(buffer.get_interpolated_state(150).events.is_empty());
        assert_approx_eq!(buffer.get_interpolated_state(150).state, 5.0, 1e-4);
    }

    #[test]
    fn test_prunes_entries_older_than_bracket() {
        let mut buffer = buffer(0);
        for i in 0..5u64 {
            buffer.enqueue(i as f32, vec![], 100 * (i + 1));
        }
        assert_eq!(buffer.len(), 6);

        let result = buffer.get_interpolated_state(350);

        assert_approx_eq!(result.state, 2.5, 1e-4);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_out_of_order_enqueue_is_sorted() {
        let mut buffer = buffer(0);
        buffer.enqueue(10.0, vec![], 200);
        buffer.enqueue(0.0, vec![], 100);

        assert_approx_eq!(buffer.get_interpolated_state(150).state, 5.0, 1e-4);
    }

    #[test]
    fn test_equal_timestamps_take_later_entry() {
        let mut buffer = buffer(0);
        buffer.enqueue(1.0, vec![], 100);
        buffer.enqueue(2.0, vec![], 100);

        assert_eq!(buffer.get_interpolated_state(100).state, 2.0);
    }
}
