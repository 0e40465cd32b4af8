use serde::{Deserialize, Serialize};

/// Index of the window holding an absolute time.
///
/// Times exactly on a multiple of `width` open the window of that multiple.
pub fn window_index(time: f64, width: f64) -> i64 {
    let mut index = (time / width).floor() as i64;
    // floating point division can land one window off near the edges
    if time - index as f64 * width >= width {
        index = index.saturating_add(1);
    } else if time - (index as f64) * width < 0.0 {
        index = index.saturating_sub(1);
    }
    index
}

/// Split an absolute time into its window index and the time inside that window
pub fn split_time(time: f64, width: f64) -> (i64, f64) {
    let index = window_index(time, width);
    (index, time - index as f64 * width)
}

pub fn is_in_window(time: f64, index: i64, width: f64) -> bool {
    let in_window = time - index as f64 * width;
    (0.0..width).contains(&in_window)
}

/// When the accumulator hands a window to the sink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FlushPolicy {
    /// Flush when a hit for a different window index arrives
    Boundary,
    /// Flush once more than `threshold` events were collected
    Activity { threshold: f64 },
    /// Flush after every event
    SingleEvent,
}

impl FlushPolicy {
    /// The activity trigger `|W * A * scale|` for a window width W (ps) and activity A
    pub fn activity(width: f64, activity: f64, scale: f64) -> Self {
        Self::Activity {
            threshold: (width * activity * scale).abs(),
        }
    }
}

/// An ordered bucket of hits sharing a window index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow<H> {
    pub index: i64,
    pub hits: Vec<H>,
}

impl<H> TimeWindow<H> {
    pub fn new(index: i64) -> Self {
        Self {
            index,
            hits: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// WindowAccumulator buffers hits and composes them into TimeWindows.
///
/// Like an event builder, adding data for a new window completes the one being
/// built. Hits keep their arrival order and empty windows are never emitted.
#[derive(Debug)]
pub struct WindowAccumulator<H> {
    policy: FlushPolicy,
    current: Option<TimeWindow<H>>,
    activity_index: u64,
    next_index: i64,
    windows_flushed: u64,
}

impl<H> WindowAccumulator<H> {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            current: None,
            activity_index: 0,
            next_index: 0,
            windows_flushed: 0,
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Add a hit belonging to the window `index`.
    ///
    /// Returns the previous window if this hit opened a new one. Under the
    /// activity and single event policies the index is ignored and the hit
    /// joins the open window.
    pub fn append_hit(&mut self, index: i64, hit: H) -> Option<TimeWindow<H>> {
        let policy = self.policy;
        let crossed = matches!(
            (policy, &self.current),
            (FlushPolicy::Boundary, Some(window)) if window.index != index
        );
        let completed = if crossed { self.flush() } else { None };
        let next_index = self.next_index;
        let window = self.current.get_or_insert_with(|| match policy {
            FlushPolicy::Boundary => TimeWindow::new(index),
            _ => TimeWindow::new(next_index),
        });
        window.hits.push(hit);
        completed
    }

    /// Signal the end of one simulated event; may complete the open window
    pub fn end_event(&mut self) -> Option<TimeWindow<H>> {
        match self.policy {
            FlushPolicy::Boundary => None,
            FlushPolicy::SingleEvent => self.flush(),
            FlushPolicy::Activity { threshold } => {
                if self.activity_index as f64 > threshold {
                    self.activity_index = 0;
                    self.flush()
                } else {
                    self.activity_index += 1;
                    None
                }
            }
        }
    }

    /// Take the open window, if it has any hits
    pub fn flush(&mut self) -> Option<TimeWindow<H>> {
        let window = self.current.take()?;
        if window.is_empty() {
            return None;
        }
        self.windows_flushed += 1;
        self.next_index = window.index + 1;
        Some(window)
    }

    /// Takes any remaining hits and flushes them to a window.
    ///
    /// Used at the end of processing a file.
    pub fn flush_final(&mut self) -> Option<TimeWindow<H>> {
        self.activity_index = 0;
        self.flush()
    }

    pub fn windows_flushed(&self) -> u64 {
        self.windows_flushed
    }

    pub fn buffered(&self) -> usize {
        self.current.as_ref().map_or(0, |w| w.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_boundaries() {
        let width = 20_000_000.0;
        for k in 0..1000i64 {
            let t = k as f64 * width;
            assert_eq!(window_index(t, width), k);
            if k > 0 {
                assert_eq!(window_index(t - 1e-3, width), k - 1);
            }
            let (idx, in_window) = split_time(t + 5.0, width);
            assert!(is_in_window(t + 5.0, idx, width));
            assert!((0.0..width).contains(&in_window));
        }
        assert_eq!(window_index(-1.0, width), -1);
    }

    #[test]
    fn test_boundary_policy() {
        let mut acc = WindowAccumulator::new(FlushPolicy::Boundary);
        assert!(acc.append_hit(0, 'a').is_none());
        assert!(acc.append_hit(0, 'b').is_none());
        let window = acc.append_hit(3, 'c').unwrap();
        assert_eq!(window.index, 0);
        assert_eq!(window.hits, vec!['a', 'b']);
        assert!(acc.end_event().is_none());
        let last = acc.flush_final().unwrap();
        assert_eq!(last.index, 3);
        assert_eq!(last.hits, vec!['c']);
        assert!(acc.flush_final().is_none());
        assert_eq!(acc.windows_flushed(), 2);
    }

    #[test]
    fn test_activity_policy() {
        let mut acc = WindowAccumulator::new(FlushPolicy::Activity { threshold: 2.0 });
        let mut flushed = Vec::new();
        for event in 0..8 {
            acc.append_hit(0, event);
            if let Some(window) = acc.end_event() {
                flushed.push(window);
            }
        }
        // activity index 0,1,2 increment, flush when it reaches 3
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].hits, vec![0, 1, 2, 3]);
        assert_eq!(flushed[0].index, 0);
        assert_eq!(flushed[1].hits, vec![4, 5, 6, 7]);
        assert_eq!(flushed[1].index, 1);
        assert!(acc.flush_final().is_none());
    }

    #[test]
    fn test_single_event_policy() {
        let mut acc = WindowAccumulator::new(FlushPolicy::SingleEvent);
        acc.append_hit(7, 1);
        acc.append_hit(9, 2);
        let window = acc.end_event().unwrap();
        assert_eq!(window.hits, vec![1, 2]);
        // events without hits produce no window
        assert!(acc.end_event().is_none());
    }

    #[test]
    fn test_activity_threshold() {
        match FlushPolicy::activity(20_000_000.0, -4.7, 1e-6) {
            FlushPolicy::Activity { threshold } => assert_relative_eq!(threshold, 94.0),
            other => panic!("unexpected policy {other:?}"),
        }
    }
}
