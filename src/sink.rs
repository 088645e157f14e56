// src/sink.rs
//
// Sample fan-out to the presentation collaborators.
// Collaborators are injected at construction; nothing is looked up ambiently.

use chrono::{DateTime, Local};
use std::collections::VecDeque;

use crate::record::Sample;

/// Default number of points kept for the chart
pub const DEFAULT_WINDOW_CAPACITY: usize = 60;

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Receives the latest reading
pub trait CurrentValueSink: Send {
    fn set_current(&mut self, flow: f64, total_volume: f64);
}

/// Receives history rows, newest first
pub trait HistoryLogSink: Send {
    fn prepend_row(&mut self, observed_at: DateTime<Local>, flow: f64, total_volume: f64);
    fn clear(&mut self);
}

/// Receives chart points. `redraw` is called once per accepted sample with the
/// full window contents.
pub trait ChartSink: Send {
    fn push_point(&mut self, _label: &str, _value: f64) {}
    fn evict_oldest(&mut self) {}
    fn redraw(&mut self, window: &RollingWindow);
    /// Called when a new session starts
    fn clear(&mut self) {}
}

// ============================================================================
// RollingWindow
// ============================================================================

/// Bounded FIFO of `(label, value)` chart points
#[derive(Clone, Debug)]
pub struct RollingWindow {
    points: VecDeque<(String, f64)>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RollingWindow {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a point. Returns true when the oldest point was evicted.
    pub fn push(&mut self, label: String, value: f64) -> bool {
        self.points.push_back((label, value));
        if self.points.len() > self.capacity {
            self.points.pop_front();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points oldest first
    pub fn iter(&self) -> impl Iterator<Item = &(String, f64)> {
        self.points.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, v)| *v)
    }
}

// ============================================================================
// SessionHistory
// ============================================================================

/// Samples of the current session, most recent first
#[derive(Clone, Debug, Default)]
pub struct SessionHistory {
    samples: VecDeque<Sample>,
}

impl SessionHistory {
    pub fn prepend(&mut self, sample: Sample) {
        self.samples.push_front(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent first
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.front()
    }
}

// ============================================================================
// SampleSink
// ============================================================================

/// Fans a validated Sample out to the current-value, history and chart collaborators.
pub struct SampleSink {
    current: Box<dyn CurrentValueSink>,
    history_log: Box<dyn HistoryLogSink>,
    chart: Box<dyn ChartSink>,
    history: SessionHistory,
    window: RollingWindow,
}

impl SampleSink {
    pub fn new(
        current: Box<dyn CurrentValueSink>,
        history_log: Box<dyn HistoryLogSink>,
        chart: Box<dyn ChartSink>,
        window_capacity: usize,
    ) -> Self {
        SampleSink {
            current,
            history_log,
            chart,
            history: SessionHistory::default(),
            window: RollingWindow::new(window_capacity),
        }
    }

    /// Deliver one sample to every collaborator. All effects complete before return.
    pub fn accept(&mut self, sample: Sample) {
        self.current.set_current(sample.flow, sample.total_volume);

        self.history_log
            .prepend_row(sample.observed_at, sample.flow, sample.total_volume);

        let label = sample.observed_at.format("%H:%M:%S").to_string();
        self.chart.push_point(&label, sample.flow);
        if self.window.push(label, sample.flow) {
            self.chart.evict_oldest();
        }
        self.chart.redraw(&self.window);

        self.history.prepend(sample);
    }

    /// Start of a new session: drop the previous session's history and chart.
    pub fn reset_session(&mut self) {
        self.history.clear();
        self.history_log.clear();
        self.window.clear();
        self.chart.clear();
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Every collaborator call, in order
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Call {
        Current(f64, f64),
        Prepend(f64, f64),
        ClearLog,
        Push(f64),
        Evict,
        Redraw(usize),
        ClearChart,
    }

    #[derive(Clone, Default)]
    pub(crate) struct Recorder(pub Arc<Mutex<Vec<Call>>>);

    impl Recorder {
        fn record(&self, call: Call) {
            self.0.lock().unwrap().push(call);
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().clone()
        }
    }

    impl CurrentValueSink for Recorder {
        fn set_current(&mut self, flow: f64, total_volume: f64) {
            self.record(Call::Current(flow, total_volume));
        }
    }

    impl HistoryLogSink for Recorder {
        fn prepend_row(&mut self, _observed_at: DateTime<Local>, flow: f64, total_volume: f64) {
            self.record(Call::Prepend(flow, total_volume));
        }

        fn clear(&mut self) {
            self.record(Call::ClearLog);
        }
    }

    impl ChartSink for Recorder {
        fn push_point(&mut self, _label: &str, value: f64) {
            self.record(Call::Push(value));
        }

        fn evict_oldest(&mut self) {
            self.record(Call::Evict);
        }

        fn redraw(&mut self, window: &RollingWindow) {
            self.record(Call::Redraw(window.len()));
        }

        fn clear(&mut self) {
            self.record(Call::ClearChart);
        }
    }

    pub(crate) fn recording_sink(capacity: usize) -> (SampleSink, Recorder) {
        let rec = Recorder::default();
        let sink = SampleSink::new(
            Box::new(rec.clone()),
            Box::new(rec.clone()),
            Box::new(rec.clone()),
            capacity,
        );
        (sink, rec)
    }

    fn sample(flow: f64, total_volume: f64) -> Sample {
        Sample {
            flow,
            total_volume,
            observed_at: Local::now(),
        }
    }

    #[test]
    fn test_accept_fans_out_to_every_collaborator() {
        let (mut sink, rec) = recording_sink(DEFAULT_WINDOW_CAPACITY);
        sink.accept(sample(1.5, 10.0));

        assert_eq!(
            rec.calls(),
            vec![
                Call::Current(1.5, 10.0),
                Call::Prepend(1.5, 10.0),
                Call::Push(1.5),
                Call::Redraw(1),
            ]
        );
        assert_eq!(sink.history().len(), 1);
        assert_eq!(sink.window().len(), 1);
    }

    #[test]
    fn test_window_keeps_most_recent_sixty() {
        let (mut sink, rec) = recording_sink(DEFAULT_WINDOW_CAPACITY);
        for i in 1..=61 {
            sink.accept(sample(i as f64, 0.0));
        }

        let values: Vec<f64> = sink.window().values().collect();
        let expected: Vec<f64> = (2..=61).map(|i| i as f64).collect();
        assert_eq!(values, expected);

        let evictions = rec.calls().iter().filter(|c| **c == Call::Evict).count();
        assert_eq!(evictions, 1);
        assert_eq!(rec.calls().last(), Some(&Call::Redraw(60)));
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let (mut sink, _rec) = recording_sink(DEFAULT_WINDOW_CAPACITY);
        let a = sample(1.0, 1.0);
        let b = sample(2.0, 2.0);
        sink.accept(a.clone());
        sink.accept(b.clone());

        let history: Vec<&Sample> = sink.history().iter().collect();
        assert_eq!(history, vec![&b, &a]);
        assert_eq!(sink.history().latest(), Some(&b));
    }

    #[test]
    fn test_reset_session_clears_history_and_chart() {
        let (mut sink, rec) = recording_sink(DEFAULT_WINDOW_CAPACITY);
        sink.accept(sample(1.0, 1.0));
        sink.reset_session();

        assert!(sink.history().is_empty());
        assert!(sink.window().is_empty());
        let calls = rec.calls();
        assert!(calls.contains(&Call::ClearLog));
        assert!(calls.contains(&Call::ClearChart));
    }

    #[test]
    fn test_window_label_is_time_of_day() {
        let (mut sink, _rec) = recording_sink(3);
        let s = sample(4.0, 0.0);
        let expected = s.observed_at.format("%H:%M:%S").to_string();
        sink.accept(s);

        let (label, value) = sink.window().iter().next().unwrap();
        assert_eq!(label, &expected);
        assert_eq!(*value, 4.0);
    }
}
