use std::cmp::Ordering;

use parking_lot::Mutex;

use crate::atomic::AtomicF32;

/// Scheduled change kinds, mirroring the Web-Audio automation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SetValue,
    LinearRamp,
    ExponentialRamp,
    SetTarget,
    /// Inserted by [`ParamTimeline::cancel_and_hold`]; holds its value like a
    /// `SetValue` but marks where a cancelled trajectory was frozen.
    CancelHold,
}

#[derive(Debug, Clone, Copy)]
pub struct AutomationEvent {
    pub kind: EventKind,
    pub time: f64,
    pub value: f32,
    /// Only meaningful for `SetTarget`.
    pub time_constant: f32,
}

/// Time-ordered automation events for one `(node, parameter)` pair.
///
/// Mutations run on control threads under the event lock. The renderer calls
/// [`process_block`](Self::process_block) once per block with a try-lock: if a
/// mutator holds the lock, the block is rendered at `last_value` so audio is
/// never blocked on control-thread progress.
pub struct ParamTimeline {
    events: Mutex<Vec<AutomationEvent>>,
    last_value: AtomicF32,
}

impl ParamTimeline {
    pub fn new(initial: f32) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            last_value: AtomicF32::new(initial),
        }
    }

    pub fn set_value_at(&self, value: f32, time: f64) {
        self.push(AutomationEvent {
            kind: EventKind::SetValue,
            time,
            value,
            time_constant: 0.0,
        });
    }

    pub fn linear_ramp_to(&self, value: f32, end_time: f64) {
        self.push(AutomationEvent {
            kind: EventKind::LinearRamp,
            time: end_time,
            value,
            time_constant: 0.0,
        });
    }

    pub fn exp_ramp_to(&self, value: f32, end_time: f64) {
        self.push(AutomationEvent {
            kind: EventKind::ExponentialRamp,
            time: end_time,
            value,
            time_constant: 0.0,
        });
    }

    pub fn set_target_at(&self, target: f32, start_time: f64, time_constant: f32) {
        self.push(AutomationEvent {
            kind: EventKind::SetTarget,
            time: start_time,
            value: target,
            time_constant,
        });
    }

    /// Drops every event scheduled at or after `cancel_time`.
    pub fn cancel_scheduled(&self, cancel_time: f64) {
        let mut events = self.events.lock();
        events.retain(|event| event.time < cancel_time);
    }

    /// Drops events at or after `cancel_time` and freezes the parameter at
    /// the value the pre-cancel timeline would have produced at exactly that
    /// time.
    pub fn cancel_and_hold(&self, cancel_time: f64) {
        let mut events = self.events.lock();
        let held = evaluate_at(&events, self.last_value.load(), cancel_time);
        events.retain(|event| event.time < cancel_time);
        push_sorted(
            &mut events,
            AutomationEvent {
                kind: EventKind::CancelHold,
                time: cancel_time,
                value: held,
                time_constant: 0.0,
            },
        );
    }

    /// Seeds the implicit value used before the first event.
    pub fn set_last_value(&self, value: f32) {
        self.last_value.store(value);
    }

    pub fn last_value(&self) -> f32 {
        self.last_value.load()
    }

    /// Evaluates the timeline over one block starting at `start_time`.
    ///
    /// Writes per-sample values into `out` when provided (automated paths)
    /// and returns the value at the end of the block. Falls back to
    /// `last_value` without blocking if a mutator holds the event lock.
    pub fn process_block(
        &self,
        start_time: f64,
        sample_rate: f64,
        frames: usize,
        mut out: Option<&mut [f32]>,
    ) -> f32 {
        let Some(mut events) = self.events.try_lock() else {
            let held = self.last_value.load();
            if let Some(out) = out {
                out[..frames].fill(held);
            }
            return held;
        };

        if sample_rate <= 0.0 || frames == 0 {
            return self.last_value.load();
        }

        prune_past_events(&mut events, start_time);

        let initial = self.last_value.load();
        let mut value = initial;
        let mut current: isize = -1;
        let mut next = 0usize;
        while next < events.len() && events[next].time <= start_time {
            current = next as isize;
            next += 1;
        }

        for i in 0..frames {
            let t = start_time + i as f64 / sample_rate;
            while next < events.len() && events[next].time <= t {
                current = next as isize;
                next += 1;
            }
            value = value_at_index(&events, initial, value, current, t, sample_rate);
            if let Some(out) = out.as_deref_mut() {
                out[i] = value;
            }
        }

        self.last_value.store(value);
        value
    }

    fn push(&self, event: AutomationEvent) {
        let mut events = self.events.lock();
        push_sorted(&mut events, event);
    }

    #[cfg(test)]
    fn lock_events_for_test(&self) -> parking_lot::MutexGuard<'_, Vec<AutomationEvent>> {
        self.events.lock()
    }
}

fn push_sorted(events: &mut Vec<AutomationEvent>, event: AutomationEvent) {
    events.push(event);
    let len = events.len();
    if len > 1 && events[len - 2].time > events[len - 1].time {
        // Append is the common case; only re-sort out-of-order inserts.
        // The sort is stable so same-time events keep insertion order.
        events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));
    }
}

/// Keeps at most one event at or before `current_time` as the ramp anchor.
fn prune_past_events(events: &mut Vec<AutomationEvent>, current_time: f64) {
    let mut keep_from = 0;
    while keep_from + 1 < events.len() && events[keep_from + 1].time <= current_time {
        keep_from += 1;
    }
    if keep_from > 0 {
        events.drain(..keep_from);
    }
}

/// Value at time `t` given the index of the latest event with `time <= t`
/// (`-1` when before every event). `current_value` carries the running value
/// for the `SetTarget` per-sample recursion.
fn value_at_index(
    events: &[AutomationEvent],
    initial: f32,
    current_value: f32,
    current: isize,
    t: f64,
    sample_rate: f64,
) -> f32 {
    // Inside a ramp segment when the *next* event is a ramp: interpolate from
    // the anchor (current event, or the last-value baseline at time zero).
    let next_index = (current + 1) as usize;
    if let Some(next) = events.get(next_index) {
        if matches!(next.kind, EventKind::LinearRamp | EventKind::ExponentialRamp) {
            let (anchor_time, anchor_value) = if current >= 0 {
                let event = events[current as usize];
                (event.time, event.value)
            } else {
                (0.0, initial)
            };
            let duration = next.time - anchor_time;
            if duration > 0.0 {
                let progress = ((t - anchor_time) / duration).clamp(0.0, 1.0) as f32;
                match next.kind {
                    EventKind::LinearRamp => {
                        return anchor_value + progress * (next.value - anchor_value);
                    }
                    EventKind::ExponentialRamp => {
                        if anchor_value > 0.0 && next.value > 0.0 {
                            return anchor_value * (next.value / anchor_value).powf(progress);
                        }
                        // Sign change has no real exponential path; fall
                        // through to the endpoint rather than emit NaN.
                    }
                    _ => unreachable!(),
                }
            }
            return next.value;
        }
    }

    if current < 0 {
        return initial;
    }

    let event = events[current as usize];
    match event.kind {
        EventKind::SetValue | EventKind::LinearRamp | EventKind::ExponentialRamp | EventKind::CancelHold => {
            event.value
        }
        EventKind::SetTarget => {
            if t >= event.time && event.time_constant > 0.0 {
                let dt = (1.0 / sample_rate) as f32;
                event.value + (current_value - event.value) * (-dt / event.time_constant).exp()
            } else {
                current_value
            }
        }
    }
}

/// Stateless evaluation at a single instant, used to capture the hold value
/// for `cancel_and_hold`. `SetTarget` uses its closed form from the previous
/// event's value (or the baseline).
fn evaluate_at(events: &[AutomationEvent], baseline: f32, t: f64) -> f32 {
    let mut current: isize = -1;
    for (index, event) in events.iter().enumerate() {
        if event.time <= t {
            current = index as isize;
        } else {
            break;
        }
    }

    let next_index = (current + 1) as usize;
    if let Some(next) = events.get(next_index) {
        if matches!(next.kind, EventKind::LinearRamp | EventKind::ExponentialRamp) {
            let (anchor_time, anchor_value) = if current >= 0 {
                let event = events[current as usize];
                (event.time, event.value)
            } else {
                (0.0, baseline)
            };
            let duration = next.time - anchor_time;
            if duration > 0.0 {
                let progress = ((t - anchor_time) / duration).clamp(0.0, 1.0) as f32;
                match next.kind {
                    EventKind::LinearRamp => {
                        return anchor_value + progress * (next.value - anchor_value);
                    }
                    EventKind::ExponentialRamp => {
                        if anchor_value > 0.0 && next.value > 0.0 {
                            return anchor_value * (next.value / anchor_value).powf(progress);
                        }
                    }
                    _ => unreachable!(),
                }
            }
            return next.value;
        }
    }

    if current < 0 {
        return baseline;
    }

    let event = events[current as usize];
    match event.kind {
        EventKind::SetTarget => {
            if event.time_constant > 0.0 {
                let from = if current == 0 {
                    baseline
                } else {
                    events[current as usize - 1].value
                };
                let elapsed = (t - event.time) as f32;
                event.value + (from - event.value) * (-elapsed / event.time_constant).exp()
            } else {
                event.value
            }
        }
        _ => event.value,
    }
}
