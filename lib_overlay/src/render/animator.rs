//! # Numeric Animation
//!
//! [`Animator`] is the capability the dispatcher uses for `animate_numeric`
//! bindings: it may start, retarget or stop a tween, and nothing else. Frame
//! progression belongs to the caller's timing loop, which calls
//! [`Tweener::advance`] at its own rate.

use std::collections::HashMap;
use std::time::Instant;

use crate::bindings::AnimationSpec;
use crate::render::format::format_fixed;
use crate::render::RenderSink;

pub trait Animator {
    /// Begins animating `id` from `from` to `to`.
    fn start(&mut self, id: &str, from: f64, to: f64, spec: &AnimationSpec);

    /// Points the running animation of `id` at a new target.
    fn retarget(&mut self, id: &str, to: f64);

    fn stop(&mut self, id: &str);

    fn stop_all(&mut self);

    fn is_running(&self, id: &str) -> bool;
}

#[derive(Debug, Clone)]
struct Tween {
    from: f64,
    to: f64,
    current: f64,
    started: Instant,
    spec: AnimationSpec,
}

impl Tween {
    fn value_at(&self, now: Instant) -> (f64, bool) {
        let duration = self.spec.duration();
        let elapsed = now.saturating_duration_since(self.started);
        if duration.is_zero() || elapsed >= duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / duration.as_secs_f64();
        let eased = self.spec.easing.apply(t);
        (self.from + (self.to - self.from) * eased, false)
    }
}

/// Count-up animator: one tween per element id.
#[derive(Debug, Default)]
pub struct Tweener {
    tweens: HashMap<String, Tween>,
}

impl Tweener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tweens currently in flight.
    pub fn active(&self) -> usize {
        self.tweens.len()
    }

    /// Writes one frame for every tween and drops the finished ones.
    pub fn advance<S: RenderSink + ?Sized>(&mut self, now: Instant, sink: &mut S) {
        let mut finished = Vec::new();
        for (id, tween) in self.tweens.iter_mut() {
            let (value, done) = tween.value_at(now);
            tween.current = value;
            sink.set_text(id, &format_fixed(value, tween.spec.decimals));
            if done {
                finished.push(id.clone());
            }
        }
        for id in finished {
            self.tweens.remove(&id);
        }
    }

    fn start_at(&mut self, id: &str, from: f64, to: f64, spec: &AnimationSpec, now: Instant) {
        self.tweens.insert(
            id.to_string(),
            Tween {
                from,
                to,
                current: from,
                started: now,
                spec: spec.clone(),
            },
        );
    }

    fn retarget_at(&mut self, id: &str, to: f64, now: Instant) {
        if let Some(tween) = self.tweens.get_mut(id) {
            tween.from = tween.current;
            tween.to = to;
            tween.started = now;
        }
    }
}

impl Animator for Tweener {
    fn start(&mut self, id: &str, from: f64, to: f64, spec: &AnimationSpec) {
        self.start_at(id, from, to, spec, Instant::now());
    }

    fn retarget(&mut self, id: &str, to: f64) {
        self.retarget_at(id, to, Instant::now());
    }

    fn stop(&mut self, id: &str) {
        self.tweens.remove(id);
    }

    fn stop_all(&mut self) {
        self.tweens.clear();
    }

    fn is_running(&self, id: &str) -> bool {
        self.tweens.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Easing;
    use crate::render::sinks::MemorySink;
    use std::time::Duration;

    fn linear(ms: u64) -> AnimationSpec {
        AnimationSpec {
            duration_ms: ms,
            easing: Easing::Linear,
            decimals: 0,
        }
    }

    #[test]
    fn test_tween_reaches_target_and_finishes() {
        let mut tweener = Tweener::new();
        let mut sink = MemorySink::new();
        let t0 = Instant::now();
        tweener.start_at("pp", 0.0, 100.0, &linear(1000), t0);

        tweener.advance(t0 + Duration::from_millis(500), &mut sink);
        assert_eq!(sink.text("pp"), Some("50"));
        assert!(tweener.is_running("pp"));

        tweener.advance(t0 + Duration::from_millis(1500), &mut sink);
        assert_eq!(sink.text("pp"), Some("100"));
        assert!(!tweener.is_running("pp"));
    }

    #[test]
    fn test_retarget_continues_from_current_value() {
        let mut tweener = Tweener::new();
        let mut sink = MemorySink::new();
        let t0 = Instant::now();
        tweener.start_at("miss", 0.0, 10.0, &linear(1000), t0);
        tweener.advance(t0 + Duration::from_millis(500), &mut sink);

        let t1 = t0 + Duration::from_millis(500);
        tweener.retarget_at("miss", 25.0, t1);
        assert_eq!(tweener.active(), 1);

        // 5 -> 25, halfway
        tweener.advance(t1 + Duration::from_millis(500), &mut sink);
        assert_eq!(sink.text("miss"), Some("15"));
        tweener.advance(t1 + Duration::from_millis(1000), &mut sink);
        assert_eq!(sink.text("miss"), Some("25"));
    }

    #[test]
    fn test_zero_duration_jumps() {
        let mut tweener = Tweener::new();
        let mut sink = MemorySink::new();
        let t0 = Instant::now();
        let spec = AnimationSpec {
            duration_ms: 0,
            easing: Easing::Linear,
            decimals: 2,
        };
        tweener.start_at("ur", 0.0, 123.456, &spec, t0);
        tweener.advance(t0, &mut sink);
        assert_eq!(sink.text("ur"), Some("123.46"));
        assert_eq!(tweener.active(), 0);
    }

    #[test]
    fn test_stop_all_cancels_everything() {
        let mut tweener = Tweener::new();
        tweener.start("a", 0.0, 1.0, &linear(100));
        tweener.start("b", 0.0, 1.0, &linear(100));
        tweener.stop("a");
        assert!(!tweener.is_running("a"));
        tweener.stop_all();
        assert_eq!(tweener.active(), 0);
    }
}
