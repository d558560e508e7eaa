//! # Render Dispatcher
//!
//! Applies each [`Change`] of a [`Delta`] to its bound sink. A second dedupe
//! layer sits here: the dispatcher remembers the last value it applied per
//! binding and skips writes that would not alter the output (two different raw
//! values that format to the same text, for example).
//!
//! For `animate_numeric` bindings at most one animation runs per element. A
//! new target while a tween is in flight retargets it instead of starting a
//! second one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bindings::{BindingSet, SinkSpec};
use crate::render::{Animator, RenderSink};
use crate::state_store::{Change, Delta};

/// What was last written for a binding.
#[derive(Debug, Clone, PartialEq)]
enum Applied {
    Text(String),
    Attribute(String),
    Visible(bool),
    Target(f64),
}

pub struct RenderDispatcher<S, A> {
    bindings: Arc<BindingSet>,
    sink: S,
    animator: A,
    last_applied: HashMap<usize, Applied>,
    applied: u64,
    skipped: u64,
}

impl<S: RenderSink, A: Animator> RenderDispatcher<S, A> {
    pub fn new(bindings: Arc<BindingSet>, sink: S, animator: A) -> Self {
        Self {
            bindings,
            sink,
            animator,
            last_applied: HashMap::new(),
            applied: 0,
            skipped: 0,
        }
    }

    /// Applies a delta in order. Returns the number of sink operations issued.
    pub fn dispatch(&mut self, delta: &Delta) -> usize {
        let mut issued = 0;
        for change in delta.iter() {
            if self.apply(change) {
                issued += 1;
            }
        }
        issued
    }

    /// Applies one change. Returns `false` when nothing was written.
    pub fn apply(&mut self, change: &Change) -> bool {
        let bindings = Arc::clone(&self.bindings);
        let Some(binding) = bindings.get(change.binding) else {
            log::warn!("Change for unknown binding #{} dropped", change.binding);
            return false;
        };

        let next = match &binding.sink {
            SinkSpec::SetText { format } => Applied::Text(format.render(&change.new)),
            SinkSpec::SetAttribute { template, format, .. } => {
                Applied::Attribute(template.replace("{value}", &format.render(&change.new)))
            }
            SinkSpec::SetVisibility { when, .. } => Applied::Visible(when.test(&change.new)),
            SinkSpec::AnimateNumeric(_) => match change.new.as_number() {
                Some(target) => Applied::Target(target),
                None => {
                    log::debug!(
                        "Binding '{}' got non-numeric value '{}' for animation, skipped",
                        binding.id,
                        change.new
                    );
                    self.skipped += 1;
                    return false;
                }
            },
        };

        if self.last_applied.get(&change.binding) == Some(&next) {
            log::trace!("Binding '{}' already shows {:?}", binding.id, next);
            self.skipped += 1;
            return false;
        }

        match (&binding.sink, &next) {
            (SinkSpec::SetText { .. }, Applied::Text(text)) => self.sink.set_text(&binding.id, text),
            (SinkSpec::SetAttribute { attribute, .. }, Applied::Attribute(value)) => {
                self.sink.set_attribute(&binding.id, attribute, value)
            }
            (SinkSpec::SetVisibility { on, off, .. }, Applied::Visible(visible)) => {
                let state = if *visible { on } else { off };
                self.sink.set_visibility(&binding.id, *visible, state)
            }
            (SinkSpec::AnimateNumeric(spec), Applied::Target(target)) => {
                if self.animator.is_running(&binding.id) {
                    self.animator.retarget(&binding.id, *target);
                } else {
                    let from = match self.last_applied.get(&change.binding) {
                        Some(Applied::Target(previous)) => *previous,
                        _ => change.old.as_number().unwrap_or(0.0),
                    };
                    self.animator.start(&binding.id, from, *target, spec);
                }
            }
            _ => unreachable!("applied value always matches its sink"),
        }

        self.last_applied.insert(change.binding, next);
        self.applied += 1;
        true
    }

    /// Stops every in-flight animation.
    pub fn cancel_all(&mut self) {
        self.animator.stop_all();
    }

    /// Forgets what was applied, so the next value for every binding is written.
    pub fn reset(&mut self) {
        self.last_applied.clear();
    }

    pub fn flush(&mut self) {
        self.sink.flush();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn animator(&self) -> &A {
        &self.animator
    }

    /// Split borrow used by the frame loop to advance animations into the sink.
    pub fn parts_mut(&mut self) -> (&mut A, &mut S) {
        (&mut self.animator, &mut self.sink)
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{AnimationSpec, FieldBinding, ValueTest};
    use crate::diff::DiffRule;
    use crate::render::format::{NumberStyle, TextFormat};
    use crate::render::sinks::MemorySink;
    use crate::snapshot::{FieldPath, FieldValue};
    use std::collections::HashSet;

    /// Records calls and tracks which ids are animating.
    #[derive(Default)]
    struct RecordingAnimator {
        running: HashSet<String>,
        calls: Vec<String>,
    }

    impl Animator for RecordingAnimator {
        fn start(&mut self, id: &str, from: f64, to: f64, _spec: &AnimationSpec) {
            assert!(self.running.insert(id.to_string()), "second animation for {}", id);
            self.calls.push(format!("start {} {}->{}", id, from, to));
        }

        fn retarget(&mut self, id: &str, to: f64) {
            assert!(self.running.contains(id));
            self.calls.push(format!("retarget {} {}", id, to));
        }

        fn stop(&mut self, id: &str) {
            self.running.remove(id);
        }

        fn stop_all(&mut self) {
            self.running.clear();
            self.calls.push("stop_all".into());
        }

        fn is_running(&self, id: &str) -> bool {
            self.running.contains(id)
        }
    }

    fn p(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    fn bindings() -> Arc<BindingSet> {
        Arc::new(
            BindingSet::new(vec![
                FieldBinding {
                    id: "sr".into(),
                    rule: DiffRule::Strict { paths: vec![p("sr")] },
                    sink: SinkSpec::SetText { format: TextFormat::fixed(2) },
                },
                FieldBinding {
                    id: "bg".into(),
                    rule: DiffRule::Resource { paths: vec![p("bg")] },
                    sink: SinkSpec::SetAttribute {
                        attribute: "src".into(),
                        template: "http://127.0.0.1:9001/Songs/{value}".into(),
                        format: TextFormat::default(),
                    },
                },
                FieldBinding {
                    id: "wrapper".into(),
                    rule: DiffRule::Strict { paths: vec![p("state")] },
                    sink: SinkSpec::SetVisibility {
                        when: ValueTest::Equals(serde_json::json!(2)),
                        on: "translateX(0)".into(),
                        off: "translateX(-110%)".into(),
                    },
                },
                FieldBinding {
                    id: "pp".into(),
                    rule: DiffRule::ZeroGate { paths: vec![p("pp")] },
                    sink: SinkSpec::AnimateNumeric(AnimationSpec::default()),
                },
                FieldBinding {
                    id: "time".into(),
                    rule: DiffRule::Strict { paths: vec![p("time")] },
                    sink: SinkSpec::SetText {
                        format: TextFormat {
                            style: NumberStyle::Clock,
                            ..TextFormat::default()
                        },
                    },
                },
            ])
            .unwrap(),
        )
    }

    fn change(binding: usize, old: FieldValue, new: FieldValue) -> Change {
        Change {
            binding,
            path: String::new(),
            old,
            new,
        }
    }

    fn dispatcher() -> RenderDispatcher<MemorySink, RecordingAnimator> {
        RenderDispatcher::new(bindings(), MemorySink::new(), RecordingAnimator::default())
    }

    #[test]
    fn test_each_sink_kind_is_written() {
        let mut d = dispatcher();
        let delta = Delta {
            changes: vec![
                change(0, FieldValue::Absent, FieldValue::Number(5.274)),
                change(1, FieldValue::Absent, FieldValue::Text("123 abc/bg.jpg".into())),
                change(2, FieldValue::Absent, FieldValue::Number(2.0)),
                change(3, FieldValue::Absent, FieldValue::Number(300.0)),
            ],
        };
        assert_eq!(d.dispatch(&delta), 4);

        let sink = d.sink();
        assert_eq!(sink.text("sr"), Some("5.27"));
        assert_eq!(
            sink.attribute("bg", "src"),
            Some("http://127.0.0.1:9001/Songs/123 abc/bg.jpg")
        );
        assert_eq!(sink.visible("wrapper"), Some(true));
        assert_eq!(sink.visibility_state("wrapper"), Some("translateX(0)"));
        assert_eq!(d.animator().calls, vec!["start pp 0->300"]);
    }

    #[test]
    fn test_secondary_dedupe_skips_identical_output() {
        let mut d = dispatcher();
        assert!(d.apply(&change(4, FieldValue::Absent, FieldValue::Number(42_000.0))));
        // Different raw millis, same rendered clock text.
        assert!(!d.apply(&change(4, FieldValue::Number(42_000.0), FieldValue::Number(42_100.0))));
        assert_eq!(d.sink().writes(), 1);
        assert_eq!(d.skipped(), 1);

        // Visibility only written on flips.
        assert!(d.apply(&change(2, FieldValue::Absent, FieldValue::Number(1.0))));
        assert!(!d.apply(&change(2, FieldValue::Number(1.0), FieldValue::Number(7.0))));
        assert!(d.apply(&change(2, FieldValue::Number(7.0), FieldValue::Number(2.0))));
    }

    #[test]
    fn test_one_animation_per_field() {
        let mut d = dispatcher();
        d.apply(&change(3, FieldValue::Absent, FieldValue::Number(100.0)));
        d.apply(&change(3, FieldValue::Number(100.0), FieldValue::Number(150.0)));
        d.apply(&change(3, FieldValue::Number(150.0), FieldValue::Number(180.0)));
        assert_eq!(
            d.animator().calls,
            vec!["start pp 0->100", "retarget pp 150", "retarget pp 180"]
        );
        assert_eq!(d.animator().running.len(), 1);

        d.cancel_all();
        assert!(!d.animator().is_running("pp"));
        // After cancellation a new value starts from the last target.
        d.apply(&change(3, FieldValue::Number(180.0), FieldValue::Number(200.0)));
        assert_eq!(d.animator().calls.last().unwrap(), "start pp 180->200");
    }

    #[test]
    fn test_non_numeric_animation_value_is_skipped() {
        let mut d = dispatcher();
        assert!(!d.apply(&change(3, FieldValue::Absent, FieldValue::Text("n/a".into()))));
        assert!(d.animator().calls.is_empty());
    }

    #[test]
    fn test_reset_rewrites_everything() {
        let mut d = dispatcher();
        let c = change(0, FieldValue::Absent, FieldValue::Number(1.0));
        assert!(d.apply(&c));
        assert!(!d.apply(&c));
        d.reset();
        assert!(d.apply(&c));
    }
}
