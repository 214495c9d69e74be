use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetectorState {
    #[default]
    NoBaseline,
    HasBaseline(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    /// First value seen; becomes the baseline.
    Initial(Value),
    Unchanged(Value),
    Changed { old: Value, new: Value },
}

impl DetectorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorEvent::Initial(_) => "initial",
            DetectorEvent::Unchanged(_) => "unchanged",
            DetectorEvent::Changed { .. } => "changed",
        }
    }
}

impl fmt::Display for DetectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorEvent::Initial(value) => {
                write!(f, "Monitored value: {}", display_value(value))
            }
            DetectorEvent::Unchanged(value) => {
                write!(f, "No change. Current value: {}", display_value(value))
            }
            DetectorEvent::Changed { old, new } => write!(
                f,
                "Value changed: {} -> {}",
                display_value(old),
                display_value(new)
            ),
        }
    }
}

/// Renders a value for humans: bare strings, compact JSON for the rest.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Owns the last known value and compares each new value against it.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    state: DetectorState,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn baseline(&self) -> Option<&Value> {
        match &self.state {
            DetectorState::NoBaseline => None,
            DetectorState::HasBaseline(value) => Some(value),
        }
    }

    pub fn observe(&mut self, value: Value) -> DetectorEvent {
        match std::mem::take(&mut self.state) {
            DetectorState::NoBaseline => {
                self.state = DetectorState::HasBaseline(value.clone());
                DetectorEvent::Initial(value)
            }
            DetectorState::HasBaseline(old) if old == value => {
                self.state = DetectorState::HasBaseline(old);
                DetectorEvent::Unchanged(value)
            }
            DetectorState::HasBaseline(old) => {
                self.state = DetectorState::HasBaseline(value.clone());
                DetectorEvent::Changed { old, new: value }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = DetectorState::NoBaseline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_value_is_initial() {
        let mut detector = ChangeDetector::new();
        assert!(detector.baseline().is_none());
        assert_eq!(detector.observe(json!(1000)), DetectorEvent::Initial(json!(1000)));
        assert_eq!(detector.baseline(), Some(&json!(1000)));
    }

    #[test]
    fn test_network_exp_scenario() {
        let mut detector = ChangeDetector::new();
        assert_eq!(detector.observe(json!(1000)), DetectorEvent::Initial(json!(1000)));
        assert_eq!(
            detector.observe(json!(1500)),
            DetectorEvent::Changed {
                old: json!(1000),
                new: json!(1500)
            }
        );
        assert_eq!(detector.observe(json!(1500)), DetectorEvent::Unchanged(json!(1500)));
    }

    #[test]
    fn test_changed_iff_differs_from_previous() {
        let values = [json!(1), json!(1), json!(2), json!("x"), json!("x"), json!([1, 2]), json!(1)];
        let mut detector = ChangeDetector::new();
        let events: Vec<_> = values.iter().cloned().map(|v| detector.observe(v)).collect();

        let initial_count = events
            .iter()
            .filter(|e| matches!(e, DetectorEvent::Initial(_)))
            .count();
        assert_eq!(initial_count, 1);
        assert!(matches!(events[0], DetectorEvent::Initial(_)));

        for i in 1..values.len() {
            let changed = matches!(events[i], DetectorEvent::Changed { .. });
            assert_eq!(changed, values[i] != values[i - 1], "tick {i}");
        }
    }

    #[test]
    fn test_repeated_value_never_changes() {
        let mut detector = ChangeDetector::new();
        detector.observe(json!({ "coins": 5 }));
        for _ in 0..50 {
            assert_eq!(
                detector.observe(json!({ "coins": 5 })).kind(),
                "unchanged"
            );
        }
    }

    #[test]
    fn test_deep_equality_ignores_key_order() {
        let mut detector = ChangeDetector::new();
        detector.observe(json!({ "a": 1, "b": [1, 2] }));
        let event = detector.observe(serde_json::from_str(r#"{"b":[1,2],"a":1}"#).unwrap());
        assert!(matches!(event, DetectorEvent::Unchanged(_)));
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut detector = ChangeDetector::new();
        detector.observe(json!(1));
        detector.reset();
        assert_eq!(detector.state(), &DetectorState::NoBaseline);
        assert!(matches!(detector.observe(json!(2)), DetectorEvent::Initial(_)));
    }

    #[test]
    fn test_event_display() {
        let event = DetectorEvent::Changed {
            old: json!("Steve"),
            new: json!({ "rank": "MVP" }),
        };
        assert_eq!(event.to_string(), r#"Value changed: Steve -> {"rank":"MVP"}"#);
    }
}
