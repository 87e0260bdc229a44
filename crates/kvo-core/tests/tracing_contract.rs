#![forbid(unsafe_code)]

//! Logging contract: which events the notification engine emits, and at
//! which level.

use std::sync::{Arc, Mutex};

use kvo_core::{KeyValueCoding, KvoObject, ObserverId, Value};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Clone, Debug)]
struct Captured {
    level: Level,
    message: String,
    key_path: Option<String>,
}

#[derive(Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> Layer<S> for EventCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        #[derive(Default)]
        struct Fields {
            message: String,
            key_path: Option<String>,
        }
        impl tracing::field::Visit for Fields {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                match field.name() {
                    "message" => self.message = value.to_string(),
                    "key_path" => self.key_path = Some(value.to_string()),
                    _ => {}
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                match field.name() {
                    "message" => self.message = format!("{value:?}").trim_matches('"').to_string(),
                    "key_path" => {
                        self.key_path = Some(format!("{value:?}").trim_matches('"').to_string());
                    }
                    _ => {}
                }
            }
        }
        let mut fields = Fields::default();
        event.record(&mut fields);
        self.events.lock().expect("capture lock").push(Captured {
            level: *event.metadata().level(),
            message: fields.message,
            key_path: fields.key_path,
        });
    }
}

fn capture<R>(run: impl FnOnce() -> R) -> (R, Vec<Captured>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    let result = tracing::subscriber::with_default(subscriber, run);
    let events = events.lock().expect("capture lock").clone();
    (result, events)
}

#[test]
fn failing_observers_are_logged_at_warn() {
    let object = KvoObject::new().with("name", "Ann");
    object
        .add_observer_for_key_path(
            ObserverId::new(),
            |_, _, _| Err("no thanks".into()),
            "name",
            Value::Null,
        )
        .unwrap();

    let ((), events) = capture(|| {
        object.set_value_for_key(Value::from("Bea"), "name").unwrap();
    });

    let warnings: Vec<&Captured> = events.iter().filter(|e| e.level == Level::WARN).collect();
    assert_eq!(warnings.len(), 1, "events: {events:?}");
    assert_eq!(warnings[0].key_path.as_deref(), Some("name"));
    assert!(warnings[0].message.contains("observer callback failed"));
}

#[test]
fn dispatch_is_traced() {
    let object = KvoObject::new().with("n", 1);
    object
        .add_observer_for_key_path(ObserverId::new(), |_, _, _| Ok(()), "n", Value::Null)
        .unwrap();

    let ((), events) = capture(|| {
        object.set_value_for_key(Value::from(2), "n").unwrap();
    });

    assert!(
        events
            .iter()
            .any(|e| e.level == Level::TRACE && e.message == "dispatch" && e.key_path.as_deref() == Some("n"))
    );
    assert!(events.iter().all(|e| e.level != Level::WARN));
}

#[test]
fn unbalanced_did_change_is_a_debug_event() {
    let object = KvoObject::new();
    let ((), events) = capture(|| {
        object.did_change_value_for_key("n").unwrap();
    });
    assert!(
        events
            .iter()
            .any(|e| e.level == Level::DEBUG && e.message.contains("without a matching"))
    );
}

#[test]
fn pruned_links_are_debug_events() {
    let child = KvoObject::new().with("v", 1);
    {
        let parent = KvoObject::new().with("child", child.clone());
        parent
            .add_observer_for_key_path(ObserverId::new(), |_, _, _| Ok(()), "child.v", Value::Null)
            .unwrap();
    }
    let ((), events) = capture(|| {
        child.set_value_for_key(Value::from(2), "v").unwrap();
    });
    assert!(
        events
            .iter()
            .any(|e| e.level == Level::DEBUG && e.message.contains("pruning parent link"))
    );
}
