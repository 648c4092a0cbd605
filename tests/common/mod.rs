//! A `tracing-subscriber` layer that remembers every span field and event.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Clone, Debug, Default)]
pub struct CapturedSpan {
    pub name: &'static str,
    pub fields: HashMap<String, String>,
    /// Field names recorded after creation, in order.
    pub records: Vec<String>,
}

impl CapturedSpan {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn times_recorded(&self, name: &str) -> usize {
        self.records.iter().filter(|r| *r == name).count()
    }
}

#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: HashMap<String, String>,
}

#[derive(Default)]
struct Captured {
    ids: Vec<(Id, usize)>,
    spans: Vec<CapturedSpan>,
    events: Vec<CapturedEvent>,
}

#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Captured>>);

impl Capture {
    /// Installs a capturing subscriber for the current thread.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        let captured = self.0.lock().unwrap();
        captured.spans.iter().filter(|s| s.name == name).cloned().collect()
    }

    pub fn errors(&self) -> Vec<CapturedEvent> {
        let captured = self.0.lock().unwrap();
        captured.events.iter().filter(|e| e.level == Level::ERROR).cloned().collect()
    }
}

struct Fields<'a> {
    fields: &'a mut HashMap<String, String>,
    recorded: Option<&'a mut Vec<String>>,
}

impl Fields<'_> {
    fn insert(&mut self, field: &Field, value: String) {
        if let Some(recorded) = self.recorded.as_mut() {
            recorded.push(field.name().to_owned());
        }
        self.fields.insert(field.name().to_owned(), value);
    }
}

impl Visit for Fields<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _cx: Context<'_, S>) {
        let mut span = CapturedSpan { name: attrs.metadata().name(), ..Default::default() };
        attrs.record(&mut Fields { fields: &mut span.fields, recorded: None });

        let mut captured = self.0.lock().unwrap();
        let index = captured.spans.len();
        captured.spans.push(span);
        captured.ids.push((id.clone(), index));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _cx: Context<'_, S>) {
        let mut captured = self.0.lock().unwrap();
        // Ids are reused once a span closes; the latest entry is the live one.
        let Some(&(_, index)) = captured.ids.iter().rev().find(|(i, _)| i == id) else {
            return;
        };
        let span = &mut captured.spans[index];
        values.record(&mut Fields { fields: &mut span.fields, recorded: Some(&mut span.records) });
    }

    fn on_event(&self, event: &Event<'_>, _cx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut Fields { fields: &mut fields, recorded: None });
        self.0.lock().unwrap().events.push(CapturedEvent { level: *event.metadata().level(), fields });
    }
}
