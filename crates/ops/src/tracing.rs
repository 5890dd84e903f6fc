use super::{Log, LogLevel};
use serde_json::json;

// Credit to this blog for a high-level overview of implementing a custom
// tracing layer: https://burgers.io/custom-logging-in-rust-using-tracing
//
// Example usage:
//
//   use tracing_subscriber::prelude::*;
//   let env_filter = tracing_subscriber::EnvFilter::from_default_env();
//   tracing_subscriber::registry()
//     .with(zlomek_ops::tracing::Layer::new(zlomek_ops::stderr_log_handler, std::time::SystemTime::now).with_filter(env_filter))
//     .init();

pub struct Layer<H, T>(H, T)
where
    H: Fn(Log),
    T: Fn() -> std::time::SystemTime;

impl<H, T> Layer<H, T>
where
    H: Fn(Log),
    T: Fn() -> std::time::SystemTime,
{
    pub fn new(handler: H, timesource: T) -> Self {
        Self(handler, timesource)
    }

    fn log_from_metadata(&self, metadata: &tracing::Metadata) -> Log {
        let mut log = Log {
            ts: self.1().into(),
            level: level_from_tracing(metadata.level()),
            message: String::new(),
            fields: Default::default(),
            spans: Default::default(),
        };

        log.fields.insert(
            "module".to_string(),
            serde_json::value::to_raw_value(metadata.target()).unwrap(),
        );

        log
    }
}

impl<S, H, T> tracing_subscriber::Layer<S> for Layer<H, T>
where
    S: tracing::Subscriber,
    S: for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
    H: Fn(Log) + 'static,
    T: Fn() -> std::time::SystemTime + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut log = self.log_from_metadata(attrs.metadata());
        log.message = attrs.metadata().name().to_string();
        attrs.record(&mut FieldVisitor(&mut log));

        let span = ctx.span(id).unwrap();
        let mut extensions = span.extensions_mut();
        extensions.insert(log);
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let span = ctx.span(id).unwrap();
        let mut extensions = span.extensions_mut();
        let log: &mut Log = extensions.get_mut::<Log>().unwrap();
        values.record(&mut FieldVisitor(log));
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut log = self.log_from_metadata(event.metadata());
        event.record(&mut FieldVisitor(&mut log));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let span = extensions.get::<Log>().unwrap();
                log.spans.push(span.clone());
            }
        }

        self.0(log)
    }
}

struct FieldVisitor<'a>(&'a mut Log);

impl<'a> FieldVisitor<'a> {
    fn record_raw<S>(&mut self, field: &tracing::field::Field, value: S)
    where
        S: serde::Serialize + ToString,
    {
        if field.name() == "message" && self.0.message.is_empty() {
            self.0.message = value.to_string();
        } else if let Ok(value) = serde_json::value::to_raw_value(&value) {
            self.0.fields.insert(field.name().to_string(), value);
        } else {
            self.0.fields.insert(
                field.name().to_string(),
                serde_json::value::to_raw_value(&json!(value.to_string())).unwrap(),
            );
        }
    }
}

impl<'a> tracing::field::Visit for FieldVisitor<'a> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.record_raw(field, value)
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.record_raw(field, value)
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.record_raw(field, value)
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.record_raw(field, value)
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_raw(field, value)
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        let mut chain = vec![value.to_string()];
        let mut next = value.source();
        while let Some(cur) = next {
            chain.push(cur.to_string());
            next = cur.source();
        }
        self.0.fields.insert(
            field.name().to_string(),
            serde_json::value::to_raw_value(&chain).unwrap(),
        );
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_raw(field, format!("{value:?}"))
    }
}

fn level_from_tracing(lvl: &tracing::Level) -> LogLevel {
    match lvl.as_str() {
        "TRACE" => LogLevel::Trace,
        "DEBUG" => LogLevel::Debug,
        "INFO" => LogLevel::Info,
        "WARN" => LogLevel::Warn,
        "ERROR" => LogLevel::Error,
        other => panic!("{other:?} tracing::Level not handled"),
    }
}
