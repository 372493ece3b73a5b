#![allow(dead_code)]
//! Integration tests for tessera logging.

#[path = "../src/logger.rs"]
mod logger;

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex},
    };

    use log::LevelFilter;
    use logger::{CONVERT_TARGET, LogSettings, OBJECT_TARGET};
    use tessera::Tessera;
    use tessera_test::connect_with;
    use tracing::{
        Event, Level, Metadata, Subscriber, dispatcher,
        field::{Field, Visit},
        span::{Attributes, Id, Record},
    };

    use super::logger;

    #[derive(Clone, Default)]
    struct CapturingSubscriber {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        level: Level,
        target: String,
        fields: HashMap<String, String>,
    }

    impl CapturingSubscriber {
        fn events(&self) -> Vec<CapturedEvent> {
            self.events.lock().unwrap().clone()
        }

        fn actions(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter(|e| e.target == OBJECT_TARGET)
                .filter_map(|e| e.fields.get("action").cloned())
                .collect()
        }
    }

    struct FieldVisitor<'a> {
        fields: &'a mut HashMap<String, String>,
    }

    impl<'a> Visit for FieldVisitor<'a> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl Subscriber for CapturingSubscriber {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _attrs: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _span: &Id, _values: &Record<'_>) {}

        fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

        fn event(&self, event: &Event<'_>) {
            let mut fields = HashMap::new();
            let mut visitor = FieldVisitor {
                fields: &mut fields,
            };
            event.record(&mut visitor);
            self.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                fields,
            });
        }

        fn enter(&self, _span: &Id) {}

        fn exit(&self, _span: &Id) {}
    }

    #[test]
    fn logs_lifecycle_at_configured_level() {
        let subscriber = CapturingSubscriber::default();
        let dispatch = dispatcher::Dispatch::new(subscriber.clone());
        let _guard = dispatcher::set_default(&dispatch);

        let mut settings = LogSettings::default();
        settings.log_lifecycle(LevelFilter::Info);
        settings.lifecycle("allocate", "TESSERA.PERSON", Some(7));
        drop(_guard);

        let events = subscriber.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::INFO);
        assert_eq!(event.target, OBJECT_TARGET);
        assert_eq!(event.fields.get("action").unwrap(), "allocate");
        assert_eq!(event.fields.get("object_type").unwrap(), "TESSERA.PERSON");
        assert_eq!(event.fields.get("instance").unwrap(), "7");
    }

    #[test]
    fn logs_conversions() {
        let subscriber = CapturingSubscriber::default();
        let dispatch = dispatcher::Dispatch::new(subscriber.clone());
        let _guard = dispatcher::set_default(&dispatch);

        let mut settings = LogSettings::default();
        settings.log_conversions(LevelFilter::Warn);
        settings.conversion("to_native", "NUMBER", "int64", false);
        drop(_guard);

        let events = subscriber.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::WARN);
        assert_eq!(event.target, CONVERT_TARGET);
        assert_eq!(event.fields.get("direction").unwrap(), "to_native");
        assert_eq!(event.fields.get("db_type").unwrap(), "NUMBER");
        assert_eq!(event.fields.get("value_type").unwrap(), "int64");
        assert_eq!(event.fields.get("is_null").unwrap(), "false");
    }

    #[test]
    fn stays_quiet_when_off() {
        let subscriber = CapturingSubscriber::default();
        let dispatch = dispatcher::Dispatch::new(subscriber.clone());
        let _guard = dispatcher::set_default(&dispatch);

        let mut settings = LogSettings::default();
        settings.log_lifecycle(LevelFilter::Off);
        settings.log_conversions(LevelFilter::Off);
        assert!(!settings.is_enabled());
        settings.lifecycle("close", "TESSERA.PERSON", None);
        settings.conversion("from_native", "DATE", "timestamp", true);
        drop(_guard);

        assert!(subscriber.events().is_empty());
    }

    #[test]
    fn logs_object_lifecycle() -> anyhow::Result<()> {
        let subscriber = CapturingSubscriber::default();
        let dispatch = dispatcher::Dispatch::new(subscriber.clone());
        let _guard = dispatcher::set_default(&dispatch);

        let options = Tessera::new()
            .log_lifecycle(LevelFilter::Info)
            .log_conversions(LevelFilter::Off);
        let (_engine, conn) = connect_with(&options)?;
        let person = conn.object_type("PERSON")?.new_object()?;
        person.set("HOME", conn.object_type("ADDRESS")?.new_object()?)?;
        let home = person.get("HOME")?;
        let copy = person.copy()?;
        drop((home, copy, person));
        drop(_guard);

        assert_eq!(
            subscriber.actions(),
            [
                "allocate",
                "allocate",
                "close",
                "allocate dependent",
                "allocate",
                "copy",
                "close",
                "close",
            ]
        );
        assert!(
            subscriber
                .events()
                .iter()
                .all(|e| e.target == OBJECT_TARGET && e.level == Level::INFO)
        );
        Ok(())
    }
}
