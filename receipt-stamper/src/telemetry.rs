use tracing::{subscriber::set_global_default, Subscriber};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// JSON (bunyan) subscriber writing to `sink`. `RUST_LOG` wins over
/// `env_filter` when set.
pub fn get_subscriber<Sink>(
    name: String,
    env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        // span fields are copied into every record by the formatter
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Installs `subscriber` for the whole process. Call once, at startup.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    // reqwest and hyper log through the `log` facade
    LogTracer::init().expect("Failed to set logger.");

    set_global_default(subscriber).expect("Failed to set subscriber");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn records_carry_the_binary_name_and_honor_the_level() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = get_subscriber("stamp-once".into(), "warn".into(), move || sink.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("below the level");
            tracing::warn!(index = 3, "Stamp rejected");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(r#""name":"stamp-once""#));
        assert!(output.contains("Stamp rejected"));
        assert!(!output.contains("below the level"));
    }
}
