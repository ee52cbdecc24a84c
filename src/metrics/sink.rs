use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};

/// A name-keyed collection of exposed time series.
///
/// Registering a series whose name and labels already exist fails; unregistering
/// something absent is a no-op.
pub trait MetricSink {
    fn register(&self, collector: Box<dyn Collector>) -> prometheus::Result<()>;

    fn unregister(&self, collector: Box<dyn Collector>);

    fn gather(&self) -> Vec<MetricFamily>;
}

impl MetricSink for Registry {
    fn register(&self, collector: Box<dyn Collector>) -> prometheus::Result<()> {
        Registry::register(self, collector)
    }

    fn unregister(&self, collector: Box<dyn Collector>) {
        // `NotFound`-style errors mean it is already gone
        let _ = Registry::unregister(self, collector);
    }

    fn gather(&self) -> Vec<MetricFamily> {
        Registry::gather(self)
    }
}

/// Renders every series of the sink in the text exposition format.
pub fn render<S: MetricSink + ?Sized>(sink: &S) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = sink.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
