use metrics::counter;
use relay_core::{MonitoringEvent, MonitoringSink};
use tracing::{info, warn};

/// 监控事件接收器：写入日志并累加计数器
///
/// Counter `relay_monitoring_events_total{event, dispatcher}` is exported
/// through whatever metrics recorder the process installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitoringSink;

impl TracingMonitoringSink {
    pub fn new() -> Self {
        Self
    }
}

impl MonitoringSink for TracingMonitoringSink {
    fn event(&self, source: &str, event: MonitoringEvent) {
        match event {
            MonitoringEvent::TimeoutCleared => {
                info!(dispatcher = source, "监控事件: {}", event)
            }
            MonitoringEvent::TimeoutOccurred | MonitoringEvent::ExceptionCaught => {
                warn!(dispatcher = source, "监控事件: {}", event)
            }
        }
        counter!(
            "relay_monitoring_events_total",
            "event" => event.name(),
            "dispatcher" => source.to_string()
        )
        .increment(1);
    }
}
