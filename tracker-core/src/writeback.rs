//! Writeback: observes update-buffer writes to predicates configured as
//! "writeback" and forwards them to an external writer that stamps the
//! change back into the file's own metadata. The writer itself is a narrow
//! trait boundary, out of scope.

use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait WritebackSink: Send + Sync {
    async fn write_back(&self, resource_uri: &str, property: &str, value: &Value) -> Result<()>;
}

/// A sink that drops everything; used when `enable-writeback` is false.
pub struct NullWritebackSink;

#[async_trait]
impl WritebackSink for NullWritebackSink {
    async fn write_back(&self, _resource_uri: &str, _property: &str, _value: &Value) -> Result<()> {
        Ok(())
    }
}

pub struct WritebackDispatcher {
    sink: Arc<dyn WritebackSink>,
    writeback_properties: HashSet<String>,
    enabled: bool,
}

impl WritebackDispatcher {
    pub fn new(sink: Arc<dyn WritebackSink>, writeback_properties: HashSet<String>, enabled: bool) -> Self {
        Self {
            sink,
            writeback_properties,
            enabled,
        }
    }

    /// Called by the update buffer after a successful `set_value`; forwards
    /// to the sink only if writeback is enabled and `property` is in the
    /// configured writeback set.
    pub async fn observe(&self, resource_uri: &str, property: &str, value: &Value) -> Result<()> {
        if !self.enabled || !self.writeback_properties.contains(property) {
            return Ok(());
        }
        debug!(resource_uri, property, "forwarding writeback");
        self.sink.write_back(resource_uri, property, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl WritebackSink for RecordingSink {
        async fn write_back(&self, resource_uri: &str, property: &str, _value: &Value) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((resource_uri.to_string(), property.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn forwards_only_configured_predicates() {
        let sink = Arc::new(RecordingSink::default());
        let mut props = HashSet::new();
        props.insert("nie:title".to_string());
        let dispatcher = WritebackDispatcher::new(sink.clone(), props, true);

        dispatcher
            .observe("urn:1", "nie:title", &Value::String("x".into()))
            .await
            .unwrap();
        dispatcher
            .observe("urn:1", "nfo:fileSize", &Value::Int64(1))
            .await
            .unwrap();

        assert_eq!(sink.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_dispatcher_forwards_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let mut props = HashSet::new();
        props.insert("nie:title".to_string());
        let dispatcher = WritebackDispatcher::new(sink.clone(), props, false);

        dispatcher
            .observe("urn:1", "nie:title", &Value::String("x".into()))
            .await
            .unwrap();

        assert!(sink.calls.lock().unwrap().is_empty());
    }
}
