//! Test doubles standing in for the host app.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::anyhow;
use serde_json::Value;
use shared::{domain::EventName, protocol::HostMarker};
use tokio::sync::mpsc;

use crate::{
    correlator::CORRELATION_ID_FIELD, BridgeKind, GlobalScope, HostEnvironment, MiniKit,
    MiniKitSettings, Notifier, Transport,
};

/// Bridge that hands every posted command to the test as JSON.
pub(crate) struct ChannelTransport {
    tx: mpsc::UnboundedSender<Value>,
}

impl Transport for ChannelTransport {
    fn send(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let value = serde_json::from_slice(bytes)?;
        self.tx
            .send(value)
            .map_err(|_| anyhow!("test host stopped listening"))
    }
}

pub(crate) struct FailingTransport;

impl Transport for FailingTransport {
    fn send(&self, _bytes: &[u8]) -> anyhow::Result<()> {
        Err(anyhow!("postMessage threw"))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("notifier").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().expect("notifier").push(message.to_string());
    }
}

pub(crate) struct TestHost {
    pub(crate) kit: Arc<MiniKit>,
    pub(crate) scope: GlobalScope,
    pub(crate) outbound: mpsc::UnboundedReceiver<Value>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

pub(crate) fn fast_settings() -> MiniKitSettings {
    MiniKitSettings {
        command_timeout: Duration::from_millis(50),
        ..MiniKitSettings::default()
    }
}

pub(crate) fn host_marker() -> HostMarker {
    HostMarker {
        device_os: Some("ios".into()),
        version: Some(3),
        is_optional_analytics: Some(true),
        supported_commands: Some(vec!["pay".into()]),
        safe_area_insets: None,
    }
}

pub(crate) fn test_host_with(scope: GlobalScope, settings: MiniKitSettings) -> TestHost {
    let (tx, outbound) = mpsc::unbounded_channel();
    let scope = scope.with_bridge(BridgeKind::NativeApp, Arc::new(ChannelTransport { tx }));
    let notifier = Arc::new(RecordingNotifier::default());
    let kit = MiniKit::new_with_notifier(
        HostEnvironment::new(scope.clone()),
        settings,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    TestHost {
        kit,
        scope,
        outbound,
        notifier,
    }
}

pub(crate) fn test_host() -> TestHost {
    test_host_with(GlobalScope::new().with_host(host_marker()), fast_settings())
}

impl TestHost {
    /// Waits for the next posted command and answers it with `payload`,
    /// echoing the correlation id when the command carried one.
    pub(crate) async fn answer_next(&mut self, event: EventName, mut payload: Value) -> Value {
        let sent = self.outbound.recv().await.expect("outbound command");
        if let (Some(token), Some(fields)) = (sent.get(CORRELATION_ID_FIELD), payload.as_object_mut())
        {
            fields.insert(CORRELATION_ID_FIELD.to_string(), token.clone());
        }
        self.kit.dispatch(event, &payload);
        sent
    }

    pub(crate) fn nothing_sent(&mut self) -> bool {
        self.outbound.try_recv().is_err()
    }
}
