//! Plugin runtime — the host-sandbox event loop.
//!
//! DESIGN
//! ======
//! One cooperative loop `select!`s over two inbound streams: host events
//! (selection/shape/theme changes) and panel messages (`ready`,
//! `export-selection`, `add-capture`). Services own the business logic; the
//! loop owns dispatch and all outbound messaging, and it is the only place
//! where operation failures are caught and logged — no failure propagates
//! out of the loop, so the sandbox stays responsive after any single
//! operation fails.
//!
//! Selection-change handling is not serialized against in-flight exports:
//! an export keeps operating on the selection snapshot captured at its
//! start even if the selection moves underneath it.
//!
//! LIFECYCLE
//! =========
//! 1. `run` subscribes to the selection and theme topics
//! 2. Host events → rebind and/or resend; panel messages → services
//! 3. Either channel closing ends the loop
//! 4. Shutdown releases the shape binding and the topic subscriptions

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{DocumentHost, EventTopic, HostEvent, Subscription};
use crate::config::RuntimeSettings;
use crate::protocol::{HostMessage, PanelMessage, ShapeId};
use crate::services::rebind::Rebinder;
use crate::services::{capture, export, snapshot};

/// Host-side synchronization engine. Owns the listener binding state and the
/// outbound channel to the panel.
pub struct PluginRuntime {
    host: Arc<dyn DocumentHost>,
    settings: RuntimeSettings,
    rebinder: Rebinder,
    panel_tx: mpsc::Sender<HostMessage>,
    topic_subscriptions: Vec<Subscription>,
}

impl PluginRuntime {
    #[must_use]
    pub fn new(host: Arc<dyn DocumentHost>, settings: RuntimeSettings, panel_tx: mpsc::Sender<HostMessage>) -> Self {
        Self {
            host,
            settings,
            rebinder: Rebinder::new(),
            panel_tx,
            topic_subscriptions: Vec::new(),
        }
    }

    /// Drive the synchronization loop until either inbound channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>, mut panel_rx: mpsc::Receiver<PanelMessage>) {
        if let Err(e) = self.subscribe_topics().await {
            error!(error = %e, "failed to subscribe to host topics");
        }
        info!("plugin runtime started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.on_host_event(event).await;
                }
                message = panel_rx.recv() => {
                    let Some(message) = message else { break };
                    self.on_panel_message(message).await;
                }
            }
        }

        self.shutdown().await;
        info!("plugin runtime stopped");
    }

    async fn subscribe_topics(&mut self) -> Result<(), crate::api::HostError> {
        for topic in [EventTopic::SelectionChange, EventTopic::ThemeChange] {
            let subscription = self.host.subscribe(topic).await?;
            self.topic_subscriptions.push(subscription);
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.rebinder.release(self.host.as_ref()).await {
            warn!(error = %e, "failed to release shape binding on shutdown");
        }
        for subscription in self.topic_subscriptions.drain(..) {
            if let Err(e) = self.host.unsubscribe(subscription).await {
                warn!(error = %e, "failed to release topic subscription on shutdown");
            }
        }
    }

    // =========================================================================
    // HOST EVENTS
    // =========================================================================

    async fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::SelectionChanged => self.on_selection_changed().await,
            HostEvent::ShapeChanged(id) => self.on_shape_changed(id).await,
            HostEvent::ThemeChanged(theme) => {
                self.send(HostMessage::ThemeChange { theme }).await;
            }
        }
    }

    /// Rebind the shape-change listener, then always resend the selection —
    /// the resend happens regardless of the binding outcome.
    async fn on_selection_changed(&mut self) {
        let selection = match self.host.selection().await {
            Ok(selection) => selection,
            Err(e) => {
                error!(error = %e, "failed to read selection");
                return;
            }
        };

        if let Err(e) = self.rebinder.rebind(self.host.as_ref(), &selection).await {
            warn!(error = %e, "shape-change rebind failed");
        }

        self.send(HostMessage::SelectionChange { selection: snapshot::build_snapshots(&selection) })
            .await;
    }

    /// A bound shape mutated: resend a snapshot of the whole current
    /// selection, which may contain more shapes than the bound one.
    async fn on_shape_changed(&mut self, id: ShapeId) {
        if self.rebinder.bound_shape() != Some(id) {
            // Event raced a rebind; the binding it belonged to is gone.
            debug!(shape = %id, "ignoring shape-change for unbound shape");
            return;
        }
        self.resend_selection().await;
    }

    // =========================================================================
    // PANEL MESSAGES
    // =========================================================================

    async fn on_panel_message(&mut self, message: PanelMessage) {
        match message {
            PanelMessage::Ready => self.resend_selection().await,
            PanelMessage::ExportSelection => self.on_export_selection().await,
            PanelMessage::AddCapture { image_data } => {
                if let Err(e) = capture::import_capture(self.host.as_ref(), &image_data, &self.settings).await {
                    error!(error = %e, "capture import failed");
                }
            }
        }
    }

    async fn on_export_selection(&mut self) {
        // Capture the selection once; in-flight jobs keep this snapshot.
        let selection = match self.host.selection().await {
            Ok(selection) => selection,
            Err(e) => {
                error!(error = %e, "failed to read selection for export");
                return;
            }
        };
        let snapshots = snapshot::build_snapshots(&selection).unwrap_or_default();

        match export::export_selection(self.host.as_ref(), &snapshots, &self.settings).await {
            Ok(exports) => self.send(HostMessage::ExportResult { exports }).await,
            Err(e) => error!(error = %e, "selection export failed"),
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    async fn resend_selection(&mut self) {
        match self.host.selection().await {
            Ok(selection) => {
                self.send(HostMessage::SelectionChange { selection: snapshot::build_snapshots(&selection) })
                    .await;
            }
            Err(e) => error!(error = %e, "failed to read selection"),
        }
    }

    async fn send(&self, message: HostMessage) {
        if self.panel_tx.send(message).await.is_err() {
            warn!("panel channel closed; dropping outbound message");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use super::*;
    use crate::api::HostShape;
    use crate::api::test_helpers::{ScriptedHost, UploadMode, init_tracing, shape};

    struct Harness {
        host: Arc<ScriptedHost>,
        events_tx: mpsc::Sender<HostEvent>,
        panel_cmd_tx: mpsc::Sender<PanelMessage>,
        panel_rx: mpsc::Receiver<HostMessage>,
        runtime: JoinHandle<()>,
    }

    fn start(shapes: Vec<HostShape>) -> Harness {
        let host = Arc::new(ScriptedHost::new(shapes));
        let (events_tx, events_rx) = mpsc::channel(16);
        let (panel_cmd_tx, panel_cmd_rx) = mpsc::channel(16);
        let (panel_tx, panel_rx) = mpsc::channel(16);

        let runtime = PluginRuntime::new(host.clone(), RuntimeSettings::default(), panel_tx);
        let runtime = tokio::spawn(runtime.run(events_rx, panel_cmd_rx));

        Harness { host, events_tx, panel_cmd_tx, panel_rx, runtime }
    }

    async fn recv(harness: &mut Harness) -> HostMessage {
        timeout(Duration::from_secs(1), harness.panel_rx.recv())
            .await
            .expect("timed out waiting for panel message")
            .expect("panel channel closed")
    }

    async fn stop(harness: Harness) {
        drop(harness.events_tx);
        drop(harness.panel_cmd_tx);
        harness.runtime.await.unwrap();
    }

    #[tokio::test]
    async fn selection_change_emits_exactly_one_message() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes.clone());

        harness.events_tx.send(HostEvent::SelectionChanged).await.unwrap();

        let HostMessage::SelectionChange { selection } = recv(&mut harness).await else {
            panic!("expected selectionchange");
        };
        let selection = selection.unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].id, shapes[0].id);

        stop(harness).await;
    }

    #[tokio::test]
    async fn empty_selection_change_emits_explicit_none() {
        let mut harness = start(vec![]);

        harness.events_tx.send(HostEvent::SelectionChanged).await.unwrap();

        assert_eq!(recv(&mut harness).await, HostMessage::SelectionChange { selection: None });
        stop(harness).await;
    }

    #[tokio::test]
    async fn selection_change_rebinds_first_shape() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0), shape("b", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes.clone());

        harness.events_tx.send(HostEvent::SelectionChanged).await.unwrap();
        let _ = recv(&mut harness).await;

        assert_eq!(harness.host.shape_change_target(), Some(shapes[0].id));
        stop(harness).await;
    }

    #[tokio::test]
    async fn bound_shape_change_resends_current_selection() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0), shape("b", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes.clone());

        harness.events_tx.send(HostEvent::SelectionChanged).await.unwrap();
        let _ = recv(&mut harness).await;

        harness.events_tx.send(HostEvent::ShapeChanged(shapes[0].id)).await.unwrap();
        let HostMessage::SelectionChange { selection } = recv(&mut harness).await else {
            panic!("expected selectionchange");
        };
        // The resend covers the whole selection, not just the bound shape.
        assert_eq!(selection.unwrap().len(), 2);

        stop(harness).await;
    }

    #[tokio::test]
    async fn stale_shape_change_is_ignored() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes.clone());

        // Never bound: no selection-change was processed yet.
        harness.events_tx.send(HostEvent::ShapeChanged(shapes[0].id)).await.unwrap();
        harness.events_tx.send(HostEvent::ThemeChanged("dark".into())).await.unwrap();

        // Only the theme message arrives; the stale shape-change produced nothing.
        assert_eq!(recv(&mut harness).await, HostMessage::ThemeChange { theme: "dark".into() });
        stop(harness).await;
    }

    #[tokio::test]
    async fn theme_change_forwards_theme() {
        let mut harness = start(vec![]);

        harness.events_tx.send(HostEvent::ThemeChanged("dark".into())).await.unwrap();

        assert_eq!(recv(&mut harness).await, HostMessage::ThemeChange { theme: "dark".into() });
        stop(harness).await;
    }

    #[tokio::test]
    async fn ready_triggers_immediate_resend() {
        let shapes = vec![shape("a", 2.0, 3.0, 4.0, 5.0)];
        let mut harness = start(shapes.clone());

        harness.panel_cmd_tx.send(PanelMessage::Ready).await.unwrap();

        let HostMessage::SelectionChange { selection } = recv(&mut harness).await else {
            panic!("expected selectionchange");
        };
        assert_eq!(selection.unwrap()[0].id, shapes[0].id);
        stop(harness).await;
    }

    #[tokio::test]
    async fn export_selection_round_trip_preserves_order() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0), shape("b", 0.0, 0.0, 2.0, 2.0)];
        let mut harness = start(shapes.clone());
        {
            let mut delays = harness.host.export_delays_ms.lock().unwrap();
            delays.insert(shapes[0].id, 25);
            let mut payloads = harness.host.export_payloads.lock().unwrap();
            payloads.insert(shapes[0].id, vec![1]);
            payloads.insert(shapes[1].id, vec![2]);
        }

        harness.panel_cmd_tx.send(PanelMessage::ExportSelection).await.unwrap();

        let HostMessage::ExportResult { exports } = recv(&mut harness).await else {
            panic!("expected export-result");
        };
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].image_data, vec![1]);
        assert_eq!(exports[1].image_data, vec![2]);
        stop(harness).await;
    }

    #[tokio::test]
    async fn failed_export_emits_no_result_but_loop_stays_alive() {
        init_tracing();
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes.clone());
        harness.host.failing_exports.lock().unwrap().push(shapes[0].id);

        harness.panel_cmd_tx.send(PanelMessage::ExportSelection).await.unwrap();
        // The loop survives the failure and keeps serving messages.
        harness.events_tx.send(HostEvent::ThemeChanged("dark".into())).await.unwrap();

        assert_eq!(recv(&mut harness).await, HostMessage::ThemeChange { theme: "dark".into() });
        stop(harness).await;
    }

    #[tokio::test]
    async fn add_capture_runs_transaction() {
        let shapes = vec![shape("anchor", 10.0, 20.0, 30.0, 40.0)];
        let mut harness = start(shapes);

        harness
            .panel_cmd_tx
            .send(PanelMessage::AddCapture { image_data: vec![1, 2, 3] })
            .await
            .unwrap();
        // Synchronize on a subsequent message to know the capture finished.
        harness.panel_cmd_tx.send(PanelMessage::Ready).await.unwrap();
        let _ = recv(&mut harness).await;

        assert_eq!(harness.host.created.lock().unwrap().len(), 1);
        assert_eq!(harness.host.finish_count.load(std::sync::atomic::Ordering::SeqCst), 1);
        stop(harness).await;
    }

    #[tokio::test]
    async fn failed_capture_leaves_loop_alive() {
        init_tracing();
        let shapes = vec![shape("anchor", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes);
        *harness.host.upload_mode.lock().unwrap() = UploadMode::Reject;

        harness
            .panel_cmd_tx
            .send(PanelMessage::AddCapture { image_data: vec![9] })
            .await
            .unwrap();
        harness.panel_cmd_tx.send(PanelMessage::Ready).await.unwrap();
        let _ = recv(&mut harness).await;

        assert!(harness.host.created.lock().unwrap().is_empty());
        assert_eq!(harness.host.finish_count.load(std::sync::atomic::Ordering::SeqCst), 1);
        stop(harness).await;
    }

    #[tokio::test]
    async fn startup_subscribes_and_shutdown_releases_everything() {
        let shapes = vec![shape("a", 0.0, 0.0, 1.0, 1.0)];
        let mut harness = start(shapes);

        // Bind a shape so shutdown has all three subscriptions to release.
        harness.events_tx.send(HostEvent::SelectionChanged).await.unwrap();
        let _ = recv(&mut harness).await;
        assert_eq!(harness.host.subscription_count(), 3);

        let host = harness.host.clone();
        stop(harness).await;
        assert_eq!(host.subscription_count(), 0);
    }
}
