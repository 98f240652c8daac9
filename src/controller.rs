//! Command dispatcher between the controller UI and the coordinator.
//!
//! The UI only ever enqueues [`MenuAction`]s; a worker task talks to the
//! lights and reports back through the [`UiHandle`] capability, so a slow or
//! unreachable light never stalls the UI. Any trigger (timer, calendar, manual
//! click) drives the lights the same way, through [`ControllerHandle::dispatch`].

use crate::coordinator::{Coordinator, ReadOutcome, SetOutcome};
use crate::error::{LightError, Result};
use crate::types::{Availability, Color};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Actions offered by the controller menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Toggle,
    SetAvailable,
    SetBusy,
    Exit,
}

/// What the dispatcher may do to the user interface
pub trait UiHandle: Send + Sync + 'static {
    /// Show the current availability (the tray icon, a status line, ...)
    fn set_status(&self, status: Availability);

    /// Tell the user something went wrong
    fn notify(&self, message: &str);
}

/// Handle to a running controller worker
pub struct ControllerHandle {
    actions_tx: mpsc::Sender<MenuAction>,
    coordinator: Arc<Coordinator>,
    worker: JoinHandle<()>,
}

/// Controller worker
pub struct Controller;

impl Controller {
    /// Start the worker; it reads the current state once before taking actions
    pub fn spawn(coordinator: Arc<Coordinator>, ui: Arc<dyn UiHandle>) -> ControllerHandle {
        let (actions_tx, actions_rx) = mpsc::channel(16);
        let worker = tokio::spawn(run_worker(coordinator.clone(), ui, actions_rx));

        ControllerHandle {
            actions_tx,
            coordinator,
            worker,
        }
    }
}

impl ControllerHandle {
    /// Queue an action
    pub async fn dispatch(&self, action: MenuAction) -> Result<()> {
        self.actions_tx
            .send(action)
            .await
            .map_err(|_| LightError::ChannelError("controller worker stopped".to_string()))
    }

    /// Queue an action from synchronous UI code
    pub fn try_dispatch(&self, action: MenuAction) -> Result<()> {
        self.actions_tx
            .try_send(action)
            .map_err(|e| LightError::ChannelError(format!("cannot queue {action:?}: {e}")))
    }

    /// Let queued actions finish, then stop the worker
    pub async fn finish(self) {
        let _ = self.actions_tx.send(MenuAction::Exit).await;
        if let Err(e) = self.worker.await {
            tracing::error!("controller worker failed: {}", e);
        }
    }

    /// Abort in-flight light calls and stop the worker
    pub async fn shutdown(self) {
        self.coordinator.shutdown();
        self.finish().await;
    }
}

async fn run_worker(
    coordinator: Arc<Coordinator>,
    ui: Arc<dyn UiHandle>,
    mut actions_rx: mpsc::Receiver<MenuAction>,
) {
    let read = coordinator.read_state().await;
    ui.set_status(coordinator.availability(&read));
    match &read {
        ReadOutcome::NotConfigured => ui.notify("No light addresses configured"),
        ReadOutcome::NoReply(failure) => {
            ui.notify(&format!("No reply from light ({}): {}", failure.address, failure.exchange));
        }
        ReadOutcome::Color(_) => {}
    }

    while let Some(action) = actions_rx.recv().await {
        tracing::debug!(?action, "controller action");
        match action {
            MenuAction::Exit => break,
            MenuAction::Toggle => {
                let toggle = coordinator.toggle().await;
                report(&coordinator, ui.as_ref(), &toggle.target, &toggle.outcome);
            }
            MenuAction::SetAvailable => {
                let target = coordinator.config().available_color.clone();
                let outcome = coordinator.set_all(&target).await;
                report(&coordinator, ui.as_ref(), &target, &outcome);
            }
            MenuAction::SetBusy => {
                let target = coordinator.config().busy_color.clone();
                let outcome = coordinator.set_all(&target).await;
                report(&coordinator, ui.as_ref(), &target, &outcome);
            }
        }
    }

    tracing::debug!("controller worker stopped");
}

fn report(coordinator: &Coordinator, ui: &dyn UiHandle, target: &Color, outcome: &SetOutcome) {
    if outcome.is_ok() {
        let config = coordinator.config();
        ui.set_status(Availability::from_color(Some(target), &config.available_color, &config.busy_color));
    } else {
        ui.notify(&outcome.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::coordinator::CoordinatorConfig;
    use crate::types::DeviceAddress;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum UiEvent {
        Status(Availability),
        Notify(String),
    }

    #[derive(Default)]
    struct RecordingUi {
        events: Mutex<Vec<UiEvent>>,
    }

    impl RecordingUi {
        fn events(&self) -> Vec<UiEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl UiHandle for RecordingUi {
        fn set_status(&self, status: Availability) {
            self.events.lock().unwrap().push(UiEvent::Status(status));
        }

        fn notify(&self, message: &str) {
            self.events.lock().unwrap().push(UiEvent::Notify(message.to_string()));
        }
    }

    #[tokio::test]
    async fn unconfigured_controller_notifies_instead_of_failing() {
        let ui = Arc::new(RecordingUi::default());
        let coordinator = Arc::new(Coordinator::new(Vec::new(), CoordinatorConfig::default()));
        let handle = Controller::spawn(coordinator, ui.clone());

        handle.dispatch(MenuAction::SetBusy).await.unwrap();
        handle.finish().await;

        assert_eq!(
            ui.events(),
            vec![
                UiEvent::Status(Availability::Unknown),
                UiEvent::Notify("No light addresses configured".to_string()),
                UiEvent::Notify("No light addresses configured".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_light_is_named_in_notification() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let address = DeviceAddress::parse(format!("tcp://{addr}")).unwrap();

        let config = CoordinatorConfig {
            retry: RetryPolicy {
                poll_interval: Duration::from_millis(1),
                max_attempts: 5,
                reconnect_every: 5,
                connect_timeout: Duration::from_secs(1),
            },
            ..CoordinatorConfig::default()
        };
        let ui = Arc::new(RecordingUi::default());
        let coordinator = Arc::new(Coordinator::new(vec![address], config));
        let handle = Controller::spawn(coordinator, ui.clone());

        handle.dispatch(MenuAction::Toggle).await.unwrap();
        handle.finish().await;

        let events = ui.events();
        assert_eq!(events[0], UiEvent::Status(Availability::Unknown));
        let failure = events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Notify(msg) if msg.starts_with("Failed to set color") => Some(msg),
                _ => None,
            })
            .next()
            .expect("no failure notification");
        assert!(failure.contains(&format!("tcp://{addr}")));
    }

    #[tokio::test]
    async fn queue_closes_after_finish() {
        let ui = Arc::new(RecordingUi::default());
        let coordinator = Arc::new(Coordinator::new(Vec::new(), CoordinatorConfig::default()));
        let handle = Controller::spawn(coordinator, ui);
        let tx = handle.actions_tx.clone();
        handle.finish().await;

        assert!(tx.send(MenuAction::Toggle).await.is_err());
    }
}
