use crate::core::circuit::CircuitConfig;
use crate::core::observable::ObservableValue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model lock poisoned by a failed transaction")]
    Poisoned,
    #[error("no input named '{0}'")]
    UnknownInput(String),
}

impl<T> From<PoisonError<T>> for ModelError {
    fn from(_: PoisonError<T>) -> Self {
        ModelError::Poisoned
    }
}

/// Notifications sent by the model to registered observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    Started,
    Closed,
}

/// Identifier handed out for every registered observer
pub type ObserverId = u64;

/// An observer slot: the id to deregister with and the event stream
pub struct ObserverRegistration {
    pub id: ObserverId,
    pub events: Receiver<ModelEvent>,
}

/// Capabilities a component needs to mutate model state and follow its lifecycle
pub trait ModelAccess: Send + Sync {
    /// Run `transaction` while holding the model lock
    fn modify(&self, transaction: &mut dyn FnMut()) -> Result<(), ModelError>;

    /// Subscribe to the listed event kinds
    fn add_observer(&self, events: &[ModelEvent]) -> ObserverRegistration;

    /// Drop a subscription; unknown ids are ignored
    fn remove_observer(&self, id: ObserverId);
}

struct ObserverEntry {
    id: ObserverId,
    events: Vec<ModelEvent>,
    sender: Sender<ModelEvent>,
}

/// The running simulation model as seen by the editors: a set of inputs
/// guarded by a single transaction lock.
pub struct Model {
    sync: Mutex<()>,
    inputs: Vec<Arc<ObservableValue>>,
    observers: Mutex<Vec<ObserverEntry>>,
    next_observer_id: AtomicU64,
    closed: AtomicBool,
}

impl Model {
    pub fn new(inputs: Vec<Arc<ObservableValue>>) -> Self {
        Self {
            sync: Mutex::new(()),
            inputs,
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Build a model with one input per configured entry
    pub fn from_config(config: &CircuitConfig) -> Self {
        let inputs = config
            .inputs
            .iter()
            .map(|input| {
                Arc::new(
                    ObservableValue::new(&input.name, input.bits, input.supports_high_z)
                        .with_value(input.default),
                )
            })
            .collect();
        Self::new(inputs)
    }

    pub fn inputs(&self) -> &[Arc<ObservableValue>] {
        &self.inputs
    }

    /// Look up an input by name
    pub fn input(&self, name: &str) -> Result<Arc<ObservableValue>, ModelError> {
        self.inputs
            .iter()
            .find(|i| i.name() == name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownInput(name.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .map(|o| o.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    /// Announce that the simulation is running
    pub fn start(&self) {
        info!("Model started with {} inputs", self.inputs.len());
        self.fire(ModelEvent::Started);
    }

    /// Stop the simulation; observers receive [`ModelEvent::Closed`] once
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Model closed, notifying {} observers", self.observer_count());
        self.fire(ModelEvent::Closed);
    }

    fn fire(&self, event: ModelEvent) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        // Receivers that went away are pruned while dispatching
        observers.retain(|entry| {
            if !entry.events.contains(&event) {
                return true;
            }
            entry.sender.send(event).is_ok()
        });
        debug!("Dispatched {:?} to {} observers", event, observers.len());
    }
}

impl ModelAccess for Model {
    fn modify(&self, transaction: &mut dyn FnMut()) -> Result<(), ModelError> {
        let _guard = self.sync.lock()?;
        transaction();
        Ok(())
    }

    fn add_observer(&self, events: &[ModelEvent]) -> ObserverRegistration {
        let id = self.next_observer_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ObserverEntry {
                id,
                events: events.to_vec(),
                sender,
            });
        debug!("Observer {} registered for {:?}", id, events);
        ObserverRegistration { id, events: receiver }
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| entry.id != id);
        debug!("Observer {} removed", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::mpsc::TryRecvError;

    fn model() -> Model {
        Model::new(vec![
            Arc::new(ObservableValue::new("A", 8, false)),
            Arc::new(ObservableValue::new("B", 1, true)),
        ])
    }

    #[test]
    fn test_modify_runs_transaction() {
        let model = model();
        let a = model.input("A").unwrap();
        model.modify(&mut || a.set_value(7)).unwrap();
        assert_eq!(a.get_copy(), Value::new(7, 8));
    }

    #[test]
    fn test_unknown_input() {
        let model = model();
        assert!(matches!(model.input("C"), Err(ModelError::UnknownInput(name)) if name == "C"));
    }

    #[test]
    fn test_lock_released_after_panicking_transaction() {
        let model = model();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _ = model.modify(&mut || panic!("transaction failed"));
        }));
        assert!(result.is_err());
        // The guard was dropped during unwinding; later transactions report the poison
        assert!(matches!(model.modify(&mut || {}), Err(ModelError::Poisoned)));
    }

    #[test]
    fn test_observers_receive_subscribed_events_only() {
        let model = model();
        let closed_only = model.add_observer(&[ModelEvent::Closed]);
        let both = model.add_observer(&[ModelEvent::Started, ModelEvent::Closed]);

        model.start();
        assert_eq!(closed_only.events.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(both.events.try_recv(), Ok(ModelEvent::Started));

        model.close();
        assert_eq!(closed_only.events.try_recv(), Ok(ModelEvent::Closed));
        assert_eq!(both.events.try_recv(), Ok(ModelEvent::Closed));

        // Closing twice does not notify again
        model.close();
        assert_eq!(both.events.try_recv(), Err(TryRecvError::Empty));
        assert!(model.is_closed());
    }

    #[test]
    fn test_remove_observer() {
        let model = model();
        let registration = model.add_observer(&[ModelEvent::Closed]);
        assert_eq!(model.observer_count(), 1);
        model.remove_observer(registration.id);
        assert_eq!(model.observer_count(), 0);
        // Unknown ids are ignored
        model.remove_observer(999);
        model.close();
        assert_eq!(registration.events.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let model = model();
        let registration = model.add_observer(&[ModelEvent::Started]);
        drop(registration);
        model.start();
        assert_eq!(model.observer_count(), 0);
    }
}
