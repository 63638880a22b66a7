//! Persisting successful states
//!
//! [`PersistenceTrigger`] watches states and load requests as they arrive and
//! writes each distinct successful state to a [`StatePersister`] once.

use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use crate::errors::Result;
use crate::observe::{Observable, Observer, Property, Subscription, SubscriptionBag};
use crate::state::{LoadRequest, ResourceError, ResourceParams, ResourceState, ResourceValue};
use crate::sync::Synchronized;

/// Storage backend for resource states.
pub trait StatePersister<V, P, E>: Send + Sync {
    /// Store `state`, replacing whatever was stored before.
    fn persist(&self, state: &ResourceState<V, P, E>) -> Result<()>;

    /// Load a stored state whose request parameters are cache-compatible
    /// with `params`. Returns `Ok(None)` when nothing compatible is stored.
    fn load(&self, params: &P) -> Result<Option<ResourceState<V, P, E>>>;

    /// Remove everything stored.
    fn purge(&self) -> Result<()>;
}

struct PersistBookkeeping<V, P, E> {
    latest_state: Option<ResourceState<V, P, E>>,
    latest_load_request: Option<LoadRequest<P>>,
    last_persisted: Option<ResourceState<V, P, E>>,
}

impl<V, P, E> Default for PersistBookkeeping<V, P, E> {
    fn default() -> Self {
        Self {
            latest_state: None,
            latest_load_request: None,
            last_persisted: None,
        }
    }
}

/// Calls [`StatePersister::persist`] at most once per distinct successful state.
///
/// Distinctness uses state equality, which compares value boxes by identity:
/// re-emitting the same box is skipped, a new load with an equal payload is
/// written again.
pub struct PersistenceTrigger<V, P, E> {
    persister: Arc<dyn StatePersister<V, P, E>>,
    bookkeeping: Synchronized<PersistBookkeeping<V, P, E>>,
}

impl<V, P, E> PersistenceTrigger<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Trigger writing to `persister`.
    pub fn new(persister: Arc<dyn StatePersister<V, P, E>>) -> Self {
        Self {
            persister,
            bookkeeping: Synchronized::new(PersistBookkeeping::default()),
        }
    }

    /// The persister written to.
    pub fn persister(&self) -> &Arc<dyn StatePersister<V, P, E>> {
        &self.persister
    }

    /// Record whichever piece of information is supplied and persist the
    /// latest state if it loaded successfully for the latest request.
    ///
    /// Returns whether `persist` was called.
    pub fn try_persist(
        &self,
        state: Option<ResourceState<V, P, E>>,
        load_request: Option<LoadRequest<P>>,
    ) -> bool {
        self.bookkeeping.with(|books| {
            if let Some(state) = state {
                books.latest_state = Some(state);
            }
            if let Some(load_request) = load_request {
                books.latest_load_request = Some(load_request);
            }

            let (Some(state), Some(request)) = (&books.latest_state, &books.latest_load_request)
            else {
                return false;
            };
            if !state.has_loaded_successfully(request) {
                return false;
            }
            if books.last_persisted.as_ref() == Some(state) {
                trace!("state already persisted, skipping");
                return false;
            }

            // Written under the lock so two threads never persist the same state.
            if let Err(error) = self.persister.persist(state) {
                warn!(%error, "failed to persist resource state");
            } else {
                debug!(request = %request.identity(), "persisted resource state");
            }
            books.last_persisted = Some(state.clone());
            true
        })
    }

    /// Record a newly observed state.
    pub fn on_state(&self, state: &ResourceState<V, P, E>) -> bool {
        self.try_persist(Some(state.clone()), None)
    }

    /// Record a newly issued load request.
    pub fn on_load_request(&self, load_request: &LoadRequest<P>) -> bool {
        self.try_persist(None, Some(load_request.clone()))
    }
}

/// Forwards a state stream unchanged while persisting its successful states.
///
/// Observation of both inputs ends when this value is dropped.
pub struct PersistingObservable<V, P, E> {
    output: Property<ResourceState<V, P, E>>,
    trigger: Arc<PersistenceTrigger<V, P, E>>,
    subscriptions: SubscriptionBag,
}

impl<V, P, E> PersistingObservable<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Observe `states` and `load_requests`, persisting through `persister`.
    pub fn new(
        states: &dyn Observable<ResourceState<V, P, E>>,
        load_requests: &dyn Observable<LoadRequest<P>>,
        persister: Arc<dyn StatePersister<V, P, E>>,
    ) -> Self {
        let output = Property::new(ResourceState::not_ready());
        let trigger = Arc::new(PersistenceTrigger::new(persister));
        let subscriptions = SubscriptionBag::new();

        let weak: Weak<PersistenceTrigger<V, P, E>> = Arc::downgrade(&trigger);
        subscriptions.add(load_requests.observe(Arc::new(move |request: &LoadRequest<P>| {
            if let Some(trigger) = weak.upgrade() {
                trigger.on_load_request(request);
            }
        })));

        let weak = Arc::downgrade(&trigger);
        let forward = output.clone();
        subscriptions.add(states.observe(Arc::new(
            move |state: &ResourceState<V, P, E>| {
                if let Some(trigger) = weak.upgrade() {
                    trigger.on_state(state);
                }
                forward.set(state.clone());
            },
        )));

        Self {
            output,
            trigger,
            subscriptions,
        }
    }

    /// Latest forwarded state.
    pub fn state(&self) -> ResourceState<V, P, E> {
        self.output.get()
    }

    /// The underlying trigger.
    pub fn trigger(&self) -> &PersistenceTrigger<V, P, E> {
        &self.trigger
    }

    /// Stop observing the inputs.
    pub fn close(&self) {
        self.subscriptions.cancel_all();
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for PersistingObservable<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.output.observe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CacheCompatible, ValueBox};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Account(&'static str);

    impl CacheCompatible for Account {
        fn is_cache_compatible(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    type State = ResourceState<String, Account, String>;

    #[derive(Default)]
    struct CountingPersister {
        persisted: Mutex<Vec<State>>,
    }

    impl StatePersister<String, Account, String> for CountingPersister {
        fn persist(&self, state: &State) -> Result<()> {
            self.persisted.lock().push(state.clone());
            Ok(())
        }

        fn load(&self, _params: &Account) -> Result<Option<State>> {
            Ok(self.persisted.lock().last().cloned())
        }

        fn purge(&self) -> Result<()> {
            self.persisted.lock().clear();
            Ok(())
        }
    }

    fn setup() -> (Arc<CountingPersister>, PersistenceTrigger<String, Account, String>) {
        let persister = Arc::new(CountingPersister::default());
        let trigger = PersistenceTrigger::new(persister.clone() as Arc<dyn StatePersister<_, _, _>>);
        (persister, trigger)
    }

    #[test]
    fn test_same_state_persisted_once() {
        let (persister, trigger) = setup();
        let request = LoadRequest::initial(Account("ann"));
        let state = State::value(ValueBox::new("inbox".into()), request.clone(), None);

        assert!(!trigger.try_persist(Some(state.clone()), None));
        assert!(trigger.try_persist(None, Some(request.clone())));
        assert!(!trigger.try_persist(Some(state.clone()), None));
        assert!(!trigger.try_persist(Some(state), Some(request)));

        assert_eq!(persister.persisted.lock().len(), 1);
    }

    #[test]
    fn test_equal_payload_new_box_is_persisted_again() {
        let (persister, trigger) = setup();
        let request = LoadRequest::initial(Account("ann"));
        trigger.on_load_request(&request);

        trigger.on_state(&State::value(ValueBox::new("inbox".into()), request.clone(), None));
        trigger.on_state(&State::value(ValueBox::new("inbox".into()), request, None));

        assert_eq!(persister.persisted.lock().len(), 2);
    }

    #[test]
    fn test_unsuccessful_states_not_persisted() {
        let (persister, trigger) = setup();
        let request = LoadRequest::initial(Account("ann"));
        trigger.on_load_request(&request);

        trigger.on_state(&State::loading(request.clone(), None, None));
        trigger.on_state(&State::error("boom".into(), request.clone(), None));
        trigger.on_state(&State::error(
            "boom".into(),
            request,
            Some(ValueBox::new("stale".into())),
        ));
        trigger.on_state(&State::not_ready());

        assert!(persister.persisted.lock().is_empty());
    }

    #[test]
    fn test_state_for_incompatible_request_not_persisted() {
        let (persister, trigger) = setup();
        let ann = LoadRequest::initial(Account("ann"));
        let bob = LoadRequest::initial(Account("bob"));

        trigger.on_load_request(&bob);
        trigger.on_state(&State::value(ValueBox::new("ann's inbox".into()), ann, None));

        assert!(persister.persisted.lock().is_empty());
    }

    #[test]
    fn test_persisting_observable_forwards_and_persists() {
        let persister = Arc::new(CountingPersister::default());
        let states = Property::new(State::not_ready());
        let requests = Property::new(LoadRequest::initial(Account("ann")));
        let persisting = PersistingObservable::new(
            &states,
            &requests,
            persister.clone() as Arc<dyn StatePersister<_, _, _>>,
        );

        let success = State::value(ValueBox::new("inbox".into()), requests.get(), None);
        states.set(success.clone());
        states.set(success.clone());

        assert_eq!(persisting.state(), success);
        assert_eq!(persister.persisted.lock().len(), 1);

        persisting.close();
        states.set(State::not_ready());
        assert_eq!(persisting.state(), success);
    }
}
