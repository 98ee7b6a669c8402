//! Component container: type-indexed registration scopes with ordered
//! lifecycle.
//!
//! [`Container`] is one scope in a tree of scopes. Each scope owns its
//! registrations in insertion order; lookups walk child → parent, so a
//! child sees everything its ancestors registered while parents never see
//! child registrations.
//!
//! # Lifecycle
//! ```text
//! add() ... → start_components() → running → stop_components()
//! ```
//! `start_components` runs in registration order and fails fast;
//! `stop_components` runs the started prefix in reverse order,
//! best-effort, and re-raises the first failure after all attempts.
//!
//! Lookups take a read lock. Lifecycle passes snapshot the registration
//! table and invoke callbacks outside the lock, so a component may
//! register further components from inside its hooks. Bring-up and
//! teardown themselves are driven from a single thread by the caller.

use std::any::TypeId;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::{ContainerError, TerraceError};
use crate::metrics as m;

// ─── Component Trait ─────────────────────────────────────────────────

/// A unit of platform state registered into a [`Container`].
///
/// Lifecycle hooks default to no-ops; passive registrations (settings,
/// identities, markers) implement the trait with an empty body. Hooks are
/// synchronous and must not block on long-running work.
///
/// # Implementation example
/// ```ignore
/// struct CacheWarmer;
///
/// impl Component for CacheWarmer {
///     fn start(&self) -> Result<(), TerraceError> {
///         // fill the cache
///         Ok(())
///     }
///     fn stop(&self) -> Result<(), TerraceError> {
///         // release it
///         Ok(())
///     }
/// }
/// ```
pub trait Component: std::any::Any + Send + Sync {
    /// Starts the component. Called in registration order.
    fn start(&self) -> Result<(), TerraceError> {
        Ok(())
    }

    /// Stops the component. Called in reverse registration order.
    fn stop(&self) -> Result<(), TerraceError> {
        Ok(())
    }

    /// Returns the module view of this component, if it has one.
    ///
    /// Components exposing a module view get their [`Module::configure`]
    /// invoked during the configure pass of the level that registered
    /// them, which is the hook for registering further components late.
    fn as_module(&self) -> Option<&dyn Module> {
        None
    }
}

// ─── Module Trait ────────────────────────────────────────────────────

/// Extension hook invoked during a level's configure pass.
///
/// A module receives the scope it was registered in and may add more
/// components to it. Modules discovered in one pass are snapshotted
/// first, so a module registered by another module is not configured
/// re-entrantly within the same pass.
pub trait Module: Send + Sync {
    /// Registers additional components into `container`.
    fn configure(&self, container: &Container) -> Result<(), TerraceError>;
}

// ─── Registration ────────────────────────────────────────────────────

/// One registered component.
///
/// The component is held through two vtables over the same allocation:
/// `any` for typed downcasting in lookups, `component` for lifecycle
/// dispatch. Both are created in [`Container::add`] while the concrete
/// type is still known.
struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    any: Arc<dyn std::any::Any + Send + Sync>,
    component: Arc<dyn Component>,
}

struct ContainerInner {
    parent: Option<Container>,
    registrations: RwLock<Vec<Registration>>,
    children: RwLock<Vec<Weak<ContainerInner>>>,
    /// Number of registrations whose `start` has run. Registrations are
    /// append-only, so this prefix is stable across snapshots.
    started: RwLock<usize>,
}

// ─── Container ───────────────────────────────────────────────────────

/// One scope in the container tree.
///
/// Cloning a `Container` clones a handle to the same scope. A child
/// holds its parent alive; parents track children weakly so dropping or
/// detaching a child never leaks a cycle.
///
/// # Example
/// ```
/// use terrace_core::container::{Component, Container};
///
/// struct Settings {
///     verbose: bool,
/// }
/// impl Component for Settings {}
///
/// let root = Container::new();
/// root.add(Settings { verbose: true }).unwrap();
///
/// let child = root.new_child();
/// let settings = child.get::<Settings>().unwrap();
/// assert!(settings.verbose);
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates an empty root scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                parent: None,
                registrations: RwLock::new(Vec::new()),
                children: RwLock::new(Vec::new()),
                started: RwLock::new(0),
            }),
        }
    }

    /// Creates an empty child scope of this one.
    ///
    /// The child sees this scope's registrations through lookups; this
    /// scope tracks the child for enumeration until the child is
    /// detached or dropped.
    pub fn new_child(&self) -> Container {
        let child = Container {
            inner: Arc::new(ContainerInner {
                parent: Some(self.clone()),
                registrations: RwLock::new(Vec::new()),
                children: RwLock::new(Vec::new()),
                started: RwLock::new(0),
            }),
        };
        self.inner.children.write().push(Arc::downgrade(&child.inner));
        child
    }

    /// Registers a component in this scope.
    ///
    /// Registration order is preserved and drives lifecycle order. Each
    /// concrete type may be registered at most once per scope; the same
    /// type in a descendant scope shadows this one for `get` and
    /// accumulates for `get_all`.
    pub fn add<T: Component>(&self, component: T) -> Result<(), TerraceError> {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        let mut regs = self.inner.registrations.write();
        if regs.iter().any(|r| r.type_id == type_id) {
            return Err(ContainerError::Duplicate { type_name }.into());
        }
        let arc = Arc::new(component);
        regs.push(Registration {
            type_id,
            type_name,
            any: arc.clone(),
            component: arc,
        });
        debug!(component = type_name, "component registered");
        metrics::counter!(m::CONTAINER_REGISTRATIONS_TOTAL).increment(1);
        Ok(())
    }

    /// Registers a component if present; `None` is skipped silently.
    pub fn add_optional<T: Component>(&self, component: Option<T>) -> Result<(), TerraceError> {
        match component {
            Some(component) => self.add(component),
            None => {
                debug!(
                    component = std::any::type_name::<T>(),
                    "absent component skipped"
                );
                Ok(())
            }
        }
    }

    /// Resolves a component of type `T`, nearest scope first.
    ///
    /// Fails with [`ContainerError::NotFound`] when neither this scope
    /// nor any ancestor has a registration for `T`.
    pub fn get<T: Component>(&self) -> Result<Arc<T>, TerraceError> {
        self.get_optional::<T>().ok_or_else(|| {
            ContainerError::NotFound {
                type_name: std::any::type_name::<T>(),
            }
            .into()
        })
    }

    /// Resolves a component of type `T`, or `None` when absent.
    pub fn get_optional<T: Component>(&self) -> Option<Arc<T>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(found) = current.lookup_local::<T>() {
                return Some(found);
            }
            scope = current.inner.parent.as_ref();
        }
        None
    }

    /// Resolves every visible component of type `T`.
    ///
    /// Ordered nearest scope first, registration order within a scope.
    /// The first element, when any, is what [`Container::get`] returns.
    /// An empty result is not an error.
    pub fn get_all<T: Component>(&self) -> Vec<Arc<T>> {
        let mut found = Vec::new();
        let mut scope = Some(self);
        while let Some(current) = scope {
            let regs = current.inner.registrations.read();
            for reg in regs.iter() {
                if reg.type_id == TypeId::of::<T>() {
                    if let Ok(arc) = reg.any.clone().downcast::<T>() {
                        found.push(arc);
                    }
                }
            }
            drop(regs);
            scope = current.inner.parent.as_ref();
        }
        found
    }

    fn lookup_local<T: Component>(&self) -> Option<Arc<T>> {
        let regs = self.inner.registrations.read();
        regs.iter()
            .find(|r| r.type_id == TypeId::of::<T>())
            .and_then(|r| r.any.clone().downcast::<T>().ok())
    }

    /// Starts this scope's unstarted components in registration order.
    ///
    /// Fails fast: the first failure aborts the pass and components after
    /// it stay untouched. Components started before the failure keep
    /// running; rolling them back is the caller's call, via
    /// [`Container::stop_components`].
    pub fn start_components(&self) -> Result<(), TerraceError> {
        let snapshot = self.lifecycle_snapshot();
        let from = *self.inner.started.read();
        for (idx, (type_name, component)) in snapshot.iter().enumerate().skip(from) {
            if let Err(e) = component.start() {
                *self.inner.started.write() = idx;
                metrics::counter!(m::CONTAINER_START_FAILURES_TOTAL).increment(1);
                return Err(ContainerError::StartFailed {
                    component: type_name,
                    reason: e.to_string(),
                }
                .into());
            }
            debug!(component = *type_name, "component started");
        }
        *self.inner.started.write() = snapshot.len();
        Ok(())
    }

    /// Stops this scope's started components in reverse registration
    /// order.
    ///
    /// Best-effort: every started component gets a stop attempt even
    /// when an earlier one fails. The first failure is returned after
    /// the pass; later failures are logged. A scope with nothing started
    /// is a no-op.
    pub fn stop_components(&self) -> Result<(), TerraceError> {
        let snapshot = self.lifecycle_snapshot();
        let started = (*self.inner.started.read()).min(snapshot.len());
        if started == 0 {
            return Ok(());
        }
        let mut first_failure: Option<ContainerError> = None;
        for (type_name, component) in snapshot.into_iter().take(started).rev() {
            match component.stop() {
                Ok(()) => debug!(component = type_name, "component stopped"),
                Err(e) => {
                    error!(component = type_name, error = %e, "component stop failed");
                    metrics::counter!(m::CONTAINER_STOP_FAILURES_TOTAL).increment(1);
                    if first_failure.is_none() {
                        first_failure = Some(ContainerError::StopFailed {
                            component: type_name,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        *self.inner.started.write() = 0;
        match first_failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn lifecycle_snapshot(&self) -> Vec<(&'static str, Arc<dyn Component>)> {
        let regs = self.inner.registrations.read();
        regs.iter()
            .map(|r| (r.type_name, r.component.clone()))
            .collect()
    }

    /// Snapshots this scope's components that expose a module view, in
    /// registration order. Ancestor scopes are not searched.
    pub fn module_components(&self) -> Vec<Arc<dyn Component>> {
        let regs = self.inner.registrations.read();
        regs.iter()
            .filter(|r| r.component.as_module().is_some())
            .map(|r| r.component.clone())
            .collect()
    }

    /// Returns the parent scope, if any.
    pub fn parent(&self) -> Option<Container> {
        self.inner.parent.clone()
    }

    /// Returns the live child scopes. Dropped children are skipped.
    pub fn children(&self) -> Vec<Container> {
        self.inner
            .children
            .read()
            .iter()
            .filter_map(|weak| weak.upgrade())
            .map(|inner| Container { inner })
            .collect()
    }

    /// Detaches `child` from this scope's child enumeration.
    ///
    /// Dead entries are pruned on the way. Detaching a scope that was
    /// never (or is no longer) a child is a no-op.
    pub fn remove_child(&self, child: &Container) {
        self.inner.children.write().retain(|weak| match weak.upgrade() {
            Some(inner) => !Arc::ptr_eq(&inner, &child.inner),
            None => false,
        });
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of registrations in this scope (ancestors excluded).
    pub fn len(&self) -> usize {
        self.inner.registrations.read().len()
    }

    /// Whether this scope has no registrations of its own.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::marker::PhantomData;
    use std::sync::Mutex;

    use super::*;

    /// Test component recording lifecycle calls into a shared log.
    ///
    /// The container is type-indexed, so distinct registrations need
    /// distinct types; the marker parameter provides them.
    #[derive(Debug)]
    struct Probe<T> {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        fail_stop: bool,
        _marker: PhantomData<T>,
    }

    #[derive(Debug)]
    struct A;
    struct B;
    struct C;

    impl<T> Probe<T> {
        fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                log: Arc::clone(log),
                fail_start: false,
                fail_stop: false,
                _marker: PhantomData,
            }
        }

        fn failing_start(mut self) -> Self {
            self.fail_start = true;
            self
        }

        fn failing_stop(mut self) -> Self {
            self.fail_stop = true;
            self
        }
    }

    impl<T: Send + Sync + 'static> Component for Probe<T> {
        fn start(&self) -> Result<(), TerraceError> {
            if self.fail_start {
                return Err(std::io::Error::other("mock start failure").into());
            }
            self.log.lock().unwrap().push(format!("start:{}", self.label));
            Ok(())
        }

        fn stop(&self) -> Result<(), TerraceError> {
            if self.fail_stop {
                return Err(std::io::Error::other("mock stop failure").into());
            }
            self.log.lock().unwrap().push(format!("stop:{}", self.label));
            Ok(())
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    struct StampedByModule;
    impl Component for StampedByModule {}

    struct AddingModule;
    impl Component for AddingModule {
        fn as_module(&self) -> Option<&dyn Module> {
            Some(self)
        }
    }
    impl Module for AddingModule {
        fn configure(&self, container: &Container) -> Result<(), TerraceError> {
            container.add(StampedByModule)
        }
    }

    // ── registration & lookup ──

    #[test]
    fn new_container_is_empty() {
        let container = Container::new();
        assert_eq!(container.len(), 0);
        assert!(container.is_empty());
    }

    #[test]
    fn get_returns_registered_component() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();

        let probe = container.get::<Probe<A>>().unwrap();
        assert_eq!(probe.label, "a");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn duplicate_type_in_same_scope_fails() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("first", &log)).unwrap();

        let err = container.add(Probe::<A>::new("second", &log)).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn get_missing_type_fails_with_type_name() {
        let container = Container::new();
        let err = container.get::<Probe<A>>().unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Container(ContainerError::NotFound { .. })
        ));
        assert!(err.to_string().contains("Probe"));
    }

    #[test]
    fn get_optional_present_and_absent() {
        let log = log();
        let container = Container::new();
        assert!(container.get_optional::<Probe<A>>().is_none());

        container.add(Probe::<A>::new("a", &log)).unwrap();
        assert!(container.get_optional::<Probe<A>>().is_some());
    }

    #[test]
    fn add_optional_none_is_skipped() {
        let container = Container::new();
        container.add_optional::<Probe<A>>(None).unwrap();
        assert!(container.is_empty());
    }

    #[test]
    fn add_optional_some_registers() {
        let log = log();
        let container = Container::new();
        container
            .add_optional(Some(Probe::<A>::new("a", &log)))
            .unwrap();
        assert_eq!(container.len(), 1);
    }

    // ── scoping ──

    #[test]
    fn child_sees_parent_registration() {
        let log = log();
        let parent = Container::new();
        parent.add(Probe::<A>::new("in-parent", &log)).unwrap();

        let child = parent.new_child();
        let probe = child.get::<Probe<A>>().unwrap();
        assert_eq!(probe.label, "in-parent");
    }

    #[test]
    fn parent_does_not_see_child_registration() {
        let log = log();
        let parent = Container::new();
        let child = parent.new_child();
        child.add(Probe::<A>::new("in-child", &log)).unwrap();

        assert!(parent.get_optional::<Probe<A>>().is_none());
    }

    #[test]
    fn nearest_scope_wins_on_shadowing() {
        let log = log();
        let parent = Container::new();
        parent.add(Probe::<A>::new("outer", &log)).unwrap();
        let child = parent.new_child();
        child.add(Probe::<A>::new("inner", &log)).unwrap();

        assert_eq!(child.get::<Probe<A>>().unwrap().label, "inner");
        assert_eq!(parent.get::<Probe<A>>().unwrap().label, "outer");
    }

    #[test]
    fn get_all_is_nearest_first_and_head_matches_get() {
        let log = log();
        let parent = Container::new();
        parent.add(Probe::<A>::new("outer", &log)).unwrap();
        let child = parent.new_child();
        child.add(Probe::<A>::new("inner", &log)).unwrap();

        let all = child.get_all::<Probe<A>>();
        let labels: Vec<&str> = all.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["inner", "outer"]);
        assert_eq!(child.get::<Probe<A>>().unwrap().label, all[0].label);
    }

    #[test]
    fn get_all_empty_is_not_an_error() {
        let container = Container::new();
        assert!(container.get_all::<Probe<A>>().is_empty());
    }

    // ── lifecycle ──

    #[test]
    fn start_runs_in_registration_order() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(Probe::<B>::new("b", &log)).unwrap();
        container.add(Probe::<C>::new("c", &log)).unwrap();

        container.start_components().unwrap();
        assert_eq!(entries(&log), vec!["start:a", "start:b", "start:c"]);
    }

    #[test]
    fn start_failure_is_fail_fast() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(Probe::<B>::new("b", &log).failing_start()).unwrap();
        container.add(Probe::<C>::new("c", &log)).unwrap();

        let err = container.start_components().unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Container(ContainerError::StartFailed { .. })
        ));
        // a started, b failed, c never reached
        assert_eq!(entries(&log), vec!["start:a"]);
    }

    #[test]
    fn stop_runs_in_reverse_order() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(Probe::<B>::new("b", &log)).unwrap();
        container.add(Probe::<C>::new("c", &log)).unwrap();

        container.start_components().unwrap();
        container.stop_components().unwrap();
        assert_eq!(
            entries(&log),
            vec!["start:a", "start:b", "start:c", "stop:c", "stop:b", "stop:a"]
        );
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();

        container.stop_components().unwrap();
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn stop_after_failed_start_stops_started_prefix_only() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(Probe::<B>::new("b", &log).failing_start()).unwrap();

        container.start_components().unwrap_err();
        container.stop_components().unwrap();
        assert_eq!(entries(&log), vec!["start:a", "stop:a"]);
    }

    #[test]
    fn stop_failure_continues_and_reports_first() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(Probe::<B>::new("b", &log).failing_stop()).unwrap();
        container.add(Probe::<C>::new("c", &log)).unwrap();

        container.start_components().unwrap();
        let err = container.stop_components().unwrap_err();

        // b's failure is the first one hit (reverse order: c, b, a);
        // a is still stopped afterwards
        assert!(err.to_string().contains("Probe"));
        assert!(err.to_string().contains("failed to stop"));
        let log = entries(&log);
        assert!(log.contains(&"stop:c".to_owned()));
        assert!(log.contains(&"stop:a".to_owned()));
        assert!(!log.contains(&"stop:b".to_owned()));
    }

    #[test]
    fn second_start_picks_up_later_registrations() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.start_components().unwrap();

        container.add(Probe::<B>::new("b", &log)).unwrap();
        container.start_components().unwrap();
        // a is not started twice
        assert_eq!(entries(&log), vec!["start:a", "start:b"]);
    }

    // ── children ──

    #[test]
    fn children_enumerates_live_scopes() {
        let parent = Container::new();
        let child = parent.new_child();

        let children = parent.children();
        assert_eq!(children.len(), 1);
        assert!(children[0].ptr_eq(&child));
    }

    #[test]
    fn remove_child_detaches_scope() {
        let parent = Container::new();
        let child = parent.new_child();

        parent.remove_child(&child);
        assert!(parent.children().is_empty());
        // the detached child still resolves through its parent handle
        assert!(child.parent().is_some());
    }

    #[test]
    fn dropped_child_disappears_from_enumeration() {
        let parent = Container::new();
        {
            let _child = parent.new_child();
        }
        assert!(parent.children().is_empty());
    }

    // ── modules ──

    #[test]
    fn module_components_lists_only_modules() {
        let log = log();
        let container = Container::new();
        container.add(Probe::<A>::new("a", &log)).unwrap();
        container.add(AddingModule).unwrap();

        assert_eq!(container.module_components().len(), 1);
    }

    #[test]
    fn module_configure_registers_late_components() {
        let container = Container::new();
        container.add(AddingModule).unwrap();

        for component in container.module_components() {
            if let Some(module) = component.as_module() {
                module.configure(&container).unwrap();
            }
        }
        assert!(container.get_optional::<StampedByModule>().is_some());
    }
}
