//! Platform levels: staged bring-up over nested container scopes.
//!
//! A [`Level`] wraps one [`Container`] scope and walks it through a
//! fixed lifecycle. Levels chain into a hierarchy (each child's scope
//! sees every ancestor registration), which is how later stages of
//! bring-up consume what earlier stages provided.
//!
//! # Lifecycle
//! ```text
//! Created → configure() → Configured → start() → Started
//!                                        → stop() → Stopped → destroy() → Destroyed
//! ```
//! `configure` runs exactly once. `stop` on a level that never started
//! is a safe no-op. `destroy` detaches the level's scope from its
//! parent's child enumeration.
//!
//! # Example
//! ```
//! use terrace_core::container::Component;
//! use terrace_core::error::TerraceError;
//! use terrace_core::level::{Level, LevelDef};
//!
//! struct Clock;
//! impl Component for Clock {}
//!
//! struct CoreLevel;
//! impl LevelDef for CoreLevel {
//!     fn name(&self) -> &'static str {
//!         "core"
//!     }
//!     fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
//!         level.add(Clock)?;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), TerraceError> {
//! let mut level = Level::root(CoreLevel)?;
//! level.configure()?.start()?;
//! assert!(level.get_optional::<Clock>().is_some());
//! level.stop()?;
//! level.destroy()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::StartupLeader;
use crate::config::TerraceConfig;
use crate::container::{Component, Container};
use crate::error::{ClusterError, LevelError, TerraceError};
use crate::metrics as m;

// ─── LevelState ──────────────────────────────────────────────────────

/// Lifecycle state of a level.
///
/// Transitions:
/// - `Created` → `configure()` → `Configured`
/// - `Configured` → `start()` → `Started`
/// - `Started` → `stop()` → `Stopped`
/// - any live state → `destroy()` → `Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelState {
    /// Constructed, not yet configured
    Created,
    /// Registrations in place, ready to start
    Configured,
    /// Components running
    Started,
    /// Components stopped
    Stopped,
    /// Detached from the hierarchy, unusable
    Destroyed,
}

impl fmt::Display for LevelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Configured => write!(f, "configured"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

// ─── LevelDef Trait ──────────────────────────────────────────────────

/// Definition of one bring-up stage.
///
/// `configure_level` is the required part: it registers the stage's
/// components into the level. The remaining hooks have defaults that
/// drive the container directly; override them to wrap or replace the
/// stock behavior.
///
/// # Implementation example
/// ```ignore
/// struct SettingsLevel;
///
/// impl LevelDef for SettingsLevel {
///     fn name(&self) -> &'static str {
///         "settings"
///     }
///     fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
///         level.add(load_settings()?)?;
///         Ok(())
///     }
/// }
/// ```
pub trait LevelDef: Send + Sync {
    /// Name of the stage, used in logs, errors, and health output.
    fn name(&self) -> &'static str;

    /// Registers this stage's components into `level`.
    fn configure_level(&self, level: &Level) -> Result<(), TerraceError>;

    /// Builds the level's scope. The default nests under the parent when
    /// one exists; override to build an isolated scope.
    fn create_container(&self, parent: Option<&Container>) -> Container {
        match parent {
            Some(parent) => parent.new_child(),
            None => Container::new(),
        }
    }

    /// Starts the stage. The default starts the level's components in
    /// registration order, fail-fast.
    fn start(&self, level: &Level) -> Result<(), TerraceError> {
        level.container().start_components()
    }

    /// Stops the stage. The default stops started components in reverse
    /// order, best-effort.
    fn stop(&self, level: &Level) -> Result<(), TerraceError> {
        level.container().stop_components()
    }

    /// Extra teardown, run before the level detaches from its parent.
    fn destroy(&self, _level: &Level) -> Result<(), TerraceError> {
        Ok(())
    }
}

// ─── Level ───────────────────────────────────────────────────────────

/// One stage of platform bring-up over a container scope.
///
/// Lifecycle transitions take `&mut self` and are driven from a single
/// bring-up thread; registration and lookups take `&self` so that
/// [`LevelDef::configure_level`] and guard builders can run against a
/// shared borrow.
pub struct Level {
    def: Box<dyn LevelDef>,
    parent: Option<Container>,
    container: Container,
    state: LevelState,
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("name", &self.def.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Level {
    /// Constructs a root level with its own scope.
    pub fn root(def: impl LevelDef + 'static) -> Result<Self, TerraceError> {
        Self::build(Box::new(def), None)
    }

    /// Constructs a level nested under `parent`.
    ///
    /// The new level's scope sees everything `parent` (and its
    /// ancestors) registered. Fails when `parent` is already destroyed.
    pub fn child(def: impl LevelDef + 'static, parent: &Level) -> Result<Self, TerraceError> {
        if parent.state == LevelState::Destroyed {
            return Err(LevelError::ParentDestroyed {
                parent: parent.name().to_owned(),
            }
            .into());
        }
        Self::build(Box::new(def), Some(parent.container.clone()))
    }

    fn build(def: Box<dyn LevelDef>, parent: Option<Container>) -> Result<Self, TerraceError> {
        if def.name().trim().is_empty() {
            return Err(LevelError::InvalidName {
                reason: "level name must not be empty".to_owned(),
            }
            .into());
        }
        let container = def.create_container(parent.as_ref());
        Ok(Self {
            def,
            parent,
            container,
            state: LevelState::Created,
        })
    }

    /// Name of this level.
    pub fn name(&self) -> &'static str {
        self.def.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LevelState {
        self.state
    }

    /// The level's container scope.
    pub fn container(&self) -> &Container {
        &self.container
    }

    // ── lifecycle ──

    /// Configures the level: runs [`LevelDef::configure_level`], then
    /// invokes the module view of every component registered in this
    /// level's own scope.
    ///
    /// The module pass works on a snapshot, so a module registered by
    /// another module lands in the scope but is not configured within
    /// the same pass. Returns the level for chaining; configuring twice
    /// is an error.
    pub fn configure(&mut self) -> Result<&mut Self, TerraceError> {
        if self.state != LevelState::Created {
            return Err(self.invalid_transition("configure"));
        }
        debug!(level = self.name(), "configuring level");
        let begin = Instant::now();
        {
            let this: &Level = self;
            this.def.configure_level(this)?;
        }
        for component in self.container.module_components() {
            if let Some(module) = component.as_module() {
                module.configure(&self.container)?;
            }
        }
        self.set_state(LevelState::Configured);
        metrics::histogram!(m::LEVEL_CONFIGURE_DURATION_SECONDS, m::LABEL_LEVEL => self.name())
            .record(begin.elapsed().as_secs_f64());
        info!(
            level = self.name(),
            components = self.container.len(),
            "level configured"
        );
        Ok(self)
    }

    /// Starts the level's components.
    ///
    /// Fail-fast: on error the level stays `Configured` and components
    /// started before the failure keep running. Rolling those back is
    /// the caller's responsibility, via [`Level::stop`].
    pub fn start(&mut self) -> Result<(), TerraceError> {
        if self.state != LevelState::Configured {
            return Err(self.invalid_transition("start"));
        }
        info!(level = self.name(), "starting level");
        let begin = Instant::now();
        {
            let this: &Level = self;
            this.def.start(this)?;
        }
        self.set_state(LevelState::Started);
        metrics::histogram!(m::LEVEL_START_DURATION_SECONDS, m::LABEL_LEVEL => self.name())
            .record(begin.elapsed().as_secs_f64());
        Ok(())
    }

    /// Stops the level's components in reverse registration order.
    ///
    /// Best-effort: every started component gets a stop attempt and the
    /// first failure is reported after the pass. Stopping a level that
    /// never started (or is already stopped) is a safe no-op; stopping a
    /// destroyed level is an error.
    pub fn stop(&mut self) -> Result<(), TerraceError> {
        match self.state {
            LevelState::Started => {
                info!(level = self.name(), "stopping level");
                let result = {
                    let this: &Level = self;
                    this.def.stop(this)
                };
                // best-effort pass is done either way
                self.set_state(LevelState::Stopped);
                result
            }
            LevelState::Created | LevelState::Configured | LevelState::Stopped => {
                debug!(
                    level = self.name(),
                    state = %self.state,
                    "stop skipped, level not started"
                );
                Ok(())
            }
            LevelState::Destroyed => Err(self.invalid_transition("stop")),
        }
    }

    /// Destroys the level: runs [`LevelDef::destroy`], then detaches the
    /// level's scope from its parent's child enumeration.
    ///
    /// Allowed from any live state; destroying a still-started level
    /// logs a warning and proceeds. Destroying twice is an error.
    pub fn destroy(&mut self) -> Result<(), TerraceError> {
        if self.state == LevelState::Destroyed {
            return Err(self.invalid_transition("destroy"));
        }
        if self.state == LevelState::Started {
            warn!(level = self.name(), "destroying level that was not stopped");
        }
        {
            let this: &Level = self;
            this.def.destroy(this)?;
        }
        if let Some(parent) = &self.parent {
            parent.remove_child(&self.container);
        }
        self.set_state(LevelState::Destroyed);
        info!(level = self.name(), "level destroyed");
        Ok(())
    }

    fn set_state(&mut self, state: LevelState) {
        self.state = state;
        metrics::counter!(
            m::LEVEL_TRANSITIONS_TOTAL,
            m::LABEL_LEVEL => self.name(),
            m::LABEL_STATE => state.to_string()
        )
        .increment(1);
    }

    fn invalid_transition(&self, action: &'static str) -> TerraceError {
        LevelError::InvalidTransition {
            level: self.name().to_owned(),
            action,
            current: self.state.to_string(),
        }
        .into()
    }

    // ── registration & lookup ──

    /// Registers a component in this level's scope. Returns the level
    /// for chaining.
    pub fn add<T: Component>(&self, component: T) -> Result<&Self, TerraceError> {
        self.container.add(component)?;
        Ok(self)
    }

    /// Registers a component if present; `None` is skipped silently.
    pub fn add_optional<T: Component>(&self, component: Option<T>) -> Result<&Self, TerraceError> {
        self.container.add_optional(component)?;
        Ok(self)
    }

    /// Resolves a component from this level or any ancestor.
    pub fn get<T: Component>(&self) -> Result<Arc<T>, TerraceError> {
        self.container.get::<T>()
    }

    /// Resolves a component, or `None` when absent.
    pub fn get_optional<T: Component>(&self) -> Option<Arc<T>> {
        self.container.get_optional::<T>()
    }

    /// Resolves every visible component of type `T`, nearest scope
    /// first. Empty when none are registered.
    pub fn get_all<T: Component>(&self) -> Vec<Arc<T>> {
        self.container.get_all::<T>()
    }

    // ── cluster state ──

    /// Whether this node is the cluster startup leader.
    ///
    /// Fails fast with [`ClusterError::SettingsNotLoaded`] when the
    /// level registering [`StartupLeader`] is not visible from this
    /// scope. A guard at the wrong level is a wiring bug; it must never
    /// read as "follower".
    pub fn is_startup_leader(&self) -> Result<bool, TerraceError> {
        match self.get_optional::<StartupLeader>() {
            Some(leader) => Ok(leader.is_startup_leader()),
            None => Err(ClusterError::SettingsNotLoaded.into()),
        }
    }

    /// Whether this installation runs in cluster mode.
    ///
    /// Same visibility contract as [`Level::is_startup_leader`].
    pub fn is_cluster_enabled(&self) -> Result<bool, TerraceError> {
        match self.get_optional::<TerraceConfig>() {
            Some(config) => Ok(config.cluster.enabled),
            None => Err(ClusterError::SettingsNotLoaded.into()),
        }
    }

    // ── conditional registration ──

    /// Builds a guard whose condition is this node's startup leadership,
    /// resolved once at this call.
    pub fn startup_leader_guard(&self) -> Result<ConditionalAdd<'_>, TerraceError> {
        let condition = self.is_startup_leader()?;
        Ok(ConditionalAdd {
            level: self,
            condition,
        })
    }

    /// Builds a guard whose condition is cluster mode, resolved once at
    /// this call.
    pub fn cluster_guard(&self) -> Result<ConditionalAdd<'_>, TerraceError> {
        let condition = self.is_cluster_enabled()?;
        Ok(ConditionalAdd {
            level: self,
            condition,
        })
    }

    /// Registers `component` when this node is the startup leader.
    ///
    /// Returns the guard so the follower branch can chain:
    /// ```ignore
    /// level.add_if_startup_leader(Migrations)?
    ///     .otherwise_add(MigrationWaiter)?;
    /// ```
    pub fn add_if_startup_leader<T: Component>(
        &self,
        component: T,
    ) -> Result<ConditionalAdd<'_>, TerraceError> {
        let guard = self.startup_leader_guard()?;
        guard.if_add(component)?;
        Ok(guard)
    }

    /// Registers `component` when cluster mode is enabled. Returns the
    /// guard so the standalone branch can chain.
    pub fn add_if_cluster<T: Component>(
        &self,
        component: T,
    ) -> Result<ConditionalAdd<'_>, TerraceError> {
        let guard = self.cluster_guard()?;
        guard.if_add(component)?;
        Ok(guard)
    }
}

// ─── ConditionalAdd ──────────────────────────────────────────────────

/// Two-way conditional registration against a level.
///
/// The condition is captured when the guard is built and never
/// re-evaluated, so chained `if_add`/`otherwise_add` calls register
/// exactly one of the two branches.
#[derive(Debug)]
pub struct ConditionalAdd<'a> {
    level: &'a Level,
    condition: bool,
}

impl ConditionalAdd<'_> {
    /// Registers `component` when the captured condition holds.
    pub fn if_add<T: Component>(&self, component: T) -> Result<&Self, TerraceError> {
        if self.condition {
            self.level.container.add(component)?;
        }
        Ok(self)
    }

    /// Registers `component` when the captured condition does not hold.
    pub fn otherwise_add<T: Component>(&self, component: T) -> Result<&Self, TerraceError> {
        if !self.condition {
            self.level.container.add(component)?;
        }
        Ok(self)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
