//! Singleton dependency-injection container.
//!
//! Every injectable type declares an explicit, ordered list of the types it
//! depends on ([`Injectable::dependencies`]) and a constructor that receives
//! them in that order ([`Injectable::construct`]). The container builds each
//! type at most once and hands out the cached `Arc` afterwards.
//!
//! Resolution happens in two phases:
//!
//! 1. **Plan** - walk the declared graph depth-first, left to right. A type
//!    that was never registered fails with [`ErrorKind::NotInjectable`], a
//!    cycle fails with [`ErrorKind::CyclicDependency`]. Nothing has been
//!    constructed at this point.
//! 2. **Build** - run the constructors in post-order so every dependency
//!    exists before its dependents, caching each instance.
//!
//! [`ErrorKind::NotInjectable`]: crate::ErrorKind::NotInjectable
//! [`ErrorKind::CyclicDependency`]: crate::ErrorKind::CyclicDependency
//!
//! # Example
//!
//! ```rust
//! use axum_controllers::{Container, Dependencies, Dependency, Injectable, Result};
//! use std::sync::Arc;
//!
//! struct UserRepository;
//!
//! impl Injectable for UserRepository {
//!     fn construct(_: &mut Dependencies) -> Result<Self> {
//!         Ok(UserRepository)
//!     }
//! }
//!
//! struct AuthService {
//!     users: Arc<UserRepository>,
//! }
//!
//! impl Injectable for AuthService {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<UserRepository>()]
//!     }
//!
//!     fn construct(deps: &mut Dependencies) -> Result<Self> {
//!         Ok(AuthService { users: deps.next()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.register::<UserRepository>();
//! container.register::<AuthService>();
//!
//! let a = container.resolve::<AuthService>().unwrap();
//! let b = container.resolve::<AuthService>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

use {
    crate::{Error, Result},
    parking_lot::{Mutex, RwLock},
    std::{
        any::{Any, TypeId, type_name},
        collections::{HashMap, HashSet},
        fmt,
        sync::Arc,
    },
};

/// Type-erased singleton instance as stored in the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Constructor = Arc<dyn Fn(&mut Dependencies) -> Result<Instance> + Send + Sync>;

/// Token identifying an injectable type.
#[derive(Clone, Copy)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
}

impl Dependency {
    /// Creates the token for `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Dependency {}

/// A type the container knows how to build.
pub trait Injectable: Any + Send + Sync + Sized {
    /// Types to inject into [`Injectable::construct`], in argument order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds the instance. Pull dependencies with [`Dependencies::next`] in
    /// the same order they were declared.
    fn construct(deps: &mut Dependencies) -> Result<Self>;
}

/// Resolved dependencies handed to a constructor, in declared order.
pub struct Dependencies {
    owner: &'static str,
    resolved: std::vec::IntoIter<(Dependency, Instance)>,
}

impl Dependencies {
    /// Takes the next declared dependency.
    ///
    /// Fails when the constructor asks for more dependencies than it declared
    /// or for a different type than the one declared at this position.
    pub fn next<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>> {
        let (dependency, instance) = self.resolved.next().ok_or_else(|| {
            Error::internal(format!(
                "{} requested {} but declared no further dependencies",
                self.owner,
                type_name::<T>()
            ))
        })?;

        instance.downcast::<T>().map_err(|_| {
            Error::internal(format!(
                "{} requested {} where {} was declared",
                self.owner,
                type_name::<T>(),
                dependency.type_name
            ))
        })
    }

    /// Number of declared dependencies not taken yet.
    pub fn remaining(&self) -> usize {
        self.resolved.len()
    }
}

struct Provider {
    dependencies: Vec<Dependency>,
    constructor: Constructor,
}

/// Singleton container. One instance per registered type for the lifetime of
/// the container.
///
/// Instances are shared, unsynchronized, across every request that reaches
/// them. Types that hold mutable state must bring their own interior
/// mutability.
#[derive(Default)]
pub struct Container {
    providers: RwLock<HashMap<TypeId, Provider>>,
    singletons: RwLock<HashMap<TypeId, Instance>>,
    building: Mutex<()>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `T` as injectable, recording its dependency list and constructor.
    ///
    /// Registering the same type again replaces its provider; an instance that
    /// was already built stays cached.
    pub fn register<T: Injectable>(&self) -> &Self {
        let dependencies = T::dependencies();
        tracing::debug!(
            "Registered injectable {} with dependencies {:?}",
            type_name::<T>(),
            dependencies
        );

        let constructor: Constructor = Arc::new(|deps: &mut Dependencies| {
            let instance: Instance = Arc::new(T::construct(deps)?);
            Ok(instance)
        });

        self.providers.write().insert(
            TypeId::of::<T>(),
            Provider {
                dependencies,
                constructor,
            },
        );
        self
    }

    /// Seeds the container with an already built singleton.
    pub fn register_instance<T: Any + Send + Sync>(&self, instance: T) -> &Self {
        tracing::debug!("Registered instance of {}", type_name::<T>());
        self.singletons
            .write()
            .insert(TypeId::of::<T>(), Arc::new(instance));
        self
    }

    /// Returns true if `T` can be resolved by this container.
    pub fn contains<T: Any>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.singletons.read().contains_key(&id) || self.providers.read().contains_key(&id)
    }

    /// Returns true if an instance of `T` has already been built or seeded.
    pub fn is_resolved<T: Any>(&self) -> bool {
        self.singletons.read().contains_key(&TypeId::of::<T>())
    }

    /// Resolves `T`, building it and its dependencies on first access.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let instance = self.resolve_erased(&Dependency::of::<T>())?;
        instance.downcast::<T>().map_err(|_| {
            Error::internal(format!(
                "Cached instance does not match requested type {}",
                type_name::<T>()
            ))
        })
    }

    /// Resolves the type identified by `target` without knowing it statically.
    pub fn resolve_erased(&self, target: &Dependency) -> Result<Instance> {
        if let Some(instance) = self.cached(target) {
            return Ok(instance);
        }

        let _building = self.building.lock();

        // Another caller may have finished building while we waited.
        if let Some(instance) = self.cached(target) {
            return Ok(instance);
        }

        let order = self.plan(target)?;
        for step in &order {
            self.build(step)?;
        }

        self.cached(target).ok_or_else(|| {
            Error::internal(format!("{} was planned but not built", target.type_name))
        })
    }

    fn cached(&self, target: &Dependency) -> Option<Instance> {
        self.singletons.read().get(&target.type_id).cloned()
    }

    /// Computes the construction order for `target`: every type not yet
    /// cached, dependencies before dependents, left to right.
    fn plan(&self, target: &Dependency) -> Result<Vec<Dependency>> {
        let providers = self.providers.read();
        let singletons = self.singletons.read();

        let mut walk = PlanWalk {
            providers: &providers,
            singletons: &singletons,
            path: Vec::new(),
            planned: HashSet::new(),
            order: Vec::new(),
        };
        walk.visit(target)?;
        Ok(walk.order)
    }

    fn build(&self, step: &Dependency) -> Result<()> {
        let (dependencies, constructor) = {
            let providers = self.providers.read();
            let provider = providers
                .get(&step.type_id)
                .ok_or_else(|| Error::not_injectable(step.type_name))?;
            (provider.dependencies.clone(), Arc::clone(&provider.constructor))
        };

        let resolved = {
            let singletons = self.singletons.read();
            dependencies
                .into_iter()
                .map(|dependency| {
                    singletons
                        .get(&dependency.type_id)
                        .cloned()
                        .map(|instance| (dependency, instance))
                        .ok_or_else(|| {
                            Error::internal(format!(
                                "{} was not built before {}",
                                dependency.type_name, step.type_name
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut deps = Dependencies {
            owner: step.type_name,
            resolved: resolved.into_iter(),
        };

        // Constructors are user code; no lock on the cache is held here.
        let instance = constructor(&mut deps)?;
        if deps.remaining() > 0 {
            tracing::warn!(
                "{} left {} declared dependencies unused",
                step.type_name,
                deps.remaining()
            );
        }

        tracing::debug!("Constructed singleton {}", step.type_name);
        self.singletons.write().insert(step.type_id, instance);
        Ok(())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("providers", &self.providers.read().len())
            .field("singletons", &self.singletons.read().len())
            .finish()
    }
}

struct PlanWalk<'a> {
    providers: &'a HashMap<TypeId, Provider>,
    singletons: &'a HashMap<TypeId, Instance>,
    path: Vec<Dependency>,
    planned: HashSet<TypeId>,
    order: Vec<Dependency>,
}

impl PlanWalk<'_> {
    fn visit(&mut self, target: &Dependency) -> Result<()> {
        if self.singletons.contains_key(&target.type_id) || self.planned.contains(&target.type_id)
        {
            return Ok(());
        }

        if let Some(start) = self.path.iter().position(|d| d == target) {
            let mut cycle: Vec<&str> = self.path[start..].iter().map(|d| d.type_name).collect();
            cycle.push(target.type_name);
            return Err(Error::cyclic_dependency(&cycle));
        }

        let provider = self
            .providers
            .get(&target.type_id)
            .ok_or_else(|| Error::not_injectable(target.type_name))?;

        self.path.push(*target);
        for dependency in &provider.dependencies {
            self.visit(dependency)?;
        }
        self.path.pop();

        self.planned.insert(target.type_id);
        self.order.push(*target);
        Ok(())
    }
}
