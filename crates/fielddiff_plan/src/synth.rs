//! Comparison-procedure synthesis.
//!
//! The [`Synthesizer`] walks the declared members of a type depth first.
//! Each member is classified through its [`Diffable`](crate::Diffable) impl, which calls
//! back into [`PlanContext`] to build the matching [`Step`]. The ancestry
//! stack in the context is the only cycle breaker: a type already on the
//! current path contributes no steps.
//!
//! Object-valued map entries and sequence elements are compared with the
//! value type's own procedure: recursively for deep maps and keyed
//! sequences, as an equality test for shallow maps and sets. That
//! procedure is resolved lazily, on first comparison, through the
//! [`ProcedureSource`] of the owning engine.

use crate::collection;
use crate::config::{ElementCompare, Matcher};
use crate::member::{Elements, Entries, Member, Members};
use crate::options::DiffOptions;
use crate::procedure::Procedure;
use crate::registry::SharedRegistry;
use crate::shape::{MapKey, MemberKind, Object};
use crate::step::{run, CollectionMode, Step};
use fielddiff_core::{Difference, Scalar, TypeKey, Value};
use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

/// A [`Procedure`] with its type erased
pub type ErasedProcedure = Arc<dyn Any + Send + Sync>;

/// Shared, compile-once store of procedures (implemented by the engine)
pub trait ProcedureSource: Send + Sync {
    /// Return the procedure for `key`, running `build` at most once per key
    fn resolve_erased(&self, key: TypeKey, build: &dyn Fn(&Synthesizer) -> ErasedProcedure) -> ErasedProcedure;
}

/// Typed lookup through a [`ProcedureSource`]
#[must_use]
pub fn resolve<T: Object>(source: &dyn ProcedureSource) -> Option<Procedure<T>> {
    let build = |synthesizer: &Synthesizer| -> ErasedProcedure { Arc::new(synthesizer.synthesize::<T>()) };
    source
        .resolve_erased(TypeKey::of::<T>(), &build)
        .downcast_ref::<Procedure<T>>()
        .cloned()
}

/// Builds procedures from shapes and registered configuration
#[derive(Clone)]
pub struct Synthesizer {
    registry: SharedRegistry,
    options: Arc<DiffOptions>,
    source: Option<Weak<dyn ProcedureSource>>,
}

impl Synthesizer {
    /// Create a standalone synthesizer
    #[must_use]
    pub fn new(registry: SharedRegistry, options: Arc<DiffOptions>) -> Self {
        Self {
            registry,
            options,
            source: None,
        }
    }

    /// Resolve value-type procedures through `source`
    #[must_use]
    pub fn with_source(mut self, source: Weak<dyn ProcedureSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Configuration registry consulted during synthesis
    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Options applied to every procedure
    #[must_use]
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Synthesize the procedure for `T`
    #[must_use]
    pub fn synthesize<T: Object>(&self) -> Procedure<T> {
        let started = Instant::now();
        let mut cx = PlanContext {
            synthesizer: self.clone(),
            ancestry: Vec::new(),
        };
        let steps = cx.object_steps::<T>("");
        tracing::debug!(
            type_name = TypeKey::of::<T>().name(),
            steps = steps.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Synthesized comparison procedure"
        );
        Procedure::new(steps)
    }
}

/// Procedure of `T` resolved on first use
pub struct LazyProcedure<T> {
    cell: OnceLock<Procedure<T>>,
    synthesizer: Synthesizer,
}

impl<T: Object> LazyProcedure<T> {
    /// Defer resolution of `T`'s procedure
    #[must_use]
    pub fn new(synthesizer: Synthesizer) -> Self {
        Self {
            cell: OnceLock::new(),
            synthesizer,
        }
    }

    /// The procedure, resolving it through the source or synthesizing it standalone
    pub fn get(&self) -> &Procedure<T> {
        self.cell.get_or_init(|| {
            self.synthesizer
                .source
                .as_ref()
                .and_then(Weak::upgrade)
                .and_then(|source| resolve::<T>(&*source))
                .unwrap_or_else(|| self.synthesizer.synthesize::<T>())
        })
    }

    /// Whether the procedure has been resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Mutable state of one synthesis run
pub struct PlanContext {
    synthesizer: Synthesizer,
    ancestry: Vec<TypeKey>,
}

impl PlanContext {
    /// Options of the running synthesis
    #[must_use]
    pub fn options(&self) -> &DiffOptions {
        &self.synthesizer.options
    }

    /// Types on the current synthesis path, outermost first
    #[must_use]
    pub fn ancestry(&self) -> &[TypeKey] {
        &self.ancestry
    }

    /// Steps comparing the members of `T`, with paths under `prefix`
    ///
    /// Empty when `T` is already on the synthesis path.
    pub fn object_steps<T: Object>(&mut self, prefix: &str) -> Vec<Step<T>> {
        let key = TypeKey::of::<T>();
        if self.ancestry.contains(&key) {
            tracing::trace!(type_name = key.name(), "Type already on the synthesis path");
            return Vec::new();
        }
        self.ancestry.push(key);

        let config = self.synthesizer.registry.lookup(key);
        let compare_fields = config.compares_fields() || self.synthesizer.options.compare_fields;
        let members = Members::<T>::collect();
        let mut steps = Vec::new();
        for def in members.iter() {
            let info = def.info();
            if config.is_ignored(&info.name) || config.is_type_ignored(info.descriptor.key) {
                continue;
            }
            if info.kind == MemberKind::Field && !compare_fields {
                continue;
            }
            let path = format!("{}{}", prefix, info.name);
            if let Some(step) = def.plan(self, path, config.settings(&info.name)) {
                steps.push(step);
            }
        }

        self.ancestry.pop();
        steps
    }

    /// Scalar member: reported when exactly one parent is absent or the values differ
    ///
    /// With one parent absent the member is reported even when the present
    /// side's value is itself absent.
    pub fn scalar<P: 'static, F: Scalar>(&mut self, member: Member<P, F>) -> Step<P> {
        let (path, _, access) = member.into_parts();
        let name = path.clone();
        Step::scalar(
            path,
            run(move |old, new, out| {
                let before = old.map(|parent| access(parent));
                let after = new.map(|parent| access(parent));
                let changed = match (before, after) {
                    (None, None) => false,
                    (Some(a), Some(b)) => a != b,
                    _ => true,
                };
                if !changed {
                    return;
                }
                let before = before.flatten().cloned().map(Value::new);
                let after = after.flatten().cloned().map(Value::new);
                out.push(Difference::new(name.clone(), before, after));
            }),
        )
    }

    /// Sequence of scalars: set difference
    pub fn scalar_set<P: 'static, E: Scalar>(&mut self, elements: Elements<P, E>) -> Step<P> {
        let (path, _, read) = elements.into_parts();
        let name = path.clone();
        Step::sequence(
            path,
            CollectionMode::Set,
            run(move |old, new, out| {
                let before = old.map(|parent| read(parent)).unwrap_or_default();
                let after = new.map(|parent| read(parent)).unwrap_or_default();
                collection::diff_scalar_set(&name, &before, &after, out);
            }),
        )
    }

    /// Map of scalars: shallow diff
    pub fn scalar_map<P: 'static, K: MapKey, V: Scalar>(&mut self, entries: Entries<P, K, V>) -> Step<P> {
        let (path, _, read) = entries.into_parts();
        let name = path.clone();
        let options = Arc::clone(&self.synthesizer.options);
        Step::map(
            path,
            CollectionMode::Shallow,
            run(move |old, new, out| {
                let before = old.map(|parent| read(parent)).unwrap_or_default();
                let after = new.map(|parent| read(parent)).unwrap_or_default();
                collection::diff_map(&name, &before, &after, &options, out);
            }),
        )
    }

    /// Nested object: the nested type's steps under the member path
    ///
    /// `None` when the nested type has nothing to compare or is already on
    /// the synthesis path.
    pub fn nested<P: 'static, T: Object>(&mut self, member: Member<P, T>) -> Option<Step<P>> {
        let (path, _, access) = member.into_parts();
        let prefix = format!("{}{}", path, self.synthesizer.options.separator);
        let steps = self.object_steps::<T>(&prefix);
        if steps.is_empty() {
            return None;
        }
        let children = steps.iter().map(Step::outline).collect();
        Some(Step::nested(
            path,
            children,
            run(move |old, new, out| {
                let before = old.and_then(|parent| access(parent));
                let after = new.and_then(|parent| access(parent));
                if before.is_none() && after.is_none() {
                    return;
                }
                for step in &steps {
                    step.execute(before, after, out);
                }
            }),
        ))
    }

    /// Sequence of objects: keyed deep diff with a matcher, set diff otherwise
    pub fn object_elements<P: 'static, E: Object>(&mut self, elements: Elements<P, E>) -> Step<P> {
        let (path, settings, read) = elements.into_parts();
        let name = path.clone();
        let procedure = self.lazy_procedure::<E>();

        let Some(runner) = settings.matcher.as_ref().and_then(Matcher::runner::<E>) else {
            return Step::sequence(
                path,
                CollectionMode::Set,
                run(move |old, new, out| {
                    let before = old.map(|parent| read(parent)).unwrap_or_default();
                    let after = new.map(|parent| read(parent)).unwrap_or_default();
                    collection::diff_object_set(
                        &name,
                        &before,
                        &after,
                        |a: &E, b: &E| procedure.get().same(a, b),
                        |element: &E| Value::new(procedure.get().snapshot(element)),
                        out,
                    );
                }),
            );
        };

        let sentinel = settings.matcher.as_ref().is_some_and(|m| m.sentinel().is_some());
        let options = Arc::clone(&self.synthesizer.options);
        Step::sequence(
            path,
            CollectionMode::Keyed { sentinel },
            run(move |old, new, out| {
                let before = old.map(|parent| read(parent)).unwrap_or_default();
                let after = new.map(|parent| read(parent)).unwrap_or_default();
                let compare = |a: Option<&E>, b: Option<&E>| procedure.get().compare(a, b);
                let compare: ElementCompare<'_, E> = &compare;
                runner(name.as_str(), &before[..], &after[..], compare, &*options, out);
            }),
        )
    }

    /// Map of objects: deep diff when configured, shallow by value equality otherwise
    pub fn object_entries<P: 'static, K: MapKey, V: Object>(&mut self, entries: Entries<P, K, V>) -> Step<P> {
        let (path, settings, read) = entries.into_parts();
        let name = path.clone();
        let procedure = self.lazy_procedure::<V>();
        let options = Arc::clone(&self.synthesizer.options);

        if !settings.deep {
            return Step::map(
                path,
                CollectionMode::Shallow,
                run(move |old, new, out| {
                    let before = old.map(|parent| read(parent)).unwrap_or_default();
                    let after = new.map(|parent| read(parent)).unwrap_or_default();
                    collection::diff_map_by(
                        &name,
                        &before,
                        &after,
                        |a: &V, b: &V| procedure.get().same(a, b),
                        |value: &V| Value::new(procedure.get().snapshot(value)),
                        &options,
                        out,
                    );
                }),
            );
        }

        Step::map(
            path,
            CollectionMode::Deep,
            run(move |old, new, out| {
                let before = old.map(|parent| read(parent)).unwrap_or_default();
                let after = new.map(|parent| read(parent)).unwrap_or_default();
                collection::diff_map_deep(
                    &name,
                    &before,
                    &after,
                    |a, b| procedure.get().compare(a, b),
                    &options,
                    out,
                );
            }),
        )
    }

    /// Procedure of `T`, resolved on first comparison
    #[must_use]
    pub fn lazy_procedure<T: Object>(&self) -> Arc<LazyProcedure<T>> {
        Arc::new(LazyProcedure::new(self.synthesizer.clone()))
    }

    /// Record a shape that is not compared
    pub fn unsupported(&self, path: &str, role: &str) {
        tracing::warn!(member = path, role, "Nested collections are not compared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TypeConfigBuilder;
    use crate::object_diffable;
    use crate::registry::ConfigRegistry;
    use crate::step::StepKind;
    use fielddiff_core::Snapshot;
    use std::collections::HashMap;

    struct GrandChild {
        id: i64,
        name: String,
        value: i32,
    }

    struct Child {
        id: i64,
        name: String,
        grand_child: Option<GrandChild>,
    }

    struct Root {
        id: i64,
        child: Option<Child>,
        tags: Vec<String>,
        names: HashMap<String, String>,
        cache: u32,
    }

    struct Parent {
        name: String,
        child: Option<Box<Kid>>,
    }

    struct Kid {
        name: String,
        parent: Option<Box<Parent>>,
    }

    struct Grid {
        rows: Vec<Vec<u8>>,
    }

    struct Bag {
        items: Vec<GrandChild>,
        by_id: HashMap<i64, GrandChild>,
    }

    impl Object for GrandChild {
        fn members(members: &mut Members<Self>) {
            members
                .property("Id", |g: &GrandChild| &g.id)
                .property("Name", |g: &GrandChild| &g.name)
                .property("Value", |g: &GrandChild| &g.value);
        }
    }

    impl Object for Child {
        fn members(members: &mut Members<Self>) {
            members
                .property("Id", |c: &Child| &c.id)
                .property("Name", |c: &Child| &c.name)
                .property("GrandChild", |c: &Child| &c.grand_child);
        }
    }

    impl Object for Root {
        fn members(members: &mut Members<Self>) {
            members
                .property("Id", |r: &Root| &r.id)
                .property("Child", |r: &Root| &r.child)
                .property("Tags", |r: &Root| &r.tags)
                .property("Names", |r: &Root| &r.names)
                .field("Cache", |r: &Root| &r.cache);
        }
    }

    impl Object for Parent {
        fn members(members: &mut Members<Self>) {
            members
                .property("Name", |p: &Parent| &p.name)
                .property("Child", |p: &Parent| &p.child);
        }
    }

    impl Object for Kid {
        fn members(members: &mut Members<Self>) {
            members
                .property("Name", |k: &Kid| &k.name)
                .property("Parent", |k: &Kid| &k.parent);
        }
    }

    impl Object for Grid {
        fn members(members: &mut Members<Self>) {
            members.property("Rows", |g: &Grid| &g.rows);
        }
    }

    impl Object for Bag {
        fn members(members: &mut Members<Self>) {
            members
                .property("Items", |b: &Bag| &b.items)
                .property("ById", |b: &Bag| &b.by_id);
        }
    }

    object_diffable!(GrandChild, Child, Root, Parent, Kid, Grid, Bag);

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(Arc::new(ConfigRegistry::new()), Arc::new(DiffOptions::default()))
    }

    fn grand_child(id: i64, name: &str, value: i32) -> GrandChild {
        GrandChild {
            id,
            name: name.to_string(),
            value,
        }
    }

    fn root(child: Option<Child>) -> Root {
        Root {
            id: 1,
            child,
            tags: vec!["a".to_string()],
            names: HashMap::new(),
            cache: 0,
        }
    }

    #[test]
    fn test_nested_paths() {
        let procedure = synthesizer().synthesize::<Root>();
        let old = root(Some(Child {
            id: 2,
            name: "Child".to_string(),
            grand_child: Some(grand_child(3, "GrandChild", 100)),
        }));
        let new = root(Some(Child {
            id: 2,
            name: "Child 2".to_string(),
            grand_child: Some(grand_child(4, "GrandChild 2", 200)),
        }));

        let names: Vec<String> = procedure.call(&old, &new).into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "Child.Name",
                "Child.GrandChild.Id",
                "Child.GrandChild.Name",
                "Child.GrandChild.Value",
            ]
        );
    }

    #[test]
    fn test_absent_nested_child_reports_every_leaf() {
        let procedure = synthesizer().synthesize::<Root>();
        let old = root(None);
        let new = root(Some(Child {
            id: 100,
            name: "Child".to_string(),
            grand_child: Some(grand_child(1000, "GrandChild", 500)),
        }));

        let diffs = procedure.call(&old, &new);
        assert_eq!(diffs.len(), 5);
        assert!(diffs.iter().all(|d| d.is_addition()));
        assert!(diffs.iter().any(|d| d.name == "Child.GrandChild.Value"));
    }

    #[test]
    fn test_fields_skipped_unless_enabled() {
        let mut old = root(None);
        let mut new = root(None);
        old.cache = 1;
        new.cache = 2;
        assert!(synthesizer().synthesize::<Root>().call(&old, &new).is_empty());

        let options = DiffOptions::default().with_compare_fields(true);
        let synthesizer = Synthesizer::new(Arc::new(ConfigRegistry::new()), Arc::new(options));
        let diffs = synthesizer.synthesize::<Root>().call(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].name, "Cache");
    }

    #[test]
    fn test_ignored_member_removes_subtree() {
        let registry = Arc::new(ConfigRegistry::new());
        let config = TypeConfigBuilder::<Root>::new().ignore("Child").unwrap().build();
        registry.register(config).unwrap();
        let synthesizer = Synthesizer::new(registry, Arc::new(DiffOptions::default()));

        let procedure = synthesizer.synthesize::<Root>();
        let diffs = procedure.compare(None, Some(&root(Some(Child {
            id: 1,
            name: "x".to_string(),
            grand_child: None,
        }))));
        assert!(diffs.iter().all(|d| !d.name.starts_with("Child")));
        assert!(procedure.outline().iter().all(|o| o.path != "Child"));
    }

    #[test]
    fn test_cycle_is_truncated() {
        let procedure = synthesizer().synthesize::<Parent>();
        let outline = procedure.outline();
        // Parent.Child.Parent is cut at the second occurrence of Parent
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[1].kind, StepKind::Nested);
        assert_eq!(outline[1].leaf_paths(), vec!["Child.Name"]);

        let old = Parent {
            name: "P".to_string(),
            child: Some(Box::new(Kid {
                name: "K".to_string(),
                parent: None,
            })),
        };
        let new = Parent {
            name: "P".to_string(),
            child: Some(Box::new(Kid {
                name: "K2".to_string(),
                parent: None,
            })),
        };
        let diffs = procedure.call(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].name, "Child.Name");
    }

    #[test]
    fn test_nested_collections_have_no_step() {
        let procedure = synthesizer().synthesize::<Grid>();
        assert!(procedure.is_empty());
        let diffs = procedure.call(&Grid { rows: vec![vec![1]] }, &Grid { rows: vec![] });
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_object_collections_default_to_whole_values() {
        let procedure = synthesizer().synthesize::<Bag>();
        let outline = procedure.outline();
        assert_eq!(outline[0].kind, StepKind::Sequence(CollectionMode::Set));
        assert_eq!(outline[1].kind, StepKind::Map(CollectionMode::Shallow));

        let old = Bag {
            items: vec![grand_child(1, "A", 1), grand_child(2, "B", 2)],
            by_id: HashMap::from([(1, grand_child(1, "A", 1))]),
        };
        let reordered = Bag {
            items: vec![grand_child(2, "B", 2), grand_child(1, "A", 1)],
            by_id: HashMap::from([(1, grand_child(1, "A", 1))]),
        };
        assert!(procedure.call(&old, &reordered).is_empty());

        let new = Bag {
            items: vec![grand_child(1, "A", 1), grand_child(2, "C", 2)],
            by_id: HashMap::from([(1, grand_child(1, "A", 2))]),
        };
        let diffs = procedure.call(&old, &new);
        let names: Vec<&str> = diffs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Items", "Items", "ById.1"]);

        let added = diffs[0].new_as::<Snapshot>().unwrap();
        assert_eq!(added.get("Name"), Some(&Value::new("C".to_string())));
        assert!(diffs[1].is_removal());
        let changed = &diffs[2];
        assert_eq!(changed.old_as::<Snapshot>().and_then(|s| s.get("Value")), Some(&Value::new(1)));
        assert_eq!(changed.new_as::<Snapshot>().and_then(|s| s.get("Value")), Some(&Value::new(2)));
    }

    #[test]
    fn test_deep_compare_descends_into_map_values() {
        let registry = Arc::new(ConfigRegistry::new());
        let config = TypeConfigBuilder::<Bag>::new().deep_compare("ById").unwrap().build();
        registry.register(config).unwrap();
        let procedure = Synthesizer::new(registry, Arc::new(DiffOptions::default())).synthesize::<Bag>();
        assert_eq!(procedure.outline()[1].kind, StepKind::Map(CollectionMode::Deep));

        let old = Bag {
            items: Vec::new(),
            by_id: HashMap::from([(1, grand_child(1, "A", 1))]),
        };
        let new = Bag {
            items: Vec::new(),
            by_id: HashMap::from([(1, grand_child(1, "A", 2))]),
        };
        let diffs = procedure.call(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].name, "ById.1.Value");
        assert_eq!(diffs[0].new_as::<i32>(), Some(&2));
    }

    #[test]
    fn test_keyed_sequence_from_registered_config() {
        let registry = Arc::new(ConfigRegistry::new());
        let config = TypeConfigBuilder::<Bag>::new()
            .match_using_or_new::<GrandChild, i64>("Items", "Id", 0)
            .unwrap()
            .build();
        registry.register(config).unwrap();
        let procedure = Synthesizer::new(registry, Arc::new(DiffOptions::default())).synthesize::<Bag>();
        assert_eq!(
            procedure.outline()[0].kind,
            StepKind::Sequence(CollectionMode::Keyed { sentinel: true })
        );

        let old = Bag {
            items: vec![grand_child(100, "Name 1", 100)],
            by_id: HashMap::new(),
        };
        let new = Bag {
            items: vec![grand_child(100, "Name 1", 100), grand_child(0, "Name 2", 200)],
            by_id: HashMap::new(),
        };
        let diffs = procedure.call(&old, &new);
        assert_eq!(diffs.len(), 3);
        assert!(diffs.iter().all(|d| d.name.starts_with("Items.{New 1}.")));
    }

    #[test]
    fn test_lazy_procedure_resolves_once() {
        let lazy = LazyProcedure::<GrandChild>::new(synthesizer());
        assert!(!lazy.is_resolved());
        let diffs = lazy.get().call(&grand_child(1, "A", 1), &grand_child(1, "A", 2));
        assert_eq!(diffs.len(), 1);
        assert!(lazy.is_resolved());
    }

    #[test]
    fn test_synthesis_seals_default_configuration() {
        let registry = Arc::new(ConfigRegistry::new());
        let _ = Synthesizer::new(Arc::clone(&registry), Arc::new(DiffOptions::default())).synthesize::<Root>();
        assert!(registry.is_sealed(TypeKey::of::<Root>()));
        assert!(registry.is_sealed(TypeKey::of::<Child>()));
        assert!(registry.ensure_configurable(TypeKey::of::<Root>()).is_err());
    }
}
