//! Member declarations and the typed handles passed to planning.

use crate::config::MemberSettings;
use crate::shape::{Diffable, MemberInfo, MemberKind, Object};
use crate::step::Step;
use crate::synth::PlanContext;
use std::any::Any;
use std::sync::Arc;

/// Borrow of a member from its parent; `None` when the member is absent
pub type Accessor<P, F> = Arc<dyn Fn(&P) -> Option<&F> + Send + Sync>;

/// Plain member getter as declared
pub type Getter<T, F> = Arc<dyn Fn(&T) -> &F + Send + Sync>;

/// Elements of a sequence member, in sequence order; `None` is an absent element
pub type ElementReader<P, E> = Arc<dyn Fn(&P) -> Vec<Option<&E>> + Send + Sync>;

/// Entries of a map member, in map iteration order; `None` is an absent value
pub type EntryReader<P, K, V> = Arc<dyn Fn(&P) -> Vec<(&K, Option<&V>)> + Send + Sync>;

type Planner<T> = Box<dyn Fn(&mut PlanContext, String, MemberSettings) -> Option<Step<T>> + Send + Sync>;

/// Build an [`Accessor`] from a closure
pub fn accessor<P, F, C>(access: C) -> Accessor<P, F>
where
    P: 'static,
    F: 'static,
    C: Fn(&P) -> Option<&F> + Send + Sync + 'static,
{
    Arc::new(access)
}

/// Build an [`ElementReader`] from a closure
pub fn element_reader<P, E, C>(read: C) -> ElementReader<P, E>
where
    P: 'static,
    E: 'static,
    C: Fn(&P) -> Vec<Option<&E>> + Send + Sync + 'static,
{
    Arc::new(read)
}

/// Build an [`EntryReader`] from a closure
pub fn entry_reader<P, K, V, C>(read: C) -> EntryReader<P, K, V>
where
    P: 'static,
    K: 'static,
    V: 'static,
    C: Fn(&P) -> Vec<(&K, Option<&V>)> + Send + Sync + 'static,
{
    Arc::new(read)
}

fn planner<T, C>(plan: C) -> Planner<T>
where
    C: Fn(&mut PlanContext, String, MemberSettings) -> Option<Step<T>> + Send + Sync + 'static,
{
    Box::new(plan)
}

/// A member of type `F` reached from root type `P`
pub struct Member<P, F> {
    path: String,
    settings: MemberSettings,
    access: Accessor<P, F>,
}

impl<P: 'static, F: 'static> Member<P, F> {
    /// Create a member handle
    #[must_use]
    pub fn new(path: String, settings: MemberSettings, access: Accessor<P, F>) -> Self {
        Self { path, settings, access }
    }

    /// Dotted path from the root
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Settings configured for this member on its owning type
    #[must_use]
    pub fn settings(&self) -> &MemberSettings {
        &self.settings
    }

    /// Borrow the member from a parent value
    #[must_use]
    pub fn get<'a>(&self, parent: &'a P) -> Option<&'a F> {
        (self.access)(parent)
    }

    /// Step through one more layer (`Option::as_ref`, `Box` deref, ...)
    #[must_use]
    pub fn project<G: 'static>(self, step: fn(&F) -> Option<&G>) -> Member<P, G> {
        let access = self.access;
        Member {
            path: self.path,
            settings: self.settings,
            access: accessor(move |parent| access(parent).and_then(step)),
        }
    }

    /// Split into path, settings and accessor
    #[must_use]
    pub fn into_parts(self) -> (String, MemberSettings, Accessor<P, F>) {
        (self.path, self.settings, self.access)
    }
}

/// Elements of type `E` of a sequence member of root type `P`
pub struct Elements<P, E> {
    path: String,
    settings: MemberSettings,
    read: ElementReader<P, E>,
}

impl<P: 'static, E: 'static> Elements<P, E> {
    /// Create an element handle
    #[must_use]
    pub fn new(path: String, settings: MemberSettings, read: ElementReader<P, E>) -> Self {
        Self { path, settings, read }
    }

    /// Dotted path of the sequence member
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Settings configured for the sequence member
    #[must_use]
    pub fn settings(&self) -> &MemberSettings {
        &self.settings
    }

    /// Peel a layer off every element; peeling `None` leaves an absent element
    #[must_use]
    pub fn flat_map<G: 'static>(self, step: fn(&E) -> Option<&G>) -> Elements<P, G> {
        let read = self.read;
        Elements {
            path: self.path,
            settings: self.settings,
            read: element_reader(move |parent| {
                read(parent).into_iter().map(|element| element.and_then(step)).collect()
            }),
        }
    }

    /// Split into path, settings and reader
    #[must_use]
    pub fn into_parts(self) -> (String, MemberSettings, ElementReader<P, E>) {
        (self.path, self.settings, self.read)
    }
}

/// Entries with values of type `V` of a map member of root type `P`
pub struct Entries<P, K, V> {
    path: String,
    settings: MemberSettings,
    read: EntryReader<P, K, V>,
}

impl<P: 'static, K: 'static, V: 'static> Entries<P, K, V> {
    /// Create an entry handle
    #[must_use]
    pub fn new(path: String, settings: MemberSettings, read: EntryReader<P, K, V>) -> Self {
        Self { path, settings, read }
    }

    /// Dotted path of the map member
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Peel a layer off every value; the entry stays, with an absent value for `None`
    #[must_use]
    pub fn flat_map<G: 'static>(self, step: fn(&V) -> Option<&G>) -> Entries<P, K, G> {
        let read = self.read;
        Entries {
            path: self.path,
            settings: self.settings,
            read: entry_reader(move |parent| {
                read(parent)
                    .into_iter()
                    .map(|(key, value)| (key, value.and_then(step)))
                    .collect()
            }),
        }
    }

    /// Split into path, settings and reader
    #[must_use]
    pub fn into_parts(self) -> (String, MemberSettings, EntryReader<P, K, V>) {
        (self.path, self.settings, self.read)
    }
}

/// One declared member of `T` with its planner
pub struct MemberDef<T> {
    info: MemberInfo,
    getter: Arc<dyn Any + Send + Sync>,
    plan: Planner<T>,
}

impl<T: Object> MemberDef<T> {
    fn new<F, G>(name: &str, kind: MemberKind, get: G) -> Self
    where
        F: Diffable,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        let getter: Getter<T, F> = Arc::new(get);
        let read = Arc::clone(&getter);
        let access: Accessor<T, F> = accessor(move |parent| Some(read(parent)));
        Self {
            info: MemberInfo {
                name: name.to_string(),
                kind,
                descriptor: F::descriptor(),
            },
            getter: Arc::new(getter),
            plan: planner(move |cx, path, settings| {
                F::plan_member(cx, Member::new(path, settings, Arc::clone(&access)))
            }),
        }
    }

    /// Declared name, kind and shape
    #[must_use]
    pub fn info(&self) -> &MemberInfo {
        &self.info
    }

    /// The declared getter, if the member has declared type `F`
    #[must_use]
    pub fn getter<F: 'static>(&self) -> Option<Getter<T, F>> {
        self.getter.downcast_ref::<Getter<T, F>>().cloned()
    }

    /// Plan this member at `path`
    pub fn plan(&self, cx: &mut PlanContext, path: String, settings: MemberSettings) -> Option<Step<T>> {
        (self.plan)(cx, path, settings)
    }
}

/// Member declarations of `T`, filled by [`Object::members`]
pub struct Members<T> {
    defs: Vec<MemberDef<T>>,
}

impl<T: Object> Members<T> {
    /// Collect the declared members of `T`
    #[must_use]
    pub fn collect() -> Self {
        let mut members = Self { defs: Vec::new() };
        T::members(&mut members);
        members
    }

    /// Declare a property
    pub fn property<F, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        F: Diffable,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        self.defs.push(MemberDef::new(name, MemberKind::Property, get));
        self
    }

    /// Declare a field (compared only when field comparison is enabled)
    pub fn field<F, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        F: Diffable,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        self.defs.push(MemberDef::new(name, MemberKind::Field, get));
        self
    }

    /// Find a member by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&MemberDef<T>> {
        self.defs.iter().find(|def| def.info.name == name)
    }

    /// Declared members in order
    pub fn iter(&self) -> impl Iterator<Item = &MemberDef<T>> {
        self.defs.iter()
    }

    /// Member descriptors in order
    #[must_use]
    pub fn infos(&self) -> Vec<MemberInfo> {
        self.defs.iter().map(|def| def.info.clone()).collect()
    }

    /// Number of declared members
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether no members are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
