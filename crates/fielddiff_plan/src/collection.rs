//! Collection diff algorithms.
//!
//! All functions are pure: they read borrowed elements, append to `out`,
//! and never fail. An absent element or map value (`None`) takes part like
//! any other value and is reported with an absent old or new value.
//! Output order is deterministic:
//!
//! - sets: additions in new order, then removals in old order
//! - maps: changed keys in old order, then added keys in new order, then
//!   removed keys in old order
//! - keyed sequences: the keyed map diff, then sentinel additions in new order

use crate::options::DiffOptions;
use crate::shape::MapKey;
use fielddiff_core::{Difference, Scalar, Value};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Equality of possibly absent values; two absent values are equal
fn same_value<E: ?Sized>(a: Option<&E>, b: Option<&E>, same: &impl Fn(&E, &E) -> bool) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same(a, b),
        _ => false,
    }
}

/// Distinct elements of one side of a scalar set diff
///
/// Elements with a [`Scalar::hash_key`] are bucketed by it; the rest are
/// found by scanning.
struct Membership<'a, E> {
    absent: bool,
    hashed: FxHashMap<u64, Vec<&'a E>>,
    scanned: Vec<&'a E>,
}

impl<'a, E: Scalar> Membership<'a, E> {
    fn new() -> Self {
        Self {
            absent: false,
            hashed: FxHashMap::default(),
            scanned: Vec::new(),
        }
    }

    fn of(elements: &[Option<&'a E>]) -> Self {
        let mut membership = Self::new();
        for &element in elements {
            membership.insert(element);
        }
        membership
    }

    fn contains(&self, element: Option<&E>) -> bool {
        let Some(element) = element else {
            return self.absent;
        };
        match element.hash_key() {
            Some(key) => self
                .hashed
                .get(&key)
                .is_some_and(|bucket| bucket.iter().any(|&e| e == element)),
            None => self.scanned.iter().any(|&e| e == element),
        }
    }

    /// Whether `element` was not already a member
    fn insert(&mut self, element: Option<&'a E>) -> bool {
        if self.contains(element) {
            return false;
        }
        match element {
            None => self.absent = true,
            Some(element) => match element.hash_key() {
                Some(key) => self.hashed.entry(key).or_default().push(element),
                None => self.scanned.push(element),
            },
        }
        true
    }
}

/// Set difference of two scalar sequences
///
/// Duplicates collapse: an element present on both sides is never
/// reported, whatever its multiplicity.
pub fn diff_scalar_set<'a, E: Scalar>(
    name: &str,
    old: &[Option<&'a E>],
    new: &[Option<&'a E>],
    out: &mut Vec<Difference>,
) {
    let value = |element: Option<&E>| element.map(|e| Value::new(e.clone()));

    let in_old = Membership::of(old);
    let mut reported = Membership::new();
    for &element in new {
        if !in_old.contains(element) && reported.insert(element) {
            out.push(Difference::new(name, None, value(element)));
        }
    }

    let in_new = Membership::of(new);
    let mut reported = Membership::new();
    for &element in old {
        if !in_new.contains(element) && reported.insert(element) {
            out.push(Difference::new(name, value(element), None));
        }
    }
}

/// Set difference of two object sequences
///
/// `same` decides element equality and `snapshot` renders a reported
/// element. Pairwise: every element is checked against the other side.
pub fn diff_object_set<E, Q, R>(
    name: &str,
    old: &[Option<&E>],
    new: &[Option<&E>],
    same: Q,
    snapshot: R,
    out: &mut Vec<Difference>,
) where
    Q: Fn(&E, &E) -> bool,
    R: Fn(&E) -> Value,
{
    let found = |element: Option<&E>, among: &[Option<&E>]| among.iter().any(|&e| same_value(e, element, &same));

    for (i, &element) in new.iter().enumerate() {
        if !found(element, old) && !found(element, &new[..i]) {
            out.push(Difference::new(name, None, element.map(&snapshot)));
        }
    }
    for (i, &element) in old.iter().enumerate() {
        if !found(element, new) && !found(element, &old[..i]) {
            out.push(Difference::new(name, element.map(&snapshot), None));
        }
    }
}

/// Shallow map diff by value equality
pub fn diff_map<K: MapKey, V: Scalar>(
    name: &str,
    old: &[(&K, Option<&V>)],
    new: &[(&K, Option<&V>)],
    options: &DiffOptions,
    out: &mut Vec<Difference>,
) {
    diff_map_by(name, old, new, |a: &V, b: &V| a == b, |v: &V| Value::new(v.clone()), options, out);
}

/// Shallow map diff with caller-supplied equality and rendering
pub fn diff_map_by<K, V, Q, R>(
    name: &str,
    old: &[(&K, Option<&V>)],
    new: &[(&K, Option<&V>)],
    same: Q,
    render: R,
    options: &DiffOptions,
    out: &mut Vec<Difference>,
) where
    K: MapKey,
    Q: Fn(&V, &V) -> bool,
    R: Fn(&V) -> Value,
{
    let old: IndexMap<&K, Option<&V>> = old.iter().copied().collect();
    let new: IndexMap<&K, Option<&V>> = new.iter().copied().collect();
    let side = |value: Option<&V>| value.map(&render);

    for (key, before) in &old {
        if let Some(after) = new.get(key) {
            if !same_value(*before, *after, &same) {
                out.push(Difference::new(options.join(name, &key.to_string()), side(*before), side(*after)));
            }
        }
    }
    for (key, after) in &new {
        if !old.contains_key(key) {
            out.push(Difference::new(options.join(name, &key.to_string()), None, side(*after)));
        }
    }
    for (key, before) in &old {
        if !new.contains_key(key) {
            out.push(Difference::new(options.join(name, &key.to_string()), side(*before), None));
        }
    }
}

/// Deep map diff: every changed, added or removed value is compared field by field
///
/// `compare` is the value type's procedure. Its differences are prefixed
/// with `name.key.`.
pub fn diff_map_deep<K, V, C>(
    name: &str,
    old: &[(&K, Option<&V>)],
    new: &[(&K, Option<&V>)],
    compare: C,
    options: &DiffOptions,
    out: &mut Vec<Difference>,
) where
    K: MapKey,
    C: Fn(Option<&V>, Option<&V>) -> Vec<Difference>,
{
    let old: IndexMap<&K, Option<&V>> = old.iter().copied().collect();
    let new: IndexMap<&K, Option<&V>> = new.iter().copied().collect();
    let prefix = |key: &K| format!("{}{}", options.join(name, &key.to_string()), options.separator);

    for (key, before) in &old {
        if let Some(after) = new.get(key) {
            let prefix = prefix(*key);
            out.extend(compare(*before, *after).into_iter().map(|d| d.prefixed(&prefix)));
        }
    }
    for (key, after) in &new {
        if !old.contains_key(key) {
            let prefix = prefix(*key);
            out.extend(compare(None, *after).into_iter().map(|d| d.prefixed(&prefix)));
        }
    }
    for (key, before) in &old {
        if !new.contains_key(key) {
            let prefix = prefix(*key);
            out.extend(compare(*before, None).into_iter().map(|d| d.prefixed(&prefix)));
        }
    }
}

/// Split a sequence into keyed elements and sentinel elements
///
/// The first element with a given key wins; later duplicates are skipped.
/// Absent elements have no key and are skipped.
fn partition<'a, E, K, S>(
    name: &str,
    elements: &[Option<&'a E>],
    selector: &S,
    sentinel: Option<&K>,
) -> (Vec<(K, &'a E)>, Vec<&'a E>)
where
    K: MapKey,
    S: Fn(&E) -> K + ?Sized,
{
    let mut keyed: IndexMap<K, &'a E> = IndexMap::new();
    let mut sentinels = Vec::new();
    for &element in elements.iter().flatten() {
        let key = selector(element);
        if sentinel.is_some_and(|s| *s == key) {
            sentinels.push(element);
        } else if keyed.contains_key(&key) {
            tracing::warn!(member = name, key = %key, "Duplicate merge key, keeping the first element");
        } else {
            keyed.insert(key, element);
        }
    }
    (keyed.into_iter().collect(), sentinels)
}

/// Deep diff of object sequences matched by a merge key
///
/// Without a sentinel both sides are keyed and compared with
/// [`diff_map_deep`]. With a sentinel, elements whose key equals it are
/// taken out of the keyed comparison and every such element of the NEW
/// sequence is reported as a full addition under `name.{New n}.`.
/// Sentinel elements of the old sequence are not reported.
#[allow(clippy::too_many_arguments)]
pub fn diff_keyed_sequence<E, K, S, C>(
    name: &str,
    old: &[Option<&E>],
    new: &[Option<&E>],
    selector: &S,
    sentinel: Option<&K>,
    compare: C,
    options: &DiffOptions,
    out: &mut Vec<Difference>,
) where
    K: MapKey,
    S: Fn(&E) -> K + ?Sized,
    C: Fn(Option<&E>, Option<&E>) -> Vec<Difference>,
{
    let (old_keyed, _) = partition(name, old, selector, sentinel);
    let (new_keyed, new_sentinels) = partition(name, new, selector, sentinel);

    let old_refs: Vec<(&K, Option<&E>)> = old_keyed.iter().map(|(k, e)| (k, Some(*e))).collect();
    let new_refs: Vec<(&K, Option<&E>)> = new_keyed.iter().map(|(k, e)| (k, Some(*e))).collect();
    diff_map_deep(name, &old_refs, &new_refs, &compare, options, out);

    for (i, element) in new_sentinels.into_iter().enumerate() {
        let prefix = format!("{}{}", options.join(name, &options.new_item(i + 1)), options.separator);
        out.extend(compare(None, Some(element)).into_iter().map(|d| d.prefixed(&prefix)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Child {
        id: i64,
        name: String,
        value: i32,
    }

    fn child(id: i64, name: &str, value: i32) -> Child {
        Child {
            id,
            name: name.to_string(),
            value,
        }
    }

    // Field-by-field comparison of a Child, as a synthesized procedure would do it
    fn compare_child(old: Option<&Child>, new: Option<&Child>) -> Vec<Difference> {
        let mut out = Vec::new();
        if old.is_none() && new.is_none() {
            return out;
        }
        let (a, b) = (old.map(|c| c.id), new.map(|c| c.id));
        if a != b {
            out.push(Difference::new("Id", a.map(Value::new), b.map(Value::new)));
        }
        let (a, b) = (old.map(|c| c.name.clone()), new.map(|c| c.name.clone()));
        if a != b {
            out.push(Difference::new("Name", a.map(Value::new), b.map(Value::new)));
        }
        let (a, b) = (old.map(|c| c.value), new.map(|c| c.value));
        if a != b {
            out.push(Difference::new("Value", a.map(Value::new), b.map(Value::new)));
        }
        out
    }

    fn same_child(a: &Child, b: &Child) -> bool {
        compare_child(Some(a), Some(b)).is_empty()
    }

    fn name_of(c: &Child) -> Value {
        Value::new(c.name.clone())
    }

    fn refs<T>(items: &[T]) -> Vec<Option<&T>> {
        items.iter().map(Some).collect()
    }

    fn entries<'a, K, V>(items: &'a [(K, V)]) -> Vec<(&'a K, Option<&'a V>)> {
        items.iter().map(|(k, v)| (k, Some(v))).collect()
    }

    #[test]
    fn test_scalar_set_diff() {
        let old = [1, 2, 3, 4, 5];
        let new = [1, 3, 4, 5, 6];
        let mut out = Vec::new();
        diff_scalar_set("Ids", &refs(&old), &refs(&new), &mut out);

        assert_eq!(
            out,
            vec![
                Difference::added("Ids", Value::new(6)),
                Difference::removed("Ids", Value::new(2)),
            ]
        );
    }

    #[test]
    fn test_scalar_set_collapses_duplicates() {
        let old = [1, 1, 2];
        let new = [2, 3, 3];
        let mut out = Vec::new();
        diff_scalar_set("Ids", &refs(&old), &refs(&new), &mut out);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_addition());
        assert!(out[1].is_removal());
    }

    #[test]
    fn test_scalar_set_without_hash_keys() {
        let old = [1.5f64, 2.5, 2.5];
        let new = [2.5f64, 3.5];
        let mut out = Vec::new();
        diff_scalar_set("Weights", &refs(&old), &refs(&new), &mut out);
        assert_eq!(
            out,
            vec![
                Difference::added("Weights", Value::new(3.5f64)),
                Difference::removed("Weights", Value::new(1.5f64)),
            ]
        );
    }

    #[test]
    fn test_scalar_set_reports_absent_elements() {
        let one = 1;
        let mut out = Vec::new();
        diff_scalar_set("Ids", &[Some(&one)], &[Some(&one), None, None], &mut out);
        assert_eq!(out, vec![Difference::new("Ids", None, None)]);

        let absent: [Option<&i32>; 1] = [None];
        let mut out = Vec::new();
        diff_scalar_set("Ids", &absent, &absent, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_object_set_ignores_order() {
        let old = [child(1, "A", 1), child(2, "B", 2)];
        let new = [child(2, "B", 2), child(1, "A", 1)];
        let mut out = Vec::new();
        diff_object_set("Items", &refs(&old), &refs(&new), same_child, name_of, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_object_set_reports_whole_elements() {
        let old = [child(1, "A", 1), child(2, "B", 2)];
        let new = [child(1, "A", 1), child(2, "B", 3), child(2, "B", 3)];
        let mut out = Vec::new();
        diff_object_set("Items", &refs(&old), &refs(&new), same_child, name_of, &mut out);
        assert_eq!(
            out,
            vec![
                Difference::added("Items", Value::new("B".to_string())),
                Difference::removed("Items", Value::new("B".to_string())),
            ]
        );
    }

    #[test]
    fn test_shallow_map_diff() {
        let items = [
            ("fr".to_string(), "Salut".to_string()),
            ("en".to_string(), "Hi".to_string()),
        ];
        let changed = [
            ("en".to_string(), "Hello".to_string()),
            ("es".to_string(), "Hola".to_string()),
        ];
        let mut out = Vec::new();
        diff_map("Names", &entries(&items), &entries(&changed), &DiffOptions::default(), &mut out);

        assert_eq!(
            out,
            vec![
                Difference::new(
                    "Names.en",
                    Some(Value::new("Hi".to_string())),
                    Some(Value::new("Hello".to_string()))
                ),
                Difference::added("Names.es", Value::new("Hola".to_string())),
                Difference::removed("Names.fr", Value::new("Salut".to_string())),
            ]
        );
    }

    #[test]
    fn test_shallow_map_reports_absent_values() {
        let (a, b) = ("a".to_string(), "b".to_string());
        let one = 1;
        let old: Vec<(&String, Option<&i32>)> = vec![(&b, Some(&one))];
        let new: Vec<(&String, Option<&i32>)> = vec![(&a, None), (&b, None)];
        let mut out = Vec::new();
        diff_map("Scores", &old, &new, &DiffOptions::default(), &mut out);
        assert_eq!(
            out,
            vec![
                Difference::removed("Scores.b", Value::new(1)),
                Difference::new("Scores.a", None, None),
            ]
        );
    }

    #[test]
    fn test_shallow_object_map_reports_entries() {
        let old = [(1, child(100, "Name 1", 100)), (2, child(200, "Name 2", 200))];
        let new = [(1, child(100, "Name 1 - Changed", 150)), (2, child(200, "Name 2", 200))];
        let mut out = Vec::new();
        diff_map_by("Nested", &entries(&old), &entries(&new), same_child, name_of, &DiffOptions::default(), &mut out);
        assert_eq!(
            out,
            vec![Difference::new(
                "Nested.1",
                Some(Value::new("Name 1".to_string())),
                Some(Value::new("Name 1 - Changed".to_string()))
            )]
        );
    }

    #[test]
    fn test_deep_map_diff() {
        let old = [(1, child(100, "Name 1", 100)), (2, child(200, "Name 2", 200))];
        let new = [(1, child(100, "Name 1 - Changed", 150)), (3, child(300, "Name 3", 300))];

        let mut out = Vec::new();
        diff_map_deep("Nested", &entries(&old), &entries(&new), compare_child, &DiffOptions::default(), &mut out);

        // 2 changed + 3 added + 3 removed
        assert_eq!(out.len(), 8);
        assert_eq!(out[0].name, "Nested.1.Name");
        assert_eq!(out[1].name, "Nested.1.Value");
        assert!(out[2..5].iter().all(|d| d.name.starts_with("Nested.3.") && d.is_addition()));
        assert!(out[5..].iter().all(|d| d.name.starts_with("Nested.2.") && d.is_removal()));
    }

    #[test]
    fn test_deep_map_absent_value_removes_fields() {
        let key = 1;
        let old_child = child(1, "A", 1);
        let old = vec![(&key, Some(&old_child))];
        let new = vec![(&key, None)];
        let mut out = Vec::new();
        diff_map_deep("Nested", &old, &new, compare_child, &DiffOptions::default(), &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|d| d.name.starts_with("Nested.1.") && d.is_removal()));
    }

    #[test]
    fn test_keyed_sequence_without_sentinel() {
        let old = [child(100, "Name 1", 100), child(200, "Name 2", 200)];
        let new = [
            child(100, "Name 1 - Changed", 150),
            child(300, "Name 3", 300),
            child(400, "Name 4", 200),
        ];
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &refs(&old),
            &refs(&new),
            &|c: &Child| c.id,
            None,
            compare_child,
            &DiffOptions::default(),
            &mut out,
        );

        // 2 changed + 2 x 3 added + 3 removed
        assert_eq!(out.len(), 11);
        assert_eq!(out.iter().filter(|d| d.name == "Children.100.Name").count(), 1);
    }

    #[test]
    fn test_keyed_sequence_with_sentinel() {
        let old = [child(100, "Name 1", 100)];
        let new = [
            child(100, "Name 1", 101),
            child(0, "Name 2", 200),
            child(0, "Name 3", 300),
            child(0, "Name 4", 400),
        ];
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &refs(&old),
            &refs(&new),
            &|c: &Child| c.id,
            Some(&0),
            compare_child,
            &DiffOptions::default(),
            &mut out,
        );

        assert_eq!(out.len(), 10);
        assert_eq!(out[0].name, "Children.100.Value");
        for n in 1..=3 {
            let prefix = format!("Children.{{New {}}}.", n);
            assert_eq!(out.iter().filter(|d| d.name.starts_with(&prefix)).count(), 3);
        }
        assert!(out.iter().any(|d| d.name == "Children.{New 1}.Id" && d.new_as::<i64>() == Some(&0)));
    }

    #[test]
    fn test_old_sentinel_elements_are_not_reported() {
        let old = [child(0, "Draft", 1)];
        let new: [Child; 0] = [];
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &refs(&old),
            &refs(&new),
            &|c: &Child| c.id,
            Some(&0),
            compare_child,
            &DiffOptions::default(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_keys_first_wins() {
        let old = [child(1, "A", 1)];
        let new = [child(1, "A", 1), child(1, "B", 2)];
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &refs(&old),
            &refs(&new),
            &|c: &Child| c.id,
            None,
            compare_child,
            &DiffOptions::default(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_keyed_sequence_skips_absent_elements() {
        let kept = child(1, "A", 1);
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &[Some(&kept)],
            &[Some(&kept), None],
            &|c: &Child| c.id,
            None,
            compare_child,
            &DiffOptions::default(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_custom_label_and_separator() {
        let options = DiffOptions::new().with_separator("/").with_new_item_label("Added");
        let new = [child(0, "X", 1)];
        let mut out = Vec::new();
        diff_keyed_sequence(
            "Children",
            &[],
            &refs(&new),
            &|c: &Child| c.id,
            Some(&0),
            compare_child,
            &options,
            &mut out,
        );
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|d| d.name.starts_with("Children/{Added 1}/")));
    }

    proptest! {
        #[test]
        fn prop_scalar_set_reflexive(items in proptest::collection::vec(any::<i32>(), 0..20)) {
            let mut out = Vec::new();
            diff_scalar_set("Items", &refs(&items), &refs(&items), &mut out);
            prop_assert!(out.is_empty());
        }

        #[test]
        fn prop_scalar_set_reports_each_distinct_change_once(
            old in proptest::collection::vec(0i32..10, 0..12),
            new in proptest::collection::vec(0i32..10, 0..12),
        ) {
            let mut out = Vec::new();
            diff_scalar_set("Items", &refs(&old), &refs(&new), &mut out);

            let old_set: std::collections::BTreeSet<_> = old.iter().copied().collect();
            let new_set: std::collections::BTreeSet<_> = new.iter().copied().collect();
            let expected = new_set.difference(&old_set).count() + old_set.difference(&new_set).count();
            prop_assert_eq!(out.len(), expected);
        }

        #[test]
        fn prop_hashed_and_scanned_sets_agree(
            old in proptest::collection::vec(-5i32..5, 0..12),
            new in proptest::collection::vec(-5i32..5, 0..12),
        ) {
            let mut hashed = Vec::new();
            diff_scalar_set("Items", &refs(&old), &refs(&new), &mut hashed);

            let old_f: Vec<f64> = old.iter().map(|&v| f64::from(v)).collect();
            let new_f: Vec<f64> = new.iter().map(|&v| f64::from(v)).collect();
            let mut scanned = Vec::new();
            diff_scalar_set("Items", &refs(&old_f), &refs(&new_f), &mut scanned);

            prop_assert_eq!(hashed.len(), scanned.len());
            for (h, s) in hashed.iter().zip(&scanned) {
                prop_assert_eq!(h.is_addition(), s.is_addition());
                prop_assert_eq!(h.new_as::<i32>().map(|&v| f64::from(v)), s.new_as::<f64>().copied());
                prop_assert_eq!(h.old_as::<i32>().map(|&v| f64::from(v)), s.old_as::<f64>().copied());
            }
        }
    }
}
