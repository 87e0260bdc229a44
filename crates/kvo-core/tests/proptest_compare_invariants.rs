#![forbid(unsafe_code)]

//! Property-based invariant tests for value ordering.
//!
//! 1. `compare_values` is reflexive and antisymmetric.
//! 2. `compare_values` is transitive, across kinds as well as within one.
//! 3. `sort_values` orders arbitrary keys (`NaN` and mixed kinds included)
//!    without losing or duplicating elements.

use std::cmp::Ordering;
use std::rc::Rc;

use kvo_core::{
    KvoArray, KvoObject, Marker, ObjectClass, SortDescriptor, Value, compare_values, sort_key,
    sort_values,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// A value to build once the classes for the case exist.
#[derive(Clone, Debug)]
enum Shape {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Marker(bool),
    List(Vec<Shape>),
    Plain(String),
    Ranked(usize, f64),
}

fn number() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => (-5i32..5).prop_map(f64::from),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
        1 => Just(-0.0),
        2 => any::<f64>(),
    ]
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Null),
        any::<bool>().prop_map(Shape::Bool),
        number().prop_map(Shape::Number),
        "[a-c0-9]{0,3}".prop_map(Shape::Text),
        any::<bool>().prop_map(Shape::Marker),
        "[a-c]{0,2}".prop_map(Shape::Plain),
        (0usize..2, number()).prop_map(|(class, rank)| Shape::Ranked(class, rank)),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        proptest::collection::vec(inner, 0..3).prop_map(Shape::List)
    })
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Two classes that share a comparator and differ only by name.
fn ranked_classes() -> [Rc<ObjectClass>; 2] {
    let build = |name: &str| {
        ObjectClass::builder(name)
            .comparator("compare", |a, b| {
                sort_key(a, "rank").to_number().total_cmp(&sort_key(b, "rank").to_number())
            })
            .build()
            .expect("class")
    };
    [build("Rank"), build("Score")]
}

fn build(shape: &Shape, classes: &[Rc<ObjectClass>; 2]) -> Value {
    match shape {
        Shape::Null => Value::Null,
        Shape::Bool(b) => Value::Bool(*b),
        Shape::Number(n) => Value::Number(*n),
        Shape::Text(s) => Value::from(s.as_str()),
        Shape::Marker(multiple) => Value::Marker(if *multiple {
            Marker::MultipleValues
        } else {
            Marker::NoSelection
        }),
        Shape::List(items) => {
            KvoArray::from_values(items.iter().map(|item| build(item, classes)).collect()).into()
        }
        Shape::Plain(label) => KvoObject::new().with("label", label.as_str()).into(),
        Shape::Ranked(class, rank) => KvoObject::with_class(&classes[*class]).with("rank", *rank).into(),
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Reflexivity and antisymmetry
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn comparison_is_antisymmetric(a in shape(), b in shape()) {
        let classes = ranked_classes();
        let (a, b) = (build(&a, &classes), build(&b, &classes));
        prop_assert_eq!(compare_values(&a, &a), Ordering::Equal);
        prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Transitivity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn comparison_is_transitive(a in shape(), b in shape(), c in shape()) {
        let classes = ranked_classes();
        let mut values = [build(&a, &classes), build(&b, &classes), build(&c, &classes)];
        // Put the triple in order by its first two links, then check the third.
        if compare_values(&values[0], &values[1]).is_gt() {
            values.swap(0, 1);
        }
        if compare_values(&values[1], &values[2]).is_gt() {
            values.swap(1, 2);
        }
        if compare_values(&values[0], &values[1]).is_gt() {
            values.swap(0, 1);
        }
        let [x, y, z] = &values;
        prop_assert!(compare_values(x, y).is_le());
        prop_assert!(compare_values(y, z).is_le());
        prop_assert!(compare_values(x, z).is_le(), "{x:?} <= {y:?} <= {z:?} but not {x:?} <= {z:?}");
        if compare_values(x, y).is_eq() && compare_values(y, z).is_eq() {
            prop_assert!(compare_values(x, z).is_eq());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Sorting arbitrary keys
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sort_values_orders_any_keys(
        keys in proptest::collection::vec(shape(), 0..48),
        ascending in any::<bool>(),
    ) {
        let classes = ranked_classes();
        let mut rows: Vec<Value> = keys
            .iter()
            .map(|key| KvoObject::new().with("key", build(key, &classes)).into())
            .collect();
        let original = rows.clone();

        sort_values(&mut rows, &[SortDescriptor::new("key", ascending)]).expect("sortable");

        prop_assert_eq!(rows.len(), original.len());
        for row in &original {
            prop_assert_eq!(rows.iter().filter(|r| r.same(row)).count(), 1);
        }
        let sorted: Vec<Value> = rows.iter().map(|r| sort_key(r, "key")).collect();
        for pair in sorted.windows(2) {
            let ordering = compare_values(&pair[0], &pair[1]);
            prop_assert!(
                if ascending { ordering.is_le() } else { ordering.is_ge() },
                "{:?} then {:?}", pair[0], pair[1]
            );
        }
    }
}
