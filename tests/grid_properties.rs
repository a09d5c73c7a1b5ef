//! Property-based tests for grid expansion
//!
//! Cardinality, ordering and naming of expanded grids for arbitrary axis shapes.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use trueno_exp::params::{Grid, GridSearch, ParameterMap};

// Strategy: 0..4 axes, each with 0..4 integer values
fn axis_lengths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 0..4)
}

fn parameters(lengths: &[usize]) -> Map<String, Value> {
    lengths
        .iter()
        .enumerate()
        .map(|(axis, &len)| {
            let values: Vec<Value> = (0..len).map(|v| json!(axis * 10 + v)).collect();
            (format!("p{axis}"), Value::Array(values))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: number of combinations is the product of axis lengths
    #[test]
    fn prop_cardinality_is_product(lengths in axis_lengths()) {
        let grid = Grid::expand(&parameters(&lengths));
        let expected: usize = lengths.iter().product();

        prop_assert_eq!(grid.len(), expected);
        prop_assert_eq!(grid.iter().count(), expected);
        prop_assert_eq!(grid.is_empty(), expected == 0);
        prop_assert_eq!(grid.is_branching(), expected > 1);
    }

    /// Property: combinations come out in lexicographic order, last axis fastest
    #[test]
    fn prop_lexicographic_order(lengths in axis_lengths()) {
        let grid = Grid::expand(&parameters(&lengths));
        let rows: Vec<Vec<u64>> = grid
            .iter()
            .map(|c| c.iter().filter_map(Value::as_u64).collect())
            .collect();

        for pair in rows.windows(2) {
            prop_assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    /// Property: value at position i belongs to the axis named names()[i]
    #[test]
    fn prop_positional_names(lengths in axis_lengths()) {
        let grid = Grid::expand(&parameters(&lengths));
        let names: Vec<String> = (0..lengths.len()).map(|axis| format!("p{axis}")).collect();
        prop_assert_eq!(grid.names(), names.as_slice());

        for combination in &grid {
            let params = grid.to_params(&combination);
            for (name, value) in &params {
                let axis: u64 = name[1..].parse().unwrap();
                let value = value.as_u64().unwrap();
                prop_assert_eq!(value / 10, axis);
            }
        }
    }

    /// Property: an empty axis anywhere means nothing to run
    #[test]
    fn prop_empty_axis_yields_nothing(mut lengths in axis_lengths(), position in 0usize..4) {
        let position = position.min(lengths.len());
        lengths.insert(position, 0);

        let grid = Grid::expand(&parameters(&lengths));
        prop_assert!(grid.is_empty());
        prop_assert_eq!(grid.iter().next(), None);
    }

    /// Property: qualified pipeline names keep step order then declaration order
    #[test]
    fn prop_pipeline_names_are_qualified(first in 1usize..3, second in 1usize..3) {
        let mut map = ParameterMap::new();
        map.insert("scaler", Value::Object(parameters(&vec![1; first])));
        map.insert("model", Value::Object(parameters(&vec![1; second])));

        let search = GridSearch::for_pipeline(["scaler", "model"], &map).unwrap();
        let expected: Vec<String> = (0..first)
            .map(|axis| format!("scaler.p{axis}"))
            .chain((0..second).map(|axis| format!("model.p{axis}")))
            .collect();

        prop_assert_eq!(search.names(), expected.as_slice());
        prop_assert!(!search.is_branching());
    }
}

#[test]
fn test_no_axes_is_one_empty_combination() {
    let grid = Grid::expand(&Map::new());
    assert_eq!(grid.len(), 1);
    assert_eq!(grid.iter().collect::<Vec<_>>(), vec![Vec::<Value>::new()]);
}

#[test]
fn test_mapping_value_is_atomic() {
    let params = json!({"solver": {"name": "lbfgs", "tol": 1e-4}, "C": [1, 2]});
    let grid = Grid::expand(params.as_object().unwrap());

    assert_eq!(grid.len(), 2);
    let first = grid.to_params(&grid.iter().next().unwrap());
    assert_eq!(first["solver"], json!({"name": "lbfgs", "tol": 1e-4}));
}
