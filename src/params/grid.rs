//! Grid expansion - Cartesian product of hyperparameter value lists

use serde_json::{Map, Value};

/// One point of a grid: values positionally aligned with [`Grid::names`].
pub type Combination = Vec<Value>;

/// Lazily enumerated Cartesian product of parameter value lists.
///
/// ## Ordering
///
/// Axes follow the iteration order of the input mapping (declaration order,
/// `serde_json` is built with `preserve_order`). Combinations are produced in
/// lexicographic order with the last axis varying fastest, so
/// `{"C": [0.1, 0.2], "kernel": ["rbf", "linear"]}` yields
/// `(0.1, rbf), (0.1, linear), (0.2, rbf), (0.2, linear)`.
///
/// ## Edge cases
///
/// - no axes at all: exactly one empty combination
/// - any empty axis: zero combinations ("nothing to run", not an error)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    names: Vec<String>,
    axes: Vec<Vec<Value>>,
}

impl Grid {
    /// Expand a parameter mapping into a grid.
    ///
    /// A value that is an array is one axis with those values. A value that
    /// is itself a mapping is a single atomic value and is never decomposed
    /// into per-key axes. Scalars are single-value axes as well.
    ///
    /// Arrays are taken verbatim: an array of mappings is an axis whose
    /// values are mappings.
    #[must_use]
    pub fn expand(parameters: &Map<String, Value>) -> Self {
        let mut names = Vec::with_capacity(parameters.len());
        let mut axes = Vec::with_capacity(parameters.len());

        for (name, values) in parameters {
            let axis = match values {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            names.push(name.clone());
            axes.push(axis);
        }

        Self { names, axes }
    }

    /// Parameter names, position `i` matches entry `i` of every combination.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of combinations (product of the axis lengths).
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes
            .iter()
            .fold(1usize, |acc, axis| acc.saturating_mul(axis.len()))
    }

    /// True if the grid has no combination to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if more than one combination exists.
    ///
    /// A non-branching grid runs the pipeline once with fixed values; a
    /// branching grid needs per-combination disambiguation downstream.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        self.len() > 1
    }

    /// Iterate over all combinations without materializing them.
    #[must_use]
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            cursor: vec![0; self.axes.len()],
            exhausted: self.axes.iter().any(Vec::is_empty),
        }
    }

    /// Zip a combination with the parameter names.
    #[must_use]
    pub fn to_params(&self, combination: &[Value]) -> Map<String, Value> {
        self.names
            .iter()
            .cloned()
            .zip(combination.iter().cloned())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Grid {
    type Item = Combination;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer-style iterator over a [`Grid`].
#[derive(Debug)]
pub struct GridIter<'a> {
    grid: &'a Grid,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl Iterator for GridIter<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let item = self
            .cursor
            .iter()
            .zip(&self.grid.axes)
            .map(|(&idx, axis)| axis[idx].clone())
            .collect();

        // Advance the last axis first; carry into earlier axes.
        self.exhausted = true;
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.grid.axes[pos].len() {
                self.exhausted = false;
                break;
            }
            self.cursor[pos] = 0;
        }

        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => unreachable!("test input must be an object"),
        }
    }

    #[test]
    fn test_grid_order_matches_declaration() {
        let grid = Grid::expand(&map(json!({"C": [0.1, 0.2], "kernel": ["rbf", "linear"]})));

        assert_eq!(grid.names(), ["C", "kernel"]);
        assert_eq!(grid.len(), 4);

        let combos: Vec<_> = grid.iter().collect();
        assert_eq!(
            combos,
            vec![
                vec![json!(0.1), json!("rbf")],
                vec![json!(0.1), json!("linear")],
                vec![json!(0.2), json!("rbf")],
                vec![json!(0.2), json!("linear")],
            ]
        );
    }

    #[test]
    fn test_grid_empty_parameters_yield_identity() {
        let grid = Grid::expand(&Map::new());

        assert_eq!(grid.len(), 1);
        assert!(!grid.is_branching());
        assert_eq!(grid.iter().collect::<Vec<_>>(), vec![Vec::<Value>::new()]);
    }

    #[test]
    fn test_grid_empty_axis_short_circuits() {
        let grid = Grid::expand(&map(json!({"C": [1, 2, 3], "gamma": []})));

        assert_eq!(grid.len(), 0);
        assert!(grid.is_empty());
        assert_eq!(grid.iter().count(), 0);
    }

    #[test]
    fn test_grid_mapping_value_is_atomic() {
        let grid = Grid::expand(&map(json!({
            "class_weight": {"a": 1, "b": 2},
            "C": [1, 2]
        })));

        assert_eq!(grid.len(), 2);
        let first = grid.iter().next().unwrap();
        assert_eq!(first[0], json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_grid_array_of_mappings_is_an_axis() {
        let grid = Grid::expand(&map(json!({"class_weight": [{"a": 1}, {"b": 2}]})));
        assert_eq!(grid.len(), 2);
        assert!(grid.is_branching());
    }

    #[test]
    fn test_grid_scalar_is_single_value() {
        let grid = Grid::expand(&map(json!({"kernel": "rbf"})));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.iter().next().unwrap(), vec![json!("rbf")]);
    }

    #[test]
    fn test_grid_to_params() {
        let grid = Grid::expand(&map(json!({"C": [0.5], "kernel": ["rbf"]})));
        let combo = grid.iter().next().unwrap();
        let params = grid.to_params(&combo);
        assert_eq!(Value::Object(params), json!({"C": 0.5, "kernel": "rbf"}));
    }
}
