use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::clock;
use crate::error::EvalError;
use crate::expression::{BoolExpression, BoolOperator, MathExpression};
use crate::functions::{self, FunctionArgs};

#[cfg(feature = "rayon")]
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

/// Named values for one evaluation. Names are case-insensitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Variables<V> {
    values: HashMap<String, V>,
}

impl<V> Default for Variables<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<V: Copy> Variables<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: HashMap::with_capacity(capacity),
        }
    }

    /// Binds `name`, replacing any earlier value.
    pub fn insert(&mut self, name: &str, value: V) {
        self.values.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<V> {
        match self.values.get(name) {
            Some(value) => Some(*value),
            None => self.values.get(&name.to_lowercase()).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    fn lookup(&self, name: &str) -> Result<V, EvalError> {
        self.get(name).ok_or_else(|| EvalError::VariableNotFound {
            name: name.to_string(),
        })
    }
}

impl<V: Copy, S: AsRef<str>> FromIterator<(S, V)> for Variables<V> {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut variables = Self::new();
        for (name, value) in iter {
            variables.insert(name.as_ref(), value);
        }
        variables
    }
}

/// A parsed tree that can be walked against a variable map.
pub trait ExpressionTree: fmt::Debug + Send + Sync {
    type Value: Copy + PartialEq + fmt::Debug + Send + Sync;

    fn evaluate(&self, variables: &Variables<Self::Value>) -> Result<Self::Value, EvalError>;
}

impl ExpressionTree for MathExpression {
    type Value = f64;

    fn evaluate(&self, variables: &Variables<f64>) -> Result<f64, EvalError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::Variable(name) => variables.lookup(name),
            Self::SystemVariable(system) => Ok(system.read(clock::clock().as_ref())),
            Self::Neg(only) => Ok(-only.evaluate(variables)?),
            Self::Binary(lhs, op, rhs) => {
                Ok(op.apply(lhs.evaluate(variables)?, rhs.evaluate(variables)?))
            }
            Self::FunctionCall(name, args) => {
                let function = functions::function(name).ok_or_else(|| {
                    EvalError::FunctionNotDefined { name: name.clone() }
                })?;
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(variables))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&FunctionArgs::new(name, &values))
            }
        }
    }
}

impl ExpressionTree for BoolExpression {
    type Value = bool;

    fn evaluate(&self, variables: &Variables<bool>) -> Result<bool, EvalError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::Variable(name) => variables.lookup(name),
            Self::Not(only) => Ok(!only.evaluate(variables)?),
            Self::Binary(lhs, op, rhs) => {
                let lhs = lhs.evaluate(variables)?;
                match op {
                    BoolOperator::And => Ok(lhs && rhs.evaluate(variables)?),
                    BoolOperator::Or => Ok(lhs || rhs.evaluate(variables)?),
                    BoolOperator::Equal => Ok(lhs == rhs.evaluate(variables)?),
                    BoolOperator::NotEqual => Ok(lhs != rhs.evaluate(variables)?),
                }
            }
        }
    }
}

#[derive(Debug)]
struct EvaluationCache<V> {
    last_variables: Variables<V>,
    last_result: Option<V>,
}

impl<V: Copy + PartialEq> EvaluationCache<V> {
    fn hit(&self, variables: &Variables<V>) -> Option<V> {
        let result = self.last_result?;
        (self.last_variables == *variables).then_some(result)
    }
}

/// Owns a parsed tree and memoizes its most recent result.
///
/// [`Evaluator::evaluate`] is safe to call from many threads at once.
/// [`Evaluator::evaluate_fast`] skips the cache and its lock entirely.
#[derive(Debug)]
pub struct Evaluator<T: ExpressionTree> {
    tree: T,
    can_be_cached: bool,
    cache: RwLock<EvaluationCache<T::Value>>,
}

impl<T: ExpressionTree> Evaluator<T> {
    pub fn new(tree: T, can_be_cached: bool) -> Self {
        Self {
            tree,
            can_be_cached,
            cache: RwLock::new(EvaluationCache {
                last_variables: Variables::default(),
                last_result: None,
            }),
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn can_be_cached(&self) -> bool {
        self.can_be_cached
    }

    /// Evaluates the tree, reusing the previous result when `variables` equals
    /// the previous call's variables.
    pub fn evaluate(&self, variables: &Variables<T::Value>) -> Result<T::Value, EvalError> {
        if !self.can_be_cached {
            return self.tree.evaluate(variables);
        }

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(result) = cache.hit(variables) {
                tracing::trace!(?result, "expression cache hit");
                return Ok(result);
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have stored these variables while we waited.
        if let Some(result) = cache.hit(variables) {
            return Ok(result);
        }
        tracing::trace!("expression cache miss");
        let result = self.tree.evaluate(variables)?;
        cache.last_variables.clone_from(variables);
        cache.last_result = Some(result);
        Ok(result)
    }

    /// Walks the tree without touching the cache.
    pub fn evaluate_fast(&self, variables: &Variables<T::Value>) -> Result<T::Value, EvalError> {
        self.tree.evaluate(variables)
    }

    /// Evaluates each variable set independently, bypassing the cache.
    pub fn evaluate_batch(
        &self,
        variable_sets: &[Variables<T::Value>],
    ) -> Result<Vec<T::Value>, EvalError> {
        #[cfg(feature = "rayon")]
        {
            variable_sets
                .par_iter()
                .map(|variables| self.tree.evaluate(variables))
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            variable_sets
                .iter()
                .map(|variables| self.tree.evaluate(variables))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn math(input: &str) -> Evaluator<MathExpression> {
        let parsed = MathExpression::parse(input).unwrap();
        Evaluator::new(parsed.tree, parsed.can_be_cached)
    }

    fn boolean(input: &str) -> Evaluator<BoolExpression> {
        let parsed = BoolExpression::parse(input).unwrap();
        Evaluator::new(parsed.tree, parsed.can_be_cached)
    }

    #[test]
    fn variables_are_case_insensitive() {
        let mut variables = Variables::new();
        variables.insert("Speed", 2.0);
        assert_eq!(variables.get("speed"), Some(2.0));
        assert_eq!(variables.get("SPEED"), Some(2.0));
        variables.insert("SPEED", 3.0);
        assert_eq!(variables.len(), 1);
        assert_eq!(variables.get("speed"), Some(3.0));
    }

    #[test]
    fn arithmetic() {
        let empty = Variables::new();
        assert_eq!(math("2 + 3 * 4").evaluate_fast(&empty), Ok(14.0));
        assert_eq!(math("(2 + 3) * 4").evaluate_fast(&empty), Ok(20.0));
        assert_eq!(math("2 ^ 3 ^ 2").evaluate_fast(&empty), Ok(64.0));
        assert_eq!(math("8 / 4 * 3").evaluate_fast(&empty), Ok(6.0));
        assert_eq!(math("10 - 4 - 3").evaluate_fast(&empty), Ok(3.0));
        assert_eq!(math("-2 ^ 2").evaluate_fast(&empty), Ok(4.0));
        assert_eq!(math("1 / 0").evaluate_fast(&empty), Ok(f64::INFINITY));
    }

    #[test]
    fn functions_and_variables() {
        let variables: Variables<f64> = [("x", 4.0), ("Y", 0.5)].into_iter().collect();
        assert_eq!(math("clamp(x, 0, 3)").evaluate_fast(&variables), Ok(3.0));
        assert_eq!(math("lerp(0, 10, y)").evaluate_fast(&variables), Ok(5.0));
        assert_eq!(math("max(1, x * 2, 3)").evaluate_fast(&variables), Ok(8.0));
        assert_eq!(math("SQRT(x) + Abs(-1)").evaluate_fast(&variables), Ok(3.0));
    }

    #[test]
    fn evaluation_errors() {
        let empty = Variables::new();
        assert_eq!(
            math("foo(1)").evaluate_fast(&empty),
            Err(EvalError::FunctionNotDefined { name: "foo".into() })
        );
        assert_eq!(
            math("x + 1").evaluate(&empty),
            Err(EvalError::VariableNotFound { name: "x".into() })
        );
        assert_eq!(
            math("x + 1").evaluate(&empty).unwrap_err().to_string(),
            "Variable 'x' not found"
        );
    }

    #[test]
    fn boolean_logic() {
        let evaluator = boolean("a && !b");
        let variables: Variables<bool> = [("a", true), ("b", false)].into_iter().collect();
        assert_eq!(evaluator.evaluate(&variables), Ok(true));
        let variables: Variables<bool> = [("a", false), ("b", true)].into_iter().collect();
        assert_eq!(evaluator.evaluate(&variables), Ok(false));

        let variables: Variables<bool> = [("a", true)].into_iter().collect();
        assert_eq!(
            boolean("a && c").evaluate(&variables),
            Err(EvalError::VariableNotFound { name: "c".into() })
        );
        // Right-hand side is not visited once the result is known.
        assert_eq!(boolean("a || c").evaluate(&variables), Ok(true));
        assert_eq!(boolean("a == true != false").evaluate(&variables), Ok(true));
    }

    #[test]
    fn cache_returns_previous_result_for_equal_variables() {
        let evaluator = math("a * b");
        let mut variables = Variables::new();
        variables.insert("a", 3.0);
        variables.insert("b", 4.0);
        assert_eq!(evaluator.evaluate(&variables), Ok(12.0));
        assert_eq!(evaluator.evaluate(&variables.clone()), Ok(12.0));

        variables.insert("b", 5.0);
        assert_eq!(evaluator.evaluate(&variables), Ok(15.0));

        // An extra key is a different snapshot.
        variables.insert("c", 1.0);
        assert_eq!(evaluator.evaluate(&variables), Ok(15.0));
        assert_eq!(evaluator.evaluate_fast(&variables), Ok(15.0));
    }

    #[test]
    fn failed_evaluations_are_not_cached() {
        let evaluator = math("a + 1");
        let empty = Variables::new();
        assert!(evaluator.evaluate(&empty).is_err());
        assert!(evaluator.evaluate(&empty).is_err());
    }

    #[test]
    fn non_cacheable_expressions_reevaluate() {
        let evaluator = math("rand");
        assert!(!evaluator.can_be_cached());
        let empty = Variables::new();
        let results: Vec<f64> = (0..16).map(|_| evaluator.evaluate(&empty).unwrap()).collect();
        assert!(results.iter().all(|r| (0.0..1.0).contains(r)));
        assert!(results.windows(2).any(|w| w[0] != w[1]), "{results:?}");
    }

    #[test]
    fn concurrent_evaluation() {
        let evaluator = math("a * 2 + b");
        let mismatches = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for thread in 0..8 {
                let evaluator = &evaluator;
                let mismatches = &mismatches;
                scope.spawn(move || {
                    for i in 0..200 {
                        let a = (i % 7) as f64;
                        let b = thread as f64;
                        let variables: Variables<f64> =
                            [("a", a), ("b", b)].into_iter().collect();
                        if evaluator.evaluate(&variables) != Ok(a * 2.0 + b) {
                            mismatches.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn batch_evaluation() {
        let evaluator = math("x ^ 2");
        let sets: Vec<Variables<f64>> = (1..=4)
            .map(|i| [("x", i as f64)].into_iter().collect())
            .collect();
        assert_eq!(evaluator.evaluate_batch(&sets), Ok(vec![1.0, 4.0, 9.0, 16.0]));

        let mut broken = sets.clone();
        broken.push(Variables::new());
        assert!(evaluator.evaluate_batch(&broken).is_err());
    }
}
