//! Expression-backed values as the editor binds them: the author writes the
//! expression text, the host attaches bound variables and supplies positional
//! inputs on every evaluation.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::cache::{Language, ParsedExpression};
use crate::error::ExpressionError;
use crate::evaluate::Variables;
use crate::expression::{BoolExpression, MathExpression};

/// Key that always receives the first positional input.
pub const INPUT_VARIABLE: &str = "input";

#[derive(Clone)]
enum Source<V> {
    Constant(V),
    Live(Arc<dyn Fn() -> V + Send + Sync>),
}

/// A named value supplied by the host.
#[derive(Clone)]
pub struct BoundVariable<V> {
    name: String,
    source: Source<V>,
}

impl<V: Copy> BoundVariable<V> {
    pub fn constant(name: impl Into<String>, value: V) -> Self {
        Self {
            name: name.into(),
            source: Source::Constant(value),
        }
    }

    /// A variable re-read every time the expression is evaluated.
    pub fn live(name: impl Into<String>, read: impl Fn() -> V + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            source: Source::Live(Arc::new(read)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> V {
        match &self.source {
            Source::Constant(value) => *value,
            Source::Live(read) => read(),
        }
    }
}

impl<V: Copy + fmt::Debug> fmt::Debug for BoundVariable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BoundVariable");
        s.field("name", &self.name);
        match &self.source {
            Source::Constant(value) => s.field("value", value),
            Source::Live(_) => s.field("value", &"<live>"),
        };
        s.finish()
    }
}

/// An expression of language `T` bound to host values.
pub struct ExpressionValue<T: Language> {
    label: String,
    expression: String,
    variables: Vec<BoundVariable<T::Value>>,
    input_names: Vec<String>,
    parsed: OnceCell<Arc<ParsedExpression<T>>>,
}

/// A numeric expression value.
pub type MathExpressionValue = ExpressionValue<MathExpression>;

/// A boolean expression value.
pub type BoolExpressionValue = ExpressionValue<BoolExpression>;

impl<T: Language> ExpressionValue<T> {
    /// `input_names` declares the positional input slots, in order.
    pub fn new<S: Into<String>>(
        label: impl Into<String>,
        input_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            label: label.into(),
            expression: String::new(),
            variables: Vec::new(),
            input_names: input_names.into_iter().map(Into::into).collect(),
            parsed: OnceCell::new(),
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn with_variable(mut self, variable: BoundVariable<T::Value>) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Replaces the source text. The previously parsed expression stays in use
    /// until [`Self::invalidate`] is called.
    pub fn set_expression(&mut self, expression: impl Into<String>) {
        self.expression = expression.into();
    }

    pub fn variables(&self) -> &[BoundVariable<T::Value>] {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: Vec<BoundVariable<T::Value>>) {
        self.variables = variables;
    }

    pub fn push_variable(&mut self, variable: BoundVariable<T::Value>) {
        self.variables.push(variable);
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Forces the next evaluation to resolve the expression text again.
    pub fn invalidate(&mut self) {
        self.parsed.take();
    }

    /// The parsed expression, resolving it through the shared factory on
    /// first use.
    pub fn parsed(&self) -> Result<&Arc<ParsedExpression<T>>, ExpressionError> {
        self.parsed.get_or_try_init(|| {
            ParsedExpression::<T>::get_or_parse(&self.expression).map_err(|source| {
                tracing::warn!(
                    label = %self.label,
                    expression = %self.expression,
                    error = %source,
                    "failed to parse expression"
                );
                ExpressionError::InvalidExpression {
                    label: self.label.clone(),
                    source,
                }
            })
        })
    }

    /// Free variables of the expression, in the order bound variables are
    /// paired with them.
    pub fn variable_names(&self) -> Result<&[String], ExpressionError> {
        Ok(self.parsed()?.variable_names())
    }

    pub fn can_be_cached(&self) -> Result<bool, ExpressionError> {
        Ok(self.parsed()?.can_be_cached())
    }

    /// True when the expression parses and every free variable receives a
    /// value from either a bound variable or a declared input.
    ///
    /// [`INPUT_VARIABLE`] counts as supplied only when at least one input is
    /// declared. Callers passing fewer inputs than declared can still fail.
    pub fn is_valid(&self) -> bool {
        let Ok(parsed) = self.parsed() else {
            return false;
        };
        let has_inputs = !self.input_names.is_empty();
        parsed
            .variable_names()
            .iter()
            .enumerate()
            .all(|(i, name)| {
                i < self.variables.len()
                    || (has_inputs && name == INPUT_VARIABLE)
                    || self.input_names.iter().any(|n| n.eq_ignore_ascii_case(name))
            })
    }

    /// Evaluates through the shared, thread-safe result cache.
    pub fn evaluate(&self, inputs: &[T::Value]) -> Result<T::Value, ExpressionError> {
        let parsed = self.parsed()?;
        let variables = self.bind(parsed, inputs);
        Ok(parsed.evaluate(&variables)?)
    }

    /// Evaluates without the result cache.
    pub fn evaluate_fast(&self, inputs: &[T::Value]) -> Result<T::Value, ExpressionError> {
        let parsed = self.parsed()?;
        let variables = self.bind(parsed, inputs);
        Ok(parsed.evaluate_fast(&variables)?)
    }

    /// Bound variables pair with free variables by position in the sorted
    /// name list, not by their own names.
    fn bind(&self, parsed: &ParsedExpression<T>, inputs: &[T::Value]) -> Variables<T::Value> {
        let mut variables = Variables::with_capacity(
            parsed.variable_names().len() + self.input_names.len() + 1,
        );
        for (name, variable) in parsed.variable_names().iter().zip(&self.variables) {
            variables.insert(name, variable.value());
        }
        for (name, value) in self.input_names.iter().zip(inputs) {
            variables.insert(name, *value);
        }
        if let Some(first) = inputs.first() {
            variables.insert(INPUT_VARIABLE, *first);
        }
        variables
    }
}

impl<T: Language> fmt::Debug for ExpressionValue<T>
where
    T::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionValue")
            .field("label", &self.label)
            .field("expression", &self.expression)
            .field("variables", &self.variables)
            .field("input_names", &self.input_names)
            .finish_non_exhaustive()
    }
}
