use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::error::{EvalError, ParseError};
use crate::evaluate::{Evaluator, ExpressionTree, Variables};
use crate::expression::{BoolExpression, MathExpression};
use crate::parse::ParseOutput;

/// An expression language that can be compiled and shared process-wide.
pub trait Language: ExpressionTree + Sized + 'static {
    fn compile(input: &str) -> Result<ParseOutput<Self>, ParseError>;

    /// The process-wide factory for this language.
    fn factory() -> &'static ParserFactory<Self>;
}

static MATH_EXPRESSIONS: Lazy<ParserFactory<MathExpression>> = Lazy::new(ParserFactory::new);
static BOOL_EXPRESSIONS: Lazy<ParserFactory<BoolExpression>> = Lazy::new(ParserFactory::new);

impl Language for MathExpression {
    fn compile(input: &str) -> Result<ParseOutput<Self>, ParseError> {
        Self::parse(input)
    }

    fn factory() -> &'static ParserFactory<Self> {
        &MATH_EXPRESSIONS
    }
}

impl Language for BoolExpression {
    fn compile(input: &str) -> Result<ParseOutput<Self>, ParseError> {
        Self::parse(input)
    }

    fn factory() -> &'static ParserFactory<Self> {
        &BOOL_EXPRESSIONS
    }
}

/// The unit of compilation: source text plus its evaluator and free
/// variables. Immutable once built, so it is shared behind an [`Arc`].
#[derive(Debug)]
pub struct ParsedExpression<T: ExpressionTree> {
    source: String,
    evaluator: Evaluator<T>,
    variable_names: Vec<String>,
}

impl<T: Language> ParsedExpression<T> {
    /// Compiles `input` without consulting any cache.
    pub fn compile(input: &str) -> Result<Self, ParseError> {
        let ParseOutput {
            tree,
            variable_names,
            can_be_cached,
        } = T::compile(input)?;
        Ok(Self {
            source: input.to_string(),
            evaluator: Evaluator::new(tree, can_be_cached),
            variable_names,
        })
    }

    /// Re-parses `input` and replaces the shared entry.
    pub fn parse(input: &str) -> Result<Arc<Self>, ParseError> {
        T::factory().parse(input)
    }

    /// Returns the shared entry for `input`, parsing it on first use.
    pub fn get_or_parse(input: &str) -> Result<Arc<Self>, ParseError> {
        T::factory().get_or_parse(input)
    }
}

impl<T: ExpressionTree> ParsedExpression<T> {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &T {
        self.evaluator.tree()
    }

    pub fn evaluator(&self) -> &Evaluator<T> {
        &self.evaluator
    }

    /// Lowercased free variables, sorted and deduplicated.
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn can_be_cached(&self) -> bool {
        self.evaluator.can_be_cached()
    }

    pub fn evaluate(&self, variables: &Variables<T::Value>) -> Result<T::Value, EvalError> {
        self.evaluator.evaluate(variables)
    }

    pub fn evaluate_fast(&self, variables: &Variables<T::Value>) -> Result<T::Value, EvalError> {
        self.evaluator.evaluate_fast(variables)
    }
}

/// Maps exact source text to its compiled expression.
///
/// Entries are never evicted.
#[derive(Debug)]
pub struct ParserFactory<T: ExpressionTree> {
    entries: RwLock<HashMap<String, Arc<ParsedExpression<T>>>>,
}

impl<T: Language> Default for ParserFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Language> ParserFactory<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Always re-parses, overwriting any entry for `input`.
    pub fn parse(&self, input: &str) -> Result<Arc<ParsedExpression<T>>, ParseError> {
        let parsed = Arc::new(ParsedExpression::compile(input)?);
        tracing::debug!(
            expression = input,
            variables = ?parsed.variable_names,
            can_be_cached = parsed.can_be_cached(),
            "parsed expression"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(input.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Returns the entry for `input`, parsing and inserting it if absent.
    ///
    /// Two threads racing on the same new text may both parse it; the first
    /// insert wins and both callers receive that entry.
    pub fn get_or_parse(&self, input: &str) -> Result<Arc<ParsedExpression<T>>, ParseError> {
        if let Some(parsed) = self.get(input) {
            return Ok(parsed);
        }
        let parsed = Arc::new(ParsedExpression::compile(input)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(input.to_string()).or_insert_with(|| {
            tracing::debug!(expression = input, "cached new expression");
            parsed
        });
        Ok(entry.clone())
    }

    pub fn get(&self, input: &str) -> Option<Arc<ParsedExpression<T>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(input)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
