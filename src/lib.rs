//! Cached math and boolean expression parser/evaluator.
//!
//! # Why?
//!
//! Inspector fields bound to runtime data often need a small formula between
//! the source value and the field: `clamp(speed * 2, 0, max_speed)`, or
//! `enabled && !locked`. The same handful of formulas is evaluated every
//! frame from many places, so parsing happens once per distinct source text
//! ([`ParserFactory`]) and each parsed expression remembers its last result
//! for the last set of variables ([`Evaluator`]).
//!
//! Two languages are provided:
//!
//! - [`MathExpression`]: `f64` arithmetic with `+ - * / ^`, the constants `pi`
//!   and `e`, the frame-clock system variables `t dt fps frame rand ft fdt`
//!   and functions from [`functions`].
//! - [`BoolExpression`]: `&& || == != !` (or `and or equals notequals not`),
//!   `true`, `false`.
//!
//! Identifiers are case-insensitive. All binary operators are
//! left-associative, so `2 ^ 3 ^ 2` is `64`.
//!
//! # Example
//!
//! ```rust
//! use binding_expr::*;
//!
//! let parsed = ParsedExpression::<MathExpression>::get_or_parse("2 * (foo + bar) * baz").unwrap();
//! assert_eq!(parsed.variable_names(), ["bar", "baz", "foo"]);
//!
//! let variables: Variables<f64> = [("Foo", 7.0), ("bar", 1.0), ("baz", 4.0)]
//!     .into_iter()
//!     .collect();
//! assert_eq!(parsed.evaluate(&variables), Ok(64.0));
//!
//! let gate = BoolExpressionValue::new("gate", ["open"])
//!     .with_expression("open AND NOT locked")
//!     .with_variable(BoundVariable::constant("locked", false));
//! assert_eq!(gate.evaluate(&[true]), Ok(true));
//! ```

mod cache;
pub mod clock;
mod error;
mod evaluate;
mod expression;
pub mod functions;
mod parse;
mod token;
mod value;

pub use cache::*;
pub use error::*;
pub use evaluate::*;
pub use expression::*;
pub use parse::{BoolParser, MathParser, ParseOutput, MAX_NESTING_DEPTH, MAX_TREE_HEIGHT};
pub use token::*;
pub use value::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn math(input: &str, variables: &[(&str, f64)]) -> Result<f64, EvalError> {
        let parsed = ParsedExpression::<MathExpression>::get_or_parse(input).unwrap();
        parsed.evaluate(&variables.iter().copied().collect())
    }

    fn boolean(input: &str, variables: &[(&str, bool)]) -> Result<bool, EvalError> {
        let parsed = ParsedExpression::<BoolExpression>::get_or_parse(input).unwrap();
        parsed.evaluate(&variables.iter().copied().collect())
    }

    #[test]
    fn op_precedence() {
        assert_eq!(math("2 + 3 * 4", &[]), Ok(14.0));
        assert_eq!(math("(2 + 3) * 4", &[]), Ok(20.0));
        assert_eq!(math("1 * 2 + 3 * 4", &[]), Ok(14.0));
        assert_eq!(math("8 / 4 * 3", &[]), Ok(6.0));
        // Exponentiation climbs left to right like every other operator.
        assert_eq!(math("2 ^ 3 ^ 2", &[]), Ok(64.0));
        assert_eq!(math("4 ^ 3 ^ 2", &[]), Ok(4096.0));
    }

    #[test]
    fn variable_binding() {
        assert_eq!(boolean("a && !b", &[("a", true), ("b", false)]), Ok(true));
        assert_eq!(boolean("a && !b", &[("a", false), ("b", true)]), Ok(false));
        assert!(boolean("a && c", &[("a", true), ("b", false)]).is_err());
    }

    #[test]
    fn function_dispatch() {
        assert_eq!(math("clamp(5, 0, 3)", &[]), Ok(3.0));
        assert_eq!(math("lerp(0, 10, 0.5)", &[]), Ok(5.0));
        assert_eq!(math("max(1,5,3)", &[]), Ok(5.0));
        assert_eq!(math("floor(pi) + ceil(E - 1)", &[]), Ok(5.0));

        let parsed = ParsedExpression::<MathExpression>::get_or_parse("foo(1)");
        assert!(parsed.is_ok());
        assert_eq!(
            math("foo(1)", &[]),
            Err(EvalError::FunctionNotDefined { name: "foo".into() })
        );
    }

    #[test]
    fn case_insensitivity() {
        let trees: Vec<_> = ["A AND B", "a && b", "A && B"]
            .into_iter()
            .map(|input| ParsedExpression::<BoolExpression>::get_or_parse(input).unwrap())
            .collect();
        for parsed in &trees {
            assert_eq!(parsed.tree(), trees[0].tree());
            assert_eq!(parsed.variable_names(), ["a", "b"]);
        }
        for (a, b) in [(true, true), (true, false), (false, true)] {
            let variables: Variables<bool> = [("A", a), ("b", b)].into_iter().collect();
            for parsed in &trees {
                assert_eq!(parsed.evaluate(&variables), Ok(a && b));
            }
        }
    }

    #[test]
    fn idempotence() {
        let first = ParsedExpression::<MathExpression>::get_or_parse("sqrt(x) * y + 0.1").unwrap();
        let second = ParsedExpression::<MathExpression>::get_or_parse("sqrt(x) * y + 0.1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let variables: Variables<f64> = [("x", 2.0), ("y", 3.0)].into_iter().collect();
        let cached = first.evaluate(&variables).unwrap();
        let again = second.evaluate(&variables).unwrap();
        let fast = first.evaluate_fast(&variables).unwrap();
        assert_eq!(cached.to_bits(), again.to_bits());
        assert_eq!(cached.to_bits(), fast.to_bits());
    }

    #[test]
    fn system_variables_read_the_installed_clock() {
        let frames = Arc::new(clock::ManualClock::new(0.5));
        clock::set_clock(frames.clone());
        frames.advance(0.25);

        let parsed = ParsedExpression::<MathExpression>::get_or_parse("t * 2 + a").unwrap();
        assert!(!parsed.can_be_cached());
        let variables: Variables<f64> = [("a", 1.0)].into_iter().collect();
        assert_eq!(parsed.evaluate(&variables), Ok(1.5));

        frames.advance(0.5);
        assert_eq!(parsed.evaluate(&variables), Ok(2.5));

        assert_eq!(math("dt", &[]), Ok(0.5));
        assert_eq!(math("fps", &[]), Ok(2.0));
        assert_eq!(math("frame", &[]), Ok(2.0));
        assert_eq!(math("ft", &[]), Ok(0.5));
        assert_eq!(math("fdt", &[]), Ok(0.5));

        clock::set_clock(Arc::new(clock::WallClock::default()));
    }

    #[test]
    fn round_trip_on_reparse() {
        let mut value = MathExpressionValue::new("round trip", ["v"]).with_expression("v + 100");
        assert_eq!(value.evaluate(&[1.0]), Ok(101.0));
        value.invalidate();
        value.set_expression("v - 100");
        assert_eq!(value.evaluate(&[1.0]), Ok(-99.0));
    }

    #[test]
    fn boundary_inputs_fail_to_parse() {
        for input in ["", "   ", "(2+3"] {
            let err = ParsedExpression::<MathExpression>::get_or_parse(input).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::Syntax, "{input:?}");
            assert_eq!(err.position, input.len(), "{input:?}");
        }

        let value = MathExpressionValue::new("empty", ["x"]);
        assert!(matches!(
            value.evaluate(&[1.0]),
            Err(ExpressionError::InvalidExpression { .. })
        ));
    }
}
