//! Name tables for identifiers in math expressions.
//!
//! All keys are lowercase; callers normalize before lookup.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::clock::FrameClock;
use crate::error::EvalError;
use crate::expression::SystemVariable;

/// Signature of a registered math function.
pub type MathFunction = fn(&FunctionArgs) -> Result<f64, EvalError>;

/// Evaluated arguments of one function call.
#[derive(Clone, Copy, Debug)]
pub struct FunctionArgs<'a> {
    name: &'a str,
    values: &'a [f64],
}

impl<'a> FunctionArgs<'a> {
    pub fn new(name: &'a str, values: &'a [f64]) -> Self {
        Self { name, values }
    }

    pub fn get(&self, index: usize) -> Result<f64, EvalError> {
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| EvalError::MissingArgument {
                function: self.name.to_string(),
                index,
                count: self.values.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn fold(&self, op: fn(f64, f64) -> f64) -> Result<f64, EvalError> {
        let first = self.get(0)?;
        Ok(self.values[1..].iter().copied().fold(first, op))
    }
}

pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

pub fn system_variable(name: &str) -> Option<SystemVariable> {
    use SystemVariable::*;
    Some(match name {
        "t" => Time,
        "dt" => DeltaTime,
        "fps" => FramesPerSecond,
        "frame" => Frame,
        "rand" => Random,
        "ft" => FixedTime,
        "fdt" => FixedDeltaTime,
        _ => return None,
    })
}

impl SystemVariable {
    pub fn read(self, clock: &dyn FrameClock) -> f64 {
        match self {
            Self::Time => clock.time(),
            Self::DeltaTime => clock.delta_time(),
            Self::FramesPerSecond => 1.0 / clock.delta_time(),
            Self::Frame => clock.frame_count() as f64,
            Self::Random => rand::random::<f64>(),
            Self::FixedTime => clock.fixed_time(),
            Self::FixedDeltaTime => clock.fixed_delta_time(),
        }
    }
}

/// Functions whose result changes between calls with equal arguments.
pub fn is_volatile(name: &str) -> bool {
    name == "rand"
}

pub fn function(name: &str) -> Option<MathFunction> {
    FUNCTIONS.get(name).copied()
}

static FUNCTIONS: Lazy<HashMap<&'static str, MathFunction>> = Lazy::new(|| {
    let entries: [(&'static str, MathFunction); 21] = [
        ("sin", |a| Ok(a.get(0)?.sin())),
        ("cos", |a| Ok(a.get(0)?.cos())),
        ("tan", |a| Ok(a.get(0)?.tan())),
        ("asin", |a| Ok(a.get(0)?.asin())),
        ("acos", |a| Ok(a.get(0)?.acos())),
        ("atan", |a| Ok(a.get(0)?.atan())),
        ("sqrt", |a| Ok(a.get(0)?.sqrt())),
        ("abs", |a| Ok(a.get(0)?.abs())),
        ("log", |a| {
            let value = a.get(0)?;
            if a.len() >= 2 {
                Ok(value.log(a.get(1)?))
            } else {
                Ok(value.ln())
            }
        }),
        ("mod", |a| Ok(a.get(0)? % a.get(1)?)),
        ("clamp", |a| {
            let (value, low, high) = (a.get(0)?, a.get(1)?, a.get(2)?);
            Ok(value.max(low).min(high))
        }),
        ("max", |a| a.fold(f64::max)),
        ("min", |a| a.fold(f64::min)),
        ("lerp", |a| {
            let (from, to, t) = (a.get(0)?, a.get(1)?, a.get(2)?);
            Ok(from + (to - from) * t)
        }),
        ("round", |a| Ok(a.get(0)?.round_ties_even())),
        ("floor", |a| Ok(a.get(0)?.floor())),
        ("ceil", |a| Ok(a.get(0)?.ceil())),
        ("pow", |a| Ok(a.get(0)?.powf(a.get(1)?))),
        ("exp", |a| Ok(a.get(0)?.exp())),
        ("sign", |a| Ok(sign(a.get(0)?))),
        ("rand", |a| {
            let (low, high) = (a.get(0)?, a.get(1)?);
            Ok(low + (high - low) * rand::random::<f64>())
        }),
    ];
    entries.into_iter().collect()
});

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        // Zero stays zero; NaN stays NaN.
        value * 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[f64]) -> Result<f64, EvalError> {
        function(name).unwrap()(&FunctionArgs::new(name, args))
    }

    #[test]
    fn registered_functions() {
        assert_eq!(call("clamp", &[5.0, 0.0, 3.0]), Ok(3.0));
        assert_eq!(call("clamp", &[-1.0, 0.0, 3.0]), Ok(0.0));
        assert_eq!(call("lerp", &[0.0, 10.0, 0.5]), Ok(5.0));
        assert_eq!(call("max", &[1.0, 5.0, 3.0]), Ok(5.0));
        assert_eq!(call("min", &[4.0, -2.0, 3.0]), Ok(-2.0));
        assert_eq!(call("mod", &[7.0, 3.0]), Ok(1.0));
        assert_eq!(call("mod", &[-7.0, 3.0]), Ok(-1.0));
        assert_eq!(call("log", &[8.0, 2.0]), Ok(3.0));
        assert_eq!(call("log", &[1.0]), Ok(0.0));
        assert_eq!(call("round", &[2.5]), Ok(2.0));
        assert_eq!(call("round", &[3.5]), Ok(4.0));
        assert_eq!(call("sign", &[-4.0]), Ok(-1.0));
        assert_eq!(call("sign", &[0.0]), Ok(0.0));
        assert_eq!(call("pow", &[2.0, 10.0]), Ok(1024.0));
    }

    #[test]
    fn extra_arguments_are_ignored() {
        assert_eq!(call("abs", &[-2.0, 99.0]), Ok(2.0));
    }

    #[test]
    fn missing_argument_is_an_error() {
        assert_eq!(
            call("clamp", &[1.0, 2.0]),
            Err(EvalError::MissingArgument {
                function: "clamp".into(),
                index: 2,
                count: 2
            })
        );
        assert!(call("max", &[]).is_err());
    }

    #[test]
    fn random_range_stays_in_bounds() {
        for _ in 0..100 {
            let value = call("rand", &[2.0, 3.0]).unwrap();
            assert!((2.0..=3.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn tables() {
        assert_eq!(constant("pi"), Some(std::f64::consts::PI));
        assert_eq!(constant("tau"), None);
        assert_eq!(system_variable("fdt"), Some(SystemVariable::FixedDeltaTime));
        assert_eq!(system_variable("time"), None);
        assert!(function("sin").is_some());
        assert!(function("foo").is_none());
    }
}
