/// An `f64`-valued expression.
#[derive(Clone, Debug, PartialEq)]
pub enum MathExpression {
    // Constant.
    Constant(f64),

    // Free variable, lowercased.
    Variable(String),

    // Live value read from the frame clock.
    SystemVariable(SystemVariable),

    // Unary real ops.
    Neg(Box<MathExpression>),

    // Binary real ops.
    Binary(Box<MathExpression>, MathOperator, Box<MathExpression>),

    // Resolved against the function registry when evaluated.
    FunctionCall(String, Vec<MathExpression>),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MathOperator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl MathOperator {
    pub fn precedence(self) -> u8 {
        match self {
            Self::Pow => 4,
            Self::Mul | Self::Div => 3,
            Self::Add | Self::Sub => 2,
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
            Self::Pow => lhs.powf(rhs),
        }
    }
}

/// A `bool`-valued expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BoolExpression {
    // Constant.
    Constant(bool),

    // Free variable, lowercased.
    Variable(String),

    // Unary logic.
    Not(Box<BoolExpression>),

    // Binary logic.
    Binary(Box<BoolExpression>, BoolOperator, Box<BoolExpression>),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BoolOperator {
    And,
    Or,
    Equal,
    NotEqual,
}

impl BoolOperator {
    pub fn precedence(self) -> u8 {
        match self {
            Self::Equal | Self::NotEqual => 3,
            Self::And => 2,
            Self::Or => 1,
        }
    }
}

/// Values supplied by the host's frame loop rather than by the caller.
///
/// Any expression that reads one of these can never reuse a cached result.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SystemVariable {
    /// `t`: seconds since startup.
    Time,
    /// `dt`: duration of the last frame.
    DeltaTime,
    /// `fps`: `1 / dt`.
    FramesPerSecond,
    /// `frame`: number of frames rendered.
    Frame,
    /// `rand`: uniform in `[0, 1)`.
    Random,
    /// `ft`: fixed-step time.
    FixedTime,
    /// `fdt`: fixed-step delta.
    FixedDeltaTime,
}
