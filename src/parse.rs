use std::collections::BTreeSet;

use crate::error::ParseError;
use crate::expression::{BoolExpression, BoolOperator, MathExpression, MathOperator};
use crate::functions;
use crate::token::{BoolTokenKind, BoolTokenizer, MathTokenKind, MathTokenizer, Token};

/// Parentheses, unary operators and call arguments may nest this deep.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Longest root-to-leaf path allowed in a parsed tree. Evaluation and drop
/// recurse once per level.
pub const MAX_TREE_HEIGHT: usize = 512;

/// Everything the parser learns about one source text.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseOutput<T> {
    pub tree: T,
    /// Lowercased free variables, sorted and deduplicated.
    pub variable_names: Vec<String>,
    /// False once any system variable or volatile function is referenced.
    pub can_be_cached: bool,
}

impl MathExpression {
    /// Parse an arithmetic expression from `input`.
    pub fn parse(input: &str) -> Result<ParseOutput<Self>, ParseError> {
        MathParser::new(input).parse()
    }

    pub fn parse_variable_names(input: &str) -> Result<Vec<String>, ParseError> {
        Ok(Self::parse(input)?.variable_names)
    }
}

impl BoolExpression {
    /// Parse a boolean expression from `input`.
    pub fn parse(input: &str) -> Result<ParseOutput<Self>, ParseError> {
        BoolParser::new(input).parse()
    }

    pub fn parse_variable_names(input: &str) -> Result<Vec<String>, ParseError> {
        Ok(Self::parse(input)?.variable_names)
    }
}

fn math_operator(kind: MathTokenKind) -> Option<MathOperator> {
    match kind {
        MathTokenKind::Plus => Some(MathOperator::Add),
        MathTokenKind::Minus => Some(MathOperator::Sub),
        MathTokenKind::Star => Some(MathOperator::Mul),
        MathTokenKind::Slash => Some(MathOperator::Div),
        MathTokenKind::Caret => Some(MathOperator::Pow),
        _ => None,
    }
}

fn bool_operator(kind: BoolTokenKind) -> Option<BoolOperator> {
    match kind {
        BoolTokenKind::And => Some(BoolOperator::And),
        BoolTokenKind::Or => Some(BoolOperator::Or),
        BoolTokenKind::Equals => Some(BoolOperator::Equal),
        BoolTokenKind::NotEquals => Some(BoolOperator::NotEqual),
        _ => None,
    }
}

fn unexpected<K>(token: &Token<'_, K>, end_of_input: bool) -> ParseError {
    if end_of_input {
        ParseError::syntax(token.position, "Unexpected end of expression")
    } else {
        ParseError::syntax(token.position, format!("Unexpected token '{}'", token.text))
    }
}

fn too_deep() -> ParseError {
    ParseError::unknown(format!(
        "Expression nesting exceeds {MAX_NESTING_DEPTH} levels"
    ))
}

/// Height of a node whose tallest child is `child_height` high.
fn grow(child_height: usize) -> Result<usize, ParseError> {
    let height = child_height + 1;
    if height > MAX_TREE_HEIGHT {
        return Err(ParseError::unknown(format!(
            "Expression tree exceeds {MAX_TREE_HEIGHT} levels"
        )));
    }
    Ok(height)
}

fn unclosed<K>(current: &Token<'_, K>, open_position: usize) -> ParseError {
    ParseError::syntax(
        current.position,
        format!("Expected ')' to close '(' at position {open_position}"),
    )
}

/// A subtree and its height.
type Node<T> = (T, usize);

/// Precedence-climbing parser for arithmetic expressions.
///
/// Every binary operator is left-associative, `^` included.
pub struct MathParser<'a> {
    tokenizer: MathTokenizer<'a>,
    current: Token<'a, MathTokenKind>,
    variables: BTreeSet<String>,
    can_be_cached: bool,
    depth: usize,
}

impl<'a> MathParser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut tokenizer = MathTokenizer::new(input);
        let current = tokenizer.next_token();
        Self {
            tokenizer,
            current,
            variables: BTreeSet::new(),
            can_be_cached: true,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<ParseOutput<MathExpression>, ParseError> {
        let (tree, _) = self.parse_expression(0)?;
        if self.current.kind != MathTokenKind::EndOfInput {
            return Err(unexpected(&self.current, false));
        }
        Ok(ParseOutput {
            tree,
            variable_names: self.variables.into_iter().collect(),
            can_be_cached: self.can_be_cached,
        })
    }

    fn advance(&mut self) -> Token<'a, MathTokenKind> {
        let next = self.tokenizer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Node<MathExpression>, ParseError> {
        let (mut lhs, mut height) = self.parse_unary()?;
        while let Some(op) = math_operator(self.current.kind) {
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            let (rhs, rhs_height) = self.parse_expression(precedence)?;
            height = grow(height.max(rhs_height))?;
            lhs = MathExpression::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok((lhs, height))
    }

    fn parse_unary(&mut self) -> Result<Node<MathExpression>, ParseError> {
        match self.current.kind {
            MathTokenKind::Plus => {
                self.advance();
                self.nested(Self::parse_unary)
            }
            MathTokenKind::Minus => {
                self.advance();
                let (operand, height) = self.nested(Self::parse_unary)?;
                Ok((MathExpression::Neg(Box::new(operand)), grow(height)?))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Node<MathExpression>, ParseError> {
        let token = self.advance();
        match token.kind {
            MathTokenKind::Number => {
                let value = token.text.parse().map_err(|e| {
                    ParseError::number_format(
                        token.position,
                        format!("Invalid number '{}': {e}", token.text),
                    )
                })?;
                Ok((MathExpression::Constant(value), 1))
            }
            MathTokenKind::Identifier => self.parse_identifier(token),
            MathTokenKind::LeftParen => {
                let inner = self.nested(|p| p.parse_expression(0))?;
                if self.current.kind != MathTokenKind::RightParen {
                    return Err(unclosed(&self.current, token.position));
                }
                self.advance();
                Ok(inner)
            }
            kind => Err(unexpected(&token, kind == MathTokenKind::EndOfInput)),
        }
    }

    fn parse_identifier(
        &mut self,
        token: Token<'a, MathTokenKind>,
    ) -> Result<Node<MathExpression>, ParseError> {
        let name = token.text.to_ascii_lowercase();
        let constant = functions::constant(&name);
        let system = functions::system_variable(&name);
        if self.current.kind == MathTokenKind::LeftParen {
            // Unregistered names are resolved at evaluation, except those
            // already taken by a constant or system variable.
            if functions::function(&name).is_none() && (constant.is_some() || system.is_some()) {
                return Err(ParseError::syntax(
                    self.current.position,
                    format!("'{}' is not a function", token.text),
                ));
            }
            let open = self.advance();
            return self.parse_call(name, open.position);
        }
        if let Some(value) = constant {
            return Ok((MathExpression::Constant(value), 1));
        }
        if let Some(system) = system {
            self.can_be_cached = false;
            return Ok((MathExpression::SystemVariable(system), 1));
        }
        self.variables.insert(name.clone());
        Ok((MathExpression::Variable(name), 1))
    }

    fn parse_call(
        &mut self,
        name: String,
        open_position: usize,
    ) -> Result<Node<MathExpression>, ParseError> {
        if functions::is_volatile(&name) {
            self.can_be_cached = false;
        }
        let mut args = Vec::new();
        let mut tallest = 0;
        if self.current.kind == MathTokenKind::RightParen {
            self.advance();
            return Ok((MathExpression::FunctionCall(name, args), grow(tallest)?));
        }
        loop {
            let (arg, height) = self.nested(|p| p.parse_expression(0))?;
            args.push(arg);
            tallest = tallest.max(height);
            match self.current.kind {
                MathTokenKind::Comma => {
                    self.advance();
                    if self.current.kind == MathTokenKind::RightParen {
                        return Err(ParseError::syntax(
                            self.current.position,
                            format!("Trailing comma in arguments of '{name}'"),
                        ));
                    }
                }
                MathTokenKind::RightParen => {
                    self.advance();
                    return Ok((MathExpression::FunctionCall(name, args), grow(tallest)?));
                }
                _ => return Err(unclosed(&self.current, open_position)),
            }
        }
    }
}

/// Precedence-climbing parser for boolean expressions.
pub struct BoolParser<'a> {
    tokenizer: BoolTokenizer<'a>,
    current: Token<'a, BoolTokenKind>,
    variables: BTreeSet<String>,
    depth: usize,
}

impl<'a> BoolParser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut tokenizer = BoolTokenizer::new(input);
        let current = tokenizer.next_token();
        Self {
            tokenizer,
            current,
            variables: BTreeSet::new(),
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<ParseOutput<BoolExpression>, ParseError> {
        let (tree, _) = self.parse_expression(0)?;
        if self.current.kind != BoolTokenKind::EndOfInput {
            return Err(unexpected(&self.current, false));
        }
        Ok(ParseOutput {
            tree,
            variable_names: self.variables.into_iter().collect(),
            can_be_cached: true,
        })
    }

    fn advance(&mut self) -> Token<'a, BoolTokenKind> {
        let next = self.tokenizer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_expression(&mut self, min_precedence: u8) -> Result<Node<BoolExpression>, ParseError> {
        let (mut lhs, mut height) = self.parse_unary()?;
        while let Some(op) = bool_operator(self.current.kind) {
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            let (rhs, rhs_height) = self.parse_expression(precedence)?;
            height = grow(height.max(rhs_height))?;
            lhs = BoolExpression::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok((lhs, height))
    }

    fn parse_unary(&mut self) -> Result<Node<BoolExpression>, ParseError> {
        if self.current.kind == BoolTokenKind::Not {
            self.advance();
            let (operand, height) = self.nested(Self::parse_unary)?;
            return Ok((BoolExpression::Not(Box::new(operand)), grow(height)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node<BoolExpression>, ParseError> {
        let token = self.advance();
        match token.kind {
            BoolTokenKind::True => Ok((BoolExpression::Constant(true), 1)),
            BoolTokenKind::False => Ok((BoolExpression::Constant(false), 1)),
            BoolTokenKind::Identifier => {
                let name = token.text.to_ascii_lowercase();
                self.variables.insert(name.clone());
                Ok((BoolExpression::Variable(name), 1))
            }
            BoolTokenKind::LeftParen => {
                let inner = self.nested(|p| p.parse_expression(0))?;
                if self.current.kind != BoolTokenKind::RightParen {
                    return Err(unclosed(&self.current, token.position));
                }
                self.advance();
                Ok(inner)
            }
            kind => Err(unexpected(&token, kind == BoolTokenKind::EndOfInput)),
        }
    }
}
