//! Truth-table expression parser using nom
//!
//! Grammar:
//! ```text
//! or_expr   := xor_expr ('|' xor_expr)*
//! xor_expr  := and_expr ('^' and_expr)*
//! and_expr  := not_expr ('&' not_expr)*
//! not_expr  := '!' not_expr | atom
//! atom      := '(' or_expr ')' | name
//! name      := [A-Za-z0-9_.:-]+
//! ```
//!
//! `&` binds tighter than `^`, which binds tighter than `|`. The empty string
//! is not part of the grammar: [`compile`] maps it to the "any mask" sentinel.
//!
//! Input nested more than [`MAX_NESTING`] parentheses or negations deep, or
//! producing a tree taller than [`MAX_DEPTH`], is rejected with
//! [`ParseError::NestingTooDeep`].

use crate::ast::*;
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{cut, map},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};
use thiserror::Error;

/// Parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unbalanced parentheses at offset {offset}")]
    UnbalancedParentheses { offset: usize },

    #[error("Missing operand at offset {offset}")]
    MissingOperand { offset: usize },

    #[error("Invalid token '{token}' at offset {offset}")]
    InvalidToken { token: String, offset: usize },

    #[error("Expression nested too deeply at offset {offset}")]
    NestingTooDeep { offset: usize },
}

/// Maximum count of open parentheses and negations around any operand
pub const MAX_NESTING: usize = 128;

/// Maximum height of a parsed expression tree
pub const MAX_DEPTH: usize = 1024;

impl ParseError {
    /// Byte offset into the source where the error was detected
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnbalancedParentheses { offset }
            | ParseError::MissingOperand { offset }
            | ParseError::InvalidToken { offset, .. }
            | ParseError::NestingTooDeep { offset } => *offset,
        }
    }
}

/// Compile an expression string.
///
/// An empty or all-whitespace string compiles to the sentinel that ORs every
/// supplied mask.
pub fn compile(input: &str) -> Result<CompiledExpression, ParseError> {
    if input.trim().is_empty() {
        tracing::debug!("compiled empty expression as OR of all masks");
        return Ok(CompiledExpression::new(input, CompiledKind::AnyMask));
    }

    let tree = parse_expression(input)?;
    tracing::debug!(expression = input, tree = %tree, "compiled expression");
    Ok(CompiledExpression::new(input, CompiledKind::Tree(tree)))
}

/// Parse a non-empty expression into a tree
pub fn parse_expression(input: &str) -> Result<MaskExpr, ParseError> {
    check_parentheses(input)?;

    match or_expr(input, 0) {
        Ok(("", parsed)) => Ok(parsed.expr),
        Ok((remaining, _)) => Err(classify(input, remaining)),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => {
            Err(ParseError::NestingTooDeep {
                offset: input.len() - e.input.len(),
            })
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(classify(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::MissingOperand {
            offset: input.len(),
        }),
    }
}

/// Reject unbalanced parentheses before handing the input to nom
fn check_parentheses(input: &str) -> Result<(), ParseError> {
    let mut open = Vec::new();
    for (offset, c) in input.char_indices() {
        match c {
            '(' => open.push(offset),
            ')' => {
                if open.pop().is_none() {
                    return Err(ParseError::UnbalancedParentheses { offset });
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(offset) => Err(ParseError::UnbalancedParentheses { offset }),
        None => Ok(()),
    }
}

/// Turn the position where parsing stopped into a parse error
fn classify(source: &str, remaining: &str) -> ParseError {
    let rest = remaining.trim_start();
    let offset = source.len() - rest.len();

    match rest.chars().next() {
        None | Some('&') | Some('|') | Some('^') | Some(')') => {
            ParseError::MissingOperand { offset }
        }
        Some(c) if is_name_char(c) => ParseError::InvalidToken {
            token: rest.chars().take_while(|&c| is_name_char(c)).collect(),
            offset,
        },
        Some(c) => ParseError::InvalidToken {
            token: c.to_string(),
            offset,
        },
    }
}

/// Parse whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// A subtree together with its height
struct Parsed {
    expr: MaskExpr,
    height: usize,
}

impl Parsed {
    fn leaf(name: &str) -> Self {
        Parsed {
            expr: MaskExpr::name(name),
            height: 1,
        }
    }

    fn join(self, right: Parsed, op: fn(MaskExpr, MaskExpr) -> MaskExpr) -> Option<Self> {
        let height = self.height.max(right.height) + 1;
        (height <= MAX_DEPTH).then(|| Parsed {
            expr: op(self.expr, right.expr),
            height,
        })
    }

    fn negate(self) -> Option<Self> {
        let height = self.height + 1;
        (height <= MAX_DEPTH).then(|| Parsed {
            expr: MaskExpr::not(self.expr),
            height,
        })
    }
}

fn too_deep(input: &str) -> nom::Err<NomError<&str>> {
    nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge))
}

/// Parse a left-associative chain of one binary operator
fn chain<'a>(
    input: &'a str,
    nesting: usize,
    op: char,
    operand: fn(&'a str, usize) -> IResult<&'a str, Parsed>,
    join: fn(MaskExpr, MaskExpr) -> MaskExpr,
) -> IResult<&'a str, Parsed> {
    let (input, first) = operand(input, nesting)?;
    let (rest_input, rest) = many0(preceded(
        ws(char(op)),
        cut(move |i: &'a str| operand(i, nesting)),
    ))(input)?;

    let result = rest
        .into_iter()
        .try_fold(first, |left, right| left.join(right, join))
        .ok_or_else(|| too_deep(input))?;
    Ok((rest_input, result))
}

/// Parse OR expressions
fn or_expr(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    chain(input, nesting, '|', xor_expr, MaskExpr::or)
}

/// Parse XOR expressions
fn xor_expr(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    chain(input, nesting, '^', and_expr, MaskExpr::xor)
}

/// Parse AND expressions
fn and_expr(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    chain(input, nesting, '&', not_expr, MaskExpr::and)
}

/// Parse NOT expressions
fn not_expr(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    if nesting > MAX_NESTING {
        return Err(too_deep(input));
    }
    alt((
        move |i| negation(i, nesting),
        move |i| atom(i, nesting),
    ))(input)
}

fn negation(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    let (rest, inner) = preceded(ws(char('!')), cut(move |i| not_expr(i, nesting + 1)))(input)?;
    let negated = inner.negate().ok_or_else(|| too_deep(input))?;
    Ok((rest, negated))
}

/// Parse atomic expressions
fn atom(input: &str, nesting: usize) -> IResult<&str, Parsed> {
    ws(alt((
        delimited(
            char('('),
            cut(move |i| or_expr(i, nesting + 1)),
            cut(char(')')),
        ),
        map(name, Parsed::leaf),
    )))(input)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// Parse a mask name
fn name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn n(name: &str) -> MaskExpr {
        MaskExpr::name(name)
    }

    #[test]
    fn test_parse_single_name() {
        assert_eq!(parse_expression("  node0 ").unwrap(), n("node0"));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let tree = parse_expression("A & B | C & D").unwrap();
        assert_eq!(
            tree,
            MaskExpr::or(MaskExpr::and(n("A"), n("B")), MaskExpr::and(n("C"), n("D")))
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let tree = parse_expression("A & (B | (C & D))").unwrap();
        assert_eq!(
            tree,
            MaskExpr::and(n("A"), MaskExpr::or(n("B"), MaskExpr::and(n("C"), n("D"))))
        );
    }

    #[test]
    fn test_xor_between_and_and_or() {
        let tree = parse_expression("A | B ^ C & D").unwrap();
        assert_eq!(
            tree,
            MaskExpr::or(n("A"), MaskExpr::xor(n("B"), MaskExpr::and(n("C"), n("D"))))
        );
    }

    #[test]
    fn test_not_binds_tightest() {
        let tree = parse_expression("!A & B").unwrap();
        assert_eq!(tree, MaskExpr::and(MaskExpr::not(n("A")), n("B")));

        let tree = parse_expression("!!A").unwrap();
        assert_eq!(tree, MaskExpr::not(MaskExpr::not(n("A"))));
    }

    #[test]
    fn test_operators_are_left_associative() {
        let tree = parse_expression("A|B|C").unwrap();
        assert_eq!(tree, MaskExpr::or(MaskExpr::or(n("A"), n("B")), n("C")));
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            parse_expression("A&(B|C)").unwrap(),
            parse_expression(" A \t&\n( B |  C ) ").unwrap()
        );
    }

    #[test]
    fn test_compile_empty_is_any_mask() {
        assert!(compile("").unwrap().is_any_mask());
        assert!(compile("   ").unwrap().is_any_mask());
        assert_eq!(compile("   ").unwrap().source(), "   ");
    }

    #[test]
    fn test_compile_collects_names() {
        let compiled = compile("b & (a | !b)").unwrap();
        let names: Vec<_> = compiled.referenced_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(compiled.references("a"));
        assert!(!compiled.references("c"));
    }

    #[rstest]
    #[case("(A & B", 0)]
    #[case("A & B)", 5)]
    #[case("((A)", 0)]
    fn test_unbalanced_parentheses(#[case] input: &str, #[case] offset: usize) {
        assert_eq!(
            parse_expression(input),
            Err(ParseError::UnbalancedParentheses { offset })
        );
    }

    #[rstest]
    #[case("A &")]
    #[case("A | | B")]
    #[case("()")]
    #[case("& A")]
    #[case("!")]
    #[case("A & (B |)")]
    fn test_missing_operand(#[case] input: &str) {
        assert!(matches!(
            parse_expression(input),
            Err(ParseError::MissingOperand { .. })
        ));
    }

    #[rstest]
    #[case::parentheses(format!("{}A{}", "(".repeat(10_000), ")".repeat(10_000)))]
    #[case::negations(format!("{}A", "!".repeat(10_000)))]
    #[case::mixed(format!("{}A{}", "!(".repeat(5_000), ")".repeat(5_000)))]
    #[case::long_chain(vec!["A"; 5_000].join(" | "))]
    fn test_deep_nesting_is_rejected(#[case] input: String) {
        assert!(matches!(
            parse_expression(&input),
            Err(ParseError::NestingTooDeep { .. })
        ));
        assert!(matches!(
            compile(&input),
            Err(ParseError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_nesting_within_limit_parses() {
        let depth = MAX_NESTING / 2;
        let input = format!("{}A{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_expression(&input).unwrap(), n("A"));

        let negated = parse_expression(&format!("{}A", "!".repeat(depth))).unwrap();
        assert!(matches!(negated, MaskExpr::Not(_)));

        let chain = vec!["A"; MAX_DEPTH / 2].join(" & ");
        assert!(parse_expression(&chain).is_ok());
    }

    #[rstest]
    #[case("A $ B", "$")]
    #[case("A B", "B")]
    #[case("A && B", "&")]
    #[case("(A B)", "B")]
    fn test_invalid_token(#[case] input: &str, #[case] token: &str) {
        match parse_expression(input) {
            Err(ParseError::InvalidToken { token: t, .. }) => assert_eq!(t, token),
            // `&&` leaves a dangling operator which reads as a missing operand
            Err(ParseError::MissingOperand { .. }) if token == "&" => {}
            other => panic!("Expected invalid token, got {:?}", other),
        }
    }
}
