//! Tokenizer and Pratt parser for condition strings such as `phase>=2&corner!=0@is_lastspurt==1`.
//!
//! Comparisons bind tightest (30), then `&` (20), then `@` (10). There are no parentheses.

use crate::conditions::operators::{Comparator, Operator};
use crate::conditions::table::{Condition, ConditionTable};
use crate::conditions::{ConditionError, ParseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(i32),
    Cmp(Comparator),
    And,
    Or,
    Eof,
}

impl Token {
    fn binding_power(&self) -> u8 {
        match self {
            Token::Cmp(_) => 30,
            Token::And => 20,
            Token::Or => 10,
            _ => 0,
        }
    }

    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Int(value) => format!("integer {value}"),
            Token::Cmp(cmp) => format!("'{cmp}'"),
            Token::And => "'&'".to_string(),
            Token::Or => "'@'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Splits `input` into tokens paired with their byte offsets. Always ends with `Token::Eof`.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((Token::Ident(input[start..i].to_string()), start));
            }
            b'0'..=b'9' | b'-' => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &input[start..i];
                if text == "-" {
                    return Err(ParseError::UnexpectedChar { ch: '-', pos: start });
                }
                let value = text.parse::<i32>().map_err(|_| ParseError::IntegerOverflow {
                    text: text.to_string(),
                    pos: start,
                })?;
                tokens.push((Token::Int(value), start));
            }
            b'=' | b'!' | b'<' | b'>' => {
                let next_is_eq = bytes.get(i + 1) == Some(&b'=');
                let cmp = match (c, next_is_eq) {
                    (b'=', true) => Comparator::Eq,
                    (b'!', true) => Comparator::Ne,
                    (b'<', true) => Comparator::Le,
                    (b'>', true) => Comparator::Ge,
                    (b'<', false) => Comparator::Lt,
                    (b'>', false) => Comparator::Gt,
                    _ => {
                        return Err(ParseError::UnexpectedChar {
                            ch: char::from(c),
                            pos: start,
                        })
                    }
                };
                i += if next_is_eq { 2 } else { 1 };
                tokens.push((Token::Cmp(cmp), start));
            }
            b'&' => {
                i += 1;
                tokens.push((Token::And, start));
            }
            b'@' => {
                i += 1;
                tokens.push((Token::Or, start));
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(ParseError::UnexpectedChar { ch, pos: start });
            }
        }
    }
    tokens.push((Token::Eof, input.len()));
    Ok(tokens)
}

/// Intermediate parse result: operands are only legal in specific positions.
enum Node<'t> {
    Condition(String, &'t dyn Condition),
    Int(i32),
    Op(Operator<'t>),
}

struct Parser<'t, 's> {
    table: &'t ConditionTable,
    tokens: &'s [(Token, usize)],
    cursor: usize,
}

impl<'t, 's> Parser<'t, 's> {
    fn peek(&self) -> &(Token, usize) {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> (Token, usize) {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    fn unexpected(token: &Token, pos: usize, expected: &'static str) -> ConditionError {
        ParseError::UnexpectedToken {
            found: token.describe(),
            pos,
            expected,
        }
        .into()
    }

    fn nud(&mut self) -> Result<Node<'t>, ConditionError> {
        let (token, pos) = self.advance();
        match token {
            Token::Ident(name) => {
                let condition = self
                    .table
                    .get(&name)
                    .ok_or_else(|| ConditionError::UnknownCondition(name.clone()))?;
                Ok(Node::Condition(name, condition))
            }
            Token::Int(value) => Ok(Node::Int(value)),
            other => Err(Self::unexpected(&other, pos, "a condition name or integer")),
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<Node<'t>, ConditionError> {
        let mut lhs = self.nud()?;
        loop {
            let bp = self.peek().0.binding_power();
            if bp <= min_bp {
                break;
            }
            let (op, op_pos) = self.advance();
            lhs = self.led(op, op_pos, lhs, bp)?;
        }
        Ok(lhs)
    }

    fn led(&mut self, op: Token, op_pos: usize, lhs: Node<'t>, bp: u8) -> Result<Node<'t>, ConditionError> {
        let rhs_pos = self.peek().1;
        match op {
            Token::Cmp(cmp) => {
                let Node::Condition(name, condition) = lhs else {
                    return Err(Self::unexpected(&Token::Cmp(cmp), op_pos, "a condition name before a comparator"));
                };
                match self.expression(bp)? {
                    Node::Int(arg) => Ok(Node::Op(Operator::Compare {
                        name,
                        condition,
                        cmp,
                        arg,
                    })),
                    _ => Err(Self::unexpected(&self.tokens[self.cursor - 1].0, rhs_pos, "an integer")),
                }
            }
            Token::And | Token::Or => {
                let Node::Op(left) = lhs else {
                    return Err(Self::unexpected(&op, op_pos, "a comparison before the operator"));
                };
                let Node::Op(right) = self.expression(bp)? else {
                    return Err(Self::unexpected(&self.tokens[self.cursor - 1].0, rhs_pos, "a comparison"));
                };
                let combined = if op == Token::And {
                    Operator::and(left, right)?
                } else {
                    Operator::or(left, right)?
                };
                Ok(Node::Op(combined))
            }
            other => Err(Self::unexpected(&other, op_pos, "an operator")),
        }
    }
}

/// Parses `input` against the named conditions in `table`.
pub fn parse<'t>(input: &str, table: &'t ConditionTable) -> Result<Operator<'t>, ConditionError> {
    let tokens = tokenize(input)?;
    if tokens.len() == 1 {
        return Err(ParseError::Empty.into());
    }
    let mut parser = Parser {
        table,
        tokens: &tokens,
        cursor: 0,
    };
    let node = parser.expression(0)?;
    let (trailing, pos) = parser.peek().clone();
    if trailing != Token::Eof {
        return Err(Parser::unexpected(&trailing, pos, "end of input"));
    }
    match node {
        Node::Op(op) => Ok(op),
        _ => Err(ParseError::UnexpectedToken {
            found: "a bare operand".to_string(),
            pos: 0,
            expected: "a comparison",
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_all_operators() {
        let tokens: Vec<Token> = tokenize("a==1&b!=-2@c<3&d<=4&e>5&f>=6")
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(tokens[1], Token::Cmp(Comparator::Eq));
        assert_eq!(tokens[6], Token::Int(-2));
        assert_eq!(tokens[7], Token::Or);
        assert!(tokens.contains(&Token::Cmp(Comparator::Le)));
        assert!(tokens.contains(&Token::Cmp(Comparator::Ge)));
        assert_eq!(tokens.last(), Some(&Token::Eof));
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(matches!(
            tokenize("phase==1|corner==0"),
            Err(ParseError::UnexpectedChar { ch: '|', pos: 8 })
        ));
        assert!(matches!(tokenize("phase=1"), Err(ParseError::UnexpectedChar { ch: '=', .. })));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let table = ConditionTable::standard();
        let op = parse("phase==1@phase==2&corner!=0", &table).unwrap();
        assert_eq!(format!("{op:?}"), "(phase==1 @ (phase==2 & corner!=0))");
        let op = parse("phase==1&corner!=0@phase==2", &table).unwrap();
        assert_eq!(format!("{op:?}"), "((phase==1 & corner!=0) @ phase==2)");
    }

    #[test]
    fn chains_are_left_associative() {
        let table = ConditionTable::standard();
        let op = parse("phase>=1&corner!=0&hp_per<=50", &table).unwrap();
        assert_eq!(format!("{op:?}"), "((phase>=1 & corner!=0) & hp_per<=50)");
    }

    #[test]
    fn malformed_inputs_are_parse_errors() {
        let table = ConditionTable::standard();
        for input in ["", "phase==", "==1", "phase==corner", "1==1", "phase==1&", "phase==1 2", "phase"] {
            let err = parse(input, &table).unwrap_err();
            assert!(matches!(err, ConditionError::Parse(_)), "{input}: {err:?}");
        }
    }

    #[test]
    fn unknown_condition_is_reported_by_name() {
        let table = ConditionTable::standard();
        assert_eq!(
            parse("warp_speed==9", &table).unwrap_err(),
            ConditionError::UnknownCondition("warp_speed".into())
        );
    }

    #[test]
    fn straight_and_all_corner_cannot_combine() {
        let table = ConditionTable::standard();
        let err = parse("straight_random==1&all_corner_random==1", &table).unwrap_err();
        assert!(matches!(err, ConditionError::IncompatiblePolicies { .. }));
    }
}
