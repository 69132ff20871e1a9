//! A small TraceQL-flavored expression parser for the `q=` search parameter:
//! space-separated predicates, with `{ ... }` brace groups scoping a run of
//! predicates to a single span. Grounded on the shape of a real TraceQL
//! parser (tokenize, then recursive-descent over predicates) without
//! attempting that language's full spanset-pipeline grammar.
use crate::predicate::{Op, Predicate, Query, Value};
use crate::QueryError;

pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = tokenize(input)?;
    let mut pos = 0;
    let mut query = Query::default();

    while pos < tokens.len() {
        match &tokens[pos] {
            Token::LBrace => {
                pos += 1;
                let mut group = Vec::new();
                while pos < tokens.len() && tokens[pos] != Token::RBrace {
                    let (predicate, advanced) = parse_predicate(&tokens, pos)?;
                    group.push(predicate);
                    pos = advanced;
                }
                if pos >= tokens.len() {
                    return Err(QueryError::BadPredicate("unterminated `{` group".into()));
                }
                pos += 1; // consume '}'
                if group.is_empty() {
                    return Err(QueryError::BadPredicate("empty `{}` group".into()));
                }
                query.span_groups.push(group);
            }
            Token::RBrace => {
                return Err(QueryError::BadPredicate("unexpected `}`".into()));
            }
            _ => {
                let (predicate, advanced) = parse_predicate(&tokens, pos)?;
                query.trace_scope.push(predicate);
                pos = advanced;
            }
        }
    }

    Ok(query)
}

fn parse_predicate(tokens: &[Token], pos: usize) -> Result<(Predicate, usize), QueryError> {
    let field = match tokens.get(pos) {
        Some(Token::Ident(s)) => s.clone(),
        other => return Err(QueryError::BadPredicate(format!("expected a field name, got {other:?}"))),
    };
    let op = match tokens.get(pos + 1) {
        Some(Token::Op(op)) => *op,
        other => return Err(QueryError::BadPredicate(format!("expected an operator after `{field}`, got {other:?}"))),
    };
    let value = match tokens.get(pos + 2) {
        Some(Token::Str(s)) => Value::Str(s.clone()),
        Some(Token::Num(n)) => {
            if let Ok(i) = n.parse::<i64>() {
                Value::Int(i)
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| QueryError::BadPredicate(format!("invalid numeric literal `{n}`")))?
            }
        }
        Some(Token::Ident(s)) => Value::Str(s.clone()),
        other => return Err(QueryError::BadPredicate(format!("expected a value after `{field} {op:?}`, got {other:?}"))),
    };
    Ok((Predicate { field, op, value }, pos + 3))
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Ident(String),
    Op(Op),
    Str(String),
    Num(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '"' {
                        closed = true;
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(QueryError::BadPredicate("unterminated string literal".into()));
                }
                tokens.push(Token::Str(s));
            }
            '!' | '=' | '>' | '<' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let (op, len) = match two.as_str() {
                    "!=" => (Op::Ne, 2),
                    ">=" => (Op::Gte, 2),
                    "<=" => (Op::Lte, 2),
                    _ => match c {
                        '=' => (Op::Eq, 1),
                        '>' => (Op::Gt, 1),
                        '<' => (Op::Lt, 1),
                        _ => return Err(QueryError::BadPredicate(format!("unexpected operator near `{two}`"))),
                    },
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            _ if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Num(chars[start..i].iter().collect()));
            }
            _ if c.is_alphanumeric() || c == '.' || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(QueryError::BadPredicate(format!("unexpected character `{c}`"))),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_predicates_as_trace_scope() {
        let q = parse(r#"resource.service.name="api" status=error"#).unwrap();
        assert_eq!(q.trace_scope.len(), 2);
        assert!(q.span_groups.is_empty());
    }

    #[test]
    fn parses_a_brace_group() {
        let q = parse(r#"{ span.http.status_code>=500 name="/checkout" }"#).unwrap();
        assert_eq!(q.span_groups.len(), 1);
        assert_eq!(q.span_groups[0].len(), 2);
        assert_eq!(q.span_groups[0][0].op, Op::Gte);
    }

    #[test]
    fn mixes_trace_scope_and_groups() {
        let q = parse(r#"resource.service.name="api" {duration>1000000}"#).unwrap();
        assert_eq!(q.trace_scope.len(), 1);
        assert_eq!(q.span_groups.len(), 1);
    }

    #[test]
    fn empty_input_is_an_empty_query() {
        let q = parse("").unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn unterminated_group_is_an_error() {
        assert!(parse("{status=error").is_err());
    }

    #[test]
    fn missing_operator_is_an_error() {
        assert!(parse("status").is_err());
    }
}
