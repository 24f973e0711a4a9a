//! Algebra syntax lexer using logos

use logos::Logos;

/// Algebra syntax tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Delimiters
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("_")]
    Underscore,

    #[token("^^")]
    DoubleCaret,

    // Operators
    #[token("=")]
    Equals,

    #[token("!=")]
    NotEquals,

    #[token("<")]
    LessThan,

    #[token("<=")]
    LessEquals,

    #[token(">")]
    GreaterThan,

    #[token(">=")]
    GreaterEquals,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("!")]
    Bang,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    // Terms
    #[regex(r"\?[A-Za-z0-9_]+", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r#"<[^<>"{}|^`\\\x00-\x20]*>"#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Iri(String),

    #[regex(r"_:[A-Za-z0-9_\-]+", |lex| lex.slice()[2..].to_string())]
    BlankNode(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(String),

    #[regex(r"@[A-Za-z]+(-[A-Za-z0-9]+)*", |lex| lex.slice()[1..].to_string())]
    LangTag(String),

    #[regex(r"[+-]?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r"[+-]?[0-9]*\.[0-9]+", |lex| lex.slice().to_string())]
    Decimal(String),

    #[regex(r"[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Double(String),

    // Operator names, keywords and function names
    #[regex(r"[A-Za-z][A-Za-z0-9_\-]*", |lex| lex.slice().to_string())]
    Word(String),

    // Comment (skip)
    #[regex(r";[^\n]*", logos::skip)]
    Comment,
}

impl Token {
    /// Operator spelling for symbol tokens
    pub fn symbol(&self) -> Option<&'static str> {
        let s = match self {
            Token::Underscore => "_",
            Token::Equals => "=",
            Token::NotEquals => "!=",
            Token::LessThan => "<",
            Token::LessEquals => "<=",
            Token::GreaterThan => ">",
            Token::GreaterEquals => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Bang => "!",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            _ => return None,
        };
        Some(s)
    }
}

/// Strip quotes and resolve backslash escapes
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

/// Tokenize algebra text, keeping byte offsets. Unlexable input yields `Err(offset)`.
pub fn tokenize(input: &str) -> std::result::Result<Vec<(Token, usize)>, usize> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.span().start)),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_basic_op() {
        let tokens = kinds("(bgp (triple ?s <http://ex/p> ?o))");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Word("bgp".into()),
                Token::LParen,
                Token::Word("triple".into()),
                Token::Variable("s".into()),
                Token::Iri("http://ex/p".into()),
                Token::Variable("o".into()),
                Token::RParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_operators_vs_iris() {
        assert_eq!(
            kinds("(<= ?x 3) (< ?x ?y) <urn:a>"),
            vec![
                Token::LParen,
                Token::LessEquals,
                Token::Variable("x".into()),
                Token::Integer(3),
                Token::RParen,
                Token::LParen,
                Token::LessThan,
                Token::Variable("x".into()),
                Token::Variable("y".into()),
                Token::RParen,
                Token::Iri("urn:a".into()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = kinds(r#""a\"b"@en-GB "5"^^<urn:t> -3 2.5 1e3 _:b1 _"#);
        assert_eq!(tokens[0], Token::String("a\"b".into()));
        assert_eq!(tokens[1], Token::LangTag("en-GB".into()));
        assert_eq!(tokens[3], Token::DoubleCaret);
        assert_eq!(tokens[5], Token::Integer(-3));
        assert_eq!(tokens[6], Token::Decimal("2.5".into()));
        assert_eq!(tokens[7], Token::Double("1e3".into()));
        assert_eq!(tokens[8], Token::BlankNode("b1".into()));
        assert_eq!(tokens[9], Token::Underscore);
    }

    #[test]
    fn test_minus_and_comments() {
        let tokens = kinds("(- ?x) ; trailing comment\n(null)");
        assert_eq!(tokens[1], Token::Minus);
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_error_offset() {
        assert_eq!(tokenize("(bgp $)"), Err(5));
    }
}
