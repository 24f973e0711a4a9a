//! N-Triples / N-Quads loader
//!
//! Line-based recursive descent; one statement per line. A fourth term on
//! a line names the graph the triple goes into.

use crate::dataset::Dataset;
use refarq_core::{Error, Iri, Literal, Result, Term, Triple};
use std::path::Path;
use tracing::{debug, info};

/// Parse N-Quads (or N-Triples) text into a dataset
pub fn parse_nquads(input: &str) -> Result<Dataset> {
    let mut dataset = Dataset::new();
    for (index, line) in input.lines().enumerate() {
        let mut parser = LineParser::new(line, index + 1);
        if let Some((graph, triple)) = parser.parse_statement()? {
            dataset.insert(graph, triple);
        }
    }
    debug!(
        "Parsed {} quads into {} named graphs",
        dataset.len(),
        dataset.named_graph_count()
    );
    Ok(dataset)
}

/// Load a dataset from an N-Quads file
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let dataset = parse_nquads(&text)?;
    info!("Loaded {} quads from {:?}", dataset.len(), path);
    Ok(dataset)
}

struct LineParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl LineParser {
    fn new(text: &str, line: usize) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line,
        }
    }

    fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::DataLoad {
            line: self.line,
            message: message.into(),
        }
    }

    fn parse_statement(&mut self) -> Result<Option<(Option<Term>, Triple)>> {
        self.skip_whitespace();
        if self.at_end() || self.peek() == Some('#') {
            return Ok(None);
        }

        let subject = self.parse_term()?;
        if subject.is_literal() {
            return Err(self.error("literal in subject position"));
        }
        let predicate = self.parse_term()?;
        if !predicate.is_iri() {
            return Err(self.error("predicate must be an IRI"));
        }
        let object = self.parse_term()?;

        self.skip_whitespace();
        let graph = if self.peek() == Some('.') {
            None
        } else {
            let graph = self.parse_term()?;
            if graph.is_literal() {
                return Err(self.error("literal in graph position"));
            }
            Some(graph)
        };

        self.skip_whitespace();
        if !self.consume_char('.') {
            return Err(self.error("expected '.' at end of statement"));
        }
        self.skip_whitespace();
        if !self.at_end() && self.peek() != Some('#') {
            return Err(self.error("trailing content after '.'"));
        }

        Ok(Some((graph, Triple::new(subject, predicate, object))))
    }

    fn parse_term(&mut self) -> Result<Term> {
        self.skip_whitespace();
        match self.peek() {
            Some('<') => Ok(Term::Iri(self.parse_iri()?)),
            Some('_') => self.parse_blank(),
            Some('"') => self.parse_literal(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of line")),
        }
    }

    fn parse_iri(&mut self) -> Result<Iri> {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '>' {
                let iri: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(Iri::new(iri));
            }
            if c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        Err(self.error("unterminated IRI"))
    }

    fn parse_blank(&mut self) -> Result<Term> {
        self.pos += 1;
        if !self.consume_char(':') {
            return Err(self.error("expected ':' in blank node label"));
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("empty blank node label"));
        }
        Ok(Term::blank(self.chars[start..self.pos].iter().collect::<String>()))
    }

    fn parse_literal(&mut self) -> Result<Term> {
        self.pos += 1;
        let mut lexical = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    lexical.push(self.parse_escape()?);
                }
                Some(c) => {
                    lexical.push(c);
                    self.pos += 1;
                }
            }
        }

        if self.consume_char('@') {
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '-' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if start == self.pos {
                return Err(self.error("empty language tag"));
            }
            let lang: String = self.chars[start..self.pos].iter().collect();
            return Ok(Term::Literal(Literal::lang(lexical, &lang)));
        }

        if self.consume_char('^') {
            if !self.consume_char('^') || self.peek() != Some('<') {
                return Err(self.error("expected '^^<' before datatype"));
            }
            let datatype = self.parse_iri()?;
            return Ok(Term::Literal(Literal::typed(lexical, datatype)));
        }

        Ok(Term::Literal(Literal::simple(lexical)))
    }

    fn parse_escape(&mut self) -> Result<char> {
        let c = self.peek().ok_or_else(|| self.error("dangling escape"))?;
        self.pos += 1;
        match c {
            't' => Ok('\t'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            'b' => Ok('\u{8}'),
            'f' => Ok('\u{c}'),
            '"' => Ok('"'),
            '\'' => Ok('\''),
            '\\' => Ok('\\'),
            'u' => self.parse_hex(4),
            'U' => self.parse_hex(8),
            other => Err(self.error(format!("invalid escape '\\{}'", other))),
        }
    }

    fn parse_hex(&mut self, digits: usize) -> Result<char> {
        if self.pos + digits > self.chars.len() {
            return Err(self.error("truncated unicode escape"));
        }
        let hex: String = self.chars[self.pos..self.pos + digits].iter().collect();
        self.pos += digits;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode escape '{}'", hex)))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refarq_core::xsd;
    use std::io::Write;

    #[test]
    fn test_parse_triples_and_quads() {
        let data = r#"
# people
<http://ex/alice> <http://ex/name> "Alice"@en .
<http://ex/alice> <http://ex/age> "30"^^<http://www.w3.org/2001/XMLSchema#integer> .
_:b0 <http://ex/knows> <http://ex/alice> <http://ex/g1> .
"#;
        let ds = parse_nquads(data).unwrap();
        assert_eq!(ds.default_graph().len(), 2);
        let g1 = ds.named_graph(&Term::iri("http://ex/g1")).unwrap();
        assert_eq!(g1.len(), 1);

        let age_pred = Term::iri("http://ex/age");
        let age = ds
            .default_graph()
            .find(None, Some(&age_pred), None)
            .next()
            .unwrap();
        assert_eq!(age.object, Term::typed("30", xsd::INTEGER));
    }

    #[test]
    fn test_escapes() {
        let ds = parse_nquads(r#"<http://ex/s> <http://ex/p> "a\"bé\n" ."#).unwrap();
        let triple = ds.default_graph().iter().next().unwrap();
        assert_eq!(triple.object, Term::string("a\"b\u{e9}\n"));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_nquads("<http://ex/s> <http://ex/p> <http://ex/o> .\n<http://ex/s> \"p\" <http://ex/o> .")
            .unwrap_err();
        match err {
            Error::DataLoad { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_nquads("<http://ex/s> <http://ex/p> <http://ex/o>").is_err());
        assert!(parse_nquads("<http://ex/s> <http://ex/p> \"open .").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "<http://ex/s> <http://ex/p> <http://ex/o> <http://ex/g> .").unwrap();
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 1);
        assert!(ds.contains_graph(&Term::iri("http://ex/g")));
    }
}
