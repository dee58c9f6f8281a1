//! Parser and output helpers for the QDIMACS file format.
//! The format specification is provided at <https://www.qbflib.org/qdimacs.html>.

use crate::{
    literal::{Lit, Var},
    QuantTy,
};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("Cannot parse QDIMACS")]
#[diagnostic()]
pub struct ExtendedParseError {
    #[source_code]
    pub source_code: Vec<u8>,

    #[related]
    pub related: Vec<ParseError>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Missing QDIMACS header, i.e., `p cnf ...`")]
    MissingHeader,

    #[error("Invalid header")]
    InvalidHeader {
        #[label("expected `p cnf <variables> <clauses>`")]
        err_span: SourceSpan,
    },

    #[error("Unexpected end of file")]
    UnexpectedEndOfFile {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Unexpected token")]
    UnexpectedToken {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Invalid integer")]
    InvalidInt {
        #[label]
        err_span: SourceSpan,
    },

    #[error("Variable {val} is out of bound")]
    VariableOutOfBound {
        val: i64,

        #[label]
        err_span: SourceSpan,
    },

    #[error("Literal {val} is out of bound")]
    LiteralOutOfBound {
        val: i64,

        #[label]
        err_span: SourceSpan,
    },

    #[error(
        "Number of clauses does not match header: expected {}, but found {} clauses",
        expected,
        found
    )]
    NumClausesMismatch { expected: u32, found: u32 },
}

/// An instance of an implementor can be derived from a textual
/// representation of a QBF in the QDIMACS format.
pub trait FromQdimacs: Default {
    fn set_num_variables(&mut self, variables: u32);
    fn set_num_clauses(&mut self, clauses: u32);
    fn quantify(&mut self, quant: QuantTy, vars: &[Var]);
    fn add_clause(&mut self, lits: &[Lit]);
}

/// A token together with its byte offset in the input.
#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Token<'a> {
    fn span(&self) -> SourceSpan {
        (self.offset..self.offset + self.bytes.len()).into()
    }

    fn to_i64(self) -> Result<i64, ParseError> {
        let text =
            std::str::from_utf8(self.bytes).map_err(|_| ParseError::InvalidInt {
                err_span: self.span(),
            })?;
        text.parse().map_err(|_| ParseError::InvalidInt { err_span: self.span() })
    }
}

#[derive(Debug)]
pub struct QdimacsParser<'a> {
    input: &'a [u8],
    pos: usize,
    /// whether a token was already produced on the current line; comment
    /// lines start with `c` in the first column
    line_has_tokens: bool,
    num_clauses: u32,
    num_clauses_read: u32,
}

impl<'a> QdimacsParser<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0, line_has_tokens: false, num_clauses: 0, num_clauses_read: 0 }
    }

    /// Parses a QDIMACS file and returns the representation `Q`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the content is not valid
    /// QDIMACS.
    pub fn parse<Q: FromQdimacs>(&mut self) -> Result<Q, ParseError> {
        let mut result = Q::default();
        self.parse_header(&mut result)?;
        self.parse_prefix_and_matrix(&mut result)?;

        if self.num_clauses_read != self.num_clauses {
            return Err(ParseError::NumClausesMismatch {
                expected: self.num_clauses,
                found: self.num_clauses_read,
            });
        }
        Ok(result)
    }

    /// `p cnf <variables> <clauses>`, preceded by any number of comments.
    fn parse_header<Q: FromQdimacs>(&mut self, result: &mut Q) -> Result<(), ParseError> {
        let Some(token) = self.next_token() else {
            return Err(ParseError::MissingHeader);
        };
        if token.bytes != b"p" {
            return Err(ParseError::MissingHeader);
        }
        let format = self.expect_token()?;
        if format.bytes != b"cnf" {
            return Err(ParseError::InvalidHeader { err_span: format.span() });
        }
        let variables = self.expect_token()?;
        let num_variables: u32 = variables
            .to_i64()?
            .try_into()
            .map_err(|_| ParseError::InvalidHeader { err_span: variables.span() })?;
        let clauses = self.expect_token()?;
        self.num_clauses = clauses
            .to_i64()?
            .try_into()
            .map_err(|_| ParseError::InvalidHeader { err_span: clauses.span() })?;
        result.set_num_variables(num_variables);
        result.set_num_clauses(self.num_clauses);
        Ok(())
    }

    /// Quantifier lines (`a ...`/`e ...`), then 0-terminated clauses.
    fn parse_prefix_and_matrix<Q: FromQdimacs>(
        &mut self,
        result: &mut Q,
    ) -> Result<(), ParseError> {
        let mut in_prefix = true;
        while let Some(token) = self.next_token() {
            match token.bytes {
                b"a" | b"e" if in_prefix => {
                    let quant =
                        if token.bytes == b"a" { QuantTy::Forall } else { QuantTy::Exists };
                    let vars = self.parse_var_group()?;
                    result.quantify(quant, &vars);
                }
                _ => {
                    in_prefix = false;
                    let lits = self.parse_clause(token)?;
                    result.add_clause(&lits);
                    self.num_clauses_read += 1;
                }
            }
        }
        Ok(())
    }

    /// Variables of a quantifier line, up to the terminating 0.
    fn parse_var_group(&mut self) -> Result<Vec<Var>, ParseError> {
        let mut vars = Vec::new();
        loop {
            let token = self.expect_token()?;
            let val = token.to_i64()?;
            if val == 0 {
                return Ok(vars);
            }
            if !(1..=i64::from(Var::MAX_VAR.to_dimacs())).contains(&val) {
                return Err(ParseError::VariableOutOfBound { val, err_span: token.span() });
            }
            vars.push(Var::from_dimacs(val.try_into().unwrap()));
        }
    }

    /// A clause starting with `first`, up to the terminating 0.
    fn parse_clause(&mut self, first: Token<'a>) -> Result<Vec<Lit>, ParseError> {
        let mut lits = Vec::new();
        let mut token = first;
        loop {
            let val = token.to_i64()?;
            if val == 0 {
                return Ok(lits);
            }
            let bound = i64::from(Var::MAX_VAR.to_dimacs());
            if !(-bound..=bound).contains(&val) {
                return Err(ParseError::LiteralOutOfBound { val, err_span: token.span() });
            }
            lits.push(Lit::from_dimacs(val.try_into().unwrap()));
            token = self.expect_token()?;
        }
    }

    /// The next whitespace-delimited token; comment lines are skipped.
    fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
                if self.input[self.pos] == b'\n' {
                    self.line_has_tokens = false;
                }
                self.pos += 1;
            }
            if self.pos >= self.input.len() {
                return None;
            }
            if self.input[self.pos] == b'c' && !self.line_has_tokens {
                while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            let start = self.pos;
            while self.pos < self.input.len() && !self.input[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            self.line_has_tokens = true;
            return Some(Token { bytes: &self.input[start..self.pos], offset: start });
        }
    }

    fn expect_token(&mut self) -> Result<Token<'a>, ParseError> {
        self.next_token().ok_or(ParseError::UnexpectedEndOfFile {
            err_span: self.input.len().saturating_sub(1).into(),
        })
    }
}

/// A QDIMACS `v` line for a (possibly partial) assignment.
#[must_use]
pub fn v_line(lits: &[Lit]) -> String {
    let mut line = String::from("v");
    for lit in lits {
        line.push_str(&format!(" {lit}"));
    }
    line.push_str(" 0");
    line
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::qcnf::QCNF;
    use proptest::prelude::*;

    fn parse_qcnf(input: &str) -> Result<QCNF, ParseError> {
        QdimacsParser::new(input.as_bytes()).parse()
    }

    #[test]
    fn simple_formula() {
        let qcnf = parse_qcnf("p cnf 2 2\na 1 0\ne 2 0\n1 2 0\n-1 2 0\n").unwrap();
        assert!(qcnf.is_2qbf());
        assert_eq!(qcnf.clauses().len(), 2);
    }

    #[test]
    fn comments_and_whitespace() {
        let qcnf = parse_qcnf("c a comment\nc another\np cnf 1 1\n  e 1 0\n 1   0\n").unwrap();
        assert_eq!(qcnf.clauses().len(), 1);
    }

    #[test]
    fn clause_spanning_lines() {
        let qcnf = parse_qcnf("p cnf 2 1\ne 1 2 0\n1\n2\n0\n").unwrap();
        assert_eq!(qcnf.clauses().len(), 1);
    }

    #[test]
    fn missing_header() {
        assert!(matches!(parse_qcnf("e 1 0\n1 0\n"), Err(ParseError::MissingHeader)));
    }

    #[test]
    fn clause_count_mismatch() {
        assert!(matches!(
            parse_qcnf("p cnf 1 2\ne 1 0\n1 0\n"),
            Err(ParseError::NumClausesMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn invalid_integer() {
        assert!(matches!(
            parse_qcnf("p cnf 1 1\ne 1 0\nx 0\n"),
            Err(ParseError::InvalidInt { .. })
        ));
    }

    #[test]
    fn v_line_format() {
        let lits = [Lit::from_dimacs(1), Lit::from_dimacs(-3)];
        assert_eq!(v_line(&lits), "v 1 -3 0");
        assert_eq!(v_line(&[]), "v 0");
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in ".*") {
            let _ = QdimacsParser::new(s.as_bytes()).parse::<QCNF>();
        }

        #[test]
        fn roundtrip_through_display(
            clauses in proptest::collection::vec(
                proptest::collection::vec(crate::literal::strategy::lit(7), 1..5),
                0..8,
            ),
        ) {
            let mut first = QCNF::default();
            let vars: Vec<Var> =
                (1..=7).map(Var::from_dimacs).collect();
            first.quantify(crate::QuantTy::Exists, &vars);
            for clause in &clauses {
                for &lit in clause {
                    first.add_lit(lit);
                }
                let _ = first.close_clause(true);
            }
            let printed = first.to_string();
            let second: QCNF = QdimacsParser::new(printed.as_bytes()).parse().unwrap();
            prop_assert_eq!(printed, second.to_string());
        }
    }
}

#[cfg(kani)]
mod verification {
    use super::*;
    use crate::qcnf::QCNF;

    #[kani::proof]
    #[kani::unwind(2)]
    pub fn parsing_arbitrary_bytes() {
        const LIMIT: usize = 1;
        let contents: [u8; LIMIT] = kani::any();
        let _: Option<QCNF> = QdimacsParser::new(&contents as &[u8]).parse().ok();
    }
}
