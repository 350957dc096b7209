use crate::error::{ReadError, ReadErrorKind};

pub struct Tokenizer<'s> {
    pub source: &'s str,
    pub line: usize,
    pub col: usize,
}
impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            line: 0,
            col: 0,
        }
    }

    /// Skips spaces, newlines and `;` comments.
    fn skip_blanks(&mut self) {
        loop {
            let (chars, bytes) = self
                .source
                .chars()
                .take_while(|&c| c.is_whitespace() && c != '\n')
                .fold((0, 0), |(a, b), c| (a + 1, b + c.len_utf8()));
            self.col += chars;
            self.source = &self.source[bytes..];

            if self.source.starts_with(';') {
                self.source = self.source.trim_start_matches(|c| c != '\n');
            } else if let Some(rest) = self.source.strip_prefix('\n') {
                self.line += 1;
                self.col = 0;
                self.source = rest;
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'s>>, ReadError> {
        self.skip_blanks();

        let Some(head) = self.source.chars().next() else {
            return Ok(None);
        };

        let (kind, bytes, chars) = match head {
            '(' => (TokenKind::Open, 1, 1),
            ')' => (TokenKind::Close, 1, 1),
            _ => {
                let (chars, bytes) = self
                    .source
                    .chars()
                    .take_while(|&c| !c.is_whitespace() && !"();".contains(c))
                    .fold((0, 0), |(a, b), c| (a + 1, b + c.len_utf8()));
                if head.is_control() {
                    return Err(ReadErrorKind::InvalidCharacter(head).at(self.line, self.col));
                }
                (TokenKind::Atom, bytes, chars)
            }
        };

        let tk = Token {
            slice: &self.source[..bytes],
            kind,
            line: self.line,
            col: self.col,
        };
        self.source = &self.source[bytes..];
        self.col += chars;

        Ok(Some(tk))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Open,
    Close,
    Atom,
}

#[derive(Debug, Clone)]
pub struct Token<'s> {
    pub slice: &'s str,
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExprKind<'s> {
    Atom(&'s str),
    List(Vec<SExpr<'s>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SExpr<'s> {
    pub kind: SExprKind<'s>,
    pub line: usize,
    pub col: usize,
}
impl<'s> SExpr<'s> {
    pub fn atom(&self) -> Option<&'s str> {
        match self.kind {
            SExprKind::Atom(a) => Some(a),
            SExprKind::List(_) => None,
        }
    }

    pub fn list(&self) -> Option<&[SExpr<'s>]> {
        match &self.kind {
            SExprKind::List(xs) => Some(xs),
            SExprKind::Atom(_) => None,
        }
    }

    /// Head atom of a list, e.g. `assign` in `(assign ...)`.
    pub fn head(&self) -> Option<&'s str> {
        self.list()?.first()?.atom()
    }

    #[inline(always)]
    pub const fn error(&self, kind: ReadErrorKind) -> ReadError {
        kind.at(self.line, self.col)
    }
}

/// Parses every top-level S-expression of `source`.
pub fn parse_all(source: &str) -> Result<Vec<SExpr<'_>>, ReadError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut stack: Vec<(usize, usize, Vec<SExpr>)> = Vec::new();
    let mut top = Vec::new();

    while let Some(tk) = tokenizer.next_token()? {
        match tk.kind {
            TokenKind::Open => stack.push((tk.line, tk.col, Vec::new())),
            TokenKind::Close => {
                let (line, col, items) = stack
                    .pop()
                    .ok_or_else(|| ReadErrorKind::UnbalancedClose.at(tk.line, tk.col))?;
                let e = SExpr {
                    kind: SExprKind::List(items),
                    line,
                    col,
                };
                match stack.last_mut() {
                    Some((_, _, parent)) => parent.push(e),
                    None => top.push(e),
                }
            }
            TokenKind::Atom => {
                let e = SExpr {
                    kind: SExprKind::Atom(tk.slice),
                    line: tk.line,
                    col: tk.col,
                };
                match stack.last_mut() {
                    Some((_, _, parent)) => parent.push(e),
                    None => top.push(e),
                }
            }
        }
    }

    match stack.first() {
        Some(&(line, col, _)) => Err(ReadErrorKind::UnclosedList.at(line, col)),
        None => Ok(top),
    }
}
