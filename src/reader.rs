use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::console::Console;
use crate::error::Error;
use crate::interp::Interp;
use crate::value::Value;

/// Lexer output: list punctuation or a finished atom/number value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// `(` opening a non-empty list (`()` lexes straight to NIL)
    Open,
    /// `'` quote shorthand
    Tick,
    /// `.` dotted-pair marker
    Dot,
    /// `)`
    Close,
    /// An interned atom or number
    Value(Value),
}

/// Saved state of an interrupted input stream.
struct Saved {
    line: Vec<u8>,
    pos: usize,
    file: Option<BufReader<File>>,
}

/// Line-buffered input with one-token pushback and an `@file` stream stack.
///
/// The current stream is either the console (`file` is `None`) or an
/// included file; `@name` pushes the current stream and switches, end of a
/// pushed stream pops back.
pub struct Reader {
    line: Vec<u8>,
    pos: usize,
    pushback: Option<Token>,
    prompt: Option<char>,
    file: Option<BufReader<File>>,
    stack: Vec<Saved>,
}

impl Reader {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            line: Vec::new(),
            pos: 0,
            pushback: None,
            prompt: Some('*'),
            file: None,
            stack: Vec::new(),
        }
    }

    pub(crate) fn set_prompt(&mut self, prompt: Option<char>) {
        self.prompt = prompt;
    }

    /// Preload the line buffer, ahead of anything the streams produce.
    pub(crate) fn seed(&mut self, text: &str) {
        self.line = text.as_bytes().to_vec();
        self.line.push(b' ');
        self.pos = 0;
    }
}

impl<C: Console> Interp<C> {
    /// Read one S-expression and return a tagged pointer to it.
    pub fn sread(&mut self) -> Result<Value, Error> {
        match self.next_token()? {
            Token::Value(v) => Ok(v),
            Token::Open => self.read_list(),
            Token::Tick => self.read_quoted(),
            Token::Dot | Token::Close => Err(Error::Syntax("bad syntax")),
        }
    }

    /// `'x` becomes `(QUOTE x)`.
    fn read_quoted(&mut self) -> Result<Value, Error> {
        let nil = self.heap.nil;
        self.heap.push_sread()?;
        let k = self.heap.cons(self.heap.quote, nil)?;
        self.heap.set_sread_head(k);
        let t = self.heap.cons(nil, nil)?;
        self.heap.rplacd(k, t);
        let x = self.sread()?;
        self.heap.rplaca(t, x);
        self.heap.pop_sread();
        Ok(k)
    }

    /// Elements accumulate on a left spine; the partial list stays visible
    /// to the collector through the `sreadlist` root.
    fn read_list(&mut self) -> Result<Value, Error> {
        let nil = self.heap.nil;
        self.heap.push_sread()?;
        let k = self.heap.cons(nil, nil)?;
        self.heap.set_sread_head(k);
        let mut j = k;
        let first = self.sread()?;
        self.heap.rplaca(j, first);
        loop {
            match self.next_token()? {
                Token::Value(v) => {
                    let t = self.heap.cons(v, nil)?;
                    self.heap.rplacd(j, t);
                    j = t;
                }
                tok @ (Token::Open | Token::Tick) => {
                    self.reader.pushback = Some(tok);
                    let t = self.heap.cons(nil, nil)?;
                    self.heap.rplacd(j, t);
                    j = t;
                    let elem = self.sread()?;
                    self.heap.rplaca(j, elem);
                }
                Token::Dot => {
                    let tail = self.sread()?;
                    self.heap.rplacd(j, tail);
                    if self.next_token()? != Token::Close {
                        return Err(Error::Syntax("syntax error"));
                    }
                    break;
                }
                Token::Close => break,
            }
        }
        self.heap.pop_sread();
        Ok(k)
    }

    /// Lexical scanner.
    pub(crate) fn next_token(&mut self) -> Result<Token, Error> {
        if let Some(t) = self.reader.pushback.take() {
            return Ok(t);
        }
        loop {
            let Some(c) = self.getg()? else {
                // current stream is dry: pop an interrupted one, or finish
                let Some(saved) = self.reader.stack.pop() else {
                    return Err(Error::Eof);
                };
                self.reader.line = saved.line;
                self.reader.pos = saved.pos;
                self.reader.file = saved.file;
                if self.reader.prompt == Some('@') {
                    self.reader.prompt = Some('*');
                }
                continue;
            };
            match c {
                b' ' => continue,
                b'(' => {
                    while self.lookg()? == Some(b' ') {
                        self.getg()?;
                    }
                    if self.lookg()? == Some(b')') {
                        self.getg()?;
                        return Ok(Token::Value(self.heap.nil));
                    }
                    return Ok(Token::Open);
                }
                b'\'' => return Ok(Token::Tick),
                b')' => return Ok(Token::Close),
                b'.' => {
                    if matches!(self.lookg()?, Some(d) if d.is_ascii_digit()) {
                        return self.lex_number(b'.');
                    }
                    return Ok(Token::Dot);
                }
                b'+' | b'-'
                    if matches!(self.lookg()?, Some(d) if d.is_ascii_digit() || d == b'.') =>
                {
                    return self.lex_number(c);
                }
                d if d.is_ascii_digit() => return self.lex_number(d),
                _ => return self.lex_name(c),
            }
        }
    }

    /// Signed decimal, integer part plus optional fraction; a dot not
    /// followed by a digit terminates the number and is consumed.
    fn lex_number(&mut self, first: u8) -> Result<Token, Error> {
        let mut text = String::new();
        let mut fraction = false;
        match first {
            b'-' => text.push('-'),
            b'+' => {}
            b'.' => {
                text.push_str("0.");
                fraction = true;
            }
            d => text.push(d as char),
        }
        loop {
            match self.lookg()? {
                Some(d) if d.is_ascii_digit() => {
                    self.getg()?;
                    text.push(d as char);
                }
                Some(b'.') if !fraction => {
                    self.getg()?;
                    if matches!(self.lookg()?, Some(d) if d.is_ascii_digit()) {
                        fraction = true;
                        text.push('.');
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        let x: f64 = text.parse().map_err(|_| Error::Syntax("bad number"))?;
        Ok(Token::Value(self.heap.number(x)?))
    }

    /// A name runs to the next space, dot, parenthesis or end of stream.
    /// `@name` switches the input to that file; everything else is
    /// uppercased and interned.
    fn lex_name(&mut self, first: u8) -> Result<Token, Error> {
        let mut name = vec![first];
        loop {
            match self.lookg()? {
                Some(c) if !matches!(c, b' ' | b'.' | b'(' | b')') => {
                    self.getg()?;
                    name.push(c);
                }
                _ => break,
            }
        }
        if name[0] == b'@' {
            let path = String::from_utf8_lossy(&name[1..]).into_owned();
            let file = File::open(&path).map_err(|_| Error::CannotOpen(path))?;
            let saved = Saved {
                line: std::mem::take(&mut self.reader.line),
                pos: self.reader.pos,
                file: self.reader.file.take(),
            };
            self.reader.stack.push(saved);
            self.reader.pos = 0;
            self.reader.prompt = Some('@');
            self.reader.file = Some(BufReader::new(file));
            return self.next_token();
        }
        let upper: String = name
            .iter()
            .map(|&b| (b as char).to_ascii_uppercase())
            .collect();
        Ok(Token::Value(self.heap.intern(&upper)?))
    }

    fn getg(&mut self) -> Result<Option<u8>, Error> {
        if !self.fill()? {
            return Ok(None);
        }
        let c = self.reader.line[self.reader.pos];
        self.reader.pos += 1;
        Ok(Some(c))
    }

    fn lookg(&mut self) -> Result<Option<u8>, Error> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.reader.line[self.reader.pos]))
    }

    /// Refill the line buffer from the current stream. Comment lines start
    /// with `/` and are dropped; TAB maps to space; every line gets one
    /// trailing space so tokens cannot run across lines.
    fn fill(&mut self) -> Result<bool, Error> {
        loop {
            if self.reader.pos < self.reader.line.len() {
                return Ok(true);
            }
            let line = match &mut self.reader.file {
                Some(f) => {
                    let mut s = String::new();
                    match f.read_line(&mut s) {
                        Ok(0) | Err(_) => None,
                        Ok(_) => Some(s),
                    }
                }
                None => self.console.read_line(self.reader.prompt),
            };
            let Some(line) = line else {
                return Ok(false);
            };
            let mut bytes: Vec<u8> = line
                .bytes()
                .filter(|&b| b != b'\r' && b != b'\n')
                .map(|b| if b == b'\t' { b' ' } else { b })
                .collect();
            if bytes.first() == Some(&b'/') {
                continue;
            }
            bytes.push(b' ');
            self.reader.line = bytes;
            self.reader.pos = 0;
            self.reader.prompt = Some('>');
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;
    use std::io::Write as _;

    fn interp(script: &str) -> Interp<BufferConsole> {
        Interp::new(BufferConsole::new(script)).unwrap()
    }

    fn read_back(script: &str) -> String {
        let mut it = interp(script);
        let v = it.sread().unwrap();
        it.heap().swrite(v)
    }

    #[test]
    fn test_leaves() {
        assert_eq!(read_back("ABC"), "ABC");
        assert_eq!(read_back("abc"), "ABC");
        assert_eq!(read_back("42"), "42");
        assert_eq!(read_back("-3.25"), "-3.25");
        assert_eq!(read_back("+7"), "7");
        assert_eq!(read_back(".5"), "0.5");
        assert_eq!(read_back("5."), "5");
        assert_eq!(read_back("()"), "NIL");
        assert_eq!(read_back("(  )"), "NIL");
    }

    #[test]
    fn test_lists() {
        assert_eq!(read_back("(A B C)"), "(A B C)");
        assert_eq!(read_back("(A (B C) D)"), "(A (B C) D)");
        assert_eq!(read_back("(A . B)"), "(A . B)");
        assert_eq!(read_back("(1 2 . 3)"), "(1 . (2 . 3))");
        assert_eq!(read_back("(A ())"), "(A NIL)");
    }

    #[test]
    fn test_quote_shorthand() {
        assert_eq!(read_back("'X"), "(QUOTE X)");
        assert_eq!(read_back("'(1 2)"), "(QUOTE (1 2))");
        assert_eq!(read_back("(CAR 'X)"), "(CAR (QUOTE X))");
        assert_eq!(read_back("''X"), "(QUOTE (QUOTE X))");
    }

    #[test]
    fn test_multi_line_and_comments() {
        assert_eq!(read_back("(A\nB)"), "(A B)");
        assert_eq!(read_back("/ comment line\n(A B)"), "(A B)");
        assert_eq!(read_back("(A\tB)"), "(A B)");
    }

    #[test]
    fn test_identity_of_rereads() {
        let mut it = interp("(A B) (A B) 2 2");
        let first = it.sread().unwrap();
        let second = it.sread().unwrap();
        // structurally equal lists are distinct cells
        assert_ne!(first, second);
        // numbers and atoms intern to the same slot
        let n1 = it.sread().unwrap();
        let n2 = it.sread().unwrap();
        assert_eq!(n1, n2);
    }

    #[test]
    fn test_syntax_errors() {
        let mut it = interp(")");
        assert!(matches!(it.sread(), Err(Error::Syntax(_))));
        let mut it = interp(". X");
        assert!(matches!(it.sread(), Err(Error::Syntax(_))));
        let mut it = interp("(A . B C)");
        assert!(matches!(it.sread(), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_eof() {
        let mut it = interp("");
        assert!(matches!(it.sread(), Err(Error::Eof)));
    }

    #[test]
    fn test_stream_switch() {
        let dir = tempfile::Builder::new()
            .prefix("govol")
            .tempdir()
            .unwrap();
        let path = dir.path().join("included");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "(PLUS 1 2)").unwrap();
        drop(f);

        let script = format!("@{} AFTER", path.display());
        let mut it = interp(&script);
        let v = it.sread().unwrap();
        assert_eq!(it.heap().swrite(v), "(PLUS 1 2)");
        // the file is dry, reading continues on the interrupted line
        let v = it.sread().unwrap();
        assert_eq!(it.heap().swrite(v), "AFTER");
    }

    #[test]
    fn test_missing_include() {
        let mut it = interp("@no-such-govol-file X");
        assert!(matches!(it.sread(), Err(Error::CannotOpen(_))));
    }
}
