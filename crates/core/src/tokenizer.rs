//! Turns source text (really, just a bunch of bytes) into [Token]s.

/// The eight symbols of the language, plus a marker for the end of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    OpenLoop,
    CloseLoop,
    Increment,
    Decrement,
    MoveLeft,
    MoveRight,
    InputChar,
    OutputChar,
    EndOfStream,
}

/// A symbol and the (1-based) line it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

impl TokenKind {
    /// Returns the token for a byte of source, or [None] if the byte is just commentary.
    pub fn from_byte(byte: u8) -> Option<TokenKind> {
        use TokenKind::*;
        match byte {
            b'[' => Some(OpenLoop),
            b']' => Some(CloseLoop),
            b'+' => Some(Increment),
            b'-' => Some(Decrement),
            b'<' => Some(MoveLeft),
            b'>' => Some(MoveRight),
            b',' => Some(InputChar),
            b'.' => Some(OutputChar),
            _ => None,
        }
    }

    /// Whether a run of this token can be folded into a single operation.
    pub fn is_repeatable(self) -> bool {
        use TokenKind::*;
        matches!(self, Increment | Decrement | MoveLeft | MoveRight)
    }

    /// The token that undoes this one: `+`/`-` and `<`/`>`.
    pub fn opposite(self) -> Option<TokenKind> {
        use TokenKind::*;
        match self {
            Increment => Some(Decrement),
            Decrement => Some(Increment),
            MoveLeft => Some(MoveRight),
            MoveRight => Some(MoveLeft),
            _ => None,
        }
    }

    /// +1 for `+` and `>`, -1 for `-` and `<`, 0 otherwise.
    pub fn direction(self) -> i64 {
        use TokenKind::*;
        match self {
            Increment | MoveRight => 1,
            Decrement | MoveLeft => -1,
            _ => 0,
        }
    }
}

/// Tokenizes the source. Anything that is not one of the eight symbols is dropped; newlines
/// only advance the line counter. The result always ends with exactly one
/// [TokenKind::EndOfStream].
pub fn tokenize(source_text: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 1;

    for &byte in source_text {
        if byte == b'\n' {
            line += 1;
            continue;
        }

        if let Some(kind) = TokenKind::from_byte(byte) {
            tokens.push(Token { kind, line });
        }
    }

    tokens.push(Token {
        kind: TokenKind::EndOfStream,
        line,
    });
    tracing::debug!(tokens = tokens.len(), lines = line, "tokenized source");

    tokens
}
