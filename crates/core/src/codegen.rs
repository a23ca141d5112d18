//! Generates an optimized [Opcode] sequence from [Token]s.
//!
//! Generation is a small state machine that walks the tokens exactly once:
//!
//!  - [State::Scan] looks at one token and decides what to do with it;
//!  - [State::Multi] folds a run of `+`/`-` (or `<`/`>`) into one opcode;
//!  - [State::SkipDeadLoop] throws away a loop that appears before any other code, since the
//!    tape is still all zeros and the loop can never be entered;
//!  - [State::End] stops the machine.
//!
//! Besides folding runs and dropping dead loops, `[-]` and `[+]` become a single
//! [OpcodeKind::CellZero].

use crate::errors::{Diagnostics, Reason, DEFAULT_DIAGNOSTIC_LIMIT};
use crate::ir::{Opcode, OpcodeKind};
use crate::tokenizer::{Token, TokenKind};

/// Knobs for the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Compilation stops once this many diagnostics have been recorded.
    pub diagnostic_limit: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            diagnostic_limit: DEFAULT_DIAGNOSTIC_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scan,
    /// Folding a run that started with the given token.
    Multi(TokenKind),
    SkipDeadLoop,
    End,
}

/// Generates opcodes with the default options.
pub fn generate(tokens: &[Token]) -> Result<Vec<Opcode>, Diagnostics> {
    generate_with_options(tokens, GeneratorOptions::default())
}

/// Generates opcodes for the token sequence.
///
/// The returned sequence always ends with exactly one [OpcodeKind::EndOfStream], and its
/// loops are balanced. If anything at all was diagnosed, no code is returned.
pub fn generate_with_options(
    tokens: &[Token],
    options: GeneratorOptions,
) -> Result<Vec<Opcode>, Diagnostics> {
    let mut generator = CodeGenerator::new(tokens, options);
    generator.run();
    generator.finish()
}

struct CodeGenerator<'a> {
    tokens: &'a [Token],
    index: usize,
    state: State,
    code: Vec<Opcode>,
    // Lines of every `[` that has not been closed yet.
    open_loops: Vec<u32>,
    // Running total of the run being folded in State::Multi.
    run_total: i64,
    code_started: bool,
    diagnostics: Diagnostics,
}

impl<'a> CodeGenerator<'a> {
    fn new(tokens: &'a [Token], options: GeneratorOptions) -> Self {
        CodeGenerator {
            tokens,
            index: 0,
            state: State::Scan,
            code: Vec::with_capacity(tokens.len() + 1),
            open_loops: Vec::new(),
            run_total: 0,
            code_started: false,
            diagnostics: Diagnostics::with_limit(options.diagnostic_limit),
        }
    }

    fn run(&mut self) {
        while !self.diagnostics.is_fatal() && self.state != State::End {
            self.state = match self.state {
                State::Scan => self.scan(),
                State::Multi(kind) => self.multi(kind),
                State::SkipDeadLoop => self.skip_dead_loop(),
                State::End => State::End,
            };
        }

        // Every loop still open was never closed, reported in the order they were opened.
        for line in std::mem::take(&mut self.open_loops) {
            if self.diagnostics.is_fatal() {
                break;
            }
            self.diagnostics.record(Reason::UnmatchedOpenLoop, line);
        }

        self.code.push(Opcode::unary(OpcodeKind::EndOfStream));
    }

    fn finish(self) -> Result<Vec<Opcode>, Diagnostics> {
        tracing::debug!(
            opcodes = self.code.len(),
            diagnostics = self.diagnostics.len(),
            "generated code"
        );

        if self.diagnostics.is_empty() {
            Ok(self.code)
        } else {
            Err(self.diagnostics)
        }
    }

    fn scan(&mut self) -> State {
        use TokenKind::*;

        let token = self.current();
        match token.kind {
            EndOfStream => State::End,
            Increment | Decrement | MoveLeft | MoveRight => {
                self.run_total = 0;
                State::Multi(token.kind)
            }
            OpenLoop => {
                if !self.code_started {
                    State::SkipDeadLoop
                } else if self.is_zeroing_loop() {
                    self.emit(OpcodeKind::CellZero.into());
                    self.index += 3;
                    State::Scan
                } else {
                    self.open_loops.push(token.line);
                    self.emit(OpcodeKind::LoopOpen.into());
                    self.index += 1;
                    State::Scan
                }
            }
            CloseLoop => {
                if self.open_loops.pop().is_some() {
                    self.emit(OpcodeKind::LoopClose.into());
                } else {
                    self.diagnostics.record(Reason::UnmatchedCloseLoop, token.line);
                }
                self.index += 1;
                State::Scan
            }
            OutputChar => {
                self.emit(OpcodeKind::OutputChar.into());
                self.index += 1;
                State::Scan
            }
            InputChar => {
                self.emit(OpcodeKind::InputChar.into());
                self.index += 1;
                State::Scan
            }
        }
    }

    fn multi(&mut self, kind: TokenKind) -> State {
        let next = self.current().kind;
        if next == kind || Some(next) == kind.opposite() {
            self.run_total += next.direction();
            self.index += 1;
            return State::Multi(kind);
        }

        let opcode = fold_run(kind, self.run_total);
        self.emit(opcode);
        State::Scan
    }

    fn skip_dead_loop(&mut self) -> State {
        // The opening bracket is the current token; look for the first `]` after it.
        self.index += 1;
        while self.current().kind != TokenKind::EndOfStream {
            let kind = self.current().kind;
            self.index += 1;
            if kind == TokenKind::CloseLoop {
                return State::Scan;
            }
        }

        let line = self
            .tokens
            .get(self.index - 1)
            .map_or_else(|| self.current().line, |t| t.line);
        self.diagnostics.record(Reason::UnmatchedOpenLoop, line);
        // An unclosed dead loop is fatal no matter how many diagnostics came before.
        self.diagnostics.escalate();
        State::End
    }

    /// `[-]` or `[+]`, starting at the current token.
    fn is_zeroing_loop(&self) -> bool {
        use TokenKind::*;
        matches!(
            self.tokens.get(self.index..self.index + 3),
            Some([
                Token { kind: OpenLoop, .. },
                Token { kind: Increment | Decrement, .. },
                Token { kind: CloseLoop, .. },
            ])
        )
    }

    fn current(&self) -> Token {
        // The EndOfStream token is never consumed, so the index never runs off the end.
        self.tokens
            .get(self.index)
            .copied()
            .unwrap_or_else(|| self.end_of_stream())
    }

    fn end_of_stream(&self) -> Token {
        Token {
            kind: TokenKind::EndOfStream,
            line: self.tokens.last().map(|t| t.line).unwrap_or(1),
        }
    }

    fn emit(&mut self, opcode: Opcode) {
        self.code_started = true;
        self.code.push(opcode);
    }
}

/// Folds a run that started with `kind` and has the given net total into one opcode.
fn fold_run(kind: TokenKind, total: i64) -> Opcode {
    use OpcodeKind::*;

    let is_pointer = matches!(kind, TokenKind::MoveLeft | TokenKind::MoveRight);
    let magnitude = total.unsigned_abs();
    let opcode_kind = match (is_pointer, total > 0, magnitude == 1) {
        (true, true, true) => MovePointerInc,
        (true, false, true) => MovePointerDec,
        (true, true, false) => MovePointerAdd,
        (true, false, false) => MovePointerSub,
        (false, true, true) => CellInc,
        (false, false, true) => CellDec,
        (false, true, false) => CellAdd,
        (false, false, false) => CellSub,
    };

    if opcode_kind.has_operand() {
        // Cells wrap at 256 anyway; pointer offsets of 4 billion are not meaningful.
        Opcode::with_operand(opcode_kind, magnitude as u32)
    } else {
        Opcode::unary(opcode_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::OpcodeKind::*;
    use crate::tokenizer::tokenize;

    fn compile(source: &str) -> Vec<Opcode> {
        generate(&tokenize(source.as_bytes())).expect("source should compile")
    }

    fn diagnose(source: &str) -> Diagnostics {
        generate(&tokenize(source.as_bytes())).expect_err("source should not compile")
    }

    fn op(kind: OpcodeKind) -> Opcode {
        Opcode::unary(kind)
    }

    fn arg(kind: OpcodeKind, operand: u32) -> Opcode {
        Opcode::with_operand(kind, operand)
    }

    #[test]
    fn empty_program_just_ends() {
        assert_eq!(vec![op(EndOfStream)], compile(""));
        assert_eq!(vec![op(EndOfStream)], compile("no code here\n"));
    }

    #[test]
    fn single_steps_stay_unary() {
        assert_eq!(
            vec![
                op(CellInc),
                op(MovePointerInc),
                op(CellDec),
                op(MovePointerDec),
                op(EndOfStream)
            ],
            compile("+>-<")
        );
    }

    #[test]
    fn folds_runs() {
        assert_eq!(
            vec![
                arg(CellAdd, 3),
                arg(MovePointerAdd, 2),
                arg(CellSub, 4),
                arg(MovePointerSub, 5),
                op(EndOfStream)
            ],
            compile("+++>>----<<<<<")
        );
    }

    #[test]
    fn folds_opposites_into_the_net_total() {
        assert_eq!(vec![arg(CellAdd, 2), op(EndOfStream)], compile("++-+"));
        assert_eq!(vec![op(CellDec), op(EndOfStream)], compile("+--"));
        assert_eq!(vec![op(MovePointerInc), op(EndOfStream)], compile("<>>"));
        assert_eq!(vec![arg(MovePointerSub, 2), op(EndOfStream)], compile(">><<<<"));
    }

    #[test]
    fn net_zero_run_is_a_subtraction_of_nothing() {
        assert_eq!(vec![arg(CellSub, 0), op(EndOfStream)], compile("+-"));
        assert_eq!(vec![arg(MovePointerSub, 0), op(EndOfStream)], compile("><"));
    }

    #[test]
    fn runs_ignore_commentary_in_between() {
        assert_eq!(vec![arg(CellAdd, 4), op(EndOfStream)], compile("+ +\n+ comment +"));
    }

    #[test]
    fn cell_and_pointer_runs_do_not_mix() {
        assert_eq!(
            vec![arg(CellAdd, 2), arg(MovePointerAdd, 2), arg(CellAdd, 2), op(EndOfStream)],
            compile("++>>++")
        );
    }

    #[test]
    fn large_cell_runs_keep_their_full_magnitude() {
        let source = "+".repeat(300);
        assert_eq!(vec![arg(CellAdd, 300), op(EndOfStream)], compile(&source));
    }

    #[test]
    fn leading_loop_is_dead_code() {
        assert_eq!(compile("+."), compile("[foo]+."));
        assert_eq!(compile("+."), compile("[-+<>.,]+."));
        assert_eq!(vec![op(EndOfStream)], compile("[]"));
    }

    #[test]
    fn loop_after_output_is_not_dead() {
        assert_eq!(
            vec![op(OutputChar), op(LoopOpen), op(OutputChar), op(LoopClose), op(EndOfStream)],
            compile(".[.]")
        );
    }

    #[test]
    fn zeroing_loops_become_cell_zero() {
        assert_eq!(vec![op(CellInc), op(CellZero), op(EndOfStream)], compile("+[-]"));
        assert_eq!(vec![op(CellInc), op(CellZero), op(EndOfStream)], compile("+[+]"));
        assert_eq!(
            vec![op(CellInc), op(CellZero), op(CellInc), op(EndOfStream)],
            compile("+[ - ]+")
        );
    }

    #[test]
    fn longer_loops_are_kept() {
        assert_eq!(
            vec![
                arg(CellAdd, 2),
                op(LoopOpen),
                op(MovePointerInc),
                arg(CellAdd, 2),
                op(MovePointerDec),
                op(CellDec),
                op(LoopClose),
                op(EndOfStream)
            ],
            compile("++[>++<-]")
        );
        assert_eq!(
            vec![op(CellInc), op(LoopOpen), arg(CellSub, 2), op(LoopClose), op(EndOfStream)],
            compile("+[--]")
        );
    }

    #[test]
    fn a_loop_around_a_zeroing_loop() {
        assert_eq!(
            vec![op(CellInc), op(LoopOpen), op(CellZero), op(LoopClose), op(EndOfStream)],
            compile("+[[-]]")
        );
    }

    #[test]
    fn no_adjacent_foldable_opcodes() {
        let code = compile("+++[>+++++<-]>[<+>-]<<<<>>>+-+-++[[-]>>>--<<<+]...,,<>[-]-");
        for pair in code.windows(2) {
            let (a, b) = (pair[0].kind, pair[1].kind);
            let same_family = |k: OpcodeKind| {
                matches!(k, CellInc | CellDec | CellAdd | CellSub) as u8
                    + 2 * matches!(
                        k,
                        MovePointerInc | MovePointerDec | MovePointerAdd | MovePointerSub
                    ) as u8
            };
            assert!(
                !(a.is_coalesced() && b.is_coalesced() && same_family(a) == same_family(b)),
                "{:?} followed by {:?} should have been folded",
                a,
                b
            );
        }
    }

    #[test]
    fn ends_with_exactly_one_end_of_stream() {
        let code = compile("+[>,.<-]");
        assert_eq!(1, code.iter().filter(|o| o.kind == EndOfStream).count());
        assert_eq!(EndOfStream, code.last().unwrap().kind);
    }

    #[test]
    fn unmatched_open_is_diagnosed() {
        let diagnostics = diagnose("+\n[>+");
        assert_eq!(1, diagnostics.len());
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(Reason::UnmatchedOpenLoop, diagnostic.reason());
        assert_eq!(2, diagnostic.line());
    }

    #[test]
    fn unmatched_opens_are_reported_in_order() {
        let diagnostics = diagnose("+\n[\n[\n[-]\n");
        let lines: Vec<_> = diagnostics.iter().map(|d| d.line()).collect();
        assert_eq!(vec![2, 3], lines);
        assert_eq!(2, diagnostics.count_of(Reason::UnmatchedOpenLoop));
    }

    #[test]
    fn unclosed_dead_loop_is_fatal() {
        let diagnostics = diagnose("[+\n+");
        assert_eq!(1, diagnostics.len());
        assert!(diagnostics.is_fatal());
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(Reason::UnmatchedOpenLoop, diagnostic.reason());
        assert_eq!(2, diagnostic.line());
    }

    #[test]
    fn unmatched_close_is_diagnosed_and_generation_continues() {
        let diagnostics = diagnose("+]\n+\n]");
        assert_eq!(2, diagnostics.count_of(Reason::UnmatchedCloseLoop));
        assert!(!diagnostics.is_fatal());
        let lines: Vec<_> = diagnostics.iter().map(|d| d.line()).collect();
        assert_eq!(vec![1, 3], lines);
    }

    #[test]
    fn exactly_one_unmatched_close() {
        let diagnostics = diagnose("+]+.");
        assert_eq!(1, diagnostics.len());
        assert_eq!(1, diagnostics.count_of(Reason::UnmatchedCloseLoop));
    }

    #[test]
    fn dead_loop_does_not_track_nesting() {
        // The first `]` ends the skipped loop, which leaves the second one unmatched.
        let diagnostics = diagnose("[[]]+");
        assert_eq!(1, diagnostics.count_of(Reason::UnmatchedCloseLoop));
    }

    #[test]
    fn too_many_diagnostics_stop_generation() {
        let source = format!("+{}", "]".repeat(50));
        let diagnostics = diagnose(&source);
        assert_eq!(DEFAULT_DIAGNOSTIC_LIMIT, diagnostics.len());
        assert!(diagnostics.is_fatal());
        assert!(diagnostics.limit_reached());
    }

    #[test]
    fn diagnostic_limit_is_configurable() {
        let tokens = tokenize(b"+]]]]]");
        let diagnostics = generate_with_options(&tokens, GeneratorOptions { diagnostic_limit: 2 })
            .expect_err("should not compile");
        assert_eq!(2, diagnostics.len());
        assert!(diagnostics.is_fatal());
    }

    #[test]
    fn limit_also_caps_unmatched_opens() {
        let source = format!("+{}", "[".repeat(30));
        let diagnostics = diagnose(&source);
        assert_eq!(DEFAULT_DIAGNOSTIC_LIMIT, diagnostics.len());
        assert_eq!(DEFAULT_DIAGNOSTIC_LIMIT, diagnostics.count_of(Reason::UnmatchedOpenLoop));
    }
}
