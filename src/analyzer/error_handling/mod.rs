//! # Error Reporting for Parser Combinators
//!
//! [`Choice`](super::combinators::Choice), [`Optional`](super::combinators::Optional)
//! and [`Many`](super::combinators::Many) discard the errors of the branches
//! they backtrack from, so the error that finally surfaces rarely points at
//! the real problem. Token parsers are therefore wrapped in [`Tracked`],
//! which records every failure in a thread-local tracker. The failure that
//! got furthest into the input is the one reported to the user.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::core::{ParseResult, Parser};

/// The furthest point a parse attempt reached before failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    pub position: usize,
    /// What the parser would have accepted at `position`.
    pub expected: Vec<String>,
    /// A specific diagnosis that overrides the generic message.
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct Tracker {
    furthest: Option<Failure>,
    diagnosis: Option<Failure>,
}

thread_local! {
    static TRACKER: RefCell<Tracker> = RefCell::new(Tracker::default());
}

/// Clears the tracker. Called before each top-level parse.
pub fn reset() {
    TRACKER.with(|cell| *cell.borrow_mut() = Tracker::default());
}

/// Removes and returns the recorded failure: a specific diagnosis when one
/// was made, the furthest token failure otherwise.
pub fn take() -> Option<Failure> {
    TRACKER.with(|cell| {
        let tracker = std::mem::take(&mut *cell.borrow_mut());
        tracker.diagnosis.or(tracker.furthest)
    })
}

pub fn record_expected(position: usize, expected: &str) {
    TRACKER.with(|cell| {
        let mut tracker = cell.borrow_mut();
        let slot = &mut tracker.furthest;
        match slot.as_mut() {
            Some(failure) if failure.position > position => {}
            Some(failure) if failure.position == position => {
                if !failure.expected.iter().any(|e| e == expected) {
                    failure.expected.push(expected.to_string());
                }
            }
            _ => {
                *slot = Some(Failure {
                    position,
                    expected: vec![expected.to_string()],
                    message: None,
                })
            }
        }
    });
}

/// Records a diagnosis that takes precedence over token failures.
pub fn record_message(position: usize, message: impl Into<String>) {
    let message = message.into();
    TRACKER.with(|cell| {
        let mut tracker = cell.borrow_mut();
        let slot = &mut tracker.diagnosis;
        if slot.as_ref().map_or(true, |d| d.position <= position) {
            *slot = Some(Failure {
                position,
                expected: Vec::new(),
                message: Some(message),
            });
        }
    });
}

/// Records a failure of the inner parser under the name `expected`.
pub struct Tracked<P, O> {
    parser: P,
    expected: String,
    _phantom: PhantomData<O>,
}

impl<P, O> Tracked<P, O> {
    pub fn new(parser: P, expected: impl Into<String>) -> Self {
        Self {
            parser,
            expected: expected.into(),
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, O> for Tracked<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser.parse(input, pos).inspect_err(|_| {
            record_expected(pos, &self.expected);
        })
    }
}
