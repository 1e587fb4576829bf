//! Parser building blocks over token slices. Each combinator is built by
//! the matching function in [`super::prelude`].

use super::core::{ParseError, ParseResult, Parser};
use std::fmt;
use std::marker::PhantomData;

/// Matches one token equal to `value`.
#[derive(Clone)]
pub struct Equal<I> {
    pub(super) value: I,
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        let Some(found) = input.get(pos) else {
            return Err(ParseError::EOF);
        };
        if *found == self.value {
            Ok((pos + 1, found.clone()))
        } else {
            Err(ParseError::Fail(format!(
                "expected '{}', found '{}'",
                self.value, found
            )))
        }
    }
}

/// Matches one token for which `f` yields a value.
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    pub(super) f: F,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let token = input.get(pos).ok_or(ParseError::EOF)?;
        (self.f)(token)
            .map(|value| (pos + 1, value))
            .ok_or_else(|| ParseError::Fail("token not accepted here".to_string()))
    }
}

/// First alternative that succeeds.
pub struct Choice<I, O> {
    pub(super) alternatives: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.alternatives
            .iter()
            .find_map(|alternative| alternative.parse(input, pos).ok())
            .ok_or(ParseError::NoAlternative)
    }
}

#[derive(Clone)]
pub struct Preceded<P1, P2, I, O> {
    pub(super) prefix: P1,
    pub(super) parser: P2,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<P1, P2, I, O> Parser<I, O> for Preceded<P1, P2, I, O>
where
    P1: Parser<I, ()>,
    P2: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, ()) = self.prefix.parse(input, pos)?;
        self.parser.parse(input, pos)
    }
}

#[derive(Clone)]
pub struct Map<P, F, A, B> {
    pub(super) parser: P,
    pub(super) f: F,
    pub(super) marker: PhantomData<(A, B)>,
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (pos, value) = self.parser.parse(input, pos)?;
        Ok((pos, (self.f)(value)))
    }
}

/// Like [`Map`], but the mapping may reject the parsed value.
#[derive(Clone)]
pub struct TryMap<P, F, A, B> {
    pub(super) parser: P,
    pub(super) f: F,
    pub(super) marker: PhantomData<(A, B)>,
}

impl<I, A, B, P, F> Parser<I, B> for TryMap<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> Result<B, ParseError>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (pos, value) = self.parser.parse(input, pos)?;
        Ok((pos, (self.f)(value)?))
    }
}

#[derive(Clone)]
pub struct AsUnit<P, O> {
    pub(super) parser: P,
    pub(super) marker: PhantomData<O>,
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        let (pos, _) = self.parser.parse(input, pos)?;
        Ok((pos, ()))
    }
}

/// Zero or more repetitions. Stops at the first failure or at a match that
/// consumed nothing.
#[derive(Clone)]
pub struct Many<P, I, O> {
    pub(super) parser: P,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], mut pos: usize) -> ParseResult<Vec<O>> {
        let mut items = Vec::new();
        while let Ok((next, item)) = self.parser.parse(input, pos) {
            if next == pos {
                break;
            }
            items.push(item);
            pos = next;
        }
        Ok((pos, items))
    }
}

/// Zero or more items separated by `separator`. A trailing separator is
/// consumed.
pub struct SeparatedList<P, S, I, O> {
    pub(super) item: P,
    pub(super) separator: S,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let Ok((mut pos, first)) = self.item.parse(input, pos) else {
            return Ok((pos, Vec::new()));
        };
        let mut items = vec![first];
        while let Ok((after_separator, ())) = self.separator.parse(input, pos) {
            pos = after_separator;
            let Ok((next, item)) = self.item.parse(input, pos) else {
                break;
            };
            items.push(item);
            pos = next;
        }
        Ok((pos, items))
    }
}

#[derive(Clone)]
pub struct Optional<P, I, O> {
    pub(super) parser: P,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        Ok(self
            .parser
            .parse(input, pos)
            .map_or((pos, None), |(next, value)| (next, Some(value))))
    }
}

#[derive(Clone)]
pub struct Tuple2<P1, P2, I, O1, O2> {
    pub(super) first: P1,
    pub(super) second: P2,
    pub(super) marker: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Parser<I, (O1, O2)> for Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, a) = self.first.parse(input, pos)?;
        let (pos, b) = self.second.parse(input, pos)?;
        Ok((pos, (a, b)))
    }
}

#[derive(Clone)]
pub struct Tuple3<P1, P2, P3, I, O1, O2, O3> {
    pub(super) first: P1,
    pub(super) second: P2,
    pub(super) third: P3,
    pub(super) marker: PhantomData<(I, O1, O2, O3)>,
}

impl<P1, P2, P3, I, O1, O2, O3> Parser<I, (O1, O2, O3)> for Tuple3<P1, P2, P3, I, O1, O2, O3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3)> {
        let (pos, a) = self.first.parse(input, pos)?;
        let (pos, b) = self.second.parse(input, pos)?;
        let (pos, c) = self.third.parse(input, pos)?;
        Ok((pos, (a, b, c)))
    }
}

/// `open parser close`, keeping only the inner value.
#[derive(Clone)]
pub struct Delimited<L, P, R, I, O> {
    pub(super) open: L,
    pub(super) parser: P,
    pub(super) close: R,
    pub(super) marker: PhantomData<(I, O)>,
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, ()) = self.open.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, ()) = self.close.parse(input, pos)?;
        Ok((pos, value))
    }
}

/// Pairs the parsed value with the index of its first token.
#[derive(Clone)]
pub struct Positioned<P, O> {
    pub(super) parser: P,
    pub(super) marker: PhantomData<O>,
}

impl<I, O, P> Parser<I, (usize, O)> for Positioned<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], start: usize) -> ParseResult<(usize, O)> {
        let (pos, value) = self.parser.parse(input, start)?;
        Ok((pos, (start, value)))
    }
}

#[derive(Clone)]
pub struct WithContext<P, C> {
    pub(super) parser: P,
    pub(super) context: C,
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|inner| ParseError::WithContext {
                message: self.context.to_string(),
                inner: Box::new(inner),
            })
    }
}
