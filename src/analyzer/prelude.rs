use std::marker::PhantomData;

use super::combinators::*;
use super::core::{ParseError, Parser};
use super::error_handling::Tracked;

pub fn equal<I: Clone + PartialEq>(value: I) -> Equal<I> {
    Equal { value }
}

pub fn satisfy<I, O, F>(f: F) -> Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    Satisfy {
        f,
        marker: PhantomData,
    }
}

pub fn choice<I, O>(alternatives: Vec<Box<dyn Parser<I, O>>>) -> Choice<I, O> {
    Choice { alternatives }
}

pub fn preceded<P1, P2, I, O>(prefix: P1, parser: P2) -> Preceded<P1, P2, I, O>
where
    P1: Parser<I, ()>,
    P2: Parser<I, O>,
{
    Preceded {
        prefix,
        parser,
        marker: PhantomData,
    }
}

pub fn map<P, F, A, B, I>(parser: P, f: F) -> Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    Map {
        parser,
        f,
        marker: PhantomData,
    }
}

pub fn try_map<P, F, A, B, I>(parser: P, f: F) -> TryMap<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> Result<B, ParseError>,
{
    TryMap {
        parser,
        f,
        marker: PhantomData,
    }
}

pub fn as_unit<I, O, P>(parser: P) -> AsUnit<P, O>
where
    P: Parser<I, O>,
{
    AsUnit {
        parser,
        marker: PhantomData,
    }
}

pub fn many<P, I, O>(parser: P) -> Many<P, I, O>
where
    P: Parser<I, O>,
{
    Many {
        parser,
        marker: PhantomData,
    }
}

pub fn separated_list<P, S, I, O>(item: P, separator: S) -> SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    SeparatedList {
        item,
        separator,
        marker: PhantomData,
    }
}

pub fn optional<P, I, O>(parser: P) -> Optional<P, I, O>
where
    P: Parser<I, O>,
{
    Optional {
        parser,
        marker: PhantomData,
    }
}

pub fn delimited<L, P, R, I, O>(open: L, parser: P, close: R) -> Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    Delimited {
        open,
        parser,
        close,
        marker: PhantomData,
    }
}

pub fn tuple2<P1, P2, I, O1, O2>(first: P1, second: P2) -> Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    Tuple2 {
        first,
        second,
        marker: PhantomData,
    }
}

pub fn tuple3<P1, P2, P3, I, O1, O2, O3>(
    first: P1,
    second: P2,
    third: P3,
) -> Tuple3<P1, P2, P3, I, O1, O2, O3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    Tuple3 {
        first,
        second,
        third,
        marker: PhantomData,
    }
}

pub fn positioned<P, I, O>(parser: P) -> Positioned<P, O>
where
    P: Parser<I, O>,
{
    Positioned {
        parser,
        marker: PhantomData,
    }
}

pub fn with_context<P, I, O, C>(parser: P, context: C) -> WithContext<P, C>
where
    P: Parser<I, O>,
{
    WithContext { parser, context }
}

/// Records `expected` with the furthest-failure tracker whenever `parser`
/// fails.
pub fn tracked<P, I, O>(parser: P, expected: impl Into<String>) -> Tracked<P, O>
where
    P: Parser<I, O>,
{
    Tracked::new(parser, expected)
}
