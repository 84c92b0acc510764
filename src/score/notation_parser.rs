//! Parsers for the textual cells of a tab.
//!
//! A string cell is either empty, a dead note `x`, a lone tie symbol
//! (`h`, `p`, `/`, `\`) or a fretted note such as `/7b9~>h`:
//! optional slide-in prefix, fret, then any number of modifiers.

use crate::score::song::{
    Bend, FrettedNote, SlideDirection, StringCell, Stroke, StrokeKind, Tie, MAX_FRET,
};
use crate::TabError;
use nom::branch::alt;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, opt, value, verify};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{IResult, Parser};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modifier {
    Bend(Option<u8>),
    Vibrato,
    Accent,
    Staccato,
    Tie(Tie),
}

fn fret(input: &str) -> IResult<&str, u8> {
    verify(map_res(digit1, str::parse::<u8>), |fret| *fret <= MAX_FRET).parse(input)
}

fn slide_direction(input: &str) -> IResult<&str, SlideDirection> {
    alt((
        value(SlideDirection::Up, char('/')),
        value(SlideDirection::Down, char('\\')),
    ))
    .parse(input)
}

fn tie(input: &str) -> IResult<&str, Tie> {
    alt((
        value(Tie::HammerOn, char('h')),
        value(Tie::PullOff, char('p')),
        map(slide_direction, Tie::Slide),
    ))
    .parse(input)
}

fn modifier(input: &str) -> IResult<&str, Modifier> {
    alt((
        map(preceded(char('b'), opt(fret)), Modifier::Bend),
        value(Modifier::Vibrato, char('~')),
        value(Modifier::Accent, char('>')),
        value(Modifier::Staccato, char('.')),
        map(tie, Modifier::Tie),
    ))
    .parse(input)
}

fn fretted_note(input: &str) -> IResult<&str, FrettedNote> {
    map(
        (opt(slide_direction), fret, many0(modifier)),
        |(slide_in, fret, modifiers)| {
            let mut note = FrettedNote::new(fret);
            note.slide_in = slide_in;
            for modifier in modifiers {
                match modifier {
                    Modifier::Bend(target_fret) => note.bend = Some(Bend { target_fret }),
                    Modifier::Vibrato => note.vibrato = true,
                    Modifier::Accent => note.accent = true,
                    Modifier::Staccato => note.staccato = true,
                    Modifier::Tie(tie) => note.tie = Some(tie),
                }
            }
            note
        },
    )
    .parse(input)
}

fn cell(input: &str) -> IResult<&str, StringCell> {
    alt((
        map(fretted_note, StringCell::Fret),
        value(StringCell::Dead, char('x')),
        map(tie, StringCell::Tie),
    ))
    .parse(input)
}

fn stroke_kind(input: &str) -> IResult<&str, StrokeKind> {
    alt((
        value(StrokeKind::Down, char('v')),
        value(StrokeKind::Up, char('^')),
        value(StrokeKind::Rest, char('s')),
    ))
    .parse(input)
}

fn stroke(input: &str) -> IResult<&str, Stroke> {
    map(
        (opt(stroke_kind), opt(alt((char('>'), char('.'))))),
        |(kind, suffix)| Stroke {
            kind,
            accent: suffix == Some('>'),
            staccato: suffix == Some('.'),
        },
    )
    .parse(input)
}

pub fn parse_cell(text: &str) -> Result<StringCell, TabError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(StringCell::Empty);
    }
    all_consuming(cell)
        .parse(trimmed)
        .map(|(_, cell)| cell)
        .map_err(|err| TabError::ParsingError(format!("invalid tab cell {text:?}: {err:?}")))
}

pub fn parse_stroke(text: &str) -> Result<Stroke, TabError> {
    all_consuming(stroke)
        .parse(text.trim())
        .map(|(_, stroke)| stroke)
        .map_err(|err| TabError::ParsingError(format!("invalid stroke {text:?}: {err:?}")))
}
