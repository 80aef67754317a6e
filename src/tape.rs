//! This module defines the `Tape` used by tape machines: a symbol sequence that is infinite in
//! both directions, with a single read/write head.

use crate::types::{Direction, Symbol};
use std::collections::VecDeque;
use std::fmt;

/// A tape with a read/write head.
///
/// Only the visited part of the tape is stored. `origin` is the position of the first stored
/// cell, so positions stay stable when the tape grows to the left and the head may become
/// negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: VecDeque<Symbol>,
    origin: i64,
    head: i64,
    blank: Symbol,
}

impl Tape {
    /// Creates a tape holding `contents` from position 0 with the head on the first symbol.
    pub fn new(contents: &str, blank: Symbol) -> Self {
        let mut cells: VecDeque<Symbol> = contents.chars().collect();
        if cells.is_empty() {
            cells.push_back(blank);
        }

        Self {
            cells,
            origin: 0,
            head: 0,
            blank,
        }
    }

    /// Returns the symbol under the head.
    pub fn read(&self) -> Symbol {
        self.get(self.head)
    }

    /// Returns the symbol at an arbitrary position. Unvisited cells are blank.
    pub fn get(&self, position: i64) -> Symbol {
        usize::try_from(position - self.origin)
            .ok()
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(self.blank)
    }

    /// Writes a symbol under the head.
    pub fn write(&mut self, symbol: Symbol) {
        self.extend_to_head();
        let index = (self.head - self.origin) as usize;
        self.cells[index] = symbol;
    }

    /// Moves the head one cell, extending the stored cells with blanks when it walks off an end.
    pub fn shift(&mut self, direction: Direction) {
        match direction {
            Direction::Left => self.head -= 1,
            Direction::Right => self.head += 1,
            Direction::Stay => {}
        }
        self.extend_to_head();
    }

    fn extend_to_head(&mut self) {
        while self.head < self.origin {
            self.cells.push_front(self.blank);
            self.origin -= 1;
        }
        while self.head >= self.origin + self.cells.len() as i64 {
            self.cells.push_back(self.blank);
        }
    }

    /// Returns the current head position.
    pub fn head(&self) -> i64 {
        self.head
    }

    /// Returns the position of the leftmost stored cell.
    pub fn origin(&self) -> i64 {
        self.origin
    }

    pub fn blank(&self) -> Symbol {
        self.blank
    }

    /// Returns the stored cells, leftmost first.
    pub fn cells(&self) -> Vec<Symbol> {
        self.cells.iter().copied().collect()
    }

    /// Returns the stored cells with leading and trailing blanks removed.
    pub fn contents(&self) -> String {
        let text: String = self.cells.iter().collect();
        text.trim_matches(self.blank).to_string()
    }
}

impl fmt::Display for Tape {
    /// Renders the stored cells with the symbol under the head in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, symbol) in self.cells.iter().enumerate() {
            if self.origin + offset as i64 == self.head {
                write!(f, "[{symbol}]")?;
            } else {
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}
