//! Mapping from dot patterns to characters.
//!
//! [`AlphabetTable`] is a validated bijection between non-empty dot
//! patterns and characters. It is built once and shared read-only by
//! every tile classifier; lookup is exact, and a pattern not in the table
//! is reported as unknown rather than guessed.

use std::collections::HashMap;

use crate::dots::{BrailleDots, ParseDotsError};

/// Russian Braille, uppercase, as conventional dot numbers.
pub const RUSSIAN: [(char, &str); 33] = [
    ('А', "1"),
    ('Б', "12"),
    ('В', "2456"),
    ('Г', "1245"),
    ('Д', "145"),
    ('Е', "15"),
    ('Ё', "16"),
    ('Ж', "245"),
    ('З', "1356"),
    ('И', "24"),
    ('Й', "12346"),
    ('К', "13"),
    ('Л', "123"),
    ('М', "134"),
    ('Н', "1345"),
    ('О', "135"),
    ('П', "1234"),
    ('Р', "1235"),
    ('С', "234"),
    ('Т', "2345"),
    ('У', "136"),
    ('Ф', "124"),
    ('Х', "125"),
    ('Ц', "14"),
    ('Ч', "12345"),
    ('Ш', "156"),
    ('Щ', "1346"),
    ('Ъ', "12356"),
    ('Ы', "2346"),
    ('Ь', "23456"),
    ('Э', "246"),
    ('Ю', "1256"),
    ('Я', "1246"),
];

/// Integrity violations found while building an [`AlphabetTable`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlphabetError {
    /// Two characters share one pattern.
    #[error("pattern {pattern} is assigned to both {first:?} and {second:?}")]
    DuplicatePattern {
        /// The shared pattern.
        pattern: BrailleDots,
        /// Character that claimed the pattern first.
        first: char,
        /// Character that claimed it again.
        second: char,
    },
    /// One character appears twice.
    #[error("character {0:?} appears more than once")]
    DuplicateCharacter(char),
    /// A character was given no raised dots.
    #[error("character {0:?} has an empty pattern")]
    EmptyPattern(char),
    /// A pattern string could not be parsed.
    #[error("pattern for {character:?} is malformed: {source}")]
    Malformed {
        /// The character whose pattern failed to parse.
        character: char,
        /// The parse failure.
        source: ParseDotsError,
    },
}

/// A validated pattern-to-character table.
#[derive(Debug, Clone)]
pub struct AlphabetTable {
    entries: Vec<(char, BrailleDots)>,
    by_pattern: HashMap<BrailleDots, char>,
}

impl AlphabetTable {
    /// Build a table from `(character, pattern)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an [`AlphabetError`] if a pattern is empty or repeated, or
    /// a character is repeated.
    pub fn new(
        entries: impl IntoIterator<Item = (char, BrailleDots)>,
    ) -> Result<Self, AlphabetError> {
        let mut table = Self {
            entries: Vec::new(),
            by_pattern: HashMap::new(),
        };
        for (character, pattern) in entries {
            if pattern.is_empty() {
                return Err(AlphabetError::EmptyPattern(character));
            }
            if table.entries.iter().any(|&(c, _)| c == character) {
                return Err(AlphabetError::DuplicateCharacter(character));
            }
            if let Some(&first) = table.by_pattern.get(&pattern) {
                return Err(AlphabetError::DuplicatePattern {
                    pattern,
                    first,
                    second: character,
                });
            }
            table.by_pattern.insert(pattern, character);
            table.entries.push((character, pattern));
        }
        Ok(table)
    }

    /// Build a table from dot-number strings such as `"1245"`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`AlphabetError::Malformed`] for
    /// strings that are not dot numbers.
    pub fn from_numbers(entries: &[(char, &str)]) -> Result<Self, AlphabetError> {
        Self::parse_with(entries, BrailleDots::from_numbers)
    }

    /// Build a table from flag strings such as `"FFEFFE"`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`AlphabetError::Malformed`] for
    /// strings that are not six `F`/`E` flags.
    pub fn from_flags(entries: &[(char, &str)]) -> Result<Self, AlphabetError> {
        Self::parse_with(entries, |s| s.parse::<BrailleDots>())
    }

    fn parse_with(
        entries: &[(char, &str)],
        parse: impl Fn(&str) -> Result<BrailleDots, ParseDotsError>,
    ) -> Result<Self, AlphabetError> {
        let parsed = entries
            .iter()
            .map(|&(character, text)| {
                parse(text)
                    .map(|dots| (character, dots))
                    .map_err(|source| AlphabetError::Malformed { character, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// The built-in Russian table.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in data itself is inconsistent.
    pub fn russian() -> Result<Self, AlphabetError> {
        Self::from_numbers(&RUSSIAN)
    }

    /// The character for `dots`, or `None` if the pattern is unknown.
    #[must_use]
    pub fn lookup(&self, dots: BrailleDots) -> Option<char> {
        self.by_pattern.get(&dots).copied()
    }

    /// The pattern assigned to `character`.
    #[must_use]
    pub fn pattern_of(&self, character: char) -> Option<BrailleDots> {
        self.entries
            .iter()
            .find(|&&(c, _)| c == character)
            .map(|&(_, d)| d)
    }

    /// Entries in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (char, BrailleDots)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
