use std::fmt;

/// Position of a node in the source text. Both fields are 1-based.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl Location {
    pub const fn new(line: u32, col: u32) -> Location {
        Location { line, col }
    }

    /// Attaches this location to some value.
    pub fn wrap<T>(self, inner: T) -> Located<T> {
        Located {
            location: self,
            inner,
        }
    }

    /// Location one column to the left, used when a leading sign is folded
    /// into a literal.
    #[must_use]
    pub fn shifted_left(self) -> Location {
        Location {
            line: self.line,
            col: self.col.saturating_sub(1),
        }
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({self})")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Located<T> {
    pub location: Location,
    pub inner: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_shift() {
        let loc = Location::new(3, 7);
        assert_eq!(loc.to_string(), "3:7");
        assert_eq!(loc.shifted_left(), Location::new(3, 6));
        assert_eq!(Location::new(1, 0).shifted_left(), Location::new(1, 0));
    }

    #[test]
    fn wrap_keeps_location() {
        let located = Location::new(2, 4).wrap("x");
        assert_eq!(located.location, Location::new(2, 4));
        assert_eq!(located.inner, "x");
    }
}
