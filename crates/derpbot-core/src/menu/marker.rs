//! Typed reaction markers recognised by the menus.
//!
//! Raw emoji coming from the platform are parsed here and nowhere else; anything
//! that does not map onto a [`Marker`] never reaches a session.

/// Keycap emoji for choice positions 1..=9.
const KEYCAPS: [&str; 9] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
    "6\u{fe0f}\u{20e3}",
    "7\u{fe0f}\u{20e3}",
    "8\u{fe0f}\u{20e3}",
    "9\u{fe0f}\u{20e3}",
];

const HOME: &str = "🏡";
const PREVIOUS: &str = "◀";
const NEXT: &str = "▶";

/// Largest option set a choice prompt can label.
pub const MAX_CHOICES: usize = KEYCAPS.len();

/// Navigation actions of the paginated browser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nav {
    Home,
    Previous,
    Next,
}

impl Nav {
    /// Attachment order of the navigation affordances.
    pub const ALL: [Nav; 3] = [Nav::Home, Nav::Previous, Nav::Next];
}

/// Keycap label of a choice, always within 1..=9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Keycap(u8);

impl Keycap {
    pub fn new(label: u8) -> Option<Self> {
        (1..=MAX_CHOICES as u8).contains(&label).then_some(Keycap(label))
    }

    pub fn label(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

/// A reactable affordance the menus attach to a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    Choice(Keycap),
    Nav(Nav),
}

impl Marker {
    /// Choice marker labelled `label` (1..=9).
    pub fn keycap(label: u8) -> Option<Self> {
        Keycap::new(label).map(Marker::Choice)
    }

    /// Marker for the zero-based option `index`, if it has one.
    pub fn for_position(index: usize) -> Option<Self> {
        u8::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(Marker::keycap)
    }

    /// Zero-based option index for choice markers.
    pub fn position(self) -> Option<usize> {
        match self {
            Marker::Choice(k) => Some(k.index()),
            Marker::Nav(_) => None,
        }
    }

    pub fn nav(self) -> Option<Nav> {
        match self {
            Marker::Nav(nav) => Some(nav),
            Marker::Choice(_) => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Marker::Choice(k) => KEYCAPS[k.index()],
            Marker::Nav(Nav::Home) => HOME,
            Marker::Nav(Nav::Previous) => PREVIOUS,
            Marker::Nav(Nav::Next) => NEXT,
        }
    }

    /// Parse a raw platform emoji.
    ///
    /// Accepts the keycaps with or without the variation selector, and the arrow
    /// affordances with a trailing variation selector (some clients send it).
    pub fn from_emoji(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.replace('\u{fe0f}', "");
        match stripped.as_str() {
            HOME => return Some(Marker::Nav(Nav::Home)),
            PREVIOUS => return Some(Marker::Nav(Nav::Previous)),
            NEXT => return Some(Marker::Nav(Nav::Next)),
            _ => {}
        }

        let mut chars = stripped.chars();
        let digit = chars.next()?;
        if chars.next()? != '\u{20e3}' || chars.next().is_some() {
            return None;
        }
        let n = u8::try_from(digit.to_digit(10)?).ok()?;
        Marker::keycap(n)
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.emoji())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_map_bijectively_onto_keycaps() {
        for i in 0..MAX_CHOICES {
            let marker = Marker::for_position(i).unwrap();
            assert_eq!(marker.position(), Some(i));
            assert_eq!(Marker::from_emoji(marker.emoji()), Some(marker));
        }
        assert_eq!(Marker::for_position(MAX_CHOICES), None);
    }

    #[test]
    fn parses_keycaps_without_variation_selector() {
        assert_eq!(Marker::from_emoji("9\u{20e3}"), Marker::keycap(9));
        assert_eq!(Marker::from_emoji("0\u{fe0f}\u{20e3}"), None);
    }

    #[test]
    fn keycaps_outside_one_to_nine_cannot_be_built() {
        assert_eq!(Keycap::new(0), None);
        assert_eq!(Keycap::new(10), None);
        assert_eq!(Marker::keycap(1).and_then(Marker::position), Some(0));
        assert_eq!(Marker::keycap(9).map(Marker::emoji), Some(KEYCAPS[8]));
        assert_eq!(Marker::for_position(usize::MAX), None);
    }

    #[test]
    fn parses_navigation_affordances() {
        assert_eq!(Marker::from_emoji("🏡"), Some(Marker::Nav(Nav::Home)));
        assert_eq!(Marker::from_emoji("◀\u{fe0f}"), Some(Marker::Nav(Nav::Previous)));
        assert_eq!(Marker::from_emoji("▶"), Some(Marker::Nav(Nav::Next)));
        assert_eq!(Marker::from_emoji("👍"), None);
        assert_eq!(Marker::from_emoji(""), None);
    }
}
