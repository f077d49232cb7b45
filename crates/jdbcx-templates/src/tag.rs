/// Which variable-reference family is active for a given statement.
///
/// Only one family is recognized at a time so that the chosen family never
/// collides with whichever block-delimiter pair (`{{`/`}}`, `<<`/`>>`,
/// `[[`/`]]`) is in use for that statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStyle {
    #[default]
    Brace,
    Angle,
    Square,
}

impl TagStyle {
    pub(crate) fn delimiters(self) -> (char, char) {
        match self {
            TagStyle::Brace => ('{', '}'),
            TagStyle::Angle => ('<', '>'),
            TagStyle::Square => ('[', ']'),
        }
    }

    /// `${name}` is the only form that carries a leading `$` sigil; the
    /// angle/square families are bare `<name>` / `[name]`.
    pub(crate) fn requires_sigil(self) -> bool {
        matches!(self, TagStyle::Brace)
    }
}
