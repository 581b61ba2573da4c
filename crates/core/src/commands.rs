use std::fmt;

/// Sent after every order to return all valves and pumps to idle.
pub const RESET_COMMAND: &str = "c0,s0,o0,b0";

pub const COMMAND_SEPARATOR: &str = ",";

// Closed set understood by the mixer firmware. Codes are `<valve><state>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ingredient {
    Sprite,
    Apple,
    Tea,
}

impl Ingredient {
    pub const ALL: [Ingredient; 3] = [Ingredient::Sprite, Ingredient::Apple, Ingredient::Tea];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sprite" => Some(Ingredient::Sprite),
            "apple" => Some(Ingredient::Apple),
            "tea" => Some(Ingredient::Tea),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Ingredient::Sprite => "sprite",
            Ingredient::Apple => "apple",
            Ingredient::Tea => "tea",
        }
    }

    /// Device code that opens this ingredient's valve.
    pub fn code(self) -> &'static str {
        match self {
            Ingredient::Sprite => "c1",
            Ingredient::Apple => "s1",
            Ingredient::Tea => "o1",
        }
    }
}

/// Comma-joined device codes, written to the mixer as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialCommand(String);

impl SerialCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SerialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps ingredient names to device codes in encounter order.
///
/// Unknown names are dropped rather than rejected, and duplicates are kept,
/// so `["sprite", "banana", "sprite"]` becomes `c1,c1`.
pub fn translate<S: AsRef<str>>(ingredients: &[S]) -> SerialCommand {
    let codes: Vec<&'static str> = ingredients
        .iter()
        .filter_map(|name| Ingredient::from_name(name.as_ref()))
        .map(Ingredient::code)
        .collect();
    SerialCommand(codes.join(COMMAND_SEPARATOR))
}
