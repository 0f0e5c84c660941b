// name.rs — I/O name codec
//
// Decodes structured I/O names such as `IX0.7`, `QB3_0` or `TX0.4` into
// their parts and encodes them back. Any name that does not fit the
// pattern is a plain name; that is not an error.
//
//   <area><width><byte>[.<bit>][_<digits>]
//   area:  I (input) | Q (output) | T (internal timer marker)
//   width: X (bit) | B (byte) | W (word) | L (long)
//
// Preconditions: none.
// Postconditions: `decode(s).map(|n| n.to_string()) == Some(s)` for every
//   accepted `s` (the codec is exact, leading zeros are rejected).
// Failure modes: none; malformed names decode to `None`.
// Side effects: none.

use std::fmt;

use serde::Serialize;

const MAX_BYTE_DIGITS: usize = 5;
const MAX_TAIL_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Area {
    Input,
    Output,
    Timer,
}

impl Area {
    pub fn letter(self) -> char {
        match self {
            Area::Input => 'I',
            Area::Output => 'Q',
            Area::Timer => 'T',
        }
    }

    fn from_letter(c: u8) -> Option<Self> {
        match c {
            b'I' => Some(Area::Input),
            b'Q' => Some(Area::Output),
            b'T' => Some(Area::Timer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Width {
    Bit,
    Byte,
    Word,
    Long,
}

impl Width {
    pub fn letter(self) -> char {
        match self {
            Width::Bit => 'X',
            Width::Byte => 'B',
            Width::Word => 'W',
            Width::Long => 'L',
        }
    }

    fn from_letter(c: u8) -> Option<Self> {
        match c {
            b'X' => Some(Width::Bit),
            b'B' => Some(Width::Byte),
            b'W' => Some(Width::Word),
            b'L' => Some(Width::Long),
            _ => None,
        }
    }

    /// Output mask for a whole word of this width. Bit words collect the
    /// masks of their used bits instead.
    pub fn word_mask(self) -> u32 {
        match self {
            Width::Bit => 0,
            Width::Byte => 0xff,
            Width::Word => 0xffff,
            Width::Long => 0xffff_ffff,
        }
    }
}

/// A decoded I/O name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IoName {
    pub area: Area,
    pub width: Width,
    pub byte: u32,
    /// Bit position 0..=7, only for `X` width.
    pub bit: Option<u8>,
    /// Compiler-generated instance suffix including the underscore, or "".
    pub tail: String,
}

impl IoName {
    /// Name of the word that aggregates this bit: same area and byte,
    /// width `X`, no bit and no tail.
    pub fn aggregate_name(&self) -> String {
        format!("{}X{}", self.area.letter(), self.byte)
    }

    /// Single-bit mask for a bit name.
    pub fn bit_mask(&self) -> Option<u8> {
        self.bit.map(|b| 1u8 << b)
    }

    pub fn is_word(&self) -> bool {
        self.bit.is_none() && self.tail.is_empty()
    }
}

impl fmt::Display for IoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.area.letter(), self.width.letter(), self.byte)?;
        if let Some(bit) = self.bit {
            write!(f, ".{}", bit)?;
        }
        f.write_str(&self.tail)
    }
}

/// Decode a structured I/O name. Returns `None` for plain names.
pub fn decode(name: &str) -> Option<IoName> {
    let bytes = name.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    let area = Area::from_letter(bytes[0])?;
    let width = Width::from_letter(bytes[1])?;
    let rest = &name[2..];

    let (byte, rest) = split_number(rest, MAX_BYTE_DIGITS)?;
    let (bit, rest) = match rest.strip_prefix('.') {
        Some(after) if width == Width::Bit => {
            let (bit, after) = split_number(after, 1)?;
            if bit > 7 {
                return None;
            }
            (Some(bit as u8), after)
        }
        Some(_) => return None,
        None => (None, rest),
    };
    if !rest.is_empty() && !is_tail(rest) {
        return None;
    }
    Some(IoName {
        area,
        width,
        byte,
        bit,
        tail: rest.to_string(),
    })
}

pub fn encode(io: &IoName) -> String {
    io.to_string()
}

/// Leading decimal number of at most `max_digits` digits, no leading zeros.
fn split_number(s: &str, max_digits: usize) -> Option<(u32, &str)> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 || len > max_digits || (len > 1 && s.starts_with('0')) {
        return None;
    }
    let value = s[..len].parse().ok()?;
    Some((value, &s[len..]))
}

fn is_tail(s: &str) -> bool {
    s.len() <= MAX_TAIL_LEN
        && s.len() >= 2
        && s.starts_with('_')
        && s[1..].bytes().all(|b| b.is_ascii_digit())
}

// ── C identifier mangling ────────────────────────────────────────────────

/// Map a node name to a C identifier: `IX1.7_2` becomes `IX1_7_2`, numeric
/// constant `5` becomes `_5` and `-5` becomes `__5`. Other names pass
/// through unchanged.
pub fn mangle(name: &str) -> String {
    if let Some(io) = decode(name) {
        if let Some(bit) = io.bit {
            return format!(
                "{}{}{}_{}{}",
                io.area.letter(),
                io.width.letter(),
                io.byte,
                bit,
                io.tail
            );
        }
        return name.to_string();
    }
    if let Some(digits) = name.strip_prefix('-') {
        if is_number(digits) {
            return format!("__{}", digits);
        }
    } else if is_number(name) {
        return format!("_{}", name);
    }
    name.to_string()
}

/// Inverse of `mangle` for identifiers it produces.
pub fn unmangle(ident: &str) -> String {
    if let Some(digits) = ident.strip_prefix("__") {
        if is_number(digits) {
            return format!("-{}", digits);
        }
    } else if let Some(digits) = ident.strip_prefix('_') {
        if is_number(digits) {
            return digits.to_string();
        }
    }
    // IX1_7 or IX1_7_2: the first underscore after the byte separates the bit
    if let Some(io) = decode(ident) {
        if io.width == Width::Bit && io.bit.is_none() && io.tail.len() == 2 {
            return format!("{}X{}.{}", io.area.letter(), io.byte, &io.tail[1..]);
        }
    }
    if let Some(pos) = ident.find('_') {
        let (head, rest) = ident.split_at(pos);
        let rest = &rest[1..];
        if rest.len() > 2 && rest.as_bytes()[1] == b'_' {
            let candidate = format!("{}.{}", head, rest);
            if let Some(io) = decode(&candidate) {
                if io.bit.is_some() {
                    return candidate;
                }
            }
        }
    }
    ident.to_string()
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
