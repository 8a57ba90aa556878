//! Parameter counts recovered from function source text

use crate::helpers::FunctionSource;

/// Positional parameters and how many of them carry a default.
///
/// Rest parameters are not counted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: usize,
    pub defaults: usize,
}

impl Signature {
    /// Arguments a call must supply.
    pub fn required(&self) -> usize {
        self.params.saturating_sub(self.defaults)
    }

    /// Signature of a function, when it can be determined.
    ///
    /// Bound functions report their `length`. Native functions and derived
    /// classes without their own constructor are undeterminable.
    pub fn of(function: &FunctionSource) -> Option<Self> {
        if function.name.starts_with("bound ") {
            return Some(Self {
                params: function.length,
                defaults: 0,
            });
        }
        Self::from_source(&function.source)
    }

    pub fn from_source(source: &str) -> Option<Self> {
        let source = source.trim_start();
        if source.contains("[native code]") {
            return None;
        }
        if source.starts_with("class") && !source[5..].starts_with(is_ident) {
            return class_signature(source);
        }
        head_signature(source)
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Index past a string literal or comment starting at `i`.
fn skip_trivia(src: &[u8], i: usize) -> Option<usize> {
    match src[i] {
        quote @ (b'\'' | b'"' | b'`') => {
            let mut j = i + 1;
            while j < src.len() {
                match src[j] {
                    b'\\' => j += 2,
                    c if c == quote => return Some(j + 1),
                    _ => j += 1,
                }
            }
            Some(src.len())
        }
        b'/' if src.get(i + 1) == Some(&b'/') => Some(
            src[i..]
                .iter()
                .position(|&c| c == b'\n')
                .map_or(src.len(), |p| i + p + 1),
        ),
        b'/' if src.get(i + 1) == Some(&b'*') => Some(
            src[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(src.len(), |p| i + 2 + p + 2),
        ),
        _ => None,
    }
}

/// Significant bytes with their bracket depth. Brackets report the depth
/// outside themselves.
struct Tokens<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self {
            src: src.as_bytes(),
            pos,
            depth: 0,
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = (usize, u8, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let i = self.pos;
            let c = *self.src.get(i)?;
            if let Some(end) = skip_trivia(self.src, i) {
                self.pos = end;
                continue;
            }
            self.pos = i + 1;
            return Some(match c {
                b'(' | b'[' | b'{' => {
                    self.depth += 1;
                    (i, c, self.depth - 1)
                }
                b')' | b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    (i, c, self.depth)
                }
                _ => (i, c, self.depth),
            });
        }
    }
}

/// Count the parameters of the list opened by the `(` at `open`.
fn parameter_list(source: &str, open: usize) -> Option<Signature> {
    let src = source.as_bytes();
    let mut signature = Signature::default();
    let mut start = open + 1;
    let mut has_default = false;

    let finish = |from: usize, to: usize, has_default: bool, signature: &mut Signature| {
        let param = source[from..to].trim();
        if param.is_empty() || param.starts_with("...") {
            return;
        }
        signature.params += 1;
        if has_default {
            signature.defaults += 1;
        }
    };

    // The opening paren itself comes first and puts the list at depth 1.
    for (i, c, depth) in Tokens::new(source, open).skip(1) {
        match (c, depth) {
            (b')', 0) => {
                finish(start, i, has_default, &mut signature);
                return Some(signature);
            }
            (b',', 1) => {
                finish(start, i, has_default, &mut signature);
                start = i + 1;
                has_default = false;
            }
            (b'=', 1) => {
                let next = src.get(i + 1).copied();
                let prev = i.checked_sub(1).map(|p| src[p]);
                let operator = matches!(next, Some(b'=' | b'>'))
                    || matches!(prev, Some(b'=' | b'!' | b'<' | b'>'));
                if !operator {
                    has_default = true;
                }
            }
            _ => {}
        }
    }
    None
}

/// Functions, methods and arrows: the first top-level parameter list.
fn head_signature(source: &str) -> Option<Signature> {
    let src = source.as_bytes();
    for (i, c, depth) in Tokens::new(source, 0) {
        if depth != 0 {
            continue;
        }
        match c {
            b'(' => return parameter_list(source, i),
            // `x => ...`
            b'=' if src.get(i + 1) == Some(&b'>') => {
                return Some(Signature {
                    params: 1,
                    defaults: 0,
                })
            }
            b'{' => return None,
            _ => {}
        }
    }
    None
}

/// Classes: the parameters of `constructor(...)` in the class body.
fn class_signature(source: &str) -> Option<Signature> {
    let mut tokens = Tokens::new(source, 0);
    let (body, _, _) = tokens.find(|&(_, c, depth)| c == b'{' && depth == 0)?;
    let derived = source[..body].split(|c: char| !is_ident(c)).any(|word| word == "extends");

    for (i, c, depth) in tokens {
        if depth != 1 || c != b'(' {
            continue;
        }
        let head = source[body + 1..i].trim_end();
        if let Some(before) = head.strip_suffix("constructor") {
            let boundary = before.chars().next_back().map_or(true, |p| !is_ident(p) && p != '.');
            if boundary {
                return parameter_list(source, i);
            }
        }
    }

    if derived {
        None
    } else {
        Some(Signature::default())
    }
}
