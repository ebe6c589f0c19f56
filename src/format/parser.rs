//! Template tokenizer: turns a `%`-directive template string into a tree of
//! [`Node`]s (`spec.md` §4.G "Grammar").
//!
//! Grounded on the dispatch table in the original `cov` tool's
//! `format/parser.cc` (`parser::parse`, `parse_hash`, `parse_person`,
//! `parse_report`, `parse_stats`, `parse_color`, `parse_width`,
//! `start_block`/`end_block`); block syntax here uses the two-character
//! `%]` terminator as documented, rather than the original's `%]}`.

use crate::errors::CovError;
use crate::format::color::ColorSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSlot {
    Primary,
    Secondary,
    Tertiary,
    Quaternary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    Author,
    Committer,
    Reporter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonField {
    Name,
    Email,
    EmailLocal,
    Date,
    DateRelative,
    DateTimestamp,
    DateIsoLike,
    DateIsoStrict,
    DateShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Lines,
    Functions,
    Branches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMetric {
    Count,
    Total,
    Visited,
    Percent,
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDirective {
    pub kind: StatKind,
    pub metric: StatMetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width {
    pub total: u32,
    pub indent1: u32,
    pub indent2: u32,
}

impl Default for Width {
    fn default() -> Self {
        Width {
            total: 76,
            indent1: 6,
            indent2: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Hash { slot: HashSlot, abbreviated: bool },
    RefNames { unwrapped: bool },
    MagicRefNames { unwrapped: bool },
    Subject,
    SubjectSanitized,
    Body,
    BodyRaw,
    ReportBranch,
    Person { who: Who, field: PersonField },
    Stat(StatDirective),
    Color(ColorSpec),
    Width(Width),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Directive(Directive),
    Block {
        conditional: bool,
        reference: String,
        children: Vec<Node>,
    },
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

enum Parsed {
    Directive(Directive),
    Newline,
    Percent,
    Literal(char),
    BlockStart { conditional: bool, reference: String },
    BlockEnd,
}

/// Parse `input` into a flat forest of nodes. Malformed directives fall back
/// to literal text, matching the original parser's "unrecognised `%x` is
/// just text" behaviour.
pub fn parse_template(input: &str) -> Result<Vec<Node>, CovError> {
    let mut scanner = Scanner {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
    let mut block_refs: Vec<(bool, String)> = Vec::new();
    let mut text_start = 0usize;

    while !scanner.at_end() {
        if scanner.peek() != Some('%') {
            scanner.pos += 1;
            continue;
        }
        let text_end = scanner.pos;
        scanner.pos += 1; // consume '%'

        match parse_directive(&mut scanner) {
            Some(parsed) => {
                if text_end > text_start {
                    let text: String = scanner.chars[text_start..text_end].iter().collect();
                    stack.last_mut().unwrap().push(Node::Text(text));
                }
                match parsed {
                    Parsed::Directive(d) => stack.last_mut().unwrap().push(Node::Directive(d)),
                    Parsed::Newline => stack.last_mut().unwrap().push(Node::Text("\n".to_string())),
                    Parsed::Percent => stack.last_mut().unwrap().push(Node::Text("%".to_string())),
                    Parsed::Literal(c) => {
                        stack.last_mut().unwrap().push(Node::Text(c.to_string()))
                    }
                    Parsed::BlockStart {
                        conditional,
                        reference,
                    } => {
                        stack.push(Vec::new());
                        block_refs.push((conditional, reference));
                    }
                    Parsed::BlockEnd => {
                        let children = stack.pop().ok_or_else(|| {
                            CovError::InvalidTemplate("unmatched `%]`".to_string())
                        })?;
                        let (conditional, reference) = block_refs.pop().ok_or_else(|| {
                            CovError::InvalidTemplate("unmatched `%]`".to_string())
                        })?;
                        stack.last_mut().unwrap().push(Node::Block {
                            conditional,
                            reference,
                            children,
                        });
                    }
                }
                text_start = scanner.pos;
            }
            None => {
                // Leave text_start untouched: the '%' and whatever partial
                // directive chars were consumed become literal text on the
                // next flush.
            }
        }
    }

    if text_start < scanner.chars.len() {
        let text: String = scanner.chars[text_start..].iter().collect();
        stack.last_mut().unwrap().push(Node::Text(text));
    }

    if stack.len() != 1 {
        return Err(CovError::InvalidTemplate(
            "unterminated block (missing `%]`)".to_string(),
        ));
    }
    Ok(stack.pop().unwrap())
}

fn parse_directive(s: &mut Scanner) -> Option<Parsed> {
    let c = s.peek()?;
    match c {
        '%' => {
            s.bump();
            Some(Parsed::Percent)
        }
        'n' => {
            s.bump();
            Some(Parsed::Newline)
        }
        '{' => {
            s.bump();
            parse_block_start(s)
        }
        ']' => {
            s.bump();
            Some(Parsed::BlockEnd)
        }
        'x' => {
            s.bump();
            parse_hex_byte(s).map(|byte| Parsed::Literal(byte as char))
        }
        'C' => {
            s.bump();
            parse_color(s).map(|c| Parsed::Directive(Directive::Color(c)))
        }
        'w' => {
            s.bump();
            parse_width(s).map(|w| Parsed::Directive(Directive::Width(w)))
        }
        'm' => {
            s.bump();
            parse_magic(s)
        }
        'D' => {
            s.bump();
            Some(Parsed::Directive(Directive::RefNames { unwrapped: true }))
        }
        'd' => {
            s.bump();
            Some(Parsed::Directive(Directive::RefNames { unwrapped: false }))
        }
        's' => {
            s.bump();
            Some(Parsed::Directive(Directive::Subject))
        }
        'f' => {
            s.bump();
            Some(Parsed::Directive(Directive::SubjectSanitized))
        }
        'b' => {
            s.bump();
            Some(Parsed::Directive(Directive::Body))
        }
        'B' => {
            s.bump();
            Some(Parsed::Directive(Directive::BodyRaw))
        }
        'H' => {
            s.bump();
            parse_hash(s, false)
        }
        'h' => {
            s.bump();
            parse_hash(s, true)
        }
        'r' => {
            s.bump();
            parse_report(s)
        }
        'p' => {
            s.bump();
            parse_stats(s).map(|st| Parsed::Directive(Directive::Stat(st)))
        }
        'a' => {
            s.bump();
            parse_person(s, Who::Author)
        }
        'c' => {
            s.bump();
            parse_person(s, Who::Committer)
        }
        _ => None,
    }
}

fn hex_digit(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

fn parse_hex_byte(s: &mut Scanner) -> Option<u8> {
    let hi = hex_digit(s.peek()?)?;
    s.bump();
    let lo = hex_digit(s.peek()?)?;
    s.bump();
    Some((hi << 4) | lo)
}

fn parse_block_start(s: &mut Scanner) -> Option<Parsed> {
    let conditional = s.eat('?');
    let mut reference = String::new();
    loop {
        match s.peek() {
            Some('[') => {
                s.bump();
                break;
            }
            Some(c) => {
                reference.push(c);
                s.bump();
            }
            None => return None,
        }
    }
    Some(Parsed::BlockStart {
        conditional,
        reference,
    })
}

fn parse_hash(s: &mut Scanner, abbreviated: bool) -> Option<Parsed> {
    let c = s.bump()?;
    let slot = match c {
        'R' | 'C' | '1' => HashSlot::Primary,
        'F' | 'L' | '2' => HashSlot::Secondary,
        'P' | 'f' | '3' => HashSlot::Tertiary,
        'G' | 'B' | '4' => HashSlot::Quaternary,
        _ => return None,
    };
    Some(Parsed::Directive(Directive::Hash { slot, abbreviated }))
}

fn parse_magic(s: &mut Scanner) -> Option<Parsed> {
    match s.bump()? {
        'd' => Some(Parsed::Directive(Directive::MagicRefNames { unwrapped: false })),
        'D' => Some(Parsed::Directive(Directive::MagicRefNames { unwrapped: true })),
        _ => None,
    }
}

fn parse_date_field(c: char) -> Option<PersonField> {
    Some(match c {
        'd' => PersonField::Date,
        'r' => PersonField::DateRelative,
        't' => PersonField::DateTimestamp,
        'i' => PersonField::DateIsoLike,
        'I' => PersonField::DateIsoStrict,
        's' => PersonField::DateShort,
        _ => return None,
    })
}

fn parse_report(s: &mut Scanner) -> Option<Parsed> {
    let c = s.bump()?;
    if c == 'D' {
        return Some(Parsed::Directive(Directive::ReportBranch));
    }
    let field = parse_date_field(c)?;
    Some(Parsed::Directive(Directive::Person {
        who: Who::Reporter,
        field,
    }))
}

fn parse_person(s: &mut Scanner, who: Who) -> Option<Parsed> {
    let c = s.bump()?;
    let field = match c {
        'n' => PersonField::Name,
        'e' => PersonField::Email,
        'l' => PersonField::EmailLocal,
        _ => parse_date_field(c)?,
    };
    Some(Parsed::Directive(Directive::Person { who, field }))
}

fn stat_suffix(c: char) -> Option<StatKind> {
    Some(match c {
        'L' => StatKind::Lines,
        'F' => StatKind::Functions,
        'B' => StatKind::Branches,
        _ => return None,
    })
}

fn parse_stats(s: &mut Scanner) -> Option<StatDirective> {
    let c = s.bump()?;
    if c == 'L' {
        return Some(StatDirective {
            kind: StatKind::Lines,
            metric: StatMetric::Count,
        });
    }
    let metric = match c {
        'P' => StatMetric::Percent,
        'T' => StatMetric::Total,
        'V' => StatMetric::Visited,
        'r' => StatMetric::Rating,
        _ => return None,
    };
    let kind = stat_suffix(s.bump()?)?;
    Some(StatDirective { kind, metric })
}

fn parse_color(s: &mut Scanner) -> Option<ColorSpec> {
    use crate::format::color::parse_color_name;

    if s.peek() == Some('(') {
        s.bump();
        let mut name = String::new();
        loop {
            match s.bump() {
                Some(')') => break,
                Some(c) => name.push(c),
                None => return None,
            }
        }
        return parse_color_name(&name);
    }

    match s.peek()? {
        'g' => {
            if match_literal(s, "green") {
                Some(ColorSpec::Named(crate::format::color::NamedColor::Green))
            } else {
                None
            }
        }
        'b' => {
            if match_literal(s, "blue") {
                Some(ColorSpec::Named(crate::format::color::NamedColor::Blue))
            } else {
                None
            }
        }
        'r' => {
            if match_literal(s, "red") {
                Some(ColorSpec::Named(crate::format::color::NamedColor::Red))
            } else if match_literal(s, "reset") {
                Some(ColorSpec::Reset)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn match_literal(s: &mut Scanner, text: &str) -> bool {
    let start = s.pos;
    for expected in text.chars() {
        if s.peek() != Some(expected) {
            s.pos = start;
            return false;
        }
        s.bump();
    }
    true
}

fn parse_width(s: &mut Scanner) -> Option<Width> {
    if !s.eat('(') {
        return None;
    }
    let mut args = String::new();
    loop {
        match s.bump() {
            Some(')') => break,
            Some(c) => args.push(c),
            None => return None,
        }
    }
    let args = args.trim();
    if args.is_empty() {
        return Some(Width::default());
    }

    let mut parts = args.splitn(3, ',').map(str::trim);
    let total: u32 = parts.next()?.parse().ok()?;
    let indent1 = match parts.next() {
        Some(v) => v.parse().ok()?,
        None => return Some(Width { total, indent1: 6, indent2: 9 }),
    };
    let indent2 = match parts.next() {
        Some(v) => v.parse().ok()?,
        None => return Some(Width { total, indent1, indent2: indent1 }),
    };
    if indent1 >= total || indent2 >= total {
        return None;
    }
    Some(Width { total, indent1, indent2 })
}
