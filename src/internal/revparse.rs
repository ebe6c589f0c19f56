//! Revision parser: `<rev>`, `<rev>..<rev>`, and the `^[N]`/`~N` suffix
//! operators (`spec.md` §4.F).

use crate::errors::CovError;
use crate::hash::Oid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevSpec {
    Single(Oid),
    Range(Oid, Oid),
}

/// Everything the parser needs from the repository to resolve names and walk
/// parent chains, kept abstract so this module doesn't depend on the concrete
/// repository type.
pub trait RevContext {
    /// Resolve `name` (possibly `HEAD`) through `dwim` and peel any symbolic
    /// chain down to a direct target.
    fn peel_name(&self, name: &str) -> Result<Option<Oid>, CovError>;
    /// Resolve an abbreviated hex prefix (3..=39 chars) to the one object it
    /// names.
    fn resolve_prefix(&self, prefix: &str) -> Result<Oid, CovError>;
    /// The parent of a `Report`, or `None` if it has none.
    fn parent_of(&self, oid: Oid) -> Result<Option<Oid>, CovError>;
}

#[derive(Debug, Clone, Copy)]
enum Suffix {
    Caret(u32),
    Tilde(u32),
}

/// Parse and resolve `text` against `ctx`.
pub fn parse(text: &str, ctx: &impl RevContext) -> Result<RevSpec, CovError> {
    if text.contains("@{") {
        return Err(CovError::InvalidRevision(
            text.to_string(),
            "`@{N}` reflog syntax is not supported".to_string(),
        ));
    }

    let mut parts = text.splitn(3, "..");
    let first = parts.next().unwrap_or("");
    let second = parts.next();
    if parts.next().is_some() {
        return Err(CovError::InvalidRevision(
            text.to_string(),
            "a revision range has exactly one `..`".to_string(),
        ));
    }

    match second {
        None => Ok(RevSpec::Single(resolve_expr(first, ctx)?)),
        Some(right) => {
            let left = if first.is_empty() { "HEAD" } else { first };
            let right = if right.is_empty() { "HEAD" } else { right };
            Ok(RevSpec::Range(
                resolve_expr(left, ctx)?,
                resolve_expr(right, ctx)?,
            ))
        }
    }
}

fn resolve_expr(expr: &str, ctx: &impl RevContext) -> Result<Oid, CovError> {
    let expr = if expr.is_empty() { "HEAD" } else { expr };
    let split_at = expr
        .find(['^', '~'])
        .unwrap_or(expr.len());
    let (base, mut rest) = expr.split_at(split_at);

    let mut ops = Vec::new();
    while !rest.is_empty() {
        let op_char = rest.as_bytes()[0];
        rest = &rest[1..];
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let n = if digits_len == 0 {
            1
        } else {
            rest[..digits_len]
                .parse::<u32>()
                .map_err(|_| invalid(expr, "suffix operand is not a valid number"))?
        };
        rest = &rest[digits_len..];
        ops.push(match op_char {
            b'^' => Suffix::Caret(n),
            b'~' => Suffix::Tilde(n),
            _ => return Err(invalid(expr, "unsupported suffix operator")),
        });
    }

    let mut oid = resolve_base(base, expr, ctx)?;
    for op in ops {
        oid = apply_suffix(oid, op, expr, ctx)?;
    }
    Ok(oid)
}

fn resolve_base(base: &str, expr: &str, ctx: &impl RevContext) -> Result<Oid, CovError> {
    let base = if base.is_empty() { "HEAD" } else { base };
    let is_hex = !base.is_empty() && base.bytes().all(|b| b.is_ascii_hexdigit());
    if is_hex && base.len() == crate::hash::OID_HEX_LEN {
        base.parse()
    } else if is_hex && base.len() >= 3 {
        ctx.resolve_prefix(base)
    } else {
        ctx.peel_name(base)?
            .ok_or_else(|| CovError::NotFound(format!("revision `{expr}`")))
    }
}

fn apply_suffix(oid: Oid, op: Suffix, expr: &str, ctx: &impl RevContext) -> Result<Oid, CovError> {
    match op {
        Suffix::Caret(0) => Ok(oid),
        Suffix::Caret(1) => parent(oid, expr, ctx),
        Suffix::Caret(_) => Err(invalid(
            expr,
            "cov reports have at most one parent; only `^` and `^1` are valid",
        )),
        Suffix::Tilde(n) => {
            let mut current = oid;
            for _ in 0..n {
                current = parent(current, expr, ctx)?;
            }
            Ok(current)
        }
    }
}

fn parent(oid: Oid, expr: &str, ctx: &impl RevContext) -> Result<Oid, CovError> {
    ctx.parent_of(oid)?
        .ok_or_else(|| CovError::InvalidRevision(expr.to_string(), "no such parent".to_string()))
}

fn invalid(expr: &str, reason: &str) -> CovError {
    CovError::InvalidRevision(expr.to_string(), reason.to_string())
}
