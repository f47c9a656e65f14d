//! Mangled-name demangling and parent resolution.
//!
//! A mangled function name is `<scope chain>#<plain name>`, where the chain
//! is a sequence of delimiter-prefixed segments. The delimiter declares the
//! segment's kind: `&` namespace, `~` class, `*`/`<`/`>` function. Two
//! marker forms end the chain specially: `&#` (the plain name names a
//! namespace wrapper) and `=#` (the plain name is a constructor). A segment
//! starting with `@` is a base-16 index into the module's scope-names table.
//!
//! Everything here is a pure function of (name, scope table).

use crate::error::ModuleError;

/// Marks a namespace-wrapper function name.
pub const NAMESPACE_MARK: &str = "&#";
/// Marks a constructor name.
pub const CTOR_MARK: &str = "=#";
/// Prefix of synthesized star-export service names.
pub const SERVICE_EXPORT_PREFIX: &str = "=ens";
/// Prefix of a scoped identifier requiring scope-table demangling.
pub const SCOPE_REF: char = '@';
/// Demangled name of the module entry point, parented at module level.
pub const MAIN_FUNC: &str = "func_main_0";

/// Scope delimiter characters, scanned backward from the signature boundary.
const DELIMITERS: [u8; 6] = [b'&', b'~', b'*', b'<', b'>', b'='];

/// Kind of hierarchy node a function is parented under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentKind {
    Module,
    Namespace,
    Class,
    Function,
}

/// Resolve a possibly scope-referencing segment against the scope table.
///
/// `@<hex>` is a base-16 index into `scopes`; anything else is literal.
pub fn demangle_segment(segment: &str, scopes: &[String]) -> Result<String, ModuleError> {
    let Some(digits) = segment.strip_prefix(SCOPE_REF) else {
        return Ok(segment.to_string());
    };
    let index =
        usize::from_str_radix(digits, 16).map_err(|_| ModuleError::InvalidScopeRef {
            reference: segment.to_string(),
        })?;
    scopes
        .get(index)
        .cloned()
        .ok_or(ModuleError::ScopeNameOutOfRange {
            index,
            len: scopes.len(),
        })
}

/// Whether this mangled name is a namespace wrapper function.
pub fn is_namespace_wrapper(name: &str) -> bool {
    name.contains(NAMESPACE_MARK)
}

/// Whether this mangled name is a constructor.
pub fn is_constructor(name: &str) -> bool {
    name.contains(CTOR_MARK)
}

/// Plain name after the signature boundary; the whole name when there is no
/// boundary. An empty plain name marks an anonymous function.
pub fn plain_name(name: &str) -> &str {
    match name.rfind('#') {
        Some(boundary) => &name[boundary + 1..],
        None => name,
    }
}

/// Determine the parent kind and demangled parent name of a mangled
/// function name.
///
/// Scans backward from the signature boundary for the nearest scope
/// delimiter, skipping a trailing constructor or namespace-wrapper marker
/// character first. Reaching the start of the chain without a match defaults
/// to module-level parenting (this also covers the `func_main_0` entry
/// point).
pub fn parent_of(name: &str, scopes: &[String]) -> Result<(ParentKind, String), ModuleError> {
    let Some(boundary) = name.rfind('#') else {
        return Ok((ParentKind::Module, String::new()));
    };

    let bytes = name.as_bytes();
    // The marker character of `=#` / `&#` belongs to the plain name's
    // marker, not to the scope chain.
    let mut chain_end = boundary;
    if chain_end > 0 && (bytes[chain_end - 1] == b'=' || bytes[chain_end - 1] == b'&') {
        chain_end -= 1;
    }

    let mut i = chain_end;
    while i > 0 {
        i -= 1;
        let c = bytes[i];
        if !DELIMITERS.contains(&c) {
            continue;
        }
        let segment = demangle_segment(&name[i + 1..chain_end], scopes)?;
        let kind = match c {
            b'&' => ParentKind::Namespace,
            b'~' => ParentKind::Class,
            b'*' | b'<' | b'>' | b'=' => ParentKind::Function,
            _ => unreachable!("delimiter set is exhaustive"),
        };
        return Ok((kind, segment));
    }

    // No delimiter in the chain: module-level.
    Ok((
        ParentKind::Module,
        demangle_segment(&name[..chain_end], scopes)?,
    ))
}

/// Name of the class a constructor belongs to.
///
/// The class name is the chain segment directly before the `=#` marker:
/// `"Foo~Bar=#ctor"` yields `"Bar"`.
pub fn class_name_from_ctor(name: &str, scopes: &[String]) -> Result<String, ModuleError> {
    let marker = name
        .rfind(CTOR_MARK)
        .ok_or_else(|| ModuleError::BadArgument(format!("`{name}` is not a constructor")))?;

    let bytes = name.as_bytes();
    let mut i = marker;
    while i > 0 {
        i -= 1;
        if DELIMITERS.contains(&bytes[i]) {
            return demangle_segment(&name[i + 1..marker], scopes);
        }
    }
    demangle_segment(&name[..marker], scopes)
}

/// Lexical parent of the class a constructor introduces.
///
/// The parent is the chain segment before the class segment. Only module
/// and namespace parents are honored; function- or class-as-parent edge
/// cases stay attached to the module.
pub fn class_parent_of(name: &str, scopes: &[String]) -> Result<(ParentKind, String), ModuleError> {
    let marker = name
        .rfind(CTOR_MARK)
        .ok_or_else(|| ModuleError::BadArgument(format!("`{name}` is not a constructor")))?;

    let bytes = name.as_bytes();
    let mut class_delim = None;
    let mut i = marker;
    while i > 0 {
        i -= 1;
        if DELIMITERS.contains(&bytes[i]) {
            class_delim = Some(i);
            break;
        }
    }
    let Some(d) = class_delim else {
        return Ok((ParentKind::Module, String::new()));
    };

    let mut j = d;
    while j > 0 {
        j -= 1;
        if DELIMITERS.contains(&bytes[j]) {
            if bytes[j] == b'&' {
                let segment = demangle_segment(&name[j + 1..d], scopes)?;
                return Ok((ParentKind::Namespace, segment));
            }
            return Ok((ParentKind::Module, String::new()));
        }
    }
    Ok((ParentKind::Module, String::new()))
}

/// Name of the namespace a wrapper function introduces: the plain name
/// after the `&#` marker.
pub fn namespace_name(name: &str, scopes: &[String]) -> Result<String, ModuleError> {
    if !is_namespace_wrapper(name) {
        return Err(ModuleError::BadArgument(format!(
            "`{name}` is not a namespace wrapper"
        )));
    }
    demangle_segment(plain_name(name), scopes)
}
