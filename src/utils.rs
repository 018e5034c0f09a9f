//! Small string helpers shared by the shell backend.

/// Strips the surrounding double quotes or backticks from a literal.
pub(crate) fn trim_quote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '`')
}

/// Reduces a rendered value back to the bare variable name it references,
/// e.g. `"${a[@]}"` → `a`, `"$_tmp1"` → `_tmp1`.
pub(crate) fn var_name(s: &str) -> &str {
    trim_quote(s).trim_matches(|c| "${}[@]".contains(c))
}

/// Renders a variable reference. Names carrying subscripts, slices or
/// expansions need the braced form.
pub(crate) fn var_value(name: &str) -> String {
    if name.contains(|c| "#@[:]".contains(c)) {
        format!("${{{name}}}")
    } else {
        format!("${name}")
    }
}

/// Escapes a scanned string literal (quotes included) for shell emission.
/// Literals containing backslash escapes are re-quoted with ANSI-C quoting so
/// `\n` and friends keep their meaning.
pub(crate) fn escape_string(lit: &str) -> String {
    if lit.contains('\\') {
        let inner = &lit[1..lit.len() - 1];
        format!("$'{}'", inner.replace('\'', "\\'"))
    } else {
        lit.replace('$', "\\$")
    }
}

/// Re-quotes a raw (backtick) literal as a single-quoted shell word.
pub(crate) fn quote_raw_string(lit: &str) -> String {
    let inner = lit.trim_matches('`');
    format!("'{}'", inner.replace('\'', "'\\''"))
}

/// Dotted SRC paths become flat shell names: `p.Birthday.Year` → `p__Birthday__Year`.
pub(crate) fn flat_name(name: &str) -> String {
    name.replace('.', "__")
}

/// Drops the double quotes around a rendered value, for contexts (array
/// subscripts, `bc` expressions) where they would not survive.
pub(crate) fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
