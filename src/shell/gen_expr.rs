//! The shape-aware expression translator: SRC token stream → [`ShellExpr`].
//!
//! A [`ShellExpr`] knows how to render itself two ways: as a value embedded
//! in a larger word (`as_value`) and as a standalone command (`as_exec`).
//! Which wrapper applies depends on the expression kind (plain, integer
//! arithmetic, float arithmetic via `bc`, string comparison) and on the
//! return conventions of the call it came from.

use crate::scanner::TokenKind;
use crate::types::Ty;
use crate::utils::{escape_string, flat_name, quote_raw_string, strip_quotes, var_name, var_value};

use super::builtins::{self, CallTemplate};
use super::Compiler;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ExprKind {
    #[default]
    Plain,
    IntArith,
    FloatArith,
    StrCmp,
}

/// Which channel feeds the i-th value of a multi-return expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Channel {
    /// The value form of the expression itself (stdout for calls).
    Value,
    /// The exit status, read as `$?`.
    Status,
    /// The `_tmp<i>` shadow variable written by the callee.
    Shadow(usize),
}

pub(crate) fn channel_of(ret_types: &[Ty], primary: Option<usize>, i: usize) -> Channel {
    match ret_types.get(i) {
        Some(t) if t.is_status() => Channel::Status,
        Some(t) if t.is_temp_var() => Channel::Shadow(i),
        Some(_) => {
            if primary == Some(i) {
                Channel::Value
            } else {
                Channel::Shadow(i)
            }
        }
        None => {
            if i == 0 {
                Channel::Value
            } else {
                Channel::Shadow(i)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ShellExpr {
    pub expr: String,
    pub kind: ExprKind,
    pub ret_types: Vec<Ty>,
    /// Index of the return value riding stdout; `None` when every return
    /// travels through shadow variables or the exit status.
    pub primary: Option<usize>,
    pub stdout: bool,
    /// Element value forms of a composite literal, or the leaf values of a
    /// field-decomposed struct read.
    pub values: Vec<String>,
    /// Left-hand-side names when the expression is an assignment.
    pub lhs: Vec<String>,
    /// Assignment operator (`=`, `:=`, `+=`, …) when `lhs` is set.
    pub op: String,
    /// Variable mutated in place by the call (`append`).
    pub ret_arg: Option<String>,
    /// The expression was a `range` clause; `expr`/`values` hold the target.
    pub range_over: bool,
}

impl Default for ShellExpr {
    fn default() -> ShellExpr {
        ShellExpr {
            expr: String::new(),
            kind: ExprKind::Plain,
            ret_types: Vec::new(),
            primary: Some(0),
            stdout: false,
            values: Vec::new(),
            lhs: Vec::new(),
            op: String::new(),
            ret_arg: None,
            range_over: false,
        }
    }
}

impl ShellExpr {
    pub fn channel(&self, i: usize) -> Channel {
        channel_of(&self.ret_types, self.primary, i)
    }

    /// Renders the expression for use inside a larger expression or word.
    pub fn as_value(&self, scale: Option<u32>) -> String {
        let first = self.ret_types.first();
        if self.primary.is_none() && first.map_or(false, Ty::is_status) {
            return format!("$({} >&2; echo $?)", self.expr.trim());
        }
        if self.primary.is_none() && !self.ret_types.is_empty() && !self.stdout {
            return format!("$({} >&2; echo \"$_tmp0\")", self.expr.trim());
        }
        match self.kind {
            ExprKind::IntArith => format!("$(( {} ))", self.expr),
            ExprKind::FloatArith => float_value(&self.expr, scale),
            ExprKind::StrCmp => format!("$([[ {} ]] && echo 1 || echo 0)", self.expr),
            ExprKind::Plain => {
                if self.stdout {
                    match first {
                        Some(t) if t.is_array() => format!("($({}))", self.expr.trim()),
                        Some(t) if t.as_str() == "int" => format!("$({})", self.expr.trim()),
                        _ => format!("\"$({})\"", self.expr.trim()),
                    }
                } else {
                    self.expr.trim().to_string()
                }
            }
        }
    }

    /// Renders the expression as a standalone command line.
    pub fn as_exec(&self) -> String {
        if self.kind == ExprKind::IntArith {
            return format!("let \"{}\"", self.expr);
        }
        if self.stdout {
            return format!("{} >/dev/null", self.expr.trim());
        }
        self.expr.trim().to_string()
    }
}

/// Wraps a `bc` expression fragment per the current float renderer.
pub(crate) fn float_value(expr: &str, scale: Option<u32>) -> String {
    match scale {
        Some(p) => format!(
            "$(echo \"scale={p}; {expr}\" | BC_LINE_LENGTH={} bc -l)",
            p + 10
        ),
        None => format!("$(echo \"{expr}\" | bc -l)"),
    }
}

/// Mutable scan state threaded through one `read_expression` run.
struct ExprState {
    is_string: bool,
    is_float: bool,
    saw_int: bool,
    cmp_string: bool,
    tokens: usize,
    nest: i32,
    /// LHS candidates, collected while only identifier chains and commas
    /// have been seen.
    names: Vec<String>,
    lhs_ok: bool,
    /// A lone variable reference, kept so it can be re-quoted at the end.
    single_name: Option<String>,
    single_ty: Ty,
    last_call: Option<ShellExpr>,
    /// Text the last call contributed, to detect call-only expressions.
    last_call_text: String,
}

impl Compiler {
    /// Translates one SRC expression.
    ///
    /// `type_hint` is the expected type from context; `end` lists extra
    /// punctuation that terminates the expression (the terminator is scanned
    /// but not folded into it); `allow_assign` lets the translator recognize
    /// assignment operators and split off the left-hand side.
    pub(crate) fn read_expression(
        &mut self,
        type_hint: &Ty,
        end: &str,
        allow_assign: bool,
    ) -> ShellExpr {
        let mut e = ShellExpr::default();
        if matches!(self.scanner.peek(), '\n' | '\r') {
            return e;
        }

        let hint = self.resolve(type_hint);
        let mut st = ExprState {
            is_string: hint.is_string(),
            is_float: hint.is_float(),
            saw_int: false,
            cmp_string: false,
            tokens: 0,
            nest: 0,
            names: Vec::new(),
            lhs_ok: allow_assign,
            single_name: None,
            single_ty: Ty::default(),
            last_call: None,
            last_call_text: String::new(),
        };

        loop {
            let tok = self.scanner.scan();
            match tok {
                TokenKind::Eof => break,
                TokenKind::Punct(c) => {
                    if st.nest == 0 && (c == ')' || end.contains(c)) {
                        break;
                    }
                    match c {
                        ',' => {
                            if st.lhs_ok && e.op.is_empty() && !st.names.is_empty() {
                                continue;
                            }
                            break;
                        }
                        ';' | ']' | '{' | '}' => break,
                        '(' => {
                            st.nest += 1;
                            e.expr.push('(');
                        }
                        ')' => {
                            st.nest -= 1;
                            e.expr.push(')');
                        }
                        ':' => {
                            if allow_assign
                                && st.lhs_ok
                                && !st.names.is_empty()
                                && self.scanner.peek() == '='
                            {
                                self.scanner.scan();
                                self.capture_lhs(&mut e, &mut st, ":=");
                                continue;
                            }
                            break;
                        }
                        '=' => {
                            if self.scanner.peek() == '=' {
                                self.scanner.scan();
                                e.expr.push_str(" == ");
                                st.cmp_string |= st.is_string;
                            } else if allow_assign && st.lhs_ok && !st.names.is_empty() {
                                self.capture_lhs(&mut e, &mut st, "=");
                                continue;
                            } else if st.tokens == 0 && e.expr.is_empty() {
                                continue; // leading `=` of an initializer
                            } else {
                                e.expr.push('=');
                            }
                        }
                        '!' => {
                            if self.scanner.peek() == '=' {
                                self.scanner.scan();
                                e.expr.push_str(" != ");
                                st.cmp_string |= st.is_string;
                            } else {
                                e.expr.push('!');
                            }
                        }
                        '<' | '>' => {
                            let mut op = c.to_string();
                            if self.scanner.peek() == '=' {
                                self.scanner.scan();
                                op.push('=');
                            }
                            e.expr.push_str(&format!(" {op} "));
                            st.cmp_string |= st.is_string;
                        }
                        '+' | '-' | '*' | '/' | '%' => {
                            if allow_assign
                                && st.lhs_ok
                                && !st.names.is_empty()
                                && self.scanner.peek() == '='
                            {
                                self.scanner.scan();
                                self.capture_lhs(&mut e, &mut st, &format!("{c}="));
                                continue;
                            }
                            if c == '+' && st.is_string {
                                continue; // concatenation is juxtaposition
                            }
                            e.expr.push(c);
                        }
                        '[' if st.tokens == 0 && e.expr.is_empty() => {
                            return self.read_array_literal(e);
                        }
                        _ => {
                            let text = self.scanner.token_text().to_string();
                            e.expr.push_str(&text);
                        }
                    }
                    st.tokens += 1;
                    st.lhs_ok = false;
                    st.single_name = None;
                }
                TokenKind::Int => {
                    st.saw_int = true;
                    let text = self.scanner.token_text().to_string();
                    e.expr.push_str(&text);
                    st.tokens += 1;
                    st.lhs_ok = false;
                    st.single_name = None;
                }
                TokenKind::Float => {
                    if !st.is_string {
                        st.is_float = true;
                    }
                    let text = self.scanner.token_text().to_string();
                    e.expr.push_str(&text);
                    st.tokens += 1;
                    st.lhs_ok = false;
                    st.single_name = None;
                }
                TokenKind::String => {
                    if !st.is_float {
                        st.is_string = true;
                    }
                    let lit = escape_string(self.scanner.token_text());
                    e.expr.push_str(&lit);
                    st.tokens += 1;
                    st.lhs_ok = false;
                    st.single_name = None;
                }
                TokenKind::RawString => {
                    if !st.is_float {
                        st.is_string = true;
                    }
                    let lit = quote_raw_string(self.scanner.token_text());
                    e.expr.push_str(&lit);
                    st.tokens += 1;
                    st.lhs_ok = false;
                    st.single_name = None;
                }
                TokenKind::Ident => {
                    let t = self.scanner.token_text().to_string();
                    if allow_assign && t == "range" && st.tokens == 0 && e.expr.is_empty() {
                        e.range_over = true;
                        continue;
                    }
                    match t.as_str() {
                        "true" => {
                            e.expr.push('1');
                            st.saw_int = true;
                            st.tokens += 1;
                            st.lhs_ok = false;
                            st.single_name = None;
                        }
                        "false" | "nil" => {
                            e.expr.push('0');
                            st.saw_int = true;
                            st.tokens += 1;
                            st.lhs_ok = false;
                            st.single_name = None;
                        }
                        _ => {
                            if self.read_ident(t, &mut e, &hint, &mut st) {
                                return e;
                            }
                            st.tokens += 1;
                        }
                    }
                }
                _ => {}
            }
            if st.nest == 0 && matches!(self.scanner.peek(), '\n' | '\r') {
                break;
            }
        }

        // A lone variable reference becomes its quoted value form.
        if st.tokens == 1 && e.values.is_empty() {
            if let Some(name) = &st.single_name {
                e.expr = format!("\"{}\"", var_value(name));
            }
        }

        // The whole expression was exactly one call: keep its metadata.
        if let Some(mut call) = st.last_call.take() {
            if !st.last_call_text.is_empty()
                && e.expr == st.last_call_text
                && e.values.is_empty()
            {
                call.lhs = e.lhs;
                call.op = e.op;
                call.range_over = e.range_over;
                return call;
            }
        }

        e.kind = if st.cmp_string {
            ExprKind::StrCmp
        } else if st.tokens > 1 && !st.is_string && st.is_float {
            ExprKind::FloatArith
        } else if st.tokens > 1 && !st.is_string {
            ExprKind::IntArith
        } else {
            ExprKind::Plain
        };

        if e.ret_types.is_empty() {
            let t = if st.is_float {
                Ty::new("float64")
            } else if st.is_string {
                Ty::new("string")
            } else if !st.single_ty.is_empty() {
                st.single_ty.clone()
            } else if !hint.is_empty() {
                hint
            } else if st.tokens > 1 || st.saw_int {
                Ty::new("int")
            } else {
                Ty::default()
            };
            if !t.is_empty() {
                e.ret_types = vec![t];
            }
        }
        e
    }

    /// Splits off the LHS once an assignment operator is seen; the remaining
    /// tokens are the right-hand side, typed after the first target unless
    /// this is a fresh `:=` declaration.
    fn capture_lhs(&self, e: &mut ShellExpr, st: &mut ExprState, op: &str) {
        e.op = op.to_string();
        e.lhs = std::mem::take(&mut st.names);
        e.expr.clear();
        st.tokens = 0;
        st.single_name = None;
        st.single_ty = Ty::default();
        st.last_call = None;
        st.last_call_text.clear();
        st.lhs_ok = false;
        if op == ":=" {
            st.is_string = false;
            st.is_float = false;
        } else {
            let t = e.lhs.first().map(|n| self.lookup_var(n)).unwrap_or_default();
            st.is_string = t.is_string();
            st.is_float = t.is_float();
        }
    }

    /// `[]T{…}` composite literal; `e` carries any already-captured LHS.
    fn read_array_literal(&mut self, mut e: ShellExpr) -> ShellExpr {
        let t = self.read_type(true);
        self.scanner.scan(); // '{'
        let elem = t.elem();
        let mut vals = Vec::new();
        loop {
            let v = self.read_expression(&elem, ",}", false);
            if !v.expr.is_empty() || !v.values.is_empty() {
                vals.push(self.value_of(&v));
            }
            if self.scanner.kind() != TokenKind::Punct(',') {
                break;
            }
        }
        e.expr = format!("({})", vals.join(" "));
        e.values = vals;
        e.ret_types = vec![t];
        e
    }

    /// Positional struct literal; missing trailing leaves default per type.
    /// `decl` is the type the value carries (the user type name, so the
    /// declared variable keeps its method dispatch).
    fn read_struct_literal(&mut self, desc: &Ty, decl: Ty, mut e: ShellExpr) -> ShellExpr {
        self.scanner.scan(); // '{'
        let mut leaves: Vec<String> = Vec::new();
        for (_, fty) in desc.struct_fields() {
            let fbase = self.resolve(&fty);
            let v = self.read_expression(&fty, ",}", false);
            if v.expr.is_empty() && v.values.is_empty() {
                break;
            }
            if fbase.is_struct() {
                let sub = fbase.fields("f");
                for (i, (_, lt)) in sub.iter().enumerate() {
                    leaves.push(
                        v.values
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| lt.zero_value().to_string()),
                    );
                }
            } else {
                leaves.push(self.value_of(&v));
            }
            if self.scanner.kind() != TokenKind::Punct(',') {
                break;
            }
        }
        let all = desc.fields("f");
        for (_, lt) in all.iter().skip(leaves.len()) {
            leaves.push(lt.zero_value().to_string());
        }
        e.expr = leaves.join(" ");
        e.values = leaves;
        e.ret_types = vec![decl];
        e
    }

    /// Resolves one identifier chain: package-qualified call, struct field,
    /// method call, indexing/slicing, or a plain variable reference.
    /// Returns true when the expression is complete and should be returned.
    fn read_ident(&mut self, t: String, e: &mut ShellExpr, hint: &Ty, st: &mut ExprState) -> bool {
        let mut name = t;

        // Anonymous struct literal: `struct{…}{…}`.
        if name == "struct" && self.scanner.peek() == '{' {
            let desc = self.read_struct_type();
            if self.scanner.peek() == '{' {
                let decl = desc.clone();
                *e = self.read_struct_literal(&desc, decl, std::mem::take(e));
                return true;
            }
        }

        let mut call: Option<ShellExpr> = None;

        // Dotted chain: package member, struct field path, or method.
        loop {
            if self.scanner.peek() != '.' {
                break;
            }
            if let Some(path) = self.imports.get(&name) {
                let base = path.rsplit('/').next().unwrap_or(path).to_string();
                self.scanner.scan(); // '.'
                self.scanner.scan();
                name = format!("{}.{}", base, self.scanner.token_text());
                break;
            }
            if self.vars.contains_key(&name) {
                self.scanner.scan(); // '.'
                self.scanner.scan();
                let member = self.scanner.token_text().to_string();
                if self.scanner.peek() == '(' {
                    let recv_raw = self.vars.get(&name).cloned().unwrap_or_default();
                    let type_name = recv_raw.as_str().trim_start_matches('*').to_string();
                    let recv_args = self.receiver_args(&name, &recv_raw);
                    self.scanner.scan(); // '('
                    call = Some(self.read_func_call(format!("{type_name}__{member}"), recv_args));
                } else {
                    name = format!("{name}.{member}");
                    continue;
                }
            }
            break;
        }

        let call = match call {
            Some(c) => Some(c),
            None => {
                if self.scanner.peek() == '(' && !self.vars.contains_key(&name) {
                    self.scanner.scan(); // '('
                    Some(self.read_func_call(name.clone(), Vec::new()))
                } else if name.contains('.') && self.funcs.contains_key(&name) {
                    // Variable-style builtin: os.Args, math.Pi, runtime.GOOS…
                    Some(self.render_builtin_value(&name))
                } else {
                    None
                }
            }
        };

        if let Some(c) = call {
            let first = self.resolve(&c.ret_types.first().cloned().unwrap_or_default());
            if first.is_string() && !st.is_float {
                st.is_string = true;
            }
            if c.kind == ExprKind::FloatArith || first.is_float() {
                st.is_float = true;
            }
            // Float calls merge into the surrounding bc expression raw; the
            // wrapper is applied once, at the use site.
            let text = if c.kind == ExprKind::FloatArith {
                c.expr.clone()
            } else {
                self.value_of(&c)
            };
            e.expr.push_str(&text);
            st.last_call_text = text;
            st.last_call = Some(c);
            st.single_name = None;
            st.lhs_ok = false;
            return false;
        }

        // Struct literal of a known user type.
        if self.scanner.peek() == '{' && self.user_types.contains_key(&name) {
            let desc = self.resolve(&Ty::new(name.as_str()));
            if desc.is_struct() {
                *e = self.read_struct_literal(&desc, Ty::new(name.as_str()), std::mem::take(e));
                return true;
            }
        }

        let vt = self.lookup_var(&name);
        if vt.is_string() && !st.is_float {
            st.is_string = true;
        }
        if vt.is_float() {
            st.is_float = true;
        }

        // Decomposed struct read: the value is the list of leaf references.
        if vt.is_struct() {
            e.values = vt
                .fields(&name)
                .iter()
                .map(|(leaf, _)| format!("\"{}\"", var_value(&flat_name(leaf))))
                .collect();
            e.expr = e.values.join(" ");
            st.single_ty = self.vars.get(&name).cloned().unwrap_or_default();
            st.single_name = None;
            return false;
        }

        let mut flat = flat_name(&name);

        if self.scanner.peek() == '[' {
            self.scanner.scan(); // '['
            let lo_e = self.read_expression(&Ty::new("int"), ":]", false);
            let lo = strip_quotes(&self.value_of(&lo_e)).to_string();
            if self.scanner.kind() == TokenKind::Punct(':') {
                let hi_e = self.read_expression(&Ty::new("int"), "]", false);
                let hi = strip_quotes(&self.value_of(&hi_e)).to_string();
                let len = match (lo.parse::<i64>(), hi.parse::<i64>()) {
                    (Ok(a), Ok(b)) => (b - a).to_string(),
                    _ => format!("$(( {hi} - {lo} ))"),
                };
                flat = if vt.is_array() {
                    format!("{flat}[@]:{lo}:{len}")
                } else {
                    format!("{flat}:{lo}:{len}")
                };
                st.single_ty = vt.clone();
            } else if vt.is_string() {
                flat = format!("{flat}:{lo}:1");
                st.single_ty = Ty::new("string");
            } else {
                if vt.elem().is_string() && !st.is_float {
                    st.is_string = true;
                }
                flat = format!("{flat}[{lo}]");
                st.single_ty = vt.elem();
            }
        } else {
            if vt.is_array() {
                flat.push_str("[@]");
            }
            st.single_ty = self
                .vars
                .get(&name)
                .cloned()
                .unwrap_or_else(|| hint.clone());
            if st.lhs_ok {
                st.names.push(name.clone());
            }
        }

        if st.is_string {
            e.expr.push_str(&format!("\"{}\"", var_value(&flat)));
        } else if st.is_float {
            e.expr.push_str(&var_value(&flat));
        } else {
            e.expr.push_str(&flat);
        }
        st.single_name = Some(flat);
        false
    }

    /// Leaf value forms a receiver contributes as implicit first arguments.
    fn receiver_args(&self, name: &str, raw_ty: &Ty) -> Vec<String> {
        let base = self.resolve(raw_ty);
        if base.is_struct() {
            base.fields(name)
                .iter()
                .map(|(leaf, _)| format!("\"{}\"", var_value(&flat_name(leaf))))
                .collect()
        } else {
            vec![format!("\"{}\"", var_value(&flat_name(name)))]
        }
    }

    /// Renders a no-argument (variable-style) builtin.
    fn render_builtin_value(&mut self, name: &str) -> ShellExpr {
        let f = self
            .funcs
            .get(name)
            .cloned()
            .unwrap_or_else(|| CallTemplate::cmd(name));
        let expr = match f.apply {
            Some(apply) => apply(self, &[]),
            None => f.expr.clone(),
        };
        ShellExpr {
            expr,
            kind: f.kind,
            ret_types: f.ret_types,
            primary: f.primary,
            stdout: f.stdout,
            ..Default::default()
        }
    }

    /// Reads a call's argument list (the opening parenthesis is already
    /// consumed) and renders it through the builtin table, the function
    /// table, or as a bare shell command of the same name.
    pub(crate) fn read_func_call(&mut self, name: String, recv: Vec<String>) -> ShellExpr {
        // Compile-time builtin: rewrites the float renderer, emits nothing.
        if name == "shell.SetFloatPrecision" {
            let e = self.read_expression(&Ty::new("int"), ")", false);
            if let Ok(p) = self.value_of(&e).trim().parse::<u32>() {
                self.float_scale = Some(p);
            }
            return ShellExpr {
                primary: None,
                ..Default::default()
            };
        }

        let mut args: Vec<String> = recv.clone();
        let mut float_args: Vec<String> = recv;
        loop {
            let a = self.read_expression(&Ty::default(), "", false);
            if !a.values.is_empty() {
                for v in &a.values {
                    args.push(v.clone());
                    float_args.push(v.clone());
                }
            } else if !a.expr.is_empty() {
                let v = self.value_of(&a);
                float_args.push(if a.kind == ExprKind::FloatArith {
                    a.expr.trim().to_string()
                } else {
                    strip_quotes(&v).to_string()
                });
                args.push(v);
                // Secondary returns of a multi-return argument ride along.
                for i in 1..a.ret_types.len() {
                    if let Channel::Shadow(n) = a.channel(i) {
                        let extra = format!("\"$_tmp{n}\"");
                        float_args.push(extra.clone());
                        args.push(extra);
                    }
                }
            }
            if self.scanner.kind() != TokenKind::Punct(',') {
                break;
            }
        }

        let f = self
            .funcs
            .get(&name)
            .cloned()
            .unwrap_or_else(|| CallTemplate::cmd(&name));
        let rendered = if let Some(apply) = f.apply {
            apply(self, &args)
        } else if builtins::has_holes(&f.expr) {
            builtins::fill_template(&f.expr, &args, &float_args)
        } else {
            format!("{} {}", f.expr, args.join(" ")).trim().to_string()
        };
        ShellExpr {
            expr: rendered,
            kind: f.kind,
            ret_types: f.ret_types,
            primary: f.primary,
            stdout: f.stdout,
            ret_arg: if f.ret_arg {
                args.first().map(|a| var_name(a).to_string())
            } else {
                None
            },
            ..Default::default()
        }
    }
}
