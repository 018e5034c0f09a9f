//! The statement emitter: declarations, control flow, functions, returns.
//!
//! Every assignment funnels through [`Compiler::write_expr`], which decides
//! per left-hand side which channel feeds it — the value form itself, the
//! exit status via `$?`, or a `_tmp<i>` shadow variable — because one call
//! can feed several targets at once.

use crate::scanner::TokenKind;
use crate::types::Ty;
use crate::utils::{flat_name, trim_quote, var_value};

use super::gen_expr::{channel_of, Channel, ExprKind, ShellExpr};
use super::{CallTemplate, Compiler, LoopFrame};

impl Compiler {
    pub(crate) fn parse_import(&mut self) {
        if self.scanner.scan() == TokenKind::Punct('(') {
            loop {
                let tok = self.scanner.scan();
                if matches!(tok, TokenKind::Eof | TokenKind::Punct(')')) {
                    break;
                }
                self.import_entry();
            }
        } else {
            self.import_entry();
        }
    }

    fn import_entry(&mut self) {
        if self.scanner.kind().is_ident() {
            let alias = self.scanner.token_text().to_string();
            self.scanner.scan();
            let path = trim_quote(self.scanner.token_text()).to_string();
            self.imports.insert(alias, path);
        } else {
            let path = trim_quote(self.scanner.token_text()).to_string();
            let alias = path.rsplit('/').next().unwrap_or(&path).to_string();
            self.imports.insert(alias, path);
        }
    }

    /// `type N T` and `type N = T` both register the user type.
    pub(crate) fn proc_type(&mut self) {
        self.scanner.scan();
        let name = self.scanner.token_text().to_string();
        if self.scanner.peek() == '=' {
            self.scanner.scan();
        }
        let t = self.read_type(false);
        self.user_types.insert(name, t);
    }

    /// `var`/`const` declarations; `local` (with `-r` for const) in functions.
    pub(crate) fn proc_decl(&mut self, readonly: bool) {
        self.scanner.scan();
        let name = self.scanner.token_text().to_string();
        let mut ty = Ty::default();
        let mut has_rhs = false;
        if !matches!(self.scanner.peek(), '\n' | '\r') {
            ty = self.read_type(false);
            if self.scanner.kind() == TokenKind::Punct('=') {
                has_rhs = true;
            } else if !matches!(self.scanner.peek(), '\n' | '\r') {
                has_rhs = self.scanner.scan() == TokenKind::Punct('=');
            }
        }
        let mut e = if has_rhs {
            self.read_expression(&ty, "", false)
        } else {
            ShellExpr::default()
        };
        e.lhs = vec![name];
        self.write_expr(&e, Some(&ty), true, readonly);
    }

    pub(crate) fn proc_if(&mut self) {
        let mut cond = self.read_expression(&Ty::new("bool"), ";{", true);
        if self.scanner.kind() == TokenKind::Punct(';') {
            // `if x := f(); cond {` — the initializer is hoisted.
            let declare = cond.op == ":=";
            self.write_expr(&cond, None, declare, false);
            cond = self.read_expression(&Ty::new("bool"), "{", false);
        }
        let v = self.value_of(&cond);
        self.writeln(&format!("if [ {v} -ne 0 ]; then :"));
        self.cl.push("fi".to_string());
    }

    pub(crate) fn proc_else(&mut self) {
        self.out.cancel_buffered();
        let tok = self.scanner.scan();
        if tok.is_ident() && self.scanner.token_text() == "if" {
            let cond = self.read_expression(&Ty::new("bool"), "{", false);
            let v = self.value_of(&cond);
            self.writeln(&format!("elif [ {v} -ne 0 ]; then :"));
        } else {
            self.writeln("else");
        }
        self.cl.push("fi".to_string());
    }

    /// The four loop shapes: infinite, conditional, C-style with a post
    /// clause, and `range` over an array value.
    pub(crate) fn proc_for(&mut self) {
        let e1 = self.read_expression(&Ty::default(), ";{", true);
        if e1.range_over {
            // A composite-literal target consumes its own `}`; the body
            // brace is still pending.
            while !matches!(self.scanner.kind(), TokenKind::Punct('{') | TokenKind::Eof) {
                self.scanner.scan();
            }
            return self.emit_range_for(e1);
        }
        if self.scanner.kind() != TokenKind::Punct(';') {
            let cond = if e1.expr.is_empty() {
                "true".to_string()
            } else {
                format!("[ {} -ne 0 ]", self.value_of(&e1))
            };
            self.writeln(&format!("while {cond}; do :"));
            self.cl.push("done".to_string());
            self.loops.push(LoopFrame {
                depth: self.cl.len(),
                post: String::new(),
            });
            return;
        }

        // C-style: the initializer runs before the loop; the post clause
        // becomes the continue-procedure.
        self.write_expr(&e1, None, e1.op == ":=", false);
        let cond = self.read_expression(&Ty::default(), ";{", false);
        let post = if self.scanner.kind() == TokenKind::Punct(';') {
            let p = self.read_expression(&Ty::default(), "{", true);
            self.post_line(&p)
        } else {
            String::new()
        };
        let c = if cond.expr.is_empty() {
            "true".to_string()
        } else {
            format!("[ {} -ne 0 ]", self.value_of(&cond))
        };
        self.writeln(&format!("while {c}; do :"));
        self.cl.push(if post.is_empty() {
            "done".to_string()
        } else {
            format!("{post}; done")
        });
        self.loops.push(LoopFrame {
            depth: self.cl.len(),
            post,
        });
    }

    /// Renders a loop post clause as an arithmetic command.
    fn post_line(&self, p: &ShellExpr) -> String {
        if p.expr.is_empty() && p.lhs.is_empty() {
            return String::new();
        }
        if let Some(first) = p.lhs.first() {
            let op = if p.op.is_empty() { "=" } else { &p.op };
            format!("let \"{} {op} {}\"", flat_name(first), p.expr.trim())
        } else {
            format!("let \"{}\"", p.expr.trim())
        }
    }

    /// `for i, v := range target` — the value variable drives a `for … in`;
    /// the index counts iterations through the continue-procedure.
    fn emit_range_for(&mut self, e: ShellExpr) {
        let v = self.value_of(&e);
        let target = if v.starts_with('(') && v.ends_with(')') {
            v[1..v.len() - 1].to_string()
        } else {
            v
        };
        let (idx, val) = match e.lhs.len() {
            0 => (None, "_tmp".to_string()),
            1 => (Some(e.lhs[0].clone()).filter(|n| n != "_"), "_tmp".to_string()),
            _ => (
                Some(e.lhs[0].clone()).filter(|n| n != "_"),
                if e.lhs[1] == "_" {
                    "_tmp".to_string()
                } else {
                    e.lhs[1].clone()
                },
            ),
        };
        let elem = e
            .ret_types
            .first()
            .filter(|t| t.is_array())
            .map(|t| t.elem())
            .unwrap_or_else(|| Ty::new("string"));
        if let Some(i) = &idx {
            let lp = if self.current_fn.is_some() { "local " } else { "" };
            self.writeln(&format!("{lp}{i}=0"));
            self.set_type(i, &Ty::new("int"));
        }
        if val != "_tmp" {
            self.set_type(&val, &elem);
        }
        self.writeln(&format!("for {val} in {target}; do :"));
        let post = idx
            .map(|i| format!("let \"{i}++\""))
            .unwrap_or_default();
        self.cl.push(if post.is_empty() {
            "done".to_string()
        } else {
            format!("{post}; done")
        });
        self.loops.push(LoopFrame {
            depth: self.cl.len(),
            post,
        });
    }

    /// `continue` runs the enclosing loop's post clause first.
    pub(crate) fn proc_continue(&mut self) {
        if let Some(frame) = self.loops.last() {
            if !frame.post.is_empty() {
                let p = frame.post.clone();
                self.writeln(&p);
            }
        }
        self.writeln("continue");
    }

    /// `return e0, e1, …` — one slot per declared return type: the primary
    /// goes to stdout, `StatusCode` becomes the exit status, everything else
    /// is written to `_tmp<i>` shadow variables.
    pub(crate) fn proc_return(&mut self) {
        let Some(f) = self.current_fn.clone() else {
            self.writeln("return");
            return;
        };
        if matches!(self.scanner.peek(), '\n' | '\r') || f.ret_types.is_empty() {
            self.writeln("return");
            return;
        }
        let mut parts: Vec<String> = Vec::new();
        let mut status: Option<String> = None;
        for (i, rt) in f.ret_types.iter().enumerate() {
            let e = self.read_expression(&Ty::default(), "", false);
            // A call with the same return shape handles every slot itself.
            if i == 0
                && e.stdout
                && f.stdout
                && e.primary == f.primary
                && e.ret_types.len() == f.ret_types.len()
            {
                self.writeln(&format!("{}; return $?", e.expr.trim()));
                return;
            }
            match channel_of(&f.ret_types, f.primary, i) {
                Channel::Status => status = Some(self.value_of(&e)),
                Channel::Value => parts.push(format!("echo {};", self.value_of(&e))),
                Channel::Shadow(n) => {
                    let base = self.resolve(rt);
                    if base.is_struct() {
                        let leaves = base.fields(&format!("_tmp{n}"));
                        for (j, (leaf, lt)) in leaves.iter().enumerate() {
                            let lv = e
                                .values
                                .get(j)
                                .cloned()
                                .unwrap_or_else(|| lt.zero_value().to_string());
                            parts.push(format!("{}={lv};", flat_name(leaf)));
                        }
                    } else {
                        parts.push(format!("_tmp{n}={};", self.value_of(&e)));
                    }
                }
            }
            if self.scanner.kind() != TokenKind::Punct(',') {
                break;
            }
        }
        match status {
            Some(s) => parts.push(format!("return {s}")),
            None => parts.push("return".to_string()),
        }
        self.writeln(&parts.join(" "));
    }

    /// `func [(recv T)] Name(params) (rets) {` — emits the shell function
    /// header and parameter prologue, and registers the call template.
    pub(crate) fn proc_func(&mut self) {
        let tok = self.scanner.scan();
        let mut recv: Option<(String, Ty)> = None;
        if tok == TokenKind::Punct('(') {
            self.scanner.scan();
            let rname = self.scanner.token_text().to_string();
            let rt = self.read_type(false);
            let rt = Ty::new(rt.as_str().trim_start_matches('*'));
            self.set_type(&rname, &rt);
            self.scanner.scan(); // ')'
            self.scanner.scan();
            recv = Some((rname, rt));
        }
        let src_name = self.scanner.token_text().to_string();

        let mut emitted = String::new();
        if !self.package.is_empty() && self.package != "main" {
            emitted.push_str(&self.package);
            emitted.push_str("__");
        }
        if let Some((_, rt)) = &recv {
            emitted.push_str(&flat_name(rt.as_str()));
            emitted.push_str("__");
        }
        emitted.push_str(&src_name);

        // Parameters: name lists followed by their type.
        self.scanner.scan(); // '('
        let mut params: Vec<String> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        loop {
            let tok = self.scanner.scan();
            if matches!(tok, TokenKind::Eof | TokenKind::Punct(')')) {
                break;
            }
            pending.push(self.scanner.token_text().to_string());
            let tok = self.scanner.scan();
            if tok == TokenKind::Punct(',') {
                continue;
            }
            if matches!(tok, TokenKind::Eof | TokenKind::Punct(')')) {
                params.append(&mut pending);
                break;
            }
            let ty = self.read_type(true);
            for p in pending.drain(..) {
                self.set_type(&p, &ty);
                params.push(p);
            }
            if self.scanner.scan() != TokenKind::Punct(',') {
                break;
            }
        }

        // Return types.
        let mut rets: Vec<Ty> = Vec::new();
        let tok = self.scanner.scan();
        match tok {
            TokenKind::Punct('{') => {}
            TokenKind::Punct('(') => loop {
                let t = self.scanner.scan();
                if matches!(t, TokenKind::Eof | TokenKind::Punct(')')) {
                    break;
                }
                if t == TokenKind::Punct(',') {
                    continue;
                }
                rets.push(self.read_type(true));
            },
            _ => {
                let t = self.read_type(true);
                if !t.is_empty() {
                    rets.push(t);
                }
            }
        }
        while !matches!(self.scanner.kind(), TokenKind::Punct('{') | TokenKind::Eof) {
            self.scanner.scan();
        }

        // Exactly one return that is neither a status nor an explicit shadow,
        // with a single leaf, rides stdout.
        let non_status: Vec<usize> = rets
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_status())
            .map(|(i, _)| i)
            .collect();
        let primary = match non_status.as_slice() {
            [i] if !rets[*i].is_temp_var() && self.resolve(&rets[*i]).fields("r").len() == 1 => {
                Some(*i)
            }
            _ => None,
        };
        let stdout = primary.is_some();

        let tmpl = CallTemplate {
            expr: emitted.clone(),
            kind: ExprKind::Plain,
            ret_types: rets,
            primary,
            stdout,
            apply: None,
            ret_arg: false,
        };
        let key = match &recv {
            Some((_, rt)) => format!("{}__{}", rt.as_str(), src_name),
            None => src_name.clone(),
        };
        self.funcs.insert(key, tmpl.clone());
        // A GOTOSH_FUNC_x_y_z definition overrides the builtin mapping x.y.z.
        if let Some(rest) = src_name.strip_prefix("GOTOSH_FUNC_") {
            self.funcs.insert(rest.replace('_', "."), tmpl.clone());
        }
        if recv.is_none()
            && !self.package.is_empty()
            && self.package != "main"
            && src_name.starts_with(|c: char| c.is_ascii_uppercase())
        {
            self.funcs
                .insert(format!("{}.{}", self.package, src_name), tmpl.clone());
        }
        self.current_fn = Some(tmpl);

        self.writeln(&format!("function {emitted}() {{"));
        self.cl.push("}".to_string());

        let mut all: Vec<String> = Vec::new();
        if let Some((rname, _)) = &recv {
            all.push(rname.clone());
        }
        all.extend(params);
        for p in all {
            let pt = self.lookup_var(&p);
            if pt.is_array() {
                self.writeln(&format!("local {p}=(\"$@\")"));
            } else if pt.is_struct() {
                for (leaf, _) in pt.fields(&p) {
                    self.writeln(&format!("local {}=\"$1\"; shift", flat_name(&leaf)));
                }
            } else {
                self.writeln(&format!("local {p}=\"$1\"; shift"));
            }
        }
    }

    /// The shared writer for assignments: decides per LHS which channel
    /// feeds it and in which order the captures must run so `$?` survives.
    pub(crate) fn write_expr(
        &mut self,
        e: &ShellExpr,
        decl_ty: Option<&Ty>,
        declare: bool,
        readonly: bool,
    ) {
        // In-place mutation (append): the call is the assignment.
        if let (Some(rv), Some(first)) = (&e.ret_arg, e.lhs.first()) {
            if flat_name(first) == *rv {
                self.writeln(&e.as_exec());
                return;
            }
        }
        if e.lhs.is_empty() {
            let cmd = e.as_exec();
            if !cmd.is_empty() {
                self.writeln(&cmd);
            }
            return;
        }

        // Compound assignment: string `+=` concatenates, the rest go
        // through an arithmetic command.
        if !e.op.is_empty() && e.op != "=" && e.op != ":=" {
            let name = flat_name(&e.lhs[0]);
            let vt = self.lookup_var(&e.lhs[0]);
            if vt.is_string() && e.op == "+=" {
                let v = self.value_of(e);
                self.writeln(&format!("{name}+={v}"));
            } else {
                let rhs = if e.kind == ExprKind::IntArith {
                    e.expr.trim().to_string()
                } else {
                    self.value_of(e)
                };
                self.writeln(&format!("let \"{name} {} {rhs}\"", e.op));
            }
            return;
        }

        let local = declare && self.current_fn.is_some();
        let lp = if local {
            if readonly {
                "local -r "
            } else {
                "local "
            }
        } else {
            ""
        };

        // Record LHS types before rendering so struct targets decompose.
        for (i, n) in e.lhs.iter().enumerate() {
            if n == "_" {
                continue;
            }
            if declare || self.lookup_var(n).is_empty() {
                // An explicit declaration type wins over the inferred one,
                // so alias-typed variables keep their method dispatch.
                let t = decl_ty
                    .cloned()
                    .filter(|t| !t.is_empty())
                    .or_else(|| e.ret_types.get(i).cloned().filter(|t| !t.is_empty()));
                if let Some(t) = t {
                    self.set_type(n, &t);
                }
            }
        }

        let ty0 = decl_ty
            .cloned()
            .filter(|t| !t.is_empty())
            .or_else(|| e.lhs.first().map(|n| self.lookup_var(n)))
            .unwrap_or_default();
        let base0 = self.resolve(&ty0);

        let mut v = self.value_of(e);
        if v.is_empty() {
            if base0.is_array() {
                v = "()".to_string();
            } else if base0.is_int() || base0.is_float() {
                v = "0".to_string();
            }
        } else if base0.is_array() && !v.starts_with('(') {
            v = format!("({v})");
        }

        let channels: Vec<Channel> = (0..e.lhs.len()).map(|i| e.channel(i)).collect();
        let value_i = channels.iter().position(|c| *c == Channel::Value);
        let status_i = channels.iter().position(|c| *c == Channel::Status);

        match value_i {
            Some(i) if e.lhs[i] != "_" => {
                let n = e.lhs[i].clone();
                let nt = self.lookup_var(&n);
                if nt.is_struct() {
                    for (j, (leaf, lt)) in nt.fields(&n).iter().enumerate() {
                        let lv = e
                            .values
                            .get(j)
                            .cloned()
                            .unwrap_or_else(|| lt.zero_value().to_string());
                        self.writeln(&format!("{lp}{}={lv}", flat_name(leaf)));
                    }
                } else {
                    let flat = flat_name(&n);
                    if v.is_empty() {
                        // Untyped declaration with no initializer.
                        if local {
                            self.writeln(&format!("{lp}{flat}"));
                        }
                    } else if local && status_i.is_some() {
                        // A bare `local` first, so the builtin's own status
                        // does not clobber the `$?` the call produces.
                        self.writeln(&format!("local {flat}"));
                        self.writeln(&format!("{flat}={v}"));
                    } else {
                        self.writeln(&format!("{lp}{flat}={v}"));
                    }
                }
            }
            _ => {
                let cmd = e.as_exec();
                if !cmd.is_empty() {
                    self.writeln(&cmd);
                }
            }
        }
        if let Some(i) = status_i {
            if e.lhs[i] != "_" {
                self.writeln(&format!("{lp}{}=\"$?\"", flat_name(&e.lhs[i])));
            }
        }
        for (i, c) in channels.iter().enumerate() {
            if let Channel::Shadow(n) = c {
                if e.lhs[i] == "_" {
                    continue;
                }
                let rt = e
                    .ret_types
                    .get(i)
                    .map(|t| self.resolve(t))
                    .unwrap_or_default();
                if rt.is_struct() {
                    let src = rt.fields(&format!("_tmp{n}"));
                    let dst = rt.fields(&e.lhs[i]);
                    for ((sleaf, _), (dleaf, _)) in src.iter().zip(dst.iter()) {
                        self.writeln(&format!(
                            "{lp}{}=\"{}\"",
                            flat_name(dleaf),
                            var_value(&flat_name(sleaf))
                        ));
                    }
                } else {
                    self.writeln(&format!("{lp}{}=\"$_tmp{n}\"", flat_name(&e.lhs[i])));
                }
            }
        }
    }
}
