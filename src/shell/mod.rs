//! The Bash backend: compiler state and the per-file statement loop.

mod builtins;
mod gen_expr;
mod gen_stmt;
mod output;

use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::scanner::{Scanner, TokenKind};
use crate::types::Ty;
pub(crate) use builtins::CallTemplate;
use output::Output;

/// One enclosing loop: the block-stack depth it owns and the post-iteration
/// command to run before `continue` and at the natural end of the body.
pub(crate) struct LoopFrame {
    pub depth: usize,
    pub post: String,
}

/// Process-wide translation state, shared across all source files of a
/// compiled unit. Only the imports map is per-file.
pub struct Compiler {
    pub(crate) scanner: Scanner,
    pub(crate) imports: HashMap<String, String>,
    pub(crate) funcs: HashMap<String, CallTemplate>,
    pub(crate) vars: HashMap<String, Ty>,
    pub(crate) user_types: HashMap<String, Ty>,
    pub(crate) package: String,
    /// Block-close stack: one pending terminator per open block.
    pub(crate) cl: Vec<String>,
    pub(crate) loops: Vec<LoopFrame>,
    /// Call template of the function whose body is being emitted.
    pub(crate) current_fn: Option<CallTemplate>,
    /// `bc` scale set by `shell.SetFloatPrecision`.
    pub(crate) float_scale: Option<u32>,
    pub(crate) out: Output,
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        let mut c = Compiler {
            scanner: Scanner::empty(),
            imports: HashMap::new(),
            funcs: builtins::table(),
            vars: HashMap::new(),
            user_types: HashMap::new(),
            package: String::new(),
            cl: Vec::new(),
            loops: Vec::new(),
            current_fn: None,
            float_scale: None,
            out: Output::default(),
        };
        c.writeln("#!/bin/bash");
        c.writeln("");
        c
    }

    /// Compiles one source file into the shared output. User types, variables
    /// and functions persist across calls; imports are scoped to the file.
    pub fn compile(&mut self, source: &str, name: &str) -> Result<()> {
        debug!("compiling {name}");
        self.scanner = Scanner::new(source, name)?;
        self.imports.clear();

        loop {
            let tok = self.scanner.scan_with_comments();
            match tok {
                TokenKind::Eof => break,
                TokenKind::Punct('}') if !self.cl.is_empty() => self.end_block(),
                TokenKind::Punct('{') => self.cl.push(String::new()),
                TokenKind::Comment => self.write_comment(),
                TokenKind::Ident => self.dispatch_ident(),
                _ => self.unknown_token(),
            }
        }
        self.out.flush(self.cl.len());
        Ok(())
    }

    fn dispatch_ident(&mut self) {
        let t = self.scanner.token_text().to_string();
        match t.as_str() {
            "package" => {
                self.scanner.scan();
                self.package = self.scanner.token_text().to_string();
            }
            "import" => self.parse_import(),
            "type" => self.proc_type(),
            "func" => self.proc_func(),
            "var" => self.proc_decl(false),
            "const" => self.proc_decl(true),
            "for" => self.proc_for(),
            "if" => self.proc_if(),
            "else" => self.proc_else(),
            "break" => self.writeln("break"),
            "continue" => self.proc_continue(),
            "return" => self.proc_return(),
            "go" => {
                let e = self.read_expression(&Ty::default(), "", false);
                let cmd = e.as_exec();
                self.writeln(&format!("{cmd} &"));
            }
            "defer" => {
                let e = self.read_expression(&Ty::default(), "", false);
                let cmd = e.as_exec();
                self.writeln(&format!("# defer {cmd}"));
            }
            _ => {
                self.scanner.push_back();
                let e = self.read_expression(&Ty::default(), "", true);
                let declare = e.op == ":=";
                self.write_expr(&e, None, declare, false);
            }
        }
    }

    pub(crate) fn writeln(&mut self, line: &str) {
        let indent = self.cl.len();
        self.out.writeln(indent, line);
    }

    /// Closes the innermost block: its terminator moves into the lookahead
    /// buffer so a following `else` can still replace it.
    pub(crate) fn end_block(&mut self) {
        self.out.flush(self.cl.len());
        if let Some(term) = self.cl.pop() {
            self.out.set_buffered(term);
        }
        if let Some(frame) = self.loops.last() {
            if self.cl.len() < frame.depth {
                self.loops.pop();
            }
        }
        if self.cl.is_empty() {
            self.current_fn = None;
        }
    }

    fn write_comment(&mut self) {
        let text = self.scanner.token_text().to_string();
        for line in text.trim_matches(|c| "/* ".contains(c)).split('\n') {
            self.writeln(&format!("# {}", line.trim_end_matches('\r')));
        }
    }

    pub(crate) fn unknown_token(&mut self) {
        let msg = format!(
            "# Unknown token {}: {} {}",
            self.scanner.position(),
            self.scanner.token_text(),
            self.scanner.kind()
        );
        self.writeln(&msg);
    }

    /// Finalizes the script; appends the `main` call when one was compiled.
    pub fn finish(mut self) -> String {
        self.out.flush(self.cl.len());
        if self.funcs.contains_key("main") {
            self.out.writeln(0, "main \"${@}\"");
        }
        self.out.into_string()
    }

    /// Follows user-type aliases down to a base descriptor.
    pub(crate) fn resolve(&self, t: &Ty) -> Ty {
        let mut t = t.clone();
        for _ in 0..16 {
            match self.user_types.get(t.as_str()) {
                Some(base) if *base != t => t = base.clone(),
                _ => return t,
            }
        }
        t
    }

    /// Resolved type of a (possibly dotted) variable, or empty.
    pub(crate) fn lookup_var(&self, name: &str) -> Ty {
        self.vars
            .get(name)
            .map(|t| self.resolve(t))
            .unwrap_or_default()
    }

    /// Records a variable's type. Return conventions normalize to the value
    /// type they carry; struct-typed names additionally register every field
    /// under its dotted path, intermediate structs included, so field chains
    /// resolve one segment at a time.
    pub(crate) fn set_type(&mut self, name: &str, t: &Ty) {
        let t = t.normalized();
        let base = self.resolve(&t);
        if base.is_struct() {
            self.register_struct(name, &base);
        }
        self.vars.insert(name.to_string(), t);
    }

    fn register_struct(&mut self, name: &str, desc: &Ty) {
        for (fname, fty) in desc.struct_fields() {
            let key = format!("{name}.{fname}");
            let fbase = self.resolve(&fty);
            if fbase.is_struct() {
                self.register_struct(&key, &fbase);
                self.vars.insert(key, fbase);
            } else {
                self.vars.insert(key, fty.normalized());
            }
        }
    }

    /// Renders the value form of an expression under the current `bc` scale.
    pub(crate) fn value_of(&self, e: &gen_expr::ShellExpr) -> String {
        e.as_value(self.float_scale)
    }

    /// Consumes a type from the token stream and returns its descriptor.
    /// Leaves the current token untouched when no type is present.
    pub(crate) fn read_type(&mut self, already_scanned: bool) -> Ty {
        if !already_scanned {
            self.scanner.scan();
        }
        let t = match self.scanner.kind() {
            TokenKind::Ident => {
                let mut t = self.scanner.token_text().to_string();
                if t == "map" {
                    self.scanner.scan(); // '['
                    let k = self.read_type(false);
                    self.scanner.scan(); // ']'
                    let v = self.read_type(false);
                    t = format!("map[{k}]{v}");
                } else if t == "struct" && self.scanner.peek() == '{' {
                    t = self.read_struct_type().as_str().to_string();
                } else if self.imports.contains_key(&t) {
                    self.scanner.scan(); // '.'
                    self.scanner.scan();
                    t = format!("{}.{}", t, self.scanner.token_text());
                }
                t
            }
            TokenKind::Punct('*') => format!("*{}", self.read_type(false)),
            TokenKind::Punct('[') => {
                // `[N]T` — the size is parsed and ignored.
                if self.scanner.scan() != TokenKind::Punct(']') {
                    self.scanner.push_back();
                    self.read_expression(&Ty::new("int"), "]", false);
                }
                format!("[]{}", self.read_type(false))
            }
            _ => String::new(),
        };
        Ty::new(t.strip_prefix("shell.").unwrap_or(&t))
    }

    /// Parses `struct { … }` field lists into the canonical descriptor.
    fn read_struct_type(&mut self) -> Ty {
        self.scanner.scan(); // '{'
        let mut fields: Vec<(String, Ty)> = Vec::new();
        loop {
            let tok = self.scanner.scan();
            match tok {
                TokenKind::Eof | TokenKind::Punct('}') => break,
                TokenKind::Punct(';') | TokenKind::Punct(',') => continue,
                TokenKind::Ident => {
                    let mut names = vec![self.scanner.token_text().to_string()];
                    while self.scanner.peek() == ',' {
                        self.scanner.scan(); // ','
                        self.scanner.scan();
                        names.push(self.scanner.token_text().to_string());
                    }
                    let ft = self.read_type(false);
                    // Nested struct types are inlined so the descriptor is
                    // self-contained for leaf enumeration.
                    let base = self.resolve(&ft);
                    let ft = if base.is_struct() { base } else { ft };
                    for n in names {
                        fields.push((n, ft.clone()));
                    }
                }
                _ => continue,
            }
        }
        Ty::of_struct(&fields)
    }
}
