//! Built-in function table: how SRC standard-library calls render as shell.
//!
//! Each entry picks one of three strategies, in priority order: an apply
//! function that synthesizes the command from the rendered argument list, a
//! template with `{i}` / `{*i}` / `{fi}` holes, or a command prefix the
//! arguments are appended to. `{i}` substitutes the i-th argument's value
//! form, `{*i}` its bare variable name, `{fi}` its float (`bc`) form.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::gen_expr::ExprKind;
use super::Compiler;
use crate::types::Ty;
use crate::utils::{trim_quote, var_name};

/// Rewrite hook dispatched at template-apply time. Taking the compiler lets
/// entries like `len` and `reflect.TypeOf` read the variable table and
/// `shell.SetFloatPrecision` rewrite the float renderer.
pub(crate) type ApplyFn = fn(&mut Compiler, &[String]) -> String;

#[derive(Clone)]
pub(crate) struct CallTemplate {
    pub expr: String,
    pub kind: ExprKind,
    pub ret_types: Vec<Ty>,
    /// Index of the return value that rides stdout; `None` when every return
    /// travels through shadow variables or the exit status.
    pub primary: Option<usize>,
    pub stdout: bool,
    pub apply: Option<ApplyFn>,
    /// The call mutates its first argument in place (`append`).
    pub ret_arg: bool,
}

impl CallTemplate {
    pub fn cmd(expr: &str) -> CallTemplate {
        CallTemplate {
            expr: expr.to_string(),
            kind: ExprKind::Plain,
            ret_types: Vec::new(),
            primary: Some(0),
            stdout: false,
            apply: None,
            ret_arg: false,
        }
    }

    pub fn rets(mut self, rets: &[&str]) -> CallTemplate {
        self.ret_types = rets.iter().map(|r| Ty::new(*r)).collect();
        self
    }

    pub fn on_stdout(mut self) -> CallTemplate {
        self.stdout = true;
        self
    }

    pub fn no_primary(mut self) -> CallTemplate {
        self.primary = None;
        self
    }

    /// The rendered call is a `bc` expression fragment.
    pub fn float_expr(mut self) -> CallTemplate {
        self.kind = ExprKind::FloatArith;
        self
    }

    pub fn conv(mut self, f: ApplyFn) -> CallTemplate {
        self.apply = Some(f);
        self
    }

    pub fn mutates_arg(mut self) -> CallTemplate {
        self.ret_arg = true;
        self
    }
}

static HOLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\*|f)?(\d+)\}").unwrap());

pub(crate) fn has_holes(expr: &str) -> bool {
    HOLE.is_match(expr)
}

pub(crate) fn fill_template(expr: &str, args: &[String], float_args: &[String]) -> String {
    HOLE.replace_all(expr, |caps: &Captures| {
        let i: usize = caps[2].parse().unwrap();
        match caps.get(1).map(|m| m.as_str()) {
            Some("*") => args.get(i).map(|a| var_name(a).to_string()).unwrap_or_default(),
            Some("f") => float_args.get(i).cloned().unwrap_or_default(),
            _ => args.get(i).cloned().unwrap_or_default(),
        }
    })
    .into_owned()
}

pub(crate) fn table() -> HashMap<String, CallTemplate> {
    use CallTemplate as T;
    let entries: Vec<(&str, CallTemplate)> = vec![
        // shell
        ("shell.Sleep", T::cmd("sleep")),
        ("shell.Exit", T::cmd("exit")),
        ("shell.Export", T::cmd("export")),
        ("shell.Exec", T::cmd("").rets(&["string", "StatusCode"]).on_stdout()),
        (
            "shell.Read",
            T::cmd("IFS= read -r -s _tmp0")
                .rets(&["string", "StatusCode"])
                .no_primary(),
        ),
        (
            "shell.ReadLine",
            T::cmd("IFS= read -r -s _tmp0 <&{0}")
                .rets(&["string", "StatusCode"])
                .no_primary(),
        ),
        ("shell.SubStr", T::cmd("\"${{*0}:{1}:{2}}\"").rets(&["string"])),
        (
            "shell.Arg",
            T::cmd("").rets(&["string"]).on_stdout().conv(|_, args| {
                // Braces so two-digit positions read as ${10}, not $1 then 0.
                format!("eval echo \\${{{}}}", args[0])
            }),
        ),
        ("shell.Args", T::cmd("\"$0\" \"$@\"").rets(&["[]string"])),
        ("shell.SetArgs", T::cmd("set --")),
        ("shell.NArgs", T::cmd("$(( $# + 1 ))").rets(&["int"])),
        (
            "shell.UnixTimeMs",
            T::cmd("printf '%.0f' $( echo \"${EPOCHREALTIME:-$(date +%s)} * 1000\" | bc )")
                .rets(&["int"])
                .on_stdout(),
        ),
        (
            "shell.Do",
            T::cmd("")
                .rets(&["StatusCode"])
                .no_primary()
                .conv(|_, args| trim_quote(&args[0]).to_string()),
        ),
        ("shell.IsShellScript", T::cmd("1").rets(&["bool"])),
        // fmt
        ("fmt.Print", T::cmd("echo -n")),
        ("fmt.Println", T::cmd("echo")),
        ("fmt.Printf", T::cmd("printf")),
        ("fmt.Sprint", T::cmd("echo -n").rets(&["string"]).on_stdout()),
        (
            "fmt.Sprintln",
            T::cmd("").rets(&["string"]).conv(|_, args| {
                format!("$(echo {})$'\\n'", args.join(" "))
            }),
        ),
        ("fmt.Sprintf", T::cmd("printf").rets(&["string"]).on_stdout()),
        (
            "fmt.Fprint",
            T::cmd("").conv(|_, args| format!("echo -n {} >&{}", args[1..].join(" "), args[0])),
        ),
        (
            "fmt.Fprintln",
            T::cmd("").conv(|_, args| format!("echo {} >&{}", args[1..].join(" "), args[0])),
        ),
        (
            "fmt.Fprintf",
            T::cmd("").conv(|_, args| format!("printf {} >&{}", args[1..].join(" "), args[0])),
        ),
        // strings
        ("strings.ReplaceAll", T::cmd("\"${{*0}//{1}/{2}}\"").rets(&["string"])),
        (
            "strings.ToUpper",
            T::cmd("echo {0}|tr '[:lower:]' '[:upper:]'").rets(&["string"]).on_stdout(),
        ),
        (
            "strings.ToLower",
            T::cmd("echo {0}|tr '[:upper:]' '[:lower:]'").rets(&["string"]).on_stdout(),
        ),
        (
            "strings.TrimSpace",
            T::cmd("echo {0}| sed -e 's/^[[:space:]]*//' -e 's/[[:space:]]*$//'")
                .rets(&["string"])
                .on_stdout(),
        ),
        ("strings.TrimPrefix", T::cmd("\"${{*0}#{1}}\"").rets(&["string"])),
        ("strings.TrimSuffix", T::cmd("\"${{*0}%{1}}\"").rets(&["string"])),
        (
            "strings.Split",
            T::cmd("").rets(&["[]string"]).on_stdout().conv(|_, args| {
                format!(
                    "IFS={} _tmp0=({}) ;echo \"${{_tmp0[@]}}\"",
                    args[1],
                    trim_quote(&args[0])
                )
            }),
        ),
        (
            "strings.Join",
            T::cmd("IFS={1}; echo \"${{*0}[*]}\"").rets(&["string"]).on_stdout(),
        ),
        (
            "strings.Contains",
            T::cmd("case {0} in (*{1}*) echo 1;; (*) echo 0;; esac")
                .rets(&["bool"])
                .on_stdout(),
        ),
        (
            "strings.IndexAny",
            T::cmd("expr '(' index {0} {1} ')' - 1").rets(&["int"]).on_stdout(),
        ),
        // os
        ("os.Stdin", T::cmd("0").rets(&["*os.File"])),
        ("os.Stdout", T::cmd("1").rets(&["*os.File"])),
        ("os.Stderr", T::cmd("2").rets(&["*os.File"])),
        ("os.Args", T::cmd("\"$0\" \"$@\"").rets(&["[]string"])),
        ("os.Exit", T::cmd("exit")),
        ("os.Getwd", T::cmd("pwd").rets(&["string", "StatusCode"]).on_stdout()),
        ("os.Chdir", T::cmd("cd").rets(&["StatusCode"])),
        ("os.Getpid", T::cmd("$$").rets(&["int"])),
        ("os.Getppid", T::cmd("$PPID").rets(&["int"])),
        ("os.Getuid", T::cmd("${UID:--1}").rets(&["int"])),
        ("os.Geteuid", T::cmd("${EUID:-${UID:--1}}").rets(&["int"])),
        ("os.Getgid", T::cmd("${GID:--1}").rets(&["int"])),
        ("os.Getegid", T::cmd("${EGID:-${GID:--1}}").rets(&["int"])),
        ("os.Hostname", T::cmd("uname -n").rets(&["string", "StatusCode"]).on_stdout()),
        (
            "os.Getenv",
            T::cmd("").rets(&["string"]).conv(|_, args| {
                format!("\"${{{}}}\"", trim_quote(&args[0]))
            }),
        ),
        (
            "os.Setenv",
            T::cmd("").conv(|_, args| format!("export {}={}", trim_quote(&args[0]), args[1])),
        ),
        (
            "os.Pipe",
            T::cmd(
                "_tmp=$(mktemp -d) && mkfifo $_tmp/f && _tmp0=$(( ++GOTOSH_fd + 2 )) && \
                 _tmp1=$(( ++GOTOSH_fd + 2 )) && eval \"exec $_tmp1<>\\\"$_tmp/f\\\" \
                 $_tmp0<\\\"$_tmp/f\\\"\" && rm -rf $_tmp",
            )
            .rets(&["*os.File", "*os.File", "StatusCode"])
            .no_primary(),
        ),
        (
            "os.Open",
            T::cmd("_tmp0=$(( ++GOTOSH_fd + 2 )) ; eval \"exec $_tmp0<\"{0}")
                .rets(&["*os.File", "StatusCode"])
                .no_primary(),
        ),
        (
            "os.Create",
            T::cmd("_tmp0=$(( ++GOTOSH_fd + 2 )) ; eval \"exec $_tmp0>\"{0}")
                .rets(&["*os.File", "StatusCode"])
                .no_primary(),
        ),
        ("os.Mkdir", T::cmd("mkdir {0}").rets(&["StatusCode"])),
        ("os.MkdirAll", T::cmd("mkdir -p {0}").rets(&["StatusCode"])),
        ("os.Remove", T::cmd("rm -f").rets(&["StatusCode"])),
        ("os.RemoveAll", T::cmd("rm -rf").rets(&["StatusCode"])),
        ("os.Rename", T::cmd("mv").rets(&["StatusCode"])),
        ("os.File__WriteString", T::cmd("echo -n {1} >&{0}")),
        ("os.File__Close", T::cmd("eval \"exec {0}<&- {0}>&-\"")),
        ("os.File__Fd", T::cmd("{0}").rets(&["int"])),
        ("exec.Command", T::cmd("echo -n ").rets(&["*exec.Cmd"]).on_stdout()),
        ("exec.Cmd__Output", T::cmd("bash -c").rets(&["string", "StatusCode"]).on_stdout()),
        (
            "reflect.TypeOf",
            T::cmd("").rets(&["string"]).conv(|c, args| {
                let t = c
                    .vars
                    .get(var_name(&args[0]))
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default();
                format!("\"{t}\"")
            }),
        ),
        ("runtime.Compiler", T::cmd("'gotosh'").rets(&["string"])),
        ("runtime.GOARCH", T::cmd("uname -m").rets(&["string"]).on_stdout()),
        ("runtime.GOOS", T::cmd("uname -o").rets(&["string"]).on_stdout()),
        // math, via bc
        ("math.Pi", T::cmd("3.141592653589793").rets(&["float64"])),
        ("math.E", T::cmd("2.718281828459045").rets(&["float64"])),
        ("math.Sqrt", T::cmd("sqrt({f0})").rets(&["float64"]).float_expr()),
        ("math.Pow", T::cmd("e(l({f0})*{f1})").rets(&["float64"]).float_expr()),
        ("math.Exp", T::cmd("e({f0})").rets(&["float64"]).float_expr()),
        ("math.Log", T::cmd("l({f0})").rets(&["float64"]).float_expr()),
        ("math.Sin", T::cmd("s({f0})").rets(&["float64"]).float_expr()),
        ("math.Cos", T::cmd("c({f0})").rets(&["float64"]).float_expr()),
        ("math.Tan", T::cmd("x={f0}; s(x)/c(x)").rets(&["float64"]).float_expr()),
        ("math.Atan", T::cmd("a({f0})").rets(&["float64"]).float_expr()),
        (
            "math.Sinh",
            T::cmd("x={f0}; ((e(x)-e(-x))/2)").rets(&["float64"]).float_expr(),
        ),
        (
            "math.Cosh",
            T::cmd("x={f0}; ((e(x)+e(-x))/2)").rets(&["float64"]).float_expr(),
        ),
        (
            "math.Tanh",
            T::cmd("x={f0}; ((e(x)-e(-x))/(e(x)+e(-x)))")
                .rets(&["float64"])
                .float_expr(),
        ),
        // casts
        ("int", T::cmd("printf '%.0f' {0}").rets(&["int"]).on_stdout()),
        ("byte", T::cmd("").rets(&["int"])),
        ("float32", T::cmd("").rets(&["float32"])),
        ("float64", T::cmd("").rets(&["float64"])),
        ("string", T::cmd("").rets(&["string"])),
        ("strconv.Atoi", T::cmd("").rets(&["int", "StatusCode"])),
        ("strconv.Itoa", T::cmd("").rets(&["string"])),
        ("StatusCode", T::cmd("").rets(&["int"])),
        ("shell.StatusCode", T::cmd("").rets(&["int"])),
        // slices
        (
            "len",
            T::cmd("").rets(&["int"]).conv(|_, args| {
                let inner = trim_quote(&args[0]).trim_matches(|c| "${}".contains(c));
                format!("${{#{inner}}}")
            }),
        ),
        (
            "append",
            T::cmd("")
                .rets(&["[]any"])
                .no_primary()
                .mutates_arg()
                .conv(|_, args| format!("{}+=({})", var_name(&args[0]), args[1..].join(" "))),
        ),
    ];
    entries
        .into_iter()
        .map(|(name, t)| (name.to_string(), t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holes_substitute_value_name_and_float_forms() {
        let args = vec!["\"$s\"".to_string(), "1".to_string(), "3".to_string()];
        let floats = vec!["$s".to_string(), "1".to_string(), "3".to_string()];
        assert_eq!(
            fill_template("\"${{*0}:{1}:{2}}\"", &args, &floats),
            "\"${s:1:3}\""
        );
        assert_eq!(fill_template("sqrt({f0})", &args, &floats), "sqrt($s)");
    }

    #[test]
    fn table_reserves_the_return_conventions() {
        let t = table();
        let read = &t["shell.Read"];
        assert!(read.primary.is_none());
        assert_eq!(read.ret_types[1], Ty::new("StatusCode"));
        let exec = &t["shell.Exec"];
        assert!(exec.stdout);
    }

    #[test]
    fn arg_braces_two_digit_positions() {
        let mut c = Compiler::new();
        let arg = table()["shell.Arg"].apply.unwrap();
        assert_eq!(arg(&mut c, &["10".to_string()]), "eval echo \\${10}");
        assert_eq!(arg(&mut c, &["2".to_string()]), "eval echo \\${2}");
    }
}
