//! Normalized textual type descriptors.
//!
//! A [`Ty`] is the canonical string form of an SRC type: scalars keep their
//! name (`int`, `string`, `float64`), arrays are `[]T`, pointers `*T`, maps
//! `map[K]V`. Struct types serialize to a colon-delimited flat form,
//! `struct{:name:type:…:}`, with nested structs inlined recursively, so the
//! descriptor itself is enough to enumerate the leaf fields a struct value
//! decomposes into.

use std::fmt;

/// Marker returned by the prefix scan of a nested struct descriptor.
const STRUCT_OPEN: &str = "struct{";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ty(String);

impl Ty {
    pub fn new(s: impl Into<String>) -> Ty {
        Ty(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_array(&self) -> bool {
        self.0.starts_with("[]")
    }

    /// Element type of an array descriptor.
    pub fn elem(&self) -> Ty {
        Ty(self.0.strip_prefix("[]").unwrap_or(&self.0).to_string())
    }

    pub fn is_struct(&self) -> bool {
        self.0.starts_with(STRUCT_OPEN)
    }

    pub fn is_string(&self) -> bool {
        self.0 == "string"
    }

    pub fn is_int(&self) -> bool {
        matches!(
            self.0.as_str(),
            "int" | "int8" | "int16" | "int32" | "int64" | "byte" | "bool"
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.0.as_str(), "float32" | "float64")
    }

    /// The value of a `StatusCode` function result IS the exit status.
    pub fn is_status(&self) -> bool {
        self.0 == "StatusCode"
    }

    /// `TempVarString`/`TempVarInt` results always travel through a `_tmp<i>`
    /// shadow variable, never stdout.
    pub fn is_temp_var(&self) -> bool {
        self.0.starts_with("TempVar")
    }

    /// Maps the shell-return conventions back to the value type they carry.
    pub fn normalized(&self) -> Ty {
        match self.0.as_str() {
            "StatusCode" | "TempVarInt" => Ty::new("int"),
            "TempVarString" => Ty::new("string"),
            _ => self.clone(),
        }
    }

    /// Serializes a field list into the canonical struct descriptor.
    pub fn of_struct(fields: &[(String, Ty)]) -> Ty {
        let mut s = String::from(STRUCT_OPEN);
        for (name, ty) in fields {
            s.push(':');
            s.push_str(name);
            s.push(':');
            s.push_str(ty.as_str());
        }
        s.push_str(":}");
        Ty(s)
    }

    /// Immediate fields of a struct descriptor; empty for non-structs.
    pub fn struct_fields(&self) -> Vec<(String, Ty)> {
        let mut out = Vec::new();
        let Some(mut rest) = self.0.strip_prefix(STRUCT_OPEN) else {
            return out;
        };
        loop {
            rest = match rest.strip_prefix(':') {
                Some(r) => r,
                None => break,
            };
            if rest.starts_with('}') {
                break;
            }
            let Some(sep) = rest.find(':') else { break };
            let name = &rest[..sep];
            rest = &rest[sep + 1..];
            let ty_len = if rest.starts_with(STRUCT_OPEN) {
                match struct_end(rest) {
                    Some(n) => n,
                    None => break,
                }
            } else {
                rest.find(':').unwrap_or(rest.len())
            };
            out.push((name.to_string(), Ty::new(&rest[..ty_len])));
            rest = &rest[ty_len..];
        }
        out
    }

    /// Flattened leaf fields of a possibly-struct type, named by joining the
    /// field path onto `name` with dots. A non-struct yields itself.
    pub fn fields(&self, name: &str) -> Vec<(String, Ty)> {
        if !self.is_struct() {
            return vec![(name.to_string(), self.clone())];
        }
        let mut out = Vec::new();
        for (fname, fty) in self.struct_fields() {
            out.extend(fty.fields(&format!("{name}.{fname}")));
        }
        out
    }

    /// Shell-literal default for an uninitialized leaf of this type.
    pub fn zero_value(&self) -> &'static str {
        if self.is_int() || self.is_float() {
            "0"
        } else {
            "\"\""
        }
    }
}

/// Length of the leading `struct{…:}` descriptor in `s`, delimiters included.
fn struct_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = 0usize;
    while i < s.len() {
        if s[i..].starts_with(STRUCT_OPEN) {
            depth += 1;
            i += STRUCT_OPEN.len();
        } else if s[i..].starts_with(":}") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ty {
    fn from(s: &str) -> Ty {
        Ty::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> Ty {
        Ty::new(s)
    }

    #[test]
    fn scalar_classification() {
        assert!(ty("int").is_int());
        assert!(ty("bool").is_int());
        assert!(ty("float64").is_float());
        assert!(ty("[]string").is_array());
        assert_eq!(ty("[]string").elem(), ty("string"));
    }

    #[test]
    fn return_conventions_normalize() {
        assert_eq!(ty("StatusCode").normalized(), ty("int"));
        assert_eq!(ty("TempVarString").normalized(), ty("string"));
        assert_eq!(ty("string").normalized(), ty("string"));
    }

    #[test]
    fn struct_descriptor_round_trips() {
        let v2 = Ty::of_struct(&[
            ("X".to_string(), ty("float64")),
            ("Y".to_string(), ty("float64")),
        ]);
        assert_eq!(v2.as_str(), "struct{:X:float64:Y:float64:}");
        assert_eq!(
            v2.struct_fields(),
            vec![
                ("X".to_string(), ty("float64")),
                ("Y".to_string(), ty("float64"))
            ]
        );
    }

    #[test]
    fn nested_struct_fields_flatten() {
        let date = Ty::of_struct(&[
            ("Year".to_string(), ty("int")),
            ("Month".to_string(), ty("int")),
        ]);
        let person = Ty::of_struct(&[
            ("Name".to_string(), ty("string")),
            ("Birthday".to_string(), date),
        ]);
        let leaves = person.fields("p");
        assert_eq!(
            leaves,
            vec![
                ("p.Name".to_string(), ty("string")),
                ("p.Birthday.Year".to_string(), ty("int")),
                ("p.Birthday.Month".to_string(), ty("int")),
            ]
        );
    }

    #[test]
    fn non_struct_fields_are_the_leaf_itself() {
        assert_eq!(ty("int").fields("x"), vec![("x".to_string(), ty("int"))]);
    }
}
