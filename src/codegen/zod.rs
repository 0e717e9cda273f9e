//! Zod (v4) emitter: `ir::Ty` → validator expression text.
use serde_json::Value;

use super::quote;
use crate::ir::{Extra, Field, NumBounds, StrFormat, Ty};

pub fn emit(ty: &Ty) -> String {
    let mut out = String::new();
    write_ty(&mut out, ty);
    out
}

fn write_ty(out: &mut String, ty: &Ty) {
    match ty {
        Ty::Any => out.push_str("z.any()"),
        Ty::Never => out.push_str("z.never()"),
        Ty::Null => out.push_str("z.null()"),
        Ty::Bool => out.push_str("z.boolean()"),

        Ty::Number { integer, bounds } => {
            out.push_str("z.number()");
            if *integer {
                out.push_str(".int()");
            }
            write_bounds(out, bounds);
        }

        Ty::String { format, pattern, min_len, max_len } => {
            out.push_str(match format {
                None => "z.string()",
                Some(StrFormat::Email) => "z.email()",
                Some(StrFormat::Url) => "z.url()",
                Some(StrFormat::Uuid) => "z.uuid()",
                Some(StrFormat::DateTime) => "z.iso.datetime()",
                Some(StrFormat::Date) => "z.iso.date()",
                Some(StrFormat::Time) => "z.iso.time()",
            });
            if let Some(rx) = pattern {
                out.push_str(&format!(".regex(new RegExp({}))", quote(rx)));
            }
            if let Some(n) = min_len {
                out.push_str(&format!(".min({n})"));
            }
            if let Some(n) = max_len {
                out.push_str(&format!(".max({n})"));
            }
        }

        Ty::Enum(members) => {
            let members = members.iter().map(|m| quote(m)).collect::<Vec<_>>();
            out.push_str(&format!("z.enum([{}])", members.join(", ")));
        }

        Ty::Literal(Value::Null) => out.push_str("z.null()"),
        Ty::Literal(value) => out.push_str(&format!("z.literal({value})")),

        Ty::Array { item, min_items, max_items } => {
            out.push_str("z.array(");
            write_ty(out, item);
            out.push(')');
            if let Some(n) = min_items {
                out.push_str(&format!(".min({n})"));
            }
            if let Some(n) = max_items {
                out.push_str(&format!(".max({n})"));
            }
        }

        Ty::Tuple(elems) => {
            out.push_str("z.tuple([");
            write_list(out, elems);
            out.push_str("])");
        }

        Ty::Object { fields, extra } => {
            let ctor = match extra {
                Extra::Loose => "z.looseObject",
                Extra::Strict => "z.strictObject",
                Extra::Strip | Extra::Catchall(_) => "z.object",
            };
            out.push_str(ctor);
            out.push('(');
            write_shape(out, fields);
            out.push(')');
            if let Extra::Catchall(rest) = extra {
                out.push_str(".catchall(");
                write_ty(out, rest);
                out.push(')');
            }
        }

        Ty::Record(value) => {
            out.push_str("z.record(z.string(), ");
            write_ty(out, value);
            out.push(')');
        }

        Ty::Union(arms) => match arms.as_slice() {
            [] => out.push_str("z.never()"),
            [only] => write_ty(out, only),
            _ => {
                out.push_str("z.union([");
                write_list(out, arms);
                out.push_str("])");
            }
        },

        Ty::Intersection(parts) => match parts.split_first() {
            None => out.push_str("z.any()"),
            Some((first, rest)) => {
                let mut acc = emit(first);
                for part in rest {
                    acc = format!("z.intersection({acc}, {})", emit(part));
                }
                out.push_str(&acc);
            }
        },

        Ty::Ref(name) => out.push_str(name),

        Ty::Nullable(inner) => {
            write_ty(out, inner);
            out.push_str(".nullable()");
        }

        Ty::Described { inner, description } => {
            write_ty(out, inner);
            out.push_str(&format!(".describe({})", quote(description)));
        }

        Ty::Defaulted { inner, default } => {
            write_ty(out, inner);
            out.push_str(&format!(".prefault({default})"));
        }
    }
}

fn write_bounds(out: &mut String, bounds: &NumBounds) {
    if let Some(n) = &bounds.min {
        out.push_str(&format!(".gte({n})"));
    }
    if let Some(n) = &bounds.exclusive_min {
        out.push_str(&format!(".gt({n})"));
    }
    if let Some(n) = &bounds.max {
        out.push_str(&format!(".lte({n})"));
    }
    if let Some(n) = &bounds.exclusive_max {
        out.push_str(&format!(".lt({n})"));
    }
    if let Some(n) = &bounds.multiple_of {
        out.push_str(&format!(".multipleOf({n})"));
    }
}

fn write_list(out: &mut String, tys: &[Ty]) {
    for (i, ty) in tys.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_ty(out, ty);
    }
}

fn write_shape(out: &mut String, fields: &[Field]) {
    if fields.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{ ");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote(&field.name));
        out.push_str(": ");
        write_ty(out, &field.ty);
        if !field.required && !field.ty.has_default() {
            out.push_str(".optional()");
        }
    }
    out.push_str(" }");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string() -> Ty {
        Ty::String { format: None, pattern: None, min_len: None, max_len: None }
    }

    #[test]
    fn objects_mark_optional_fields() {
        let ty = Ty::Object {
            fields: vec![
                Field { name: "host".into(), ty: string(), required: true },
                Field { name: "port".into(), ty: Ty::Number { integer: true, bounds: NumBounds::default() }, required: false },
            ],
            extra: Extra::Strip,
        };
        assert_eq!(emit(&ty), r#"z.object({ "host": z.string(), "port": z.number().int().optional() })"#);
    }

    #[test]
    fn defaulted_fields_are_not_optional() {
        let ty = Ty::Object {
            fields: vec![Field {
                name: "mode".into(),
                ty: Ty::Defaulted { inner: Box::new(Ty::Enum(vec!["a".into(), "b".into()])), default: json!("a") },
                required: false,
            }],
            extra: Extra::Loose,
        };
        assert_eq!(emit(&ty), r#"z.looseObject({ "mode": z.enum(["a", "b"]).prefault("a") })"#);
    }

    #[test]
    fn string_constraints_chain() {
        let ty = Ty::String {
            format: Some(StrFormat::Email),
            pattern: Some("^a.*$".into()),
            min_len: Some(3),
            max_len: None,
        };
        assert_eq!(emit(&ty), r#"z.email().regex(new RegExp("^a.*$")).min(3)"#);
    }

    #[test]
    fn numeric_bounds_keep_json_spelling() {
        let ty = Ty::Number {
            integer: false,
            bounds: NumBounds {
                min: Some(0.into()),
                exclusive_max: serde_json::Number::from_f64(1.5),
                ..NumBounds::default()
            },
        };
        assert_eq!(emit(&ty), "z.number().gte(0).lt(1.5)");
    }

    #[test]
    fn unions_and_intersections() {
        let union = Ty::Union(vec![Ty::Ref("db_references".into()), Ty::Ref("db_type".into())]);
        assert_eq!(emit(&union), "z.union([db_references, db_type])");

        let both = Ty::Intersection(vec![Ty::Bool, Ty::Null, Ty::Any]);
        assert_eq!(emit(&both), "z.intersection(z.intersection(z.boolean(), z.null()), z.any())");
    }

    #[test]
    fn records_take_an_explicit_key_schema() {
        assert_eq!(emit(&Ty::Record(Box::new(Ty::Any))), "z.record(z.string(), z.any())");
    }

    #[test]
    fn modifiers_wrap_in_order() {
        let ty = Ty::Defaulted {
            inner: Box::new(Ty::Described { inner: Box::new(Ty::Nullable(Box::new(string()))), description: "the \"name\"".into() }),
            default: json!("x"),
        };
        assert_eq!(emit(&ty), r#"z.string().nullable().describe("the \"name\"").prefault("x")"#);
    }

    #[test]
    fn literals() {
        assert_eq!(emit(&Ty::Literal(json!(3))), "z.literal(3)");
        assert_eq!(emit(&Ty::Literal(json!("x"))), r#"z.literal("x")"#);
        assert_eq!(emit(&Ty::Literal(Value::Null)), "z.null()");
    }
}
