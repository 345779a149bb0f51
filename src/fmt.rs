//! A textual dump of resolved files.

use std::fmt::{self, Write};

use crate::tree::{
    Cardinality, EnumRef, ExtendRef, FieldRef, FieldType, FileRef, MessageRef, OptionDecl,
};

pub(crate) struct HexEscaped<'a>(pub &'a [u8]);

impl<'a> fmt::Display for HexEscaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &ch in self.0 {
            match ch {
                b'\t' => f.write_str("\\t")?,
                b'\r' => f.write_str("\\r")?,
                b'\n' => f.write_str("\\n")?,
                b'\\' => f.write_str("\\\\")?,
                b'\'' => f.write_str("\\'")?,
                b'"' => f.write_str("\\\"")?,
                b'\x20'..=b'\x7e' => f.write_char(ch as char)?,
                _ => write!(f, "\\{:03o}", ch)?,
            }
        }

        Ok(())
    }
}

/// Prints a resolved file as source text.
///
/// Every named type is written as an absolute, fully-qualified name, so parsing the output
/// against the same imports binds each field to the same declaration.
pub fn to_source(file: FileRef<'_>) -> String {
    let mut printer = Printer::default();
    // Writing to a string never fails.
    let _ = printer.file(file);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn file(&mut self, file: FileRef<'_>) -> fmt::Result {
        if file.has_syntax() {
            self.line(format_args!("syntax = \"{}\";", file.syntax()))?;
        }
        if !file.package().is_empty() {
            self.line(format_args!("package {};", file.package()))?;
        }
        for import in file.imports() {
            let modifier = if import.is_public() {
                "public "
            } else if import.is_weak() {
                "weak "
            } else {
                ""
            };
            self.line(format_args!(
                "import {}\"{}\";",
                modifier,
                HexEscaped(import.file().name().as_bytes())
            ))?;
        }
        self.options(file.options())?;

        for enum_ in file.enums() {
            self.enum_(enum_)?;
        }
        for message in file.messages() {
            self.message(message)?;
        }
        for extend in file.extends() {
            self.extend(extend)?;
        }

        Ok(())
    }

    fn message(&mut self, message: MessageRef<'_>) -> fmt::Result {
        self.line(format_args!("message {} {{", message.name()))?;
        self.indent += 1;

        self.options(message.options())?;
        if !message.reserved_ranges().is_empty() {
            self.line(format_args!("reserved {};", Joined(message.reserved_ranges())))?;
        }
        if !message.reserved_names().is_empty() {
            let names: Vec<String> = message
                .reserved_names()
                .iter()
                .map(|name| format!("\"{}\"", HexEscaped(name.as_bytes())))
                .collect();
            self.line(format_args!("reserved {};", names.join(", ")))?;
        }
        if !message.extension_ranges().is_empty() {
            self.line(format_args!(
                "extensions {};",
                Joined(message.extension_ranges())
            ))?;
        }

        for enum_ in message.enums() {
            self.enum_(enum_)?;
        }
        for nested in message.messages() {
            self.message(nested)?;
        }
        for field in message.fields() {
            self.field(field)?;
        }
        for extend in message.extends() {
            self.extend(extend)?;
        }

        self.indent -= 1;
        self.line(format_args!("}}"))
    }

    fn extend(&mut self, extend: ExtendRef<'_>) -> fmt::Result {
        self.line(format_args!(
            "extend .{} {{",
            extend.extendee().full_name()
        ))?;
        self.indent += 1;
        for field in extend.fields() {
            self.field(field)?;
        }
        self.indent -= 1;
        self.line(format_args!("}}"))
    }

    fn enum_(&mut self, enum_: EnumRef<'_>) -> fmt::Result {
        self.line(format_args!("enum {} {{", enum_.name()))?;
        self.indent += 1;
        self.options(enum_.options())?;
        for value in enum_.values() {
            self.line(format_args!(
                "{} = {}{};",
                value.name(),
                value.number(),
                FieldOptions(value.options())
            ))?;
        }
        self.indent -= 1;
        self.line(format_args!("}}"))
    }

    fn field(&mut self, field: FieldRef<'_>) -> fmt::Result {
        let ty = match field.ty() {
            FieldType::Scalar(scalar) => scalar.name().to_owned(),
            FieldType::Message(message) => format!(".{}", message.full_name()),
            FieldType::Enum(enum_) => format!(".{}", enum_.full_name()),
        };

        match field.cardinality() {
            Cardinality::Map(key) => self.line(format_args!(
                "map<{}, {}> {} = {}{};",
                key,
                ty,
                field.name(),
                field.number(),
                FieldOptions(field.options())
            )),
            Cardinality::Singular | Cardinality::Repeated => {
                let label = match field.label() {
                    Some(label) => format!("{} ", label),
                    None => String::new(),
                };
                self.line(format_args!(
                    "{}{} {} = {}{};",
                    label,
                    ty,
                    field.name(),
                    field.number(),
                    FieldOptions(field.options())
                ))
            }
        }
    }

    fn options(&mut self, options: &[OptionDecl]) -> fmt::Result {
        for option in options {
            self.line(format_args!("option {} = {};", option.name, option.value))?;
        }
        Ok(())
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.write_fmt(args)?;
        self.out.push('\n');
        Ok(())
    }
}

struct Joined<'a, T>(&'a [T]);

impl<'a, T: fmt::Display> fmt::Display for Joined<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, item) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

struct FieldOptions<'a>(&'a [OptionDecl]);

impl<'a> fmt::Display for FieldOptions<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }

        f.write_str(" [")?;
        for (index, option) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", option.name, option.value)?;
        }
        f.write_str("]")
    }
}

#[test]
fn escape_bytes() {
    assert_eq!(
        HexEscaped(b"a\"b\\c\n\x01\xff").to_string(),
        "a\\\"b\\\\c\\n\\001\\377"
    );
}
