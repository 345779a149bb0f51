//! Recursive-descent parsing of schema source files into the declaration tree.

mod lex;
#[cfg(test)]
mod tests;

pub(crate) use self::lex::Scanner;

use logos::Span;
use tracing::{debug, trace, warn};

use self::lex::{Keyword, Punct, Token, TokenKind};
use crate::{
    check::resolve,
    compile::Context,
    error::{ErrorKind, SourceErrorKind, Warning, WarningKind},
    tree::{
        make_name, Cardinality, Constant, EnumData, EnumId, EnumValueData, Extendee, FieldData,
        FieldTy, FileId, Import, ImportKind, MessageData, MessageId, OptionDecl, Scalar, ScopeId,
        Specifier, Syntax, TagRange, TypeRef, MAX_FIELD_NUMBER, RESERVED_FIELD_NUMBERS,
    },
    Error,
};

/// Parses a single file into the pool, loading its imports through the context.
pub(crate) struct Parser<'a, 'c, 'p> {
    ctx: &'c mut Context<'p>,
    scanner: Scanner<'a>,
    file: FileId,
    name: &'a str,
    source: &'a str,
    has_definitions: bool,
}

enum Reserved {
    Ranges(Vec<TagRange>),
    Names(Vec<String>),
}

impl<'a, 'c, 'p> Parser<'a, 'c, 'p> {
    pub fn new(ctx: &'c mut Context<'p>, file: FileId, name: &'a str, source: &'a str) -> Self {
        Parser {
            ctx,
            scanner: Scanner::new(source),
            file,
            name,
            source,
            has_definitions: false,
        }
    }

    pub fn parse_file(&mut self) -> Result<(), Error> {
        while self.peek()?.kind != TokenKind::Eof {
            self.parse_statement()?;
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Keyword(Keyword::Syntax) => self.parse_syntax(),
            TokenKind::Keyword(Keyword::Package) => self.parse_package(),
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            TokenKind::Keyword(Keyword::Option) => {
                let option = self.parse_option("option")?;
                self.ctx.pool[self.file].options.push(option);
                Ok(())
            }
            TokenKind::Keyword(Keyword::Message) => {
                self.parse_message(ScopeId::File(self.file))?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Enum) => {
                self.parse_enum(ScopeId::File(self.file))?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Extend) => {
                self.parse_extend(ScopeId::File(self.file))?;
                Ok(())
            }
            TokenKind::Punct(Punct::Semicolon) => {
                self.bump()?;
                Ok(())
            }
            _ => self.unexpected_token(
                "statement",
                "'syntax', 'package', 'import', 'option', 'message', 'enum', 'extend' or ';'",
            ),
        }
    }

    fn parse_syntax(&mut self) -> Result<(), Error> {
        let start = self.expect_keyword(Keyword::Syntax, "syntax")?;
        self.expect_punct(Punct::Equals, "syntax")?;
        let (value, value_span) = self.parse_string("syntax")?;
        let end = self.expect_punct(Punct::Semicolon, "syntax")?;
        let span = join_span(start, end);

        let syntax = match value.as_str() {
            "proto2" => Syntax::Proto2,
            "proto3" => Syntax::Proto3,
            _ => {
                return Err(self.error(SourceErrorKind::UnknownSyntax {
                    syntax: value,
                    span: value_span,
                }))
            }
        };

        if let Some((_, first)) = &self.ctx.pool[self.file].syntax {
            return Err(self.error(SourceErrorKind::DuplicateSyntax {
                first: first.clone(),
                second: span,
            }));
        }

        self.ctx.pool[self.file].syntax = Some((syntax, span));
        Ok(())
    }

    fn parse_package(&mut self) -> Result<(), Error> {
        let start = self.expect_keyword(Keyword::Package, "package")?;
        let (package, _) = self.parse_full_ident("package")?;
        let end = self.expect_punct(Punct::Semicolon, "package")?;
        let span = join_span(start, end);

        if let Some((_, first)) = &self.ctx.pool[self.file].package {
            return Err(self.error(SourceErrorKind::DuplicatePackage {
                first: first.clone(),
                second: span,
            }));
        }
        if self.has_definitions {
            return Err(self.error(SourceErrorKind::PackageAfterDefinition { span }));
        }

        trace!(file = self.name, %package, "parsed package");
        self.ctx.pool[self.file].package = Some((package, span));
        Ok(())
    }

    fn parse_import(&mut self) -> Result<(), Error> {
        self.expect_keyword(Keyword::Import, "import")?;
        let kind = match self.peek()?.kind {
            TokenKind::Keyword(Keyword::Public) => {
                self.bump()?;
                ImportKind::Public
            }
            TokenKind::Keyword(Keyword::Weak) => {
                self.bump()?;
                ImportKind::Weak
            }
            _ => ImportKind::Plain,
        };
        let (name, span) = self.parse_string("import")?;
        self.expect_punct(Punct::Semicolon, "import")?;

        let file = match self.ctx.load(&name) {
            Ok(file) => file,
            Err(err) if matches!(err.kind(), ErrorKind::FileNotFound { .. }) => {
                return Err(Error::import_not_found(&name, self.name, self.source, span));
            }
            Err(err) => return Err(err),
        };

        debug!(file = self.name, import = %name, "resolved import");
        self.ctx.pool[self.file]
            .imports
            .entry(name)
            .or_insert(Import { file, kind });
        Ok(())
    }

    fn parse_message(&mut self, parent: ScopeId) -> Result<MessageId, Error> {
        self.expect_keyword(Keyword::Message, "message")?;
        let (name, name_span) = self.parse_ident("message")?;

        let full_name = make_name(self.ctx.pool.scope_full_name(parent), name);
        let message = MessageData::new(name, full_name, name_span, self.file, parent);
        let id = self
            .ctx
            .pool
            .add_message(message)
            .map_err(|kind| self.error(kind))?;
        self.has_definitions = true;
        trace!(message = %self.ctx.pool[id].full_name, "parsing message");

        self.expect_punct(Punct::LeftBrace, "message")?;
        self.parse_body(id, "message")?;
        self.bump_if_punct(Punct::Semicolon)?;
        Ok(id)
    }

    fn parse_extend(&mut self, parent: ScopeId) -> Result<MessageId, Error> {
        self.expect_keyword(Keyword::Extend, "extend")?;
        let (extendee, span) = self.parse_type_name("extend")?;

        let target = match resolve::resolve_type_name(&self.ctx.pool, self.file, parent, &extendee)
        {
            Some(ty) => TypeRef::Resolved(ty),
            None => {
                debug!(%extendee, "extended type is not yet declared");
                TypeRef::Unresolved(extendee.clone())
            }
        };

        let mut block = MessageData::new(&extendee, extendee.clone(), span.clone(), self.file, parent);
        block.extendee = Some(Extendee { span, target });
        let id = self
            .ctx
            .pool
            .add_message(block)
            .map_err(|kind| self.error(kind))?;
        self.has_definitions = true;
        trace!(%extendee, "parsing extend block");

        self.expect_punct(Punct::LeftBrace, "extend")?;
        self.parse_body(id, "extend")?;
        self.bump_if_punct(Punct::Semicolon)?;
        Ok(id)
    }

    /// Parses declarations up to and including the closing brace.
    fn parse_body(&mut self, message: MessageId, rule: &'static str) -> Result<(), Error> {
        loop {
            match self.peek()?.kind {
                TokenKind::Punct(Punct::RightBrace) => {
                    self.bump()?;
                    return Ok(());
                }
                TokenKind::Eof => return self.unexpected_token(rule, "a declaration or '}'"),
                _ => self.parse_decl(message)?,
            }
        }
    }

    fn parse_decl(&mut self, message: MessageId) -> Result<(), Error> {
        let token = self.peek()?;
        let in_extend = self.ctx.pool[message].extendee.is_some();

        match token.kind {
            TokenKind::Punct(Punct::Semicolon) => {
                self.bump()?;
                Ok(())
            }
            TokenKind::Keyword(
                Keyword::Message
                | Keyword::Enum
                | Keyword::Extend
                | Keyword::Reserved
                | Keyword::Extensions
                | Keyword::Option,
            ) if in_extend => Err(self.error(SourceErrorKind::InvalidExtendItem { span: token.span })),
            TokenKind::Keyword(Keyword::Message) => {
                self.parse_message(ScopeId::Message(message))?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Enum) => {
                self.parse_enum(ScopeId::Message(message))?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Extend) => {
                self.parse_extend(ScopeId::Message(message))?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Reserved) => {
                match self.parse_reserved()? {
                    Reserved::Ranges(ranges) => {
                        self.ctx.pool[message].reserved_ranges.extend(ranges)
                    }
                    Reserved::Names(names) => self.ctx.pool[message].reserved_names.extend(names),
                }
                Ok(())
            }
            TokenKind::Keyword(Keyword::Extensions) => self.parse_extensions(message),
            TokenKind::Keyword(Keyword::Option) => {
                let option = self.parse_option("option")?;
                self.ctx.pool[message].options.push(option);
                Ok(())
            }
            TokenKind::Specifier(Specifier::Map) if in_extend => {
                Err(self.error(SourceErrorKind::MapExtension { span: token.span }))
            }
            TokenKind::Specifier(Specifier::Map) => self.parse_map_field(message),
            TokenKind::Specifier(_)
            | TokenKind::DataType(_)
            | TokenKind::Ident
            | TokenKind::Punct(Punct::Dot) => self.parse_field(message),
            _ => self.unexpected_token(
                if in_extend { "extend" } else { "message" },
                if in_extend {
                    "a field, ';' or '}'"
                } else {
                    "a field, 'message', 'enum', 'extend', 'reserved', 'extensions', 'option', ';' or '}'"
                },
            ),
        }
    }

    fn parse_field(&mut self, message: MessageId) -> Result<(), Error> {
        let label = match self.peek()?.kind {
            TokenKind::Specifier(specifier) => {
                let token = self.bump()?;
                if specifier == Specifier::Required
                    && self.ctx.pool[self.file].syntax() == Syntax::Proto3
                {
                    return Err(self.error(SourceErrorKind::Proto3RequiredField { span: token.span }));
                }
                Some(specifier)
            }
            _ => None,
        };

        let (raw_type, type_span, scalar) = self.parse_field_type("field")?;
        let (name, name_span) = self.parse_ident("field")?;
        self.expect_punct(Punct::Equals, "field")?;
        let (number, number_span) = self.parse_field_number("field")?;
        let options = self.parse_field_options_opt("field")?;
        self.expect_punct(Punct::Semicolon, "field")?;

        let cardinality = match label {
            Some(Specifier::Repeated) => Cardinality::Repeated,
            _ => Cardinality::Singular,
        };

        self.add_field(FieldData {
            name: name.to_owned(),
            name_span,
            number,
            number_span,
            label,
            cardinality,
            ty: self.field_ty(message, scalar, &raw_type),
            raw_type,
            type_span,
            options,
            message,
        })
    }

    fn parse_map_field(&mut self, message: MessageId) -> Result<(), Error> {
        self.bump()?;
        self.expect_punct(Punct::LeftAngle, "map field")?;
        let key = self.peek()?;
        let key = match key.kind {
            TokenKind::DataType(scalar) if scalar.is_valid_map_key() => {
                self.bump()?;
                scalar
            }
            TokenKind::DataType(_) | TokenKind::Ident | TokenKind::Punct(Punct::Dot) => {
                let (ty, span) = match key.kind {
                    TokenKind::DataType(scalar) => {
                        self.bump()?;
                        (scalar.name().to_owned(), key.span)
                    }
                    _ => self.parse_type_name("map field")?,
                };
                return Err(self.error(SourceErrorKind::InvalidMapKeyType { ty, span }));
            }
            _ => return self.unexpected_token("map field", "a map key type"),
        };
        self.expect_punct(Punct::Comma, "map field")?;
        let (raw_type, type_span, scalar) = self.parse_field_type("map field")?;
        self.expect_punct(Punct::RightAngle, "map field")?;

        let (name, name_span) = self.parse_ident("map field")?;
        self.expect_punct(Punct::Equals, "map field")?;
        let (number, number_span) = self.parse_field_number("map field")?;
        let options = self.parse_field_options_opt("map field")?;
        self.expect_punct(Punct::Semicolon, "map field")?;

        self.add_field(FieldData {
            name: name.to_owned(),
            name_span,
            number,
            number_span,
            label: None,
            cardinality: Cardinality::Map(key),
            ty: self.field_ty(message, scalar, &raw_type),
            raw_type,
            type_span,
            options,
            message,
        })
    }

    /// Parses a scalar type keyword or a type name.
    fn parse_field_type(
        &mut self,
        rule: &'static str,
    ) -> Result<(String, Span, Option<Scalar>), Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::DataType(scalar) => {
                self.bump()?;
                Ok((scalar.name().to_owned(), token.span, Some(scalar)))
            }
            TokenKind::Ident | TokenKind::Punct(Punct::Dot) => {
                let (name, span) = self.parse_type_name(rule)?;
                Ok((name, span, None))
            }
            _ => self.unexpected_token(rule, "a field type"),
        }
    }

    /// Named types get an inline resolution attempt. On failure the field is left for the
    /// deferred sweep.
    fn field_ty(&self, message: MessageId, scalar: Option<Scalar>, raw_type: &str) -> FieldTy {
        if let Some(scalar) = scalar {
            return FieldTy::Scalar(scalar);
        }

        let scope = ScopeId::Message(message);
        match resolve::resolve_type_name(&self.ctx.pool, self.file, scope, raw_type) {
            Some(ty) => FieldTy::Named(TypeRef::Resolved(ty)),
            None => {
                debug!(
                    message = %self.ctx.pool[message].full_name,
                    ty = raw_type,
                    "forward declared field type"
                );
                FieldTy::Named(TypeRef::Unresolved(raw_type.to_owned()))
            }
        }
    }

    fn add_field(&mut self, field: FieldData) -> Result<(), Error> {
        trace!(field = %field.name, number = field.number, "parsed field");
        self.ctx
            .pool
            .add_field(field)
            .map_err(|kind| self.error(kind))?;
        Ok(())
    }

    fn parse_field_number(&mut self, rule: &'static str) -> Result<(u32, Span), Error> {
        let (value, span) = self.parse_int(rule)?;
        match u32::try_from(value) {
            Ok(number)
                if (1..=MAX_FIELD_NUMBER).contains(&number)
                    && !RESERVED_FIELD_NUMBERS.contains(&number) =>
            {
                Ok((number, span))
            }
            _ => Err(self.error(SourceErrorKind::InvalidFieldNumber {
                number: value,
                span,
            })),
        }
    }

    fn parse_enum(&mut self, parent: ScopeId) -> Result<EnumId, Error> {
        self.expect_keyword(Keyword::Enum, "enum")?;
        let (name, name_span) = self.parse_ident("enum")?;

        let full_name = make_name(self.ctx.pool.scope_full_name(parent), name);
        let id = self
            .ctx
            .pool
            .add_enum(EnumData {
                name: name.to_owned(),
                full_name,
                span: name_span.clone(),
                file: self.file,
                parent,
                values: Default::default(),
                options: Vec::new(),
            })
            .map_err(|kind| self.error(kind))?;
        self.has_definitions = true;

        self.expect_punct(Punct::LeftBrace, "enum")?;
        loop {
            match self.peek()?.kind {
                TokenKind::Punct(Punct::RightBrace) => {
                    self.bump()?;
                    break;
                }
                TokenKind::Punct(Punct::Semicolon) => {
                    self.bump()?;
                }
                TokenKind::Keyword(Keyword::Option) => {
                    let option = self.parse_option("enum")?;
                    self.ctx.pool[id].options.push(option);
                }
                // Reserved words reach `parse_ident`, which reports them by class.
                TokenKind::Ident
                | TokenKind::Keyword(_)
                | TokenKind::Specifier(_)
                | TokenKind::DataType(_)
                | TokenKind::Bool(_) => self.parse_enum_value(id)?,
                _ => {
                    return self.unexpected_token("enum", "an enum value, 'option', ';' or '}'")
                }
            }
        }
        self.bump_if_punct(Punct::Semicolon)?;

        let data = &self.ctx.pool[id];
        let default = match data.values.first() {
            Some((_, value)) => value.name.clone(),
            None => {
                return Err(self.error(SourceErrorKind::EmptyEnum {
                    name: data.full_name.clone(),
                    span: name_span,
                }))
            }
        };
        if !data.values.contains_key(&0) {
            warn!(
                file = self.name,
                name = %data.full_name,
                %default,
                "enum has no zero value, falling back to its first declared value"
            );
            let warning = Warning::new(
                WarningKind::EnumMissingZero {
                    name: data.full_name.clone(),
                    default,
                    span: name_span,
                },
                self.name,
                self.source,
            );
            self.ctx.warnings.push(warning);
        }

        Ok(id)
    }

    fn parse_enum_value(&mut self, enum_: EnumId) -> Result<(), Error> {
        let (name, name_span) = self.parse_ident("enum value")?;
        self.expect_punct(Punct::Equals, "enum value")?;

        let negative = self.bump_if_punct(Punct::Minus)?;
        let (magnitude, number_span) = self.parse_int("enum value")?;
        let number = if negative {
            i64::try_from(magnitude).ok().map(|value| -value)
        } else {
            i64::try_from(magnitude).ok()
        }
        .and_then(|value| i32::try_from(value).ok());
        let number = match number {
            Some(number) => number,
            None => {
                return Err(self.error(SourceErrorKind::InvalidEnumNumber { span: number_span }))
            }
        };

        let options = self.parse_field_options_opt("enum value")?;
        self.expect_punct(Punct::Semicolon, "enum value")?;

        let value = EnumValueData {
            name: name.to_owned(),
            span: name_span,
            options,
        };
        self.ctx
            .pool
            .add_enum_value(enum_, number, number_span, value)
            .map_err(|kind| self.error(kind))
    }

    fn parse_reserved(&mut self) -> Result<Reserved, Error> {
        self.expect_keyword(Keyword::Reserved, "reserved")?;
        match self.peek()?.kind {
            TokenKind::Int(_) => {
                let ranges = self.parse_ranges("reserved")?;
                self.expect_punct(Punct::Semicolon, "reserved")?;
                Ok(Reserved::Ranges(ranges))
            }
            TokenKind::String(_) => {
                let mut names = vec![self.parse_string("reserved")?.0];
                while self.bump_if_punct(Punct::Comma)? {
                    names.push(self.parse_string("reserved")?.0);
                }
                self.expect_punct(Punct::Semicolon, "reserved")?;
                Ok(Reserved::Names(names))
            }
            _ => self.unexpected_token("reserved", "a positive integer or string"),
        }
    }

    fn parse_extensions(&mut self, message: MessageId) -> Result<(), Error> {
        self.expect_keyword(Keyword::Extensions, "extensions")?;
        let ranges = self.parse_ranges("extensions")?;
        // Range options are accepted and dropped.
        self.parse_field_options_opt("extensions")?;
        self.expect_punct(Punct::Semicolon, "extensions")?;

        self.ctx.pool[message].extension_ranges.extend(ranges);
        Ok(())
    }

    fn parse_ranges(&mut self, rule: &'static str) -> Result<Vec<TagRange>, Error> {
        let mut ranges = vec![self.parse_range(rule)?];
        while self.bump_if_punct(Punct::Comma)? {
            ranges.push(self.parse_range(rule)?);
        }
        Ok(ranges)
    }

    fn parse_range(&mut self, rule: &'static str) -> Result<TagRange, Error> {
        let (start, start_span) = self.parse_field_number(rule)?;

        let end = if self.peek()?.kind == TokenKind::Keyword(Keyword::To) {
            self.bump()?;
            if self.peek()?.kind == TokenKind::Keyword(Keyword::Max) {
                let token = self.bump()?;
                (MAX_FIELD_NUMBER, token.span)
            } else {
                let (value, span) = self.parse_int(rule)?;
                match u32::try_from(value) {
                    Ok(end) if end <= MAX_FIELD_NUMBER => (end, span),
                    _ => {
                        return Err(self.error(SourceErrorKind::InvalidFieldNumber {
                            number: value,
                            span,
                        }))
                    }
                }
            }
        } else {
            (start, start_span.clone())
        };

        if end.0 < start {
            return Err(self.error(SourceErrorKind::InvalidRange {
                span: join_span(start_span, end.1),
            }));
        }

        Ok(TagRange { start, end: end.0 })
    }

    fn parse_option(&mut self, rule: &'static str) -> Result<OptionDecl, Error> {
        self.expect_keyword(Keyword::Option, rule)?;
        let option = self.parse_option_body(rule)?;
        self.expect_punct(Punct::Semicolon, rule)?;
        Ok(option)
    }

    fn parse_field_options_opt(&mut self, rule: &'static str) -> Result<Vec<OptionDecl>, Error> {
        let mut options = Vec::new();
        if self.bump_if_punct(Punct::LeftBracket)? {
            loop {
                options.push(self.parse_option_body(rule)?);
                if !self.bump_if_punct(Punct::Comma)? {
                    break;
                }
            }
            self.expect_punct(Punct::RightBracket, rule)?;
        }
        Ok(options)
    }

    fn parse_option_body(&mut self, rule: &'static str) -> Result<OptionDecl, Error> {
        let mut name = if self.bump_if_punct(Punct::LeftParen)? {
            let (extension, _) = self.parse_type_name(rule)?;
            self.expect_punct(Punct::RightParen, rule)?;
            format!("({})", extension)
        } else {
            self.parse_option_name_part(rule)?
        };
        while self.bump_if_punct(Punct::Dot)? {
            name.push('.');
            name.push_str(&self.parse_option_name_part(rule)?);
        }

        self.expect_punct(Punct::Equals, rule)?;
        let value = self.parse_constant(rule)?;
        Ok(OptionDecl { name, value })
    }

    /// Option names are not declarations, so reserved words are allowed here.
    fn parse_option_name_part(&mut self, rule: &'static str) -> Result<String, Error> {
        let token = self.peek()?;
        if token.kind == TokenKind::Ident || token.kind.reserved_class().is_some() {
            self.bump()?;
            Ok(token.text.to_owned())
        } else {
            self.unexpected_token(rule, "an option name")
        }
    }

    fn parse_constant(&mut self, rule: &'static str) -> Result<Constant, Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Punct(sign @ (Punct::Minus | Punct::Plus)) => {
                self.bump()?;
                let negative = sign == Punct::Minus;
                let token = self.peek()?;
                match token.kind {
                    TokenKind::Int(value) => {
                        self.bump()?;
                        Ok(Constant::Int { negative, value })
                    }
                    TokenKind::Float(value) => {
                        self.bump()?;
                        Ok(Constant::Float(if negative { -value } else { value }))
                    }
                    TokenKind::Ident if matches!(token.text, "inf" | "nan") => {
                        self.bump()?;
                        let value = if token.text == "inf" {
                            f64::INFINITY
                        } else {
                            f64::NAN
                        };
                        Ok(Constant::Float(if negative { -value } else { value }))
                    }
                    _ => self.unexpected_token(rule, "a number, 'inf' or 'nan'"),
                }
            }
            TokenKind::Int(value) => {
                self.bump()?;
                Ok(Constant::Int {
                    negative: false,
                    value,
                })
            }
            TokenKind::Float(value) => {
                self.bump()?;
                Ok(Constant::Float(value))
            }
            TokenKind::String(value) => {
                self.bump()?;
                Ok(Constant::String(value))
            }
            TokenKind::Bool(value) => {
                self.bump()?;
                Ok(Constant::Bool(value))
            }
            TokenKind::Ident => {
                let (ident, _) = self.parse_full_ident(rule)?;
                Ok(Constant::Ident(ident))
            }
            _ => self.unexpected_token(rule, "a constant"),
        }
    }

    /// A possibly absolute, dotted type name.
    fn parse_type_name(&mut self, rule: &'static str) -> Result<(String, Span), Error> {
        let mut name = String::new();
        let start = self.peek()?.span;
        if self.bump_if_punct(Punct::Dot)? {
            name.push('.');
        }
        let (ident, mut end) = self.parse_full_ident(rule)?;
        name.push_str(&ident);
        if name.starts_with('.') {
            end = join_span(start, end);
        }
        Ok((name, end))
    }

    fn parse_full_ident(&mut self, rule: &'static str) -> Result<(String, Span), Error> {
        let (first, start) = self.parse_ident(rule)?;
        let mut name = first.to_owned();
        let mut end = start.clone();
        while self.peek()?.kind == TokenKind::Punct(Punct::Dot) {
            self.bump()?;
            let (part, span) = self.parse_ident(rule)?;
            name.push('.');
            name.push_str(part);
            end = span;
        }
        Ok((name, join_span(start, end)))
    }

    fn parse_ident(&mut self, rule: &'static str) -> Result<(&'a str, Span), Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Ident => {
                self.bump()?;
                Ok((token.text, token.span))
            }
            ref kind => match kind.reserved_class() {
                Some(class) => Err(self.error_at(
                    &token,
                    SourceErrorKind::ReservedWord {
                        word: token.text.to_owned(),
                        class,
                        span: token.span.clone(),
                    },
                )),
                None => self.unexpected_token(rule, "an identifier"),
            },
        }
    }

    fn parse_int(&mut self, rule: &'static str) -> Result<(u64, Span), Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Int(value) => {
                self.bump()?;
                Ok((value, token.span))
            }
            _ => self.unexpected_token(rule, "an integer"),
        }
    }

    fn parse_string(&mut self, rule: &'static str) -> Result<(String, Span), Error> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::String(value) => {
                self.bump()?;
                Ok((value, token.span))
            }
            _ => self.unexpected_token(rule, "a string"),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, rule: &'static str) -> Result<Span, Error> {
        if self.peek()?.kind == TokenKind::Keyword(keyword) {
            Ok(self.bump()?.span)
        } else {
            self.unexpected_token(rule, format!("'{}'", keyword_text(keyword)))
        }
    }

    fn expect_punct(&mut self, punct: Punct, rule: &'static str) -> Result<Span, Error> {
        if self.peek()?.kind == TokenKind::Punct(punct) {
            Ok(self.bump()?.span)
        } else {
            self.unexpected_token(rule, format!("'{}'", punct))
        }
    }

    fn bump_if_punct(&mut self, punct: Punct) -> Result<bool, Error> {
        if self.peek()?.kind == TokenKind::Punct(punct) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn peek(&mut self) -> Result<Token<'a>, Error> {
        let token = self.scanner.peek(0).cloned();
        token.map_err(|kind| self.error(kind))
    }

    fn bump(&mut self) -> Result<Token<'a>, Error> {
        self.scanner.pop().map_err(|kind| self.error(kind))
    }

    fn unexpected_token<T>(&mut self, rule: &'static str, expected: impl ToString) -> Result<T, Error> {
        let token = self.peek()?;
        let kind = match token.kind {
            TokenKind::Eof => SourceErrorKind::UnexpectedEof {
                rule,
                expected: expected.to_string(),
                span: token.span.clone(),
            },
            _ => SourceErrorKind::UnexpectedToken {
                rule,
                expected: expected.to_string(),
                found: token.text.to_owned(),
                span: token.span.clone(),
            },
        };
        Err(self.error_at(&token, kind))
    }

    fn error(&self, kind: SourceErrorKind) -> Error {
        Error::from_source(kind, self.name, self.source)
    }

    /// An error located at `token`, reusing the position the scanner already computed.
    fn error_at(&self, token: &Token<'a>, kind: SourceErrorKind) -> Error {
        Error::from_source_at(kind, self.name, self.source, token.line, token.column)
    }
}

fn keyword_text(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Syntax => "syntax",
        Keyword::Package => "package",
        Keyword::Import => "import",
        Keyword::Public => "public",
        Keyword::Weak => "weak",
        Keyword::Option => "option",
        Keyword::Message => "message",
        Keyword::Enum => "enum",
        Keyword::Extend => "extend",
        Keyword::Reserved => "reserved",
        Keyword::Extensions => "extensions",
        Keyword::To => "to",
        Keyword::Max => "max",
    }
}

fn join_span(start: Span, end: Span) -> Span {
    start.start..end.end
}
