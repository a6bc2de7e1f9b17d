//! Textual IR parser
//!
//! Reads the generic form produced by [`crate::printer`] back into a
//! [`Context`]. Record aliases at the top of the file are resolved in two
//! passes: every alias is declared first so that record bodies may refer to
//! any record, including themselves, and the bodies are completed second.
//!
//! Value and block names are scoped to the closest isolated operation
//! (module, function, global). A value used before its definition is given a
//! placeholder carrying the type written at the use, which is swapped for
//! the real value once the definition is seen.

pub mod lexer;

use crate::attrs::{Attr, AttrKind};
use crate::context::{Block, Context, InsertPoint, Op, OperationState, Value};
use crate::dialect::OpKind;
use crate::module::Module;
use crate::types::{RecordKind, Type};
use cir_common::{CirError, SourceLocation};
use lexer::{Lexer, Token, TokenType};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Parse a whole `.cir` file containing one `builtin.module`
pub fn parse_module(ctx: &mut Context, source: &str, filename: &str) -> Result<Module, CirError> {
    let tokens = Lexer::new(source, filename).tokenize()?;
    debug!("parsing {} ({} tokens)", filename, tokens.len());
    Parser::new(ctx, tokens).parse_top_level()
}

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
    forward_values: HashMap<String, (Value, SourceLocation)>,
    blocks: HashMap<String, Block>,
    forward_blocks: HashMap<String, SourceLocation>,
}

struct Parser<'a> {
    ctx: &'a mut Context,
    tokens: Vec<Token>,
    position: usize,
    aliases: HashMap<String, Type>,
    scope: Scope,
    saved_scopes: Vec<Scope>,
}

fn error(message: impl Into<String>, location: SourceLocation) -> CirError {
    CirError::parse_error(message, location)
}

/// First entry in source order
fn earliest(entries: impl Iterator<Item = (String, SourceLocation)>) -> Option<(String, SourceLocation)> {
    entries.min_by_key(|(_, l)| (l.line, l.column))
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a mut Context, tokens: Vec<Token>) -> Self {
        Self {
            ctx,
            tokens,
            position: 0,
            aliases: HashMap::new(),
            scope: Scope::default(),
            saved_scopes: Vec::new(),
        }
    }

    // ---------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------

    fn token_at(&self, index: usize) -> &TokenType {
        // The lexer always ends the stream with EndOfFile
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[index.min(last)].token_type
    }

    fn peek(&self) -> &TokenType {
        self.token_at(self.position)
    }

    fn location(&self) -> SourceLocation {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[self.position.min(last)].location.clone()
    }

    fn advance(&mut self) -> TokenType {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, expected: &TokenType) -> bool {
        self.peek() == expected
    }

    fn eat(&mut self, expected: &TokenType) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, what: &str) -> CirError {
        error(format!("expected {}, found '{}'", what, self.peek()), self.location())
    }

    fn consume(&mut self, expected: TokenType) -> Result<(), CirError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", expected)))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CirError> {
        match self.peek() {
            TokenType::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), CirError> {
        match self.peek() {
            TokenType::Ident(name) if name == keyword => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected(&format!("'{}'", keyword))),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), TokenType::Ident(name) if name == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_int(&mut self) -> Result<i128, CirError> {
        match self.peek() {
            &TokenType::IntLiteral(value) => {
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected("integer literal")),
        }
    }

    fn expect_u32(&mut self, what: &str) -> Result<u32, CirError> {
        let location = self.location();
        let value = self.expect_int()?;
        u32::try_from(value).map_err(|_| error(format!("{} {} is out of range", what, value), location))
    }

    fn expect_string(&mut self) -> Result<String, CirError> {
        match self.peek() {
            TokenType::StringLiteral(value) => {
                let value = value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn expect_value_id(&mut self) -> Result<(String, SourceLocation), CirError> {
        let location = self.location();
        match self.peek() {
            TokenType::ValueId(name) => {
                let name = name.clone();
                self.advance();
                Ok((name, location))
            }
            _ => Err(self.unexpected("value name")),
        }
    }

    fn expect_block_id(&mut self) -> Result<(String, SourceLocation), CirError> {
        let location = self.location();
        match self.peek() {
            TokenType::BlockId(name) => {
                let name = name.clone();
                self.advance();
                Ok((name, location))
            }
            _ => Err(self.unexpected("block name")),
        }
    }

    /// Parse `item (',' item)* close`, or just `close`
    fn comma_list<T>(
        &mut self,
        close: TokenType,
        mut item: impl FnMut(&mut Self) -> Result<T, CirError>,
    ) -> Result<Vec<T>, CirError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if !self.eat(&TokenType::Comma) {
                break;
            }
        }
        self.consume(close)?;
        Ok(items)
    }

    // ---------------------------------------------------------------
    // Scopes
    // ---------------------------------------------------------------

    fn push_scope(&mut self) {
        let outer = std::mem::take(&mut self.scope);
        self.saved_scopes.push(outer);
    }

    fn pop_scope(&mut self) -> Result<(), CirError> {
        let outer = self.saved_scopes.pop().unwrap_or_default();
        let finished = std::mem::replace(&mut self.scope, outer);
        let values = finished.forward_values.into_iter().map(|(name, (_, l))| (name, l));
        if let Some((name, location)) = earliest(values) {
            return Err(error(format!("use of undefined value '%{}'", name), location));
        }
        if let Some((name, location)) = earliest(finished.forward_blocks.into_iter()) {
            return Err(error(format!("reference to undefined block '^{}'", name), location));
        }
        Ok(())
    }

    fn resolve_value(&mut self, name: String, ty: Type, location: SourceLocation) -> Result<Value, CirError> {
        let existing = self
            .scope
            .values
            .get(&name)
            .or_else(|| self.scope.forward_values.get(&name).map(|(v, _)| v))
            .copied();
        if let Some(value) = existing {
            let actual = self.ctx.value_type(value);
            if actual != ty {
                return Err(error(
                    format!(
                        "use of value '%{}' expects type {}, but it has type {}",
                        name,
                        self.ctx.types.display(ty),
                        self.ctx.types.display(actual)
                    ),
                    location,
                ));
            }
            return Ok(value);
        }
        let placeholder = self.ctx.create_placeholder(ty);
        self.scope.forward_values.insert(name, (placeholder, location));
        Ok(placeholder)
    }

    fn define_value(&mut self, name: String, value: Value, location: SourceLocation) -> Result<(), CirError> {
        if self.scope.values.contains_key(&name) {
            return Err(error(format!("redefinition of value '%{}'", name), location));
        }
        if let Some((placeholder, _)) = self.scope.forward_values.remove(&name) {
            let expected = self.ctx.value_type(placeholder);
            let actual = self.ctx.value_type(value);
            if expected != actual {
                return Err(error(
                    format!(
                        "value '%{}' is defined with type {}, but was used with type {}",
                        name,
                        self.ctx.types.display(actual),
                        self.ctx.types.display(expected)
                    ),
                    location,
                ));
            }
            self.ctx.replace_all_uses_with(placeholder, value);
        }
        self.scope.values.insert(name, value);
        Ok(())
    }

    fn block_ref(&mut self, name: String, location: SourceLocation) -> Block {
        if let Some(&block) = self.scope.blocks.get(&name) {
            return block;
        }
        let block = self.ctx.create_block(&[]);
        self.scope.blocks.insert(name.clone(), block);
        self.scope.forward_blocks.insert(name, location);
        block
    }

    fn define_block(&mut self, name: String, location: SourceLocation) -> Result<Block, CirError> {
        if self.scope.forward_blocks.remove(&name).is_some() {
            if let Some(&block) = self.scope.blocks.get(&name) {
                return Ok(block);
            }
        }
        if self.scope.blocks.contains_key(&name) {
            return Err(error(format!("redefinition of block '^{}'", name), location));
        }
        let block = self.ctx.create_block(&[]);
        self.scope.blocks.insert(name, block);
        Ok(block)
    }

    // ---------------------------------------------------------------
    // Record aliases
    // ---------------------------------------------------------------

    fn is_alias_definition(&self) -> bool {
        matches!(self.peek(), TokenType::TypeId(_)) && self.token_at(self.position + 1) == &TokenType::Equal
    }

    /// First pass: declare every record named by the alias header
    fn declare_aliases(&mut self) -> Result<(), CirError> {
        let mut index = 0;
        while let TokenType::TypeId(alias) = self.token_at(index).clone() {
            if self.token_at(index + 1) != &TokenType::Equal {
                break;
            }
            let location = self.tokens[index].location.clone();
            let header = (
                self.token_at(index + 2).clone(),
                self.token_at(index + 3).clone(),
                self.token_at(index + 4).clone(),
                self.token_at(index + 5).clone(),
            );
            let (TokenType::TypeId(head), TokenType::Less, TokenType::Ident(kind), TokenType::StringLiteral(name)) = header
            else {
                return Err(error(format!("type alias '!{}' must name a record", alias), location));
            };
            if head != "cir.record" {
                return Err(error(format!("type alias '!{}' must name a record", alias), location));
            }
            let kind = RecordKind::from_str(&kind)
                .map_err(|_| error(format!("unknown record kind '{}'", kind), location.clone()))?;
            let ty = self.ctx.types.declare_record(kind, &name);
            if self.aliases.insert(alias.clone(), ty).is_some() {
                return Err(error(format!("redefinition of type alias '!{}'", alias), location));
            }

            // Skip to the '>' closing the record
            index += 4;
            let mut depth = 1usize;
            while depth > 0 {
                match self.token_at(index) {
                    TokenType::Less => depth += 1,
                    TokenType::Greater => depth -= 1,
                    TokenType::EndOfFile => {
                        return Err(error(format!("unterminated type alias '!{}'", alias), location))
                    }
                    _ => {}
                }
                index += 1;
            }
        }
        Ok(())
    }

    /// Second pass: complete the record behind one alias
    fn parse_alias_definition(&mut self) -> Result<(), CirError> {
        let location = self.location();
        let TokenType::TypeId(alias) = self.advance() else {
            return Err(self.unexpected("type alias"));
        };
        self.consume(TokenType::Equal)?;
        self.advance(); // !cir.record
        self.consume(TokenType::Less)?;
        self.expect_ident("record kind")?;
        let name = self.expect_string()?;
        let ty = self
            .aliases
            .get(&alias)
            .copied()
            .ok_or_else(|| error(format!("undefined type '!{}'", alias), location.clone()))?;

        if self.eat_keyword("incomplete") {
            return self.consume(TokenType::Greater);
        }
        let packed = self.eat_keyword("packed");
        self.consume(TokenType::LeftBrace)?;
        let fields = self.comma_list(TokenType::RightBrace, Self::parse_type)?;
        self.consume(TokenType::Greater)?;

        if self.ctx.types.is_complete(ty) {
            return Err(error(format!("record '{}' is defined twice", name), location));
        }
        self.ctx.types.complete_record(ty, fields, packed);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------

    fn parse_type(&mut self) -> Result<Type, CirError> {
        let location = self.location();
        let TokenType::TypeId(name) = self.peek().clone() else {
            return Err(self.unexpected("type"));
        };
        self.advance();
        match name.as_str() {
            "cir.void" => Ok(self.ctx.types.void()),
            "cir.bool" => Ok(self.ctx.types.bool()),
            "cir.float" => Ok(self.ctx.types.float()),
            "cir.double" => Ok(self.ctx.types.double()),
            "cir.ptr" => {
                self.consume(TokenType::Less)?;
                let pointee = self.parse_type()?;
                self.consume(TokenType::Greater)?;
                Ok(self.ctx.types.ptr(pointee))
            }
            "cir.array" => {
                self.consume(TokenType::Less)?;
                let elem = self.parse_type()?;
                self.expect_keyword("x")?;
                let len_location = self.location();
                let len = self.expect_int()?;
                let len = u64::try_from(len)
                    .map_err(|_| error(format!("invalid array length {}", len), len_location))?;
                self.consume(TokenType::Greater)?;
                Ok(self.ctx.types.array(elem, len))
            }
            "cir.func" => self.parse_func_type(),
            "cir.record" => {
                self.consume(TokenType::Less)?;
                let kind_location = self.location();
                let kind = self.expect_ident("record kind")?;
                let kind = RecordKind::from_str(&kind)
                    .map_err(|_| error(format!("unknown record kind '{}'", kind), kind_location))?;
                if matches!(self.peek(), TokenType::StringLiteral(_)) {
                    return Err(error("named records must be declared as type aliases", location));
                }
                let packed = self.eat_keyword("packed");
                self.consume(TokenType::LeftBrace)?;
                let fields = self.comma_list(TokenType::RightBrace, Self::parse_type)?;
                self.consume(TokenType::Greater)?;
                Ok(self.ctx.types.anon_record(kind, fields, packed))
            }
            _ => {
                if let Some((width, signed)) = int_type_name(&name) {
                    return Ok(self.ctx.types.int(width, signed));
                }
                self.aliases
                    .get(&name)
                    .copied()
                    .ok_or_else(|| error(format!("undefined type '!{}'", name), location))
            }
        }
    }

    fn parse_func_type(&mut self) -> Result<Type, CirError> {
        self.consume(TokenType::Less)?;
        self.consume(TokenType::LeftParen)?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.eat(&TokenType::RightParen) {
            loop {
                if self.eat(&TokenType::Ellipsis) {
                    variadic = true;
                    self.consume(TokenType::RightParen)?;
                    break;
                }
                params.push(self.parse_type()?);
                if self.eat(&TokenType::Comma) {
                    continue;
                }
                self.consume(TokenType::RightParen)?;
                break;
            }
        }
        self.consume(TokenType::Arrow)?;
        let ret = self.parse_type()?;
        self.consume(TokenType::Greater)?;
        Ok(self.ctx.types.func(params, ret, variadic))
    }

    // ---------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------

    fn parse_typed_suffix(&mut self) -> Result<Type, CirError> {
        self.consume(TokenType::Colon)?;
        self.parse_type()
    }

    fn parse_float_literal(&mut self) -> Result<f64, CirError> {
        let negative = self.eat(&TokenType::Minus);
        let value = match self.peek().clone() {
            TokenType::FloatLiteral(value) => value,
            TokenType::IntLiteral(value) => value as f64,
            TokenType::Ident(name) if name == "inf" => f64::INFINITY,
            TokenType::Ident(name) if name == "NaN" => f64::NAN,
            _ => return Err(self.unexpected("floating-point literal")),
        };
        self.advance();
        Ok(if negative { -value } else { value })
    }

    fn parse_attr(&mut self) -> Result<Attr, CirError> {
        let location = self.location();
        match self.peek().clone() {
            TokenType::SymbolRef(name) => {
                self.advance();
                Ok(self.ctx.attrs.symbol(&name))
            }
            TokenType::StringLiteral(value) => {
                self.advance();
                Ok(self.ctx.attrs.string(&value))
            }
            TokenType::TypeId(_) => {
                let ty = self.parse_type()?;
                Ok(self.ctx.attrs.type_attr(ty))
            }
            TokenType::LeftBracket => {
                self.advance();
                let elems = self.comma_list(TokenType::RightBracket, Self::parse_attr)?;
                Ok(self.ctx.attrs.array(elems))
            }
            TokenType::AttrId(name) => {
                self.advance();
                self.parse_hash_attr(&name, location)
            }
            _ => Err(self.unexpected("attribute")),
        }
    }

    fn parse_hash_attr(&mut self, name: &str, location: SourceLocation) -> Result<Attr, CirError> {
        match name {
            "true" => Ok(self.ctx.attrs.bool(true)),
            "false" => Ok(self.ctx.attrs.bool(false)),
            "cir.int" => {
                self.consume(TokenType::Less)?;
                let value = self.expect_int()?;
                self.consume(TokenType::Greater)?;
                let ty = self.parse_typed_suffix()?;
                if !self.ctx.types.is_int(ty) {
                    return Err(error("'#cir.int' requires an integer type", location));
                }
                let ctx = &mut *self.ctx;
                Ok(ctx.attrs.int(&ctx.types, value, ty))
            }
            "cir.fp" => {
                self.consume(TokenType::Less)?;
                let value = self.parse_float_literal()?;
                self.consume(TokenType::Greater)?;
                let ty = self.parse_typed_suffix()?;
                if !self.ctx.types.is_float(ty) {
                    return Err(error("'#cir.fp' requires a floating-point type", location));
                }
                Ok(self.ctx.attrs.float(value, ty))
            }
            "cir.zero" => {
                let ty = self.parse_typed_suffix()?;
                Ok(self.ctx.attrs.zero(ty))
            }
            "cir.const_array" => {
                self.consume(TokenType::Less)?;
                self.consume(TokenType::LeftBracket)?;
                let elems = self.comma_list(TokenType::RightBracket, Self::parse_attr)?;
                self.consume(TokenType::Greater)?;
                let ty = self.parse_typed_suffix()?;
                Ok(self.ctx.attrs.intern(AttrKind::ConstArray { elems, ty }))
            }
            "cir.const_record" => {
                self.consume(TokenType::Less)?;
                self.consume(TokenType::LeftBrace)?;
                let fields = self.comma_list(TokenType::RightBrace, Self::parse_attr)?;
                self.consume(TokenType::Greater)?;
                let ty = self.parse_typed_suffix()?;
                Ok(self.ctx.attrs.intern(AttrKind::ConstRecord { fields, ty }))
            }
            "cir.global_ctor" => {
                self.consume(TokenType::Less)?;
                let name = self.expect_string()?;
                self.consume(TokenType::Comma)?;
                let priority = self.expect_u32("priority")?;
                self.consume(TokenType::Greater)?;
                Ok(self.ctx.attrs.global_ctor(&name, priority))
            }
            other => Err(error(format!("unknown attribute '#{}'", other), location)),
        }
    }

    // ---------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------

    fn parse_location(&mut self) -> Result<SourceLocation, CirError> {
        self.consume(TokenType::LeftParen)?;
        let filename = self.expect_string()?;
        self.consume(TokenType::Colon)?;
        let line = self.expect_u32("line")?;
        self.consume(TokenType::Colon)?;
        let column = self.expect_u32("column")?;
        self.consume(TokenType::RightParen)?;
        Ok(SourceLocation::new(&filename, line, column))
    }

    fn parse_operand(&mut self) -> Result<Value, CirError> {
        let (name, location) = self.expect_value_id()?;
        self.consume(TokenType::Colon)?;
        let ty = self.parse_type()?;
        self.resolve_value(name, ty, location)
    }

    fn parse_operation(&mut self) -> Result<Op, CirError> {
        let start = self.location();

        let mut result_names = Vec::new();
        if matches!(self.peek(), TokenType::ValueId(_)) {
            loop {
                result_names.push(self.expect_value_id()?);
                if !self.eat(&TokenType::Comma) {
                    break;
                }
            }
            self.consume(TokenType::Equal)?;
        }

        let name_location = self.location();
        let name = self.expect_ident("operation name")?;
        let kind = OpKind::from_name(&name)
            .ok_or_else(|| error(format!("unknown operation '{}'", name), name_location.clone()))?;

        self.consume(TokenType::LeftParen)?;
        let operands = self.comma_list(TokenType::RightParen, Self::parse_operand)?;

        let mut successors = Vec::new();
        if self.eat(&TokenType::LeftBracket) {
            successors = self.comma_list(TokenType::RightBracket, |p| {
                let (name, location) = p.expect_block_id()?;
                Ok(p.block_ref(name, location))
            })?;
        }

        let mut result_types = Vec::new();
        if self.eat(&TokenType::Colon) {
            if self.eat(&TokenType::LeftParen) {
                result_types = self.comma_list(TokenType::RightParen, Self::parse_type)?;
            } else {
                result_types.push(self.parse_type()?);
            }
        }

        let mut attrs = BTreeMap::new();
        if self.eat(&TokenType::LeftBrace) {
            let entries = self.comma_list(TokenType::RightBrace, |p| {
                let location = p.location();
                let key = p.expect_ident("attribute name")?;
                p.consume(TokenType::Equal)?;
                Ok((key, p.parse_attr()?, location))
            })?;
            for (key, attr, location) in entries {
                if attrs.insert(key.clone(), attr).is_some() {
                    return Err(error(format!("duplicate attribute '{}'", key), location));
                }
            }
        }

        let mut regions = Vec::new();
        if self.eat(&TokenType::LeftParen) {
            let isolated = kind.info().isolated;
            if isolated {
                self.push_scope();
            }
            regions = self.comma_list(TokenType::RightParen, Self::parse_region)?;
            if isolated {
                self.pop_scope()?;
            }
        }
        let expected_regions = kind.info().num_regions;
        if regions.len() != expected_regions {
            return Err(error(
                format!("'{}' expects {} region(s), but found {}", name, expected_regions, regions.len()),
                name_location,
            ));
        }

        let location = if self.eat_keyword("loc") {
            self.parse_location()?
        } else {
            SourceLocation::unknown()
        };

        if result_names.len() != result_types.len() {
            return Err(error(
                format!(
                    "operation defines {} result(s) but declares {} type(s)",
                    result_names.len(),
                    result_types.len()
                ),
                start,
            ));
        }

        let mut state = OperationState::new(kind, location)
            .operands(operands)
            .results(result_types);
        state.attrs = attrs;
        state.successors = successors;
        let op = self.ctx.create_op(state);

        for (index, blocks) in regions.into_iter().enumerate() {
            let region = self.ctx.region(op, index);
            for block in blocks {
                self.ctx.append_block(region, block);
            }
        }
        let results = self.ctx.results(op).to_vec();
        for ((name, location), value) in result_names.into_iter().zip(results) {
            self.define_value(name, value, location)?;
        }
        Ok(op)
    }

    fn parse_region(&mut self) -> Result<Vec<Block>, CirError> {
        self.consume(TokenType::LeftBrace)?;
        let mut blocks = Vec::new();
        while !self.eat(&TokenType::RightBrace) {
            blocks.push(self.parse_block()?);
        }
        Ok(blocks)
    }

    fn parse_block(&mut self) -> Result<Block, CirError> {
        let (name, location) = self.expect_block_id()?;
        let block = self.define_block(name, location)?;
        if self.eat(&TokenType::LeftParen) {
            let args = self.comma_list(TokenType::RightParen, |p| {
                let (name, location) = p.expect_value_id()?;
                p.consume(TokenType::Colon)?;
                Ok((name, p.parse_type()?, location))
            })?;
            for (name, ty, location) in args {
                let arg = self.ctx.add_block_arg(block, ty);
                self.define_value(name, arg, location)?;
            }
        }
        self.consume(TokenType::Colon)?;
        loop {
            match self.peek() {
                TokenType::BlockId(_) | TokenType::RightBrace => break,
                TokenType::EndOfFile => return Err(self.unexpected("'}'")),
                _ => {
                    let op = self.parse_operation()?;
                    self.ctx.insert_op(op, InsertPoint::BlockEnd(block));
                }
            }
        }
        Ok(block)
    }

    fn parse_top_level(mut self) -> Result<Module, CirError> {
        self.declare_aliases()?;
        while self.is_alias_definition() {
            self.parse_alias_definition()?;
        }
        let location = self.location();
        let op = self.parse_operation()?;
        self.pop_scope()?;
        self.consume(TokenType::EndOfFile)?;
        Module::from_op(self.ctx, op)
            .ok_or_else(|| error("expected 'builtin.module' at the top level", location))
    }
}

/// Width and signedness of `s32i` / `u8i` style names
fn int_type_name(name: &str) -> Option<(u32, bool)> {
    let signed = match name.as_bytes().first()? {
        b's' => true,
        b'u' => false,
        _ => return None,
    };
    let digits = name.get(1..)?.strip_suffix('i')?;
    let width: u32 = digits.parse().ok()?;
    (width > 0).then_some((width, signed))
}
