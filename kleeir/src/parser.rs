//! Parser for textual LLVM IR using chumsky.
//!
//! Two stages:
//! 1) Tokenisation from input string to a [`Token`] stream (see [`crate::lexer`]).
//! 2) Parsing the token stream into a [`Module`].
//!
//! The grammar is intentionally shallow. Top-level entities the workspace
//! relies on (`define`, `declare`, metadata definitions, target information)
//! are parsed in full; any other top-level line is consumed and ignored. Inside
//! function bodies, calls and debug records are decoded while every other
//! instruction is kept opaque.
//!
//! Multi-module containers are split at the text level on their
//! `; ModuleID = '...'` header lines, see [`split_container`].
use std::collections::btree_map::Entry;
use std::ops::Range;

use chumsky::{input::ValueInput, prelude::*};
use either::Either;
use smallvec::SmallVec;

use crate::{
    lexer::{Spanned, Token, lexer, render},
    metadata::{MetaField, MetaId, MetaValue, MetadataNode},
    module::{
        BasicBlock, Call, CallArg, Callee, DebugRecord, DebugRecordKind, Function, Instruction,
        Module, Param,
    },
    types::Type,
    utils::{Error, ParseError},
};

type Span = SimpleSpan;
type Extra<'t> = extra::Err<Rich<'t, Token, Span>>;

const MODULE_HEADER: &str = "; ModuleID = ";

/// Attributes that may precede the value of a call operand.
const PARAMETER_ATTRIBUTES: &[&str] = &[
    "align",
    "allocalign",
    "allocptr",
    "byref",
    "byval",
    "captures",
    "dead_on_unwind",
    "dereferenceable",
    "dereferenceable_or_null",
    "elementtype",
    "immarg",
    "inalloca",
    "initializes",
    "inreg",
    "nest",
    "noalias",
    "nocapture",
    "nofpclass",
    "nofree",
    "nonnull",
    "noundef",
    "preallocated",
    "range",
    "readnone",
    "readonly",
    "returned",
    "signext",
    "sret",
    "swiftasync",
    "swifterror",
    "swiftself",
    "writable",
    "writeonly",
    "zeroext",
];

impl<const N: usize> chumsky::container::Container<CallArg> for SmallVec<CallArg, N> {
    fn with_capacity(n: usize) -> Self {
        SmallVec::with_capacity(n)
    }

    fn push(&mut self, item: CallArg) {
        SmallVec::push(self, item)
    }
}

// ---------------- Small helpers ----------------

fn is_delimiter(token: &Token) -> bool {
    matches!(
        token,
        Token::Newline
            | Token::LParen
            | Token::RParen
            | Token::LBrace
            | Token::RBrace
            | Token::LBracket
            | Token::RBracket
            | Token::LAngle
            | Token::RAngle
    )
}

/// Index just past the group opened at `tokens[start]`.
fn skip_group(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token {
            Token::LParen | Token::LBrace | Token::LBracket | Token::LAngle => depth += 1,
            Token::RParen | Token::RBrace | Token::RBracket | Token::RAngle => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Split a call operand into its leading attributes and its value.
fn split_attributes(tokens: &[Token]) -> (String, String) {
    let mut index = 0;
    while let Some(Token::Word(word)) = tokens.get(index) {
        if !PARAMETER_ATTRIBUTES.contains(&word.as_str()) {
            break;
        }
        index += 1;
        match tokens.get(index) {
            Some(Token::LParen) => index = skip_group(tokens, index),
            Some(Token::Num(_)) if word == "align" => index += 1,
            _ => {}
        }
    }
    (render(&tokens[..index]), render(&tokens[index..]))
}

fn word<'t, I>(keyword: &'static str) -> impl Parser<'t, I, (), Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    just(Token::Word(keyword.to_string()))
        .ignored()
        .labelled(keyword)
}

fn number<'t, I, N>() -> impl Parser<'t, I, N, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
    N: std::str::FromStr,
{
    select! { Token::Num(n) => n }
        .try_map(|n: String, span| {
            n.parse::<N>()
                .map_err(|_| Rich::custom(span, format!("integer out of range: {n}")))
        })
        .labelled("integer")
}

fn string<'t, I>() -> impl Parser<'t, I, String, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    select! { Token::Str(s) => s }.labelled("string")
}

fn rest_of_line<'t, I>() -> impl Parser<'t, I, (), Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    any()
        .filter(|token: &Token| *token != Token::Newline)
        .repeated()
}

fn enclosed<'t, I, P>(
    inner: P,
    open: Token,
    close: Token,
) -> impl Parser<'t, I, Vec<Token>, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
    P: Parser<'t, I, Vec<Token>, Extra<'t>> + Clone,
{
    inner
        .delimited_by(just(open.clone()), just(close.clone()))
        .map(move |body: Vec<Token>| {
            let mut out = Vec::with_capacity(body.len() + 2);
            out.push(open.clone());
            out.extend(body);
            out.push(close.clone());
            out
        })
}

/// A balanced `( )`, `{ }`, `[ ]` or `< >` group, delimiters included.
fn group<'t, I>() -> impl Parser<'t, I, Vec<Token>, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|group| {
        let inner = choice((
            group,
            any()
                .filter(|token: &Token| !is_delimiter(token))
                .map(|token| vec![token]),
        ))
        .repeated()
        .collect::<Vec<Vec<Token>>>()
        .map(|parts| parts.concat());

        choice((
            enclosed(inner.clone(), Token::LParen, Token::RParen),
            enclosed(inner.clone(), Token::LBrace, Token::RBrace),
            enclosed(inner.clone(), Token::LBracket, Token::RBracket),
            enclosed(inner, Token::LAngle, Token::RAngle),
        ))
    })
}

/// Operand text up to the next `,` or closing delimiter at the same depth.
fn raw_operand<'t, I>() -> impl Parser<'t, I, Vec<Token>, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    choice((
        group(),
        any()
            .filter(|token: &Token| !is_delimiter(token) && *token != Token::Comma)
            .map(|token| vec![token]),
    ))
    .repeated()
    .at_least(1)
    .collect::<Vec<Vec<Token>>>()
    .map(|parts| parts.concat())
    .labelled("operand")
}

/// Linkage, visibility, calling convention, return attributes, ... anything
/// between `define`/`call` and the type.
fn prefix_attribute<'t, I>() -> impl Parser<'t, I, (), Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let arguments = group()
        .filter(|tokens: &Vec<Token>| tokens.first() == Some(&Token::LParen));

    choice((
        select! { Token::Word(w) if Type::from_keyword(&w).is_none() && w != "target" => () }
            .then_ignore(arguments.or_not()),
        select! { Token::Num(_) => () },
    ))
}

// ---------------- Types ----------------

#[derive(Debug, Clone)]
enum TypeSuffix {
    Pointer(u32),
    Params(Vec<Type>, bool),
}

fn type_parser<'t, I>() -> impl Parser<'t, I, Type, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|ty| {
        let space = number::<I, u32>()
            .delimited_by(just(Token::LParen), just(Token::RParen));
        let addrspace = word("addrspace").ignore_then(space);

        let pointer = word("ptr")
            .ignore_then(addrspace.clone().or_not())
            .map(|space| Type::Ptr {
                addrspace: space.unwrap_or(0),
            });

        let keyword = select! { Token::Word(w) => w }.try_map(|w: String, span| {
            let unknown = || Rich::custom(span, format!("unknown type `{w}`"));
            Type::from_keyword(&w).ok_or_else(unknown)
        });

        let named = select! { Token::Local(name) => Type::Named(name) };

        let target = word("target").ignore_then(group()).map(|tokens| {
            let mut all = vec![Token::Word("target".to_string())];
            all.extend(tokens);
            Type::Opaque(render(&all))
        });

        let fields = ty
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        let structure = fields.clone().map(|fields| Type::Struct {
            fields,
            packed: false,
        });

        let packed = fields
            .delimited_by(just(Token::LAngle), just(Token::RAngle))
            .map(|fields| Type::Struct {
                fields,
                packed: true,
            })
            .labelled("packed structure type");

        let array = number::<I, u64>()
            .then_ignore(word("x"))
            .then(ty.clone())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|(len, elem)| Type::Array {
                len,
                elem: Box::new(elem),
            })
            .labelled("array type");

        let vector = word("vscale")
            .then_ignore(word("x"))
            .or_not()
            .then(number::<I, u64>())
            .then_ignore(word("x"))
            .then(ty.clone())
            .delimited_by(just(Token::LAngle), just(Token::RAngle))
            .map(|((scalable, len), elem)| Type::Vector {
                len,
                scalable: scalable.is_some(),
                elem: Box::new(elem),
            })
            .labelled("vector type");

        let base = choice((
            pointer, keyword, named, target, structure, packed, array, vector,
        ));

        let star = addrspace
            .or_not()
            .then_ignore(just(Token::Star))
            .map(|space| TypeSuffix::Pointer(space.unwrap_or(0)));

        let params = choice((
            just(Token::Ellipsis).to(Either::Right(())),
            ty.map(Either::Left),
        ))
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(|items| {
            let variadic = items.iter().any(Either::is_right);
            let params = items.into_iter().filter_map(Either::left).collect();
            TypeSuffix::Params(params, variadic)
        });

        base.foldl(choice((star, params)).repeated(), |ty, suffix| match suffix {
            TypeSuffix::Pointer(addrspace) => Type::TypedPtr {
                pointee: Box::new(ty),
                addrspace,
            },
            TypeSuffix::Params(params, variadic) => Type::Function {
                ret: Box::new(ty),
                params,
                variadic,
            },
        })
        .labelled("type")
    })
}

// ---------------- Metadata ----------------

fn metadata_node<'t, I, P>(value: P) -> impl Parser<'t, I, MetadataNode, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
    P: Parser<'t, I, MetaValue, Extra<'t>> + Clone,
{
    let field = select! { Token::Word(key) => key }
        .then_ignore(just(Token::Colon))
        .or_not()
        .then(value.clone())
        .map(|(key, value)| MetaField { key, value });

    let specialized = select! { Token::MetaName(kind) => kind }
        .then(
            field
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(kind, fields)| MetadataNode::Specialized {
            kind,
            distinct: false,
            fields,
        });

    let tuple = just(Token::Bang)
        .ignore_then(
            value
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|elements| MetadataNode::Tuple {
            distinct: false,
            elements,
        });

    word("distinct")
        .or_not()
        .then(choice((specialized, tuple)))
        .map(|(distinct, node)| node.with_distinct(distinct.is_some()))
        .labelled("metadata node")
}

fn metadata_value<'t, I>() -> impl Parser<'t, I, MetaValue, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|value| {
        let reference = select! { Token::MetaId(id) => MetaValue::Ref(MetaId(id)) };

        let string = select! {
            Token::Str(s) => MetaValue::Str(s),
            Token::MetaStr(s) => MetaValue::Str(s),
        };

        let integer = select! { Token::Num(n) => n }.try_map(|n: String, span| {
            n.parse::<i128>()
                .map(MetaValue::Int)
                .map_err(|_| Rich::custom(span, format!("invalid integer `{n}`")))
        });

        let typed = type_parser()
            .then(
                any()
                    .filter(|token: &Token| {
                        matches!(
                            token,
                            Token::Local(_)
                                | Token::Global(_)
                                | Token::Num(_)
                                | Token::Word(_)
                                | Token::Str(_)
                        )
                    })
                    .map(|token| token.to_string()),
            )
            .map(|(ty, value)| MetaValue::Typed { ty, value });

        let flags = select! { Token::Word(w) => w }
            .separated_by(just(Token::Pipe))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|words| MetaValue::Word(words.join(" | ")));

        // Non-integral numeric literals are kept verbatim.
        let literal = select! { Token::Num(n) => MetaValue::Word(n) };

        let node = metadata_node(value).map(Box::new).map(MetaValue::Node);

        choice((reference, node, string, integer, typed, flags, literal))
            .labelled("metadata")
    })
}

// ---------------- Function bodies ----------------

#[derive(Debug, Clone)]
enum Line {
    Label(String),
    Instruction(Instruction),
}

fn call_instruction<'t, I>() -> impl Parser<'t, I, Call, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let dest = select! { Token::Local(name) => name }
        .then_ignore(just(Token::Equal));
    let tail = choice((word("tail"), word("musttail"), word("notail")));
    let callee = select! {
        Token::Global(name) => Callee::Direct(name),
        Token::Local(name) => Callee::Indirect(name),
    }
    .labelled("callee");

    let argument = choice((
        word("metadata")
            .ignore_then(metadata_value())
            .map(CallArg::Metadata),
        type_parser().then(raw_operand()).map(|(ty, tokens)| {
            let (attributes, value) = split_attributes(&tokens);
            CallArg::Value {
                ty,
                attributes,
                value,
            }
        }),
    ));

    dest.or_not()
        .then_ignore(tail.or_not())
        .then_ignore(word("call"))
        .then_ignore(prefix_attribute().repeated())
        .then(type_parser())
        .then(callee)
        .then(
            argument
                .separated_by(just(Token::Comma))
                .collect::<SmallVec<CallArg, 4>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(rest_of_line())
        .map(|(((dest, ret), callee), args)| Call {
            dest,
            ret,
            callee,
            args,
        })
        .labelled("call")
}

fn debug_record<'t, I>() -> impl Parser<'t, I, Instruction, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    select! { Token::DbgRecord(kind) => kind }
        .then(
            metadata_value()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(rest_of_line())
        .map(|(kind, operands)| match kind.parse::<DebugRecordKind>() {
            Ok(kind) => Instruction::DebugRecord(DebugRecord { kind, operands }),
            Err(_) => Instruction::Other {
                dest: None,
                opcode: Token::DbgRecord(kind).to_string(),
            },
        })
        .labelled("debug record")
}

fn body_line<'t, I>() -> impl Parser<'t, I, Line, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let label = select! {
        Token::Word(label) => label,
        Token::Num(label) => label,
        Token::Str(label) => label,
    }
    .then_ignore(just(Token::Colon))
    .map(Line::Label)
    .labelled("block label");

    let other = select! { Token::Local(name) => name }
        .then_ignore(just(Token::Equal))
        .or_not()
        .then(
            any()
                .filter(|token: &Token| !matches!(token, Token::Newline | Token::RBrace))
                .map(|token| token.to_string()),
        )
        .then_ignore(rest_of_line())
        .map(|(dest, opcode)| Instruction::Other { dest, opcode });

    choice((
        label,
        call_instruction()
            .map(Instruction::Call)
            .map(Line::Instruction),
        debug_record().map(Line::Instruction),
        other.map(Line::Instruction),
    ))
}

fn into_blocks(lines: Vec<Option<Line>>) -> Vec<BasicBlock> {
    let mut blocks: Vec<BasicBlock> = Vec::new();
    for line in lines.into_iter().flatten() {
        match line {
            Line::Label(label) => blocks.push(BasicBlock {
                label: Some(label),
                instructions: Vec::new(),
            }),
            Line::Instruction(instruction) => match blocks.last_mut() {
                Some(block) => block.instructions.push(instruction),
                None => blocks.push(BasicBlock {
                    label: None,
                    instructions: vec![instruction],
                }),
            },
        }
    }
    blocks
}

// ---------------- Top-level entities ----------------

#[derive(Debug, Clone)]
enum Item {
    SourceFilename(String),
    TargetTriple(String),
    DataLayout(String),
    Function(Function),
    Metadata(MetaId, MetadataNode),
    NamedMetadata(String, Vec<MetaId>),
    Ignored,
}

fn param_list<'t, I>() -> impl Parser<'t, I, (Vec<Param>, bool), Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let param = type_parser()
        .then(raw_operand().or_not())
        .map(|(ty, tokens)| {
            let mut tokens = tokens.unwrap_or_default();
            let name = match tokens.pop() {
                Some(Token::Local(name)) => Some(name),
                Some(other) => {
                    tokens.push(other);
                    None
                }
                None => None,
            };
            Param {
                ty,
                attributes: render(&tokens),
                name,
            }
        });

    choice((
        just(Token::Ellipsis).to(Either::Right(())),
        param.map(Either::Left),
    ))
    .separated_by(just(Token::Comma))
    .collect::<Vec<_>>()
    .delimited_by(just(Token::LParen), just(Token::RParen))
    .map(|items| {
        let variadic = items.iter().any(Either::is_right);
        let params = items.into_iter().filter_map(Either::left).collect();
        (params, variadic)
    })
    .labelled("parameter list")
}

/// Everything after the parameter list of a function header. Returns the
/// `!dbg` attachment if there is one.
fn function_trailer<'t, I>() -> impl Parser<'t, I, Option<MetaId>, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    choice((
        just(Token::MetaName("dbg".to_string()))
            .ignore_then(select! { Token::MetaId(id) => MetaId(id) })
            .map(Some),
        any()
            .filter(|token: &Token| !matches!(token, Token::LBrace | Token::Newline))
            .to(None),
    ))
    .repeated()
    .collect::<Vec<_>>()
    .map(|found| found.into_iter().flatten().next())
}

fn function_header<'t, I>()
-> impl Parser<'t, I, (Type, String, (Vec<Param>, bool), Option<MetaId>), Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let name = select! { Token::Global(name) => name }
        .labelled("function name");

    prefix_attribute()
        .repeated()
        .ignore_then(type_parser())
        .then(name)
        .then(param_list())
        .then(function_trailer())
        .map(|(((ret, name), params), subprogram)| (ret, name, params, subprogram))
}

fn item_parser<'t, I>() -> impl Parser<'t, I, Item, Extra<'t>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let source_filename = word("source_filename")
        .ignore_then(just(Token::Equal))
        .ignore_then(string())
        .map(Item::SourceFilename);

    let target = word("target").ignore_then(choice((
        word("triple")
            .ignore_then(just(Token::Equal))
            .ignore_then(string())
            .map(Item::TargetTriple),
        word("datalayout")
            .ignore_then(just(Token::Equal))
            .ignore_then(string())
            .map(Item::DataLayout),
    )));

    let body = body_line()
        .or_not()
        .separated_by(just(Token::Newline))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map(into_blocks)
        .labelled("function body");

    let define = word("define")
        .ignore_then(function_header())
        .then(body)
        .map(
            |((return_type, name, (params, variadic), subprogram), blocks)| {
                Item::Function(Function {
                    name,
                    return_type,
                    params,
                    variadic,
                    subprogram,
                    blocks,
                })
            },
        );

    let declare = word("declare").ignore_then(function_header()).map(
        |(return_type, name, (params, variadic), subprogram)| {
            Item::Function(Function {
                name,
                return_type,
                params,
                variadic,
                subprogram,
                blocks: Vec::new(),
            })
        },
    );

    let metadata = select! { Token::MetaId(id) => MetaId(id) }
        .then_ignore(just(Token::Equal))
        .then(choice((
            select! { Token::MetaStr(s) => MetadataNode::Str(s) },
            metadata_node(metadata_value()),
        )))
        .map(|(id, node)| Item::Metadata(id, node))
        .labelled("metadata definition");

    let named_metadata = select! { Token::MetaName(name) => name }
        .then_ignore(just(Token::Equal))
        .then_ignore(just(Token::Bang))
        .then(
            select! { Token::MetaId(id) => MetaId(id) }
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, ids)| Item::NamedMetadata(name, ids))
        .labelled("named metadata");

    let ignored = any()
        .filter(|token: &Token| match token {
            Token::Newline | Token::MetaId(_) | Token::MetaName(_) => false,
            Token::Word(w) => w != "define" && w != "declare",
            _ => true,
        })
        .ignore_then(rest_of_line())
        .to(Item::Ignored);

    choice((
        source_filename,
        target,
        define,
        declare,
        metadata,
        named_metadata,
        ignored,
    ))
}

fn module_parser<'t, I>() -> impl Parser<'t, I, Vec<Item>, Extra<'t>>
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    item_parser()
        .or_not()
        .separated_by(just(Token::Newline))
        .collect::<Vec<_>>()
        .map(|items| items.into_iter().flatten().collect())
        .then_ignore(end())
}

fn assemble(items: Vec<Item>) -> Result<Module, Error> {
    let mut module = Module::default();
    for item in items {
        match item {
            Item::SourceFilename(name) => module.source_filename = Some(name),
            Item::TargetTriple(triple) => module.target_triple = Some(triple),
            Item::DataLayout(layout) => module.data_layout = Some(layout),
            Item::Function(function) => module.functions.push(function),
            Item::Metadata(id, node) => match module.metadata.entry(id) {
                Entry::Vacant(entry) => {
                    entry.insert(node);
                }
                Entry::Occupied(_) => return Err(Error::DuplicateMetadata { id }),
            },
            Item::NamedMetadata(name, ids) => {
                module.named_metadata.insert(name, ids);
            }
            Item::Ignored => {}
        }
    }
    Ok(module)
}

/// Map a span over token indices back to a byte range of the source text.
fn source_span(tokens: &[Spanned<Token>], span: Span, src_len: usize) -> Range<usize> {
    let start = tokens
        .get(span.start)
        .map(|(_, s)| s.start)
        .unwrap_or(src_len);
    let end = match span.end.checked_sub(1) {
        Some(last) if span.end > span.start => {
            tokens.get(last).map(|(_, s)| s.end).unwrap_or(src_len)
        }
        _ => start,
    };
    start..end.max(start)
}

/// Identifier found on the `; ModuleID = '...'` header of `src`, if any.
pub fn module_id(src: &str) -> Option<String> {
    src.lines().find_map(|line| {
        line.trim_start()
            .strip_prefix(MODULE_HEADER)
            .map(|id| id.trim().trim_matches('\'').to_string())
    })
}

// ---------------- Public API ----------------

/// Parse the text of a single module.
///
/// The returned module is not materialized yet, see [`Module::materialize`].
/// Parse diagnostics carry byte spans into `src`.
///
/// Example
/// ```
/// use kleeir::parser::parse_module;
/// let module = parse_module("define void @f() {\n  ret void\n}\n").unwrap();
/// assert_eq!(module.function("f").map(|f| f.arity()), Some(0));
/// ```
pub fn parse_module(src: &str) -> Result<Module, Error> {
    // 1) Lexing
    let (tokens, lex_errors) = lexer().parse(src).into_output_errors();
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|e| ParseError::new(format!("lexing error: {e}"), e.span().start..e.span().end))
        .collect();

    let tokens = match tokens {
        Some(tokens) if errors.is_empty() => tokens,
        _ => return Err(Error::ParserErrors { module: 0, errors }),
    };

    // 2) Parsing over the plain token stream, spans are mapped back afterwards
    let plain: Vec<Token> = tokens.iter().map(|(t, _s)| t.clone()).collect();
    let stream = plain.as_slice();
    let (items, parse_errors) = module_parser().parse(stream).into_output_errors();
    errors.extend(parse_errors.into_iter().map(|e| {
        ParseError::new(
            format!("parse error: {e}"),
            source_span(&tokens, *e.span(), src.len()),
        )
    }));

    let items = match items {
        Some(items) if errors.is_empty() => items,
        _ => return Err(Error::ParserErrors { module: 0, errors }),
    };

    let mut module = assemble(items)?;
    module.id = module_id(src);
    Ok(module)
}

/// Split a container into the text of its modules.
///
/// Each chunk is paired with its byte offset in `src`. A new module starts at
/// every `; ModuleID = ` header line; text before the first header only forms
/// a module if it holds more than comments and blank lines.
pub fn split_container(src: &str) -> Vec<(usize, &str)> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        if line.trim_start().starts_with(MODULE_HEADER) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let has_content = |text: &str| {
        text.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with(';')
        })
    };

    let mut chunks = Vec::with_capacity(starts.len() + 1);
    let first = starts.first().copied().unwrap_or(src.len());
    if has_content(&src[..first]) {
        chunks.push((0, &src[..first]));
    }
    for (index, &start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(src.len());
        chunks.push((start, &src[start..end]));
    }
    chunks
}

/// Parse every module of a container, in order.
///
/// Parse diagnostics carry byte spans into `src` and the index of the module
/// they belong to.
pub fn parse_container(src: &str) -> Result<Vec<Module>, Error> {
    let chunks = split_container(src);
    if chunks.is_empty() {
        return Err(Error::EmptyContainer);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, (offset, text))| {
            parse_module(text).map_err(|err| match err {
                Error::ParserErrors { errors, .. } => Error::ParserErrors {
                    module: index,
                    errors: errors.into_iter().map(|e| e.shifted(offset)).collect(),
                },
                other => other,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_attributes() {
        let tokens = vec![
            Token::Word("noundef".into()),
            Token::Word("align".into()),
            Token::Num("8".into()),
            Token::Word("dereferenceable".into()),
            Token::LParen,
            Token::Num("16".into()),
            Token::RParen,
            Token::Local("p".into()),
        ];
        let (attributes, value) = split_attributes(&tokens);
        assert_eq!(attributes, "noundef align 8 dereferenceable(16)");
        assert_eq!(value, "%p");
    }

    #[test]
    fn test_split_container_drops_comment_preamble() {
        let src = "; produced by a tool\n\n\
                   ; ModuleID = 'a'\nsource_filename = \"a.c\"\n; ModuleID = 'b'\n";
        let chunks = split_container(src);
        assert_eq!(chunks.len(), 2);
        assert_eq!(Some(chunks[0].0), src.find("; ModuleID = 'a'"));
        assert!(chunks[1].1.starts_with("; ModuleID = 'b'"));
    }

    #[test]
    fn test_split_container_without_header() {
        let src = "define void @f() {\n  ret void\n}\n";
        assert_eq!(split_container(src), vec![(0, src)]);
        assert!(split_container("; nothing here\n\n").is_empty());
    }

    #[test]
    fn test_module_id() {
        assert_eq!(module_id("; ModuleID = 'harness.c'\n"), Some("harness.c".into()));
        assert_eq!(module_id("source_filename = \"x\"\n"), None);
    }
}
