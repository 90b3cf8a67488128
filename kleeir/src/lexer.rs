//! Tokenizer for textual LLVM IR.
//!
//! The lexer is line-aware: newlines are significant in the grammar (one
//! instruction or top-level entity per line) so they are kept as
//! [`Token::Newline`]. Comments (`; ...`) and inline whitespace are dropped.
use chumsky::prelude::*;

pub type Spanned<T> = (T, SimpleSpan);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Newline,

    // Identifiers
    Local(String),    // %x, %"quoted name", %0
    Global(String),   // @f, @llvm.dbg.declare
    MetaId(u32),      // !17
    MetaName(String), // !dbg, !DILocalVariable, !llvm.module.flags
    MetaStr(String),  // !"text"
    Bang,             // ! introducing a tuple (`!{...}`)
    AttrGroup(u32),   // #0
    DbgRecord(String),

    // Literals
    Str(String),
    Num(String),
    Word(String),
    Ellipsis,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LAngle,
    RAngle,
    Comma,
    Equal,
    Star,
    Colon,
    Pipe,
    Other(char),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_')
}

fn write_name(f: &mut std::fmt::Formatter<'_>, sigil: char, name: &str) -> std::fmt::Result {
    if !name.is_empty() && name.chars().all(is_name_char) {
        write!(f, "{sigil}{name}")
    } else {
        write!(f, "{sigil}\"{name}\"")
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Newline => write!(f, "end of line"),
            Token::Local(name) => write_name(f, '%', name),
            Token::Global(name) => write_name(f, '@', name),
            Token::MetaId(id) => write!(f, "!{id}"),
            Token::MetaName(name) => write!(f, "!{name}"),
            Token::MetaStr(s) => write!(f, "!\"{s}\""),
            Token::Bang => write!(f, "!"),
            Token::AttrGroup(id) => write!(f, "#{id}"),
            Token::DbgRecord(kind) => write!(f, "#dbg_{kind}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Num(n) => write!(f, "{n}"),
            Token::Word(w) => write!(f, "{w}"),
            Token::Ellipsis => write!(f, "..."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Equal => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Pipe => write!(f, "|"),
            Token::Other(c) => write!(f, "{c}"),
        }
    }
}

/// `true` when `token` is printed right after `previous`, without a space.
fn glues_to(previous: &Token, token: &Token) -> bool {
    match (previous, token) {
        (_, Token::RParen | Token::RBrace | Token::RBracket | Token::RAngle | Token::Comma) => true,
        (Token::LParen | Token::LBrace | Token::LBracket | Token::LAngle | Token::Bang, _) => true,
        (Token::Word(_) | Token::MetaName(_), Token::LParen) => true,
        _ => false,
    }
}

/// Print a token sequence back as IR text, e.g. `noundef align 8` or
/// `dereferenceable(16)`.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        if previous.is_some_and(|previous| !glues_to(previous, token)) {
            out.push(' ');
        }
        out.push_str(&token.to_string());
        previous = Some(token);
    }
    out
}

/// Decode the `\XX` hexadecimal escapes of an IR string literal.
fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'\\') {
                out.push(b'\\');
                i += 2;
                continue;
            }
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token>>, extra::Err<Rich<'src, char>>> {
    let string = just('"')
        .ignore_then(none_of("\"\n").repeated().to_slice())
        .then_ignore(just('"'))
        .map(unescape)
        .labelled("string literal");

    let decimal = text::digits(10)
        .to_slice()
        .try_map(|digits: &str, span| {
            digits
                .parse::<u32>()
                .map_err(|_| Rich::custom(span, format!("identifier out of range: {digits}")))
        });

    let bare_name = any()
        .filter(|c: &char| is_name_char(*c))
        .repeated()
        .at_least(1)
        .to_slice()
        .map(str::to_string);

    let name = choice((string.clone(), bare_name.clone())).labelled("name");

    let local = just('%').ignore_then(name.clone()).map(Token::Local);
    let global = just('@').ignore_then(name).map(Token::Global);

    let meta = just('!').ignore_then(choice((
        decimal.clone().map(Token::MetaId),
        string.clone().map(Token::MetaStr),
        any()
            .filter(|c: &char| c.is_ascii_alphabetic() || matches!(c, '-' | '$' | '.' | '_'))
            .then(any().filter(|c: &char| is_name_char(*c)).repeated())
            .to_slice()
            .map(|s: &str| Token::MetaName(s.to_string())),
        empty().to(Token::Bang),
    )));

    let hash = just('#').ignore_then(choice((
        decimal.map(Token::AttrGroup),
        just("dbg_")
            .ignore_then(text::ascii::ident())
            .map(|kind: &str| Token::DbgRecord(kind.to_string())),
        empty().to(Token::Other('#')),
    )));

    let number = just('-')
        .or_not()
        .then(any().filter(|c: &char| c.is_ascii_digit()))
        .then(
            choice((
                one_of("eE").then(one_of("+-")).ignored(),
                any()
                    .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_'))
                    .ignored(),
            ))
            .repeated(),
        )
        .to_slice()
        .map(|s: &str| Token::Num(s.to_string()))
        .labelled("number");

    let word = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || matches!(c, '_' | '$' | '.'))
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| Token::Word(s.to_string()));

    let punct = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('<').to(Token::LAngle),
        just('>').to(Token::RAngle),
        just(',').to(Token::Comma),
        just('=').to(Token::Equal),
        just('*').to(Token::Star),
        just(':').to(Token::Colon),
        just('|').to(Token::Pipe),
    ));

    let other = any()
        .filter(|c: &char| !c.is_whitespace())
        .map(Token::Other);

    let token = choice((
        text::newline().to(Token::Newline),
        just("...").to(Token::Ellipsis),
        string.map(Token::Str),
        local,
        global,
        meta,
        hash,
        number,
        word,
        punct,
        other,
    ));

    // Comments are single-line starting with ';'
    let comment = just(';').then(none_of("\r\n").repeated()).ignored();
    let whitespace = text::inline_whitespace().at_least(1);
    let padding = choice((whitespace, comment)).repeated();

    padding
        .clone()
        .ignore_then(
            token
                .map_with(|tok, e| (tok, e.span()))
                .then_ignore(padding)
                .repeated()
                .collect(),
        )
        .then_ignore(end())
}
