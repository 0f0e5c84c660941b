// Parser for gatelink object files.
//
// Parses a token stream (from the lexer) into an `ObjectFile`. Grammar,
// one item per line:
//
//   item      := 'module' NAME | node_decl
//   node_decl := NAME NAME NAME [':' input (',' input)*] ['->' ['~'] NAME]
//                ['=>' NAME | 'fn' NUMBER] ['@' NAME] ['<' NAME] ['=' NUMBER]
//   input     := ['~'] NAME | '#' NUMBER
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub file: Option<ObjectFile>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an object file. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = file_parser(source);
    let (file, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        file,
        errors: all_errors,
    }
}

// ── Parser builder ──

fn file_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, ObjectFile, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().ignored();

    let name = just(Token::Name).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let number = select! {
        Token::Number(n) = e => (n, e.span()),
    };

    let tilde = just(Token::Tilde).or_not().map(|t| t.is_some());

    // ── Inputs: ':' input (',' input)* ──

    let input = {
        let literal = just(Token::Hash)
            .ignore_then(number.clone())
            .map(|(n, span)| InputRef::Literal(n, span));
        let node = tilde
            .clone()
            .then(name.clone())
            .map(|(inverted, name)| InputRef::Node { name, inverted });
        literal.or(node)
    };

    let inputs = just(Token::Colon).ignore_then(
        input
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>(),
    );

    // ── Alias: '->' ['~'] target ──

    let alias = just(Token::Arrow)
        .ignore_then(tilde.clone())
        .then(name.clone())
        .map(|(invert, target)| AliasRef { target, invert });

    // ── Action: ['=>' slave | 'fn' n] ['@' clock] ['<' delay] ──

    let action = {
        let slave = just(Token::FatArrow)
            .ignore_then(name.clone())
            .map(ActionSlave::Node)
            .or(just(Token::Fn)
                .ignore_then(number.clone())
                .map(|(n, span)| ActionSlave::Function(n, span)));
        let clock = just(Token::At).ignore_then(name.clone());
        let delay = just(Token::Lt).ignore_then(name.clone());
        slave
            .or_not()
            .then(clock.or_not())
            .then(delay.or_not())
            .map_with(|((slave, clock), delay), e| {
                if slave.is_none() && clock.is_none() && delay.is_none() {
                    None
                } else {
                    Some(ActionRef {
                        slave,
                        clock,
                        delay,
                        span: e.span(),
                    })
                }
            })
    };

    let value = just(Token::Equals).ignore_then(number);

    // ── Items ──

    let node_decl = name
        .clone()
        .then(name.clone())
        .then(name.clone())
        .then(inputs.or_not())
        .then(alias.or_not())
        .then(action)
        .then(value.or_not())
        .map_with(|((((((name, kind), role), inputs), alias), action), value), e| {
            Item::Node(NodeDecl {
                name,
                kind,
                role,
                inputs: inputs.unwrap_or_default(),
                alias,
                action,
                value,
                span: e.span(),
            })
        });

    let module_decl = just(Token::Module).ignore_then(name).map(Item::Module);

    let item = module_decl.or(node_decl);

    nl.clone()
        .ignore_then(
            item.separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|items, e| ObjectFile {
            items,
            span: e.span(),
        })
}

// ── Tests ──
