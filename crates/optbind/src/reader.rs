//! Response-file expansion.
//!
//! An argument `@path` is replaced in place by the words of the file at
//! `path`. Files may reference further files up to
//! [`ParserConfig::max_response_depth`] levels deep; going deeper is an error,
//! which also stops a file that includes itself.
//!
//! Words are split shell-style: whitespace separates words, `'...'` is taken
//! literally, `"..."` honours `\"` and `\\`, a backslash outside quotes escapes
//! the next character, and `#` at the start of a word comments out the rest of
//! the line. A quoted `@word` is never expanded.

use std::fs;
use std::io;
use std::iter::Peekable;
use std::str::Chars;

use crate::config::ParserConfig;
use crate::error::ResponseFileError;

/// Supplies response-file contents.
pub trait ResponseSource {
    fn read(&self, path: &str) -> io::Result<String>;
}

/// Reads response files from the filesystem, relative to the working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl ResponseSource for FsSource {
    fn read(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// One argument after expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Index of the argv element this token came from.
    pub origin: usize,
}

/// Flatten `argv`, splicing in response-file contents.
pub fn expand<S: AsRef<str>>(
    argv: &[S],
    source: &dyn ResponseSource,
    config: &ParserConfig,
) -> Result<Vec<Token>, ResponseFileError> {
    let mut out = Vec::with_capacity(argv.len());
    for (origin, arg) in argv.iter().enumerate() {
        let arg = arg.as_ref();
        match response_path(arg, config) {
            Some(path) => expand_file(path, origin, 1, source, config, &mut out)?,
            None => out.push(Token {
                text: arg.to_string(),
                origin,
            }),
        }
    }
    Ok(out)
}

fn response_path<'a>(arg: &'a str, config: &ParserConfig) -> Option<&'a str> {
    if !config.response_files {
        return None;
    }
    arg.strip_prefix('@').filter(|path| !path.is_empty())
}

fn expand_file(
    path: &str,
    origin: usize,
    depth: usize,
    source: &dyn ResponseSource,
    config: &ParserConfig,
    out: &mut Vec<Token>,
) -> Result<(), ResponseFileError> {
    if depth > config.max_response_depth {
        return Err(ResponseFileError::DepthExceeded {
            path: path.to_string(),
            limit: config.max_response_depth,
        });
    }
    tracing::debug!(path, depth, "expanding response file");

    let text = source
        .read(path)
        .map_err(|e| ResponseFileError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    let words = split_words(&text).map_err(|Unterminated| ResponseFileError::Unterminated {
        path: path.to_string(),
    })?;

    for word in words {
        match response_path(&word.text, config).filter(|_| !word.quoted) {
            Some(nested) => expand_file(nested, origin, depth + 1, source, config, out)?,
            None => out.push(Token {
                text: word.text,
                origin,
            }),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Word {
    pub(crate) text: String,
    pub(crate) quoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unterminated;

pub(crate) fn split_words(text: &str) -> Result<Vec<Word>, Unterminated> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(Word {
                        text: std::mem::take(&mut cur),
                        quoted,
                    });
                    in_word = false;
                    quoted = false;
                }
            }
            '#' if !in_word => skip_line(&mut chars),
            '\'' => {
                in_word = true;
                quoted = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => cur.push(ch),
                        None => return Err(Unterminated),
                    }
                }
            }
            '"' => {
                in_word = true;
                quoted = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => cur.push(ch),
                            Some(ch) => {
                                cur.push('\\');
                                cur.push(ch);
                            }
                            None => return Err(Unterminated),
                        },
                        Some(ch) => cur.push(ch),
                        None => return Err(Unterminated),
                    }
                }
            }
            '\\' => match chars.next() {
                // Line continuation.
                Some('\n') => {}
                Some(ch) => {
                    in_word = true;
                    cur.push(ch);
                }
                None => {
                    in_word = true;
                    cur.push('\\');
                }
            },
            _ => {
                in_word = true;
                cur.push(c);
            }
        }
    }
    if in_word {
        words.push(Word { text: cur, quoted });
    }
    Ok(words)
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            break;
        }
        chars.next();
    }
}
