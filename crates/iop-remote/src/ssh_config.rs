//! ---
//! iop_section: "02-remote-execution"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "OpenSSH client configuration parsing and host lookup."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
//! A subset of the OpenSSH `ssh_config(5)` format, enough to resolve the
//! entries written by the deployment tooling: `Host` blocks with wildcard
//! and negated patterns, first-obtained-value-wins semantics, and the
//! `HostName`, `Port`, `User` and `IdentityFile` keywords. Other keywords
//! are retained verbatim in [`SshHostEntry::options`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RemoteError, Result};

const DEFAULT_PORT: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    patterns: Vec<String>,
    /// `Match` blocks are kept so their options are not attributed to the
    /// preceding `Host`, but they never match.
    is_match: bool,
    options: Vec<(String, String)>,
}

impl Block {
    fn global() -> Self {
        Self {
            patterns: vec!["*".to_owned()],
            is_match: false,
            options: Vec::new(),
        }
    }

    fn matches(&self, alias: &str) -> bool {
        if self.is_match {
            return false;
        }
        let mut positive = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(negated, alias) {
                    return false;
                }
            } else if glob_match(pattern, alias) {
                positive = true;
            }
        }
        positive
    }

    fn is_catch_all(&self) -> bool {
        self.patterns.iter().all(|p| p == "*")
    }
}

/// Parsed SSH client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshConfig {
    blocks: Vec<Block>,
}

/// Effective settings for one host alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshHostEntry {
    pub alias: String,
    pub hostname: String,
    pub port: u16,
    pub user: Option<String>,
    pub identity_files: Vec<PathBuf>,
    /// Remaining keywords, lowercased, first value wins.
    pub options: BTreeMap<String, String>,
}

impl SshConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RemoteError::SshConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut blocks = vec![Block::global()];
        for (index, raw) in contents.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (keyword, value) = split_keyword(line).ok_or_else(|| RemoteError::SshConfigParse {
                line: line_no,
                message: format!("missing value in '{}'", line),
            })?;
            match keyword.as_str() {
                "host" => {
                    let patterns: Vec<String> =
                        value.split_whitespace().map(unquote).collect();
                    blocks.push(Block {
                        patterns,
                        is_match: false,
                        options: Vec::new(),
                    });
                }
                "match" => blocks.push(Block {
                    patterns: Vec::new(),
                    is_match: true,
                    options: Vec::new(),
                }),
                "port" => {
                    value.parse::<u16>().map_err(|_| RemoteError::SshConfigParse {
                        line: line_no,
                        message: format!("invalid port '{}'", value),
                    })?;
                    push_option(&mut blocks, keyword, unquote(&value));
                }
                _ => push_option(&mut blocks, keyword, unquote(&value)),
            }
        }
        Ok(Self { blocks })
    }

    /// True when a non catch-all `Host` block names `alias`.
    pub fn has_entry(&self, alias: &str) -> bool {
        self.blocks
            .iter()
            .any(|block| !block.is_catch_all() && block.matches(alias))
    }

    /// Resolve `alias`, failing when no specific `Host` block covers it.
    pub fn require(&self, alias: &str) -> Result<SshHostEntry> {
        if !self.has_entry(alias) {
            return Err(RemoteError::UnknownHost(alias.to_owned()));
        }
        Ok(self.lookup(alias))
    }

    /// Resolve the effective settings for `alias` the way `ssh -G` would.
    pub fn lookup(&self, alias: &str) -> SshHostEntry {
        let mut hostname: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut user: Option<String> = None;
        let mut identity_files = Vec::new();
        let mut options = BTreeMap::new();

        for block in self.blocks.iter().filter(|b| b.matches(alias)) {
            for (keyword, value) in &block.options {
                match keyword.as_str() {
                    "hostname" => {
                        hostname.get_or_insert_with(|| value.replace("%h", alias));
                    }
                    "port" => {
                        if port.is_none() {
                            port = value.parse().ok();
                        }
                    }
                    "user" => {
                        user.get_or_insert_with(|| value.clone());
                    }
                    "identityfile" => identity_files.push(PathBuf::from(value)),
                    other => {
                        options
                            .entry(other.to_owned())
                            .or_insert_with(|| value.clone());
                    }
                }
            }
        }

        SshHostEntry {
            alias: alias.to_owned(),
            hostname: hostname.unwrap_or_else(|| alias.to_owned()),
            port: port.unwrap_or(DEFAULT_PORT),
            user,
            identity_files,
            options,
        }
    }
}

fn push_option(blocks: &mut [Block], keyword: String, value: String) {
    if let Some(block) = blocks.last_mut() {
        block.options.push((keyword, value));
    }
}

fn split_keyword(line: &str) -> Option<(String, String)> {
    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let keyword = line[..split_at].to_ascii_lowercase();
    let rest = line[split_at..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    if rest.is_empty() {
        return None;
    }
    Some((keyword, rest.to_owned()))
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_owned()
}

/// Match `text` against an ssh pattern where `*` spans any run and `?` one character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
