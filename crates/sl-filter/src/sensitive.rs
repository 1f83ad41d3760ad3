//! Sensitive data detection and redaction.
//!
//! A [`SensitiveDataFilter`] holds an ordered list of regex rules plus a set
//! of field-name keywords. Three presets are provided: [`empty`], [`basic`]
//! and [`full`].
//!
//! [`empty`]: SensitiveDataFilter::empty
//! [`basic`]: SensitiveDataFilter::basic
//! [`full`]: SensitiveDataFilter::full

use std::borrow::Cow;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{FilterError, Result};

/// Placeholder written in place of sensitive data.
pub const REDACTED: &str = "[REDACTED]";

/// Longest pattern source accepted by [`SensitiveDataFilter::add_pattern`].
pub const MAX_PATTERN_LENGTH: usize = 1024;

/// Compiled program size limit for user-supplied patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Kind of sensitive data a rule targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `password=...` style assignments
    Password,
    /// `api_key=...`, `token=...`, `secret=...` assignments
    SecretAssignment,
    /// HTTP bearer token
    BearerToken,
    /// 13-19 digit card number
    CreditCard,
    /// Credentials inside a database URL
    ConnectionString,
    /// JSON Web Token
    Jwt,
    /// PEM private key block
    PrivateKey,
    /// AWS access key id (AKIA/ASIA)
    AwsAccessKey,
    /// AWS secret access key assignment
    AwsSecretKey,
    /// GitHub personal access token
    GitHubToken,
    /// OpenAI/Anthropic API key
    AiApiKey,
    /// Google API key
    GoogleApiKey,
    /// Email address
    Email,
    /// IPv4 address
    Ipv4,
    /// Phone number
    Phone,
    /// Pattern added at runtime
    Custom,
}

/// Built-in rule definition.
struct PatternDef {
    kind: PatternKind,
    pattern: Lazy<Regex>,
    replacement: &'static str,
}

// Rules shared by the basic and full presets.
static BASIC_PATTERNS: [PatternDef; 4] = [
    PatternDef {
        kind: PatternKind::Password,
        pattern: Lazy::new(|| {
            Regex::new(r#"(?i)(\b(?:password|passwd|pwd)["']?\s*[:=]\s*["']?)[^\s,;&"']+"#)
                .unwrap()
        }),
        replacement: "${1}[REDACTED]",
    },
    PatternDef {
        kind: PatternKind::SecretAssignment,
        pattern: Lazy::new(|| {
            Regex::new(
                r#"(?i)(\b(?:api[_-]?key|secret(?:[_-]?key)?|client[_-]?secret|access[_-]?token|auth[_-]?token|refresh[_-]?token|token)["']?\s*[:=]\s*["']?)[^\s,;&"']+"#,
            )
            .unwrap()
        }),
        replacement: "${1}[REDACTED]",
    },
    PatternDef {
        kind: PatternKind::BearerToken,
        pattern: Lazy::new(|| Regex::new(r"(?i)(\bbearer\s+)[A-Za-z0-9\-._~+/]+=*").unwrap()),
        replacement: "${1}[REDACTED]",
    },
    PatternDef {
        kind: PatternKind::CreditCard,
        pattern: Lazy::new(|| Regex::new(r"\b(?:\d{4}[- ]?){3}\d{1,7}\b").unwrap()),
        replacement: REDACTED,
    },
];

// Additional rules for the full preset. Connection strings run before the
// email rule so `user:pass@host` is handled as a credential, not an address.
static FULL_PATTERNS: [PatternDef; 11] = [
    PatternDef {
        kind: PatternKind::ConnectionString,
        pattern: Lazy::new(|| {
            Regex::new(
                r"(?i)\b((?:postgres(?:ql)?|mysql|mariadb|mongodb(?:\+srv)?|rediss?|amqps?|mssql|sqlserver)://)[^\s/@]+@",
            )
            .unwrap()
        }),
        replacement: "${1}[REDACTED]@",
    },
    PatternDef {
        kind: PatternKind::Jwt,
        pattern: Lazy::new(|| {
            Regex::new(r"\beyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)?").unwrap()
        }),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::PrivateKey,
        pattern: Lazy::new(|| {
            Regex::new(
                r"(?s)-----BEGIN[A-Z ]*PRIVATE KEY-----.*?(?:-----END[A-Z ]*PRIVATE KEY-----|\z)",
            )
            .unwrap()
        }),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::AwsAccessKey,
        pattern: Lazy::new(|| Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b").unwrap()),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::AwsSecretKey,
        pattern: Lazy::new(|| {
            Regex::new(r#"(?i)(\baws_?secret_?access_?key["']?\s*[:=]\s*["']?)[A-Za-z0-9/+=]{40}"#)
                .unwrap()
        }),
        replacement: "${1}[REDACTED]",
    },
    PatternDef {
        kind: PatternKind::GitHubToken,
        pattern: Lazy::new(|| Regex::new(r"\bgh[pousr]_[A-Za-z0-9_]{36,}").unwrap()),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::AiApiKey,
        // OpenAI: sk-..., Anthropic: sk-ant-...
        pattern: Lazy::new(|| Regex::new(r"\bsk-(?:ant-|proj-)?[A-Za-z0-9_-]{20,}").unwrap()),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::GoogleApiKey,
        pattern: Lazy::new(|| Regex::new(r"\bAIza[0-9A-Za-z_-]{35}").unwrap()),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::Email,
        pattern: Lazy::new(|| {
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
        }),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::Ipv4,
        pattern: Lazy::new(|| {
            Regex::new(
                r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
            )
            .unwrap()
        }),
        replacement: REDACTED,
    },
    PatternDef {
        kind: PatternKind::Phone,
        pattern: Lazy::new(|| {
            Regex::new(r"(?:\+\d{1,3}[-. ]?)?(?:\(\d{3}\)\s?|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b")
                .unwrap()
        }),
        replacement: REDACTED,
    },
];

const BASIC_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "access_key",
    "private_key",
    "credit_card",
    "card_number",
    "cvv",
    "ssn",
    "authorization",
];

const FULL_KEYWORDS: &[&str] = &["email", "phone", "ip_address", "connection_string"];

/// A compiled redaction rule.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    /// What this rule targets.
    pub kind: PatternKind,
    /// Compiled pattern.
    pub pattern: Regex,
    /// Replacement template; may reference capture groups (`${1}`).
    pub replacement: String,
}

impl RedactionRule {
    fn from_def(def: &PatternDef) -> Self {
        Self {
            kind: def.kind,
            pattern: (*def.pattern).clone(),
            replacement: def.replacement.to_string(),
        }
    }
}

/// Regex and field-name based sensitive data filter.
///
/// The rule list is append-only. [`add_pattern`](Self::add_pattern) takes
/// an internal write lock, so a filter shared behind an `Arc` may be
/// extended while other threads are redacting.
#[derive(Debug, Default)]
pub struct SensitiveDataFilter {
    rules: RwLock<Vec<RedactionRule>>,
    keywords: Vec<String>,
}

impl SensitiveDataFilter {
    /// Filter with no rules and no keywords.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Passwords, tokens, API keys and card numbers.
    pub fn basic() -> Self {
        Self {
            rules: RwLock::new(BASIC_PATTERNS.iter().map(RedactionRule::from_def).collect()),
            keywords: BASIC_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Basic plus emails, IPs, phone numbers, connection strings, JWTs,
    /// private keys and cloud credentials.
    pub fn full() -> Self {
        let rules = BASIC_PATTERNS
            .iter()
            .chain(FULL_PATTERNS.iter())
            .map(RedactionRule::from_def)
            .collect();
        let keywords = BASIC_KEYWORDS
            .iter()
            .chain(FULL_KEYWORDS.iter())
            .map(|k| k.to_string())
            .collect();

        Self {
            rules: RwLock::new(rules),
            keywords,
        }
    }

    /// Add a sensitive field-name keyword.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = normalize_field_name(&keyword.into());
        if !keyword.is_empty() && !self.keywords.contains(&keyword) {
            self.keywords.push(keyword);
        }
        self
    }

    /// Compile and append a pattern whose matches are replaced with `[REDACTED]`.
    pub fn add_pattern(&self, source: &str) -> Result<()> {
        self.add_pattern_with(source, REDACTED)
    }

    /// Compile and append a pattern with a custom replacement template.
    pub fn add_pattern_with(&self, source: &str, replacement: &str) -> Result<()> {
        let pattern = compile_pattern(source)?;
        let rule = RedactionRule {
            kind: PatternKind::Custom,
            pattern,
            replacement: replacement.to_string(),
        };

        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
        Ok(())
    }

    /// Number of rules currently installed.
    pub fn pattern_count(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Kinds of the installed rules, in evaluation order.
    pub fn pattern_kinds(&self) -> Vec<PatternKind> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.kind)
            .collect()
    }

    /// Sensitive field-name keywords.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Replace every rule match in `text`.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);

        let mut output: Cow<'a, str> = Cow::Borrowed(text);
        for rule in rules.iter() {
            let replaced = match rule.pattern.replace_all(&output, rule.replacement.as_str()) {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(s) = replaced {
                output = Cow::Owned(s);
            }
        }
        output
    }

    /// Whether a structured field name refers to sensitive data.
    ///
    /// Case-insensitive; `-` and spaces are treated as `_`, and a keyword
    /// anywhere in the name counts (`user_password`, `X-Api-Key`).
    pub fn is_sensitive_field_name(&self, name: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let normalized = normalize_field_name(name);
        self.keywords.iter().any(|k| normalized.contains(k.as_str()))
    }
}

impl Clone for SensitiveDataFilter {
    fn clone(&self) -> Self {
        Self {
            rules: RwLock::new(
                self.rules
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            ),
            keywords: self.keywords.clone(),
        }
    }
}

/// Validate and compile a user-supplied pattern.
pub fn compile_pattern(source: &str) -> Result<Regex> {
    if source.is_empty() {
        return Err(FilterError::EmptyPattern);
    }
    if source.len() > MAX_PATTERN_LENGTH {
        return Err(FilterError::PatternTooLong {
            len: source.len(),
            limit: MAX_PATTERN_LENGTH,
        });
    }

    RegexBuilder::new(source)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| FilterError::InvalidPattern {
            pattern: source.to_string(),
            source: e,
        })
}

fn normalize_field_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
