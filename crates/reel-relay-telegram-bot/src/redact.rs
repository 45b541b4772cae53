//! Log redaction for credentials.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;

/// Environment variables whose values are masked verbatim wherever they appear.
pub const SECRET_ENV_VARS: [&str; 5] = [
    "BOT_TOKEN",
    "TELEGRAM_TOKEN",
    "R2_SECRET_ACCESS_KEY",
    "KV_REST_API_TOKEN",
    "WEBHOOK_SECRET",
];

/// Regex patterns for redacting sensitive data
pub struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    assignments: Regex,
    bearer: Regex,
    secret_header: Regex,
    literals: Option<Regex>,
}

impl RedactionPatterns {
    /// Compile the fixed patterns plus one alternation of literal `secrets`.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn new(secrets: &[String]) -> Result<Self, regex::Error> {
        let literals: Vec<String> = secrets
            .iter()
            .filter(|s| s.len() >= 6)
            .map(|s| regex::escape(s))
            .collect();
        let literals = if literals.is_empty() {
            None
        } else {
            Some(Regex::new(&literals.join("|"))?)
        };

        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)")?,
            token_bare: Regex::new(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b")?,
            assignments: Regex::new(
                r"((?:BOT_TOKEN|TELEGRAM_TOKEN|R2_ACCESS_KEY_ID|R2_SECRET_ACCESS_KEY|KV_REST_API_TOKEN|WEBHOOK_SECRET)=)[^\s&]+",
            )?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            secret_header: Regex::new(r"(?i)(x-telegram-bot-api-secret-token:?\s*)[^\s,]+")?,
            literals,
        })
    }

    /// Load literal secrets from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn from_env() -> Result<Self, regex::Error> {
        let secrets: Vec<String> = SECRET_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .collect();
        Self::new(&secrets)
    }

    /// Mask every credential in `input`.
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        if let Some(literals) = &self.literals {
            output = literals.replace_all(&output, "[MASKED]").to_string();
        }
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .assignments
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output = self.bearer.replace_all(&output, "$1[MASKED]").to_string();
        output = self
            .secret_header
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output
    }
}

/// Writer that redacts each chunk before forwarding it.
pub struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `MakeWriter` wrapping every writer in a [`RedactingWriter`].
pub struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    /// Wrap writers produced by `make_inner`.
    pub const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}
