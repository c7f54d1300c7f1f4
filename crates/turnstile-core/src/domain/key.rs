//! Rate limit key generation.

use std::fmt;

/// Placeholder for request attributes the caller did not supply.
pub const UNKNOWN: &str = "unknown";

/// Request attributes a key can be built from.
///
/// Framework-agnostic: the HTTP layer fills this in from the incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub token: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn part(&self, part: KeyPart) -> &str {
        let value = match part {
            KeyPart::Ip => &self.ip,
            KeyPart::Email => &self.email,
            KeyPart::UserId => &self.user_id,
            KeyPart::Token => &self.token,
        };

        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN)
    }
}

/// Derives the bucket identity for a request.
///
/// Key generators are expected to be total: every context yields a key.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, ctx: &RequestContext) -> String;

    /// Whether the generator needs attributes that only the request body carries.
    fn reads_body(&self) -> bool {
        false
    }
}

/// One component of a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPart {
    Ip,
    Email,
    UserId,
    Token,
}

impl KeyPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPart::Ip => "ip",
            KeyPart::Email => "email",
            KeyPart::UserId => "userId",
            KeyPart::Token => "token",
        }
    }
}

/// A `prefix:part:part` key shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    prefix: Option<&'static str>,
    parts: Vec<KeyPart>,
}

impl KeyTemplate {
    pub fn new(prefix: Option<&'static str>, parts: Vec<KeyPart>) -> Self {
        Self { prefix, parts }
    }

    /// Keyed by caller IP alone. The default for limiters without a purpose prefix.
    pub fn ip() -> Self {
        Self::new(None, vec![KeyPart::Ip])
    }

    pub fn prefixed(prefix: &'static str, parts: &[KeyPart]) -> Self {
        Self::new(Some(prefix), parts.to_vec())
    }
}

/// Renders the shape, e.g. `login:ip:email`.
impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments: Vec<&str> = Vec::with_capacity(self.parts.len() + 1);
        segments.extend(self.prefix);
        segments.extend(self.parts.iter().map(KeyPart::as_str));
        write!(f, "{}", segments.join(":"))
    }
}

impl KeyGenerator for KeyTemplate {
    fn generate(&self, ctx: &RequestContext) -> String {
        let mut segments: Vec<&str> = Vec::with_capacity(self.parts.len() + 1);
        segments.extend(self.prefix);
        segments.extend(self.parts.iter().map(|part| ctx.part(*part)));
        segments.join(":")
    }

    fn reads_body(&self) -> bool {
        self.parts.contains(&KeyPart::Email)
    }
}

/// Adapts a closure into a [`KeyGenerator`].
pub struct FnKeyGenerator<F> {
    f: F,
    reads_body: bool,
}

impl<F> FnKeyGenerator<F>
where
    F: Fn(&RequestContext) -> String + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            reads_body: false,
        }
    }

    /// Mark the closure as depending on body attributes (email).
    pub fn reading_body(mut self) -> Self {
        self.reads_body = true;
        self
    }
}

impl<F> KeyGenerator for FnKeyGenerator<F>
where
    F: Fn(&RequestContext) -> String + Send + Sync,
{
    fn generate(&self, ctx: &RequestContext) -> String {
        (self.f)(ctx)
    }

    fn reads_body(&self) -> bool {
        self.reads_body
    }
}
