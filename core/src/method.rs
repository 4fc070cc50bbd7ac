//! Method addressing.
//!
//! Calls name their method either bare (`hello`) or as a gRPC path
//! (`/greeter.Greeter/hello`).

use std::fmt;

/// A parsed method address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodPath<'a> {
    /// Service part of a full path (`greeter.Greeter`), if one was given.
    pub service: Option<&'a str>,
    /// Method name.
    pub method: &'a str,
}

impl<'a> MethodPath<'a> {
    /// Parse a bare method name or a `/package.Service/Method` path.
    ///
    /// ```
    /// use mockrpc::MethodPath;
    ///
    /// let path = MethodPath::parse("/greeter.Greeter/hello");
    /// assert_eq!(path.service, Some("greeter.Greeter"));
    /// assert_eq!(path.method, "hello");
    ///
    /// assert_eq!(MethodPath::parse("hello").service, None);
    /// ```
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        match trimmed.rsplit_once('/') {
            Some((service, method)) => Self {
                service: Some(service),
                method,
            },
            None => Self {
                service: None,
                method: trimmed,
            },
        }
    }
}

impl fmt::Display for MethodPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service {
            Some(service) => write!(f, "/{service}/{}", self.method),
            None => f.write_str(self.method),
        }
    }
}
