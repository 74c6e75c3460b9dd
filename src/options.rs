//! Per-call overrides.

use http::Method;

/// Options for a single [`Client::call_with_options`](crate::Client::call_with_options).
///
/// The HTTP verb decides how the payload travels: `POST` sends it as a JSON
/// body, `GET` encodes its fields into the query string. Only these two verbs
/// are used by the Web API.
///
/// # Examples
///
/// ```
/// use livechat_webapi::CallOptions;
/// use http::Method;
///
/// assert_eq!(CallOptions::default().method, Method::POST);
/// assert_eq!(CallOptions::get().method, Method::GET);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// The HTTP method.
    pub method: Method,
}

impl CallOptions {
    /// Options for a JSON-body call.
    pub fn post() -> Self {
        Self {
            method: Method::POST,
        }
    }

    /// Options for a query-string call.
    pub fn get() -> Self {
        Self {
            method: Method::GET,
        }
    }

    /// Returns `true` if the payload goes into the query string.
    pub fn uses_query(&self) -> bool {
        self.method == Method::GET
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::post()
    }
}
