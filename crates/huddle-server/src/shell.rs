//! Static UI bootstrap served at `/`.

/// The single-page client. It talks to `/event` and `/api` only.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");
