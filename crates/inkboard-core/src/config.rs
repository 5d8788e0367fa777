//! Which board to open and where its store lives.

/// Board opened when none is configured.
pub const DEFAULT_BOARD: &str = "main";

/// Store used by the native app when none is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3030/ws";

pub const ENV_SERVER: &str = "INKBOARD_SERVER";
pub const ENV_BOARD: &str = "INKBOARD_BOARD";
pub const ENV_USER: &str = "INKBOARD_USER";

/// Startup configuration of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// WebSocket URL of the store. `None` works offline.
    pub server_url: Option<String>,
    pub board: String,
    /// Name recorded as the author of writes.
    pub user_name: Option<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            board: DEFAULT_BOARD.to_string(),
            user_name: None,
        }
    }
}

impl BoardConfig {
    /// Read `INKBOARD_SERVER`, `INKBOARD_BOARD` and `INKBOARD_USER`.
    ///
    /// `INKBOARD_SERVER=off` (or empty) disables the remote store.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(server) = get(ENV_SERVER) {
            let server = server.trim();
            config.server_url = match server {
                "" | "off" | "none" => None,
                s => Some(normalize_server_url(s)),
            };
        }
        if let Some(board) = get(ENV_BOARD).filter(|b| !b.trim().is_empty()) {
            config.board = board.trim().to_string();
        }
        config.user_name = get(ENV_USER).filter(|u| !u.trim().is_empty());
        config
    }

    /// Parse `?board=..&server=..&user=..`, or the same after `#`.
    ///
    /// The server is left unset when absent so the caller can fall back to the page origin.
    pub fn from_query(query: &str) -> Self {
        let mut config = Self {
            server_url: None,
            ..Self::default()
        };
        config.merge_query(query);
        config
    }

    /// Overwrite fields with the keys present in a query or hash string.
    pub fn merge_query(&mut self, query: &str) {
        let query = query.trim_start_matches(['?', '#']);
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = percent_decode(value);
            if value.is_empty() {
                continue;
            }
            match key {
                // `room` is accepted for links shared from older clients.
                "board" | "room" => self.board = value,
                "server" => self.server_url = Some(normalize_server_url(&value)),
                "user" => self.user_name = Some(value),
                _ => {}
            }
        }
    }
}

/// Turn `host:port` into `ws://host:port/ws`. `ws://`/`wss://` URLs get `/ws` appended when missing.
pub fn normalize_server_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    let with_scheme = if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", server)
    };

    if with_scheme.ends_with("/ws") {
        with_scheme
    } else {
        format!("{}/ws", with_scheme)
    }
}

/// Decode `%XX` escapes and `+`. Malformed escapes are kept as-is.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()));
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
