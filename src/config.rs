use std::time::Duration;

use url::Url;

use crate::error::Error;

pub const DEFAULT_USER_AGENT: &str = concat!("xmlrpc-stream/", env!("CARGO_PKG_VERSION"));

/// Settings shared by the parser and the serializer for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamConfig {
    /// Whether the `ex:` types may be read and written.
    pub enabled_for_extensions: bool,
    /// Whether the peer accepts a request without `Content-Length`.
    pub content_length_optional: bool,
}

/// Character set used for the `user:password` pair of Basic authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasicEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl BasicEncoding {
    pub fn encode(self, text: &str) -> Result<Vec<u8>, Error> {
        match self {
            BasicEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            BasicEncoding::Latin1 => {
                text.chars()
                    .map(|c| {
                        u8::try_from(u32::from(c)).map_err(|_| {
                            Error::Config(format!("character {:?} cannot be encoded as ISO-8859-1", c))
                        })
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub stream: StreamConfig,
    pub user_agent: String,
    pub basic_username: Option<String>,
    pub basic_password: Option<String>,
    pub basic_encoding: BasicEncoding,
    /// Compress request bodies.
    pub gzip_compressing: bool,
    /// Ask the server for compressed responses.
    pub gzip_requesting: bool,
    pub connection_timeout: Option<Duration>,
    pub reply_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(server_url: Url) -> ClientConfig {
        ClientConfig {
            server_url: server_url,
            stream: StreamConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            basic_username: None,
            basic_password: None,
            basic_encoding: BasicEncoding::default(),
            gzip_compressing: false,
            gzip_requesting: false,
            connection_timeout: None,
            reply_timeout: None,
        }
    }

    pub fn parse(server_url: &str) -> Result<ClientConfig, Error> {
        Ok(ClientConfig::new(Url::parse(server_url)?))
    }

    pub fn with_extensions(mut self, enabled: bool) -> ClientConfig {
        self.stream.enabled_for_extensions = enabled;
        self
    }

    pub fn with_content_length_optional(mut self, optional: bool) -> ClientConfig {
        self.stream.content_length_optional = optional;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> ClientConfig {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_basic_auth(mut self, username: &str, password: Option<&str>) -> ClientConfig {
        self.basic_username = Some(username.to_string());
        self.basic_password = password.map(|p| p.to_string());
        self
    }

    pub fn with_basic_encoding(mut self, encoding: BasicEncoding) -> ClientConfig {
        self.basic_encoding = encoding;
        self
    }

    pub fn with_gzip_compressing(mut self, enabled: bool) -> ClientConfig {
        self.gzip_compressing = enabled;
        self
    }

    pub fn with_gzip_requesting(mut self, enabled: bool) -> ClientConfig {
        self.gzip_requesting = enabled;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.reply_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{BasicEncoding, ClientConfig, DEFAULT_USER_AGENT};
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::parse("http://localhost:8080/RPC2").unwrap();
        assert!(!config.stream.enabled_for_extensions);
        assert!(!config.stream.content_length_optional);
        assert_eq!(DEFAULT_USER_AGENT, config.user_agent);
        assert_eq!(None, config.basic_username);
    }

    #[test]
    fn test_invalid_url() {
        match ClientConfig::parse("not a url") {
            Err(Error::Url(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_latin1_encoding() {
        assert_eq!(vec![0x63, 0x61, 0x66, 0xe9], BasicEncoding::Latin1.encode("café").unwrap());
        assert_eq!("café".as_bytes().to_vec(), BasicEncoding::Utf8.encode("café").unwrap());
        assert!(BasicEncoding::Latin1.encode("€").is_err());
    }
}
