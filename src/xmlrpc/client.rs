// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::io::{BufReader, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder as GzReadEncoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::blocking::Body;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH,
                      CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use url::Url;

use crate::config::{ClientConfig, StreamConfig};
use crate::error::{Error, Result};
use crate::xmlrpc::encoding::{encode_request, RequestStream};
use crate::xmlrpc::protocol::{parse_response, Request, Response};
use crate::xmlrpc::registry::TypeRegistry;
use crate::xmlrpc::value::Value;

pub enum RequestBody {
    /// Fully rendered, sent with a `Content-Length`.
    Buffered(Vec<u8>),
    /// Rendered while it is sent.
    Streamed(Box<dyn Read + Send>),
}

pub struct HttpRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

/// One POST round trip.
pub trait Connection {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse>;
}

/// The `reqwest` blocking client.
pub struct HttpConnection {
    client: reqwest::blocking::Client,
}

impl HttpConnection {
    pub fn new(config: &ClientConfig) -> Result<HttpConnection> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = config.connection_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.reply_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpConnection { client: builder.build()? })
    }
}

impl Connection for HttpConnection {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        let body = match request.body {
            RequestBody::Buffered(bytes) => Body::from(bytes),
            RequestBody::Streamed(reader) => Body::new(reader),
        };
        let response = self.client
            .post(request.url)
            .headers(request.headers)
            .body(body)
            .send()?;
        Ok(HttpResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Box::new(response),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Buffered,
    Streamed,
}

impl Framing {
    /// Streaming needs the extensions and a server that does without
    /// `Content-Length`.
    pub fn for_config(config: StreamConfig) -> Framing {
        if config.enabled_for_extensions && config.content_length_optional {
            Framing::Streamed
        } else {
            Framing::Buffered
        }
    }
}

pub struct Client<C: Connection = HttpConnection> {
    config: ClientConfig,
    registry: &'static TypeRegistry,
    connection: C,
}

impl Client<HttpConnection> {
    pub fn new(config: ClientConfig) -> Result<Client<HttpConnection>> {
        let connection = HttpConnection::new(&config)?;
        Ok(Client::with_connection(config, connection))
    }
}

impl<C: Connection> Client<C> {
    pub fn with_connection(config: ClientConfig, connection: C) -> Client<C> {
        Client {
            config: config,
            registry: TypeRegistry::standard(),
            connection: connection,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Calls `method` and returns its result. A fault is returned as
    /// `Error::Fault`.
    pub fn execute(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        match self.call(Request::with_params(method, params))? {
            Response::Success(value) => Ok(value),
            Response::Fault(fault) => Err(Error::Fault(fault)),
        }
    }

    pub fn call(&mut self, request: Request) -> Result<Response> {
        let mut headers = self.headers()?;
        let framing = Framing::for_config(self.config.stream);
        debug!("Send XMLRPC request to: {}", self.config.server_url);
        debug!("Calling {} with {} parameter(s), {:?} framing",
               request.method,
               request.params.len(),
               framing);

        let body = match framing {
            Framing::Buffered => {
                let mut body = encode_request(&request, self.registry, self.config.stream)?;
                trace!("XMLRPC body: {}", String::from_utf8_lossy(&body));
                if self.config.gzip_compressing {
                    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&body)?;
                    body = encoder.finish()?;
                }
                debug!("Content length: {}", body.len());
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                RequestBody::Buffered(body)
            }
            Framing::Streamed => {
                let stream = RequestStream::new(request, self.registry, self.config.stream)?;
                if self.config.gzip_compressing {
                    RequestBody::Streamed(Box::new(GzReadEncoder::new(stream, Compression::default())))
                } else {
                    RequestBody::Streamed(Box::new(stream))
                }
            }
        };

        let response = self.connection.send(HttpRequest {
            url: self.config.server_url.clone(),
            headers: headers,
            body: body,
        })?;

        if !response.status.is_success() {
            warn!("XMLRPC server {} answered {}", self.config.server_url, response.status);
            return Err(Error::Status {
                status: response.status.as_u16(),
                reason: response.status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let gzipped = response.headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.trim().eq_ignore_ascii_case("gzip"));
        let body: Box<dyn Read + Send> = if gzipped {
            trace!("Decompressing gzip response");
            Box::new(GzDecoder::new(response.body))
        } else {
            response.body
        };

        let result = parse_response(BufReader::new(body), self.registry, self.config.stream)?;
        trace!("Response: {:?}", result);
        Ok(result)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        headers.insert(USER_AGENT,
                       HeaderValue::from_str(&self.config.user_agent)
                           .map_err(|e| Error::Config(format!("invalid user agent: {}", e)))?);

        if let Some(ref username) = self.config.basic_username {
            let credentials = format!("{}:{}", username, self.config.basic_password.as_deref().unwrap_or(""));
            let encoded = STANDARD.encode(self.config.basic_encoding.encode(&credentials)?);
            let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
                .map_err(|e| Error::Config(format!("invalid credentials: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if self.config.gzip_compressing {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        if self.config.gzip_requesting {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        }
        Ok(headers)
    }
}
