//! The HTTP layer.
//!
//! Everything that talks to the network goes through the [`Transport`] trait
//! so the listing and download logic can be driven by a fake in tests.

use crate::errors::NetworkError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_LENGTH, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Something which can issue a `GET` request.
pub trait Transport {
    /// Send a `GET` request.
    ///
    /// `timeout` bounds connecting and each individual read, so a large body
    /// which keeps arriving is never cut off, but a stalled one is.
    ///
    /// Only failures to get a response at all are errors, a 404 or 500 is
    /// still a successful round trip.
    fn get(&self, url: &str, timeout: Duration) -> Result<Response, NetworkError>;
}

impl<'a, T: Transport + ?Sized> Transport for &'a T {
    fn get(&self, url: &str, timeout: Duration) -> Result<Response, NetworkError> {
        (**self).get(url, timeout)
    }
}

/// A response whose body hasn't been read yet.
pub struct Response {
    pub status: StatusCode,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

impl Response {
    pub fn new<R>(status: StatusCode, content_length: Option<u64>, body: R) -> Response
    where
        R: Read + 'static,
    {
        Response {
            status,
            content_length,
            body: Box::new(body),
        }
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(self, url: &str) -> Result<T, NetworkError> {
        serde_json::from_reader(self.body).map_err(|e| NetworkError {
            url: url.to_string(),
            reason: format!("Unable to deserialize response, {}", e),
        })
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// A [`Transport`] backed by `reqwest`.
///
/// The blocking client applies its timeout to every connect and read, which
/// is what we want, but it's fixed when the client is built. We keep one
/// client per timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    clients: Arc<Mutex<HashMap<Duration, Client>>>,
    agent: String,
}

impl HttpClient {
    pub fn new<S: Into<String>>(agent: S) -> HttpClient {
        HttpClient {
            clients: Arc::new(Mutex::new(HashMap::new())),
            agent: agent.into(),
        }
    }

    fn client(&self, timeout: Duration) -> Result<Client, reqwest::Error> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = clients.get(&timeout) {
            return Ok(client.clone());
        }

        trace!("Creating a client with a {:?} timeout", timeout);
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        clients.insert(timeout, client.clone());

        Ok(client)
    }
}

impl Transport for HttpClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<Response, NetworkError> {
        debug!("Sending request to {:?}", url);

        let agent = HeaderValue::from_str(&self.agent)
            .unwrap_or_else(|_| HeaderValue::from_static("repo-snapshot"));

        let network_error = |e: reqwest::Error| NetworkError {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client(timeout)
            .map_err(network_error)?
            .get(url)
            .header(USER_AGENT, agent)
            .send()
            .map_err(network_error)?;

        let status = response.status();
        debug!("Received response ({})", status);

        if log_enabled!(log::Level::Trace) {
            for line in format!("Response Headers {:#?}", response.headers()).lines() {
                trace!("{}", line);
            }
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(Response::new(status, content_length, response))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A scripted [`Transport`] for tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::io::{self, Cursor};

    #[derive(Debug, Clone)]
    pub enum Reply {
        Status(StatusCode, Vec<u8>),
        /// Serve the body without a `content-length`.
        Unsized(Vec<u8>),
        /// Serve the body, but fail partway through reading it.
        Broken(Vec<u8>),
        Unreachable,
    }

    impl Reply {
        pub fn json(value: serde_json::Value) -> Reply {
            Reply::Status(StatusCode::OK, value.to_string().into_bytes())
        }

        pub fn not_found() -> Reply {
            Reply::Status(StatusCode::NOT_FOUND, br#"{"message":"Not Found"}"#.to_vec())
        }

        pub fn bytes(body: Vec<u8>) -> Reply {
            Reply::Status(StatusCode::OK, body)
        }
    }

    /// Replies with whatever has been queued for a URL and records every
    /// request. Unknown URLs get a 404.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        replies: RefCell<HashMap<String, VecDeque<Reply>>>,
        requests: RefCell<Vec<(String, Duration)>>,
    }

    impl FakeTransport {
        pub fn new() -> FakeTransport {
            FakeTransport::default()
        }

        pub fn on<S: Into<String>>(self, url: S, reply: Reply) -> FakeTransport {
            self.replies
                .borrow_mut()
                .entry(url.into())
                .or_insert_with(VecDeque::new)
                .push_back(reply);
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests
                .borrow()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        /// The timeout used for every request whose URL contains `needle`.
        pub fn timeouts_matching(&self, needle: &str) -> Vec<Duration> {
            self.requests
                .borrow()
                .iter()
                .filter(|(url, _)| url.contains(needle))
                .map(|(_, timeout)| *timeout)
                .collect()
        }

        pub fn requests_matching(&self, needle: &str) -> Vec<String> {
            self.requests()
                .into_iter()
                .filter(|url| url.contains(needle))
                .collect()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, timeout: Duration) -> Result<Response, NetworkError> {
            self.requests.borrow_mut().push((url.to_string(), timeout));

            let reply = {
                let mut replies = self.replies.borrow_mut();
                match replies.get_mut(url) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };

            match reply.unwrap_or_else(Reply::not_found) {
                Reply::Status(status, body) => {
                    let len = body.len() as u64;
                    Ok(Response::new(status, Some(len), Cursor::new(body)))
                }
                Reply::Unsized(body) => Ok(Response::new(StatusCode::OK, None, Cursor::new(body))),
                Reply::Broken(body) => {
                    let len = body.len() as u64 * 2;
                    Ok(Response::new(StatusCode::OK, Some(len), Cursor::new(body).chain(Broken)))
                }
                Reply::Unreachable => Err(NetworkError {
                    url: url.to_string(),
                    reason: String::from("connection refused"),
                }),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
        }
    }
}
