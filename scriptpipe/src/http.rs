//! HTTP requests as pipe stages.
//!
//! The response body always becomes the stage output. A transport failure or
//! a status outside 2xx is recorded on the Pipe after the body has been
//! delivered, so [`Pipe::drain`] can still inspect error bodies.

use std::io::{self, Read};

use reqwest::blocking::{Client, Request};
use reqwest::IntoUrl;
use tracing::debug;

use crate::error::PipeError;
use crate::pipe::Pipe;

/// Response body of a GET request to `url`.
#[must_use]
pub fn get(url: impl IntoUrl) -> Pipe {
    Pipe::new().get(url)
}

/// Response body of an empty POST request to `url`.
#[must_use]
pub fn post(url: impl IntoUrl) -> Pipe {
    Pipe::new().post(url)
}

/// Response body of `request`.
#[must_use]
pub fn do_request(request: Request) -> Pipe {
    Pipe::new().do_request(request)
}

impl Pipe {
    /// GET `url`; this Pipe's content is ignored.
    #[must_use]
    pub fn get(self, url: impl IntoUrl) -> Pipe {
        let url = url.into_url();
        self.send_with(move |client, _| Ok(client.get(url?).build()?))
    }

    /// POST this Pipe's content to `url`.
    #[must_use]
    pub fn post(self, url: impl IntoUrl) -> Pipe {
        let url = url.into_url();
        self.send_with(move |client, input| {
            let mut body = Vec::new();
            input.read_to_end(&mut body)?;
            Ok(client.post(url?).body(body).build()?)
        })
    }

    /// Send a fully formed `request`; this Pipe's content is ignored.
    #[must_use]
    pub fn do_request(self, request: Request) -> Pipe {
        self.send_with(move |_, _| Ok(request))
    }

    fn send_with<F>(self, build: F) -> Pipe
    where
        F: FnOnce(&Client, &mut (dyn Read + Send)) -> Result<Request, PipeError> + Send + 'static,
    {
        let client = self.http_client.clone();
        self.filter(move |r, w| {
            let client = match client {
                Some(client) => client,
                None => Client::builder().build()?,
            };
            let request = build(&client, r)?;
            let method = request.method().clone();
            let url = request.url().clone();
            let mut response = client.execute(request)?;
            let status = response.status();
            debug!(%method, %url, %status, "http response");
            io::copy(&mut response, w)?;
            if !status.is_success() {
                return Err(PipeError::HttpStatus { status });
            }
            Ok(())
        })
    }
}
