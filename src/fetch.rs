//! Synchronous download helper for remote image and font assets.

use thiserror::Error;
use tracing::debug;

/// Failure modes of [`download`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, protocol).
    #[error("request for {url} failed: {source}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with something other than `200 OK`.
    #[error("unexpected status {status} for {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The status the server returned.
        status: reqwest::StatusCode,
    },
}

/// Perform a single blocking HTTP GET and return the raw response body.
///
/// The call blocks the invoking thread until the response completes or
/// errors; there is no timeout. Any status other than `200 OK` is an error.
pub fn download(url: &str) -> Result<Vec<u8>, FetchError> {
    debug!(%url, "downloading");

    let response = reqwest::blocking::get(url).map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(FetchError::Status { url: url.to_string(), status });
    }

    let body = response.bytes().map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })?;

    Ok(body.to_vec())
}

/// Serve a single canned HTTP response on a loopback port and return the URL
/// pointing at it.
#[cfg(test)]
pub(crate) fn serve_once(response: &'static [u8]) -> String {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let _ = stream.write_all(response);
        }
    });

    format!("http://{addr}/")
}

/// A loopback URL that refuses connections.
#[cfg(test)]
pub(crate) fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_returns_the_body_bytes() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello");
        assert_eq!(download(&url).unwrap(), b"hello");
    }

    #[test]
    fn non_200_status_is_an_error() {
        let url =
            serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        match download(&url) {
            Err(FetchError::Status { status, .. }) => assert_eq!(status.as_u16(), 404),
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        match download(&refused_url()) {
            Err(FetchError::Transport { .. }) => {},
            other => panic!("expected a transport error, got {other:?}"),
        }
    }
}
