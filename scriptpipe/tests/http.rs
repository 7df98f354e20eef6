use reqwest::blocking::Client;
use scriptpipe::{echo, get, Pipe, PipeError};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

/// Answer a single request with `status` and `body`, or echo the request
/// body back when `body` is `None`. Joins to the request body received.
fn serve_once(status: &'static str, body: Option<&'static str>) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/resource", listener.local_addr().unwrap());

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut content_length = 0;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let response_body = body.map_or_else(|| request_body.clone(), |b| b.as_bytes().to_vec());
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            response_body.len()
        )
        .unwrap();
        stream.write_all(&response_body).unwrap();
        stream.flush().unwrap();
        request_body
    });

    (url, server)
}

fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

#[test]
fn test_get() {
    let (url, server) = serve_once("200 OK", Some("hello body"));

    let body = Pipe::new()
        .with_http_client(client())
        .get(url.as_str())
        .string()
        .unwrap();

    assert_eq!(body, "hello body");
    server.join().unwrap();
}

#[test]
fn test_not_found_keeps_body() {
    let (url, server) = serve_once("404 Not Found", Some("no such thing"));

    let (body, err) = Pipe::new()
        .with_http_client(client())
        .get(url.as_str())
        .drain();

    assert_eq!(body, b"no such thing");
    let err = err.unwrap();
    assert!(matches!(err, PipeError::HttpStatus { .. }), "{err:?}");
    assert!(err.to_string().contains("404"), "{err}");
    server.join().unwrap();
}

#[test]
fn test_not_found_fails_default_consumption() {
    let (url, server) = serve_once("404 Not Found", Some("gone"));

    let err = Pipe::new()
        .with_http_client(client())
        .get(url.as_str())
        .string()
        .unwrap_err();

    assert!(err.to_string().contains("404"), "{err}");
    server.join().unwrap();
}

#[test]
fn test_post_sends_content() {
    let (url, server) = serve_once("200 OK", None);

    let echoed = echo("payload")
        .with_http_client(client())
        .post(url.as_str())
        .string()
        .unwrap();

    assert_eq!(echoed, "payload");
    assert_eq!(server.join().unwrap(), b"payload");
}

#[test]
fn test_do_request() {
    let (url, server) = serve_once("201 Created", Some("made"));
    let http = client();
    let request = http.put(url.as_str()).body("thing").build().unwrap();

    let body = Pipe::new()
        .with_http_client(http)
        .do_request(request)
        .string()
        .unwrap();

    assert_eq!(body, "made");
    assert_eq!(server.join().unwrap(), b"thing");
}

#[test]
fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let err = Pipe::new()
        .with_http_client(client())
        .get(url.as_str())
        .wait()
        .unwrap_err();
    assert!(matches!(err, PipeError::Http(_)), "{err:?}");
}

#[test]
fn test_invalid_url() {
    let err = get("not a url").wait().unwrap_err();
    assert!(matches!(err, PipeError::Http(_)), "{err:?}");
}
