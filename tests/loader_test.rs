use std::io::{Read as _, Write as _};
use std::net::TcpListener;
use std::time::Duration;

use k8s_template::config::Mode;
use k8s_template::error::Error;
use k8s_template::loader::{Loader, SystemLoader};
use k8s_template::mapping::parse_records;
use k8s_template::renderer::Renderer;
use k8s_template::resolver::MappingResolver;
use tempfile::TempDir;

fn start_http_server_once(status_line: &str, body: &str) -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    let status_line = status_line.to_string();
    let body = body.to_string();

    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(1)));

        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        for _ in 0..64 {
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        let resp = format!(
            "HTTP/1.1 {status_line}\r\n\
Content-Type: text/plain\r\n\
Content-Length: {}\r\n\
Connection: close\r\n\
\r\n\
{body}",
            body.len()
        );
        stream.write_all(resp.as_bytes()).expect("write response");
        let _ = stream.flush();
    });

    format!("http://{addr}/config")
}

#[test]
fn test_fetch_ok() {
    let uri = start_http_server_once("200 OK", "replicas: 3");
    let body = SystemLoader::new().fetch(&uri).unwrap();
    assert_eq!(body, b"replicas: 3");
}

#[test]
fn test_fetch_error_status() {
    let uri = start_http_server_once("404 Not Found", "nope");
    match SystemLoader::new().fetch(&uri) {
        Err(Error::FetchError { reason, .. }) => {
            assert!(reason.contains("404"), "expected status in error, got: {reason}")
        }
        other => panic!("Expected FetchError, got {other:?}"),
    }
}

#[test]
fn test_read_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("value.txt");
    std::fs::write(&path, "from disk").unwrap();

    let loader = SystemLoader::new();
    assert_eq!(loader.read_file(&path).unwrap(), b"from disk");
    assert!(matches!(
        loader.read_file(&temp_dir.path().join("missing")),
        Err(Error::FileReadError { .. })
    ));
    assert_eq!(loader.read_env("K8S_TEMPLATE_SURELY_UNSET_VARIABLE"), None);
}

#[test_log::test]
fn test_resolve_against_system() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cert.pem");
    std::fs::write(&path, "CERT").unwrap();
    let uri = start_http_server_once("200 OK", "remote value");

    let content = format!(
        "- {{name: Cert, value: {:?}, file: true, base64: true}}\n- {{name: Remote, value: {uri:?}, uri: true}}",
        path.display().to_string()
    );
    let loader = SystemLoader::new();
    let renderer = Renderer::new(&loader);
    let records = parse_records(&content).unwrap();
    let resolution = MappingResolver::new(&renderer, Mode::Substitute, 8).resolve(records).unwrap();

    assert_eq!(resolution.mapping["Cert"], "Q0VSVA==");
    assert_eq!(resolution.mapping["Remote"], "remote value");
}
