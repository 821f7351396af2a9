use oasreg_application::DeviceRegistry;
use oasreg_core::AppError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::{DEFAULT_DEVICE_REGISTRY_TIMEOUT, HttpDeviceRegistry, HttpDeviceRegistryConfig};

/// Serves one canned response and returns the raw request it received.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|_| unreachable!());
    let address = listener.local_addr().unwrap_or_else(|_| unreachable!());

    let handle = tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return String::new();
        };

        let mut received = Vec::new();
        let mut buffer = [0_u8; 4096];
        loop {
            let Ok(read) = stream.read(&mut buffer).await else {
                break;
            };
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buffer[..read]);
            let text = String::from_utf8_lossy(&received);
            if let Some((head, rest)) = text.split_once("\r\n\r\n") {
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if rest.len() >= content_length {
                    break;
                }
            }
        }

        let response = format!(
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        String::from_utf8_lossy(&received).into_owned()
    });

    (format!("http://{address}/api/bootup/compare/"), handle)
}

fn registry(endpoint: String) -> HttpDeviceRegistry {
    HttpDeviceRegistry::new(HttpDeviceRegistryConfig {
        endpoint,
        api_key: "registry-key".to_owned(),
        timeout: DEFAULT_DEVICE_REGISTRY_TIMEOUT,
    })
    .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn explicit_false_status_means_not_registered() {
    let (endpoint, server) = serve_once("HTTP/1.1 200 OK", r#"{"status":false}"#).await;

    let registered = registry(endpoint)
        .is_registered("0000000001010101010220", "01")
        .await;
    assert_eq!(registered.ok(), Some(false));

    let request = server.await.unwrap_or_default();
    assert!(request.contains("authorization: Bearer registry-key"));
    assert!(request.contains(r#""deviceId":"01""#));
    assert!(request.contains(r#""dev_id":"0000000001010101010220""#));
}

#[tokio::test]
async fn true_or_missing_status_means_registered() {
    let (endpoint, _server) = serve_once("HTTP/1.1 200 OK", r#"{"status":true}"#).await;
    assert_eq!(
        registry(endpoint).is_registered("dev", "01").await.ok(),
        Some(true)
    );

    let (endpoint, _server) = serve_once("HTTP/1.1 200 OK", r#"{"detail":"ok"}"#).await;
    assert_eq!(
        registry(endpoint).is_registered("dev", "01").await.ok(),
        Some(true)
    );
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let (endpoint, _server) =
        serve_once("HTTP/1.1 503 Service Unavailable", r#"{"detail":"down"}"#).await;
    assert!(matches!(
        registry(endpoint).is_registered("dev", "01").await,
        Err(AppError::Unavailable(_))
    ));
}

#[test]
fn blank_api_key_is_rejected() {
    let created = HttpDeviceRegistry::new(HttpDeviceRegistryConfig {
        endpoint: "http://127.0.0.1:9/".to_owned(),
        api_key: "  ".to_owned(),
        timeout: DEFAULT_DEVICE_REGISTRY_TIMEOUT,
    });
    assert!(matches!(created, Err(AppError::Validation(_))));
}
