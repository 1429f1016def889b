use onvif_command::{
    ClockOffset, CommandError, ElementExt, HttpTransport, ReqwestTransport, SearchService,
    ServiceEndpoint, TransportError,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const SUMMARY_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:tse="http://www.onvif.org/ver10/search/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema"><env:Body><tse:GetRecordingSummaryResponse><tse:Summary><tt:DataFrom>2024-01-01T00:00:00Z</tt:DataFrom><tt:DataUntil>2024-01-02T00:00:00Z</tt:DataUntil><tt:NumberRecordings>1</tt:NumberRecordings></tse:Summary></tse:GetRecordingSummaryResponse></env:Body></env:Envelope>"#;

/// Reads one HTTP request (headers and Content-Length body) as text.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&buffer).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// Serves a single canned HTTP response and hands back the request it got.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "{}\r\nContent-Type: application/soap+xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{}/onvif/search_service", addr), handle)
}

fn transport(timeout: Duration) -> ReqwestTransport {
    ReqwestTransport::new(timeout, false).unwrap()
}

mod success {
    use super::*;

    #[tokio::test]
    async fn posts_envelope_with_action_and_returns_reply() {
        let (xaddr, server) = serve_once("HTTP/1.1 200 OK", SUMMARY_REPLY).await;
        let service = SearchService::new(
            ServiceEndpoint::new(xaddr, None),
            ClockOffset::zero(),
            transport(Duration::from_secs(5)),
        );

        let response = service.get_recording_summary().await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /onvif/search_service HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains(
            r#"content-type: application/soap+xml; charset=utf-8; action="http://www.onvif.org/ver10/search/wsdl/getrecordingsummary""#
        ));
        assert!(request.contains("<tse:GetRecordingSummary/>"));
        assert_eq!(response.status(), 200);
        assert_eq!(response.raw(), SUMMARY_REPLY);
        assert_eq!(
            response.data().local_name(),
            "GetRecordingSummaryResponse"
        );
    }

    #[tokio::test]
    async fn error_status_is_still_a_reply() {
        let (xaddr, server) = serve_once("HTTP/1.1 500 Internal Server Error", "oops").await;
        let reply = transport(Duration::from_secs(5))
            .send(&xaddr, &[], "<x/>")
            .await
            .unwrap();
        server.await.unwrap();
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, "oops");
    }
}

mod failure {
    use super::*;

    #[tokio::test]
    async fn closed_port_is_a_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service = SearchService::new(
            ServiceEndpoint::new(format!("http://{}/onvif/search_service", addr), None),
            ClockOffset::zero(),
            transport(Duration::from_secs(5)),
        );
        let err = service.get_recording_summary().await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Transport(TransportError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let service = SearchService::new(
            ServiceEndpoint::new(format!("http://{}/onvif/search_service", addr), None),
            ClockOffset::zero(),
            transport(Duration::from_millis(200)),
        );
        let err = service.get_recording_summary().await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Transport(TransportError::Timeout { .. })
        ));
        server.abort();
    }

    #[tokio::test]
    async fn html_error_page_is_not_a_fault() {
        let (xaddr, server) =
            serve_once("HTTP/1.1 404 Not Found", "<html><body>Not Found</body></html>").await;
        let service = SearchService::new(
            ServiceEndpoint::new(xaddr, None),
            ClockOffset::zero(),
            transport(Duration::from_secs(5)),
        );
        let err = service.get_recording_summary().await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(
            err,
            CommandError::Transport(TransportError::HttpStatus { status: 404, .. })
        ));
    }
}
