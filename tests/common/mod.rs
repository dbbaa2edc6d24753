#![allow(dead_code)]

use ommaxi::core::kernel::{Element, FrameReader};
use ommaxi::{ConnectionConfig, OmmClient, OmmConfig};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

/// Bound for every await in the integration tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub const OPEN_RESP: &str = r#"<OpenResp ommStbState="None" ommVersion="OpenMobility Manager SIP-DECT 7.1-CK14" axiVersion="171101" ommAxiSpecVersion="7.1.1" protocolVersion="45" axiClients="3" />"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Test configuration: no keepalive, short request deadline.
pub fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig::default()
        .with_keepalive(None)
        .with_request_timeout(Duration::from_secs(2))
}

/// Scripted controller at the far end of an in-memory stream.
pub struct FakeOmm {
    frames: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeOmm {
    /// Next document the client wrote, parsed.
    pub async fn next_request(&mut self) -> Element {
        let document = tokio::time::timeout(STEP_TIMEOUT, self.frames.next_document())
            .await
            .expect("client sent nothing")
            .expect("client closed the stream")
            .expect("client sent a malformed document");
        Element::parse(&document).expect("client document does not parse")
    }

    /// Next request, checked against the expected tag.
    pub async fn expect_request(&mut self, tag: &str) -> Element {
        let request = self.next_request().await;
        assert_eq!(request.name, tag, "unexpected request {:?}", request);
        request
    }

    /// Write raw text followed by the document terminator.
    pub async fn send(&mut self, document: &str) {
        self.writer.write_all(document.as_bytes()).await.unwrap();
        self.writer.write_all(&[0]).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Answer `request` with `body`, echoing its sequence id.
    pub async fn reply(&mut self, request: &Element, body: &str) {
        let mut response = Element::parse(body).unwrap();
        if let Some(seq) = request.attr("seq") {
            response.set_attr("seq", seq);
        }
        self.send(&response.to_xml().unwrap()).await;
    }

    /// `None` once the client has closed its side.
    pub async fn next_document(&mut self) -> Option<String> {
        tokio::time::timeout(STEP_TIMEOUT, self.frames.next_document())
            .await
            .expect("client neither wrote nor closed")
            .map(|document| document.unwrap())
    }

    /// Close the controller side of the stream.
    pub async fn hang_up(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

pub fn test_client(connection_config: ConnectionConfig) -> OmmClient {
    let config = OmmConfig::new("omm.test", "omm", "omm".to_string());
    OmmClient::with_connection_config(config, connection_config)
}

pub async fn connected_client(connection_config: ConnectionConfig) -> (OmmClient, FakeOmm) {
    init_tracing();
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let client = test_client(connection_config);
    client.attach(client_side).await.unwrap();

    let (reader, writer) = tokio::io::split(server_side);
    let server = FakeOmm {
        frames: FrameReader::new(reader, 1024 * 1024),
        writer,
    };
    (client, server)
}

pub async fn logged_in_client(connection_config: ConnectionConfig) -> (OmmClient, FakeOmm) {
    let (client, mut server) = connected_client(connection_config).await;

    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login("omm", "omm", None).await }
    });
    let open = server.expect_request("Open").await;
    server.reply(&open, OPEN_RESP).await;
    tokio::time::timeout(STEP_TIMEOUT, login)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    (client, server)
}
