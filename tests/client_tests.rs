mod common;

use common::*;
use ommaxi::messages::{
    EventAlarmCallProgress, EventDECTSubscriptionMode, GetRFPSummary, PPDevType, PPUserType,
    Subscribe, SubscribeCmd,
};
use ommaxi::{DecodeError, ErrorCode, EventType, OmmError, SessionState, TcpConnector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_login_records_server_identity() {
    let (client, mut server) = connected_client(test_connection_config()).await;
    assert_eq!(client.state(), SessionState::AwaitingAuth);

    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login("omm", "omm", None).await }
    });

    let open = server.expect_request("Open").await;
    assert_eq!(open.attr("username"), Some("omm"));
    assert_eq!(open.attr("password"), Some("omm"));
    assert!(open.attr("seq").is_some());
    // default protocol version and unset flags stay off the wire
    assert_eq!(open.attributes.len(), 3);

    server
        .reply(
            &open,
            r#"<OpenResp ommStbState="None" ommVersion="OpenMobility Manager SIP-DECT 7.1-CK14" axiVersion="171101" protocolVersion="45"><publicKey modulus="b3a1" exponent="010001"/></OpenResp>"#,
        )
        .await;

    let identity = timeout(STEP_TIMEOUT, login).await.unwrap().unwrap().unwrap();
    assert_eq!(identity.omm_version, "OpenMobility Manager SIP-DECT 7.1-CK14");
    assert_eq!(identity.axi_version, "171101");
    assert_eq!(identity.axi_clients, None);
    assert_eq!(identity.public_key.unwrap().exponent, "010001");

    assert!(client.is_authenticated());
    let session = client.session();
    assert_eq!(session.protocol_version, Some(45));
    assert_eq!(session.server.unwrap().axi_clients, None);
}

#[tokio::test]
async fn test_login_flag_uses_its_own_spelling() {
    let (client, mut server) = connected_client(test_connection_config()).await;
    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login("omm", "omm", Some(true)).await }
    });

    let open = server.expect_request("Open").await;
    assert_eq!(open.attr("UserDeviceSyncClient"), Some("true"));
    assert_eq!(open.attr("OMPClient"), None);
    server.reply(&open, OPEN_RESP).await;

    let identity = timeout(STEP_TIMEOUT, login).await.unwrap().unwrap().unwrap();
    assert_eq!(identity.axi_clients, Some(3));
}

#[tokio::test]
async fn test_rejected_login_faults_the_session() {
    let (client, mut server) = connected_client(test_connection_config()).await;
    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login("omm", "wrong", None).await }
    });

    let open = server.expect_request("Open").await;
    server
        .reply(
            &open,
            r#"<OpenResp ommStbState="None" ommVersion="OpenMobility Manager SIP-DECT 7.1-CK14" axiVersion="171101" ommAxiSpecVersion="7.1.1" protocolVersion="45" errCode="EAuth" />"#,
        )
        .await;

    let err = timeout(STEP_TIMEOUT, login).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, OmmError::LoginFailed { code: ErrorCode::EAuth, .. }));
    assert_eq!(err.error_code(), Some(&ErrorCode::EAuth));
    assert_eq!(client.state(), SessionState::Faulted);
    // the transport is released without waiting for close()
    assert_eq!(server.next_document().await, None);

    let err = client.send(&GetRFPSummary).await.unwrap_err();
    assert!(matches!(
        err,
        OmmError::InvalidState {
            state: SessionState::Faulted,
            ..
        }
    ));
    assert!(client.close().await.is_ok());
}

#[tokio::test]
async fn test_operations_before_login_fail_without_io() {
    let client = test_client(test_connection_config());
    let err = client.login("omm", "omm", None).await.unwrap_err();
    assert!(matches!(
        err,
        OmmError::InvalidState {
            operation: "login",
            state: SessionState::Disconnected
        }
    ));

    let (client, mut server) = connected_client(test_connection_config()).await;
    let err = client.rfp_summary().await.unwrap_err();
    assert!(matches!(
        err,
        OmmError::InvalidState {
            operation: "GetRFPSummary",
            state: SessionState::AwaitingAuth
        }
    ));

    client.close().await.unwrap();
    assert_eq!(server.next_document().await, None);
}

#[tokio::test]
async fn test_connect_failure_is_a_transport_fault() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = test_client(test_connection_config());
    let connector = TcpConnector::new("127.0.0.1", port).with_connect_timeout(Duration::from_secs(2));
    let err = client.connect_with(&connector).await.unwrap_err();
    assert!(matches!(err, OmmError::NetworkError(_)));
    assert!(err.is_fatal());
    assert_eq!(client.state(), SessionState::Faulted);
}

#[tokio::test]
async fn test_ping_feeds_rtt_estimate() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;
    assert!(client.rtt().is_none());

    let ping = tokio::spawn({
        let client = client.clone();
        async move { client.ping().await }
    });
    let request = server.expect_request("Ping").await;
    assert!(request.attr("timeStamp").is_some());
    server.reply(&request, r#"<PingResp timeStamp="1500000000"/>"#).await;

    let elapsed = timeout(STEP_TIMEOUT, ping).await.unwrap().unwrap().unwrap();
    let rtt = client.rtt().unwrap();
    assert_eq!(rtt.samples, 1);
    assert_eq!(rtt.last, elapsed);
    assert_eq!(client.session().rtt, Some(rtt.smoothed));
}

#[tokio::test]
async fn test_keepalive_pings_while_authenticated() {
    let config = test_connection_config().with_keepalive(Some(Duration::from_millis(50)));
    let (client, mut server) = logged_in_client(config).await;

    for _ in 0..2 {
        let ping = server.expect_request("Ping").await;
        server.reply(&ping, "<PingResp/>").await;
    }

    timeout(STEP_TIMEOUT, async {
        while client.rtt().map_or(0, |rtt| rtt.samples) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_events_reach_typed_handlers_in_order() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let triggers = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&triggers);
    client.on_event::<EventAlarmCallProgress, _>(move |alarm| {
        seen.lock().unwrap().push(alarm.trigger.clone());
        Ok(())
    });
    let mode_changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&mode_changes);
    client.on_event::<EventDECTSubscriptionMode, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let mut alarms = client.event_stream(EventType::AlarmCallProgress);

    let subscribe = tokio::spawn({
        let client = client.clone();
        async move {
            let request = Subscribe::new(vec![SubscribeCmd::on(EventType::AlarmCallProgress)
                .with_ppn(-1)
                .with_trigger("*")]);
            client.subscribe(&request).await
        }
    });
    let request = server.expect_request("Subscribe").await;
    let command = &request.children[0];
    assert_eq!(command.name, "e");
    assert_eq!(command.attr("ppn"), Some("-1"));
    assert_eq!(command.attr("trigger"), Some("*"));
    server.reply(&request, "<SubscribeResp/>").await;
    timeout(STEP_TIMEOUT, subscribe).await.unwrap().unwrap().unwrap();

    server
        .send(r#"<EventAlarmCallProgress ppn="5" trigger="first" id="1" destAddr="100" state="ringing"/>"#)
        .await;
    server
        .send(r#"<EventRFPSummary nRFPs="1" nConnected="1" DECTactivatedRFPs="1" DECTactiveRFPs="1"/>"#)
        .await;
    server
        .send(r#"<EventAlarmCallProgress ppn="5" trigger="second" id="2" destAddr="100" state="connected"/>"#)
        .await;

    for expected in ["first", "second"] {
        let event = timeout(STEP_TIMEOUT, alarms.recv()).await.unwrap().unwrap();
        let alarm = match event {
            ommaxi::Event::AlarmCallProgress(alarm) => alarm,
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(alarm.trigger, expected);
    }
    assert_eq!(*triggers.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(mode_changes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_delivery() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    client.on_event_kind(EventType::DectSubscriptionMode, |_| panic!("handler bug"));
    let rejected = client.on_event_kind(EventType::DectSubscriptionMode, |_| {
        Err(anyhow::anyhow!("handler refused event"))
    });
    let mut modes = client.event_stream(EventType::DectSubscriptionMode);

    server
        .send(r#"<EventDECTSubscriptionMode mode="Wildcard"/>"#)
        .await;
    let event = timeout(STEP_TIMEOUT, modes.recv()).await.unwrap().unwrap();
    assert_eq!(event.tag(), "EventDECTSubscriptionMode");
    assert!(client.remove_handler(rejected));
    assert!(!client.remove_handler(rejected));

    // an unknown event kind is logged and skipped
    server.send(r#"<EventNotModelled foo="bar"/>"#).await;

    let ping = tokio::spawn({
        let client = client.clone();
        async move { client.ping().await }
    });
    let request = server.expect_request("Ping").await;
    server.reply(&request, "<PingResp/>").await;
    timeout(STEP_TIMEOUT, ping).await.unwrap().unwrap().unwrap();
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_protocol_error_is_per_request() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let delete = tokio::spawn({
        let client = client.clone();
        async move { client.delete_pp_dev(99).await }
    });
    let request = server.expect_request("DeletePPDev").await;
    assert_eq!(request.attr("ppn"), Some("99"));
    server
        .reply(&request, r#"<DeletePPDevResp errCode="ENoEnt" info="no such device"/>"#)
        .await;

    let err = timeout(STEP_TIMEOUT, delete).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(
        err,
        OmmError::ProtocolError { code: ErrorCode::ENoEnt, info: Some(ref info) } if info == "no such device"
    ));
    assert!(!err.is_fatal());
    assert_eq!(client.state(), SessionState::Authenticated);

    let summary = tokio::spawn({
        let client = client.clone();
        async move { client.rfp_summary().await }
    });
    let request = server.expect_request("GetRFPSummary").await;
    server
        .reply(
            &request,
            r#"<GetRFPSummaryResp nRFPs="3" idFirst="0" nConnected="2" DECTactivatedRFPs="3" DECTactiveRFPs="2"/>"#,
        )
        .await;
    let summary = timeout(STEP_TIMEOUT, summary).await.unwrap().unwrap().unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.connected, 2);
    assert_eq!(summary.wrong_branded, None);
}

#[tokio::test]
async fn test_user_and_device_records() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let create = tokio::spawn({
        let client = client.clone();
        async move {
            let user = PPUserType {
                name: Some("Alice".to_string()),
                num: Some("4711".to_string()),
                ..PPUserType::default()
            };
            client.create_pp_user(user).await
        }
    });
    let request = server.expect_request("CreatePPUser").await;
    assert_eq!(request.children[0].attr("name"), Some("Alice"));
    assert_eq!(request.children[0].attr("permanent"), None);
    server
        .reply(
            &request,
            r#"<CreatePPUserResp><user uid="25" name="Alice" num="4711" permanent="1"/></CreatePPUserResp>"#,
        )
        .await;
    let user = timeout(STEP_TIMEOUT, create).await.unwrap().unwrap().unwrap();
    assert_eq!(user.uid, 25);
    assert_eq!(user.permanent, Some(true));

    let set = tokio::spawn({
        let client = client.clone();
        async move {
            let device = PPDevType {
                uid: Some(25),
                encrypt: Some(true),
                ..PPDevType::new(7)
            };
            let user = PPUserType {
                ppn: Some(7),
                ..PPUserType::new(25)
            };
            client.set_pp(Some(device), Some(user)).await
        }
    });
    let request = server.expect_request("SetPP").await;
    let children: Vec<_> = request.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(children, vec!["pp", "user"]);
    assert_eq!(request.children[0].attr("encrypt"), Some("true"));
    server
        .reply(
            &request,
            r#"<SetPPResp><pp ppn="7" uid="25" encrypt="1"/><user uid="25" ppn="7"/></SetPPResp>"#,
        )
        .await;
    let resp = timeout(STEP_TIMEOUT, set).await.unwrap().unwrap().unwrap();
    assert_eq!(resp.pp.unwrap().encrypt, Some(true));
    assert_eq!(resp.user.unwrap().ppn, Some(7));

    let lookup = tokio::spawn({
        let client = client.clone();
        async move { client.pp_user(26).await }
    });
    let request = server.expect_request("GetPPUser").await;
    assert_eq!(request.attr("uid"), Some("26"));
    assert_eq!(request.attr("maxRecords"), Some("1"));
    // the controller answers with the next record when the uid is free
    server
        .reply(&request, r#"<GetPPUserResp><user uid="30"/></GetPPUserResp>"#)
        .await;
    assert_eq!(timeout(STEP_TIMEOUT, lookup).await.unwrap().unwrap().unwrap(), None);
}

#[tokio::test]
async fn test_upload_file_in_chunks() {
    let config = test_connection_config().with_file_chunk_size(4);
    let (client, mut server) = logged_in_client(config).await;

    let upload = tokio::spawn({
        let client = client.clone();
        async move { client.upload_file(":license", b"0123456789").await }
    });

    let mut offsets = Vec::new();
    for _ in 0..4 {
        let request = server.expect_request("PutFile").await;
        assert_eq!(request.attr("name"), Some(":license"));
        offsets.push(request.attr("offset").unwrap().to_string());
        if offsets.len() == 1 {
            assert_eq!(request.attr("data"), Some("MDEyMw=="));
            assert_eq!(request.attr("eof"), None);
        }
        if offsets.len() == 4 {
            assert_eq!(request.attr("data"), Some(""));
            assert_eq!(request.attr("eof"), Some("true"));
        }
        server.reply(&request, "<PutFileResp/>").await;
    }

    assert_eq!(offsets, vec!["0", "4", "8", "10"]);
    assert_eq!(timeout(STEP_TIMEOUT, upload).await.unwrap().unwrap().unwrap(), 4);
}

const STATISTIC_CONFIG: &str = concat!(
    "<GetRFPStatisticConfigResp>",
    r#"<rfpStatHead numElemPerRec="3" recordSets="3" resolution="week"/>"#,
    r#"<rfpStatName elemId="0" group="Voice channels" name="Only 2 voice channels free"/>"#,
    r#"<rfpStatName elemId="1" group="Voice channels" name="Only 1 voice channels free"/>"#,
    r#"<rfpStatName elemId="2" group="Voice channels" name="No voice channel free"/>"#,
    "</GetRFPStatisticConfigResp>"
);

#[tokio::test]
async fn test_rfp_statistics_are_labelled_and_counted() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let statistics = tokio::spawn({
        let client = client.clone();
        async move { client.rfp_statistics(0, Some(0)).await }
    });
    let request = server.expect_request("GetRFPStatisticConfig").await;
    server.reply(&request, STATISTIC_CONFIG).await;
    let request = server.expect_request("GetRFPStatistic").await;
    assert_eq!(request.attr("id"), Some("0"));
    assert_eq!(request.attr("recordSet"), Some("0"));
    server
        .reply(
            &request,
            r#"<GetRFPStatisticResp><rfpStatData id="0" counter="1,2,3"/><rfpStatData id="1" counter="4,5,6"/></GetRFPStatisticResp>"#,
        )
        .await;

    let statistics = timeout(STEP_TIMEOUT, statistics).await.unwrap().unwrap().unwrap();
    assert_eq!(statistics.head.num_elem_per_rec, 3);
    assert_eq!(statistics.records.len(), 2);
    let (name, values) = statistics.column(1).unwrap();
    assert_eq!(name.name, "Only 1 voice channels free");
    assert_eq!(values, vec![(0, 2), (1, 5)]);
}

#[tokio::test]
async fn test_rfp_statistics_reject_short_records() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let statistics = tokio::spawn({
        let client = client.clone();
        async move { client.rfp_statistics(0, None).await }
    });
    let request = server.expect_request("GetRFPStatisticConfig").await;
    server.reply(&request, STATISTIC_CONFIG).await;
    let request = server.expect_request("GetRFPStatistic").await;
    assert_eq!(request.attr("recordSet"), None);
    server
        .reply(
            &request,
            r#"<GetRFPStatisticResp><rfpStatData id="0" counter="1,2"/></GetRFPStatisticResp>"#,
        )
        .await;

    let err = timeout(STEP_TIMEOUT, statistics).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(
        err,
        OmmError::DecodeError(DecodeError::CountMismatch { expected: 3, found: 2, .. })
    ));
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_close_is_idempotent_and_fails_pending() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.pp_dev_summary().await }
    });
    server.expect_request("GetPPDevSummary").await;

    client.close().await.unwrap();
    let err = timeout(STEP_TIMEOUT, pending).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, OmmError::ConnectionLost(_)));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.pending_requests(), 0);

    client.close().await.unwrap();
    assert_eq!(server.next_document().await, None);

    let err = client.ping().await.unwrap_err();
    assert!(matches!(
        err,
        OmmError::InvalidState {
            state: SessionState::Disconnected,
            ..
        }
    ));
}

#[tokio::test]
async fn test_controller_hang_up_fails_pending_requests() {
    let (client, mut server) = logged_in_client(test_connection_config()).await;

    let pending: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.pp_user_summary().await })
        })
        .collect();
    for _ in 0..3 {
        server.expect_request("GetPPUserSummary").await;
    }
    server.hang_up().await;

    for handle in pending {
        let err = timeout(STEP_TIMEOUT, handle).await.unwrap().unwrap().unwrap_err();
        assert!(matches!(err, OmmError::ConnectionLost(_)), "{:?}", err);
    }
    assert_eq!(client.state(), SessionState::Faulted);
    assert!(client.session().fault.is_some());

    // a faulted client can start over on a new stream
    let (next_side, _far_side) = tokio::io::duplex(1024);
    client.attach(next_side).await.unwrap();
    assert_eq!(client.state(), SessionState::AwaitingAuth);
}
