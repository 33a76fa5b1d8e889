//! Device session tests against the scripted transport

use std::sync::Arc;
use std::time::Duration;

use netprov_core::{CommandSet, ConnectionError, DeviceProfile, Dialect, NetworkError};

use crate::scripted::{JournalEntry, ScriptedConnector, ScriptedFailure};
use crate::session::{extract_stanza, DeviceSession, SessionOptions, ShowOutput};

const IOS_VERSION: &str = "Cisco IOS Software, Linux Software (I86BI_LINUX-ADVENTERPRISEK9-M), Version 15.5(2)T";
const NEXUS_VERSION: &str = "Cisco Nexus Operating System (NX-OS) Software\nTAC support: http://www.cisco.com/tac";

fn profile() -> DeviceProfile {
    DeviceProfile::new("192.168.100.1", 22, "admin", "secret")
}

async fn ios_session(connector: &ScriptedConnector) -> DeviceSession {
    connector.respond("show version", IOS_VERSION);
    DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_default_dialect_when_no_signature() {
    let connector = ScriptedConnector::new();
    let session = ios_session(&connector).await;

    assert_eq!(session.dialect(), Dialect::CiscoIos);
    assert_eq!(connector.journal().connects(), vec![Dialect::CiscoIos]);
    assert_eq!(connector.journal().commands(), vec!["show version".to_string()]);
}

#[tokio::test]
async fn test_nexus_signature_reconnects_once() {
    let connector = ScriptedConnector::new();
    connector.respond("show version", NEXUS_VERSION);

    let session = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .unwrap();

    assert_eq!(session.dialect(), Dialect::CiscoNxos);
    let journal = connector.journal();
    assert_eq!(
        journal.connects(),
        vec![Dialect::CiscoIos, Dialect::CiscoNxos]
    );
    assert_eq!(
        journal.entries(),
        vec![
            JournalEntry::Connect(Dialect::CiscoIos),
            JournalEntry::Command("show version".to_string()),
            JournalEntry::Disconnect,
            JournalEntry::Connect(Dialect::CiscoNxos),
        ]
    );
}

#[tokio::test]
async fn test_timeout_falls_back_to_telnet() {
    let connector = ScriptedConnector::new();
    connector.fail_dialect(Dialect::CiscoIos, ScriptedFailure::Timeout);

    let session = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .unwrap();

    assert_eq!(session.dialect(), Dialect::CiscoIosTelnet);
    assert_eq!(session.profile().port, 23);
    assert_eq!(
        connector.journal().connects(),
        vec![Dialect::CiscoIos, Dialect::CiscoIosTelnet]
    );
}

#[tokio::test]
async fn test_fallback_keeps_custom_port() {
    let connector = ScriptedConnector::new();
    connector.fail_dialect(Dialect::CiscoIos, ScriptedFailure::Timeout);

    let mut custom = profile();
    custom.port = 2222;
    let session = DeviceSession::connect(Arc::new(connector.clone()), custom)
        .await
        .unwrap();
    assert_eq!(session.profile().port, 2222);
}

#[tokio::test]
async fn test_fallback_is_attempted_only_once() {
    let connector = ScriptedConnector::new();
    connector
        .fail_dialect(Dialect::CiscoIos, ScriptedFailure::Timeout)
        .fail_dialect(Dialect::CiscoIosTelnet, ScriptedFailure::Timeout);

    let err = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ConnectionError::Timeout { .. }));
    assert_eq!(connector.journal().connects().len(), 2);
}

#[tokio::test]
async fn test_authentication_failure_is_terminal() {
    let connector = ScriptedConnector::new();
    connector.fail_dialect(Dialect::CiscoIos, ScriptedFailure::Authentication);

    let err = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ConnectionError::Authentication { host } if host == "192.168.100.1"));
    assert_eq!(connector.journal().connects(), vec![Dialect::CiscoIos]);
}

#[tokio::test]
async fn test_refused_connection_falls_back_to_telnet() {
    let connector = ScriptedConnector::new();
    connector.fail_dialect(Dialect::CiscoIos, ScriptedFailure::Refused);

    let session = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .unwrap();

    assert_eq!(session.dialect(), Dialect::CiscoIosTelnet);
    assert_eq!(session.profile().port, 23);
    assert_eq!(
        connector.journal().connects(),
        vec![Dialect::CiscoIos, Dialect::CiscoIosTelnet]
    );
}

#[tokio::test]
async fn test_refused_telnet_fallback_is_reported() {
    let connector = ScriptedConnector::new();
    connector
        .fail_dialect(Dialect::CiscoIos, ScriptedFailure::Refused)
        .fail_dialect(Dialect::CiscoIosTelnet, ScriptedFailure::Refused);

    let err = DeviceSession::connect(Arc::new(connector.clone()), profile())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ConnectionError::Transport { .. }));
    assert_eq!(connector.journal().connects().len(), 2);
}

#[tokio::test]
async fn test_run_config_skips_blank_lines() {
    let connector = ScriptedConnector::new();
    let mut session = ios_session(&connector).await;

    let commands = CommandSet::from_rendered("interface Loopback1\n\nno shutdown\n");
    session.run_config(&commands).await.unwrap();

    assert_eq!(
        connector.journal().config_sets(),
        vec![vec!["interface Loopback1".to_string(), "no shutdown".to_string()]]
    );
}

#[tokio::test]
async fn test_blank_batch_is_not_sent() {
    let connector = ScriptedConnector::new();
    let mut session = ios_session(&connector).await;

    session
        .run_config(&CommandSet::from_rendered("\n  \n"))
        .await
        .unwrap();
    assert!(connector.journal().config_sets().is_empty());
}

#[tokio::test]
async fn test_command_wait_bound() {
    let connector = ScriptedConnector::new();
    connector.respond("show version", IOS_VERSION);
    connector.hang_on("show running-config");

    let options = SessionOptions {
        command_timeout: Duration::from_millis(50),
        connect_timeout: Duration::from_millis(50),
    };
    let mut session = DeviceSession::connect_with(Arc::new(connector.clone()), profile(), options)
        .await
        .unwrap();

    let err = session.full_config(false).await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Connection(ConnectionError::ReadTimeout { ref command, .. })
            if command == "show running-config"
    ));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_structured_show() {
    let connector = ScriptedConnector::new();
    connector.respond(
        "show interfaces",
        "Ethernet0/0 is up, line protocol is up\n  Internet address is 10.0.0.1/24\nLoopback0 is up, line protocol is up\n",
    );
    let mut session = ios_session(&connector).await;

    let rows = session.show_rows("show interfaces").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["ip_address"], "10.0.0.1/24");

    let version = session.run_show("show version", true).await.unwrap();
    assert_eq!(version, ShowOutput::Text(IOS_VERSION.to_string()));
}

#[tokio::test]
async fn test_hostname_from_running_config() {
    let connector = ScriptedConnector::new();
    connector.respond(
        "show running-config",
        "Building configuration...\n\nversion 15.5\nhostname R1-core\n!\ninterface Loopback0\n",
    );
    let mut session = ios_session(&connector).await;

    assert_eq!(session.hostname().await.unwrap().as_deref(), Some("R1-core"));
}

#[tokio::test]
async fn test_interface_config_stanza() {
    let connector = ScriptedConnector::new();
    connector.respond(
        "show running-config interface Loopback5",
        "Building configuration...\n\nCurrent configuration : 85 bytes\n!\ninterface Loopback5\n description test\n ip address 10.1.1.1 255.255.255.255\nend\n",
    );
    let mut session = ios_session(&connector).await;

    let stanza = session.interface_config("Loopback5").await.unwrap();
    assert_eq!(
        stanza,
        "interface Loopback5\n description test\n ip address 10.1.1.1 255.255.255.255"
    );

    let missing = session.interface_config("Loopback99").await.unwrap_err();
    assert!(matches!(missing, NetworkError::NotFound { .. }));
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let connector = ScriptedConnector::new();
    let mut session = ios_session(&connector).await;

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();
    assert!(!session.is_connected());

    let err = session.show_text("show clock").await.unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Connection(ConnectionError::NotConnected)
    ));
    let disconnects = connector
        .journal()
        .entries()
        .into_iter()
        .filter(|entry| *entry == JournalEntry::Disconnect)
        .count();
    assert_eq!(disconnects, 1);
}

#[test]
fn test_extract_stanza_without_interface() {
    assert_eq!(extract_stanza("% Invalid input detected at '^' marker."), None);
}
