use super::*;
use shared::{domain::Address, error::ErrorKind, session::SessionStatus};

#[test]
fn parses_commands_and_aliases() {
    assert_eq!("connect".parse::<ShellCommand>(), Ok(ShellCommand::Connect));
    assert_eq!(" INC ".parse::<ShellCommand>(), Ok(ShellCommand::Increment));
    assert_eq!("-".parse::<ShellCommand>(), Ok(ShellCommand::Decrement));
    assert_eq!("exit".parse::<ShellCommand>(), Ok(ShellCommand::Quit));
    assert!("withdraw"
        .parse::<ShellCommand>()
        .expect_err("unknown")
        .contains("withdraw"));
}

#[test]
fn renders_connected_session_with_error_line() {
    let session = Session {
        status: SessionStatus::Connected,
        account: Some(Address::repeat_byte(0x01)),
        count: 4,
        last_error: Some("Failed to increment".into()),
        last_error_kind: Some(ErrorKind::TransactionFailed),
    };

    let rendered = render_session(&session, false);
    assert!(rendered.starts_with("status=connected count=4 account=0x"));
    assert!(rendered.ends_with("\nerror: Failed to increment"));
}

#[test]
fn renders_session_as_json() {
    let rendered = render_session(&Session::default(), true);
    let value: serde_json::Value = serde_json::from_str(&rendered).expect("json");
    assert_eq!(value["status"], "disconnected");
    assert_eq!(value["count"], 0);
}

#[tokio::test]
async fn connect_without_wallet_reports_failure() {
    let controller = WalletSessionController::without_provider();

    let report = dispatch(&controller, ShellCommand::Connect).await;

    assert!(report.failed());
    let session = controller.snapshot().await;
    assert!(render_session(&session, false).contains("No wallet provider detected"));
}

#[tokio::test]
async fn actions_before_connect_are_ignored() {
    let controller = WalletSessionController::without_provider();

    for command in [
        ShellCommand::Increment,
        ShellCommand::Decrement,
        ShellCommand::Reset,
        ShellCommand::Count,
    ] {
        let report = dispatch(&controller, command).await;
        assert_eq!(report.outcome, Some(ActionOutcome::Ignored));
    }
    assert_eq!(
        dispatch(&controller, ShellCommand::Owner).await.note.as_deref(),
        Some("owner: not connected")
    );
}
