use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn estate(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("estate_cli").unwrap();
    cmd.env("ESTATE_CLI_SCRIPT", "1")
        .env("ESTATE_HOME", home)
        .env("ESTATE_DEVICE_ID", "test-device")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn script_mode_runs_leasing_and_ledger_flow() {
    let home = TempDir::new().unwrap();
    let export = home.path().join("rent_roll.csv");
    let input = format!(
        "\
workspace new demo admin@example.com secret123
property add Harbor HV --address \"1 Quay Street\"
unit add HV A1 --rent 1200
tenant add \"Jane Doe\" jane@example.com
lease create HV/A1 jane@example.com 2024-01-01 2024-12-31 1200
voucher create BRV dr:1010:5000 cr:3000:5000 --desc \"Owner contribution\" --date 2024-01-02
lease bill jane@example.com --through 2024-02-01
payment record INV-0001 1200 --date 2024-01-05
report trial-balance
export rent-roll {}
exit
",
        export.display()
    );

    estate(home.path())
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("Workspace `demo` created"))
        .stdout(contains("Voucher BRV-0001 posted."))
        .stdout(contains("2 rent invoice(s) issued"))
        .stdout(contains("recorded against INV-0001"))
        .stdout(contains("Debits equal credits."))
        .stdout(contains("[x]").not());

    let csv = std::fs::read_to_string(&export).unwrap();
    assert!(csv.starts_with("property,unit,tenant,tenant_name"));
    assert!(csv.contains("Jane Doe"));
    assert!(home.path().join("workspaces").join("demo.json").exists());
}

#[test]
fn unknown_commands_get_a_suggestion() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .write_stdin("vouchr list\nexit\n")
        .assert()
        .success()
        .stdout(contains("Unknown command `vouchr`"))
        .stdout(contains("Did you mean `voucher`?"));
}

#[test]
fn ledger_commands_require_a_session() {
    let home = TempDir::new().unwrap();
    estate(home.path())
        .write_stdin("workspace new demo admin@example.com secret123\nlogout\nvoucher list\nexit\n")
        .assert()
        .success()
        .stdout(contains("Not logged in."));
}

#[test]
fn invited_users_only_get_their_role_permissions() {
    let home = TempDir::new().unwrap();
    let output = estate(home.path())
        .write_stdin(
            "workspace new demo admin@example.com secret123
role create Viewer view_reports
invite create Viewer
exit
",
        )
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let url = stdout
        .lines()
        .map(str::trim)
        .find(|line| line.contains("/invite/"))
        .expect("invite url printed")
        .to_string();

    estate(home.path())
        .write_stdin(format!(
            "workspace open demo
invite accept {} Vera vera@example.com secret456
report occupancy
voucher create JV dr:5000:10 cr:3000:10 --desc test
exit
",
            url
        ))
        .assert()
        .success()
        .stdout(contains("Welcome, Vera"))
        .stdout(contains("=== Occupancy ==="))
        .stdout(contains("missing permission `post_vouchers`"));
}
