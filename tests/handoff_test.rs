use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_item_lifecycle_completes() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, o1, alice, bob, item, 50.0, ").unwrap();
    writeln!(file, "accept_booking, o1, bob, , , , ").unwrap();
    writeln!(file, "show, o1, bob, , , , delivery").unwrap();
    writeln!(file, "scan, o1, alice, , , , delivery").unwrap();
    writeln!(file, "scan, o1, alice, , , , return").unwrap();

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("o1,item,alice,bob,50,completed"));
}

#[test]
fn test_service_lifecycle_completes() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, s1, carol, dave, service, 80.0, ").unwrap();
    writeln!(file, "accept_booking, s1, dave, , , , ").unwrap();
    writeln!(file, "scan, s1, carol, , , , start_service").unwrap();
    writeln!(file, "scan, s1, carol, , , , complete_service").unwrap();

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "s1,service,carol,dave,80,completed",
        ));
}

#[test]
fn test_double_scan_is_ignored() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, o1, alice, bob, item, 50.0, ").unwrap();
    writeln!(file, "accept_booking, o1, bob, , , , ").unwrap();
    writeln!(file, "scan, o1, alice, , , , delivery").unwrap();
    writeln!(file, "scan, o1, alice, , , , delivery").unwrap(); // already consumed, skipped

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("o1,item,alice,bob,50,ongoing"));
}

#[test]
fn test_scan_by_wrong_actor_is_ignored() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, o1, alice, bob, item, 50.0, ").unwrap();
    writeln!(file, "accept_booking, o1, bob, , , , ").unwrap();
    writeln!(file, "scan, o1, bob, , , , delivery").unwrap(); // provider shows, never scans

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("o1,item,alice,bob,50,accepted"));
}

#[test]
fn test_overdue_rental_still_completes_on_return() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, o1, alice, bob, item, 50.0, ").unwrap();
    writeln!(file, "accept_booking, o1, bob, , , , ").unwrap();
    writeln!(file, "scan, o1, alice, , , , delivery").unwrap();
    writeln!(file, "overdue, o1, , , , , ").unwrap();
    writeln!(file, "scan, o1, alice, , , , return").unwrap();

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("o1,item,alice,bob,50,completed"));
}

#[test]
fn test_cancel_pending_order() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, order, actor, counterpart, kind, amount, note").unwrap();
    writeln!(file, "book, o1, alice, bob, item, 50.0, ").unwrap();
    writeln!(file, "cancel, o1, alice, , , , ").unwrap();
    writeln!(file, "scan, o1, alice, , , , delivery").unwrap(); // cancelled, skipped

    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("o1,item,alice,bob,50,cancelled"));
}
