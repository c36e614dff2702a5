use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg("tests/fixtures/demo.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "order,kind,requester,provider,amount,status",
        ))
        // o1 was accepted and its delivery scanned
        .stdout(predicate::str::contains("o1,item,alice,bob,1.5,ongoing"))
        // o2 never got an answer
        .stdout(predicate::str::contains("o2,service,carol,dave,2,pending"));

    Ok(())
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("borrowpal"));
    cmd.arg("tests/fixtures/does_not_exist.csv");
    cmd.assert().failure();
}
