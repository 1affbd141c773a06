#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn fincent(data_dir: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("fincent")?;
    cmd.env("FINCENT_DATA_DIR", data_dir)
        .env_remove("FINCENT_CONFIG")
        .env_remove("FINCENT_BACKEND")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn json_of(output: &std::process::Output) -> Result<Value> {
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn member_with_pan_shows_up_in_entities_and_pan_status() -> Result<()> {
    let tmp = tempdir()?;

    let added = json_of(
        &fincent(tmp.path())?
            .args([
                "--json", "member", "add", "--name", "Asha", "--relationship", "Self", "--pan",
                "ABCDE1234F", "--dob", "05/03/1988",
            ])
            .output()?,
    )?;
    assert_eq!(added["persisted"], true);
    assert_eq!(added["result"]["panLink"]["action"], "created");
    let member_id = added["result"]["member"]["id"].as_str().unwrap().to_string();

    let entities = json_of(&fincent(tmp.path())?.args(["--json", "entity", "list"]).output()?)?;
    let rows = entities.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["typeLabel"], "Individual");
    assert_eq!(rows[0]["memberCount"], 1);

    let status = fincent(tmp.path())?.arg("pan-status").output()?;
    assert!(status.status.success());
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.contains("ABCDE1234F"));
    assert!(stdout.contains("Submitted"));

    let edited = json_of(
        &fincent(tmp.path())?
            .args(["--json", "member", "edit", &member_id, "--pan", ""])
            .output()?,
    )?;
    assert_eq!(edited["result"]["member"]["dob"], "1988-03-05");
    assert_eq!(edited["result"]["panLink"]["action"], "removed");

    let summary = json_of(&fincent(tmp.path())?.args(["--json", "summary"]).output()?)?;
    assert_eq!(summary["entities"]["total"], 0);
    assert_eq!(summary["family"]["total"], 1);
    assert_eq!(summary["family"]["withPan"], 0);
    Ok(())
}

#[test]
fn validation_failures_exit_with_two() -> Result<()> {
    let tmp = tempdir()?;

    let bad_pan = fincent(tmp.path())?
        .args(["member", "add", "--name", "Asha", "--relationship", "Self", "--pan", "nope"])
        .output()?;
    assert_eq!(bad_pan.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&bad_pan.stderr).contains("Invalid PAN"));

    let added = json_of(
        &fincent(tmp.path())?
            .args(["--json", "member", "add", "--name", "Ravi", "--relationship", "Son"])
            .output()?,
    )?;
    let member_id = added["result"]["member"]["id"].as_str().unwrap().to_string();

    let individual = fincent(tmp.path())?
        .args([
            "entity", "add", "--name", "Ravi", "--type", "individual", "--member", &member_id,
        ])
        .output()?;
    assert_eq!(individual.status.code(), Some(2));

    let unconfirmed = fincent(tmp.path())?
        .args(["member", "delete", &member_id])
        .output()?;
    assert_eq!(unconfirmed.status.code(), Some(2));

    let confirmed = fincent(tmp.path())?
        .args(["member", "delete", &member_id, "--yes"])
        .output()?;
    assert!(confirmed.status.success());

    let missing = fincent(tmp.path())?
        .args(["entity", "members", "no-such-entity"])
        .output()?;
    assert_eq!(missing.status.code(), Some(2));
    Ok(())
}

#[test]
fn entity_members_are_mapped_and_replaced() -> Result<()> {
    let tmp = tempdir()?;
    let mut ids = Vec::new();
    for name in ["Asha", "Ravi"] {
        let added = json_of(
            &fincent(tmp.path())?
                .args(["--json", "member", "add", "--name", name, "--relationship", "Family"])
                .output()?,
        )?;
        ids.push(added["result"]["member"]["id"].as_str().unwrap().to_string());
    }

    let entity = json_of(
        &fincent(tmp.path())?
            .args([
                "--json", "entity", "add", "--name", "Rao HUF", "--type", "huf", "--member",
                &ids[0], "--member", &ids[1],
            ])
            .output()?,
    )?;
    let entity_id = entity["result"]["entity"]["id"].as_str().unwrap().to_string();
    assert_eq!(entity["result"]["mapping"]["memberIds"].as_array().unwrap().len(), 2);

    // Renaming keeps the current selection.
    json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "edit", &entity_id, "--name", "Rao Family HUF"])
            .output()?,
    )?;
    let members = json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "members", &entity_id])
            .output()?,
    )?;
    assert_eq!(members.as_array().unwrap().len(), 2);

    json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "edit", &entity_id, "--member", &ids[1]])
            .output()?,
    )?;
    let members = json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "members", &entity_id])
            .output()?,
    )?;
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "Ravi");
    Ok(())
}

#[test]
fn renaming_an_entity_drops_member_ids_left_dangling() -> Result<()> {
    let tmp = tempdir()?;
    std::fs::write(
        tmp.path().join("entities.json"),
        r#"[{"id":"e1","name":"Rao Family","type":"family"}]"#,
    )?;
    std::fs::write(
        tmp.path().join("familyMembers.json"),
        r#"[{"id":"m1","name":"Asha","relationship":"Self"}]"#,
    )?;
    std::fs::write(
        tmp.path().join("entityMappings.json"),
        r#"[{"id":"map1","entityId":"e1","memberIds":["m1","ghost"]}]"#,
    )?;

    let edited = json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "edit", "e1", "--name", "Rao Family 2"])
            .output()?,
    )?;
    assert_eq!(edited["result"]["entity"]["name"], "Rao Family 2");
    assert_eq!(edited["result"]["mapping"]["memberIds"], serde_json::json!(["m1"]));

    let members = json_of(
        &fincent(tmp.path())?
            .args(["--json", "entity", "members", "e1"])
            .output()?,
    )?;
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["name"], "Asha");
    Ok(())
}
