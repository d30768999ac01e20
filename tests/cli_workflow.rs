mod support;

use predicates::str::contains;
use serde_json::Value;

use support::TestWorkspace;

#[test]
fn list_orders_pending_by_due_date_then_completed() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");

    let milk = ws.add(&["Buy milk", "--category", "Shopping", "--priority", "low"]);
    ws.add(&["Pay rent", "--due", "2030-01-01T00:00:00Z", "--priority", "high"]);
    ws.add(&["Call mom", "--due", "2029-06-01T09:00:00+02:00"]);

    assert_eq!(ws.list_titles(&[]), vec!["Call mom", "Pay rent", "Buy milk"]);
    assert_eq!(
        ws.list_titles(&["--sort", "priority"]),
        vec!["Pay rent", "Call mom", "Buy milk"]
    );

    ws.cmd().args(["done", &milk]).assert().success();
    assert_eq!(ws.list_titles(&["--status", "pending"]), vec!["Call mom", "Pay rent"]);
    assert_eq!(ws.list_titles(&["--status", "completed"]), vec!["Buy milk"]);
    assert_eq!(
        ws.list_titles(&["--sort", "priority"]),
        vec!["Pay rent", "Call mom", "Buy milk"]
    );

    ws.cmd().args(["reopen", &milk]).assert().success();
    assert_eq!(ws.list_titles(&["--status", "pending"]).len(), 3);
    Ok(())
}

#[test]
fn search_and_category_filters() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    ws.add(&["Buy milk", "--category", "Shopping"]);
    ws.add(&["Groceries", "--description", "more MILK", "--category", "Shopping"]);
    ws.add(&["Gym", "--category", "Health"]);

    let mut found = ws.list_titles(&["--search", "milk"]);
    found.sort();
    assert_eq!(found, vec!["Buy milk", "Groceries"]);
    assert_eq!(ws.list_titles(&["--category", "Health"]), vec!["Gym"]);
    assert_eq!(ws.list_titles(&["--category", "All"]).len(), 3);
    assert!(ws.list_titles(&["--category", "health"]).is_empty());
    Ok(())
}

#[test]
fn stats_edit_and_remove() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    let first = ws.add(&["First"]);
    let second = ws.add(&["Second", "--due", "2030-01-01T00:00:00Z"]);
    ws.cmd().args(["done", &first]).assert().success();

    let stats = ws.json(&["stats"]);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["pending"], 1);

    let edited = ws.json(&["edit", &second, "--title", "Second, renamed", "--clear-due"]);
    assert_eq!(edited["fields"], serde_json::json!(["title", "dueAt"]));
    let tasks = ws.json(&["list"])["tasks"].clone();
    let renamed = tasks
        .as_array()
        .expect("tasks")
        .iter()
        .find(|task| task["id"] == second.as_str())
        .expect("renamed task")
        .clone();
    assert_eq!(renamed["title"], "Second, renamed");
    assert_eq!(renamed["dueAt"], Value::Null);

    ws.cmd()
        .args(["edit", &second])
        .assert()
        .code(2)
        .stderr(contains("nothing to change"));
    ws.cmd()
        .args(["edit", &second, "--title", "  "])
        .assert()
        .code(2);

    ws.cmd().args(["rm", &first]).assert().success();
    assert_eq!(ws.list_titles(&[]), vec!["Second, renamed"]);
    Ok(())
}

#[test]
fn missing_task_is_an_operation_failure() {
    let ws = TestWorkspace::new("alice");
    ws.add(&["Only"]);
    ws.cmd()
        .args(["done", "no-such-task"])
        .assert()
        .code(4)
        .stderr(contains("not found"));
    ws.cmd().args(["rm", "no-such-task"]).assert().success();
}

#[test]
fn owners_only_see_their_own_tasks() {
    let ws = TestWorkspace::new("alice");
    ws.add(&["Alice's task"]);

    let output = ws
        .cmd_as("bob")
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(value["data"]["total"], 0);
}

#[test]
fn category_colors_are_frozen_at_write_time() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    let garden = ws.json(&["category", "add", "Garden", "--color", "#00ff00"])["id"]
        .as_str()
        .expect("category id")
        .to_string();
    ws.json(&["category", "add", "Work", "--color", "#000000"]);

    ws.add(&["Weed beds", "--category", "Garden"]);
    ws.add(&["Report", "--category", "Work"]);
    ws.add(&["Mystery", "--category", "Nowhere"]);

    ws.cmd()
        .args(["category", "edit", &garden, "--color", "#111111"])
        .assert()
        .success();

    let tasks = ws.json(&["list"])["tasks"].clone();
    let color_of = |title: &str| {
        tasks
            .as_array()
            .expect("tasks")
            .iter()
            .find(|task| task["title"] == title)
            .map(|task| task["categoryColor"].clone())
            .expect("task")
    };
    assert_eq!(color_of("Weed beds"), "#00ff00");
    assert_eq!(color_of("Report"), "#a855f7");
    assert_eq!(color_of("Mystery"), "#ccc");

    let categories = ws.json(&["category", "ls"]);
    assert_eq!(categories["total"], 8);
    assert_eq!(categories["categories"][0]["name"], "Personal");
    assert_eq!(categories["categories"][0]["builtin"], true);
    Ok(())
}

#[test]
fn export_then_import_into_another_account() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    ws.add(&["One", "--priority", "high"]);
    ws.add(&["Two", "--category", "Study"]);

    let exported = ws.json(&["export", "backup.json"]);
    assert_eq!(exported["tasks"], 2);

    let imported = ws
        .cmd_as("bob")
        .args(["import", "backup.json", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let imported: Value = serde_json::from_slice(&imported)?;
    assert_eq!(imported["data"]["tasks"], 2);

    let listed = ws
        .cmd_as("bob")
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed: Value = serde_json::from_slice(&listed)?;
    let tasks = listed["data"]["tasks"].as_array().expect("tasks").clone();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|task| task["ownerId"] == "bob"));
    Ok(())
}

#[test]
fn import_rejects_invalid_backup_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    ws.write_file("bad.json", r#"{"title": "not an array"}"#)?;
    ws.write_file("partial.json", r#"[{"title": "fine"}, {"description": "no title"}]"#)?;

    for file in ["bad.json", "partial.json"] {
        ws.cmd()
            .args(["import", file])
            .assert()
            .code(2)
            .stderr(contains("invalid backup file"));
    }
    assert!(ws.list_titles(&[]).is_empty());
    Ok(())
}

#[test]
fn events_are_appended_as_jsonl() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    let id = ws.add(&["Tracked", "--events", "events.jsonl"]);
    ws.cmd()
        .args(["done", &id, "--events", "events.jsonl"])
        .assert()
        .success();

    let content = std::fs::read_to_string(ws.path().join("events.jsonl"))?;
    let events: Vec<Value> = content
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "task_created");
    assert_eq!(events[0]["owner"], "alice");
    assert_eq!(events[1]["event"], "task_completed");
    assert_eq!(events[1]["data"]["id"], id.as_str());
    Ok(())
}

#[test]
fn init_writes_config_with_default_owner() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new("alice");
    ws.cmd().arg("init").assert().success();
    assert!(ws.path().join(".taskmirror.toml").is_file());
    assert!(ws.store_dir().is_dir());

    support::bin()
        .current_dir(ws.path())
        .env_remove("TASKMIRROR_OWNER")
        .args(["add", "From config"])
        .assert()
        .success();
    assert_eq!(ws.list_titles(&[]), vec!["From config"]);
    Ok(())
}
