//! End-to-end smoke test for kylix-node.
//!
//! Runs the real binary end to end: keygen, append a transaction, then
//! read it back through both the plain query path and the SPARQL path.
//!
//! Run with:
//!   cargo test -p kylix-node --test smoke

use std::path::Path;
use std::process::Command;

fn run(bin: &str, args: &[&str], cwd: &Path) -> std::process::Output {
    Command::new(bin)
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to spawn kylix-node")
}

fn write_config(dir: &Path) {
    let toml = format!(
        "db_path = \"{}\"\nvalidators_dir = \"{}\"\nnode_id = \"v1\"\n",
        dir.join("dag").display(),
        dir.join("validators").display(),
    );
    std::fs::write(dir.join("kylix.toml"), toml).unwrap();
}

#[test]
fn keygen_add_transaction_query_and_sparql_round_trip() {
    let bin = env!("CARGO_BIN_EXE_kylix-node");
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let identity = dir.path().join("v1.key");

    let keygen = run(
        bin,
        &["--config", "kylix.toml", "keygen", "--id", "v1", "--identity", identity.to_str().unwrap()],
        dir.path(),
    );
    assert!(keygen.status.success(), "{}", String::from_utf8_lossy(&keygen.stderr));

    let add = run(
        bin,
        &[
            "--config", "kylix.toml",
            "add-transaction",
            "--subject", "entity:e1",
            "--predicate", "wasGeneratedBy",
            "--object", "activity:a1",
            "--identity", identity.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(add.status.success(), "{}", String::from_utf8_lossy(&add.stderr));
    let stdout = String::from_utf8_lossy(&add.stdout);
    assert!(stdout.contains("Appended tx0"), "unexpected output: {stdout}");

    let query = run(
        bin,
        &["--config", "kylix.toml", "query", "--subject", "entity:e1"],
        dir.path(),
    );
    assert!(query.status.success());
    let stdout = String::from_utf8_lossy(&query.stdout);
    assert!(stdout.contains("entity:e1"));
    assert!(stdout.contains("wasGeneratedBy"));

    let sparql = run(
        bin,
        &[
            "--config", "kylix.toml",
            "sparql",
            "SELECT ?entity ?activity WHERE { ?entity \"wasGeneratedBy\" ?activity }",
        ],
        dir.path(),
    );
    assert!(sparql.status.success(), "{}", String::from_utf8_lossy(&sparql.stderr));
    let stdout = String::from_utf8_lossy(&sparql.stdout);
    assert!(stdout.contains("entity:e1"));
    assert!(stdout.contains("activity:a1"));
}

#[test]
fn add_transaction_rejects_unknown_validator() {
    let bin = env!("CARGO_BIN_EXE_kylix-node");
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    let identity = dir.path().join("ghost.key");

    std::fs::create_dir_all(dir.path().join("validators")).unwrap();
    let keygen = run(
        bin,
        &["--config", "kylix.toml", "keygen", "--id", "ghost", "--identity", identity.to_str().unwrap()],
        dir.path(),
    );
    assert!(keygen.status.success());
    std::fs::remove_file(dir.path().join("validators").join("ghost.pub")).unwrap();

    let add = run(
        bin,
        &[
            "--config", "kylix.toml",
            "add-transaction",
            "--subject", "entity:e1",
            "--predicate", "wasGeneratedBy",
            "--object", "activity:a1",
            "--validator", "ghost",
            "--identity", identity.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert!(!add.status.success());
}
