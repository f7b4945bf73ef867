use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tffit"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn msd_edges() -> Vec<f64> {
    (0..=23).map(|i| 40.0 + 7.0 * i as f64).collect()
}

fn hist(value: f64) -> serde_json::Value {
    serde_json::json!({
        "values": vec![value; 23],
        "edges": msd_edges(),
        "axis": "msd"
    })
}

/// Flat template store covering every name the assembler looks up.
fn write_templates(dir: &std::path::Path) -> PathBuf {
    let mut map = serde_json::Map::new();
    for ptbin in 0..6 {
        for region in ["pqq", "pcc", "pbb"] {
            map.insert(format!("qcd_{region}_bin{ptbin}"), hist(1000.0));
            map.insert(format!("data_obs_{region}_bin{ptbin}"), hist(1050.0));
            for s in ["zbb", "zcc", "zqq", "wcq", "wqq"] {
                map.insert(format!("{s}_{region}_bin{ptbin}"), hist(8.0));
                map.insert(format!("{s}_{region}_matchedUp_bin{ptbin}"), hist(6.0));
            }
        }
    }
    let path = dir.join("templates.json");
    std::fs::write(&path, serde_json::Value::Object(map).to_string()).unwrap();
    path
}

#[test]
fn build_mc_without_poisson_gives_exact_observations() {
    let dir = tempfile::tempdir().unwrap();
    let templates = write_templates(dir.path());
    let out_dir = dir.path().join("model");

    let out = run(&[
        "build",
        "--mc",
        "-i",
        templates.to_string_lossy().as_ref(),
        "-o",
        out_dir.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let model: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out_dir.join("model.json")).unwrap()).unwrap();
    let channels = model.get("channels").and_then(|v| v.as_array()).unwrap();
    assert_eq!(channels.len(), 18);

    // qcd at 1000 plus five matched vector samples at 6 per bin
    let ch = channels
        .iter()
        .find(|c| c.get("name").and_then(|n| n.as_str()) == Some("ptbin2pcc"))
        .unwrap();
    let obs = ch.get("observation").and_then(|v| v.as_array()).unwrap();
    assert_eq!(obs.len(), 23);
    for v in obs {
        assert!((v.as_f64().unwrap() - 1030.0).abs() < 1e-9);
    }
    assert!(!out_dir.join("deco_transform.json").exists());
}

#[test]
fn build_with_mctf_and_transfer_factors_writes_the_deco() {
    let dir = tempfile::tempdir().unwrap();
    let templates = write_templates(dir.path());
    let out_dir = dir.path().join("model");

    let out = run(&[
        "build",
        "--mc",
        "--mctf",
        "--fit-tf",
        "-i",
        templates.to_string_lossy().as_ref(),
        "-o",
        out_dir.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let model: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out_dir.join("model.json")).unwrap()).unwrap();
    let channels = model.get("channels").and_then(|v| v.as_array()).unwrap();
    let pbb = channels
        .iter()
        .find(|c| c.get("name").and_then(|n| n.as_str()) == Some("ptbin0pbb"))
        .unwrap();
    let qcd = pbb
        .get("samples")
        .and_then(|v| v.as_array())
        .unwrap()
        .iter()
        .find(|s| s.get("name").and_then(|n| n.as_str()) == Some("ptbin0pbb_qcd"))
        .expect("pbb channel should carry a transfer-factor qcd sample");
    assert_eq!(
        qcd.pointer("/source/dependent_on").and_then(|v| v.as_str()),
        Some("ptbin0pqq_qcd")
    );

    let deco: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out_dir.join("deco_transform.json")).unwrap())
            .unwrap();
    let names = deco.get("param_names").and_then(|v| v.as_array()).unwrap();
    assert_eq!(names.len(), 9);
}

#[test]
fn build_requires_a_source_flag() {
    let dir = tempfile::tempdir().unwrap();
    let templates = write_templates(dir.path());
    let out = run(&["build", "-i", templates.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
}
