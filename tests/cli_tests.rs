//! End-to-end tests of the connectome-ksample subcommands
//!
//! Each test builds its inputs in a temporary directory, runs the binary and
//! checks the files it writes.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const N_VERTICES: usize = 6;

const SMALL_SWEEP: &str = r#"
binarize = [false]
average = [true, false]
n_subjects = [5]
iterations = 2
n_vertices = 4
reps = 20
workers = 1
test = "dcorr"

[[distribution]]
name = "equal"
mu_1 = 0.0
sigma_1 = 0.25
mu_2 = 0.0
sigma_2 = 0.25
"#;

/// Planted two-block graph whose weights depend on the subject
fn graph_csv(subject: usize) -> String {
    let mut lines = Vec::with_capacity(N_VERTICES);
    for i in 0..N_VERTICES {
        let row: Vec<String> = (0..N_VERTICES)
            .map(|j| {
                if i == j {
                    "0".to_string()
                } else if (i < 3) == (j < 3) {
                    format!("{}", 8 + (subject + i + j) % 3)
                } else {
                    format!("{}", 1 + (subject * (i + j)) % 2)
                }
            })
            .collect();
        lines.push(row.join(","));
    }
    lines.join("\n") + "\n"
}

/// Eight subjects, two genotypes, two blocks of three vertices
fn write_dataset(dir: &Path) {
    fs::create_dir_all(dir.join("graphs")).unwrap();

    let mut participants = String::from("participant_id,genotype\n");
    for subject in 0..8 {
        let id = format!("sub-{:02}", subject);
        let genotype = if subject % 2 == 0 { "B6" } else { "BTBR" };
        participants.push_str(&format!("{},{}\n", id, genotype));
        fs::write(dir.join("graphs").join(format!("{}.csv", id)), graph_csv(subject)).unwrap();
    }
    fs::write(dir.join("participants.csv"), participants).unwrap();

    let mut atlas = String::from("ROI,Structure\n");
    for roi in 1..=N_VERTICES {
        atlas.push_str(&format!("{},structure_{}\n", roi, roi));
    }
    fs::write(dir.join("atlas.csv"), atlas).unwrap();

    fs::write(
        dir.join("blocks.csv"),
        "block,hemisphere,i,j\nfront,left,0,3\nback,left,3,6\n",
    )
    .unwrap();
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("vertex"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn test_simulate_writes_sweep_csv() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sweep.toml");
    let output = tmp.path().join("sweep.csv");
    fs::write(&config, SMALL_SWEEP).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("-q")
        .arg("simulate")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "binarize,average,distribution,sample_size,stat,pvalue");
    // 2 average settings x 2 iterations
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("False,True,equal,10,"));
    assert!(lines[3].starts_with("False,False,equal,10,"));
}

#[test]
fn test_simulate_to_stdout_with_overrides() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sweep.toml");
    fs::write(&config, SMALL_SWEEP).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("-q")
        .arg("simulate")
        .arg("--config")
        .arg(&config)
        .arg("--iterations")
        .arg("1")
        .arg("--n-subjects")
        .arg("4,6")
        .arg("--output")
        .arg("-")
        .assert()
        .success()
        .stdout(predicate::str::contains("equal,8,"))
        .stdout(predicate::str::contains("equal,12,"));
}

#[test]
fn test_simulate_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("sweep.toml");
    fs::write(&config, "iterations = 0\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("simulate")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("iterations"));
}

#[test]
fn test_plot_draws_svg_from_sweep() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("sweep.csv");
    let output = tmp.path().join("figure.svg");
    fs::write(
        &input,
        "binarize,average,distribution,sample_size,stat,pvalue\n\
         True,True,equal,10,0.1,0.5\n\
         True,True,equal,20,0.2,0.01\n\
         False,False,diff_mean,10,0.3,0.02\n\
         False,False,diff_mean,20,nan,1.0\n",
    )
    .unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("plot")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--resamples")
        .arg("50")
        .assert()
        .success();

    let svg = fs::read_to_string(&output).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Same Distribution"));
    assert!(svg.contains("Different Mean"));
}

#[test]
fn test_plot_unknown_distribution_fails() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("sweep.csv");
    fs::write(
        &input,
        "binarize,average,distribution,sample_size,stat,pvalue\nTrue,True,equal,10,0.1,0.5\n",
    )
    .unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("plot")
        .arg(&input)
        .arg("--output")
        .arg(tmp.path().join("figure.svg"))
        .arg("--only")
        .arg("same_mean")
        .assert()
        .failure()
        .stderr(predicate::str::contains("same_mean"));
}

#[test]
fn test_aggregate_writes_one_matrix_per_label() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("dataset");
    let out = tmp.path().join("circos");
    write_dataset(&dataset);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("aggregate")
        .arg(&dataset)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success();

    for label in ["B6", "BTBR"] {
        let text = fs::read_to_string(out.join(format!("{}.csv", label))).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "\tfront_left\tback_left");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("front_left\t"));
    }
}

#[test]
fn test_aggregate_missing_dataset_fails() {
    let tmp = TempDir::new().unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("aggregate")
        .arg(tmp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("participants.csv"));
}

#[test]
fn test_vertex_then_compare_pipeline() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("dataset");
    write_dataset(&dataset);
    let nonpar = tmp.path().join("nonpar.csv");
    let par = tmp.path().join("par.csv");
    let merged = tmp.path().join("merged.csv");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("-q")
        .arg("vertex")
        .arg(&dataset)
        .arg("--output")
        .arg(&nonpar)
        .arg("--n-components")
        .arg("2")
        .arg("--test")
        .arg("dcorr")
        .arg("--reps")
        .arg("20")
        .arg("--workers")
        .arg("1")
        .assert()
        .success();

    let text = fs::read_to_string(&nonpar).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "ROI,stat,pval");
    assert_eq!(lines.len(), N_VERTICES + 1);
    assert!(lines[1].starts_with("0,"));

    let mut parametric = String::from("ROI,pvalue,order.p\n");
    for roi in 1..=N_VERTICES {
        let pvalue = if roi == 2 { 0.0001 } else { 0.5 };
        parametric.push_str(&format!("{},{},{}\n", roi, pvalue, roi));
    }
    fs::write(&par, parametric).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("compare")
        .arg("--nonparametric")
        .arg(&nonpar)
        .arg("--parametric")
        .arg(&par)
        .arg("--atlas")
        .arg(dataset.join("atlas.csv"))
        .arg("--merged")
        .arg(&merged)
        .assert()
        .success()
        .stdout(predicate::str::contains("Parametric MANOVA (1 of 6 ROIs"))
        .stdout(predicate::str::contains("structure_2 (L)"))
        .stdout(predicate::str::contains("Shared significant ROIs"));

    let merged_text = fs::read_to_string(&merged).unwrap();
    assert_eq!(merged_text.lines().count(), N_VERTICES + 1);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("connectome-ksample");
    cmd.arg("compare")
        .arg("--nonparametric")
        .arg(&nonpar)
        .arg("--parametric")
        .arg(&par)
        .arg("--atlas")
        .arg(dataset.join("atlas.csv"))
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"overlap\""))
        .stdout(predicate::str::contains("\"holm_pvalue\""));
}
