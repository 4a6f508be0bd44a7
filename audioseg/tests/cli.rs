use assert_cmd::Command;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Generate a small single-channel WAV file for testing.
///
/// The fixture is a procedurally generated sine tone, which keeps the
/// repository free from committed binary assets while still exercising the
/// audio pipeline end-to-end.
fn write_test_tone<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let total_samples = (u64::from(sample_rate) * duration_ms).div_ceil(1_000);
    let mut writer = WavWriter::create(path, spec)?;
    for n in 0..total_samples {
        let theta = (n as f32 / sample_rate as f32) * 2.0 * std::f32::consts::PI * 440.0;
        writer.write_sample((theta.sin() * 0.5 * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn frames<P: AsRef<Path>>(path: P) -> Result<u32, Box<dyn Error>> {
    Ok(WavReader::open(path)?.duration())
}

fn peak<P: AsRef<Path>>(path: P) -> Result<i32, Box<dyn Error>> {
    let mut reader = WavReader::open(path)?;
    let mut peak = 0i32;
    for sample in reader.samples::<i16>() {
        peak = peak.max(i32::from(sample?).abs());
    }
    Ok(peak)
}

#[test]
fn split_writes_numbered_segments_into_split_dir() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("lecture.wav");
    write_test_tone(&input_path, 8_000, 2_000)?;

    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["split", "--length", "800ms", "--overlap", "100ms", "-f"])
        .arg(&input_path);
    cmd.assert().success();

    let split_dir = input_dir.path().join("split");
    let mut segments: Vec<_> = fs::read_dir(&split_dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    segments.sort();
    assert_eq!(
        segments,
        vec!["001_lecture.wav", "002_lecture.wav", "003_lecture.wav"]
    );
    assert_eq!(frames(split_dir.join("001_lecture.wav"))?, 6_400);
    assert_eq!(frames(split_dir.join("003_lecture.wav"))?, 4_000);

    input_dir.close()?;
    Ok(())
}

#[test]
fn split_reports_missing_input_file() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["split", "-m", "5", "-f", "missing.wav"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("input file does not exist"));
    Ok(())
}

#[test]
fn split_rejects_minutes_that_overflow() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("tone.wav");
    write_test_tone(&input_path, 8_000, 500)?;

    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["split", "-m", "307445734561825861", "-f"])
        .arg(&input_path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is too large"))
        .stderr(predicate::str::contains("panicked").not());
    assert!(!input_dir.path().join("split").exists());

    input_dir.close()?;
    Ok(())
}

#[test]
fn split_rejects_overlap_longer_than_segment() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("tone.wav");
    write_test_tone(&input_path, 8_000, 500)?;

    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["split", "--length", "2s", "--overlap", "2s", "-f"])
        .arg(&input_path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to create configuration"));
    assert!(!input_dir.path().join("split").exists());

    input_dir.close()?;
    Ok(())
}

#[test]
fn split_dry_run_prints_plan_without_creating_files() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("input.wav");
    write_test_tone(&input_path, 8_000, 2_000)?;

    let output_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("audioseg")?;
    let assert = cmd
        .args(["split", "--length", "800ms", "--overlap", "100ms", "--dry-run"])
        .arg("--output")
        .arg(output_dir.path())
        .arg("-f")
        .arg(&input_path)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("Dry run: would generate 3 segment(s):"));
    for (index, start) in [(1, 0), (2, 5_600), (3, 12_000)] {
        let path = output_dir.path().join(format!("{index:03}_input.wav"));
        let needle = format!("  {} (start frame {start}, 6400 frames)", path.display());
        assert!(
            stdout.contains(&needle),
            "missing dry-run entry for {needle}"
        );
    }

    assert!(fs::read_dir(output_dir.path())?.next().is_none());

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn split_exits_non_zero_when_a_segment_conflicts() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let input_path = input_dir.path().join("tone.wav");
    write_test_tone(&input_path, 8_000, 2_000)?;

    let output_dir = tempdir()?;
    fs::write(output_dir.path().join("002_tone.wav"), b"")?;

    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["split", "--length", "800ms", "--overlap", "100ms", "-o"])
        .arg(output_dir.path())
        .arg("-f")
        .arg(&input_path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("1 of 3 segment(s) failed"))
        .stderr(predicate::str::contains("segment 002"));

    assert!(output_dir.path().join("001_tone.wav").exists());
    assert!(output_dir.path().join("003_tone.wav").exists());

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn collate_joins_directory_contents() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    write_test_tone(input_dir.path().join("001_a.wav"), 8_000, 300)?;
    write_test_tone(input_dir.path().join("002_a.wav"), 8_000, 200)?;

    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("joined.wav");
    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["collate", "-d"])
        .arg(input_dir.path())
        .arg("-o")
        .arg(&output_path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Collated 2 file(s)"));

    assert_eq!(frames(&output_path)?, 4_000);

    output_dir.close()?;
    input_dir.close()?;
    Ok(())
}

#[test]
fn mix_scales_volume() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input_path = dir.path().join("tone.wav");
    write_test_tone(&input_path, 8_000, 250)?;
    let output_path = dir.path().join("quiet.wav");

    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.args(["mix", "--vol", "-1", "-f"])
        .arg(&input_path)
        .arg("-o")
        .arg(&output_path);
    cmd.assert().success();

    let before = peak(&input_path)?;
    let after = peak(&output_path)?;
    assert!((after - before / 2).abs() <= 1, "{before} -> {after}");
    assert_eq!(frames(&output_path)?, frames(&input_path)?);

    dir.close()?;
    Ok(())
}

#[test]
fn requires_a_subcommand() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("audioseg")?;
    cmd.assert().failure();
    Ok(())
}
