mod cli;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use audioseg_core::{
    collate, mix, plan_segments, run_with_progress, CollateConfig, Config, MixConfig,
    ProgressEvent, ProgressReporter, SplitReport, WavEncoding,
};
use clap::ArgMatches;
use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::warn;

use crate::cli::build_cli;

/// Forwards segment completion to a progress bar.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::Start {
                segments,
                total_duration,
            } => {
                self.bar.set_length(segments as u64);
                self.bar
                    .set_message(format!("of {}", HumanDuration(total_duration)));
            }
            ProgressEvent::SegmentStarted { .. } => {}
            ProgressEvent::SegmentFinished { outcome } => {
                if let Err(err) = &outcome.result {
                    self.bar
                        .println(format!("segment {:03} failed: {err}", outcome.plan.index));
                }
                self.bar.inc(1);
            }
            ProgressEvent::Finish { report } => {
                self.bar.set_message(format!(
                    "{} written, {} failed",
                    report.succeeded(),
                    report.failed()
                ));
            }
        }
    }
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> &'a PathBuf {
    matches.get_one::<PathBuf>(id).expect("required argument")
}

fn encoding(matches: &ArgMatches) -> WavEncoding {
    matches
        .get_one::<WavEncoding>("encoding")
        .copied()
        .unwrap_or_default()
}

fn split(matches: &ArgMatches) -> anyhow::Result<()> {
    let input_path = required_path(matches, "file");
    if !input_path.is_file() {
        return Err(anyhow!(
            "input file does not exist: {}",
            input_path.display()
        ));
    }

    let segment_length = match matches.get_one::<Duration>("length") {
        Some(length) => *length,
        None => {
            let minutes = *matches.get_one::<u64>("minutes").expect("defaulted argument");
            let secs = minutes
                .checked_mul(60)
                .ok_or_else(|| anyhow!("segment length of {minutes} minutes is too large"))?;
            Duration::from_secs(secs)
        }
    };
    let overlap = *matches
        .get_one::<Duration>("overlap")
        .expect("defaulted argument");

    let mut builder = Config::builder(input_path, segment_length)
        .overlap(overlap)
        .encoding(encoding(matches))
        .overwrite(matches.get_flag("overwrite"))
        .fail_fast(matches.get_flag("fail-fast"))
        .segment_timeout(matches.get_one::<Duration>("timeout").copied());
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        builder = builder.output_dir(output);
    }
    if let Some(threads) = matches.get_one::<NonZeroUsize>("threads") {
        builder = builder.threads(*threads);
    }

    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for '{}'",
            input_path.display()
        )
    })?;

    if matches.get_flag("dry-run") {
        let plan = plan_segments(&config)
            .with_context(|| format!("failed to plan segments for '{}'", input_path.display()))?;

        println!("Dry run: would generate {} segment(s):", plan.len());
        for segment in plan {
            println!(
                "  {} (start frame {}, {} frames)",
                segment.path.display(),
                segment.plan.start_frame,
                segment.plan.length_frames
            );
        }
        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} segments {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));

    let output_dir = config.output_dir.clone();
    let reporter = BarReporter {
        bar: progress.clone(),
    };
    let result = run_with_progress(config, &reporter)
        .with_context(|| format!("failed to split '{}'", input_path.display()));

    progress.finish_and_clear();
    let report = result?;
    summarize(&report, &output_dir)
}

fn summarize(report: &SplitReport, output_dir: &std::path::Path) -> anyhow::Result<()> {
    println!(
        "Wrote {} of {} segment(s) to {}",
        report.succeeded(),
        report.total(),
        output_dir.display()
    );

    if report.is_success() {
        return Ok(());
    }

    for (outcome, err) in report.failures() {
        warn!("segment {} ({}) failed: {err:?}", outcome.plan.index, outcome.path.display());
        eprintln!("segment {:03}: {err}", outcome.plan.index);
    }
    Err(anyhow!(
        "{} of {} segment(s) failed",
        report.failed(),
        report.total()
    ))
}

fn collate_command(matches: &ArgMatches) -> anyhow::Result<()> {
    let input_dir = required_path(matches, "dir");
    let output_path = required_path(matches, "output");
    if !input_dir.is_dir() {
        return Err(anyhow!(
            "input directory does not exist: {}",
            input_dir.display()
        ));
    }

    let summary = collate(&CollateConfig {
        input_dir: input_dir.clone(),
        output_path: output_path.clone(),
        encoding: encoding(matches),
        overwrite: matches.get_flag("overwrite"),
    })
    .with_context(|| format!("failed to collate '{}'", input_dir.display()))?;

    println!(
        "Collated {} file(s) into {}",
        summary.inputs,
        output_path.display()
    );
    Ok(())
}

fn mix_command(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = required_path(matches, "file");
    let output_path = required_path(matches, "output");
    if !input.is_file() {
        return Err(anyhow!("input file does not exist: {}", input.display()));
    }

    let volume = *matches.get_one::<f64>("vol").expect("defaulted argument");
    mix(&MixConfig {
        input: input.clone(),
        output_path: output_path.clone(),
        volume,
        encoding: encoding(matches),
        overwrite: matches.get_flag("overwrite"),
    })
    .with_context(|| format!("failed to mix '{}'", input.display()))?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = build_cli().get_matches();
    match matches.subcommand() {
        Some(("split", sub)) => split(sub),
        Some(("collate", sub)) => collate_command(sub),
        Some(("mix", sub)) => mix_command(sub),
        _ => unreachable!("subcommand is required"),
    }
}
