mod duration;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use audioseg_core::WavEncoding;
use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub use duration::{parse_duration, parse_duration_or_zero};

pub const DEFAULT_MINUTES: &str = "5";
pub const DEFAULT_OVERLAP: &str = "3s";

fn parse_encoding(value: &str) -> Result<WavEncoding, String> {
    value.parse()
}

fn encoding_arg() -> Arg {
    Arg::new("encoding")
        .long("encoding")
        .value_name("ENCODING")
        .help("Sample format of the written WAV files (pcm16 or float32)")
        .default_value("pcm16")
        .value_parser(ValueParser::new(parse_encoding))
}

fn overwrite_arg() -> Arg {
    Arg::new("overwrite")
        .long("overwrite")
        .help("Allow overwriting existing output files")
        .action(ArgAction::SetTrue)
}

fn split_command() -> Command {
    Command::new("split")
        .about("Split a recording into overlapping segments")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the input audio file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("minutes")
                .short('m')
                .long("minutes")
                .value_name("MINUTES")
                .help("Length of each segment in minutes")
                .default_value(DEFAULT_MINUTES)
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("length")
                .short('l')
                .long("length")
                .value_name("DURATION")
                .help("Length of each segment as a duration (e.g. 90s, 2m30s); overrides --minutes")
                .conflicts_with("minutes")
                .value_parser(ValueParser::new(parse_duration)),
        )
        .arg(
            Arg::new("overlap")
                .long("overlap")
                .value_name("DURATION")
                .help("Lead-in each segment shares with the previous one")
                .default_value(DEFAULT_OVERLAP)
                .value_parser(ValueParser::new(parse_duration_or_zero)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory for the segments [default: <input dir>/split]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .value_name("N")
                .help("Maximum number of segments processed at once [default: available cores]")
                .value_parser(value_parser!(NonZeroUsize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("Give up on a segment that takes longer than this")
                .value_parser(ValueParser::new(parse_duration)),
        )
        .arg(encoding_arg())
        .arg(overwrite_arg())
        .arg(
            Arg::new("fail-fast")
                .long("fail-fast")
                .help("Cancel the remaining segments after the first failure")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Preview the generated segments without writing files")
                .action(ArgAction::SetTrue),
        )
}

fn collate_command() -> Command {
    Command::new("collate")
        .about("Concatenate every file in a directory into one recording")
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Directory whose files are concatenated in path order")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path of the concatenated file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(encoding_arg())
        .arg(overwrite_arg())
}

fn mix_command() -> Command {
    Command::new("mix")
        .about("Scale the volume of a recording")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the input audio file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path of the adjusted file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("vol")
                .long("vol")
                .value_name("VOLUME")
                .help("Volume change as a power of two (-1 halves, 1 doubles)")
                .default_value("0")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(encoding_arg())
        .arg(overwrite_arg())
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .about("Split recordings into overlapping clips, collate and mix them")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(split_command())
        .subcommand(collate_command())
        .subcommand(mix_command())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn split_defaults() {
        let matches = build_cli()
            .try_get_matches_from(["audioseg", "split", "-f", "talk.mp3"])
            .unwrap();
        let (name, split) = matches.subcommand().unwrap();
        assert_eq!(name, "split");
        assert_eq!(split.get_one::<u64>("minutes"), Some(&5));
        assert_eq!(
            split.get_one::<Duration>("overlap"),
            Some(&Duration::from_secs(3))
        );
        assert_eq!(
            split.get_one::<WavEncoding>("encoding"),
            Some(&WavEncoding::Pcm16)
        );
        assert!(split.get_one::<Duration>("length").is_none());
        assert!(!split.get_flag("dry-run"));
    }

    #[test]
    fn length_conflicts_with_explicit_minutes() {
        let result = build_cli().try_get_matches_from([
            "audioseg", "split", "-f", "a.wav", "-m", "2", "--length", "30s",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn mix_accepts_negative_volume() {
        let matches = build_cli()
            .try_get_matches_from(["audioseg", "mix", "-f", "a.wav", "-o", "b.wav", "--vol", "-1.5"])
            .unwrap();
        let (_, mix) = matches.subcommand().unwrap();
        assert_eq!(mix.get_one::<f64>("vol"), Some(&-1.5));
    }

    #[test]
    fn rejects_unknown_encoding() {
        let result = build_cli().try_get_matches_from([
            "audioseg", "collate", "-d", "in", "-o", "out.wav", "--encoding", "mp3",
        ]);
        assert!(result.is_err());
    }
}
