//! Command-line surface (spec.md §6): a single compress/expand command
//! whose `-o` extension selects the writer, plus `-fprec` for forced
//! output precision, alignment mode, and float re-interpretation.
use std::ffi::OsString;

use clap::{Arg, ArgAction, Command, value_parser};

use crate::errors::CliError;

/// Parsed `-fprec <P>[M|L][Fe]` (spec.md §6).
///
/// `M`/`L` select msb/lsb alignment (default msb, matching the teacher's
/// convention of a sensible default when an optional suffix is omitted);
/// `Fe` requests float re-interpretation with `e` exponent bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FprecSpec {
    pub precision:     u32,
    pub msb_aligned:   bool,
    pub float_exp_bits: Option<u32>
}

impl std::str::FromStr for FprecSpec {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let digits_end = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits_end == 0 {
            return Err(CliError::InvalidFprec { spec: s.to_string() });
        }
        let precision: u32 = s[..digits_end]
            .parse()
            .map_err(|_| CliError::InvalidFprec { spec: s.to_string() })?;

        let mut rest = &s[digits_end..];
        let mut msb_aligned = true;
        if let Some(c) = rest.chars().next() {
            match c {
                'M' | 'm' => {
                    rest = &rest[1..];
                }
                'L' | 'l' => {
                    msb_aligned = false;
                    rest = &rest[1..];
                }
                _ => {}
            }
        }

        let float_exp_bits = if let Some(stripped) = rest.strip_prefix(['F', 'f']) {
            Some(
                stripped
                    .parse::<u32>()
                    .map_err(|_| CliError::InvalidFprec { spec: s.to_string() })?
            )
        } else if rest.is_empty() {
            None
        } else {
            return Err(CliError::InvalidFprec { spec: s.to_string() });
        };

        Ok(FprecSpec {
            precision,
            msb_aligned,
            float_exp_bits
        })
    }
}

/// Which lifting filter the pipeline runs (spec.md §4.3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterChoice {
    W5X3,
    W9X7
}

impl std::str::FromStr for FilterChoice {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "w5x3" | "5x3" | "53" => Ok(FilterChoice::W5X3),
            "w9x7" | "9x7" | "97" => Ok(FilterChoice::W9X7),
            _ => Err(CliError::InvalidFilter { name: s.to_string() })
        }
    }
}

/// Which direction(s) of the DWT cascade the pipeline exercises.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DirectionChoice {
    Analysis,
    Synthesis,
    /// Analyse then synthesise in one run (spec.md §8 properties 1-2).
    RoundTrip
}

impl std::str::FromStr for DirectionChoice {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "analysis" | "forward" | "encode" => Ok(DirectionChoice::Analysis),
            "synthesis" | "inverse" | "decode" => Ok(DirectionChoice::Synthesis),
            "roundtrip" | "both" => Ok(DirectionChoice::RoundTrip),
            _ => Err(CliError::InvalidDirection { name: s.to_string() })
        }
    }
}

#[rustfmt::skip]
pub fn create_cmd_args() -> Command {
    Command::new("kdu-cli")
        .author("kdu-core contributors")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Minimal DWT + sample-transfer demonstration: -fprec <P>[M|L][Fe]")
        .next_line_help(false)
        .arg(Arg::new("in")
            .short('i')
            .long("input")
            .help("Raw little-endian i32 input samples, row-major, one component")
            .action(ArgAction::Set)
            .value_parser(value_parser!(OsString))
            .required(true))
        .arg(Arg::new("out")
            .short('o')
            .long("out")
            .help("Output file; extension selects the writer (bmp/pgm/ppm/raw/tiff)")
            .action(ArgAction::Set)
            .value_parser(value_parser!(OsString))
            .required(true))
        .arg(Arg::new("width")
            .long("width")
            .action(ArgAction::Set)
            .value_parser(value_parser!(usize))
            .required(true))
        .arg(Arg::new("height")
            .long("height")
            .action(ArgAction::Set)
            .value_parser(value_parser!(usize))
            .required(true))
        .arg(Arg::new("precision")
            .long("precision")
            .help("Native/original bit depth B of the input samples")
            .action(ArgAction::Set)
            .value_parser(value_parser!(u32))
            .default_value("8"))
        .arg(Arg::new("signed")
            .long("signed")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("fprec")
            .long("fprec")
            .help("Forced output precision: <P>[M|L][Fe], e.g. 12M, 8L, 16F5")
            .action(ArgAction::Set)
            .value_parser(value_parser!(FprecSpec)))
        .arg(Arg::new("filter")
            .long("filter")
            .help("w5x3 (reversible) or w9x7 (irreversible)")
            .action(ArgAction::Set)
            .value_parser(value_parser!(FilterChoice))
            .default_value("w5x3"))
        .arg(Arg::new("direction")
            .long("direction")
            .help("analysis, synthesis, or roundtrip")
            .action(ArgAction::Set)
            .value_parser(value_parser!(DirectionChoice))
            .default_value("roundtrip"))
        .arg(Arg::new("safe")
            .long("safe")
            .help("Disable every SIMD intrinsic, forcing scalar reference kernels")
            .action(ArgAction::SetTrue))
}

impl clap::builder::ValueParserFactory for FprecSpec {
    type Parser = clap::builder::ValueParser;

    fn value_parser() -> Self::Parser {
        clap::builder::ValueParser::new(|s: &str| s.parse::<FprecSpec>().map_err(|e| e.to_string()))
    }
}

impl clap::builder::ValueParserFactory for FilterChoice {
    type Parser = clap::builder::ValueParser;

    fn value_parser() -> Self::Parser {
        clap::builder::ValueParser::new(|s: &str| s.parse::<FilterChoice>().map_err(|e| e.to_string()))
    }
}

impl clap::builder::ValueParserFactory for DirectionChoice {
    type Parser = clap::builder::ValueParser;

    fn value_parser() -> Self::Parser {
        clap::builder::ValueParser::new(|s: &str| s.parse::<DirectionChoice>().map_err(|e| e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fprec_parses_precision_alignment_and_float_exponent() {
        assert_eq!(
            "12M".parse::<FprecSpec>().unwrap(),
            FprecSpec { precision: 12, msb_aligned: true, float_exp_bits: None }
        );
        assert_eq!(
            "8L".parse::<FprecSpec>().unwrap(),
            FprecSpec { precision: 8, msb_aligned: false, float_exp_bits: None }
        );
        assert_eq!(
            "16F5".parse::<FprecSpec>().unwrap(),
            FprecSpec { precision: 16, msb_aligned: true, float_exp_bits: Some(5) }
        );
        assert_eq!(
            "16LF5".parse::<FprecSpec>().unwrap(),
            FprecSpec { precision: 16, msb_aligned: false, float_exp_bits: Some(5) }
        );
    }

    #[test]
    fn fprec_without_suffix_defaults_to_msb_no_float() {
        let spec: FprecSpec = "10".parse().unwrap();
        assert!(spec.msb_aligned);
        assert_eq!(spec.float_exp_bits, None);
    }

    #[test]
    fn fprec_rejects_garbage() {
        assert!("abc".parse::<FprecSpec>().is_err());
        assert!("".parse::<FprecSpec>().is_err());
    }

    #[test]
    fn filter_choice_accepts_common_aliases() {
        assert_eq!("w5x3".parse::<FilterChoice>().unwrap(), FilterChoice::W5X3);
        assert_eq!("9x7".parse::<FilterChoice>().unwrap(), FilterChoice::W9X7);
        assert!("bogus".parse::<FilterChoice>().is_err());
    }
}
