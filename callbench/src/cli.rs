//! Command line front-end of the benchmark

use self::reporting::{ConsoleReporter, VerboseReporter};
use crate::{run_tests, Reporter, RunSettings, Variant};
use anyhow::Context;
use clap::Parser;
use colorz::mode::{self, Mode};
use std::{env::args, fmt::Display, io, process::ExitCode, str::FromStr};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// recursion depth of the workload
    #[arg(allow_negative_numbers = true)]
    depth: Option<String>,

    /// loop counter start value, each variant is called `iterations - 1` times
    #[arg(allow_negative_numbers = true)]
    iterations: Option<String>,

    #[arg(hide = true, allow_negative_numbers = true)]
    extra: Vec<String>,

    /// run only variants with labels matching the glob
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// repeat the benchmark for 10, 100, 1000... iterations up to `iterations`
    #[arg(short = 's', long = "sweep", default_value_t = false)]
    sweep: bool,

    /// print the workload counter after each table
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,

    /// list variant labels and exit
    #[arg(short = 'l', long = "list", default_value_t = false)]
    list: bool,

    #[arg(long = "color", default_value = "detect")]
    coloring_mode: String,
}

impl Opts {
    /// Parses options, falling back to plain positionals when clap rejects the command line
    ///
    /// Only the first two arguments are taken as depth and iterations in that case, so `-h` or
    /// a malformed number end up in the usage path or in [`parse_int()`] instead of a clap error.
    fn parse_lenient(argv: Vec<String>) -> Self {
        Self::try_parse_from(&argv).unwrap_or_else(|_| {
            let mut positionals = argv.into_iter().skip(1);
            Self {
                depth: positionals.next(),
                iterations: positionals.next(),
                extra: positionals.collect(),
                filter: None,
                sweep: false,
                verbose: false,
                list: false,
                coloring_mode: "detect".to_string(),
            }
        })
    }
}

pub fn run() -> Result<ExitCode> {
    let opts = Opts::parse_lenient(args().collect());

    match Mode::from_str(&opts.coloring_mode) {
        Ok(coloring_mode) => mode::set_coloring_mode(coloring_mode),
        Err(_) => eprintln!("[WARN] Invalid coloring mode: {}", opts.coloring_mode),
    }

    if opts.list {
        for variant in Variant::ALL {
            println!("{}", variant.label());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let (Some(depth), Some(iterations)) = (opts.depth, opts.iterations) else {
        let program = args().next().unwrap_or_else(|| "callbench".to_string());
        println!("{}", usage(&program));
        return Ok(ExitCode::from(1));
    };

    let settings = RunSettings {
        depth: parse_int(&depth),
        iterations: parse_int(&iterations),
        filter: opts.filter,
    };

    if settings.selected_variants().is_empty() {
        eprintln!(
            "[ERROR] No variants match filter: {}",
            settings.filter.as_deref().unwrap_or_default()
        );
        return Ok(ExitCode::FAILURE);
    }

    let mut reporter: Box<dyn Reporter> = if opts.verbose {
        Box::new(VerboseReporter::new(io::stdout()))
    } else {
        Box::new(ConsoleReporter::new(io::stdout()))
    };

    let runs = if opts.sweep {
        sweep_iterations(settings.iterations)
    } else {
        vec![settings.iterations]
    };

    for iterations in runs {
        let settings = RunSettings {
            iterations,
            ..settings.clone()
        };
        let report = run_tests(&settings).with_context(|| {
            format!(
                "Unable to run benchmark (depth: {}, iterations: {})",
                settings.depth, settings.iterations
            )
        })?;
        reporter
            .on_complete(&report)
            .context("Unable to write report")?;
    }

    Ok(ExitCode::SUCCESS)
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [depth] [iterations]\n\texample: {} 100 1000",
        program, program
    )
}

/// Parses an integer the way C `atoi()` does
///
/// Leading whitespace and a sign are accepted, parsing stops at the first non-digit. Input with no
/// leading digits gives 0. Values outside of `i32` range saturate.
pub fn parse_int(input: &str) -> i32 {
    let input = input.trim_start();
    let (negative, digits) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    // one past i32::MAX is enough to saturate both ends
    const LIMIT: i64 = i32::MAX as i64 + 1;
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            (acc * 10 + i64::from(digit - b'0')).min(LIMIT)
        });

    let value = if negative { -value } else { value };
    value.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

/// Powers of 10 starting from 10 which are not greater than `max`
fn sweep_iterations(max: i32) -> Vec<i32> {
    let mut result = vec![];
    let mut iterations = 10i32;
    while iterations <= max {
        result.push(iterations);
        match iterations.checked_mul(10) {
            Some(next) => iterations = next,
            None => break,
        }
    }
    result
}

pub mod reporting {
    use crate::cli::colorize;
    use crate::{Error, Report, Reporter, BORDER};
    use std::io::Write;

    /// Prints the results table, painting the fastest row green and the slowest red
    pub(super) struct ConsoleReporter<W> {
        out: W,
    }

    impl<W: Write> ConsoleReporter<W> {
        pub fn new(out: W) -> Self {
            Self { out }
        }
    }

    impl<W: Write> Reporter for ConsoleReporter<W> {
        fn on_complete(&mut self, report: &Report) -> Result<(), Error> {
            let last = report.samples.len().saturating_sub(1);

            writeln!(self.out, "{}", BORDER)?;
            writeln!(self.out, "{}", report.header_row())?;
            writeln!(self.out, "{}", BORDER)?;
            for rank in 0..report.samples.len() {
                let Some(row) = report.row(rank) else {
                    continue;
                };
                let do_paint = last > 0 && (rank == 0 || rank == last);
                writeln!(self.out, "{}", colorize(row, do_paint, rank == 0))?;
            }
            writeln!(self.out, "{}", BORDER)?;
            Ok(())
        }
    }

    /// Prints the plain results table followed by the workload counter of the run
    pub(super) struct VerboseReporter<W> {
        out: W,
    }

    impl<W: Write> VerboseReporter<W> {
        pub fn new(out: W) -> Self {
            Self { out }
        }
    }

    impl<W: Write> Reporter for VerboseReporter<W> {
        fn on_complete(&mut self, report: &Report) -> Result<(), Error> {
            report.write_table(&mut self.out)?;
            writeln!(self.out, "Counter Value: {}", report.increments)?;
            Ok(())
        }
    }
}

fn colorize<T: Display>(value: T, do_paint: bool, is_fastest: bool) -> impl Display {
    use colorz::{ansi, mode::Stream::Stdout, Colorize, Style};

    const RED: Style = Style::new().fg(ansi::Red).const_into_runtime_style();
    const GREEN: Style = Style::new().fg(ansi::Green).const_into_runtime_style();
    const DEFAULT: Style = Style::new().const_into_runtime_style();

    if do_paint {
        if is_fastest {
            value.into_style_with(GREEN).stream(Stdout)
        } else {
            value.into_style_with(RED).stream(Stdout)
        }
    } else {
        value.into_style_with(DEFAULT).stream(Stdout)
    }
}
