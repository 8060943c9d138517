use glob_match::glob_match;
use std::{
    cell::Cell,
    fmt,
    hint::black_box,
    io::{self, Write},
};
use thiserror::Error;
use timer::{ActiveTimer, Timer};

pub mod cli;

pub const NS_TO_MS: u64 = 1_000_000;

/// Horizontal rule framing the results table
pub const BORDER: &str =
    "-----------------------------------------------------------------------------------";

#[derive(Debug, Error)]
pub enum Error {
    #[error("No measurements given")]
    NoMeasurements,

    #[error("IO Error")]
    IOError(#[from] io::Error),
}

thread_local! {
    static COUNTER: Cell<u64> = const { Cell::new(0) };
}

/// Number of workload increments performed so far on the current thread
///
/// The counter only exists to keep the optimizer from discarding the workload. Runs are single
/// threaded, so for the runner this is the process-wide value.
pub fn counter() -> u64 {
    COUNTER.with(Cell::get)
}

/// The measured workload: one counter increment per level of recursion
///
/// A call with `depth >= 0` performs exactly `depth + 1` increments. Negative depth performs one.
pub fn operation(depth: i32) {
    COUNTER.with(|c| c.set(c.get().wrapping_add(1)));
    if depth > 0 {
        operation(depth - 1);
    }
}

pub fn run_operation(depth: i32) {
    operation(depth);
}

/// Plain function every callable variant ends up calling
pub fn test_func(depth: i32) {
    run_operation(depth);
}

/// Partially applies `func`, leaving its single argument open
pub fn bind<F: Fn(i32)>(func: F) -> impl Fn(i32) {
    move |arg| func(arg)
}

/// Functor with the recursion depth captured at construction
pub struct MemberFunctor {
    depth: i32,
}

impl MemberFunctor {
    pub fn new(depth: i32) -> Self {
        Self { depth }
    }

    pub fn call(&self) {
        run_operation(self.depth);
    }
}

/// Stateless functor receiving the depth on every call
pub struct ParamFunctor;

impl ParamFunctor {
    pub fn call(&self, depth: i32) {
        run_operation(depth);
    }
}

/// Invocation strategies under test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    FunctionCall,
    DynClosure,
    DynBind,
    ImplClosure,
    ImplBind,
    FunctionPointer,
    FunctorMember,
    FunctorParam,
}

impl Variant {
    /// All variants in measurement order
    pub const ALL: [Variant; 8] = [
        Variant::FunctionCall,
        Variant::DynClosure,
        Variant::DynBind,
        Variant::ImplClosure,
        Variant::ImplBind,
        Variant::FunctionPointer,
        Variant::FunctorMember,
        Variant::FunctorParam,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Variant::FunctionCall => "function call",
            Variant::DynClosure => "boxed dyn Fn closure",
            Variant::DynBind => "boxed dyn Fn bind",
            Variant::ImplClosure => "impl Fn closure",
            Variant::ImplBind => "impl Fn bind",
            Variant::FunctionPointer => "function pointer",
            Variant::FunctorMember => "functor member",
            Variant::FunctorParam => "functor param",
        }
    }

    /// Times `iterations - 1` calls of the workload through this variant
    ///
    /// The callable is built before the clock starts. Type-erased callables and the function
    /// pointer are passed through [`black_box`] so the compiler can't see through the indirection
    /// and devirtualize the call.
    pub fn measure(self, depth: i32, iterations: i32) -> Sample {
        let elapsed_ns = match self {
            Variant::FunctionCall => time_calls(iterations, || test_func(depth)),
            Variant::DynClosure => {
                let f = black_box(Box::new(|depth| run_operation(depth)) as Box<dyn Fn(i32)>);
                time_calls(iterations, || f(depth))
            }
            Variant::DynBind => {
                let f = black_box(Box::new(bind(test_func)) as Box<dyn Fn(i32)>);
                time_calls(iterations, || f(depth))
            }
            Variant::ImplClosure => {
                let f = |depth| run_operation(depth);
                time_calls(iterations, || f(depth))
            }
            Variant::ImplBind => {
                let f = bind(test_func);
                time_calls(iterations, || f(depth))
            }
            Variant::FunctionPointer => {
                let f = black_box(test_func as fn(i32));
                time_calls(iterations, || f(depth))
            }
            Variant::FunctorMember => {
                let f = MemberFunctor::new(depth);
                time_calls(iterations, || f.call())
            }
            Variant::FunctorParam => {
                let f = ParamFunctor;
                time_calls(iterations, || f.call(depth))
            }
        };
        Sample {
            label: self.label(),
            elapsed_ms: elapsed_ns as f64 / NS_TO_MS as f64,
        }
    }
}

/// Counts down from `iterations` and calls `f` while the decremented counter stays positive,
/// which makes `iterations - 1` calls
///
/// Returns elapsed time in nanoseconds.
#[inline(always)]
fn time_calls(iterations: i32, mut f: impl FnMut()) -> u64 {
    let mut run_counter = iterations;
    let start = ActiveTimer::start();
    loop {
        run_counter = run_counter.saturating_sub(1);
        if run_counter <= 0 {
            break;
        }
        f();
    }
    ActiveTimer::stop(start)
}

/// Settings of a single benchmark run
///
/// Built by [`cli::run()`] from the command line. Should be created only with overriding needed
/// properties, like so:
/// ```rust
/// use callbench::RunSettings;
///
/// let settings = RunSettings {
///     depth: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default)]
pub struct RunSettings {
    /// Recursion depth of each workload call
    pub depth: i32,

    /// Loop counter start value. Each variant makes `iterations - 1` calls
    pub iterations: i32,

    /// Glob selecting variants by label. All variants are run when not set
    pub filter: Option<String>,
}

impl RunSettings {
    pub fn selected_variants(&self) -> Vec<Variant> {
        let filter = self.filter.as_deref().unwrap_or("");
        Variant::ALL
            .into_iter()
            .filter(|v| filter.is_empty() || glob_match(filter, v.label()))
            .collect()
    }
}

/// Runs every selected variant one after another and collects the results
pub fn run_tests(settings: &RunSettings) -> Result<Report, Error> {
    let counter_before = counter();
    let samples = settings
        .selected_variants()
        .into_iter()
        .map(|v| v.measure(settings.depth, settings.iterations))
        .collect::<Vec<_>>();
    let increments = counter().wrapping_sub(counter_before);

    Report::new(settings.depth, settings.iterations, samples, increments)
}

/// Time spent by one variant
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub label: &'static str,
    pub elapsed_ms: f64,
}

pub trait Reporter {
    fn on_complete(&mut self, report: &Report) -> Result<(), Error>;
}

/// Results of a single run, fastest variant first
#[derive(Clone, Debug)]
pub struct Report {
    pub depth: i32,
    pub iterations: i32,

    /// samples sorted by elapsed time, ascending
    pub samples: Vec<Sample>,

    /// workload increments performed during the run
    pub increments: u64,
}

impl Report {
    pub fn new(
        depth: i32,
        iterations: i32,
        mut samples: Vec<Sample>,
        increments: u64,
    ) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::NoMeasurements);
        }
        samples.sort_by(|a, b| a.elapsed_ms.total_cmp(&b.elapsed_ms));
        Ok(Self {
            depth,
            iterations,
            samples,
            increments,
        })
    }

    pub fn header(&self) -> String {
        format!("Running {} Deep {} Times", self.depth, self.iterations)
    }

    /// Width of the label column, wide enough for every label and the header
    pub fn label_width(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.label.len())
            .chain([self.header().len()])
            .max()
            .unwrap_or(0)
    }

    /// Time per call, dividing by the loop counter start value rather than the number of calls made
    pub fn average_ms(&self, sample: &Sample) -> f64 {
        sample.elapsed_ms / f64::from(self.iterations)
    }

    pub fn header_row(&self) -> String {
        format!(
            "#| {:width$} | Total\t\t\t| Average",
            self.header(),
            width = self.label_width()
        )
    }

    pub fn row(&self, rank: usize) -> Option<String> {
        let sample = self.samples.get(rank)?;
        Some(format!(
            "{}| {:width$} | {:.prec$} ms\t| {:.prec$} ms",
            rank,
            sample.label,
            sample.elapsed_ms,
            self.average_ms(sample),
            width = self.label_width(),
            prec = f64::DIGITS as usize,
        ))
    }

    pub fn write_table(&self, out: &mut impl Write) -> Result<(), Error> {
        write!(out, "{}", self)?;
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", BORDER)?;
        writeln!(f, "{}", self.header_row())?;
        writeln!(f, "{}", BORDER)?;
        for row in (0..self.samples.len()).filter_map(|rank| self.row(rank)) {
            writeln!(f, "{}", row)?;
        }
        writeln!(f, "{}", BORDER)
    }
}

mod timer {
    use std::time::Instant;

    pub(super) type ActiveTimer = PlatformTimer;

    pub(super) trait Timer<T> {
        fn start() -> T;
        fn stop(start_time: T) -> u64;
    }

    pub(super) struct PlatformTimer;

    impl Timer<Instant> for PlatformTimer {
        #[inline]
        fn start() -> Instant {
            Instant::now()
        }

        #[inline]
        fn stop(start_time: Instant) -> u64 {
            start_time.elapsed().as_nanos() as u64
        }
    }
}
